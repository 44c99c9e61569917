use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::JournalEntry;
use super::generation::GenerationId;

/// Identity of a version-control commit (a full object hash for git).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Highest ordinal folded into a snapshot, per generation.
///
/// Generations are tracked separately because an older generation may still
/// be appended to by another process after a newer one was compacted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(BTreeMap<GenerationId, u64>);

impl Watermark {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last ordinal folded in from `generation`, if any.
    pub fn get(&self, generation: &GenerationId) -> Option<u64> {
        self.0.get(generation).copied()
    }

    /// True when `entry` is already part of the snapshot.
    pub fn covers(&self, entry: &JournalEntry) -> bool {
        self.get(&entry.generation)
            .is_some_and(|ordinal| entry.ordinal <= ordinal)
    }

    /// Raise the mark of each entry's generation to that entry's ordinal.
    pub fn advance<'e>(&mut self, entries: impl IntoIterator<Item = &'e JournalEntry>) {
        for entry in entries {
            let mark = self.0.entry(entry.generation.clone()).or_default();
            *mark = (*mark).max(entry.ordinal);
        }
    }
}

/// The condensed state of a project's journal.
///
/// The snapshot is derived from the journal and overwritten by every
/// compaction; raw entries are always retained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot text; empty before the first compaction.
    pub content: String,
    pub meta: SnapshotMeta,
}

/// Bookkeeping stored next to the snapshot artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Commit that last recorded the snapshot.
    pub commit_id: Option<CommitId>,
    #[serde(default)]
    pub watermark: Watermark,
    pub compacted_at: Option<DateTime<Utc>>,
    /// Commit message of a compaction whose snapshot was written but never
    /// committed.
    pub pending_commit: Option<String>,
}

/// Decoded collaborator reply for one compaction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionResult {
    pub content: String,
    pub commit_message: String,
}

/// Result of a successful `compact` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionOutcome {
    pub snapshot_path: PathBuf,
    /// Commit recording the snapshot; `None` if the project was never committed.
    pub commit_id: Option<CommitId>,
    /// Message of the commit made by this run; `None` when nothing was committed.
    pub commit_message: Option<String>,
    /// Number of journal entries folded into the snapshot by this run.
    pub entries_compacted: usize,
}

impl CompactionOutcome {
    pub fn is_noop(&self) -> bool {
        self.entries_compacted == 0
    }
}

/// Whether the snapshot on disk is recorded in version control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CommitStatus {
    /// No compaction has completed yet.
    NeverCompacted,
    /// The snapshot was committed. `head_matches` is false when other commits
    /// landed after it.
    Committed {
        commit_id: CommitId,
        head_matches: bool,
    },
    /// The snapshot was written but its commit is missing.
    Pending { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryContent;
    use chrono::TimeZone;

    fn entry(generation: &GenerationId, ordinal: u64) -> JournalEntry {
        JournalEntry {
            id: uuid::Uuid::new_v4(),
            ordinal,
            generation: generation.clone(),
            project: "p".into(),
            content: EntryContent::from("note"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn watermark_tracks_each_generation_separately() {
        let older = GenerationId::new(1, Utc.timestamp_opt(1_000, 0).unwrap());
        let newer = GenerationId::new(2, Utc.timestamp_opt(2_000, 0).unwrap());
        let mut watermark = Watermark::default();

        watermark.advance(&[entry(&older, 1), entry(&newer, 1), entry(&newer, 2)]);

        assert!(watermark.covers(&entry(&older, 1)));
        assert!(!watermark.covers(&entry(&older, 2)));
        assert!(watermark.covers(&entry(&newer, 2)));
        assert!(!watermark.covers(&entry(&newer, 3)));
        assert!(!watermark.covers(&entry(&GenerationId::new(0, Utc::now()), 1)));
    }

    #[test]
    fn watermark_never_moves_backwards() {
        let generation = GenerationId::new(1, Utc::now());
        let mut watermark = Watermark::default();

        watermark.advance(&[entry(&generation, 5)]);
        watermark.advance(&[entry(&generation, 2)]);

        assert_eq!(watermark.get(&generation), Some(5));
    }

    #[test]
    fn watermark_serializes_as_a_map_of_generation_names() {
        let generation = GenerationId::new(3, Utc.timestamp_opt(1_000, 0).unwrap());
        let mut watermark = Watermark::default();
        watermark.advance(&[entry(&generation, 7)]);

        let json = serde_json::to_value(&watermark).unwrap();
        assert_eq!(json, serde_json::json!({ (generation.file_name()): 7 }));
        assert_eq!(serde_json::from_value::<Watermark>(json).unwrap(), watermark);
    }
}
