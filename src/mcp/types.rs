//! Request and response types for MCP tools.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{CompactionOutcome, JournalEntry, Snapshot};

// ============================================================
// Request Types
// ============================================================

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct AppendEntryRequest {
    #[schemars(
        description = "Free-text note: a decision, finding, correction or plan, written for a future reader"
    )]
    #[serde(default)]
    pub text: Option<String>,
    #[schemars(description = "Structured JSON note, used instead of text")]
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListEntriesRequest {
    #[schemars(description = "Return only the most recent N entries. Omit for all entries.")]
    #[serde(default)]
    pub limit: Option<usize>,
}

// ============================================================
// Response Types
// ============================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EntryInfo {
    pub ordinal: u64,
    pub generation: String,
    pub created_at: String,
    pub content: String,
}

impl From<JournalEntry> for EntryInfo {
    fn from(entry: JournalEntry) -> Self {
        Self {
            ordinal: entry.ordinal,
            generation: entry.generation.to_string(),
            created_at: entry.created_at.to_rfc3339(),
            content: entry.content.render(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EntryListResponse {
    /// Entries in journal order, oldest first
    pub entries: Vec<EntryInfo>,
    /// Number of entries in the whole journal
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotResponse {
    /// Condensed project context; empty before the first compaction
    pub content: String,
    pub commit_id: Option<String>,
    pub compacted_at: Option<String>,
    /// Set when the snapshot was written but its commit is still missing
    pub pending_commit: Option<String>,
}

impl From<Snapshot> for SnapshotResponse {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            content: snapshot.content,
            commit_id: snapshot.meta.commit_id.map(|id| id.to_string()),
            compacted_at: snapshot.meta.compacted_at.map(|t| t.to_rfc3339()),
            pending_commit: snapshot.meta.pending_commit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CompactResponse {
    pub snapshot_path: String,
    pub entries_compacted: usize,
    pub commit_id: Option<String>,
    pub commit_message: Option<String>,
}

impl From<CompactionOutcome> for CompactResponse {
    fn from(outcome: CompactionOutcome) -> Self {
        Self {
            snapshot_path: outcome.snapshot_path.display().to_string(),
            entries_compacted: outcome.entries_compacted,
            commit_id: outcome.commit_id.map(|id| id.to_string()),
            commit_message: outcome.commit_message,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecommitResponse {
    pub commit_id: String,
}
