//! Folding new journal entries into the project snapshot.
//!
//! One compaction run:
//! 1. reads the snapshot, its metadata and every entry the watermark does
//!    not cover yet
//! 2. asks the summarizer to merge them and strictly decodes the reply
//! 3. atomically replaces the snapshot and metadata
//! 4. stages and commits the snapshot through the version-control sink
//!
//! Nothing is written until the reply has been decoded, so collaborator
//! failures leave the snapshot untouched. A sink failure after step 3 is
//! reported as [`Error::CommitFailed`] and the commit message is kept in the
//! metadata until [`Compactor::commit_pending`] or the next compaction
//! succeeds.
//!
//! The compactor itself is not synchronized; the engine serializes runs per
//! project.

mod prompt;
mod reply;

pub use prompt::{build_request, render_entries, INSTRUCTION};
pub use reply::decode_reply;

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::journal::read_journal;
use crate::models::*;
use crate::snapshot::{read_meta, read_snapshot, write_atomic, write_meta};
use crate::summarizer::Summarizer;
use crate::vcs::VersionControl;

pub struct Compactor<'a> {
    storage: &'a StorageConfig,
    summarizer: &'a dyn Summarizer,
    sink: &'a dyn VersionControl,
}

impl<'a> Compactor<'a> {
    pub fn new(
        storage: &'a StorageConfig,
        summarizer: &'a dyn Summarizer,
        sink: &'a dyn VersionControl,
    ) -> Self {
        Self {
            storage,
            summarizer,
            sink,
        }
    }

    #[tracing::instrument(skip_all, fields(project = %project.id))]
    pub async fn compact(&self, project: &Project) -> Result<CompactionOutcome> {
        let root = self.storage.context_dir(project);
        let snapshot_path = self.storage.snapshot_path(project);
        let meta_path = self.storage.meta_path(project);

        let previous = read_snapshot(&snapshot_path, &meta_path)?;
        let fresh: Vec<JournalEntry> = read_journal(&root)?
            .into_iter()
            .filter(|entry| !previous.meta.watermark.covers(entry))
            .collect();

        if fresh.is_empty() {
            if previous.meta.pending_commit.is_none() {
                info!("Nothing to compact");
                return Ok(CompactionOutcome {
                    snapshot_path,
                    commit_id: previous.meta.commit_id,
                    commit_message: None,
                    entries_compacted: 0,
                });
            }
            info!("Nothing new to compact, committing pending snapshot");
            let message = previous.meta.pending_commit.clone();
            let commit_id = self
                .record_commit(project, &snapshot_path, &meta_path, previous.meta)
                .await?;
            return Ok(CompactionOutcome {
                snapshot_path,
                commit_id: Some(commit_id),
                commit_message: message,
                entries_compacted: 0,
            });
        }
        let mut watermark = previous.meta.watermark.clone();
        watermark.advance(&fresh);

        let request = build_request(&previous.content, &fresh);
        debug!(
            entries = fresh.len(),
            snapshot_bytes = previous.content.len(),
            summarizer = self.summarizer.name(),
            "Requesting compaction"
        );
        let reply = self.summarizer.summarize(&request).await?;
        let result = decode_reply(&reply)?;

        let unchanged = result.content == previous.content
            && previous.meta.commit_id.is_some()
            && previous.meta.pending_commit.is_none();
        if unchanged {
            let meta = SnapshotMeta {
                watermark,
                compacted_at: Some(Utc::now()),
                ..previous.meta
            };
            write_meta(&meta_path, &meta)?;
            info!(
                entries = fresh.len(),
                "Snapshot content unchanged, skipping commit"
            );
            return Ok(CompactionOutcome {
                snapshot_path,
                commit_id: meta.commit_id,
                commit_message: None,
                entries_compacted: fresh.len(),
            });
        }

        // A message whose commit never landed still describes part of this
        // snapshot's delta.
        let commit_message = match &previous.meta.pending_commit {
            Some(unflushed) => format!("{}\n\n{}", result.commit_message, unflushed),
            None => result.commit_message,
        };

        write_atomic(&snapshot_path, result.content.as_bytes())?;
        let meta = SnapshotMeta {
            commit_id: previous.meta.commit_id,
            watermark,
            compacted_at: Some(Utc::now()),
            pending_commit: Some(commit_message.clone()),
        };
        if let Err(e) = write_meta(&meta_path, &meta) {
            return Err(Error::CommitFailed {
                snapshot: snapshot_path,
                source: Box::new(e),
            });
        }

        let commit_id = self.record_commit(project, &snapshot_path, &meta_path, meta).await?;
        info!(
            entries = fresh.len(),
            commit = %commit_id,
            "Compacted journal"
        );
        Ok(CompactionOutcome {
            snapshot_path,
            commit_id: Some(commit_id),
            commit_message: Some(commit_message),
            entries_compacted: fresh.len(),
        })
    }

    /// Commit a snapshot whose earlier commit failed.
    #[tracing::instrument(skip_all, fields(project = %project.id))]
    pub async fn commit_pending(&self, project: &Project) -> Result<CommitId> {
        let snapshot_path = self.storage.snapshot_path(project);
        let meta_path = self.storage.meta_path(project);

        let meta = read_meta(&meta_path)?;
        if meta.pending_commit.is_none() {
            return Err(Error::NoPendingCommit(project.id.clone()));
        }
        let commit_id = self.record_commit(project, &snapshot_path, &meta_path, meta).await?;
        info!(commit = %commit_id, "Committed pending snapshot");
        Ok(commit_id)
    }

    pub async fn status(&self, project: &Project) -> Result<CommitStatus> {
        let meta = read_meta(&self.storage.meta_path(project))?;
        if let Some(message) = meta.pending_commit {
            return Ok(CommitStatus::Pending { message });
        }
        match meta.commit_id {
            None => Ok(CommitStatus::NeverCompacted),
            Some(commit_id) => {
                let head = self.sink.head(&project.root).await?;
                Ok(CommitStatus::Committed {
                    head_matches: head.as_ref() == Some(&commit_id),
                    commit_id,
                })
            }
        }
    }

    /// Stage and commit the snapshot with the pending message, then record
    /// the commit in the metadata.
    async fn record_commit(
        &self,
        project: &Project,
        snapshot_path: &Path,
        meta_path: &Path,
        mut meta: SnapshotMeta,
    ) -> Result<CommitId> {
        let message = meta.pending_commit.clone().unwrap_or_default();

        let committed = match self.sink.stage(&project.root, snapshot_path).await {
            Ok(()) => {
                self.sink
                    .commit(&project.root, snapshot_path, &message)
                    .await
            }
            Err(e) => Err(e),
        };
        let commit_id = match committed {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Snapshot written but not committed");
                return Err(Error::CommitFailed {
                    snapshot: snapshot_path.to_path_buf(),
                    source: Box::new(e),
                });
            }
        };

        meta.commit_id = Some(commit_id.clone());
        meta.pending_commit = None;
        write_meta(meta_path, &meta)?;
        Ok(commit_id)
    }
}
