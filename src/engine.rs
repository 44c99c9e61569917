//! Caller-facing journal operations.
//!
//! The [`Engine`] owns the handle cache, the per-project compaction locks and
//! the two collaborators. Every operation takes the [`Project`] it acts on, so
//! one engine serves any number of projects.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::compactor::Compactor;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::journal::{self, HandleCache, SharedHandle};
use crate::models::*;
use crate::snapshot;
use crate::summarizer::Summarizer;
use crate::vcs::VersionControl;

pub struct Engine {
    config: Config,
    cache: HandleCache,
    compactions: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
    summarizer: Arc<dyn Summarizer>,
    vcs: Arc<dyn VersionControl>,
}

impl Engine {
    pub fn new(
        config: Config,
        summarizer: Arc<dyn Summarizer>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        Self {
            config,
            cache: HandleCache::new(),
            compactions: Mutex::new(HashMap::new()),
            summarizer,
            vcs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the generation this engine appends to for `project`.
    ///
    /// Idempotent: later calls return the generation opened by the first.
    pub async fn start_journal(&self, project: &Project) -> Result<GenerationId> {
        let handle = self.handle(project).await?;
        let handle = handle.lock().expect("journal handle lock poisoned");
        Ok(handle.generation().clone())
    }

    /// Durably append `content`, starting the journal first if needed.
    ///
    /// Blank content is rejected with [`Error::EmptyEntry`]. The write and its
    /// fsync run on the blocking pool.
    pub async fn append_entry(
        &self,
        project: &Project,
        content: impl Into<EntryContent>,
    ) -> Result<JournalEntry> {
        let content = content.into();
        if content.is_blank() {
            return Err(Error::EmptyEntry);
        }

        let handle = self.handle(project).await?;
        tokio::task::spawn_blocking(move || {
            let mut handle = handle.lock().expect("journal handle lock poisoned");
            handle.append(content)
        })
        .await?
    }

    pub fn read_journal(&self, project: &Project) -> Result<Vec<JournalEntry>> {
        journal::read_journal(&self.config.storage.context_dir(project))
    }

    pub fn list_generations(&self, project: &Project) -> Result<Vec<GenerationId>> {
        journal::list_generations(&self.config.storage.context_dir(project))
    }

    pub fn read_snapshot(&self, project: &Project) -> Result<Snapshot> {
        snapshot::read_snapshot(
            &self.config.storage.snapshot_path(project),
            &self.config.storage.meta_path(project),
        )
    }

    /// Fold every entry appended since the last compaction into the snapshot.
    ///
    /// Runs are serialized per project. A second run while one is in flight
    /// fails with [`Error::Concurrency`] unless `compaction.wait_for_lock` is
    /// set.
    pub async fn compact(&self, project: &Project) -> Result<CompactionOutcome> {
        let _guard = self.lock_compaction(project).await?;
        self.compactor().compact(project).await
    }

    /// Repeat only the commit step of a compaction that failed with
    /// [`Error::CommitFailed`].
    pub async fn retry_commit(&self, project: &Project) -> Result<CommitId> {
        let _guard = self.lock_compaction(project).await?;
        self.compactor().commit_pending(project).await
    }

    pub async fn commit_status(&self, project: &Project) -> Result<CommitStatus> {
        self.compactor().status(project).await
    }

    fn compactor(&self) -> Compactor<'_> {
        Compactor::new(
            &self.config.storage,
            self.summarizer.as_ref(),
            self.vcs.as_ref(),
        )
    }

    async fn handle(&self, project: &Project) -> Result<SharedHandle> {
        let root = self.config.storage.context_dir(project);
        if let Some(handle) = self.cache.get(&root) {
            return Ok(handle);
        }
        let revision_count = self.vcs.revision_count(&project.root).await?;
        self.cache.get_or_open(&project.id, &root, revision_count)
    }

    async fn lock_compaction(&self, project: &Project) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.compactions.lock().expect("compaction lock poisoned");
            locks
                .entry(self.config.storage.context_dir(project))
                .or_default()
                .clone()
        };

        if self.config.compaction.wait_for_lock {
            return Ok(lock.lock_owned().await);
        }
        lock.try_lock_owned().map_err(|_| {
            tracing::warn!(project = %project.id, "Compaction already running");
            Error::Concurrency(project.id.clone())
        })
    }
}
