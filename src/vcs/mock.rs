//! In-memory version-control sink for tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::VersionControl;
use crate::error::{Error, Result};
use crate::models::CommitId;

/// A commit recorded by [`MockVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub id: CommitId,
    pub message: String,
    pub paths: Vec<PathBuf>,
}

/// Records stage/commit calls instead of running a real VCS.
#[derive(Default)]
pub struct MockVcs {
    revisions: AtomicU64,
    failing_commits: AtomicUsize,
    staged: Mutex<Vec<PathBuf>>,
    commits: Mutex<Vec<RecordedCommit>>,
}

impl MockVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `count` pre-existing revisions.
    pub fn with_revisions(count: u64) -> Self {
        let vcs = Self::default();
        vcs.revisions.store(count, Ordering::Relaxed);
        vcs
    }

    /// Make the next `n` commit calls fail with a process error.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::Relaxed);
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.lock().expect("mock vcs lock poisoned").clone()
    }

    /// Simulate a commit made outside the journal.
    pub fn external_commit(&self, message: &str) -> CommitId {
        self.record(message.to_string(), Vec::new())
    }

    fn record(&self, message: String, paths: Vec<PathBuf>) -> CommitId {
        let n = self.revisions.fetch_add(1, Ordering::Relaxed) + 1;
        let id = CommitId(format!("{:040x}", n));
        self.commits
            .lock()
            .expect("mock vcs lock poisoned")
            .push(RecordedCommit {
                id: id.clone(),
                message,
                paths,
            });
        id
    }
}

#[async_trait]
impl VersionControl for MockVcs {
    async fn revision_count(&self, _workdir: &Path) -> Result<u64> {
        Ok(self.revisions.load(Ordering::Relaxed))
    }

    async fn head(&self, _workdir: &Path) -> Result<Option<CommitId>> {
        let commits = self.commits.lock().expect("mock vcs lock poisoned");
        Ok(commits.last().map(|c| c.id.clone()))
    }

    async fn stage(&self, _workdir: &Path, path: &Path) -> Result<()> {
        self.staged
            .lock()
            .expect("mock vcs lock poisoned")
            .push(path.to_path_buf());
        Ok(())
    }

    async fn commit(&self, _workdir: &Path, path: &Path, message: &str) -> Result<CommitId> {
        let failing = self.failing_commits.load(Ordering::Relaxed);
        if failing > 0 {
            self.failing_commits.store(failing - 1, Ordering::Relaxed);
            return Err(Error::Process {
                command: "mock commit".to_string(),
                code: Some(128),
                stderr: "simulated commit failure".to_string(),
            });
        }

        {
            let mut staged = self.staged.lock().expect("mock vcs lock poisoned");
            let before = staged.len();
            staged.retain(|p| p != path);
            if staged.len() == before {
                return Err(Error::Process {
                    command: "mock commit".to_string(),
                    code: Some(1),
                    stderr: format!("pathspec '{}' was never staged", path.display()),
                });
            }
        }
        Ok(self.record(message.to_string(), vec![path.to_path_buf()]))
    }
}
