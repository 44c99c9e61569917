//! Version-control sink for snapshot commits.
//!
//! The sink never retries; callers decide whether to repeat a failed commit.

mod git;
pub mod mock;

pub use git::GitSink;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CommitId;

#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Number of commits reachable from HEAD; 0 outside a repository or before
    /// the first commit.
    async fn revision_count(&self, workdir: &Path) -> Result<u64>;

    /// Current HEAD commit, if any.
    async fn head(&self, workdir: &Path) -> Result<Option<CommitId>>;

    async fn stage(&self, workdir: &Path, path: &Path) -> Result<()>;

    /// Commit `path` alone. Anything else already staged in `workdir` stays
    /// staged and out of the commit.
    async fn commit(&self, workdir: &Path, path: &Path, message: &str) -> Result<CommitId>;
}
