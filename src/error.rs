//! Error taxonomy for journal and compaction operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::summarizer::SummarizerError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt journal {} at line {line}: {reason}", path.display())]
    CorruptJournal {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The collaborator reply is missing its required structure.
    #[error("malformed summarizer reply: {0}")]
    Format(String),

    /// An external version-control process failed or timed out.
    #[error("`{command}` failed (exit code {code:?}): {stderr}")]
    Process {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Collaborator(#[from] SummarizerError),

    #[error("compaction already in progress for project {0}")]
    Concurrency(String),

    /// The snapshot was overwritten, but recording it in version control
    /// failed. Retry only the commit step.
    #[error("snapshot {} was updated but not committed: {source}", snapshot.display())]
    CommitFailed {
        snapshot: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("no pending snapshot commit for project {0}")]
    NoPendingCommit(String),

    #[error("invalid project name: {0:?}")]
    InvalidProject(String),

    #[error("journal entry is empty")]
    EmptyEntry,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True when the snapshot artifact changed even though the call failed.
    pub fn snapshot_updated(&self) -> bool {
        matches!(self, Self::CommitFailed { .. })
    }

    /// True when repeating the whole call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Collaborator(e) => e.is_retryable(),
            Self::Concurrency(_) => true,
            _ => false,
        }
    }
}
