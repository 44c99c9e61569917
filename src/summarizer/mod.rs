//! The summarization collaborator.
//!
//! Compaction delegates condensing the journal to an external text-generation
//! service. The service is modelled as the [`Summarizer`] capability so that
//! production code talks to an HTTP API while tests substitute a deterministic
//! [`mock::MockSummarizer`].

mod anthropic;
pub mod mock;
mod reliable;

pub use anthropic::AnthropicSummarizer;
pub use reliable::ReliableSummarizer;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of a collaborator round-trip.
///
/// Only `Timeout` and `Unavailable` are transient and eligible for retry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SummarizerError {
    #[error("summarizer timed out after {0:?}")]
    Timeout(Duration),

    #[error("summarizer rejected credentials: {0}")]
    Auth(String),

    #[error("summarizer unavailable: {0}")]
    Unavailable(String),

    #[error("summarizer rejected request: {0}")]
    Rejected(String),
}

impl SummarizerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// One compaction request: the previous snapshot, the new entries, and the
/// instruction describing how to merge them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub previous_snapshot: String,
    pub new_entries: String,
    pub instruction: String,
}

impl SummaryRequest {
    /// Single-message prompt for text-completion style services.
    pub fn render_prompt(&self) -> String {
        let previous = if self.previous_snapshot.trim().is_empty() {
            "(no snapshot yet)"
        } else {
            self.previous_snapshot.as_str()
        };
        format!(
            "{}\n\n<current_snapshot>\n{}\n</current_snapshot>\n\n<new_entries>\n{}\n</new_entries>",
            self.instruction, previous, self.new_entries
        )
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    /// Send `request` and return the raw reply text.
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, SummarizerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(SummarizerError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(SummarizerError::Unavailable("503".into()).is_retryable());
        assert!(!SummarizerError::Auth("bad key".into()).is_retryable());
        assert!(!SummarizerError::Rejected("400".into()).is_retryable());
    }

    #[test]
    fn prompt_marks_missing_snapshot() {
        let request = SummaryRequest {
            previous_snapshot: "  ".into(),
            new_entries: "## Entry 1".into(),
            instruction: "Compress.".into(),
        };
        let prompt = request.render_prompt();
        assert!(prompt.starts_with("Compress."));
        assert!(prompt.contains("(no snapshot yet)"));
        assert!(prompt.contains("<new_entries>\n## Entry 1\n</new_entries>"));
    }
}
