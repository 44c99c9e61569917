//! Deterministic summarizer for tests and offline use.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Summarizer, SummarizerError, SummaryRequest};

type Responder = dyn Fn(&SummaryRequest) -> Result<String, SummarizerError> + Send + Sync;

/// Pre-programmed reply for one call.
pub enum MockReply {
    Text(String),
    Error(SummarizerError),
    /// Wait, then resolve the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A well-formed compaction reply with both sections.
    pub fn compaction(content: &str, commit_message: &str) -> Self {
        Self::Text(format_reply(content, commit_message))
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Render a reply in the delimited format the compactor decodes.
pub fn format_reply(content: &str, commit_message: &str) -> String {
    format!(
        "[COMPRESSED_CONTENT]\n{}\n[/COMPRESSED_CONTENT]\n\n[COMMIT_MESSAGE]\n{}\n[/COMMIT_MESSAGE]\n",
        content, commit_message
    )
}

enum Behaviour {
    Scripted(Mutex<VecDeque<MockReply>>),
    Responder(Box<Responder>),
}

/// Summarizer that replays scripted replies in order, or computes replies
/// with a pure function of the request.
pub struct MockSummarizer {
    behaviour: Behaviour,
    call_count: AtomicUsize,
    requests: Mutex<Vec<SummaryRequest>>,
}

impl MockSummarizer {
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self::with_behaviour(Behaviour::Scripted(Mutex::new(replies.into())))
    }

    pub fn responding(
        responder: impl Fn(&SummaryRequest) -> Result<String, SummarizerError> + Send + Sync + 'static,
    ) -> Self {
        Self::with_behaviour(Behaviour::Responder(Box::new(responder)))
    }

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<SummaryRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String, SummarizerError> {
        let call = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(request.clone());

        let mut reply = match &self.behaviour {
            Behaviour::Responder(responder) => return responder(request),
            Behaviour::Scripted(replies) => replies
                .lock()
                .expect("mock lock poisoned")
                .pop_front()
                .ok_or_else(|| {
                    SummarizerError::Rejected(format!(
                        "MockSummarizer: no reply configured for call {}",
                        call
                    ))
                })?,
        };

        loop {
            match reply {
                MockReply::Text(text) => return Ok(text),
                MockReply::Error(e) => return Err(e),
                MockReply::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
