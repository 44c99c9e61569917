//! HTTP client for the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Summarizer, SummarizerError, SummaryRequest};
use crate::config::SummarizerConfig;

const API_VERSION: &str = "2023-06-01";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Summarizer backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicSummarizer {
    api_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    client: Client,
}

impl AnthropicSummarizer {
    pub fn new(config: &SummarizerConfig) -> Result<Self, SummarizerError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| SummarizerError::Rejected(format!("invalid HTTP client setup: {}", e)))?;

        Ok(Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout,
            client,
        })
    }

    fn request(&self, body: &MessagesRequest<'_>) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.api_url)
            .header("anthropic-version", API_VERSION)
            .json(body);
        if let Some(ref key) = self.api_key {
            req = req.header("x-api-key", key);
        }
        req
    }

    /// Map transport failures onto the retry taxonomy.
    fn transport_error(&self, e: reqwest::Error) -> SummarizerError {
        if e.is_timeout() {
            SummarizerError::Timeout(self.timeout)
        } else if e.is_connect() || e.is_request() || e.is_body() {
            SummarizerError::Unavailable(e.to_string())
        } else {
            SummarizerError::Rejected(e.to_string())
        }
    }

    /// Convert an HTTP status into a summarizer error.
    fn status_error(status: StatusCode, body: String) -> SummarizerError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SummarizerError::Auth(body),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
                SummarizerError::Unavailable(format!("{}: {}", status, body))
            }
            s if s.is_server_error() => {
                SummarizerError::Unavailable(format!("{}: {}", status, body))
            }
            _ => SummarizerError::Rejected(format!("{}: {}", status, body)),
        }
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String, SummarizerError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: request.render_prompt(),
            }],
        };

        tracing::debug!(
            model = %self.model,
            prompt_chars = body.messages[0].content.len(),
            "Sending summarization request"
        );

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(SummarizerError::Rejected(
                "response contained no text content".to_string(),
            ));
        }
        Ok(text)
    }
}
