use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::generation::GenerationId;

/// One append-only note in a project's journal.
///
/// Entries are written once and never mutated. Within a generation the
/// `ordinal` starts at 1 and increases by one per successful append; a failed
/// append does not consume an ordinal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: Uuid,
    pub ordinal: u64,
    /// The generation segment this entry was appended to.
    pub generation: GenerationId,
    /// Identifier of the project that recorded the entry.
    pub project: String,
    pub content: EntryContent,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Markdown block handed to the summarization collaborator.
    pub fn render(&self) -> String {
        format!(
            "## Entry {} ({}, {})\n\n{}\n",
            self.ordinal,
            self.generation,
            self.created_at.to_rfc3339(),
            self.content.render()
        )
    }
}

/// Body of a journal entry: free text or a structured JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum EntryContent {
    Text(String),
    Structured(serde_json::Value),
}

impl EntryContent {
    /// Text that is only whitespace, or a JSON `null`.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Structured(value) => value.is_null(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl From<String> for EntryContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for EntryContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for EntryContent {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// Input for appending an entry through the HTTP API.
///
/// Either `{"text": "..."}` or `{"data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppendEntryInput {
    Text { text: String },
    Structured { data: serde_json::Value },
}

impl From<AppendEntryInput> for EntryContent {
    fn from(input: AppendEntryInput) -> Self {
        match input {
            AppendEntryInput::Text { text } => Self::Text(text),
            AppendEntryInput::Structured { data } => Self::Structured(data),
        }
    }
}
