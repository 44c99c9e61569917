//! Configuration for the journal engine and its collaborators.
//!
//! Sources, later wins:
//! - built-in defaults
//! - a JSON config file (`--config`, or `config.json` in the platform config
//!   directory)
//! - environment variables:
//!   - `CONTEXT_JOURNAL_CONTEXT_DIR` - storage directory name (default `.context`)
//!   - `CONTEXT_JOURNAL_SNAPSHOT` - snapshot file name (default `snapshot`)
//!   - `CONTEXT_JOURNAL_API_URL` - summarizer endpoint
//!   - `ANTHROPIC_API_KEY` - summarizer API key
//!   - `CONTEXT_JOURNAL_MODEL` - summarizer model
//!   - `CONTEXT_JOURNAL_TIMEOUT_SECS` - per-request summarizer timeout
//!   - `CONTEXT_JOURNAL_MAX_RETRIES` - summarizer retries for transient failures
//!   - `CONTEXT_JOURNAL_GIT` - git executable
//!   - `CONTEXT_JOURNAL_WAIT_FOR_LOCK` - wait instead of rejecting concurrent compactions
//!   - `CONTEXT_JOURNAL_API_KEY` - bearer token required by the HTTP API

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Project;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub summarizer: SummarizerConfig,
    pub vcs: VcsConfig,
    pub compaction: CompactionConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load from `path` (or the default location, if present) and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "context-journal")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("CONTEXT_JOURNAL_CONTEXT_DIR") {
            self.storage.context_dir = v;
        }
        if let Some(v) = var("CONTEXT_JOURNAL_SNAPSHOT") {
            self.storage.snapshot_file = v;
        }
        if let Some(v) = var("CONTEXT_JOURNAL_API_URL") {
            self.summarizer.api_url = v;
        }
        if let Some(v) = var("ANTHROPIC_API_KEY") {
            self.summarizer.api_key = Some(v);
        }
        if let Some(v) = var("CONTEXT_JOURNAL_MODEL") {
            self.summarizer.model = v;
        }
        if let Some(v) = var("CONTEXT_JOURNAL_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.summarizer.timeout_secs = v;
        }
        if let Some(v) = var("CONTEXT_JOURNAL_MAX_RETRIES").and_then(|s| s.parse().ok()) {
            self.summarizer.max_retries = v;
        }
        if let Some(v) = var("CONTEXT_JOURNAL_GIT") {
            self.vcs.program = v;
        }
        if let Some(v) = var("CONTEXT_JOURNAL_WAIT_FOR_LOCK") {
            self.compaction.wait_for_lock = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = var("CONTEXT_JOURNAL_API_KEY") {
            self.server.api_key = Some(v);
        }
    }
}

/// Where a project's journal and snapshot live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory under the project root holding generations and the snapshot.
    pub context_dir: String,
    pub snapshot_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            context_dir: ".context".to_string(),
            snapshot_file: "snapshot".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn context_dir(&self, project: &Project) -> PathBuf {
        project.root.join(&self.context_dir)
    }

    pub fn snapshot_path(&self, project: &Project) -> PathBuf {
        self.context_dir(project).join(&self.snapshot_file)
    }

    pub fn meta_path(&self, project: &Project) -> PathBuf {
        self.context_dir(project)
            .join(format!("{}.meta.json", self.snapshot_file))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound for one collaborator round-trip.
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: None,
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4096,
            timeout_secs: 120,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}

impl SummarizerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_factor: self.jitter_factor,
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Timeout and retry behaviour around the summarization collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        SummarizerConfig::default().retry_policy()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsConfig {
    pub program: String,
    pub timeout_secs: u64,
    /// Commit identity passed as `-c user.name/-c user.email`; git's own
    /// configuration applies when unset.
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            timeout_secs: 30,
            author_name: None,
            author_email: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Wait for a running compaction of the same project instead of failing
    /// with a concurrency error.
    pub wait_for_lock: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}
