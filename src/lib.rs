//! Durable append-only journal with summarizing compaction.
//!
//! Entries are appended to per-process generation files under a project's
//! context directory. Compaction folds new entries into a snapshot through a
//! summarization collaborator and records the snapshot in version control.

pub mod api;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod mcp;
pub mod models;
pub mod snapshot;
pub mod summarizer;
pub mod vcs;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
