//! Domain models for context-journal.
//!
//! # Core Concepts
//!
//! ## Durable Entities
//!
//! - [`JournalEntry`]: One immutable, timestamped note. Entries are only ever
//!   appended, never rewritten.
//! - [`GenerationId`]: Names one physical journal segment. Every process that
//!   journals for a project opens a fresh generation.
//! - [`Snapshot`]: The condensed state of the journal, overwritten on every
//!   compaction and committed to version control.
//!
//! ## Ephemeral Values
//!
//! - [`CompactionResult`]: Decoded collaborator reply for one compaction run.
//! - [`CompactionOutcome`]: What a caller gets back from `compact`.
//! - [`Project`]: Explicit project context threaded through every operation.

mod entry;
mod generation;
mod project;
mod snapshot;

pub use entry::*;
pub use generation::*;
pub use project::*;
pub use snapshot::*;
