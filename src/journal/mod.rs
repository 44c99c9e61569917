//! Durable, append-only journal storage.
//!
//! A project's journal is a directory of generation files, one per process
//! that journaled for the project. Each generation is a JSON-lines file named
//! by its [`GenerationId`]; entries are read back in generation order, then
//! ordinal order.

mod cache;

pub use cache::{HandleCache, SharedHandle};

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;

/// Attempts at finding an unused generation name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// An open generation that entries are appended to.
pub struct JournalHandle {
    project_id: String,
    root: PathBuf,
    generation: GenerationId,
    path: PathBuf,
    file: File,
    next_ordinal: u64,
}

impl JournalHandle {
    /// Open a new generation under `root`, creating `root` if needed.
    ///
    /// The generation is named from `revision_count` and the current time, and
    /// always sorts after every generation already present. Existing names are
    /// never reused.
    pub fn open_or_create(project_id: &str, root: &Path, revision_count: u64) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| Error::io(root, e))?;

        let mut generation = GenerationId::new(revision_count, Utc::now());
        if let Some(latest) = list_generations(root)?.last() {
            generation = generation.succeeding(latest);
        }

        let mut attempts = 0;
        let (path, file) = loop {
            let path = root.join(generation.file_name());
            match OpenOptions::new().append(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS => {
                    attempts += 1;
                    generation = generation.bump();
                }
                Err(e) => return Err(Error::io(&path, e)),
            }
        };
        sync_dir(root);

        tracing::info!(
            project = project_id,
            generation = %generation,
            "Opened journal generation"
        );

        Ok(Self {
            project_id: project_id.to_string(),
            root: root.to_path_buf(),
            generation,
            path,
            file,
            next_ordinal: 1,
        })
    }

    pub fn generation(&self) -> &GenerationId {
        &self.generation
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append one entry and flush it to stable storage before returning.
    ///
    /// On failure the generation file is truncated back to its previous
    /// length and the ordinal is not consumed, so the handle stays usable.
    pub fn append(&mut self, content: impl Into<EntryContent>) -> Result<JournalEntry> {
        let entry = JournalEntry {
            id: Uuid::new_v4(),
            ordinal: self.next_ordinal,
            generation: self.generation.clone(),
            project: self.project_id.clone(),
            content: content.into(),
            created_at: Utc::now(),
        };

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let offset = self
            .file
            .metadata()
            .map_err(|e| Error::io(&self.path, e))?
            .len();

        if let Err(e) = self.write_durably(&line) {
            if let Err(rollback) = self.file.set_len(offset) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "Failed to roll back partial journal write"
                );
            }
            return Err(Error::io(&self.path, e));
        }

        self.next_ordinal += 1;
        tracing::debug!(
            project = %self.project_id,
            generation = %self.generation,
            ordinal = entry.ordinal,
            bytes = line.len(),
            "Appended journal entry"
        );
        Ok(entry)
    }

    fn write_durably(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line)?;
        self.file.sync_all()
    }
}

// ============================================================
// Reading
// ============================================================

/// Generation identifiers under `root` in causal order.
///
/// A missing `root` is an empty journal.
pub fn list_generations(root: &Path) -> Result<Vec<GenerationId>> {
    let dir = match fs::read_dir(root) {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(root, e)),
    };

    let mut generations = Vec::new();
    for item in dir {
        let item = item.map_err(|e| Error::io(root, e))?;
        if let Some(id) = item.file_name().to_str().and_then(GenerationId::parse) {
            generations.push(id);
        }
    }
    generations.sort();
    Ok(generations)
}

/// Every entry under `root`, across all generations, in causal order.
pub fn read_journal(root: &Path) -> Result<Vec<JournalEntry>> {
    let mut entries = Vec::new();
    for generation in list_generations(root)? {
        entries.extend(read_generation(&root.join(generation.file_name()))?);
    }
    Ok(entries)
}

/// Entries of one generation file in ordinal order.
///
/// A final record without its trailing newline is a write torn by a crash and
/// is skipped, even when the tear splits a multi-byte character. Any other
/// undecodable line is corruption.
pub fn read_generation(path: &Path) -> Result<Vec<JournalEntry>> {
    let raw = fs::read(path).map_err(|e| Error::io(path, e))?;
    let mut lines: Vec<&[u8]> = raw.split(|b| *b == b'\n').collect();
    // The chunk after the last newline is empty for a cleanly written file.
    let tail = lines.pop().unwrap_or_default();
    if !tail.is_empty() {
        tracing::warn!(
            path = %path.display(),
            line = lines.len() + 1,
            bytes = tail.len(),
            "Skipping torn trailing journal record"
        );
    }

    let mut entries: Vec<JournalEntry> = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        if line.trim_ascii().is_empty() {
            continue;
        }
        let entry: JournalEntry =
            serde_json::from_slice(line).map_err(|e| Error::CorruptJournal {
                path: path.to_path_buf(),
                line: index + 1,
                reason: e.to_string(),
            })?;

        if let Some(prev) = entries.last() {
            if entry.ordinal <= prev.ordinal {
                return Err(Error::CorruptJournal {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: format!(
                        "ordinal {} does not follow {}",
                        entry.ordinal, prev.ordinal
                    ),
                });
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Make a newly created directory entry durable. Best effort.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(path = %dir.display(), error = %e, "Directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
