use crate::models::JournalEntry;
use crate::summarizer::SummaryRequest;

/// How the collaborator merges new entries into the snapshot.
pub const INSTRUCTION: &str = "\
You maintain the condensed working context of a software project. You are given
the current snapshot of that context and new journal entries recorded since the
snapshot was last updated. Produce a new snapshot that merges them:

(a) Preserve every correct and still relevant piece of information from both the
    snapshot and the new entries.
(b) Reorganize, deduplicate and compress the material so that it reads as one
    coherent document rather than a log.
(c) Remove material that is factually incorrect. When a new entry contradicts
    the snapshot or another entry, keep only the correct statement.
(d) Write a short commit message summarizing what changed. Mention explicitly
    any correction or removal of incorrect information.

Reply in exactly this format and nothing else:

[COMPRESSED_CONTENT]
<the new snapshot>
[/COMPRESSED_CONTENT]

[COMMIT_MESSAGE]
<the commit message>
[/COMMIT_MESSAGE]";

/// Markdown rendering of `entries`, oldest first.
pub fn render_entries(entries: &[JournalEntry]) -> String {
    entries
        .iter()
        .map(JournalEntry::render)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_request(previous_snapshot: &str, entries: &[JournalEntry]) -> SummaryRequest {
    SummaryRequest {
        previous_snapshot: previous_snapshot.to_string(),
        new_entries: render_entries(entries),
        instruction: INSTRUCTION.to_string(),
    }
}
