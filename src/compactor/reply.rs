//! Strict decoding of the collaborator's delimited reply.

use crate::error::{Error, Result};
use crate::models::CompactionResult;

const CONTENT_OPEN: &str = "[COMPRESSED_CONTENT]";
const CONTENT_CLOSE: &str = "[/COMPRESSED_CONTENT]";
const MESSAGE_OPEN: &str = "[COMMIT_MESSAGE]";
const MESSAGE_CLOSE: &str = "[/COMMIT_MESSAGE]";

/// Decode a reply into snapshot content and a commit message.
///
/// Each section must appear exactly once, open before close, without
/// overlapping the other section, and with a non-blank body. Bodies are
/// trimmed. Text outside the sections is ignored.
pub fn decode_reply(reply: &str) -> Result<CompactionResult> {
    let content = section(reply, CONTENT_OPEN, CONTENT_CLOSE)?;
    let message = section(reply, MESSAGE_OPEN, MESSAGE_CLOSE)?;

    let overlaps = content.start < message.end && message.start < content.end;
    if overlaps {
        return Err(Error::Format(
            "content and commit message sections overlap".to_string(),
        ));
    }

    Ok(CompactionResult {
        content: content.body.to_string(),
        commit_message: message.body.to_string(),
    })
}

struct Section<'a> {
    /// Byte range from the opening tag through the closing tag.
    start: usize,
    end: usize,
    body: &'a str,
}

fn section<'a>(reply: &'a str, open: &str, close: &str) -> Result<Section<'a>> {
    let start = single(reply, open)?;
    let close_at = single(reply, close)?;
    let body_start = start + open.len();
    if close_at < body_start {
        return Err(Error::Format(format!("{close} appears before {open}")));
    }

    let body = reply[body_start..close_at].trim();
    if body.is_empty() {
        return Err(Error::Format(format!("{open} section is empty")));
    }
    Ok(Section {
        start,
        end: close_at + close.len(),
        body,
    })
}

/// Position of the only occurrence of `tag`.
fn single(reply: &str, tag: &str) -> Result<usize> {
    let mut found = reply.match_indices(tag).map(|(i, _)| i);
    match (found.next(), found.next()) {
        (Some(i), None) => Ok(i),
        (None, _) => Err(Error::Format(format!("missing {tag}"))),
        (Some(_), Some(_)) => Err(Error::Format(format!("{tag} appears more than once"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::mock::format_reply;

    fn format_error(reply: &str) -> String {
        match decode_reply(reply) {
            Err(Error::Format(reason)) => reason,
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn decodes_well_formed_reply() {
        let result = decode_reply(&format_reply("Earth is round.", "Drop flat-earth claim")).unwrap();
        assert_eq!(result.content, "Earth is round.");
        assert_eq!(result.commit_message, "Drop flat-earth claim");
    }

    #[test]
    fn ignores_surrounding_chatter_and_order_of_sections() {
        let reply = "Sure! Here you go.\n\
            [COMMIT_MESSAGE] Merge notes [/COMMIT_MESSAGE]\n\
            [COMPRESSED_CONTENT]\n  multi\n  line\n[/COMPRESSED_CONTENT]\nThanks.";
        let result = decode_reply(reply).unwrap();
        assert_eq!(result.content, "multi\n  line");
        assert_eq!(result.commit_message, "Merge notes");
    }

    #[test]
    fn missing_section_is_rejected() {
        let reason = format_error("[COMPRESSED_CONTENT]x[/COMPRESSED_CONTENT]");
        assert!(reason.contains("[COMMIT_MESSAGE]"));
    }

    #[test]
    fn unterminated_section_is_rejected() {
        let reason = format_error("[COMPRESSED_CONTENT]x\n[COMMIT_MESSAGE]m[/COMMIT_MESSAGE]");
        assert!(reason.contains("[/COMPRESSED_CONTENT]"));
    }

    #[test]
    fn duplicated_section_is_rejected() {
        let reply = format!("{}{}", format_reply("a", "m"), "[COMPRESSED_CONTENT]b[/COMPRESSED_CONTENT]");
        assert!(format_error(&reply).contains("more than once"));
    }

    #[test]
    fn close_before_open_is_rejected() {
        let reply = "[/COMPRESSED_CONTENT]x[COMPRESSED_CONTENT][COMMIT_MESSAGE]m[/COMMIT_MESSAGE]";
        assert!(format_error(reply).contains("before"));
    }

    #[test]
    fn blank_body_is_rejected() {
        let reply = format_reply("   ", "m");
        assert!(format_error(&reply).contains("empty"));
    }

    #[test]
    fn nested_sections_are_rejected() {
        let reply = "[COMPRESSED_CONTENT]x [COMMIT_MESSAGE]m[/COMMIT_MESSAGE] y[/COMPRESSED_CONTENT]";
        assert!(format_error(reply).contains("overlap"));
    }
}
