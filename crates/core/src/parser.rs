//! Recover a JSON object from a model reply.

use crate::error::ParseIssue;
use crate::models::{ParsedValue, StructuredRecord};
use tracing::warn;

/// Parse a chat reply into a record, falling back to the raw text.
///
/// The reply may wrap the object in prose or a Markdown fence. The outermost
/// object starting at the first `{` is located with a brace counter; when
/// that span does not close or does not decode, the greedy span up to the
/// last `}` is tried as well.
pub fn parse_reply(raw: &str) -> ParsedValue {
    let Some(start) = raw.find('{') else {
        return fallback(raw, ParseIssue::NoJsonFound);
    };

    let balanced_end = balanced_object_end(raw, start);
    let greedy_end = raw.rfind('}').filter(|end| *end > start);

    let mut spans = Vec::with_capacity(2);
    if let Some(end) = balanced_end {
        spans.push(start..end + 1);
    }
    if let Some(end) = greedy_end {
        if balanced_end != Some(end) {
            spans.push(start..end + 1);
        }
    }

    if spans.is_empty() {
        return fallback(raw, ParseIssue::NoJsonFound);
    }

    let mut last_error = None;
    for span in spans {
        match serde_json::from_str::<StructuredRecord>(&raw[span]) {
            Ok(record) => return ParsedValue::Record(record),
            Err(error) => last_error = Some(error.to_string()),
        }
    }

    fallback(
        raw,
        ParseIssue::JsonDecode(last_error.unwrap_or_default()),
    )
}

/// Byte index of the `}` closing the object opened at `start`, skipping
/// braces inside string literals.
fn balanced_object_end(raw: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }

    None
}

fn fallback(raw: &str, issue: ParseIssue) -> ParsedValue {
    warn!(issue = %issue, reply_len = raw.len(), "model reply kept as raw text");
    ParsedValue::Raw {
        text: raw.to_string(),
        issue,
    }
}
