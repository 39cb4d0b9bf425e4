use crate::error::{Error, Result};
use crate::outline::BookOutline;

/// Parses the provider's outline JSON, tolerating a surrounding Markdown code fence.
///
/// Chapter numbers are reassigned by position so the outline starts out contiguous.
pub fn parse_outline(raw: &str) -> Result<BookOutline> {
    let trimmed = raw.trim();
    let mut outline: BookOutline = match serde_json::from_str(trimmed) {
        Ok(outline) => outline,
        Err(direct) => {
            let json = strip_code_fence(trimmed);
            if json == trimmed {
                return Err(Error::Parse {
                    raw: raw.to_owned(),
                    source: direct,
                });
            }
            serde_json::from_str(json).map_err(|source| Error::Parse {
                raw: raw.to_owned(),
                source,
            })?
        }
    };

    let renumbering = outline.reorder_all();
    if !renumbering.is_empty() {
        tracing::debug!(
            renumbered = renumbering.moved.len(),
            "outline chapter numbers did not match their positions; renumbered"
        );
    }
    Ok(outline)
}

/// Returns the body of a fenced block (with or without a language tag), or the
/// trimmed input when there is no fence.
///
/// A leading fence wins. Otherwise the first fence after some chatter is used.
/// The closing fence is the last one in the text, so backticks inside JSON
/// strings survive.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let open = if text.starts_with("```") {
        0
    } else {
        match text.find("\n```") {
            Some(newline) => newline + 1,
            None => return text,
        }
    };
    let after_marker = &text[open + 3..];
    let (body, closed) = match after_marker.rfind("```") {
        Some(close) => (&after_marker[..close], true),
        None => (after_marker, false),
    };
    let body = match body.find('\n') {
        Some(newline) if is_language_tag(&body[..newline]) => &body[newline + 1..],
        Some(_) => body,
        None if closed => strip_inline_tag(body),
        None => body,
    };
    body.trim()
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}

/// `json{...}` on a one-line fence: drop the tag up to where the payload begins.
fn strip_inline_tag(body: &str) -> &str {
    match body.find(['{', '[']) {
        Some(start) if is_language_tag(&body[..start]) => &body[start..],
        _ => body,
    }
}
