//! Text redaction into markdown

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Compile case-insensitive redaction patterns.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    if patterns.is_empty() {
        return Err(Error::invalid_argument("patterns", "at least one pattern is required"));
    }
    patterns
        .iter()
        .map(|p| {
            if p.is_empty() {
                return Err(Error::invalid_argument("patterns", "patterns must not be empty"));
            }
            Ok(RegexBuilder::new(p).case_insensitive(true).build()?)
        })
        .collect()
}

/// Render page texts as markdown with one `## Page N` section per page,
/// every match replaced by [`REDACTION_MARKER`].
pub fn redact_pages(page_texts: &[String], patterns: &[Regex]) -> String {
    let mut markdown = String::new();
    let mut redactions = 0usize;

    for (index, text) in page_texts.iter().enumerate() {
        let (redacted, count) = redact_text(text.trim_end(), patterns);
        redactions += count;

        if index > 0 {
            markdown.push('\n');
        }
        markdown.push_str(&format!("## Page {}\n\n", index + 1));
        if !redacted.is_empty() {
            markdown.push_str(&redacted);
            markdown.push('\n');
        }
    }

    tracing::debug!(pages = page_texts.len(), redactions, "redacted page text");
    markdown
}

/// Replace every span matched by any pattern. Matches are taken from the
/// original text, so overlapping spans collapse into one marker and markers
/// are never matched again.
fn redact_text(text: &str, patterns: &[Regex]) -> (String, usize) {
    let mut spans: Vec<(usize, usize)> = patterns
        .iter()
        .flat_map(|p| p.find_iter(text).map(|m| (m.start(), m.end())))
        .filter(|(start, end)| end > start)
        .collect();
    spans.sort_unstable();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut count = 0;
    for (start, end) in spans {
        if end <= cursor {
            continue;
        }
        if start < cursor {
            cursor = end;
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str(REDACTION_MARKER);
        cursor = end;
        count += 1;
    }
    out.push_str(&text[cursor..]);
    (out, count)
}
