//! Page selection syntax for splitting
//!
//! A selection is a comma separated list of tokens: `N`, `A-B`, or either form
//! prefixed with `!` to exclude. `-1` stands for the last page. Without any
//! inclusion token the selection starts from every page.

use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Parse a selection against a document of `total_pages`, returning sorted
/// 1-indexed page numbers. Pages beyond the document are dropped.
pub fn parse_page_selection(range: &str, total_pages: u32) -> Result<BTreeSet<u32>> {
    let invalid = || Error::InvalidPageRange {
        range: range.to_string(),
    };

    if range.trim().is_empty() {
        return Err(invalid());
    }

    let mut included = BTreeSet::new();
    let mut excluded = BTreeSet::new();
    let mut has_inclusions = false;

    for token in range.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid());
        }

        if let Some(body) = token.strip_prefix('!') {
            let (start, end) = parse_token(body.trim(), total_pages).ok_or_else(invalid)?;
            excluded.extend(start..=end.min(total_pages));
        } else {
            let (start, end) = parse_token(token, total_pages).ok_or_else(invalid)?;
            included.extend(start..=end.min(total_pages));
            has_inclusions = true;
        }
    }

    let mut selected = if has_inclusions {
        included
    } else {
        (1..=total_pages).collect()
    };
    selected.retain(|page| *page <= total_pages && !excluded.contains(page));

    if selected.is_empty() {
        tracing::warn!(range = %range, total_pages, "page selection is empty");
        return Err(Error::EmptySelection {
            range: range.to_string(),
        });
    }

    Ok(selected)
}

/// `N` or `A-B`; the range separator is the first `-` after the first
/// character so that a leading `-1` stays a page reference.
fn parse_token(body: &str, total_pages: u32) -> Option<(u32, u32)> {
    let separator = body
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '-')
        .map(|(i, _)| i);

    match separator {
        Some(i) => {
            let start = page_ref(&body[..i], total_pages)?;
            let end = page_ref(&body[i + 1..], total_pages)?;
            (start <= end).then_some((start, end))
        }
        None => page_ref(body, total_pages).map(|page| (page, page)),
    }
}

fn page_ref(s: &str, total_pages: u32) -> Option<u32> {
    let s = s.trim();
    if s == "-1" {
        return (total_pages > 0).then_some(total_pages);
    }
    s.parse::<u32>().ok().filter(|page| *page > 0)
}
