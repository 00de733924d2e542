use std::collections::BTreeSet;

use crate::text::clean_text;

/// Marker substrings that introduce a keyword block, in priority order.
/// Matching is case-insensitive, so these cover `Keywords:`, `KEY WORDS`, etc.
pub const DEFAULT_MARKERS: &[&str] = &[
    "keywords--",
    "keywords-",
    "keywords:",
    "keywords.",
    "key words",
    "keywords",
];

/// Tokens that terminate a keyword span on the same line.
pub const DEFAULT_END_MARKERS: &[&str] = &["PACS", "DOI"];

/// Candidate separators, in priority order. The separator with the earliest
/// occurrence inside the bounded span wins; priority order breaks ties.
pub const DEFAULT_SEPARATORS: &[&str] = &[",", ";", ".", "/"];

/// Locate a keyword block in extracted text lines.
///
/// Scans lines in order for the first occurrence of any marker (first marker
/// line wins), bounds the span at the earliest end marker on that line, picks
/// the separator producing the earliest split inside the span, then splits,
/// trims, and returns the resulting set with empty tokens removed. Lines are
/// passed through [`clean_text`] before matching, so stray non-ASCII noise
/// from PDF extraction does not hide a marker.
///
/// Returns an empty set if no marker line exists.
pub fn find_keywords<S: AsRef<str>>(
    lines: &[S],
    markers: &[&str],
    end_markers: &[&str],
    separators: &[&str],
) -> BTreeSet<String> {
    let mut found: Option<(String, usize)> = None;

    'scan: for line in lines {
        let cleaned = clean_text(line.as_ref());
        let lower = cleaned.to_lowercase();
        for marker in markers {
            if let Some(pos) = lower.find(&marker.to_lowercase()) {
                found = Some((cleaned, pos + marker.len()));
                break 'scan;
            }
        }
    }

    let Some((line, start)) = found else {
        return BTreeSet::new();
    };

    let end = end_markers
        .iter()
        .filter_map(|m| line[start..].find(m).map(|i| start + i))
        .min()
        .unwrap_or(line.len());
    let span = &line[start..end];

    let mut sep = " ";
    let mut sep_pos = usize::MAX;
    for s in separators {
        if let Some(pos) = span.find(s) {
            if pos < sep_pos {
                sep_pos = pos;
                sep = s;
            }
        }
    }

    span.split(sep)
        .map(|t| t.trim().trim_end_matches('.').trim_end())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
