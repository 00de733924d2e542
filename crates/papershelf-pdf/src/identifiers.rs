/// ASCII case-insensitive substring search. Returns the byte offset of the
/// first match; offsets are valid slice boundaries because the needle is
/// pure ASCII.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Locate a DOI or arXiv identifier in extracted text lines.
///
/// Scans lines in order and keeps the first qualifying candidate:
/// - a case-insensitive `doi` token followed by `:` or a space yields the
///   remainder of the line up to the next whitespace;
/// - a `doi` token followed by a `/` later in the line (URL form like
///   `doi.org/10.xxxx`) yields the text after the slash;
/// - an `arxiv:` token yields the arXiv token up to the next space;
/// - a line beginning with `10.` yields its first whitespace-delimited token.
///
/// A trailing `.` is stripped, and the final candidate must begin with `10.`
/// or `arxiv:` (case-insensitive) or the scan yields `None`.
///
/// The scan is strictly first-match-wins: a spurious early `doi` substring
/// (e.g. inside running text) can pre-empt a later, correct match. That is a
/// known false-positive source kept for compatibility with how existing
/// libraries were tagged.
pub fn find_doi<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    let mut candidate = String::new();

    'scan: for line in lines {
        let line = line.as_ref().trim_end_matches(['\n', '\r']);

        if let Some(pos) = find_ci(line, "doi") {
            let after = &line[pos..];
            if after.len() >= 4 && (after.as_bytes()[3] == b':' || after.as_bytes()[3] == b' ') {
                candidate = line[pos + 4..].trim_start().to_string();
                if candidate.starts_with("10.") {
                    break 'scan;
                }
            } else if let Some(slash) = line[pos..].find('/') {
                candidate = line[pos + slash + 1..].to_string();
                if candidate.starts_with("10.") {
                    break 'scan;
                }
            }
        }

        if let Some(pos) = find_ci(line, "arxiv:") {
            let rest = &line[pos..];
            candidate = match rest.find(' ') {
                Some(end) => rest[..end].to_string(),
                None => rest.to_string(),
            };
            break 'scan;
        }

        if line.starts_with("10.") {
            candidate = match line.find(' ') {
                Some(end) => line[..end].to_string(),
                None => line.to_string(),
            };
            break 'scan;
        }
    }

    // Trailing cleanup: cut at whitespace and closing brackets, drop a final dot.
    if let Some(ws) = candidate.find(' ') {
        candidate.truncate(ws);
    }
    if let Some(br) = candidate.find(']') {
        candidate.truncate(br);
    }
    if candidate.ends_with('.') {
        candidate.pop();
    }

    let lower = candidate.to_ascii_lowercase();
    if lower.starts_with("10.") || lower.starts_with("arxiv:") {
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_doi_colon_marker() {
        let text = lines(&["Text line", "DOI: 10.1234/abcd", "more"]);
        assert_eq!(find_doi(&text), Some("10.1234/abcd".into()));
    }

    #[test]
    fn test_find_doi_space_marker() {
        let text = lines(&["doi 10.1103/PhysRevE.99.042605"]);
        assert_eq!(find_doi(&text), Some("10.1103/PhysRevE.99.042605".into()));
    }

    #[test]
    fn test_find_doi_url_form() {
        let text = lines(&["available at doi.org/10.1234/abcd"]);
        assert_eq!(find_doi(&text), Some("10.1234/abcd".into()));
    }

    #[test]
    fn test_find_doi_arxiv() {
        let text = lines(&["arXiv:1234.5678 extra words"]);
        assert_eq!(find_doi(&text), Some("arXiv:1234.5678".into()));
    }

    #[test]
    fn test_find_doi_arxiv_end_of_line() {
        let text = lines(&["preprint arXiv:1234.5678"]);
        assert_eq!(find_doi(&text), Some("arXiv:1234.5678".into()));
    }

    #[test]
    fn test_find_doi_bare_prefix_line() {
        let text = lines(&["10.1021/acsnano.9b04567 published online"]);
        assert_eq!(find_doi(&text), Some("10.1021/acsnano.9b04567".into()));
    }

    #[test]
    fn test_find_doi_trailing_dot_stripped() {
        let text = lines(&["DOI: 10.1234/abcd."]);
        assert_eq!(find_doi(&text), Some("10.1234/abcd".into()));
    }

    #[test]
    fn test_find_doi_none() {
        let text = lines(&["just prose", "nothing here"]);
        assert_eq!(find_doi(&text), None);
    }

    #[test]
    fn test_find_doi_invalid_candidate_rejected() {
        // A doi marker whose remainder never starts with 10. must not surface.
        let text = lines(&["doi: pending assignment"]);
        assert_eq!(find_doi(&text), None);
    }

    #[test]
    fn test_find_doi_first_match_wins() {
        // Later, more specific matches never override an earlier qualifying one.
        let text = lines(&["DOI: 10.1/first", "DOI: 10.2/second"]);
        assert_eq!(find_doi(&text), Some("10.1/first".into()));
    }

    #[test]
    fn test_find_doi_crlf_trimmed() {
        let text = lines(&["DOI: 10.1234/abcd\r\n"]);
        assert_eq!(find_doi(&text), Some("10.1234/abcd".into()));
    }
}
