/// Punctuation allowed to survive [`clean_text`], alongside ASCII letters and
/// digits.
const PERMITTED_PUNCT: &str = "_- /.,():{}";

/// Strip non-bibliographic characters from a string.
///
/// Retains only ASCII letters, digits, and the fixed punctuation allowlist.
/// Everything else (control characters, non-ASCII, quotes, brackets) is
/// dropped, which keeps tag values and filename components portable.
pub fn clean_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || PERMITTED_PUNCT.contains(*c))
        .collect()
}
