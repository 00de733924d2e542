//! Normalized string similarity used by every reconciliation decision.

use unicode_normalization::UnicodeNormalization;

/// Acceptance gate for title-search candidates: a candidate is the same work
/// only when its similarity is strictly greater than this.
pub const TITLE_ACCEPT: f64 = 0.9;

/// Default threshold for generic field matching in the reconciler and the
/// sidecar matcher.
pub const DEFAULT_FIELD_THRESHOLD: f64 = 0.6;

/// Edit-distance ratio in `[0, 1]`; 1.0 means identical after case-folding.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

/// Whether two values match above a caller-supplied threshold.
pub fn similar(a: &str, b: &str, threshold: f64) -> bool {
    ratio(a, b) > threshold
}

/// Aggressive fold for match keys: NFKD decomposition, ASCII-only,
/// lowercase alphanumerics. Used for author containment checks and cache
/// keys so accent and spacing variants collapse to the same key.
pub fn match_key(s: &str) -> String {
    s.nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_identical() {
        assert_eq!(ratio("Colloidal Clusters", "Colloidal Clusters"), 1.0);
    }

    #[test]
    fn test_ratio_case_folded() {
        assert_eq!(ratio("TITLE", "title"), 1.0);
    }

    #[test]
    fn test_ratio_disjoint() {
        assert!(ratio("abc", "xyz") < 0.1);
    }

    #[test]
    fn test_ratio_minor_difference() {
        assert!(ratio("Colloidal Clusters", "Colloidal Cluster") > 0.9);
    }

    #[test]
    fn test_similar_threshold_is_exclusive() {
        assert!(!similar("abcdefghij", "abcdefghij", 1.0));
        assert!(similar("abcdefghij", "abcdefghij", 0.99));
    }

    #[test]
    fn test_match_key_folds_accents() {
        assert_eq!(match_key("Rényi, A."), "renyia");
        assert_eq!(match_key("van der Waals"), "vanderwaals");
    }

    #[test]
    fn test_match_key_drops_non_ascii() {
        assert_eq!(match_key("α-synuclein"), "synuclein");
    }
}
