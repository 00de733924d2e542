/// Which part of the first author's name to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePart {
    Family,
    Given,
    /// `"given, family"` combined output.
    GivenFamily,
}

/// Extract a name component from a formatted author list.
///
/// Splits the field on the literal `" and "` separator and takes the first
/// author. A name containing a comma is read as `Family, Given`; otherwise
/// the last space-delimited token is the family name and everything before
/// it the given name.
pub fn family_name(authors: &str, part: NamePart) -> String {
    let first = authors.split(" and ").next().unwrap_or("").trim();

    let (given, family) = if let Some((fam, giv)) = first.split_once(',') {
        (giv.trim().to_string(), fam.trim().to_string())
    } else {
        match first.rsplit_once(' ') {
            Some((giv, fam)) => (giv.trim().to_string(), fam.trim().to_string()),
            None => (String::new(), first.to_string()),
        }
    };

    match part {
        NamePart::Family => family,
        NamePart::Given => given,
        NamePart::GivenFamily => format!("{}, {}", given, family),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_comma_form() {
        assert_eq!(
            family_name("Smith, John and Doe, Jane", NamePart::Family),
            "Smith"
        );
    }

    #[test]
    fn test_family_space_form() {
        assert_eq!(
            family_name("John Smith and Jane Doe", NamePart::Family),
            "Smith"
        );
    }

    #[test]
    fn test_given_comma_form() {
        assert_eq!(
            family_name("Smith, John and Doe, Jane", NamePart::Given),
            "John"
        );
    }

    #[test]
    fn test_given_space_form() {
        assert_eq!(
            family_name("Jean-Luc Marie Picard", NamePart::Given),
            "Jean-Luc Marie"
        );
    }

    #[test]
    fn test_given_family_combined() {
        assert_eq!(
            family_name("John Smith", NamePart::GivenFamily),
            "John, Smith"
        );
    }

    #[test]
    fn test_single_token_name() {
        assert_eq!(family_name("Aristotle", NamePart::Family), "Aristotle");
        assert_eq!(family_name("Aristotle", NamePart::Given), "");
    }

    #[test]
    fn test_empty_field() {
        assert_eq!(family_name("", NamePart::Family), "");
    }
}
