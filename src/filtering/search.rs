//! Contains-matching helpers shared by the SQL renderer and the in-memory evaluator.

/// Escape LIKE wildcards so user input only ever matches literally.
/// Escapes: % (match any) and _ (match single char)
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\") // Escape backslash first
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// `%needle%` with the needle's own wildcards escaped.
#[must_use]
pub fn contains_pattern(needle: &str) -> String {
    format!("%{}%", escape_like_wildcards(needle))
}

/// Case-insensitive substring test, the in-memory counterpart of `ILIKE '%needle%'`.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_escaping() {
        assert_eq!(escape_like_wildcards("test"), "test");
        assert_eq!(escape_like_wildcards("test%"), "test\\%");
        assert_eq!(escape_like_wildcards("test_value"), "test\\_value");
        assert_eq!(escape_like_wildcards("%_"), "\\%\\_");
        assert_eq!(escape_like_wildcards("\\"), "\\\\");
        assert_eq!(escape_like_wildcards("\\%"), "\\\\\\%");
    }

    #[test]
    fn test_contains_pattern() {
        assert_eq!(contains_pattern("foo"), "%foo%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Hello World", "WORLD"));
        assert!(!contains_ignore_case("Hello", "bye"));
    }
}
