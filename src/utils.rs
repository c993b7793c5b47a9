//! Utility functions for archive entry naming.

/// Maximum length (in characters) of a sanitized name
const MAX_NAME_LEN: usize = 100;

/// Sanitize a display name for use as an archive entry file name.
///
/// Strips characters that are illegal in file names on common platforms,
/// collapses the result to at most 100 characters, and falls back to
/// `"untitled"` when nothing printable remains.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();

    let trimmed = cleaned.trim().trim_end_matches('.');

    let bounded: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    let bounded = bounded.trim_end().to_string();

    if bounded.is_empty() {
        "untitled".to_string()
    } else {
        bounded
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_ordinary_names_through() {
        assert_eq!(
            sanitize_file_name("Artist - Some Song (Live)"),
            "Artist - Some Song (Live)"
        );
    }

    #[test]
    fn strips_path_separators_and_reserved_characters() {
        assert_eq!(
            sanitize_file_name("AC/DC: Back <in> Black?*|\"\\"),
            "ACDC Back in Black"
        );
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(sanitize_file_name("bad\u{0}name\there"), "badnamehere");
    }

    #[test]
    fn truncates_to_bounded_length() {
        let long = "x".repeat(500);
        let sanitized = sanitize_file_name(&long);
        assert_eq!(sanitized.chars().count(), 100);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // Multi-byte characters must not be split mid-codepoint
        let long = "ü".repeat(500);
        let sanitized = sanitize_file_name(&long);
        assert_eq!(sanitized.chars().count(), 100);
        assert!(sanitized.chars().all(|c| c == 'ü'));
    }

    #[test]
    fn empty_or_fully_illegal_input_falls_back() {
        assert_eq!(sanitize_file_name(""), "untitled");
        assert_eq!(sanitize_file_name("???///"), "untitled");
        assert_eq!(sanitize_file_name("   "), "untitled");
    }

    #[test]
    fn trailing_dots_and_spaces_are_removed() {
        assert_eq!(sanitize_file_name("name..."), "name");
        assert_eq!(sanitize_file_name("  name  "), "name");
    }
}
