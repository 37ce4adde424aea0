//! Utility functions and helpers

use std::path::Path;

/// Validate that a file has an allowed extension
#[cfg_attr(not(feature = "web"), allow(dead_code))]
pub(crate) fn validate_file_extension<S: AsRef<str>>(filename: &str, allowed_extensions: &[S]) -> bool {
    if let Some(ext) = Path::new(filename).extension() {
        if let Some(ext_str) = ext.to_str() {
            return allowed_extensions
                .iter()
                .any(|e| e.as_ref().eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_extension() {
        let allowed = vec!["jpg", "jpeg", "png"];
        assert!(validate_file_extension("test.jpg", &allowed));
        assert!(validate_file_extension("test.JPEG", &allowed));
        assert!(!validate_file_extension("test.txt", &allowed));
        assert!(!validate_file_extension("test", &allowed));

        let owned = vec![String::from("webp")];
        assert!(validate_file_extension("look.webp", &owned));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc…");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo…");
    }
}
