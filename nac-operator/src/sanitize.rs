//! Label-value sanitization (spec.md §9 "Label-value sanitization").
//!
//! UUIDs minted by [`crate::naming`] are already valid label values. Names
//! of engine objects referenced in child queries — an engine `Backup`'s
//! name is always a UUID, but this helper exists for any place a
//! user-influenced string ends up in a label selector — are not guaranteed
//! to be, and must be sanitized to the Kubernetes label-value grammar before
//! use: at most 63 characters, alphanumeric/`-`/`_`/`.`, starting and
//! ending with an alphanumeric.

const MAX_LABEL_VALUE_LEN: usize = 63;

pub fn sanitize_label_value(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    out.truncate(MAX_LABEL_VALUE_LEN);

    let trim_matches: &[char] = &['-', '_', '.'];
    let trimmed = out.trim_matches(trim_matches);
    if trimmed.is_empty() {
        "x".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_valid_values_untouched() {
        assert_eq!(sanitize_label_value("abc-123"), "abc-123");
    }

    #[test]
    fn replaces_invalid_characters() {
        assert_eq!(sanitize_label_value("my backup/v1"), "my-backup-v1");
    }

    #[test]
    fn trims_leading_and_trailing_separators() {
        assert_eq!(sanitize_label_value("-leading"), "leading");
        assert_eq!(sanitize_label_value("trailing-"), "trailing");
        assert_eq!(sanitize_label_value("...dots..."), "dots");
    }

    #[test]
    fn truncates_to_max_length() {
        let long = "a".repeat(200);
        let sanitized = sanitize_label_value(&long);
        assert_eq!(sanitized.len(), MAX_LABEL_VALUE_LEN);
    }

    #[test]
    fn falls_back_to_placeholder_when_all_characters_are_separators() {
        assert_eq!(sanitize_label_value("---"), "x");
        assert_eq!(sanitize_label_value(""), "x");
    }
}
