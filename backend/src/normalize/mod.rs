//! Canonicalization of raw cell values before comparison.
//!
//! These are deliberately small: phones are compared as digit strings only,
//! names and emails case- and whitespace-insensitively. No phonetic or
//! distance-based folding happens here.

/// Strip every non-digit character. `"(555) 123-4567"` becomes `"5551234567"`.
///
/// No length or country-code handling. An empty result is not a signal.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Trim and lower-case.
pub fn normalize_text(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// First and last whitespace-separated token of a name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitName {
    pub first: String,
    pub last: String,
}

/// Split a full name on whitespace.
///
/// `first` is the first token; `last` is the last token when there is more
/// than one, else empty. Middle names and suffixes are dropped.
pub fn split_full_name(raw: &str) -> SplitName {
    let mut tokens = raw.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_string();
    let last = tokens.last().unwrap_or_default().to_string();
    SplitName { first, last }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_digits_only() {
        assert_eq!(normalize_phone("(555) 123-4567"), "5551234567");
        assert_eq!(normalize_phone("+1 555.123.4567 ext"), "15551234567");
        assert_eq!(normalize_phone("n/a"), "");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_text_trim_lower() {
        assert_eq!(normalize_text("  Ada@Example.COM "), "ada@example.com");
        assert_eq!(normalize_text("\tAda Lovelace\n"), "ada lovelace");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_split_two_tokens() {
        let name = split_full_name("Ada Lovelace");
        assert_eq!(name.first, "Ada");
        assert_eq!(name.last, "Lovelace");
    }

    #[test]
    fn test_split_middle_name_dropped() {
        let name = split_full_name("  Augusta  Ada   King ");
        assert_eq!(name.first, "Augusta");
        assert_eq!(name.last, "King");
    }

    #[test]
    fn test_split_single_token() {
        let name = split_full_name("Acme");
        assert_eq!(name.first, "Acme");
        assert_eq!(name.last, "");
        assert_eq!(split_full_name(""), SplitName::default());
    }
}
