//! Case-mapping extension functions.

/// Locale-independent uppercase.
pub fn to_upper(s: &str) -> String {
    s.to_uppercase()
}

/// Locale-independent lowercase.
pub fn to_lower(s: &str) -> String {
    s.to_lowercase()
}

/// English title case: the first letter of each whitespace-delimited word
/// is uppercased, the rest lowercased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_upper() {
        assert_eq!(to_upper("hello"), "HELLO");
        assert_eq!(to_upper("Grüße"), "GRÜSSE");
    }

    #[test]
    fn test_to_lower() {
        assert_eq!(to_lower("HELLO"), "hello");
    }

    #[test]
    fn test_title_case_words() {
        assert_eq!(title_case("hello"), "Hello");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("foo bar qux baz"), "Foo Bar Qux Baz");
        assert_eq!(title_case("ALL CAPS"), "All Caps");
    }

    #[test]
    fn test_title_case_preserves_whitespace() {
        assert_eq!(title_case("a  b"), "A  B");
        assert_eq!(title_case(" leading"), " Leading");
    }
}
