//! HTML escaping for rendered values.

use std::borrow::Cow;

/// Escape HTML special characters: & < > " '
pub fn escape(input: &str) -> String {
    escape_cow(input).into_owned()
}

/// Like [`escape`], borrowing the input when nothing needs replacing.
pub fn escape_cow(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markup() {
        assert_eq!(
            escape("<script>alert('xss')</script>"),
            "&lt;script&gt;alert(&#39;xss&#39;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_escape_attribute_characters() {
        assert_eq!(escape("a & \"b\""), "a &amp; &quot;b&quot;");
    }

    #[test]
    fn test_untouched_input_is_borrowed() {
        assert!(matches!(escape_cow("Hello, world!"), Cow::Borrowed(_)));
        assert!(matches!(escape_cow("1 < 2"), Cow::Owned(_)));
    }
}
