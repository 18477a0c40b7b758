//! Text cleanup before synthesis.

use regex::Regex;

/// Strips URLs and normalizes whitespace.
pub struct TextSanitizer {
    url: Regex,
    whitespace: Regex,
    /// Japanese synthesis drops whitespace entirely instead of collapsing it.
    drop_whitespace: bool,
}

impl TextSanitizer {
    pub fn new(language_code: &str) -> Self {
        Self {
            url: Regex::new(r"https?://\S+").unwrap(),
            whitespace: Regex::new(r"[\s\u{3000}]+").unwrap(),
            drop_whitespace: language_code.to_ascii_lowercase().starts_with("ja"),
        }
    }

    pub fn clean(&self, text: &str) -> String {
        let without_urls = self.url.replace_all(text, "");
        let separator = if self.drop_whitespace { "" } else { " " };
        self.whitespace
            .replace_all(&without_urls, separator)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_urls_and_collapses_whitespace() {
        let sanitizer = TextSanitizer::new("en-US");
        assert_eq!(
            sanitizer.clean("check https://x.co/y   hello\u{3000}world"),
            "check hello world"
        );
    }

    #[test]
    fn test_japanese_drops_whitespace() {
        let sanitizer = TextSanitizer::new("ja-JP");
        assert_eq!(
            sanitizer.clean("check https://x.co/y   hello\u{3000}world"),
            "checkhelloworld"
        );
    }

    #[test]
    fn test_trims_and_handles_newlines() {
        let sanitizer = TextSanitizer::new("en-US");
        assert_eq!(sanitizer.clean("\n  line one\n\nline two \t"), "line one line two");
    }

    #[test]
    fn test_http_and_multiple_urls() {
        let sanitizer = TextSanitizer::new("en-GB");
        assert_eq!(
            sanitizer.clean("a http://one.example b https://two.example/path?q=1 c"),
            "a b c"
        );
    }

    #[test]
    fn test_only_url_is_empty() {
        let sanitizer = TextSanitizer::new("en-US");
        assert_eq!(sanitizer.clean("  https://example.com/only  "), "");
    }
}
