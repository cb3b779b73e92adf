//! Separators used when text from several pages or annotations is joined,
//! and the patterns text searches match against.

use regex::Regex;

use crate::error::Result;

/// Between pages (form feed).
pub const PAGE_SEPARATOR: &str = "\x0c";

/// Between annotation texts (vertical tab).
pub const ANNOTATION_SEPARATOR: &str = "\x0b";

/// Joins the non-empty parts with `sep`.
pub(crate) fn join_nonempty<I>(sep: &str, parts: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    parts
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// What a text search looks for: a plain substring or a regular expression.
#[derive(Debug, Clone)]
pub enum TextPattern {
    Literal(String),
    Regex(Regex),
}

impl TextPattern {
    /// Compiles `pattern` as a regular expression.
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(TextPattern::Regex(Regex::new(pattern)?))
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            TextPattern::Literal(needle) => text.contains(needle.as_str()),
            TextPattern::Regex(re) => re.is_match(text),
        }
    }
}

impl From<&str> for TextPattern {
    fn from(needle: &str) -> Self {
        TextPattern::Literal(needle.to_string())
    }
}

impl From<String> for TextPattern {
    fn from(needle: String) -> Self {
        TextPattern::Literal(needle)
    }
}

impl From<Regex> for TextPattern {
    fn from(re: Regex) -> Self {
        TextPattern::Regex(re)
    }
}

impl From<&Regex> for TextPattern {
    fn from(re: &Regex) -> Self {
        TextPattern::Regex(re.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_missing_parts_are_skipped() {
        let joined = join_nonempty(
            ANNOTATION_SEPARATOR,
            vec![Some("a".to_string()), None, Some(String::new()), Some("b".to_string())],
        );
        assert_eq!(joined, "a\x0bb");
        assert_eq!(join_nonempty(PAGE_SEPARATOR, Vec::new()), "");
    }

    #[test]
    fn literal_patterns_match_substrings() {
        let pattern = TextPattern::from("a.c");
        assert!(pattern.is_match("xa.cx"));
        assert!(!pattern.is_match("abc"));
    }

    #[test]
    fn regex_patterns_search_anywhere() {
        let pattern = TextPattern::regex(r"inv-\d{3}").unwrap();
        assert!(pattern.is_match("see INV-1 and inv-042"));
        assert!(!pattern.is_match("inv-4"));
        assert!(matches!(
            TextPattern::regex("(unclosed"),
            Err(crate::BinderError::Pattern(_))
        ));
    }
}
