//! Search patterns and the normalizer that turns loose pattern values into
//! an ordered list of atomic patterns.

use regex::Regex;
use serde::Deserialize;

use crate::types::{RegistryError, RegistryResult};

/// One atomic pattern tested by a predicate.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawPattern")]
pub enum Pattern {
    /// Matches when the haystack contains this text.
    Text(String),
    /// Matches when the expression finds a match anywhere in the haystack.
    Regex(Regex),
}

impl Pattern {
    pub fn text(text: impl Into<String>) -> Self {
        Pattern::Text(text.into())
    }

    /// Compile a regular-expression pattern.
    pub fn regex(expr: &str) -> RegistryResult<Self> {
        Ok(Pattern::Regex(Regex::new(expr)?))
    }

    pub fn matches(&self, haystack: &str) -> bool {
        match self {
            Pattern::Text(text) => haystack.contains(text.as_str()),
            Pattern::Regex(re) => re.is_match(haystack),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Text(text) => text,
            Pattern::Regex(re) => re.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Pattern::Regex(_))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_regex() == other.is_regex() && self.as_str() == other.as_str()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Text(text) => write!(f, "{text:?}"),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Pattern::Text(text.to_string())
    }
}

impl From<String> for Pattern {
    fn from(text: String) -> Self {
        Pattern::Text(text)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

/// Wire shape of a pattern: a plain string or `{"regex": "..."}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPattern {
    Text(String),
    Regex { regex: String },
}

impl TryFrom<RawPattern> for Pattern {
    type Error = RegistryError;

    fn try_from(raw: RawPattern) -> RegistryResult<Self> {
        match raw {
            RawPattern::Text(text) => Ok(Pattern::Text(text)),
            RawPattern::Regex { regex } => Pattern::regex(&regex),
        }
    }
}

/// A loosely-shaped pattern value as a caller writes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawPatternValue")]
pub enum PatternValue {
    /// A single string; commas separate several patterns.
    Text(String),
    Regex(Regex),
    /// Taken as-is, element order preserved.
    List(Vec<Pattern>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPatternValue {
    List(Vec<Pattern>),
    Single(Pattern),
}

impl From<RawPatternValue> for PatternValue {
    fn from(raw: RawPatternValue) -> Self {
        match raw {
            RawPatternValue::List(list) => PatternValue::List(list),
            RawPatternValue::Single(Pattern::Text(text)) => PatternValue::Text(text),
            RawPatternValue::Single(Pattern::Regex(re)) => PatternValue::Regex(re),
        }
    }
}

impl From<&str> for PatternValue {
    fn from(text: &str) -> Self {
        PatternValue::Text(text.to_string())
    }
}

impl From<String> for PatternValue {
    fn from(text: String) -> Self {
        PatternValue::Text(text)
    }
}

impl From<Regex> for PatternValue {
    fn from(re: Regex) -> Self {
        PatternValue::Regex(re)
    }
}

impl From<Pattern> for PatternValue {
    fn from(pattern: Pattern) -> Self {
        PatternValue::List(vec![pattern])
    }
}

impl<P: Into<Pattern>> From<Vec<P>> for PatternValue {
    fn from(items: Vec<P>) -> Self {
        PatternValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<P: Into<Pattern>, const N: usize> From<[P; N]> for PatternValue {
    fn from(items: [P; N]) -> Self {
        PatternValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Normalize a pattern value into an ordered list of atomic patterns.
///
/// A comma-joined string is split left to right and each segment trimmed;
/// empty segments are dropped. Regexes and lists pass through unchanged.
pub fn normalize(value: PatternValue) -> Vec<Pattern> {
    match value {
        PatternValue::Text(text) if text.contains(',') => text
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(Pattern::from)
            .collect(),
        PatternValue::Text(text) => vec![Pattern::Text(text)],
        PatternValue::Regex(re) => vec![Pattern::Regex(re)],
        PatternValue::List(list) => list,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_string() {
        assert_eq!(normalize("script1".into()), vec![Pattern::text("script1")]);
    }

    #[test]
    fn test_comma_separated_string() {
        let patterns = normalize("script1, script2 ,script3".into());
        assert_eq!(
            patterns,
            vec![
                Pattern::text("script1"),
                Pattern::text("script2"),
                Pattern::text("script3"),
            ]
        );
    }

    #[test]
    fn test_comma_string_drops_empty_segments() {
        let patterns = normalize("script1,, ,script2,".into());
        assert_eq!(patterns, vec![Pattern::text("script1"), Pattern::text("script2")]);
    }

    #[test]
    fn test_regex_passes_through() {
        let re = Regex::new(r".*script\d\.js").unwrap();
        let patterns = normalize(re.into());
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].is_regex());
        assert_eq!(patterns[0].as_str(), r".*script\d\.js");
    }

    #[test]
    fn test_list_is_not_split() {
        let patterns = normalize(vec!["a,b", "c"].into());
        assert_eq!(patterns, vec![Pattern::text("a,b"), Pattern::text("c")]);
    }

    #[test]
    fn test_text_and_regex_matching() {
        assert!(Pattern::text("gtm.start").matches("w[l].push({'gtm.start': 1})"));
        assert!(!Pattern::text("gtm.start").matches("alert('hi')"));

        let re = Pattern::regex(r"alert\('hi'").unwrap();
        assert!(re.matches("alert('hi')"));
        assert!(!re.matches("alert('bye')"));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            Pattern::regex("(unclosed"),
            Err(RegistryError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_deserialize_shapes() {
        let text: PatternValue = serde_json::from_str(r#""s1, s2""#).unwrap();
        assert_eq!(normalize(text).len(), 2);

        let regex: PatternValue = serde_json::from_str(r#"{"regex": "s\\d+"}"#).unwrap();
        assert!(matches!(regex, PatternValue::Regex(_)));

        let list: PatternValue =
            serde_json::from_str(r#"["s1", {"regex": "s\\d+"}]"#).unwrap();
        let patterns = normalize(list);
        assert_eq!(patterns.len(), 2);
        assert!(!patterns[0].is_regex());
        assert!(patterns[1].is_regex());
    }

    #[test]
    fn test_deserialize_bad_regex_fails() {
        let result: Result<PatternValue, _> = serde_json::from_str(r#"{"regex": "("}"#);
        assert!(result.is_err());
    }
}
