//! String comparison primitives shared by every assertion variant.
//!
//! Kept as a single pure function so the evaluation rules in one place:
//! every [`crate::assertion::Assertion`] variant resolves its operand and
//! then delegates the actual decision here.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Comparison operator accepted by [`compare`].
///
/// Input aliases (`eq`, `==`, `prefix`, `suffix`, `regex`, `match`, and
/// underscore/hyphen variants) are normalized to one of these at config
/// build time — see `Operator::parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Equal,
    NotEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    Exists,
    NotExists,
}

impl Operator {
    /// Parses an operator, accepting the aliases documented in the gateway's
    /// external config surface.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "equal" | "eq" | "==" => Some(Operator::Equal),
            "not-equal" | "ne" | "!=" => Some(Operator::NotEqual),
            "contains" => Some(Operator::Contains),
            "not-contains" => Some(Operator::NotContains),
            "starts-with" | "prefix" => Some(Operator::StartsWith),
            "ends-with" | "suffix" => Some(Operator::EndsWith),
            "matches" | "regex" | "match" => Some(Operator::Matches),
            "exists" => Some(Operator::Exists),
            "not-exists" => Some(Operator::NotExists),
            _ => None,
        }
    }
}

/// Compares `actual` against `expected` under `operator`.
///
/// `matches` treats `expected` as a regular expression; a compilation
/// failure is swallowed and yields `false` rather than propagating an error
/// — a bad pattern is treated as a non-match, not a fault.
///
/// `exists`/`not-exists` ignore `expected` entirely and test whether
/// `actual` is empty.
pub fn compare(actual: &str, expected: &str, operator: Operator, case_sensitive: bool) -> bool {
    match operator {
        Operator::Exists => !actual.is_empty(),
        Operator::NotExists => actual.is_empty(),
        _ => {
            let (a, e) = if case_sensitive {
                (actual.to_string(), expected.to_string())
            } else {
                (actual.to_lowercase(), expected.to_lowercase())
            };
            match operator {
                Operator::Equal => a == e,
                Operator::NotEqual => a != e,
                Operator::Contains => a.contains(&e),
                Operator::NotContains => !a.contains(&e),
                Operator::StartsWith => a.starts_with(&e),
                Operator::EndsWith => a.ends_with(&e),
                Operator::Matches => Regex::new(&e).map(|re| re.is_match(&a)).unwrap_or(false),
                Operator::Exists | Operator::NotExists => unreachable!(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_operator_aliases() {
        assert_eq!(Operator::parse("eq"), Some(Operator::Equal));
        assert_eq!(Operator::parse("=="), Some(Operator::Equal));
        assert_eq!(Operator::parse("ne"), Some(Operator::NotEqual));
        assert_eq!(Operator::parse("!="), Some(Operator::NotEqual));
        assert_eq!(Operator::parse("prefix"), Some(Operator::StartsWith));
        assert_eq!(Operator::parse("suffix"), Some(Operator::EndsWith));
        assert_eq!(Operator::parse("regex"), Some(Operator::Matches));
        assert_eq!(Operator::parse("not_contains"), Some(Operator::NotContains));
        assert_eq!(Operator::parse("bogus"), None);
    }

    #[test]
    fn equal_respects_case_sensitivity() {
        assert!(compare("Api", "api", Operator::Equal, false));
        assert!(!compare("Api", "api", Operator::Equal, true));
    }

    #[test]
    fn contains_and_affixes() {
        assert!(compare("hello world", "world", Operator::Contains, true));
        assert!(!compare("hello world", "xyz", Operator::Contains, true));
        assert!(compare("hello world", "hello", Operator::StartsWith, true));
        assert!(compare("hello world", "world", Operator::EndsWith, true));
    }

    #[test]
    fn matches_uses_substring_regex_semantics() {
        assert!(compare("user-42", r"^user-\d+$", Operator::Matches, true));
        assert!(compare("prefix-user-42-suffix", r"user-\d+", Operator::Matches, true));
        assert!(!compare("user-abc", r"^user-\d+$", Operator::Matches, true));
    }

    #[test]
    fn matches_with_bad_regex_is_false_not_error() {
        assert!(!compare("anything", "(unclosed", Operator::Matches, true));
    }

    #[test]
    fn exists_ignores_expected() {
        assert!(compare("value", "", Operator::Exists, true));
        assert!(!compare("", "whatever", Operator::Exists, true));
        assert!(compare("", "", Operator::NotExists, true));
        assert!(!compare("value", "", Operator::NotExists, true));
    }
}
