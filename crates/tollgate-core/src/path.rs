//! Path normalisation and compiled path patterns.
//!
//! Shared by the `path` [`crate::assertion::Assertion`] variant and by
//! [`crate::route::Route`]'s own path matcher — both need the same notion of
//! "does this request path match this pattern," just with different
//! sub-types (`exact` / `prefix` / `regex` / `param`).
//!
//! Segment-splitting and regex compilation keep parameter names
//! pre-extracted at build time so matching never does construction-level
//! work per request, using `:param` syntax plus `*` / `/**` wildcards.

use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;

/// Normalises a request or pattern path per the gateway's path rules:
/// prepend `/` if missing, collapse `.`/`..` segments, and preserve a
/// trailing slash only when the input already had one.
pub fn normalize_path(path: &str) -> String {
    let had_trailing_slash = path.len() > 1 && path.ends_with('/');
    let prefixed = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    let mut collapsed: Vec<&str> = Vec::new();
    for segment in prefixed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                collapsed.pop();
            }
            other => collapsed.push(other),
        }
    }

    let mut result = String::from("/");
    result.push_str(&collapsed.join("/"));
    if had_trailing_slash && result != "/" {
        result.push('/');
    }
    result
}

/// Splits a normalised path into its non-empty segments.
fn segments_of(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Debug, Clone, PartialEq)]
enum PrefixSegment {
    Literal(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
enum ParamSegment {
    Literal(String),
    Param(String),
}

/// A compiled path matcher for one of the four `path` assertion sub-types.
#[derive(Debug, Clone)]
pub enum PathPattern {
    Exact(String),
    Prefix { segments: Vec<PrefixSegmentInternal> },
    Regex(Regex),
    Param { segments: Vec<ParamSegmentInternal> },
}

// Re-exported under stable names so callers don't need to see the private
// segment enums directly.
pub type PrefixSegmentInternal = PrefixSegment;
pub type ParamSegmentInternal = ParamSegment;

impl PathPattern {
    pub fn exact(pattern: &str) -> Self {
        PathPattern::Exact(normalize_path(pattern))
    }

    /// Compiles a `prefix` pattern. A bare trailing `**` segment (written as
    /// `/**` in config) is accepted and documented as "matches any,
    /// possibly empty, tail" — which a prefix match already implies, so it
    /// is kept only for readability/round-tripping, not for extra behavior.
    /// A `**` anywhere else is not a tail terminator: it is a single-segment
    /// wildcard like `*`, so the segments after it still constrain the match.
    pub fn prefix(pattern: &str) -> Result<Self, ConfigError> {
        let normalized = normalize_path(pattern);
        let raw_segments = segments_of(&normalized);
        let mut segments = Vec::new();
        for (i, raw) in raw_segments.iter().enumerate() {
            match *raw {
                "*" => segments.push(PrefixSegment::Wildcard),
                "**" if i == raw_segments.len() - 1 => break, // trailing wildcard: rest of path is free
                "**" => segments.push(PrefixSegment::Wildcard),
                other => segments.push(PrefixSegment::Literal(other.to_string())),
            }
        }
        Ok(PathPattern::Prefix { segments })
    }

    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        let re = Regex::new(pattern).map_err(|e| ConfigError::InvalidPath {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(PathPattern::Regex(re))
    }

    /// Compiles a `param` pattern like `/api/:version/users/:id`.
    pub fn param(pattern: &str) -> Result<Self, ConfigError> {
        let normalized = normalize_path(pattern);
        let mut segments = Vec::new();
        for raw in segments_of(&normalized) {
            if let Some(name) = raw.strip_prefix(':') {
                if name.is_empty() {
                    return Err(ConfigError::InvalidPath {
                        pattern: pattern.to_string(),
                        message: "parameter segment is missing a name".to_string(),
                    });
                }
                segments.push(ParamSegment::Param(name.to_string()));
            } else {
                segments.push(ParamSegment::Literal(raw.to_string()));
            }
        }
        Ok(PathPattern::Param { segments })
    }

    /// Tests `request_path` against this pattern. For `param` patterns that
    /// match, returns the captured bindings; every other pattern or a
    /// non-match returns `None` for the bindings half.
    pub fn matches(&self, request_path: &str) -> (bool, Option<HashMap<String, String>>) {
        let normalized = normalize_path(request_path);
        match self {
            PathPattern::Exact(expected) => (expected == &normalized, None),
            PathPattern::Prefix { segments } => {
                let actual = segments_of(&normalized);
                if actual.len() < segments.len() {
                    return (false, None);
                }
                for (pattern_seg, actual_seg) in segments.iter().zip(actual.iter()) {
                    match pattern_seg {
                        PrefixSegment::Wildcard => continue,
                        PrefixSegment::Literal(lit) => {
                            if lit != actual_seg {
                                return (false, None);
                            }
                        }
                    }
                }
                (true, None)
            }
            PathPattern::Regex(re) => (re.is_match(&normalized), None),
            PathPattern::Param { segments } => {
                let actual = segments_of(&normalized);
                if actual.len() != segments.len() {
                    return (false, None);
                }
                let mut bindings = HashMap::new();
                for (pattern_seg, actual_seg) in segments.iter().zip(actual.iter()) {
                    match pattern_seg {
                        ParamSegment::Literal(lit) => {
                            if lit != actual_seg {
                                return (false, None);
                            }
                        }
                        ParamSegment::Param(name) => {
                            bindings.insert(name.clone(), actual_seg.to_string());
                        }
                    }
                }
                (true, Some(bindings))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_leading_slash_and_collapses_dots() {
        assert_eq!(normalize_path("api/users"), "/api/users");
        assert_eq!(normalize_path("/api/./users"), "/api/users");
        assert_eq!(normalize_path("/api/x/../users"), "/api/users");
        assert_eq!(normalize_path("/api/users/"), "/api/users/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn exact_pattern_matches_only_identical_path() {
        let p = PathPattern::exact("/health");
        assert!(p.matches("/health").0);
        assert!(!p.matches("/health/live").0);
    }

    #[test]
    fn prefix_pattern_allows_any_tail() {
        let p = PathPattern::prefix("/api/users").unwrap();
        assert!(p.matches("/api/users").0);
        assert!(p.matches("/api/users/42").0);
        assert!(!p.matches("/api/other").0);
    }

    #[test]
    fn prefix_pattern_with_single_segment_wildcard() {
        let p = PathPattern::prefix("/api/*/users").unwrap();
        assert!(p.matches("/api/v1/users").0);
        assert!(p.matches("/api/v2/users/42").0);
        assert!(!p.matches("/api/v1/v2/users").0);
    }

    #[test]
    fn prefix_pattern_with_explicit_tail_wildcard() {
        let p = PathPattern::prefix("/api/**").unwrap();
        assert!(p.matches("/api").0);
        assert!(p.matches("/api/anything/nested").0);
    }

    #[test]
    fn prefix_pattern_with_non_tail_double_star_still_constrains_trailing_segments() {
        let p = PathPattern::prefix("/api/**/users").unwrap();
        assert!(p.matches("/api/anything/users").0);
        assert!(p.matches("/api/anything/users/42").0);
        assert!(!p.matches("/api/anything").0);
        assert!(!p.matches("/api/anything/other").0);
    }

    #[test]
    fn regex_pattern_matches_full_path() {
        let p = PathPattern::regex(r"^/api/v\d+/users$").unwrap();
        assert!(p.matches("/api/v2/users").0);
        assert!(!p.matches("/api/v2/users/42").0);
    }

    #[test]
    fn regex_pattern_rejects_invalid_regex_at_construction() {
        assert!(PathPattern::regex("(unclosed").is_err());
    }

    #[test]
    fn param_pattern_captures_bindings() {
        let p = PathPattern::param("/api/:version/users/:id").unwrap();
        let (matched, bindings) = p.matches("/api/v2/users/42");
        assert!(matched);
        let bindings = bindings.unwrap();
        assert_eq!(bindings.get("version"), Some(&"v2".to_string()));
        assert_eq!(bindings.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn param_pattern_requires_equal_segment_count() {
        let p = PathPattern::param("/api/:version/users/:id").unwrap();
        assert!(!p.matches("/api/v2/users").0);
        assert!(!p.matches("/api/v2/users/42/profile").0);
    }

    #[test]
    fn param_pattern_rejects_empty_name() {
        assert!(PathPattern::param("/api/:/users").is_err());
    }
}
