//! Assertions (component C2): single predicates over one request attribute.
//!
//! [`AssertionConfig`] is the declarative wire shape; [`build`] turns it into
//! an immutable [`Assertion`], resolving the operator and compiling any
//! regex once so `evaluate` never does construction-time work per request.

use crate::comparator::{compare, Operator};
use crate::context::Context;
use crate::error::{ConfigError, EvaluationError};
use crate::path::PathPattern;
use serde::{Deserialize, Serialize};

/// Declarative config for one assertion, as it appears in a route's
/// `assertionGroup.assertions` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub name: Option<String>,
    pub value: Option<String>,
    pub operator: String,
    #[serde(default, rename = "case_sensitive")]
    pub case_sensitive: bool,
    pub description: Option<String>,
    /// For `path`-type assertions: the sub-type selector
    /// (`exact | prefix | regex | param`). Unused by every other type.
    pub pattern: Option<String>,
    #[serde(default, alias = "extra")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
enum Kind {
    Header { name: String, operator: Operator, expected: String },
    QueryParam { name: String, operator: Operator, expected: String },
    BodyContent { operator: Operator, expected: String },
    Method { expected: String },
    Cookie { name: String, operator: Operator, expected: String },
    Ip { operator: Operator, expected: String },
    Path { pattern: PathPattern },
}

/// A built, immutable assertion. `evaluate` is the only way to run it; it
/// never mutates itself, only the [`Context`] it's given (path captures).
#[derive(Debug, Clone)]
pub struct Assertion {
    pub id: String,
    case_sensitive: bool,
    kind: Kind,
}

fn require(config: &AssertionConfig, field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| ConfigError::MissingField {
        id: config.id.clone(),
        field: field.to_string(),
    })
}

fn parse_operator(config: &AssertionConfig) -> Result<Operator, ConfigError> {
    Operator::parse(&config.operator).ok_or_else(|| ConfigError::UnknownOperator {
        id: config.id.clone(),
        operator: config.operator.clone(),
    })
}

/// Builds a runtime [`Assertion`] from its declarative config.
pub fn build(config: &AssertionConfig) -> Result<Assertion, ConfigError> {
    let expected = config.value.clone().unwrap_or_default();

    let kind = match config.ty.as_str() {
        "header" => Kind::Header {
            name: require(config, "name", config.name.clone())?,
            operator: parse_operator(config)?,
            expected,
        },
        "query-param" => Kind::QueryParam {
            name: require(config, "name", config.name.clone())?,
            operator: parse_operator(config)?,
            expected,
        },
        "body-content" => Kind::BodyContent {
            operator: parse_operator(config)?,
            expected,
        },
        "method" => Kind::Method { expected },
        "cookie" => Kind::Cookie {
            name: require(config, "name", config.name.clone())?,
            operator: parse_operator(config)?,
            expected,
        },
        "ip" => Kind::Ip {
            operator: parse_operator(config)?,
            expected,
        },
        "path" => {
            let sub_type = require(config, "pattern", config.pattern.clone())?;
            let value = require(config, "value", config.value.clone())?;
            let pattern = match sub_type.as_str() {
                "exact" => PathPattern::exact(&value),
                "prefix" => PathPattern::prefix(&value)?,
                "regex" => PathPattern::regex(&value)?,
                "param" => PathPattern::param(&value)?,
                other => {
                    return Err(ConfigError::UnknownAssertionType {
                        id: config.id.clone(),
                        ty: format!("path:{other}"),
                    })
                }
            };
            Kind::Path { pattern }
        }
        other => {
            return Err(ConfigError::UnknownAssertionType {
                id: config.id.clone(),
                ty: other.to_string(),
            })
        }
    };

    Ok(Assertion {
        id: config.id.clone(),
        case_sensitive: config.case_sensitive,
        kind,
    })
}

impl Assertion {
    /// Evaluates this assertion against `ctx`. Path-type matches that
    /// succeed write their captured bindings into `ctx`'s `path_params`
    /// attribute.
    pub fn evaluate(&self, ctx: &mut Context) -> Result<bool, EvaluationError> {
        let result = match &self.kind {
            Kind::Header { name, operator, expected } => {
                compare(ctx.header(name), expected, *operator, self.case_sensitive)
            }
            Kind::QueryParam { name, operator, expected } => {
                let actual = ctx.query_param(name).unwrap_or("");
                if ctx.query_param(name).is_none() {
                    matches!(operator, Operator::NotExists)
                } else {
                    compare(actual, expected, *operator, self.case_sensitive)
                }
            }
            Kind::BodyContent { operator, expected } => {
                let body = ctx.body_as_str()?;
                compare(body, expected, *operator, self.case_sensitive)
            }
            Kind::Method { expected } => ctx.method.to_uppercase() == expected.to_uppercase(),
            Kind::Cookie { name, operator, expected } => {
                match ctx.cookie(name) {
                    Some(actual) => compare(actual, expected, *operator, self.case_sensitive),
                    None => matches!(operator, Operator::NotExists),
                }
            }
            Kind::Ip { operator, expected } => {
                compare(&ctx.client_ip(), expected, *operator, self.case_sensitive)
            }
            Kind::Path { pattern } => {
                let (matched, bindings) = pattern.matches(&ctx.path);
                if matched {
                    if let Some(bindings) = bindings {
                        if !bindings.is_empty() {
                            ctx.set_path_params(bindings);
                        }
                    }
                }
                matched
            }
        };
        Ok(result)
    }
}
