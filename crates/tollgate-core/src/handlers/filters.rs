//! Filters: the one genuinely open-ended stage of the handler chain. Kept
//! as a `Box<dyn Handler>` per the Dynamic-dispatch design note, built from
//! a small set of kinds a route's config can select — unlike assertions and
//! limiters, new kinds are expected to be added over time without changing
//! the closed enums elsewhere in the crate.

use super::Handler;
use crate::context::Context;
use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub params: serde_json::Value,
}

enum Kind {
    AddHeader { name: String, value: String },
    RequireHeader { name: String },
    BlockUserAgent { pattern: Regex },
}

pub struct FilterHandler {
    id: String,
    enabled: bool,
    kind: Kind,
}

fn string_param(config: &FilterConfig, key: &str) -> Result<String, ConfigError> {
    config
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingField {
            id: config.id.clone(),
            field: key.to_string(),
        })
}

pub fn build(config: &FilterConfig) -> Result<FilterHandler, ConfigError> {
    let kind = match config.kind.as_str() {
        "add-header" => Kind::AddHeader {
            name: string_param(config, "name")?,
            value: string_param(config, "value")?,
        },
        "require-header" => Kind::RequireHeader {
            name: string_param(config, "name")?,
        },
        "block-user-agent" => {
            let pattern = string_param(config, "pattern")?;
            let compiled = Regex::new(&pattern).map_err(|e| ConfigError::InvalidRegex {
                id: config.id.clone(),
                source: e.to_string(),
            })?;
            Kind::BlockUserAgent { pattern: compiled }
        }
        other => {
            return Err(ConfigError::UnknownAssertionType {
                id: config.id.clone(),
                ty: format!("filter:{other}"),
            })
        }
    };

    Ok(FilterHandler {
        id: config.id.clone(),
        enabled: config.enabled,
        kind,
    })
}

impl Handler for FilterHandler {
    fn handle(&self, ctx: &mut Context) -> bool {
        if !self.enabled {
            return true;
        }
        match &self.kind {
            Kind::AddHeader { name, value } => {
                ctx.add_response_header(name.clone(), value.clone());
                true
            }
            Kind::RequireHeader { name } => {
                if ctx.header_exists(name) {
                    true
                } else {
                    ctx.abort_with_message(400, &format!("missing required header '{name}'"));
                    false
                }
            }
            Kind::BlockUserAgent { pattern } => {
                let user_agent = ctx.header("user-agent");
                if pattern.is_match(user_agent) {
                    ctx.abort_with_message(403, "blocked user agent");
                    false
                } else {
                    true
                }
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        &self.id
    }
}
