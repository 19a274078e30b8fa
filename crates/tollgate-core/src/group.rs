//! AssertionGroup (component C3): an ordered AND/OR combination of
//! assertions, evaluated with short-circuiting.

use crate::assertion::{self, Assertion, AssertionConfig};
use crate::context::Context;
use crate::error::{ConfigError, EvaluationError};
use serde::{Deserialize, Serialize};

/// Declarative config for an assertion group, as embedded in a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionGroupConfig {
    pub id: String,
    #[serde(default, rename = "all_required")]
    pub all_required: bool,
    pub description: Option<String>,
    pub assertions: Vec<AssertionConfig>,
}

/// A built assertion group. AND (`all_required=true`) short-circuits on the
/// first `false`; OR short-circuits on the first `true`. Empty groups
/// evaluate to `true` unconditionally.
#[derive(Debug, Clone)]
pub struct AssertionGroup {
    pub id: String,
    pub all_required: bool,
    assertions: Vec<Assertion>,
}

pub fn build(config: &AssertionGroupConfig) -> Result<AssertionGroup, ConfigError> {
    let assertions = config
        .assertions
        .iter()
        .map(assertion::build)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AssertionGroup {
        id: config.id.clone(),
        all_required: config.all_required,
        assertions,
    })
}

impl AssertionGroup {
    /// Evaluates the group against `ctx`. The first assertion to raise an
    /// [`EvaluationError`] stops evaluation and that error is returned.
    pub fn evaluate(&self, ctx: &mut Context) -> Result<bool, EvaluationError> {
        if self.assertions.is_empty() {
            return Ok(true);
        }

        if self.all_required {
            for a in &self.assertions {
                if !a.evaluate(ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        } else {
            for a in &self.assertions {
                if a.evaluate(ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}
