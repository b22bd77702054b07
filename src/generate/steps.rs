use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use url::Url;

use crate::browser::page::{ElementHandle, LivePage};
use crate::error::PipelineError;
use crate::oracle::backend::TextInference;
use crate::oracle::reply::strip_code_fences;
use crate::simplify::simplifier::simplify;

const SUPPORTED_ACTIONS: [&str; 3] = ["navigate", "fill", "click"];

/// One browser action planned by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedStep {
    /// Go to an absolute URL, or a path relative to the base URL.
    Navigate {
        #[serde(alias = "selector")]
        url: String,
    },

    /// Replace the value of the element matching `selector`
    Fill {
        selector: String,
        #[serde(default)]
        value: String,
    },

    /// Click the element matching `selector`
    Click { selector: String },
}

impl fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedStep::Navigate { url } => write!(f, "navigate {}", url),
            PlannedStep::Fill { selector, .. } => write!(f, "fill {}", selector),
            PlannedStep::Click { selector } => write!(f, "click {}", selector),
        }
    }
}

/// Instruction → page digest → oracle step plan → actions on the live page.
///
/// The caller owns the page: it is neither launched nor closed here.
pub struct StepRunner {
    oracle: Arc<dyn TextInference>,
    base_url: Option<String>,
}

impl StepRunner {
    pub fn new(oracle: Arc<dyn TextInference>) -> Self {
        Self {
            oracle,
            base_url: None,
        }
    }

    /// Resolve relative navigation targets against `base_url` instead of the
    /// page's current URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Plan `instruction` against the current page and carry it out.
    ///
    /// Stops at the first failing step; earlier steps are not undone.
    /// Returns the steps that were executed.
    pub fn run(
        &self,
        page: &mut dyn LivePage,
        instruction: &str,
    ) -> Result<Vec<PlannedStep>, PipelineError> {
        info!(instruction, "planning steps");
        let result = self
            .plan(page, instruction)
            .and_then(|steps| self.execute(page, &steps).map(|()| steps));
        match &result {
            Ok(steps) => info!(instruction, steps = steps.len(), "instruction carried out"),
            Err(PipelineError::MalformedResponse { reason, raw }) => error!(
                instruction,
                reason = %reason,
                raw = %raw,
                "oracle returned an unusable step plan"
            ),
            Err(e) => error!(instruction, error = %e, "instruction failed"),
        }
        result
    }

    /// Ask the oracle for the steps that carry out `instruction` on `page`.
    pub fn plan(
        &self,
        page: &mut dyn LivePage,
        instruction: &str,
    ) -> Result<Vec<PlannedStep>, PipelineError> {
        let digest = simplify(page);
        if digest.is_empty() {
            return Err(PipelineError::EmptyDigest);
        }

        let raw = self.oracle.infer_text(&build_step_prompt(instruction, &digest))?;
        parse_step_plan(&raw)
    }

    /// Execute `steps` in order. Step numbers in errors start at 1.
    pub fn execute(&self, page: &mut dyn LivePage, steps: &[PlannedStep]) -> Result<(), PipelineError> {
        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            info!(step = index, action = %step, "executing step");

            let outcome = match step {
                PlannedStep::Navigate { url } => {
                    let base = match &self.base_url {
                        Some(base) => base.clone(),
                        None => page.current_url()?,
                    };
                    let target = navigation_target(url, &base).map_err(|source| {
                        PipelineError::InvalidNavigation {
                            index,
                            target: url.clone(),
                            source,
                        }
                    })?;
                    page.navigate(&target).map(|_| ())
                }
                PlannedStep::Fill { selector, value } => {
                    page.fill(&ElementHandle::primary(selector), value)
                }
                PlannedStep::Click { selector } => page.click(&ElementHandle::primary(selector)),
            };

            outcome.map_err(|source| PipelineError::StepFailed {
                index,
                step: step.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Parse an untrusted oracle reply into a step plan.
///
/// The reply must be a JSON list. Steps with a missing or unsupported action
/// are skipped with a warning; a plan left with no steps is `EmptyPlan`.
pub fn parse_step_plan(raw: &str) -> Result<Vec<PlannedStep>, PipelineError> {
    let malformed = |reason: String| PipelineError::MalformedResponse {
        reason,
        raw: raw.to_string(),
    };

    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    let Value::Array(items) = value else {
        return Err(malformed("expected a JSON list of steps".to_string()));
    };

    let mut steps = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let action = item.get("action").and_then(Value::as_str).unwrap_or_default();
        if !SUPPORTED_ACTIONS.contains(&action) {
            warn!(step = i + 1, action, "skipping unsupported step action");
            continue;
        }
        let step = serde_json::from_value(item)
            .map_err(|e| malformed(format!("step {}: {}", i + 1, e)))?;
        steps.push(step);
    }

    if steps.is_empty() {
        return Err(PipelineError::EmptyPlan {
            raw: raw.to_string(),
        });
    }
    Ok(steps)
}

/// Absolute targets are used as-is; anything else is joined onto `base`.
pub fn navigation_target(target: &str, base: &str) -> Result<String, url::ParseError> {
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute.to_string());
    }
    Ok(Url::parse(base)?.join(target)?.to_string())
}

pub fn build_step_prompt(instruction: &str, digest: &str) -> String {
    format!(
        r##"You are a test automation assistant. Turn the user's instruction into the sequence of browser actions that carries it out on the page below.

AVAILABLE ACTIONS:
- "navigate": go to a URL. Put the URL, or a path relative to the site root, in "selector".
- "fill": type "value" into the input matching "selector".
- "click": click the element matching "selector".

RULES:
1. Respond with a JSON list of objects, each with "action", "selector" and, for "fill" only, "value".
2. Use the simplified HTML to choose the most likely CSS selector for each element; prefer [data-testid], then id, then name.
3. Return raw JSON only: no Markdown fences, no explanation.

EXAMPLE OUTPUT:
[
  {{ "action": "navigate", "selector": "auth/login" }},
  {{ "action": "fill", "selector": "#email", "value": "customer@example.com" }},
  {{ "action": "click", "selector": "[data-testid='login-submit']" }}
]

USER INSTRUCTION:
{instruction}

SIMPLIFIED HTML:
{digest}"##,
        instruction = instruction,
        digest = digest
    )
}
