//! Declarative partition plans: a JSON file describing the preserve spec
//! and the ordered operations to run against a page's registry.
//!
//! ```json
//! {
//!   "preserve": { "by-content": "www.googletagmanager.com" },
//!   "steps": [
//!     { "op": "assign", "container": "urgent", "search": { "by-reference": ["s4", "s2"] } },
//!     { "op": "delete", "search": { "by-reference": "ads.js" } },
//!     { "op": "insert_after", "target": { "by-reference": "s4" }, "function": "function() { boot(); }" },
//!     { "op": "rewrite", "target": { "by-content": "alert('hi'" },
//!       "rewrites": [{ "pattern": "alert", "replacement": "console.log" }] }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use descript::{
    EntryId, RawScript, RegistryOptions, Rewrite, ScriptPayload, ScriptRegistry, SearchSpec,
};

use crate::types::{CliError, CliResult};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default)]
    pub preserve: Option<SearchSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Assign {
        container: String,
        search: SearchSpec,
    },
    Delete {
        search: SearchSpec,
    },
    InsertAfter {
        target: SearchSpec,
        #[serde(default)]
        function: Option<String>,
        #[serde(default)]
        src: Option<String>,
    },
    Rewrite {
        target: SearchSpec,
        rewrites: Vec<Rewrite>,
    },
}

/// What a plan run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub steps: usize,
    pub inserted: Vec<EntryId>,
    pub rewritten: usize,
    /// Single-target steps whose target matched nothing.
    pub skipped: usize,
}

impl Plan {
    /// Load a plan from a JSON file.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let plan = Self::parse(&text)?;
        tracing::info!("Loaded plan {} ({} steps)", path.display(), plan.steps.len());
        Ok(plan)
    }

    pub fn parse(text: &str) -> CliResult<Self> {
        let plan: Plan = serde_json::from_str(text)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn options(&self) -> RegistryOptions {
        RegistryOptions {
            preserve: self.preserve.clone(),
        }
    }

    /// Build the registry for `scripts` under this plan's options and run
    /// every step.
    pub fn run(&self, scripts: Vec<RawScript>) -> CliResult<(ScriptRegistry, PlanReport)> {
        let mut registry = ScriptRegistry::new(scripts, self.options())?;
        let report = self.apply(&mut registry)?;
        Ok((registry, report))
    }

    /// Run every step in order. Stops at the first failing step.
    pub fn apply(&self, registry: &mut ScriptRegistry) -> CliResult<PlanReport> {
        let mut report = PlanReport::default();

        for (number, step) in self.steps.iter().enumerate() {
            tracing::debug!(step = number + 1, ?step, "applying plan step");
            match step {
                Step::Assign { container, search } => {
                    registry.assign(container, search)?;
                }
                Step::Delete { search } => {
                    registry.delete(search)?;
                }
                Step::InsertAfter {
                    target,
                    function,
                    src,
                } => {
                    let payload = match (function, src) {
                        (Some(function), None) => ScriptPayload::function(function.as_str()),
                        (None, Some(src)) => ScriptPayload::External(src.clone()),
                        _ => payload_error(number)?,
                    };
                    match registry.insert_after(target, payload)? {
                        Some(id) => report.inserted.push(id),
                        None => report.skipped += 1,
                    }
                }
                Step::Rewrite { target, rewrites } => {
                    if registry.rewrite_content(target, rewrites.iter().cloned())? {
                        report.rewritten += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
            }
            report.steps += 1;
        }

        Ok(report)
    }

    fn validate(&self) -> CliResult<()> {
        for (number, step) in self.steps.iter().enumerate() {
            match step {
                Step::Assign { container, .. } if container.is_empty() => {
                    return Err(CliError::InvalidPlan(format!(
                        "step {}: assign needs a container name",
                        number + 1
                    )));
                }
                Step::InsertAfter { function, src, .. } if function.is_some() == src.is_some() => {
                    payload_error(number)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn payload_error(number: usize) -> CliResult<ScriptPayload> {
    Err(CliError::InvalidPlan(format!(
        "step {}: insert_after needs exactly one of \"function\" or \"src\"",
        number + 1
    )))
}
