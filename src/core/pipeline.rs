use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::env::Environment;
use crate::error::{Error, Hint, Result};
use crate::recipe::{substitute_map, Recipe};
use crate::step::{execute, Step, StepContext, StepOutcome};
use crate::steps::{find_step, step_names};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStepResult {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: PipelineRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl PipelineStepResult {
    fn skipped(id: String, step_type: &str, reason: String) -> Self {
        Self {
            id,
            step_type: step_type.to_string(),
            status: PipelineRunStatus::Skipped,
            outputs: None,
            warnings: vec![reason],
            hints: Vec::new(),
            error: None,
            error_code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunResult {
    pub identifier: String,
    pub steps: Vec<PipelineStepResult>,
    pub status: PipelineRunStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub summary: PipelineRunSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

/// A recipe entry bound to its step implementation.
pub struct PlannedStep {
    pub id: String,
    pub step: Box<dyn Step>,
    pub arguments: Map<String, Value>,
}

/// Resolve every processor up front so an unknown name fails the run before
/// any step has side effects.
pub fn plan(recipe: &Recipe) -> Result<Vec<PlannedStep>> {
    let unknown: Vec<String> = recipe
        .process
        .iter()
        .filter(|entry| find_step(&entry.processor).is_err())
        .map(|entry| entry.processor.clone())
        .collect();
    if !unknown.is_empty() {
        return Err(Error::validation_invalid_argument(
            "Process",
            format!("Unknown processor(s): {}", unknown.join(", ")),
            Some(step_names().iter().map(|s| s.to_string()).collect()),
        ));
    }

    recipe
        .process
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            Ok(PlannedStep {
                id: format!("{}:{}", index + 1, entry.processor),
                step: find_step(&entry.processor)?,
                arguments: entry.arguments.clone(),
            })
        })
        .collect()
}

/// Run the steps in order against `env`. The first failure marks the run
/// failed and skips the rest; a step returning [`StepOutcome::Halt`] skips
/// the rest but leaves the run successful.
pub fn run(
    identifier: &str,
    steps: Vec<PlannedStep>,
    env: &mut Environment,
    ctx: &StepContext<'_>,
) -> PipelineRunResult {
    let mut results = Vec::with_capacity(steps.len());
    let mut warnings = Vec::new();
    let mut stopped_by: Option<(String, PipelineRunStatus)> = None;

    for planned in steps {
        let name = planned.step.name();
        if let Some((by, status)) = &stopped_by {
            let reason = match status {
                PipelineRunStatus::Failed => format!("Skipped because '{}' failed", by),
                _ => format!("Skipped because '{}' stopped the recipe", by),
            };
            results.push(PipelineStepResult::skipped(planned.id, name, reason));
            continue;
        }

        let arguments = substitute_map(&planned.arguments, env);
        env.extend(arguments);

        log_status!("recipe", "{}", planned.id);
        match execute(planned.step.as_ref(), env, ctx) {
            Ok(report) => {
                if report.outcome == StepOutcome::Halt {
                    let warning = format!("'{}' stopped the recipe; remaining steps skipped", planned.id);
                    log_status!("recipe", "{}", warning);
                    warnings.push(warning);
                    stopped_by = Some((planned.id.clone(), PipelineRunStatus::Success));
                }
                results.push(PipelineStepResult {
                    id: planned.id,
                    step_type: name.to_string(),
                    status: PipelineRunStatus::Success,
                    outputs: Some(report.outputs),
                    warnings: Vec::new(),
                    hints: Vec::new(),
                    error: None,
                    error_code: None,
                });
            }
            Err(err) => {
                log_status!("recipe", "{} failed: {}", planned.id, err.message);
                stopped_by = Some((planned.id.clone(), PipelineRunStatus::Failed));
                results.push(PipelineStepResult {
                    id: planned.id,
                    step_type: name.to_string(),
                    status: PipelineRunStatus::Failed,
                    outputs: None,
                    warnings: Vec::new(),
                    hints: err.hints.clone(),
                    error: Some(err.message.clone()),
                    error_code: Some(err.code.as_str().to_string()),
                });
            }
        }
    }

    let status = derive_overall_status(&results);
    let summary = build_summary(&results, &status);
    PipelineRunResult {
        identifier: identifier.to_string(),
        steps: results,
        status,
        warnings,
        summary,
    }
}

fn derive_overall_status(results: &[PipelineStepResult]) -> PipelineRunStatus {
    if results
        .iter()
        .any(|result| matches!(result.status, PipelineRunStatus::Failed))
    {
        return PipelineRunStatus::Failed;
    }
    if !results.is_empty()
        && results
            .iter()
            .all(|result| matches!(result.status, PipelineRunStatus::Skipped))
    {
        return PipelineRunStatus::Skipped;
    }
    PipelineRunStatus::Success
}

fn build_summary(results: &[PipelineStepResult], status: &PipelineRunStatus) -> PipelineRunSummary {
    let count = |wanted: PipelineRunStatus| results.iter().filter(|r| r.status == wanted).count();

    let next_actions = match status {
        PipelineRunStatus::Failed => vec![
            "Fix the issue and re-run the recipe (completed steps run again)".to_string(),
        ],
        _ => Vec::new(),
    };

    PipelineRunSummary {
        total_steps: results.len(),
        succeeded: count(PipelineRunStatus::Success),
        failed: count(PipelineRunStatus::Failed),
        skipped: count(PipelineRunStatus::Skipped),
        next_actions,
    }
}
