//! The fixed interface every pipeline step implements.
//!
//! A step declares its input and output variables statically. [`execute`]
//! fills in declared defaults, refuses to start when a required input is
//! missing, runs the step and reports which declared outputs it wrote.

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::command::CommandRunner;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::http::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariableSpec {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
}

impl VariableSpec {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            description,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: false,
            description,
            default: None,
        }
    }

    pub const fn with_default(
        name: &'static str,
        description: &'static str,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            required: false,
            description,
            default: Some(default),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub name: &'static str,
    pub description: &'static str,
}

impl OutputSpec {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }
}

/// Whether the pipeline should carry on after this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Continue,
    Halt,
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Side-effect seams available to a running step.
pub struct StepContext<'a> {
    pub transport: &'a dyn Transport,
    pub runner: &'a dyn CommandRunner,
    pub sleeper: &'a dyn Sleeper,
}

pub trait Step {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_variables(&self) -> &'static [VariableSpec];
    fn output_variables(&self) -> &'static [OutputSpec];
    fn run(&self, env: &mut Environment, ctx: &StepContext<'_>) -> Result<StepOutcome>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    pub outcome: StepOutcome,
    pub outputs: Map<String, Value>,
}

/// Names of required inputs that are absent or empty.
pub fn missing_inputs(step: &dyn Step, env: &Environment) -> Vec<String> {
    step.input_variables()
        .iter()
        .filter(|spec| spec.required && !env.is_set(spec.name))
        .map(|spec| spec.name.to_string())
        .collect()
}

pub fn apply_defaults(step: &dyn Step, env: &mut Environment) {
    for spec in step.input_variables() {
        if let Some(default) = spec.default {
            env.set_default(spec.name, default);
        }
    }
}

pub fn execute(
    step: &dyn Step,
    env: &mut Environment,
    ctx: &StepContext<'_>,
) -> Result<StepReport> {
    apply_defaults(step, env);

    let missing = missing_inputs(step, env);
    if !missing.is_empty() {
        return Err(Error::config_missing_keys(
            missing,
            Some(step.name().to_string()),
        ));
    }

    log_status!("step", "Running {}", step.name());
    let outcome = step.run(env, ctx)?;

    let outputs = step
        .output_variables()
        .iter()
        .filter_map(|spec| {
            env.get(spec.name)
                .map(|value| (spec.name.to_string(), value.clone()))
        })
        .collect();

    Ok(StepReport {
        step: step.name().to_string(),
        outcome,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, FakeRunner, FakeTransport, RecordingSleeper};
    use std::cell::Cell;

    struct Echo {
        ran: Cell<bool>,
    }

    static ECHO_INPUTS: &[VariableSpec] = &[
        VariableSpec::required("message", "What to echo"),
        VariableSpec::with_default("suffix", "Appended text", "!"),
    ];
    static ECHO_OUTPUTS: &[OutputSpec] = &[OutputSpec::new("echoed", "The message with suffix")];

    impl Step for Echo {
        fn name(&self) -> &'static str {
            "Echo"
        }
        fn description(&self) -> &'static str {
            "Echo a message"
        }
        fn input_variables(&self) -> &'static [VariableSpec] {
            ECHO_INPUTS
        }
        fn output_variables(&self) -> &'static [OutputSpec] {
            ECHO_OUTPUTS
        }
        fn run(&self, env: &mut Environment, _ctx: &StepContext<'_>) -> Result<StepOutcome> {
            self.ran.set(true);
            let message = format!("{}{}", env.require_str("message")?, env.require_str("suffix")?);
            env.set("echoed", message);
            Ok(StepOutcome::Continue)
        }
    }

    #[test]
    fn missing_required_input_stops_before_run() {
        let (transport, runner, sleeper) = (FakeTransport::new(), FakeRunner::new(), RecordingSleeper::default());
        let step = Echo { ran: Cell::new(false) };
        let mut env = Environment::new();

        let err = execute(&step, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert!(!step.ran.get());
        let err = err.map(|e| (e.code, e.details["keys"].clone(), e.details["step"].clone()));
        assert_eq!(
            err,
            Some((
                crate::error::ErrorCode::ConfigMissingKey,
                serde_json::json!(["message"]),
                serde_json::json!("Echo")
            ))
        );
    }

    #[test]
    fn defaults_fill_in_and_outputs_are_reported() {
        let (transport, runner, sleeper) = (FakeTransport::new(), FakeRunner::new(), RecordingSleeper::default());
        let step = Echo { ran: Cell::new(false) };
        let mut env = Environment::new();
        env.set("message", "hello");

        let report = execute(&step, &mut env, &context(&transport, &runner, &sleeper));
        let report = match report {
            Ok(report) => report,
            Err(e) => panic!("echo failed: {}", e),
        };

        assert_eq!(report.outcome, StepOutcome::Continue);
        assert_eq!(report.outputs.get("echoed"), Some(&serde_json::json!("hello!")));
        assert_eq!(env.get_str("suffix").as_deref(), Some("!"));
    }
}
