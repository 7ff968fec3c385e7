use std::time::Duration;

use crate::env::Environment;
use crate::error::Result;
use crate::predicate;
use crate::step::{OutputSpec, Step, StepContext, StepOutcome, VariableSpec};

pub const DEFAULT_SLEEP_SECONDS: u64 = 5;

/// Sleeps and stops the pipeline when a predicate over the environment holds.
pub struct SleepIf;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "predicate",
        "Predicate-format comparison against environment keys",
    ),
    VariableSpec::with_default("sleep_time", "The number of seconds to sleep", "5"),
];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "sleep_recipe",
    "Boolean. Should we sleep the recipe?",
)];

impl Step for SleepIf {
    fn name(&self) -> &'static str {
        "SleepIf"
    }

    fn description(&self) -> &'static str {
        "Sleeps, then stops processing the recipe, if a predicate comparison evaluates to true."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn run(&self, env: &mut Environment, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let source = env.require_str("predicate")?;
        let seconds = env.get_u64("sleep_time")?.unwrap_or(DEFAULT_SLEEP_SECONDS);

        let result = predicate::evaluate(&source, &env.to_value())?;
        log_status!("sleep-if", "({}) is {}", source, result);
        env.set("sleep_recipe", result);

        if !result {
            return Ok(StepOutcome::Continue);
        }
        log_status!("sleep-if", "Sleeping {}s", seconds);
        ctx.sleeper.sleep(Duration::from_secs(seconds));
        Ok(StepOutcome::Halt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::step::execute;
    use crate::test_support::{context, FakeRunner, FakeTransport, RecordingSleeper};
    use serde_json::json;

    fn run(env: &mut Environment, sleeper: &RecordingSleeper) -> Result<crate::step::StepReport> {
        let (transport, runner) = (FakeTransport::new(), FakeRunner::new());
        execute(&SleepIf, env, &context(&transport, &runner, sleeper))
    }

    #[test]
    fn true_predicate_sleeps_default_and_halts() {
        let sleeper = RecordingSleeper::default();
        let mut env = Environment::new();
        env.set("version", "120.0");
        env.set("predicate", "version == '120.0'");

        let report = run(&mut env, &sleeper).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(report.outcome, StepOutcome::Halt);
        assert_eq!(report.outputs.get("sleep_recipe"), Some(&json!(true)));
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn false_predicate_continues_without_sleeping() {
        let sleeper = RecordingSleeper::default();
        let mut env = Environment::new();
        env.set("predicate", "download_changed == TRUE");
        env.set("download_changed", false);

        let report = run(&mut env, &sleeper).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(report.outcome, StepOutcome::Continue);
        assert_eq!(report.outputs.get("sleep_recipe"), Some(&json!(false)));
        assert!(sleeper.slept().is_empty());
    }

    #[test]
    fn sleep_time_is_configurable() {
        let sleeper = RecordingSleeper::default();
        let mut env = Environment::new();
        env.set("predicate", "TRUEPREDICATE");
        env.set("sleep_time", "30");

        run(&mut env, &sleeper).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(sleeper.slept(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn bad_sleep_time_is_rejected_before_evaluating() {
        let sleeper = RecordingSleeper::default();
        let mut env = Environment::new();
        env.set("predicate", "TRUEPREDICATE");
        env.set("sleep_time", "soon");

        let err = run(&mut env, &sleeper).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::ConfigInvalidValue));
        assert!(!env.contains("sleep_recipe"));
    }

    #[test]
    fn malformed_predicate_is_fatal() {
        let sleeper = RecordingSleeper::default();
        let mut env = Environment::new();
        env.set("predicate", "version ==");

        let err = run(&mut env, &sleeper).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::PredicateInvalid));
        assert!(sleeper.slept().is_empty());
    }
}
