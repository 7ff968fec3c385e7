use clap::Args;
use serde_json::{json, Value};

use pkgsteps::env::Environment;
use pkgsteps::{prefs, Error};

pub type CmdResult<T> = pkgsteps::Result<(T, i32)>;

/// Preference and override flags shared by `run` and `recipe`.
#[derive(Args, Default, Debug)]
pub struct VariableArgs {
    /// Preferences file (defaults to $PKGSTEPS_PREFS, then ~/.config/pkgsteps/prefs.json)
    #[arg(long, value_name = "FILE")]
    pub prefs: Option<String>,

    /// Override a variable (repeatable). Values parse as JSON, bool, number, then string.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

impl VariableArgs {
    pub fn load_prefs(&self) -> pkgsteps::Result<Environment> {
        prefs::load(self.prefs.as_deref())
    }

    pub fn overrides(&self) -> pkgsteps::Result<Environment> {
        let mut env = Environment::new();
        for assignment in &self.set {
            let (key, value) = parse_assignment(assignment)?;
            env.set(key, value);
        }
        Ok(env)
    }
}

fn parse_assignment(raw: &str) -> pkgsteps::Result<(String, Value)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), parse_value(value)))
        }
        _ => Err(Error::validation_invalid_argument(
            "set",
            format!("Expected KEY=VALUE, got '{}'", raw),
            None,
        )),
    }
}

/// Parse a string value into appropriate JSON type.
/// Order: JSON literal → string. Numbers are only kept when they print back
/// exactly as typed, so `14.10` or `007` stay strings.
fn parse_value(s: &str) -> Value {
    // JSON handles arrays, objects, quoted strings, bools and numbers
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Number(n)) if n.to_string() != s => json!(s),
        Ok(v) => v,
        Err(_) => json!(s),
    }
}

pub mod recipe;
pub mod run;
pub mod steps;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (pkgsteps::Result<Value>, i32) {
    match command {
        crate::Commands::Run(args) => dispatch!(args, run),
        crate::Commands::Recipe(args) => dispatch!(args, recipe),
        crate::Commands::Steps(args) => dispatch!(args, steps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_parse_as_literals_first() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(parse_value("120.0"), json!(120.0));
        assert_eq!(parse_value("Firefox"), json!("Firefox"));
        assert_eq!(parse_value("\"120.0\""), json!("120.0"));
    }

    #[test]
    fn version_text_survives_as_typed() {
        assert_eq!(parse_value("14.10"), json!("14.10"));
        assert_eq!(parse_value("007"), json!("007"));
        assert_eq!(parse_value("1e3"), json!("1e3"));

        let args = VariableArgs {
            prefs: None,
            set: vec!["version=14.10".to_string(), "forcevers=2.50".to_string()],
        };
        let env = args.overrides().unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(env.get_str("version").as_deref(), Some("14.10"));
        assert_eq!(env.get_str("forcevers").as_deref(), Some("2.50"));
    }

    #[test]
    fn assignments_split_on_first_equals() {
        let parsed = parse_assignment("predicate=version == '1.0'").ok();
        assert_eq!(
            parsed,
            Some(("predicate".to_string(), json!("version == '1.0'")))
        );
    }

    #[test]
    fn assignment_without_key_is_rejected() {
        assert!(parse_assignment("=value").is_err());
        assert!(parse_assignment("novalue").is_err());
    }

    #[test]
    fn overrides_collect_every_set_flag() {
        let args = VariableArgs {
            prefs: None,
            set: vec!["NAME=Firefox".to_string(), "title_id=42".to_string()],
        };
        let env = args.overrides().unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(env.get_str("NAME").as_deref(), Some("Firefox"));
        assert_eq!(env.get("title_id"), Some(&json!(42)));
    }
}
