//! The variable environment handed from step to step.
//!
//! Values are JSON values so the environment can carry strings, booleans,
//! numbers and nested dictionaries coming from preferences, recipes or a
//! previous step, and serialize back out unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    vars: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            vars: map.into_iter().collect(),
        }
    }

    /// Load a JSON object from disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(Self::from_map(map)),
            Ok(_) => Err(Error::config_invalid_value(
                path.display().to_string(),
                None,
                "environment file must contain a JSON object",
            )),
            Err(e) => Err(Error::parse_json(
                e.to_string(),
                Some(format!("environment file {}", path.display())),
            )),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// A variable is "set" when present and not null or an empty string.
    pub fn is_set(&self, key: &str) -> bool {
        match self.vars.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Scalar value rendered as a string. Empty strings count as unset.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.vars.get(key)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_str(key)
            .ok_or_else(|| Error::config_missing_key(key))
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_str(key).map(PathBuf::from)
    }

    pub fn require_path(&self, key: &str) -> Result<PathBuf> {
        self.require_str(key).map(PathBuf::from)
    }

    /// Truthiness in the loose sense recipes use: booleans, non-zero numbers,
    /// and the strings "true"/"yes"/"1" (any case).
    pub fn get_bool(&self, key: &str) -> bool {
        match self.vars.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => {
                matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
            }
            _ => false,
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.vars.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                Error::config_invalid_value(key, Some(n.to_string()), "expected a whole number")
            }),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| {
                Error::config_invalid_value(key, Some(s.clone()), "expected a whole number")
            }),
            Some(other) => Err(Error::config_invalid_value(
                key,
                Some(other.to_string()),
                "expected a whole number",
            )),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Set only when absent or empty.
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        if !self.is_set(key) {
            self.vars.insert(key.to_string(), value.into());
        }
    }

    /// Overlay another environment; its values win.
    pub fn merge(&mut self, other: &Environment) {
        for (key, value) in &other.vars {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    pub fn extend<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.vars.extend(pairs);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The environment as a JSON object, for predicate evaluation and output.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
