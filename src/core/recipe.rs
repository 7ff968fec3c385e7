//! Recipe files: an `Input` dictionary and a linear `Process` list.
//!
//! JSON files are read directly; `.plist` and `.recipe` files go through the
//! property list parser first. `%NAME%` references in string values are
//! replaced from the environment when a step is about to run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::bundle::plist_to_json;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::paths;

pub const RECIPE_CACHE_DIR: &str = "RECIPE_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessEntry {
    pub processor: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Recipe {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub process: Vec<ProcessEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_recipe: Option<String>,
}

impl Recipe {
    pub fn load(path: &Path) -> Result<Self> {
        let value = if is_plist_path(path) {
            let parsed = plist::Value::from_file(path)
                .map_err(|e| Error::parse_plist(e.to_string(), Some(path.display().to_string())))?;
            plist_to_json(parsed)
        } else {
            let content = fs::read_to_string(path).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
            })?;
            serde_json::from_str(&content)
                .map_err(|e| Error::parse_json(e.to_string(), Some(path.display().to_string())))?
        };

        let mut recipe = Self::from_value(value, path)?;
        if recipe.identifier.is_none() {
            recipe.identifier = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string());
        }
        Ok(recipe)
    }

    pub fn from_value(value: Value, origin: &Path) -> Result<Self> {
        let recipe: Recipe = serde_json::from_value(value).map_err(|e| {
            Error::config_invalid_value(
                origin.display().to_string(),
                None,
                format!("not a recipe: {}", e),
            )
        })?;
        if let Some(parent) = &recipe.parent_recipe {
            return Err(Error::config_invalid_value(
                "ParentRecipe",
                Some(parent.clone()),
                "parent recipes are not supported; flatten the recipe first",
            ));
        }
        Ok(recipe)
    }

    pub fn identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or("recipe")
    }

    /// Environment for a run, lowest precedence first: preferences, the
    /// recipe's `Input`, then command-line overrides. `RECIPE_CACHE_DIR`
    /// defaults to a per-identifier directory, created on demand.
    pub fn environment(&self, prefs: &Environment, overrides: &Environment) -> Result<Environment> {
        let mut env = prefs.clone();
        let input = substitute_map(&self.input, &env);
        env.extend(input);
        env.merge(overrides);

        let cache_dir = match env.get_path(RECIPE_CACHE_DIR) {
            Some(dir) => dir,
            None => {
                let dir = paths::recipe_cache(self.identifier())?;
                env.set(RECIPE_CACHE_DIR, dir.display().to_string());
                dir
            }
        };
        ensure_dir(&cache_dir)?;
        Ok(env)
    }
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("create {}", dir.display())))
    })
}

fn is_plist_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("plist") | Some("recipe")
    )
}

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%").ok());

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Replace `%NAME%` references. A string that is exactly one reference takes
/// the referenced value with its type; otherwise values are spliced in as
/// text. Unknown names are left as they are.
pub fn substitute(value: &Value, env: &Environment) -> Value {
    match value {
        Value::String(text) => {
            let Some(placeholder) = PLACEHOLDER.as_ref() else {
                return value.clone();
            };
            if let Some(caps) = placeholder.captures(text) {
                if caps.get(0).map(|m| m.as_str().len()) == Some(text.len()) {
                    if let Some(found) = env.get(&caps[1]) {
                        return found.clone();
                    }
                }
            }
            let replaced = placeholder.replace_all(text, |caps: &regex::Captures| {
                env.get(&caps[1])
                    .and_then(as_text)
                    .unwrap_or_else(|| caps[0].to_string())
            });
            Value::String(replaced.into_owned())
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, env)).collect()),
        Value::Object(map) => Value::Object(substitute_map(map, env)),
        other => other.clone(),
    }
}

pub fn substitute_map(map: &Map<String, Value>, env: &Environment) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), substitute(v, env)))
        .collect()
}
