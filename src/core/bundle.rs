//! Reading an application bundle's Info.plist.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{Error, Result};

pub const DEFAULT_MINIMUM_OS: &str = "10.9";
const PLUTIL: &str = "/usr/bin/plutil";

/// An application bundle and its Info.plist, as JSON.
#[derive(Debug, Clone)]
pub struct AppBundle {
    pub path: PathBuf,
    pub info: Map<String, Value>,
}

impl AppBundle {
    pub fn open(path: &Path, runner: &dyn CommandRunner) -> Result<Self> {
        let info_path = path.join("Contents").join("Info.plist");
        let info = read_plist_dict(&info_path, runner)?;
        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    /// File name of the bundle, e.g. `Firefox.app`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn string(&self, key: &str) -> Option<String> {
        match self.info.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn bundle_identifier(&self) -> Result<String> {
        self.string("CFBundleIdentifier").ok_or_else(|| {
            Error::parse_plist(
                "CFBundleIdentifier missing",
                Some(self.path.display().to_string()),
            )
        })
    }

    pub fn minimum_os(&self) -> String {
        self.string("LSMinimumSystemVersion")
            .unwrap_or_else(|| DEFAULT_MINIMUM_OS.to_string())
    }

    /// `CFBundleName` without spaces, else the file name without `.app`
    /// and spaces.
    pub fn compact_name(&self) -> String {
        self.string("CFBundleName")
            .unwrap_or_else(|| {
                let file_name = self.file_name();
                file_name.trim_end_matches(".app").to_string()
            })
            .replace(' ', "")
    }
}

/// Parse a property list (XML or binary) into a JSON dictionary. When the
/// native parser rejects the file, fall back to `plutil -convert json`.
pub fn read_plist_dict(path: &Path, runner: &dyn CommandRunner) -> Result<Map<String, Value>> {
    if !path.is_file() {
        return Err(Error::internal_io(
            "file not found",
            Some(format!("read {}", path.display())),
        ));
    }

    let value = match plist::Value::from_file(path) {
        Ok(parsed) => plist_to_json(parsed),
        Err(native_err) => {
            log_status!(
                "bundle",
                "Native plist parse failed ({}), converting with plutil",
                native_err
            );
            convert_with_plutil(path, runner)?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::parse_plist(
            "top level is not a dictionary",
            Some(path.display().to_string()),
        )),
    }
}

fn convert_with_plutil(path: &Path, runner: &dyn CommandRunner) -> Result<Value> {
    let spec = CommandSpec::new(PLUTIL).args([
        "-convert".to_string(),
        "json".to_string(),
        "-o".to_string(),
        "-".to_string(),
        path.display().to_string(),
    ]);
    let output = runner.run(&spec);
    if !output.success {
        return Err(Error::parse_plist(
            format!("plutil exited with {}: {}", output.exit_code, output.stderr.trim()),
            Some(path.display().to_string()),
        ));
    }
    serde_json::from_str(&output.stdout).map_err(|e| {
        Error::parse_plist(
            format!("Unable to read the application plist: {}", e),
            Some(path.display().to_string()),
        )
    })
}

/// Property list value as JSON. Data becomes base64 text and dates their
/// XML representation.
pub fn plist_to_json(value: plist::Value) -> Value {
    match value {
        plist::Value::String(s) => Value::String(s),
        plist::Value::Boolean(b) => Value::Bool(b),
        plist::Value::Integer(i) => i
            .as_signed()
            .map(Value::from)
            .or_else(|| i.as_unsigned().map(Value::from))
            .unwrap_or(Value::Null),
        plist::Value::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        plist::Value::Data(bytes) => Value::String(STANDARD.encode(bytes)),
        plist::Value::Date(date) => Value::String(date.to_xml_format()),
        plist::Value::Array(items) => Value::Array(items.into_iter().map(plist_to_json).collect()),
        plist::Value::Dictionary(dict) => Value::Object(
            dict.into_iter()
                .map(|(k, v)| (k, plist_to_json(v)))
                .collect(),
        ),
        plist::Value::Uid(uid) => Value::from(uid.get()),
        _ => Value::Null,
    }
}
