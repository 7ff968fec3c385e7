use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    AuthMissingCredentials,
    AuthFailed,

    LookupNotFound,
    LookupAmbiguous,

    HttpRequestFailed,
    RemoteRejected,

    ParseJson,
    ParseXml,
    ParsePlist,

    CommandFailed,
    ArtifactMissing,
    FilesystemAmbiguous,

    PredicateInvalid,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::AuthMissingCredentials => "auth.missing_credentials",
            ErrorCode::AuthFailed => "auth.failed",

            ErrorCode::LookupNotFound => "lookup.not_found",
            ErrorCode::LookupAmbiguous => "lookup.ambiguous",

            ErrorCode::HttpRequestFailed => "http.request_failed",
            ErrorCode::RemoteRejected => "remote.rejected",

            ErrorCode::ParseJson => "parse.json",
            ErrorCode::ParseXml => "parse.xml",
            ErrorCode::ParsePlist => "parse.plist",

            ErrorCode::CommandFailed => "command.failed",
            ErrorCode::ArtifactMissing => "artifact.missing",
            ErrorCode::FilesystemAmbiguous => "filesystem.ambiguous",

            ErrorCode::PredicateInvalid => "predicate.invalid",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupDetails {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

/// A mutating or reading call returned a status outside its accepted set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRejectedDetails {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemAmbiguousDetails {
    pub pattern: String,
    pub matches: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn config_missing_keys(keys: Vec<String>, step: Option<String>) -> Self {
        let message = format!("Missing required variable(s): {}", keys.join(", "));
        Self::new(
            ErrorCode::ConfigMissingKey,
            message,
            to_details(ConfigMissingKeyDetails { keys, step }),
        )
    }

    pub fn config_missing_key(key: impl Into<String>) -> Self {
        Self::config_missing_keys(vec![key.into()], None)
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let message = format!("Invalid value for '{}': {}", key, problem);
        Self::new(
            ErrorCode::ConfigInvalidValue,
            message,
            to_details(ConfigInvalidValueDetails {
                key,
                value,
                problem,
            }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            problem.clone(),
            to_details(InvalidArgumentDetails {
                field: field.into(),
                problem,
                tried,
            }),
        )
    }

    pub fn auth_missing_credentials(service: &str, expected: &[&str]) -> Self {
        Self::new(
            ErrorCode::AuthMissingCredentials,
            format!("No authentication credentials supplied for {}", service),
            serde_json::json!({ "service": service, "expected": expected }),
        )
        .with_hint(format!(
            "Set {} in the preferences file or pass them with --set",
            expected.join(" / ")
        ))
    }

    pub fn auth_failed(url: impl Into<String>, status: u16) -> Self {
        Self::new(
            ErrorCode::AuthFailed,
            format!("Error getting auth token: HTTP {}", status),
            serde_json::json!({ "url": url.into(), "status": status }),
        )
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        let kind = kind.into();
        let name = name.into();
        Self::new(
            ErrorCode::LookupNotFound,
            format!("Couldn't find {} with name '{}'", kind, name),
            to_details(LookupDetails {
                kind,
                name,
                candidates: Vec::new(),
            }),
        )
    }

    pub fn lookup_ambiguous(
        kind: impl Into<String>,
        name: impl Into<String>,
        candidates: Vec<String>,
    ) -> Self {
        let kind = kind.into();
        let name = name.into();
        Self::new(
            ErrorCode::LookupAmbiguous,
            format!(
                "{} entries of {} share the name '{}'",
                candidates.len(),
                kind,
                name
            ),
            to_details(LookupDetails {
                kind,
                name,
                candidates,
            }),
        )
        .with_hint("Rename the duplicates on the server so the name is unique")
    }

    pub fn http_request_failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::HttpRequestFailed,
            format!("HTTP request failed: {}", error),
            serde_json::json!({ "url": url.into(), "error": error }),
        )
    }

    pub fn remote_rejected(details: RemoteRejectedDetails) -> Self {
        let message = match &details.error_code {
            Some(code) => format!("Error {} {}: {}", details.status, details.context, code),
            None => format!("Error {} {}", details.status, details.context),
        };
        Self::new(ErrorCode::RemoteRejected, message, to_details(details))
    }

    pub fn parse_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::ParseJson,
            "Malformed JSON response",
            to_details(ParseErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn parse_xml(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::ParseXml,
            "Malformed XML response",
            to_details(ParseErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn parse_plist(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::ParsePlist,
            "Unable to read property list",
            to_details(ParseErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn command_failed(details: CommandFailedDetails) -> Self {
        let message = format!(
            "Command exited with status {}: {}",
            details.exit_code, details.command
        );
        Self::new(ErrorCode::CommandFailed, message, to_details(details))
    }

    pub fn artifact_missing(path: impl Into<String>, context: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ArtifactMissing,
            format!("Expected artifact not found: {}", path),
            serde_json::json!({ "path": path, "context": context.into() }),
        )
    }

    pub fn filesystem_ambiguous(pattern: impl Into<String>, matches: Vec<String>) -> Self {
        let pattern = pattern.into();
        let message = if matches.is_empty() {
            format!("No match found by globbing {}", pattern)
        } else {
            format!("Multiple matches found by globbing {}", pattern)
        };
        Self::new(
            ErrorCode::FilesystemAmbiguous,
            message,
            to_details(FilesystemAmbiguousDetails { pattern, matches }),
        )
    }

    pub fn predicate_invalid(
        predicate: impl Into<String>,
        position: usize,
        problem: impl Into<String>,
    ) -> Self {
        let predicate = predicate.into();
        let problem = problem.into();
        Self::new(
            ErrorCode::PredicateInvalid,
            format!("Predicate error for '{}': {}", predicate, problem),
            serde_json::json!({
                "predicate": predicate,
                "position": position,
                "problem": problem,
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
