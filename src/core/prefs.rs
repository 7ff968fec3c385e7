//! Preferences: site-wide variables (server URLs, credentials) merged under
//! every run.

use std::path::Path;

use crate::env::Environment;
use crate::error::Result;
use crate::paths;

/// Load preferences from `explicit`, `PKGSTEPS_PREFS` or the default
/// location. A missing file is an empty set of preferences; an unreadable or
/// malformed one is an error.
pub fn load(explicit: Option<&str>) -> Result<Environment> {
    let path = paths::resolve_prefs(explicit)?;
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<Environment> {
    if !path.exists() {
        log_status!("prefs", "No preferences at {}", path.display());
        return Ok(Environment::new());
    }
    Environment::from_json_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let prefs = load_from(&dir.path().join("prefs.json")).unwrap_or_else(|e| panic!("{}", e));
        assert!(prefs.is_empty());
    }

    #[test]
    fn reads_json_object() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"JSS_URL":"https://jss.example.com","CLIENT_ID":"abc"}"#)
            .unwrap_or_else(|e| panic!("{}", e));

        let prefs = load(Some(&path.display().to_string())).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(prefs.get_str("JSS_URL").as_deref(), Some("https://jss.example.com"));
        assert_eq!(prefs.len(), 2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let path = dir.path().join("prefs.json");
        fs::write(&path, "[1, 2").unwrap_or_else(|e| panic!("{}", e));

        let err = load_from(&path).err().map(|e| e.code);

        assert_eq!(err, Some(ErrorCode::ParseJson));
    }
}
