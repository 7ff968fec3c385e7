use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const PREFS_ENV_VAR: &str = "PKGSTEPS_PREFS";

/// Base pkgsteps config directory (~/.config/pkgsteps/, %APPDATA%\pkgsteps on Windows)
pub fn pkgsteps() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("pkgsteps"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("pkgsteps"))
    }
}

/// Default preferences file
pub fn prefs_json() -> Result<PathBuf> {
    Ok(pkgsteps()?.join("prefs.json"))
}

/// Root of per-recipe cache directories
pub fn cache() -> Result<PathBuf> {
    Ok(pkgsteps()?.join("cache"))
}

/// Cache directory for one recipe identifier
pub fn recipe_cache(identifier: &str) -> Result<PathBuf> {
    Ok(cache()?.join(identifier))
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Preferences path: explicit flag, then `PKGSTEPS_PREFS`, then the default.
pub fn resolve_prefs(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand(path));
    }
    match env::var(PREFS_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => Ok(expand(&path)),
        _ => prefs_json(),
    }
}
