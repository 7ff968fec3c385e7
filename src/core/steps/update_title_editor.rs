use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::TitleEditorCredentials;
use crate::bundle::AppBundle;
use crate::env::Environment;
use crate::error::{Error, ErrorCode, Result};
use crate::package::{PackageUnpacker, ScratchDirs};
use crate::step::{OutputSpec, Step, StepContext, StepOutcome, VariableSpec};
use crate::title_editor::{CurrentVersion, PatchDefinition, PatchFacts, TitleEditorClient};

const RELEASE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Unpacks a freshly built package, reads its app bundle and publishes the
/// new version to Title Editor. Unpacked data is removed afterwards.
pub struct UpdateTitleEditor;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required("pkg_path", "The package to inspect"),
    VariableSpec::required("RECIPE_CACHE_DIR", "Where the package is unpacked"),
    VariableSpec::required("title_id", "Title Editor software title id"),
    VariableSpec::optional("pkg_vers_key", "Info.plist key holding the version"),
    VariableSpec::optional("patch_name", "Patch name used in log messages"),
    VariableSpec::optional("forcevers", "Version to publish regardless of the bundle"),
    VariableSpec::optional(
        "app_plist_path",
        "App bundle to read instead of the one found in the package, relative to RECIPE_CACHE_DIR",
    ),
    VariableSpec::optional("debug", "Log patch documents and server responses"),
    VariableSpec::optional("version", "Fallback version when neither forcevers nor pkg_vers_key apply"),
    VariableSpec::optional("NAME", "Recipe name used in log messages"),
    VariableSpec::optional("TITLE_URL", "Title Editor base URL"),
    VariableSpec::optional("TITLE_USER", "Title Editor user"),
    VariableSpec::optional("TITLE_PASS", "Password for TITLE_USER"),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("patchJson", "The patch document sent to Title Editor"),
    OutputSpec::new("patch_id", "The software title id the patch was sent to"),
    OutputSpec::new("verJson", "The current version document"),
];

/// `forcevers`, then the Info.plist key named by `pkg_vers_key`, then `version`.
fn resolve_version(env: &Environment, bundle: &AppBundle) -> Result<String> {
    if let Some(forced) = env.get_str("forcevers") {
        return Ok(forced);
    }
    if let Some(key) = env.get_str("pkg_vers_key") {
        return bundle.string(&key).ok_or_else(|| {
            Error::config_invalid_value(
                "pkg_vers_key",
                Some(key.clone()),
                format!("'{}' is not a string in {}", key, bundle.path.display()),
            )
        });
    }
    env.get_str("version")
        .ok_or_else(|| Error::config_missing_key("version"))
}

/// Modification time of the bundle, UTC.
fn release_date(path: &Path) -> Result<String> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("stat {}", path.display()))))?;
    Ok(DateTime::<Utc>::from(modified)
        .format(RELEASE_DATE_FORMAT)
        .to_string())
}

fn bundle_override(env: &Environment, cache_dir: &Path) -> Option<PathBuf> {
    let path = env.get_path("app_plist_path")?;
    Some(if path.is_absolute() {
        path
    } else {
        cache_dir.join(path)
    })
}

impl Step for UpdateTitleEditor {
    fn name(&self) -> &'static str {
        "UpdateTitleEditor"
    }

    fn description(&self) -> &'static str {
        "Unpacks the newly built package, reads the app bundle and sends a new patch version to Title Editor."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn run(&self, env: &mut Environment, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let debug = env.get_bool("debug");
        let pkg_path = env.require_path("pkg_path")?;
        let cache_dir = env.require_path("RECIPE_CACHE_DIR")?;
        let title_id = env
            .get_u64("title_id")?
            .ok_or_else(|| Error::config_missing_key("title_id"))?;

        let title_url = env.get_str("TITLE_URL").ok_or_else(|| {
            log_status!("title-editor", "Title URL is not in prefs");
            Error::config_missing_key("TITLE_URL")
        })?;
        let credentials = TitleEditorCredentials::from_env(env)?;

        // Removed on every exit path below.
        let mut scratch = ScratchDirs::new();
        let found = PackageUnpacker::new(ctx.runner, &cache_dir).find_app(&pkg_path, &mut scratch);
        let app_path = match (bundle_override(env, &cache_dir), found) {
            // The override is how a recipe picks one app when the glob can't.
            (Some(path), Err(err)) if err.code == ErrorCode::FilesystemAmbiguous => {
                log_status!("title-editor", "{}; using app_plist_path", err.message);
                path
            }
            (Some(_), Err(err)) => return Err(err),
            (Some(path), Ok(_)) => path,
            (None, found) => found?,
        };

        let bundle = AppBundle::open(&app_path, ctx.runner)?;
        let version = resolve_version(env, &bundle)?;
        let facts = PatchFacts {
            software_title_id: title_id,
            version: version.clone(),
            app_name: bundle.file_name(),
            bundle_id: bundle.bundle_identifier()?,
            minimum_os: bundle.minimum_os(),
            release_date: release_date(&app_path)?,
        };
        let patch = PatchDefinition::from_facts(&facts);
        let current = CurrentVersion {
            current_version: version,
            software_title_id: title_id,
        };

        let patch_json = serde_json::to_string(&patch)
            .map_err(|e| Error::internal_json(e.to_string(), Some("patch document".to_string())))?;
        let ver_json = serde_json::to_string(&current)
            .map_err(|e| Error::internal_json(e.to_string(), Some("version document".to_string())))?;
        log_debug!(debug, "Patch json is {}", patch_json);

        let title_name = env
            .get_str("NAME")
            .or_else(|| env.get_str("patch_name"))
            .unwrap_or_else(|| bundle.compact_name());

        let client = TitleEditorClient::connect(ctx.transport, &title_url, &credentials)?.with_debug(debug);
        client.publish(title_id, &patch, &current, &title_name)?;

        env.set("patchJson", patch_json);
        env.set("verJson", ver_json);
        if let Some(id) = env.get("title_id").cloned() {
            env.set("patch_id", id);
        }
        Ok(StepOutcome::Continue)
    }
}
