use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::{CommandRunner, CommandSpec};
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::step::{OutputSpec, Step, StepContext, StepOutcome, VariableSpec};

pub const DEFAULT_MIST_PATH: &str = "/usr/local/bin/mist";
const CHMOD: &str = "/bin/chmod";
const FORMATS: &[&str] = &["package", "image", "iso", "application"];

/// Downloads the newest macOS installer for a release name using `mist`.
pub struct MistDownloader;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required(
        "format",
        "Installer format to be downloaded. Options: iso, image, package, application",
    ),
    VariableSpec::required("type", "What mist should list and download, e.g. installer"),
    VariableSpec::required("macOS", "Name of the macOS version to download, e.g. Sonoma"),
    VariableSpec::required("RECIPE_CACHE_DIR", "Directory the installer is written to"),
    VariableSpec::with_default("mist_path", "Path to the mist binary", DEFAULT_MIST_PATH),
    VariableSpec::with_default("use_sudo", "Run mist and chmod through sudo", "true"),
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("installer_path", "Path to the created installer"),
    OutputSpec::new("version", "macOS version"),
    OutputSpec::new("build", "macOS build number"),
];

/// One entry of `mist list ... -o json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MistRelease {
    pub version: String,
    pub build: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// File extension mist uses for each output format.
pub fn extension_for(format: &str) -> Option<&'static str> {
    match format {
        "package" => Some("pkg"),
        "image" => Some("dmg"),
        "iso" => Some("iso"),
        "application" => Some("app"),
        _ => None,
    }
}

pub fn installer_path(cache_dir: &Path, macos: &str, release: &MistRelease, extension: &str) -> PathBuf {
    cache_dir.join(format!(
        "Install {} {}-{}.{}",
        macos, release.version, release.build, extension
    ))
}

struct Mist<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
    sudo: bool,
}

impl<'a> Mist<'a> {
    fn latest(&self, kind: &str, macos: &str) -> Result<MistRelease> {
        let spec = CommandSpec::new(&self.program)
            .args(["list", kind, "--latest", macos, "-o", "json", "-q"])
            .elevated(self.sudo);
        let output = self.runner.run(&spec).check(&spec)?;

        let releases: Vec<MistRelease> = serde_json::from_str(output.stdout.trim())
            .map_err(|e| Error::parse_json(e.to_string(), Some("mist list output".to_string())))?;
        releases
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found("macOS release", macos))
    }

    fn download(&self, kind: &str, macos: &str, format: &str, output_dir: &Path) -> Result<()> {
        let spec = CommandSpec::new(&self.program)
            .args(["download", kind, macos, format, "--output-directory"])
            .arg(output_dir.display().to_string())
            .arg("-q")
            .elevated(self.sudo);
        self.runner.run(&spec).check(&spec)?;
        Ok(())
    }

    fn open_permissions(&self, path: &Path) -> Result<()> {
        let spec = CommandSpec::new(CHMOD)
            .args(["777".to_string(), path.display().to_string()])
            .elevated(self.sudo);
        self.runner.run(&spec).check(&spec)?;
        Ok(())
    }
}

impl Step for MistDownloader {
    fn name(&self) -> &'static str {
        "MistDownloader"
    }

    fn description(&self) -> &'static str {
        "Downloads a macOS installer. Needs the OS name and the format."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn run(&self, env: &mut Environment, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let format = env.require_str("format")?;
        let kind = env.require_str("type")?;
        let macos = env.require_str("macOS")?;
        let cache_dir = env.require_path("RECIPE_CACHE_DIR")?;

        let extension = extension_for(&format).ok_or_else(|| {
            Error::config_invalid_value(
                "format",
                Some(format.clone()),
                format!("expected one of {}", FORMATS.join(", ")),
            )
        })?;

        let mist = Mist {
            runner: ctx.runner,
            program: env
                .get_str("mist_path")
                .unwrap_or_else(|| DEFAULT_MIST_PATH.to_string()),
            sudo: env.get_bool("use_sudo"),
        };

        let release = mist.latest(&kind, &macos)?;
        log_status!(
            "mist",
            "Latest {} is {} ({})",
            release.name.as_deref().unwrap_or(&macos),
            release.version,
            release.build
        );

        fs::create_dir_all(&cache_dir).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("create {}", cache_dir.display())))
        })?;
        log_status!("mist", "Downloading {} {} to {}", macos, format, cache_dir.display());
        mist.download(&kind, &macos, &format, &cache_dir)?;

        let installer = installer_path(&cache_dir, &macos, &release, extension);
        if !installer.exists() {
            return Err(Error::artifact_missing(
                installer.display().to_string(),
                "mist download finished without producing the installer",
            ));
        }
        mist.open_permissions(&installer)?;

        env.set("installer_path", installer.display().to_string());
        env.set("version", release.version);
        env.set("build", release.build);
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::error::ErrorCode;
    use crate::step::execute;
    use crate::test_support::{context, FakeRunner, FakeTransport, RecordingSleeper};
    use serde_json::json;

    const LIST_JSON: &str = r#"[{"name":"macOS Sonoma","version":"14.4","build":"23E214","size":13245678}]"#;

    fn env(cache: &Path) -> Environment {
        let mut env = Environment::new();
        env.set("format", "package");
        env.set("type", "installer");
        env.set("macOS", "Sonoma");
        env.set("RECIPE_CACHE_DIR", cache.display().to_string());
        env
    }

    /// `mist download` writes the installer named after the listed release.
    fn downloading(cache: PathBuf) -> impl Fn(&CommandSpec) -> CommandOutput {
        move |_| {
            fs::write(cache.join("Install Sonoma 14.4-23E214.pkg"), b"pkg").unwrap_or_else(|e| panic!("{}", e));
            CommandOutput::ok("")
        }
    }

    #[test]
    fn downloads_and_reports_installer() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let runner = FakeRunner::new()
            .on("mist list", |_| CommandOutput::ok(LIST_JSON))
            .on("mist download", downloading(dir.path().to_path_buf()))
            .on("/bin/chmod 777", |_| CommandOutput::ok(""));
        let (transport, sleeper) = (FakeTransport::new(), RecordingSleeper::default());
        let mut env = env(dir.path());

        let report = execute(&MistDownloader, &mut env, &context(&transport, &runner, &sleeper));

        let report = report.unwrap_or_else(|e| panic!("{}", e));
        let expected = dir.path().join("Install Sonoma 14.4-23E214.pkg");
        assert_eq!(
            report.outputs.get("installer_path"),
            Some(&json!(expected.display().to_string()))
        );
        assert_eq!(report.outputs.get("version"), Some(&json!("14.4")));
        assert_eq!(report.outputs.get("build"), Some(&json!("23E214")));

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].program, "sudo");
        assert_eq!(
            calls[0].args,
            vec!["/usr/local/bin/mist", "list", "installer", "--latest", "Sonoma", "-o", "json", "-q"]
        );
        assert_eq!(
            calls[1].args,
            vec![
                "/usr/local/bin/mist".to_string(),
                "download".to_string(),
                "installer".to_string(),
                "Sonoma".to_string(),
                "package".to_string(),
                "--output-directory".to_string(),
                dir.path().display().to_string(),
                "-q".to_string(),
            ]
        );
        assert_eq!(calls[2].args[..2], ["/bin/chmod".to_string(), "777".to_string()]);
    }

    #[test]
    fn list_failure_is_command_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let runner = FakeRunner::new().on("mist list", |_| CommandOutput::failed(1, "no network"));
        let (transport, sleeper) = (FakeTransport::new(), RecordingSleeper::default());
        let mut env = env(dir.path());

        let err = execute(&MistDownloader, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::CommandFailed));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn empty_listing_is_not_found() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let runner = FakeRunner::new().on("mist list", |_| CommandOutput::ok("[]"));
        let (transport, sleeper) = (FakeTransport::new(), RecordingSleeper::default());
        let mut env = env(dir.path());

        let err = execute(&MistDownloader, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::LookupNotFound));
    }

    #[test]
    fn download_that_writes_nothing_is_artifact_missing() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let runner = FakeRunner::new()
            .on("mist list", |_| CommandOutput::ok(LIST_JSON))
            .on("mist download", |_| CommandOutput::ok("Downloading... done"));
        let (transport, sleeper) = (FakeTransport::new(), RecordingSleeper::default());
        let mut env = env(dir.path());

        let err = execute(&MistDownloader, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::ArtifactMissing));
        assert!(!env.contains("installer_path"));
    }

    #[test]
    fn download_exit_status_is_checked() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let runner = FakeRunner::new()
            .on("mist list", |_| CommandOutput::ok(LIST_JSON))
            .on("mist download", |_| CommandOutput::failed(2, "disk full"));
        let (transport, sleeper) = (FakeTransport::new(), RecordingSleeper::default());
        let mut env = env(dir.path());

        let err = execute(&MistDownloader, &mut env, &context(&transport, &runner, &sleeper)).err();

        let err = err.map(|e| (e.code, e.details["stderr"].clone()));
        assert_eq!(err, Some((ErrorCode::CommandFailed, json!("disk full"))));
    }

    #[test]
    fn without_sudo_and_with_custom_binary() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let runner = FakeRunner::new()
            .on("/opt/mist list", |_| CommandOutput::ok(LIST_JSON))
            .on("/opt/mist download", downloading(dir.path().to_path_buf()))
            .on("/bin/chmod", |_| CommandOutput::ok(""));
        let (transport, sleeper) = (FakeTransport::new(), RecordingSleeper::default());
        let mut env = env(dir.path());
        env.set("mist_path", "/opt/mist");
        env.set("use_sudo", false);

        let report = execute(&MistDownloader, &mut env, &context(&transport, &runner, &sleeper));

        assert!(report.is_ok());
        assert!(runner.calls().iter().all(|c| c.program != "sudo"));
    }

    #[test]
    fn unknown_format_is_rejected_before_running_mist() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{}", e));
        let runner = FakeRunner::new();
        let (transport, sleeper) = (FakeTransport::new(), RecordingSleeper::default());
        let mut env = env(dir.path());
        env.set("format", "zip");

        let err = execute(&MistDownloader, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::ConfigInvalidValue));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn extensions_follow_format() {
        let release = MistRelease {
            version: "13.6".into(),
            build: "22G120".into(),
            name: None,
        };
        let path = installer_path(Path::new("/cache"), "Ventura", &release, "dmg");
        assert_eq!(path, Path::new("/cache/Install Ventura 13.6-22G120.dmg"));
        assert_eq!(extension_for("iso"), Some("iso"));
        assert_eq!(extension_for("application"), Some("app"));
    }
}
