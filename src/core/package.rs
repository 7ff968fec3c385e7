//! Flat package unpacking and application bundle discovery.
//!
//! The package is expanded into `UnpackedPackage`, its payload into
//! `UnpackedPayload`, both under the recipe cache dir. [`ScratchDirs`]
//! removes both when it goes out of scope, whatever happened in between.

use std::fs;
use std::path::{Path, PathBuf};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{Error, Result};

pub const UNPACKED_PACKAGE_DIR: &str = "UnpackedPackage";
pub const UNPACKED_PAYLOAD_DIR: &str = "UnpackedPayload";

const XAR: &str = "/usr/bin/xar";
const DITTO: &str = "/usr/bin/ditto";

/// Directories removed on drop.
#[derive(Debug, Default)]
pub struct ScratchDirs {
    dirs: Vec<PathBuf>,
}

impl ScratchDirs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dir` for cleanup, clear anything left from a previous run
    /// and create it empty.
    pub fn create(&mut self, dir: &Path) -> Result<PathBuf> {
        if !self.dirs.iter().any(|d| d == dir) {
            self.dirs.push(dir.to_path_buf());
        }
        if dir.exists() {
            fs::remove_dir_all(dir).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("purge {}", dir.display())))
            })?;
        }
        fs::create_dir_all(dir).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("create {}", dir.display())))
        })?;
        Ok(dir.to_path_buf())
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl Drop for ScratchDirs {
    fn drop(&mut self) {
        for dir in &self.dirs {
            if dir.is_dir() {
                if let Err(e) = fs::remove_dir_all(dir) {
                    log_status!("package", "Failed to remove {}: {}", dir.display(), e);
                }
            }
        }
    }
}

pub struct PackageUnpacker<'a> {
    runner: &'a dyn CommandRunner,
    work_dir: PathBuf,
}

impl<'a> PackageUnpacker<'a> {
    pub fn new(runner: &'a dyn CommandRunner, work_dir: &Path) -> Self {
        Self {
            runner,
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Unpack `pkg_path` and return the single application bundle inside.
    /// Scratch directories are registered in `scratch` before anything is
    /// written to them.
    pub fn find_app(&self, pkg_path: &Path, scratch: &mut ScratchDirs) -> Result<PathBuf> {
        if !pkg_path.exists() {
            return Err(Error::config_invalid_value(
                "pkg_path",
                Some(pkg_path.display().to_string()),
                "package does not exist",
            ));
        }

        let package_dir = scratch.create(&self.work_dir.join(UNPACKED_PACKAGE_DIR))?;
        log_status!(
            "package",
            "Unpacking '{}' to '{}'",
            pkg_path.display(),
            package_dir.display()
        );
        self.expand_flat(pkg_path, &package_dir)?;

        let top_payload = package_dir.join("Payload");
        if top_payload.is_file() {
            let (matches, pattern) = self.apps_in_payload(&top_payload, scratch)?;
            return single_match(matches, &pattern);
        }

        // Distribution-style packages keep the payload in component packages.
        let sub_pattern = package_dir.join("*.pkg").join("Payload");
        let payloads = glob_paths(&sub_pattern)?;
        if payloads.is_empty() {
            return Err(Error::filesystem_ambiguous(
                sub_pattern.display().to_string(),
                Vec::new(),
            ));
        }

        let mut last_pattern = sub_pattern.display().to_string();
        for payload in payloads {
            let (matches, pattern) = self.apps_in_payload(&payload, scratch)?;
            if !matches.is_empty() {
                return single_match(matches, &pattern);
            }
            last_pattern = pattern;
        }
        Err(Error::filesystem_ambiguous(last_pattern, Vec::new()))
    }

    fn expand_flat(&self, pkg_path: &Path, dest: &Path) -> Result<()> {
        let spec = CommandSpec::new(XAR).args([
            "-x".to_string(),
            "-C".to_string(),
            dest.display().to_string(),
            "-f".to_string(),
            pkg_path.display().to_string(),
        ]);
        self.runner.run(&spec).check(&spec)?;
        Ok(())
    }

    fn expand_payload(&self, payload: &Path, dest: &Path) -> Result<()> {
        let spec = CommandSpec::new(DITTO).args([
            "-x".to_string(),
            "-z".to_string(),
            payload.display().to_string(),
            dest.display().to_string(),
        ]);
        self.runner.run(&spec).check(&spec)?;
        Ok(())
    }

    /// Expand one payload and glob for apps, first in `Applications/`, then
    /// at the payload root.
    fn apps_in_payload(
        &self,
        payload: &Path,
        scratch: &mut ScratchDirs,
    ) -> Result<(Vec<PathBuf>, String)> {
        let payload_dir = scratch.create(&self.work_dir.join(UNPACKED_PAYLOAD_DIR))?;
        log_status!("package", "Unpacking Payload to '{}'", payload_dir.display());
        self.expand_payload(payload, &payload_dir)?;

        let in_applications = payload_dir.join("Applications").join("*.app");
        let matches = glob_paths(&in_applications)?;
        if !matches.is_empty() {
            return Ok((matches, in_applications.display().to_string()));
        }

        let at_root = payload_dir.join("*.app");
        Ok((glob_paths(&at_root)?, at_root.display().to_string()))
    }
}

fn glob_paths(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern_str = pattern.display().to_string();
    let entries = glob::glob(&pattern_str).map_err(|e| {
        Error::internal_unexpected(format!("invalid glob pattern {}: {}", pattern_str, e))
    })?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|entry| entry.ok()).collect();
    paths.sort();
    Ok(paths)
}

fn single_match(matches: Vec<PathBuf>, pattern: &str) -> Result<PathBuf> {
    match matches.as_slice() {
        [only] => {
            log_status!("package", "Found {}", only.display());
            Ok(only.clone())
        }
        _ => Err(Error::filesystem_ambiguous(
            pattern,
            matches.iter().map(|p| p.display().to_string()).collect(),
        )),
    }
}
