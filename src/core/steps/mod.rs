//! The built-in pipeline steps and the registry the runners look them up in.

mod clear_patch_notifications;
mod mist_downloader;
mod patch_title_versioner;
mod sleep_if;
mod update_title_editor;

pub use clear_patch_notifications::JamfClearPatchNotifications;
pub use mist_downloader::MistDownloader;
pub use patch_title_versioner::JamfPatchTitleVersioner;
pub use sleep_if::SleepIf;
pub use update_title_editor::UpdateTitleEditor;

use crate::error::{Error, Result};
use crate::step::{Step, VariableSpec};

/// Jamf Pro credential inputs shared by the Jamf steps.
pub(crate) const JAMF_CREDENTIAL_INPUTS: [VariableSpec; 4] = [
    VariableSpec::optional("CLIENT_ID", "Jamf Pro API client id"),
    VariableSpec::optional("CLIENT_SECRET", "Secret for CLIENT_ID"),
    VariableSpec::optional("API_USERNAME", "Jamf Pro user with API access"),
    VariableSpec::optional("API_PASSWORD", "Password for API_USERNAME"),
];

pub fn all_steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(JamfClearPatchNotifications),
        Box::new(JamfPatchTitleVersioner),
        Box::new(MistDownloader),
        Box::new(SleepIf),
        Box::new(UpdateTitleEditor),
    ]
}

pub fn step_names() -> Vec<&'static str> {
    all_steps().iter().map(|s| s.name()).collect()
}

/// Look a step up by its exact name.
pub fn find_step(name: &str) -> Result<Box<dyn Step>> {
    all_steps()
        .into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| {
            Error::validation_invalid_argument(
                "step",
                format!("Unknown step '{}'", name),
                Some(step_names().iter().map(|s| s.to_string()).collect()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn registry_has_every_step_once() {
        let mut names = step_names();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all_steps().len());
        assert!(find_step("SleepIf").is_ok());
    }

    #[test]
    fn unknown_step_lists_known_names() {
        let err = find_step("StopProcessingIf").err();
        let err = err.map(|e| (e.code, e.details["tried"].as_array().map(Vec::len)));
        assert_eq!(err, Some((ErrorCode::ValidationInvalidArgument, Some(5))));
    }

    #[test]
    fn required_inputs_are_never_defaulted() {
        for step in all_steps() {
            for input in step.input_variables() {
                assert!(!(input.required && input.default.is_some()), "{}.{}", step.name(), input.name);
            }
        }
    }
}
