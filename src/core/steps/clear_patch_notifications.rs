use crate::auth::JamfCredentials;
use crate::env::Environment;
use crate::error::Result;
use crate::jamf::JamfClient;
use crate::step::{OutputSpec, Step, StepContext, StepOutcome, VariableSpec};

use super::JAMF_CREDENTIAL_INPUTS;

/// Dismisses the Jamf Pro patch notification for one title and version.
pub struct JamfClearPatchNotifications;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required("JSS_URL", "Jamf Pro server URL"),
    VariableSpec::required("patch_name", "The title of the patch to clear notifications for"),
    VariableSpec::required("version", "The patch version to clear notifications for"),
    JAMF_CREDENTIAL_INPUTS[0],
    JAMF_CREDENTIAL_INPUTS[1],
    JAMF_CREDENTIAL_INPUTS[2],
    JAMF_CREDENTIAL_INPUTS[3],
];

static OUTPUTS: &[OutputSpec] = &[OutputSpec::new(
    "notification_cleared",
    "True when a matching notification was dismissed",
)];

impl Step for JamfClearPatchNotifications {
    fn name(&self) -> &'static str {
        "JamfClearPatchNotifications"
    }

    fn description(&self) -> &'static str {
        "Clear notifications for patch policies in Jamf Pro."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn run(&self, env: &mut Environment, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let jss_url = env.require_str("JSS_URL")?;
        let patch_name = env.require_str("patch_name")?;
        let version = env.require_str("version")?;
        let credentials = JamfCredentials::from_env(env)?;

        let client = JamfClient::connect(ctx.transport, &jss_url, &credentials)?;
        let cleared = match client.find_patch_notification(&patch_name, &version)? {
            Some(notification) => {
                log_status!("jamf", "Found notification {}", notification.id);
                client.dismiss_patch_notification(&notification.id)?;
                log_status!(
                    "jamf",
                    "Successfully cleared notification for {} version {}",
                    patch_name,
                    version
                );
                true
            }
            None => {
                log_status!("jamf", "No notification for {} version {}", patch_name, version);
                false
            }
        };

        env.set("notification_cleared", cleared);
        Ok(StepOutcome::Continue)
    }
}
