use crate::auth::JamfCredentials;
use crate::env::Environment;
use crate::error::Result;
use crate::jamf::JamfClient;
use crate::step::{OutputSpec, Step, StepContext, StepOutcome, VariableSpec};

use super::JAMF_CREDENTIAL_INPUTS;

/// Reads the newest version a Jamf Pro patch management title reports.
pub struct JamfPatchTitleVersioner;

static INPUTS: &[VariableSpec] = &[
    VariableSpec::required("JSS_URL", "Jamf Pro server URL"),
    VariableSpec::required(
        "patch_softwaretitle",
        "Name of the patch software title (e.g. 'Mozilla Firefox') used in Jamf",
    ),
    JAMF_CREDENTIAL_INPUTS[0],
    JAMF_CREDENTIAL_INPUTS[1],
    JAMF_CREDENTIAL_INPUTS[2],
    JAMF_CREDENTIAL_INPUTS[3],
];

static OUTPUTS: &[OutputSpec] = &[
    OutputSpec::new("patch_softwaretitle_id", "Id of the patch software title"),
    OutputSpec::new(
        "latest_patch_version",
        "The latest version number of the software reported by the patch title",
    ),
];

impl Step for JamfPatchTitleVersioner {
    fn name(&self) -> &'static str {
        "JamfPatchTitleVersioner"
    }

    fn description(&self) -> &'static str {
        "Determines the latest software version reported by a Jamf Pro patch management title."
    }

    fn input_variables(&self) -> &'static [VariableSpec] {
        INPUTS
    }

    fn output_variables(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn run(&self, env: &mut Environment, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let jss_url = env.require_str("JSS_URL")?;
        let title = env.require_str("patch_softwaretitle")?;
        let credentials = JamfCredentials::from_env(env)?;

        log_status!("jamf", "Checking for existing '{}' on {}", title, jss_url);
        let client = JamfClient::connect(ctx.transport, &jss_url, &credentials)?;

        let title_id = client.patch_software_title_id(&title)?;
        env.set("patch_softwaretitle_id", title_id.as_str());

        let latest = client.latest_patch_version(&title_id)?;
        log_status!("jamf", "Latest version of '{}' is {}", title, latest);
        env.set("latest_patch_version", latest);

        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::http::Method;
    use crate::step::execute;
    use crate::test_support::{context, FakeRunner, FakeTransport, RecordingSleeper};
    use serde_json::json;

    const TOKEN_URL: &str = "https://jss.example.com/api/v1/auth/token";
    const TITLES_URL: &str = "https://jss.example.com/JSSResource/patchsoftwaretitles";
    const DETAIL_URL: &str = "https://jss.example.com/JSSResource/patchsoftwaretitles/id/12";

    const DETAIL_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<patch_software_title>
  <id>12</id>
  <name>Mozilla Firefox</name>
  <name_id>0C3</name_id>
  <versions>
    <version><software_version>121.0</software_version><package/></version>
    <version><software_version>120.0.1</software_version><package><id>4</id></package></version>
  </versions>
</patch_software_title>"#;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.set("JSS_URL", "https://jss.example.com/");
        env.set("patch_softwaretitle", "Mozilla Firefox");
        env.set("API_USERNAME", "api");
        env.set("API_PASSWORD", "secret");
        env
    }

    fn titles() -> FakeTransport {
        FakeTransport::new()
            .respond(Method::Post, TOKEN_URL, 200, r#"{"token":"tok","expires":"2030-01-01T00:00:00Z"}"#)
            .respond(
                Method::Get,
                TITLES_URL,
                200,
                r#"{"patch_software_titles":[{"id":12,"name":"Mozilla Firefox"},{"id":13,"name":"Google Chrome"}]}"#,
            )
    }

    #[test]
    fn reports_id_and_newest_version() {
        let transport = titles().respond(Method::Get, DETAIL_URL, 200, DETAIL_XML);
        let (runner, sleeper) = (FakeRunner::new(), RecordingSleeper::default());
        let mut env = env();

        let report = execute(&JamfPatchTitleVersioner, &mut env, &context(&transport, &runner, &sleeper));

        let report = report.unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(report.outputs.get("patch_softwaretitle_id"), Some(&json!("12")));
        assert_eq!(report.outputs.get("latest_patch_version"), Some(&json!("121.0")));
        let detail = transport.requests_to(Method::Get, DETAIL_URL);
        assert_eq!(detail[0].header_value("Accept"), Some("application/xml"));
        let token = transport.requests_to(Method::Post, TOKEN_URL);
        assert!(token[0].header_value("Authorization").is_some_and(|v| v.starts_with("Basic ")));
    }

    #[test]
    fn unknown_title_is_not_found() {
        let transport = titles();
        let (runner, sleeper) = (FakeRunner::new(), RecordingSleeper::default());
        let mut env = env();
        env.set("patch_softwaretitle", "Safari");

        let err = execute(&JamfPatchTitleVersioner, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert_eq!(err.as_ref().map(|e| e.code), Some(ErrorCode::LookupNotFound));
        assert_eq!(
            err.map(|e| e.message),
            Some("Couldn't find patch software title with name 'Safari'".to_string())
        );
    }

    #[test]
    fn failed_detail_fetch_is_rejected() {
        let transport = titles().respond(Method::Get, DETAIL_URL, 500, "");
        let (runner, sleeper) = (FakeRunner::new(), RecordingSleeper::default());
        let mut env = env();

        let err = execute(&JamfPatchTitleVersioner, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::RemoteRejected));
        assert!(!env.contains("latest_patch_version"));
    }

    #[test]
    fn missing_title_input_is_reported_before_network() {
        let transport = titles();
        let (runner, sleeper) = (FakeRunner::new(), RecordingSleeper::default());
        let mut env = env();
        env.set("patch_softwaretitle", "");

        let err = execute(&JamfPatchTitleVersioner, &mut env, &context(&transport, &runner, &sleeper)).err();

        assert_eq!(err.map(|e| e.code), Some(ErrorCode::ConfigMissingKey));
        assert!(transport.requests().is_empty());
    }
}
