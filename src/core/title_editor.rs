//! Title Editor (patch catalog) client and the patch document it accepts.

use serde::{Deserialize, Serialize};

use crate::auth::{title_editor_token, TitleEditorCredentials};
use crate::error::{Error, RemoteRejectedDetails, Result};
use crate::http::{join_url, HttpRequest, HttpResponse, Transport};

pub const DUPLICATE_RECORD: &str = "DUPLICATE_RECORD";

const PATCH_ACCEPTED: &[u16] = &[200, 201];
const VERSION_ACCEPTED: &[u16] = &[200, 201];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillApp {
    pub bundle_id: String,
    pub app_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub name: String,
    pub operator: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<bool>,
}

impl Criterion {
    fn recon(name: &str, operator: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            operator: operator.to_string(),
            value: value.to_string(),
            kind: "recon".to_string(),
            and: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub version: String,
    pub criteria: Vec<Criterion>,
}

/// A new patch version for a software title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchDefinition {
    pub patch_id: u64,
    pub software_title_id: u64,
    pub absolute_order_id: u64,
    pub version: String,
    pub release_date: String,
    pub standalone: bool,
    pub minimum_operating_system: String,
    pub reboot: bool,
    pub kill_apps: Vec<KillApp>,
    pub components: Vec<Component>,
    pub capabilities: Vec<Criterion>,
    pub dependencies: Vec<serde_json::Value>,
}

/// What the patch definition is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchFacts {
    pub software_title_id: u64,
    pub version: String,
    pub app_name: String,
    pub bundle_id: String,
    pub minimum_os: String,
    pub release_date: String,
}

impl PatchDefinition {
    pub fn from_facts(facts: &PatchFacts) -> Self {
        let display_name = facts
            .app_name
            .strip_suffix(".app")
            .unwrap_or(&facts.app_name)
            .to_string();

        let mut bundle_criterion =
            Criterion::recon("Application Bundle ID", "is", &facts.bundle_id);
        bundle_criterion.and = Some(true);

        Self {
            patch_id: 0,
            software_title_id: facts.software_title_id,
            absolute_order_id: 0,
            version: facts.version.clone(),
            release_date: facts.release_date.clone(),
            standalone: true,
            minimum_operating_system: facts.minimum_os.clone(),
            reboot: false,
            kill_apps: vec![KillApp {
                bundle_id: facts.bundle_id.clone(),
                app_name: facts.app_name.clone(),
            }],
            components: vec![Component {
                name: display_name,
                version: facts.version.clone(),
                criteria: vec![
                    bundle_criterion,
                    Criterion::recon("Application Version", "is", &facts.version),
                ],
            }],
            capabilities: vec![Criterion::recon(
                "Operating System Version",
                "greater than or equal",
                &facts.minimum_os,
            )],
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentVersion {
    pub current_version: String,
    pub software_title_id: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    code: Option<String>,
}

fn first_error_code(response: &HttpResponse) -> Option<String> {
    serde_json::from_str::<ErrorBody>(&response.body)
        .ok()?
        .errors
        .into_iter()
        .find_map(|e| e.code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Published,
    AlreadyCurrent,
}

pub struct TitleEditorClient<'a> {
    transport: &'a dyn Transport,
    base_url: String,
    token: String,
    debug: bool,
}

impl<'a> TitleEditorClient<'a> {
    pub fn connect(
        transport: &'a dyn Transport,
        base_url: &str,
        credentials: &TitleEditorCredentials,
    ) -> Result<Self> {
        let token = title_editor_token(transport, base_url, credentials)?;
        Ok(Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.token,
            debug: false,
        })
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self.transport.send(request)?;
        log_debug!(self.debug, "HTTP Code is {}", response.status);
        log_debug!(self.debug, "Returned data is {}", response.body);
        Ok(response)
    }

    fn rejected(
        request: &HttpRequest,
        response: &HttpResponse,
        context: String,
        error_code: Option<String>,
    ) -> Error {
        Error::remote_rejected(RemoteRejectedDetails {
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            status: response.status,
            context,
            error_code,
            body: response.body.clone(),
        })
    }

    /// Post a new patch, then point the title's current version at it.
    /// A duplicate record means the title is already at this version.
    pub fn publish(
        &self,
        title_id: u64,
        patch: &PatchDefinition,
        current: &CurrentVersion,
        title_name: &str,
    ) -> Result<PublishOutcome> {
        let patch_body = serde_json::to_value(patch)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize patch".to_string())))?;
        let patch_url = join_url(&self.base_url, &format!("/v2/softwaretitles/{}/patches", title_id));
        let request = HttpRequest::post(patch_url)
            .accept_json()
            .bearer(&self.token)
            .json(patch_body);
        let response = self.send(&request)?;

        if PATCH_ACCEPTED.contains(&response.status) {
            log_status!("title-editor", "New version - setting currentVersion");
            self.set_current_version(title_id, current, title_name)?;
            return Ok(PublishOutcome::Published);
        }

        if response.status == 400 {
            let code = first_error_code(&response);
            if code.as_deref() == Some(DUPLICATE_RECORD) {
                log_status!("title-editor", "{} was already at this version", title_name);
                return Ok(PublishOutcome::AlreadyCurrent);
            }
            return Err(Self::rejected(
                &request,
                &response,
                format!("sending Patch-Data for {}", title_name),
                code,
            ));
        }

        Err(Self::rejected(
            &request,
            &response,
            format!("sending Patch-Data for {}", title_name),
            first_error_code(&response),
        ))
    }

    pub fn set_current_version(
        &self,
        title_id: u64,
        current: &CurrentVersion,
        title_name: &str,
    ) -> Result<()> {
        let body = serde_json::to_value(current)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize version".to_string())))?;
        let url = join_url(&self.base_url, &format!("/v2/softwaretitles/{}", title_id));
        let request = HttpRequest::put(url).bearer(&self.token).json(body);
        let response = self.send(&request)?;
        if VERSION_ACCEPTED.contains(&response.status) {
            return Ok(());
        }
        Err(Self::rejected(
            &request,
            &response,
            format!("setting version for {}", title_name),
            first_error_code(&response),
        ))
    }
}
