//! Jamf Pro API client: patch notifications and patch software titles.

use serde::{Deserialize, Deserializer};

use crate::auth::{jamf_token, JamfCredentials};
use crate::error::{Error, Result};
use crate::http::{join_url, require_status, HttpRequest, Transport};

pub const NOTIFICATIONS_PATH: &str = "/api/v1/notifications";
pub const PATCH_UPDATE_NOTIFICATIONS_PATH: &str = "/api/v1/notifications/PATCH_UPDATE";
pub const PATCH_SOFTWARE_TITLES_PATH: &str = "/JSSResource/patchsoftwaretitles";
pub const PATCH_UPDATE_KIND: &str = "PATCH_UPDATE";

const DISMISS_ACCEPTED: &[u16] = &[200, 201, 204];

/// Ids come back as strings from the v1 API and numbers from the Classic API.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationParams {
    #[serde(default)]
    pub software_title_name: Option<String>,
    #[serde(default)]
    pub latest_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub params: NotificationParams,
}

impl Notification {
    /// Only patch-update notifications can be dismissed under
    /// [`PATCH_UPDATE_NOTIFICATIONS_PATH`]; an absent type is taken as one.
    pub fn matches(&self, title: &str, version: &str) -> bool {
        matches!(self.kind.as_deref(), None | Some(PATCH_UPDATE_KIND))
            && self.params.software_title_name.as_deref() == Some(title)
            && self.params.latest_version.as_deref() == Some(version)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchSoftwareTitleSummary {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct PatchSoftwareTitleList {
    #[serde(default)]
    patch_software_titles: Vec<PatchSoftwareTitleSummary>,
}

/// `<patch_software_title>` detail document, reduced to the version list.
#[derive(Debug, Deserialize)]
struct PatchSoftwareTitleDetail {
    #[serde(default)]
    versions: Option<PatchVersions>,
}

#[derive(Debug, Deserialize)]
struct PatchVersions {
    #[serde(default)]
    version: Vec<PatchVersion>,
}

#[derive(Debug, Deserialize)]
struct PatchVersion {
    #[serde(default)]
    software_version: Option<String>,
}

/// Exactly one entry, none, or an ambiguity error listing the candidate ids.
pub fn unique_match<'a, T, F, I>(
    items: &'a [T],
    kind: &str,
    name: &str,
    predicate: F,
    id: I,
) -> Result<Option<&'a T>>
where
    F: Fn(&T) -> bool,
    I: Fn(&T) -> String,
{
    let matches: Vec<&T> = items.iter().filter(|item| predicate(*item)).collect();
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(Error::lookup_ambiguous(
            kind,
            name,
            many.iter().map(|item| id(*item)).collect(),
        )),
    }
}

/// An authenticated session against one Jamf Pro server.
pub struct JamfClient<'a> {
    transport: &'a dyn Transport,
    base_url: String,
    token: String,
}

impl<'a> JamfClient<'a> {
    pub fn connect(
        transport: &'a dyn Transport,
        base_url: &str,
        credentials: &JamfCredentials,
    ) -> Result<Self> {
        let token = jamf_token(transport, base_url, credentials)?;
        Ok(Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    pub fn notifications(&self) -> Result<Vec<Notification>> {
        let request = HttpRequest::get(self.url(NOTIFICATIONS_PATH))
            .accept_json()
            .bearer(&self.token);
        let response = self.transport.send(&request)?;
        require_status(&request, &response, &[200], "fetching notifications")?;
        response.json("notifications")
    }

    pub fn find_patch_notification(&self, title: &str, version: &str) -> Result<Option<Notification>> {
        let notifications = self.notifications()?;
        let found = unique_match(
            &notifications,
            "patch notification",
            &format!("{} {}", title, version),
            |n| n.matches(title, version),
            |n| n.id.clone(),
        )?;
        Ok(found.cloned())
    }

    pub fn dismiss_patch_notification(&self, id: &str) -> Result<()> {
        let url = format!("{}/{}", self.url(PATCH_UPDATE_NOTIFICATIONS_PATH), id);
        log_status!("jamf", "Dismissing {}", url);
        let request = HttpRequest::delete(url).bearer(&self.token);
        let response = self.transport.send(&request)?;
        require_status(
            &request,
            &response,
            DISMISS_ACCEPTED,
            "dismissing notification",
        )
    }

    pub fn patch_software_titles(&self) -> Result<Vec<PatchSoftwareTitleSummary>> {
        let request = HttpRequest::get(self.url(PATCH_SOFTWARE_TITLES_PATH))
            .accept_json()
            .bearer(&self.token);
        let response = self.transport.send(&request)?;
        require_status(&request, &response, &[200], "listing patch software titles")?;
        let list: PatchSoftwareTitleList = response.json("patch software titles")?;
        Ok(list.patch_software_titles)
    }

    pub fn patch_software_title_id(&self, name: &str) -> Result<String> {
        let titles = self.patch_software_titles()?;
        unique_match(
            &titles,
            "patch software title",
            name,
            |t| t.name == name,
            |t| t.id.clone(),
        )?
        .map(|t| t.id.clone())
        .ok_or_else(|| Error::not_found("patch software title", name))
    }

    /// First `versions/version/software_version` of the title, which Jamf
    /// lists newest first.
    pub fn latest_patch_version(&self, title_id: &str) -> Result<String> {
        log_status!("jamf", "Looking up latest version from patch software title (by ID)...");
        let url = format!("{}/id/{}", self.url(PATCH_SOFTWARE_TITLES_PATH), title_id);
        let request = HttpRequest::get(url).accept_xml().bearer(&self.token);
        let response = self.transport.send(&request)?;
        require_status(&request, &response, &[200], "fetching patch software title")?;
        latest_version_from_xml(&response.body)
    }
}

pub fn latest_version_from_xml(xml: &str) -> Result<String> {
    let detail: PatchSoftwareTitleDetail = quick_xml::de::from_str(xml)
        .map_err(|e| Error::parse_xml(e.to_string(), Some("patch software title".to_string())))?;

    detail
        .versions
        .and_then(|v| v.version.into_iter().find_map(|v| v.software_version))
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            Error::parse_xml(
                "no versions/version/software_version element",
                Some("patch software title".to_string()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::http::Method;
    use crate::test_support::FakeTransport;

    const JSS: &str = "https://jamf.example.com";

    fn basic() -> JamfCredentials {
        JamfCredentials::Basic {
            username: "api".to_string(),
            password: "pw".to_string(),
        }
    }

    fn authed() -> FakeTransport {
        FakeTransport::new().respond(
            Method::Post,
            "https://jamf.example.com/api/v1/auth/token",
            200,
            r#"{"token":"t0k"}"#,
        )
    }

    #[test]
    fn xml_first_version_wins() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <patch_software_title>
              <id>12</id>
              <name>Mozilla Firefox</name>
              <versions>
                <version><software_version>121.0</software_version><package/></version>
                <version><software_version>120.0.1</software_version><package/></version>
              </versions>
            </patch_software_title>"#;
        assert_eq!(latest_version_from_xml(xml).ok().as_deref(), Some("121.0"));
    }

    #[test]
    fn xml_without_versions_is_parse_error() {
        let xml = "<patch_software_title><id>1</id><versions/></patch_software_title>";
        assert_eq!(latest_version_from_xml(xml).err().map(|e| e.code), Some(ErrorCode::ParseXml));

        let broken = "<patch_software_title><versions>";
        assert_eq!(latest_version_from_xml(broken).err().map(|e| e.code), Some(ErrorCode::ParseXml));
    }

    #[test]
    fn notification_ids_accept_numbers_and_strings() {
        let parsed: Vec<Notification> = serde_json::from_str(
            r#"[{"id":"7","type":"PATCH_UPDATE","params":{"softwareTitleName":"Firefox","latestVersion":"120.0"}},
                {"id":8,"type":"CERT_EXPIRING"}]"#,
        )
        .unwrap_or_default();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "7");
        assert!(parsed[0].matches("Firefox", "120.0"));
        assert_eq!(parsed[1].id, "8");
        assert!(!parsed[1].matches("Firefox", "120.0"));
    }

    #[test]
    fn other_notification_types_never_match() {
        let parsed: Vec<Notification> = serde_json::from_str(
            r#"[{"id":"3","type":"SOFTWARE_TITLE_UPDATE","params":{"softwareTitleName":"Firefox","latestVersion":"120.0"}},
                {"id":"4","params":{"softwareTitleName":"Firefox","latestVersion":"120.0"}}]"#,
        )
        .unwrap_or_default();

        assert_eq!(parsed.len(), 2);
        assert!(!parsed[0].matches("Firefox", "120.0"));
        assert!(parsed[1].matches("Firefox", "120.0"));

        let transport = authed().respond(
            Method::Get,
            "https://jamf.example.com/api/v1/notifications",
            200,
            r#"[{"id":"3","type":"SOFTWARE_TITLE_UPDATE","params":{"softwareTitleName":"Firefox","latestVersion":"120.0"}},
                {"id":"7","type":"PATCH_UPDATE","params":{"softwareTitleName":"Firefox","latestVersion":"120.0"}}]"#,
        );
        let client = match JamfClient::connect(&transport, JSS, &basic()) {
            Ok(c) => c,
            Err(e) => panic!("connect failed: {}", e),
        };
        let found = client
            .find_patch_notification("Firefox", "120.0")
            .unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(found.map(|n| n.id), Some("7".to_string()));
    }

    #[test]
    fn title_lookup_by_name() {
        let transport = authed().respond(
            Method::Get,
            "https://jamf.example.com/JSSResource/patchsoftwaretitles",
            200,
            r#"{"patch_software_titles":[{"id":3,"name":"Google Chrome"},{"id":12,"name":"Mozilla Firefox"}]}"#,
        );
        let client = match JamfClient::connect(&transport, JSS, &basic()) {
            Ok(c) => c,
            Err(e) => panic!("connect failed: {}", e),
        };

        assert_eq!(client.patch_software_title_id("Mozilla Firefox").ok().as_deref(), Some("12"));
        assert_eq!(
            client.patch_software_title_id("Safari").err().map(|e| e.code),
            Some(ErrorCode::LookupNotFound)
        );
        let sent = transport.requests_to(Method::Get, "https://jamf.example.com/JSSResource/patchsoftwaretitles");
        assert_eq!(sent[0].header_value("Authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn duplicate_title_names_are_flagged() {
        let transport = authed().respond(
            Method::Get,
            "https://jamf.example.com/JSSResource/patchsoftwaretitles",
            200,
            r#"{"patch_software_titles":[{"id":3,"name":"Zoom"},{"id":4,"name":"Zoom"}]}"#,
        );
        let client = match JamfClient::connect(&transport, JSS, &basic()) {
            Ok(c) => c,
            Err(e) => panic!("connect failed: {}", e),
        };

        let err = client.patch_software_title_id("Zoom").err();
        let err = err.map(|e| (e.code, e.details["candidates"].clone()));
        assert_eq!(
            err,
            Some((ErrorCode::LookupAmbiguous, serde_json::json!(["3", "4"])))
        );
    }

    #[test]
    fn dismiss_rejects_unexpected_status() {
        let transport = authed().respond(
            Method::Delete,
            "https://jamf.example.com/api/v1/notifications/PATCH_UPDATE/7",
            404,
            "",
        );
        let client = match JamfClient::connect(&transport, JSS, &basic()) {
            Ok(c) => c,
            Err(e) => panic!("connect failed: {}", e),
        };

        let err = client.dismiss_patch_notification("7").err();
        let err = err.map(|e| (e.code, e.details["status"].clone()));
        assert_eq!(err, Some((ErrorCode::RemoteRejected, serde_json::json!(404))));
    }
}
