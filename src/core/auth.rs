//! Bearer token exchanges for the Jamf Pro API and Title Editor.

use serde::Deserialize;

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::http::{join_url, HttpRequest, Transport};

pub const JAMF_TOKEN_PATH: &str = "/api/v1/auth/token";
pub const TITLE_EDITOR_TOKEN_PATH: &str = "/v2/auth/tokens";

/// Credentials for the Jamf Pro API. API clients win over user accounts
/// when both are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JamfCredentials {
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl JamfCredentials {
    pub fn from_env(env: &Environment) -> Result<Self> {
        if let (Some(client_id), Some(client_secret)) =
            (env.get_str("CLIENT_ID"), env.get_str("CLIENT_SECRET"))
        {
            return Ok(Self::ClientCredentials {
                client_id,
                client_secret,
            });
        }
        if let (Some(username), Some(password)) =
            (env.get_str("API_USERNAME"), env.get_str("API_PASSWORD"))
        {
            return Ok(Self::Basic { username, password });
        }
        log_status!("jamf", "Jamf API credentials are not in prefs");
        Err(Error::auth_missing_credentials(
            "Jamf Pro",
            &["CLIENT_ID", "CLIENT_SECRET", "API_USERNAME", "API_PASSWORD"],
        ))
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct BasicTokenResponse {
    token: String,
}

/// Token response from Title Editor.
#[derive(Debug, Clone, Deserialize)]
pub struct TitleEditorToken {
    pub token: String,
    #[serde(default)]
    pub expires: Option<serde_json::Value>,
}

pub fn jamf_token(
    transport: &dyn Transport,
    base_url: &str,
    credentials: &JamfCredentials,
) -> Result<String> {
    let url = join_url(base_url, JAMF_TOKEN_PATH);
    match credentials {
        JamfCredentials::ClientCredentials {
            client_id,
            client_secret,
        } => {
            let request = HttpRequest::post(&url).form(&[
                ("client_id", client_id.as_str()),
                ("grant_type", "client_credentials"),
                ("client_secret", client_secret.as_str()),
            ]);
            let response = transport.send(&request)?;
            if response.status != 200 {
                return Err(Error::auth_failed(url, response.status));
            }
            let parsed: OAuthTokenResponse = response.json("Jamf Pro token response")?;
            Ok(parsed.access_token)
        }
        JamfCredentials::Basic { username, password } => {
            let request = HttpRequest::post(&url)
                .basic_auth(username, password)
                .header("Content-Type", "application/json");
            let response = transport.send(&request)?;
            if response.status != 200 {
                return Err(Error::auth_failed(url, response.status));
            }
            let parsed: BasicTokenResponse = response.json("Jamf Pro token response")?;
            Ok(parsed.token)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleEditorCredentials {
    pub username: String,
    pub password: String,
}

impl TitleEditorCredentials {
    pub fn from_env(env: &Environment) -> Result<Self> {
        match (env.get_str("TITLE_USER"), env.get_str("TITLE_PASS")) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => {
                log_status!("title-editor", "Title User and Pass are not in prefs");
                Err(Error::auth_missing_credentials(
                    "Title Editor",
                    &["TITLE_USER", "TITLE_PASS"],
                ))
            }
        }
    }
}

pub fn title_editor_token(
    transport: &dyn Transport,
    base_url: &str,
    credentials: &TitleEditorCredentials,
) -> Result<TitleEditorToken> {
    let url = join_url(base_url, TITLE_EDITOR_TOKEN_PATH);
    let request = HttpRequest::post(&url)
        .basic_auth(&credentials.username, &credentials.password)
        .header("Content-Type", "application/json");
    let response = transport.send(&request)?;
    if response.status != 200 {
        return Err(Error::auth_failed(url, response.status));
    }
    response.json("Title Editor token response")
}
