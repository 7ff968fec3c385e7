//! HTTP transport for the remote APIs.
//!
//! Requests are plain values so callers and tests can inspect them; the
//! [`Transport`] trait sends them. [`ReqwestTransport`] is the real,
//! blocking implementation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, RemoteRejectedDetails, Result};

const USER_AGENT: &str = concat!("pkgsteps/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        self.header("Authorization", format!("Basic {}", encoded))
    }

    pub fn accept_json(self) -> Self {
        self.header("Accept", "application/json")
    }

    pub fn accept_xml(self) -> Self {
        self.header("Accept", "application/xml")
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn form<K, V>(mut self, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.body = Body::Form(
            pairs
                .iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .collect(),
        );
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Deserialize the body into an explicit schema.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::parse_json(e.to_string(), Some(context.to_string())))
    }
}

/// Fail with `remote.rejected` unless the status is in `accepted`.
pub fn require_status(
    request: &HttpRequest,
    response: &HttpResponse,
    accepted: &[u16],
    context: &str,
) -> Result<()> {
    if accepted.contains(&response.status) {
        return Ok(());
    }
    Err(Error::remote_rejected(RemoteRejectedDetails {
        method: request.method.as_str().to_string(),
        url: request.url.clone(),
        status: response.status,
        context: context.to_string(),
        error_code: None,
        body: response.body.clone(),
    }))
}

/// Join a configured base URL and an API path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking reqwest client. Any status is returned to the caller; only
/// transport-level failures become errors here.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Form(pairs) => builder.form(pairs),
        };

        let response = builder
            .send()
            .map_err(|e| Error::http_request_failed(&request.url, e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Error::http_request_failed(&request.url, e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_is_base64() {
        let request = HttpRequest::post("https://example.com").basic_auth("user", "pass");
        assert_eq!(request.header_value("authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("https://jamf.example.com/", "/api/v1/auth/token"),
            "https://jamf.example.com/api/v1/auth/token"
        );
        assert_eq!(
            join_url("https://jamf.example.com", "api/v1/notifications"),
            "https://jamf.example.com/api/v1/notifications"
        );
    }

    #[test]
    fn require_status_accepts_listed_codes() {
        let request = HttpRequest::delete("https://example.com/x");
        assert!(require_status(&request, &HttpResponse::new(204, ""), &[200, 201, 204], "x").is_ok());

        let err = require_status(&request, &HttpResponse::new(409, "conflict"), &[200], "deleting x")
            .err();
        let err = err.map(|e| (e.code, e.details["status"].clone()));
        assert_eq!(
            err,
            Some((crate::error::ErrorCode::RemoteRejected, serde_json::json!(409)))
        );
    }

    #[test]
    fn json_reports_context_on_schema_mismatch() {
        let response = HttpResponse::new(200, "[1,2,3]");
        let parsed: Result<std::collections::HashMap<String, String>> = response.json("token response");
        let err = parsed.err().map(|e| (e.code, e.details["context"].clone()));
        assert_eq!(
            err,
            Some((crate::error::ErrorCode::ParseJson, serde_json::json!("token response")))
        );
    }
}
