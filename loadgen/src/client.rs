//! HTTP client wrapper for the portal backend
//!
//! Wraps a pooled `reqwest::Client` with bearer authentication, JSON bodies
//! and latency sampling. Requests never fail at the Rust level: a transport
//! error comes back as an [`ApiResponse`] without a status, so callers can
//! treat "no response" and "bad status" the same way.

use crate::error::SetupError;
use crate::metrics::RunMetrics;
use reqwest::{Client, Method, header};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bearer token shared read-only by every VU for the whole run
#[derive(Clone)]
pub struct Session {
    token: Arc<str>,
}

impl Session {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Login credentials for the test account
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Server-assigned identifier of a created resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId(String);

impl ResourceId {
    /// Extract an identifier from a JSON value.
    ///
    /// Only truthy values count: non-zero numbers and non-empty strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one request
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status, `None` if the request never got a response
    pub status: Option<u16>,
    /// Parsed JSON body, `None` for empty or non-JSON bodies
    pub body: Option<Value>,
    pub latency: Duration,
    /// Transport error message, if any
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn status_is(&self, expected: u16) -> bool {
        self.status == Some(expected)
    }

    /// Top-level JSON field lookup that tolerates non-JSON bodies
    pub fn json_field(&self, name: &str) -> Option<&Value> {
        self.body.as_ref()?.get(name)
    }

    /// Identifier of a created resource: status must be 201 and `ID` truthy
    pub fn created_id(&self) -> Option<ResourceId> {
        if !self.status_is(201) {
            return None;
        }
        self.json_field("ID").and_then(ResourceId::from_json)
    }
}

/// Pooled HTTP client bound to one backend
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    metrics: Arc<RunMetrics>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        metrics: Arc<RunMetrics>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .pool_max_idle_per_host(100)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    /// Exchange credentials for a session token.
    ///
    /// Anything other than HTTP 200 with a non-empty string `token` is fatal.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, SetupError> {
        let resp = self
            .send(Method::POST, "/login", "POST /login", Some(credentials), None)
            .await;

        if let Some(error) = resp.error {
            return Err(SetupError::Transport(error));
        }
        match resp.status {
            Some(200) => {}
            Some(status) => return Err(SetupError::LoginRejected { status }),
            None => return Err(SetupError::Transport("no response".to_string())),
        }

        match resp.json_field("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(Session::new(token)),
            _ => Err(SetupError::MissingToken),
        }
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        session: &Session,
        path: &str,
        endpoint: &'static str,
        body: Option<&B>,
    ) -> ApiResponse {
        self.send(Method::POST, path, endpoint, body, Some(session))
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        session: &Session,
        path: &str,
        endpoint: &'static str,
        body: &B,
    ) -> ApiResponse {
        self.send(Method::PUT, path, endpoint, Some(body), Some(session))
            .await
    }

    pub async fn delete(&self, session: &Session, path: &str, endpoint: &'static str) -> ApiResponse {
        self.send::<()>(Method::DELETE, path, endpoint, None, Some(session))
            .await
    }

    /// Send one request and record it under `endpoint`
    ///
    /// `endpoint` is the metric name with identifiers templated out, e.g.
    /// `DELETE /posts/{id}`, so series stay bounded no matter how many
    /// resources a run creates.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        endpoint: &'static str,
        body: Option<&B>,
        session: Option<&Session>,
    ) -> ApiResponse {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method, &url)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session) = session {
            req = req.header(header::AUTHORIZATION, session.bearer());
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let start = Instant::now();
        let result = req.send().await;

        let response = match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let bytes = resp.bytes().await;
                let latency = start.elapsed();
                let body = bytes
                    .ok()
                    .and_then(|b| serde_json::from_slice::<Value>(&b).ok());
                ApiResponse {
                    status: Some(status),
                    body,
                    latency,
                    error: None,
                }
            }
            Err(e) => {
                let latency = start.elapsed();
                warn!("{} failed: {}", endpoint, e);
                ApiResponse {
                    status: None,
                    body: None,
                    latency,
                    error: Some(e.to_string()),
                }
            }
        };

        debug!(
            endpoint,
            status = ?response.status,
            latency_ms = response.latency.as_millis() as u64,
            "request complete"
        );
        self.metrics
            .record_http(endpoint, response.status, response.latency);

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: Option<u16>, body: Option<Value>) -> ApiResponse {
        ApiResponse {
            status,
            body,
            latency: Duration::ZERO,
            error: None,
        }
    }

    #[test]
    fn test_resource_id_truthiness() {
        assert_eq!(
            ResourceId::from_json(&json!(42)).map(|id| id.to_string()),
            Some("42".to_string())
        );
        assert_eq!(
            ResourceId::from_json(&json!("abc")).map(|id| id.to_string()),
            Some("abc".to_string())
        );
        assert!(ResourceId::from_json(&json!(0)).is_none());
        assert!(ResourceId::from_json(&json!("")).is_none());
        assert!(ResourceId::from_json(&json!(null)).is_none());
        assert!(ResourceId::from_json(&json!(false)).is_none());
        assert!(ResourceId::from_json(&json!({"nested": 1})).is_none());
    }

    #[test]
    fn test_created_id_requires_201() {
        let body = Some(json!({"ID": 7}));
        assert_eq!(
            response(Some(201), body.clone()).created_id(),
            Some(ResourceId("7".to_string()))
        );
        assert!(response(Some(200), body).created_id().is_none());
        assert!(response(Some(201), None).created_id().is_none());
        assert!(response(Some(201), Some(json!({"id": 7}))).created_id().is_none());
        assert!(response(None, None).created_id().is_none());
    }

    #[test]
    fn test_json_field_on_non_object_body() {
        let resp = response(Some(200), Some(json!([1, 2, 3])));
        assert!(resp.json_field("token").is_none());
        assert!(resp.status_is(200));
        assert!(!resp.status_is(201));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let session = Session::new("secret-token");
        assert!(!format!("{:?}", session).contains("secret-token"));
        assert_eq!(session.token(), "secret-token");

        let creds = Credentials {
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
