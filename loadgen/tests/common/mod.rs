//! Common Test Utilities for Integration Tests
//!
//! A mock portal backend served on an ephemeral port. Every request it
//! receives is recorded so tests can assert which follow-ups went out.

#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use portal_loadgen::{ApiClient, Credentials, RunMetrics};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_EMAIL: &str = "loadtest@example.com";
pub const TEST_PASSWORD: &str = "loadtest-password";
pub const TEST_TOKEN: &str = "mock-token-123";

/// Knobs for making the mock misbehave
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    pub fail_company_create: bool,
    pub fail_internship_create: bool,
    pub fail_post_create: bool,
    /// Return `"ID": 0` from company creates
    pub zero_company_id: bool,
    /// Answer login with 200 but no token
    pub login_without_token: bool,
    /// Answer company updates with 500
    pub fail_company_update: bool,
    pub fail_comment: bool,
    /// Answer like (not unlike) with 500
    pub fail_like: bool,
}

/// One request as the backend saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

pub struct MockBackend {
    behavior: MockBehavior,
    next_id: AtomicU64,
    log: Mutex<Vec<RecordedRequest>>,
}

impl MockBackend {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Requests matching a method and exact path
    pub fn matching(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Requests whose path starts with `prefix`
    pub fn with_prefix(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Spawn the mock backend, returning its base URL and a handle for assertions
pub async fn spawn_backend(behavior: MockBehavior) -> (String, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend {
        behavior,
        next_id: AtomicU64::new(1),
        log: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .fallback(handle)
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), backend)
}

/// Build a client wired to a fresh metric sink
pub fn test_client(base_url: &str) -> (ApiClient, Arc<RunMetrics>) {
    let metrics = Arc::new(RunMetrics::new());
    let client = ApiClient::new(base_url, Duration::from_secs(5), metrics.clone()).unwrap();
    (client, metrics)
}

pub fn valid_credentials() -> Credentials {
    Credentials {
        email: TEST_EMAIL.to_string(),
        password: TEST_PASSWORD.to_string(),
    }
}

pub fn invalid_credentials() -> Credentials {
    Credentials {
        email: TEST_EMAIL.to_string(),
        password: "wrong".to_string(),
    }
}

async fn handle(
    State(backend): State<Arc<MockBackend>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body: Option<Value> = serde_json::from_slice(&body).ok();

    backend.log.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        authorization: authorization.clone(),
        body: body.clone(),
    });

    let behavior = &backend.behavior;
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    if segments.as_slice() == ["login"] && method == Method::POST {
        let email = body.as_ref().and_then(|b| b["email"].as_str());
        let password = body.as_ref().and_then(|b| b["password"].as_str());
        if email != Some(TEST_EMAIL) || password != Some(TEST_PASSWORD) {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"error": "invalid credentials"})),
            )
                .into_response();
        }
        if behavior.login_without_token {
            return (StatusCode::OK, axum::Json(json!({}))).into_response();
        }
        return (StatusCode::OK, axum::Json(json!({"token": TEST_TOKEN}))).into_response();
    }

    let expected = format!("Bearer {}", TEST_TOKEN);
    if authorization.as_deref() != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let server_error = || -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({"error": "boom"})),
        )
            .into_response()
    };

    let created = |fail: bool, zero: bool| -> Response {
        if fail {
            return server_error();
        }
        let id = if zero { 0 } else { backend.allocate_id() };
        (StatusCode::CREATED, axum::Json(json!({"ID": id}))).into_response()
    };

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["company_lists"]) => {
            created(behavior.fail_company_create, behavior.zero_company_id)
        }
        ("PUT", ["company_lists", _]) if behavior.fail_company_update => server_error(),
        ("PUT", ["company_lists", _]) | ("DELETE", ["company_lists", _]) => {
            StatusCode::OK.into_response()
        }
        ("POST", ["internships"]) => created(behavior.fail_internship_create, false),
        ("POST", ["posts"]) => created(behavior.fail_post_create, false),
        ("POST", ["posts", _, "comments"]) if behavior.fail_comment => server_error(),
        ("POST", ["posts", _, "like"]) if behavior.fail_like => server_error(),
        ("POST", ["posts", _, "comments"]) => {
            (StatusCode::CREATED, axum::Json(json!({"ID": backend.allocate_id()}))).into_response()
        }
        ("POST", ["posts", _, "like"]) | ("DELETE", ["posts", _, "like"]) => {
            StatusCode::OK.into_response()
        }
        ("DELETE", ["posts", _]) => StatusCode::OK.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
