//! Shared fixtures for the fedreg-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use fedreg_common::api::issue_token;
use fedreg_common::config::{reports_dir, uploads_dir, AppConfig};
use fedreg_common::db::User;
use fedreg_server::db::users::{self, NewUser};
use fedreg_server::services::diagnosis::InMemoryDiagnosisStore;
use fedreg_server::services::inference::{Completion, InferenceError, InferenceRequest};
use fedreg_server::services::{
    DiagnosisService, InferenceClient, LocalDirStore, ReportRenderer, TieredStorage,
};
use fedreg_server::{build_router, AppState};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const TEST_MODEL: &str = "test-vl-model";
pub const STUB_REPORT: &str = "No active pulmonary tuberculosis.\nLungs are clear.";

/// In-memory database with the full schema
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");
    fedreg_common::db::create_schema(&pool)
        .await
        .expect("Should create schema");
    pool
}

// =============================================================================
// Inference stub
// =============================================================================

#[derive(Debug, Clone)]
pub enum StubReply {
    Content(String),
    Malformed,
    NetworkError,
}

/// Inference client returning a canned reply and recording requests
pub struct StubInference {
    reply: StubReply,
    calls: AtomicUsize,
    last_request: Mutex<Option<InferenceRequest>>,
}

impl StubInference {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn reporting(text: &str) -> Arc<Self> {
        Self::new(StubReply::Content(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<InferenceRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for StubInference {
    async fn infer(&self, request: &InferenceRequest) -> Result<Completion, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.reply {
            StubReply::Content(text) => Ok(Completion::Content(text.clone())),
            StubReply::Malformed => Ok(Completion::Malformed),
            StubReply::NetworkError => {
                Err(InferenceError::Network("connection refused".to_string()))
            }
        }
    }
}

// =============================================================================
// Application
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub root: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_inference(StubInference::reporting(STUB_REPORT)).await
    }

    /// Local-only storage under a temp root, in-memory diagnosis records
    pub async fn with_inference(inference: Arc<dyn InferenceClient>) -> Self {
        let root = tempfile::tempdir().expect("Should create temp root");
        let db = memory_pool().await;

        let mut config = AppConfig::default();
        config.root_folder = Some(root.path().to_path_buf());

        let reports =
            TieredStorage::new(None, LocalDirStore::new(reports_dir(root.path()), "/docs"));
        let images =
            TieredStorage::new(None, LocalDirStore::new(uploads_dir(root.path()), "/uploads"));
        let diagnosis = DiagnosisService::new(
            inference,
            ReportRenderer::new(),
            reports,
            Arc::new(InMemoryDiagnosisStore::new()),
            TEST_MODEL,
        );

        let state = AppState::new(db, config, diagnosis, images, root.path());
        let router = build_router(state.clone());
        Self { router, state, root }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router should not fail")
    }

    /// Send and decode the JSON envelope
    pub async fn send_json(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.send(request).await;
        let status = response.status().as_u16();
        (status, body_json(response).await)
    }

    /// Create an account directly and return it with a valid token
    pub async fn user_with_token(&self, username: &str, role: &str) -> (User, String) {
        let user = users::create(
            &self.state.db,
            &NewUser {
                username: username.to_string(),
                email: format!("{}@example.org", username),
                full_name: format!("Test {}", username),
                role: role.to_string(),
                department: None,
                phone: None,
                password: "password123".to_string(),
            },
        )
        .await
        .expect("Should create user");

        let token = issue_token(
            user.user_id,
            &user.username,
            &user.role,
            &self.state.config.auth.jwt_secret,
            1,
        )
        .expect("Should issue token");
        (user, token)
    }
}

// =============================================================================
// Requests
// =============================================================================

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn delete_authed(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

const BOUNDARY: &str = "fedreg-test-boundary";

/// Hand-assembled `multipart/form-data` body
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.bytes
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.bytes))
            .unwrap()
    }
}

/// A few bytes standing in for an image; nothing decodes them
pub fn fake_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}
