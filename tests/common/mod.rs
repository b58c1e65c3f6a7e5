// Test helpers are intentionally partially used
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use garant::domain::{MetricsPtr, RepositoryPtr};
use garant::{
    create_memory_repository, create_noop_metrics, create_router_with, AppConfig, AuthConfig,
    ServerConfig, StoreKind, UploadConfig,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct horse battery staple";

// ============================================================================
// Test Setup
// ============================================================================

/// Configuration for an in-memory app writing uploads under `upload_dir`.
pub fn test_config(upload_dir: &Path) -> AppConfig {
    // ---
    AppConfig {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            allowed_origins: Vec::new(),
        },
        store: StoreKind::Memory,
        database: None,
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            access_ttl: Duration::from_secs(900),
            refreshed_access_ttl: Duration::from_secs(2_400),
            refresh_ttl: Duration::from_secs(604_800),
            // Minimum bcrypt cost keeps the suite fast.
            bcrypt_cost: 4,
        },
        uploads: UploadConfig {
            dir: upload_dir.to_path_buf(),
            max_bytes: 1024 * 1024,
        },
    }
}

/// A router over a fresh in-memory store. Keep the struct alive for as long
/// as the upload directory is needed.
pub struct TestApp {
    pub router: Router,
    pub repository: RepositoryPtr,
    pub uploads: TempDir,
}

impl TestApp {
    // ---
    pub fn new() -> Self {
        // ---
        Self::with_metrics(create_noop_metrics().expect("noop metrics"))
    }

    pub fn with_metrics(metrics: MetricsPtr) -> Self {
        // ---
        Self::build(metrics, |_| {})
    }

    /// Like `new`, with the test configuration adjusted first.
    pub fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Self {
        // ---
        Self::build(create_noop_metrics().expect("noop metrics"), configure)
    }

    fn build(metrics: MetricsPtr, configure: impl FnOnce(&mut AppConfig)) -> Self {
        // ---
        let uploads = tempfile::tempdir().expect("temp upload dir");
        let repository = create_memory_repository();
        let mut config = test_config(uploads.path());
        configure(&mut config);

        let router = create_router_with(&config, repository.clone(), metrics)
            .expect("Should be able to create router");

        Self {
            router,
            repository,
            uploads,
        }
    }

    /// Drives one request through the router and decodes a JSON body
    /// (`Value::Null` for an empty or non-JSON body).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        // ---
        let (status, bytes) = self.send_raw(request).await;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        // ---
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes()
            .to_vec();
        (status, bytes)
    }

    /// Registers, logs in and creates the profile. Returns the logged-in user.
    pub async fn signed_up_user(&self, username: &str) -> TestUser {
        // ---
        let email = format!("{username}@example.com");

        let (status, _) = self
            .send(json_request(
                Method::POST,
                "/register",
                None,
                json!({ "username": username, "password": PASSWORD, "email": email }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}");

        let (status, login) = self
            .send(json_request(
                Method::POST,
                "/login",
                None,
                json!({ "username": username, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login {username}");

        let user = TestUser {
            id: login["user"]["id"].as_str().expect("user id").to_string(),
            token: login["token"].as_str().expect("token").to_string(),
            refresh_token: login["refreshToken"].as_str().expect("refresh").to_string(),
        };

        let (status, _) = self
            .send(json_request(
                Method::POST,
                "/users",
                Some(&user.token),
                json!({ "firstName": "Test", "lastName": username }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create profile {username}");

        user
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub token: String,
    pub refresh_token: String,
}

impl TestUser {
    pub fn path(&self, suffix: &str) -> String {
        // ---
        format!("/users/{}{}", self.id, suffix)
    }
}

// ============================================================================
// Request builders
// ============================================================================

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    // ---
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    // ---
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("valid request")
}

const BOUNDARY: &str = "garant-test-boundary";

/// A file part: (field name, file name, content).
pub type FilePart<'a> = (&'a str, &'a str, &'a [u8]);

/// Builds a `multipart/form-data` request from text fields and file parts.
pub fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    files: &[FilePart<'_>],
) -> Request<Body> {
    // ---
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .expect("valid request")
}

// ============================================================================
// Real listener
// ============================================================================

/// Serves the router on an ephemeral port, for tests that need a real HTTP client.
pub async fn spawn_server(router: Router) -> SocketAddr {
    // ---
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}
