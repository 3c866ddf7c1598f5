//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which points the store at a temporary upload
//! directory, configures a known admin password, and builds the router.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use imagebed::config::Config;
use imagebed::server::auth::{AuthSession, SESSION_COOKIE_NAME};
use imagebed::server::{create_router, AppContext};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse";
pub const TEST_HOST: &str = "img.test:8003";
pub const BOUNDARY: &str = "imagebed-test-boundary";

/// Test harness owning a temporary upload directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub dir: TempDir,
}

impl TestHarness {
    /// Harness with default settings and a bcrypt-hashed test password.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Harness with config tweaks applied on top of the test defaults.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads");
        config.auth.password_hash =
            Some(bcrypt::hash(TEST_PASSWORD, 4).expect("failed to hash password"));
        config.auth.session_secret = Some("integration-test-secret".to_string());
        tweak(&mut config);

        let ctx = AppContext::new(config).expect("failed to build context");
        Self { ctx, dir }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Send a request through a fresh router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// `Cookie` header value for a valid session, minted without a login round trip.
    pub fn session_cookie(&self) -> String {
        let session = AuthSession::new(1);
        format!(
            "{}={}",
            SESSION_COOKIE_NAME,
            self.ctx.session_key.encode(&session)
        )
    }

    /// Upload through the HTTP layer as an Ajax client.
    pub async fn upload_ajax(&self, filename: &str, data: &[u8]) -> (StatusCode, serde_json::Value) {
        let (content_type, body) = multipart_body("file", filename, data);
        let request = Request::post("/upload")
            .header(header::HOST, TEST_HOST)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::COOKIE, self.session_cookie())
            .header("X-Requested-With", "XMLHttpRequest")
            .body(Body::from(body))
            .unwrap();

        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Filenames currently listed, newest first.
    pub async fn listed_filenames(&self) -> Vec<String> {
        let request = Request::get("/")
            .header(header::COOKIE, self.session_cookie())
            .header("X-Requested-With", "XMLHttpRequest")
            .body(Body::empty())
            .unwrap();
        let response = self.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);

        body_json(response)
            .await
            .as_array()
            .expect("listing is an array")
            .iter()
            .map(|entry| entry["filename"].as_str().unwrap().to_string())
            .collect()
    }

    /// Number of entries in the upload directory, listable or not.
    pub fn files_on_disk(&self) -> usize {
        std::fs::read_dir(self.ctx.store.root()).unwrap().count()
    }
}

/// Build a single-part multipart/form-data body.
pub fn multipart_body(field: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_string(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// `Location` header of a redirect response.
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` pairs from every `Set-Cookie` header.
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
        .collect()
}
