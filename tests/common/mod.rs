#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

use fetalscan::{
    app::build_app,
    config::{AppConfig, SessionConfig, UploadConfig, DEFAULT_MAX_UPLOAD_BYTES},
    db,
    detector::Detector,
    state::AppState,
};

pub const BOUNDARY: &str = "----fetalscan-test-boundary";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorMode {
    /// Returns detections without writing an overlay.
    Plain,
    /// Copies the input into the results directory as its overlay.
    Overlay,
    Fail,
}

pub struct FakeDetector {
    mode: DetectorMode,
    result_dir: PathBuf,
}

#[async_trait]
impl Detector for FakeDetector {
    async fn detect(&self, image: &Path) -> anyhow::Result<Option<Value>> {
        match self.mode {
            DetectorMode::Fail => anyhow::bail!("weights file /models/best.pt not found"),
            DetectorMode::Plain => Ok(Some(json!({ "detections": [] }))),
            DetectorMode::Overlay => {
                tokio::fs::create_dir_all(&self.result_dir).await?;
                let name = image.file_name().expect("image has a file name");
                tokio::fs::copy(image, self.result_dir.join(name)).await?;
                Ok(Some(json!({ "detections": [{ "class": 3, "conf": 0.81 }] })))
            }
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub upload_dir: PathBuf,
    pub result_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with(DetectorMode::Plain, DEFAULT_MAX_UPLOAD_BYTES).await
    }

    pub async fn with(mode: DetectorMode, max_bytes: usize) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload_dir = dir.path().join("test");
        let result_dir = dir.path().join("result");
        let config = AppConfig {
            database_url: "sqlite::memory:".into(),
            session: SessionConfig {
                secret: "test-secret".into(),
                issuer: "fetalscan-test".into(),
                cookie_name: "session".into(),
                ttl_minutes: 5,
            },
            uploads: UploadConfig {
                upload_dir: upload_dir.clone(),
                result_dir: result_dir.clone(),
                max_bytes,
            },
            detector_command: None,
        };
        let db = db::memory().await.expect("in-memory database");
        let detector = Arc::new(FakeDetector {
            mode,
            result_dir: result_dir.clone(),
        });
        let state = AppState::from_parts(Arc::new(config), db.clone(), detector);
        Self {
            router: build_app(state),
            db,
            upload_dir,
            result_dir,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router is infallible")
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Response<Body> {
        let body = format!("username={username}&email={email}&password={password}&mobile=");
        self.send(form_post("/register", &body, None)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        let body = format!("username={username}&password={password}");
        self.send(form_post("/login", &body, None)).await
    }

    /// Register and log in, returning the session cookie (`session=...`).
    pub async fn signed_in(&self, username: &str) -> String {
        let email = format!("{username}%40x.com");
        let res = self.register(username, &email, "pw123").await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let res = self.login(username, "pw123").await;
        assert_eq!(location(&res), "/dashboard");
        session_cookie(&res).expect("login sets a session cookie")
    }

    pub async fn user_id(&self, username: &str) -> i64 {
        sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.db)
            .await
            .expect("user exists")
    }

    pub async fn analysis_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM analysis_history")
            .fetch_one(&self.db)
            .await
            .expect("count analyses")
    }

    pub fn stored_uploads(&self) -> Vec<String> {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// POST with a JSON body, for endpoints that expect a form or multipart.
pub fn json_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Multipart body with one part named `field_name`.
pub fn upload(field_name: &str, filename: &str, bytes: &[u8], cookie: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field_name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn location(res: &Response<Body>) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The `session=...` pair from the response's `Set-Cookie`, if any.
pub fn session_cookie(res: &Response<Body>) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn body_text(res: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(res: Response<Body>) -> Value {
    serde_json::from_str(&body_text(res).await).expect("json body")
}
