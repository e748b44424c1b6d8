//! Shared test harness: a full application router backed by an in-memory
//! SQLite store and a temp upload directory, mirroring the middleware
//! stack in `main.rs` so tests exercise what production runs.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::Semaphore;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use tryon_api::config::ServerConfig;
use tryon_api::state::AppState;
use tryon_api::storage::StorageService;
use tryon_api::transform::MockTransform;
use tryon_api::routes;
use tryon_db::SqliteSessionStore;

/// A running test application plus the state handles tests poke at
/// directly. The temp dir guard keeps the upload directory alive.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _upload_dir: tempfile::TempDir,
}

/// Transform knobs for a test app.
pub struct TestTransform {
    pub delay: Duration,
    pub failure_rate: f64,
}

impl Default for TestTransform {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(10),
            failure_rate: 0.0,
        }
    }
}

pub fn test_config(upload_dir: &std::path::Path, session_expiry_hours: i64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        database_url: "unused-in-tests".to_string(),
        sqlite_fallback_url: "sqlite::memory:".to_string(),
        db_connect_timeout: Duration::from_secs(5),
        upload_dir: upload_dir.display().to_string(),
        max_file_size_mb: 10,
        session_expiry_hours,
        cleanup_interval: Duration::from_secs(3600),
        max_concurrent_sessions: 4,
        mock_processing_delay: Duration::from_millis(10),
        mock_failure_rate: 0.0,
    }
}

/// Build the full application with all middleware layers.
pub async fn build_test_app(transform: TestTransform, session_expiry_hours: i64) -> TestApp {
    let upload_dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(upload_dir.path(), session_expiry_hours);

    let store = SqliteSessionStore::connect("sqlite::memory:", Duration::from_secs(5))
        .await
        .expect("in-memory sqlite");
    let storage = Arc::new(
        StorageService::new(upload_dir.path())
            .await
            .expect("upload dirs"),
    );

    let state = AppState {
        store: Arc::new(store),
        storage: storage.clone(),
        transform: Arc::new(MockTransform {
            processing_delay: transform.delay,
            failure_rate: transform.failure_rate,
        }),
        worker_permits: Arc::new(Semaphore::new(config.max_concurrent_sessions)),
        config: Arc::new(config.clone()),
    };

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .nest_service("/uploads", ServeDir::new(storage.upload_dir()))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes()))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(["http://localhost:3000".parse().unwrap()])
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE]),
        )
        .with_state(state.clone());

    TestApp {
        app,
        state,
        _upload_dir: upload_dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_multipart(app: &Router, uri: &str, form: MultipartForm) -> Response<Body> {
    let (content_type, body) = form.build();
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Multipart form construction
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "x-test-boundary-7f2c";

/// Hand-rolled multipart/form-data body, enough for two files and a token.
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn build(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            self.body,
        )
    }
}

/// A well-formed session creation form with two valid images.
pub fn valid_session_form(token: &str) -> MultipartForm {
    MultipartForm::new()
        .file("user_image", "user.jpg", &tiny_jpg())
        .file("garment_image", "garment.jpg", &tiny_jpg())
        .text("user_token", token)
}

// ---------------------------------------------------------------------------
// Image fixtures
// ---------------------------------------------------------------------------

/// Encode a small real image in the given format.
fn tiny_image(format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([x as u8 * 8, y as u8 * 8, 128]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

pub fn tiny_jpg() -> Vec<u8> {
    tiny_image(image::ImageFormat::Jpeg)
}

pub fn tiny_png() -> Vec<u8> {
    tiny_image(image::ImageFormat::Png)
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Poll the status endpoint until the session is terminal, panicking after
/// `timeout`.
pub async fn poll_until_terminal(
    app: &Router,
    session_id: &str,
    timeout: Duration,
) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let response = get(app, &format!("/api/v1/tryon/sessions/{session_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let status = json["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "failed" {
            return json;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session {session_id} never reached a terminal state"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
