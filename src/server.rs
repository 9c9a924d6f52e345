//!
//! GetIT HTTP server
//! -----------------
//! Axum-based HTTP surface for the marketplace backend.
//!
//! Responsibilities:
//! - `POST /api/upload`: authenticated video upload (bearer token + multipart `video` field).
//! - `GET /video/{name}`: serve previously uploaded artifacts from the public video folder.
//! - `GET /api/profile`: resolve the caller's profile destination from their role.
//! - Startup folder logs, token seeding and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{bearer_token, load_tokens_file, IdentityVerifier, RequestContext, SessionManager, TokenIdentity};
use crate::profile::{CancelToken, Notice, ProfileRouter, RecordingNavigator, RouterState};
use crate::storage::{DocumentStore, FileDocumentStore};
use crate::tprintln;
use crate::upload::{FsBlobStore, UploadError, UploadGateway, VIDEO_FIELD};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub gateway: Arc<UploadGateway>,
    pub documents: Arc<dyn DocumentStore>,
}

impl AppState {
    /// State backed by the local adapters: in-memory sessions, public video folder, JSON user records.
    pub fn local(config: Config, sessions: SessionManager) -> Self {
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(sessions);
        let blobs = Arc::new(FsBlobStore::new(config.video_dir()));
        let documents = Arc::new(FileDocumentStore::new(config.users_dir()));
        Self {
            gateway: Arc::new(UploadGateway::new(verifier.clone(), blobs)),
            verifier,
            documents,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    Router::new()
        .route("/", get(|| async { "getit ok" }))
        .route("/api/upload", post(upload_video).layer(upload_limit))
        .route("/video/{name}", get(serve_video))
        .route("/api/profile", get(profile_destination))
        .with_state(state)
}

fn log_startup_folders(config: &Config) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "GetIT folder configuration: cwd={:?}, public_dir={:?}, video_dir={:?}, users_dir={:?}, tokens_file={:?}",
        cwd, config.public_dir, config.video_dir(), config.users_dir(), config.tokens_file
    );
    info!(
        target: "startup",
        "Path existence: public_dir_exists={}, users_dir_exists={}",
        config.public_dir.exists(), config.users_dir().exists()
    );
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    log_startup_folders(&config);

    std::fs::create_dir_all(&config.public_dir)
        .with_context(|| format!("Failed to create or access public dir: {}", config.public_dir.display()))?;

    let sessions = SessionManager::with_ttl(config.session_ttl());
    if let Some(path) = config.tokens_file.as_deref() {
        load_tokens_file(&sessions, path)?;
    } else {
        warn!(target: "startup", "GETIT_TOKENS_FILE not set; no bearer token will verify");
    }

    let port = config.http_port;
    let app = build_router(AppState::local(config, sessions));

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ---- upload ----

fn reject(ctx: &RequestContext, e: UploadError) -> AppError {
    let user = ctx.principal.as_ref().map_or("-", |p| p.user_id.as_str());
    match &e {
        UploadError::Storage(_) => error!(target: "getit::upload", request_id = %ctx.request_id, user, "upload failed: {e}"),
        _ => warn!(target: "getit::upload", request_id = %ctx.request_id, user, "upload rejected: {e}"),
    }
    AppError::from(e)
}

/// Body-limit overruns surface as 413 from axum; everything else is a malformed body.
fn body_failure(status: StatusCode, text: String) -> UploadError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::MalformedBody(text)
    }
}

async fn read_video_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), UploadError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| body_failure(e.status(), e.body_text()))? {
        if field.name() != Some(VIDEO_FIELD) { continue; }
        let Some(filename) = field.file_name().map(str::to_string) else { return Err(UploadError::NoFile); };
        let bytes = field.bytes().await.map_err(|e| body_failure(e.status(), e.body_text()))?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(UploadError::NoFile)
}

async fn handle_upload(state: AppState, req: Request, ctx: RequestContext) -> AppResult<Json<Value>> {
    // Credentials are checked before the body is touched
    let principal = state.gateway.authenticate(req.headers()).map_err(|e| reject(&ctx, e))?;
    let ctx = ctx.with_principal(principal.clone());

    let mut multipart = Multipart::from_request(req, &state)
        .await
        .map_err(|e| reject(&ctx, body_failure(e.status(), e.body_text())))?;
    let (filename, bytes) = read_video_field(&mut multipart).await.map_err(|e| reject(&ctx, e))?;
    tprintln!("upload user={} file={} bytes={}", principal.user_id, filename, bytes.len());

    let artifact = state.gateway
        .store(&principal.user_id, &filename, &bytes)
        .await
        .map_err(|e| reject(&ctx, e))?;
    Ok(Json(json!({"success": true, "filePath": artifact.public_path})))
}

async fn upload_video(State(state): State<AppState>, req: Request) -> AppResult<Json<Value>> {
    let ctx = RequestContext::new();
    let span = info_span!("upload", request_id = %ctx.request_id);
    handle_upload(state, req, ctx).instrument(span).await
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

async fn serve_video(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, AppError> {
    match state.gateway.blobs().get(&name).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, content_type_for(&name))], bytes).into_response()),
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidInput) => {
            Err(AppError::not_found("not_found", "Video not found"))
        }
        Err(e) => {
            error!(target: "getit::upload", "failed to read video {}: {e}", name);
            Err(AppError::server("read_failed", "Failed to read video"))
        }
    }
}

// ---- profile ----

/// Final router state as JSON. `delay_ms` is how long the client should show the
/// notices before following `redirect`; the server never holds the response for it.
#[derive(Debug, Serialize)]
struct ProfileOutcome {
    state: &'static str,
    redirect: Option<String>,
    notices: Vec<Notice>,
    delay_ms: u64,
}

fn state_label(s: &RouterState) -> &'static str {
    match s {
        RouterState::Resolving => "resolving",
        RouterState::Unauthenticated => "unauthenticated",
        RouterState::FetchingRecord => "fetching_record",
        RouterState::FetchFailed => "fetch_failed",
        RouterState::Routing => "routing",
        RouterState::Routed(_) => "routed",
        RouterState::RoleError(_) => "role_error",
        RouterState::Cancelled => "cancelled",
    }
}

/// Cancels the activation when the request future is dropped (client went away).
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) { self.0.cancel(); }
}

async fn profile_destination(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let token = bearer_token(&headers).map(str::to_string);
    let nav = Arc::new(RecordingNavigator::new());
    let router = ProfileRouter::new(
        Arc::new(TokenIdentity::new(state.verifier.clone(), token)),
        state.documents.clone(),
        nav.clone(),
    )
    .with_failure_delay(Duration::ZERO);

    let guard = CancelOnDrop(CancelToken::new());
    let final_state = router.run(&guard.0).await;
    drop(guard);

    let delay_ms = match final_state {
        RouterState::FetchFailed => u64::try_from(state.config.failure_redirect_delay().as_millis()).unwrap_or(u64::MAX),
        _ => 0,
    };
    let outcome = ProfileOutcome {
        state: state_label(&final_state),
        redirect: nav.redirects().last().map(|d| d.path()),
        notices: nav.notices(),
        delay_ms,
    };
    (StatusCode::OK, Json(outcome))
}
