// Bear Hunt Ledger - Web Server
// Command endpoints for the chat layer, plus a keep-alive health check

use anyhow::{Context, Result};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bear_hunt_ledger::{
    build_recognizer, CommandHandler, ImageUpload, Reply, ReplyStatus, Requester, Settings,
    Tracker,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Screenshots can be large; allow a handful per request
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
struct AppState {
    handler: Arc<CommandHandler>,
}

#[derive(Debug, Deserialize)]
struct TopParams {
    limit: Option<usize>,
}

// ============================================================================
// Requester headers
// ============================================================================

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_id(headers: &HeaderMap, name: &str) -> u64 {
    header_str(headers, name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}

/// Identity forwarded by the chat layer:
/// `x-actor-id`, `x-actor-name`, `x-channel-id`, `x-roles` (comma separated)
fn requester_from_headers(headers: &HeaderMap) -> Requester {
    let actor_id = header_id(headers, "x-actor-id");
    let display_name = header_str(headers, "x-actor-name")
        .map(str::to_string)
        .unwrap_or_else(|| actor_id.to_string());
    let roles = header_str(headers, "x-roles")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Requester {
        actor_id,
        display_name,
        channel_id: header_id(headers, "x-channel-id"),
        roles,
    }
}

/// Ledger work (SQLite, the tracker lock, audit fsync) runs off the async workers
async fn run_blocking<F>(work: F) -> Response
where
    F: FnOnce() -> Reply + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(reply) => reply_response(reply),
        Err(e) => {
            error!(error = %e, "command task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "❌ Something went wrong while updating the event data.",
            )
                .into_response()
        }
    }
}

fn bad_upload(e: MultipartError) -> Response {
    warn!(error = %e, "rejected multipart upload");
    (
        StatusCode::BAD_REQUEST,
        "⚠️ Upload could not be read. Please attach the screenshots again.",
    )
        .into_response()
}

fn reply_response(reply: Reply) -> Response {
    let status = match reply.status {
        ReplyStatus::Done => StatusCode::OK,
        ReplyStatus::Denied => StatusCode::FORBIDDEN,
        ReplyStatus::Rejected => StatusCode::BAD_REQUEST,
        ReplyStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, reply.text).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Keep-alive check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /api/top?limit=N - Leaderboard text
async fn top(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TopParams>,
) -> Response {
    let requester = requester_from_headers(&headers);
    let limit = params.limit.filter(|l| *l > 0);

    let handler = Arc::clone(&state.handler);
    run_blocking(move || handler.top(&requester, limit)).await
}

/// POST /api/reset - Clear event standings
async fn reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let requester = requester_from_headers(&headers);

    let handler = Arc::clone(&state.handler);
    run_blocking(move || handler.reset(&requester)).await
}

/// POST /api/process - Multipart upload, one file part per screenshot
async fn process(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let requester = requester_from_headers(&headers);
    let mut images = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_upload(e),
        };

        // Only parts carrying a filename are attachments
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        match field.bytes().await {
            Ok(bytes) => images.push(ImageUpload::new(
                bytes.to_vec(),
                filename,
                requester.display_name.clone(),
            )),
            Err(e) => return bad_upload(e),
        }
    }

    // OCR is blocking work too
    let handler = Arc::clone(&state.handler);
    run_blocking(move || handler.process(&requester, &images)).await
}

fn build_router(handler: Arc<CommandHandler>) -> Router {
    let state = AppState { handler };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/top", get(top))
        .route("/reset", post(reset))
        .route("/process", post(process))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    Router::new()
        .route("/", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("BEAR_HUNT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("bear_hunt.json"));
    let settings = Settings::load(&config_path)
        .with_context(|| format!("Failed to load settings from {}", config_path.display()))?;

    let tracker = Tracker::open(&settings).context("Failed to open ledger")?;
    info!(ledger = %settings.ledger_path.display(), audit = %settings.audit_path.display(), "ledger opened");

    let handler = CommandHandler::new(
        Arc::new(tracker),
        build_recognizer(&settings.engine),
        settings.access.clone(),
        settings.default_limit,
    );
    let app = build_router(Arc::new(handler));

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    info!(addr = %settings.bind_addr, "server running");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
