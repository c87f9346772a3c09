use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use super::{auth, upload};
use crate::agent::{self, ChatResponder};
use crate::config::WayfinderConfig;
use crate::documents::{self, DocumentStore};
use crate::locations::{self, LocationStore};
use crate::render;
use crate::types::{ChatReply, ChatRequest, Location, RenderRequest, RenderResponse};

pub struct AppState {
    pub token: Option<String>,
    pub locations: RwLock<LocationStore>,
    pub documents: RwLock<DocumentStore>,
    pub responder: ChatResponder,
    pub config: WayfinderConfig,
}

impl AppState {
    /// Build the shared state, loading the location catalogue and the
    /// knowledge base from disk.
    pub fn new(config: WayfinderConfig, token: Option<String>) -> Self {
        let locations = LocationStore::load_dir(config.locations.dir.clone());
        let documents = DocumentStore::load_dir(config.documents.dir.clone());
        Self {
            token,
            locations: RwLock::new(locations),
            documents: RwLock::new(documents),
            responder: ChatResponder::new(config.agent.clone()),
            config,
        }
    }
}

pub async fn run(config: WayfinderConfig, token: Option<String>) -> anyhow::Result<()> {
    let is_loopback = config.gateway.bind == "127.0.0.1"
        || config.gateway.bind == "::1"
        || config.gateway.bind == "localhost";

    if !is_loopback && token.is_none() {
        anyhow::bail!(
            "Auth token required when binding to non-loopback address. \
             Set --token or WAYFINDER_TOKEN env var."
        );
    }

    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let state = Arc::new(AppState::new(config, token));
    {
        let locations = state.locations.read().await;
        info!(
            locations = locations.len(),
            dir = %locations.dir().display(),
            "location catalogue ready"
        );
        let documents = state.documents.read().await;
        info!(
            chunks = documents.len(),
            files = documents.file_count(),
            dir = %documents.dir().display(),
            "knowledge base ready"
        );
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("wayfinder gateway listening on {addr}");
    if is_loopback {
        info!("bound to loopback, local access only");
    } else {
        warn!("bound to {addr}; admin routes require the auth token");
    }

    axum::serve(listener, app).await?;
    Ok(())
}

/// All HTTP routes, with permissive CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/user/locations", get(list_locations))
        .route("/user/chat", post(chat))
        .route("/render", post(render_message))
        .route("/admin/locations/reload", post(reload_locations))
        .route("/admin/locations/reset", post(reset_locations))
        .route("/admin/locations/upload", post(upload_locations))
        .route("/admin/documents/upload", post(upload_documents))
        .route("/admin/documents/reset", post(reset_documents))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_locations(State(state): State<Arc<AppState>>) -> Json<Vec<Location>> {
    let locations = state.locations.read().await;
    Json(locations.all().to_vec())
}

/// Accepts `{"history": [{"role", "content"}, ...]}` and answers
/// `{"reply", "html"}`. A body that is JSON but not a usable history gets the
/// canned invalid-history reply rather than an error status.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<ChatReply> {
    let request_id = Uuid::new_v4();

    let request: ChatRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => {
            warn!(%request_id, "malformed chat history: {e}");
            return Json(ChatReply::new(agent::INVALID_HISTORY_REPLY));
        }
    };

    let question = match agent::latest_question(&request.history) {
        Ok(q) => q,
        Err(reply) => return Json(ChatReply::new(reply)),
    };
    info!(%request_id, turns = request.history.len(), "chat request");

    let context = {
        let limits = state.responder.config();
        let documents = state.documents.read().await;
        let locations = state.locations.read().await;
        agent::build_context(
            &documents.relevant(question, limits.context_documents),
            &locations.relevant(question, limits.context_locations),
        )
    };

    let reply = state.responder.respond(&request.history, &context).await;
    Json(ChatReply::new(reply))
}

async fn render_message(Json(request): Json<RenderRequest>) -> Json<RenderResponse> {
    Json(RenderResponse {
        html: render::render_opt(request.text.as_deref()),
    })
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if auth::verify_bearer(header, &state.token) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response())
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "status": "error", "message": message.into() })),
    )
        .into_response()
}

/// Run blocking store work off the async workers.
async fn blocking<T: Send + 'static>(
    work: impl FnOnce() -> anyhow::Result<T> + Send + 'static,
) -> anyhow::Result<T> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| anyhow::anyhow!("background task failed: {e}"))?
}

/// Load a fresh catalogue from `dir`, then swap it in. The write lock is only
/// held for the swap.
async fn refresh_locations(
    state: &AppState,
    dir: PathBuf,
) -> anyhow::Result<(usize, Option<DateTime<Utc>>)> {
    let fresh = blocking(move || Ok(LocationStore::load_dir(dir))).await?;
    let summary = (fresh.len(), fresh.loaded_at());
    *state.locations.write().await = fresh;
    Ok(summary)
}

async fn refresh_documents(state: &AppState, dir: PathBuf) -> anyhow::Result<(usize, usize)> {
    let fresh = blocking(move || Ok(DocumentStore::load_dir(dir))).await?;
    let summary = (fresh.file_count(), fresh.len());
    *state.documents.write().await = fresh;
    Ok(summary)
}

async fn locations_dir(state: &AppState) -> PathBuf {
    state.locations.read().await.dir().to_path_buf()
}

async fn documents_dir(state: &AppState) -> PathBuf {
    state.documents.read().await.dir().to_path_buf()
}

async fn reload_locations(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let dir = locations_dir(&state).await;
    match refresh_locations(&state, dir).await {
        Ok((total, loaded_at)) => Json(serde_json::json!({
            "status": "success",
            "total_locations": total,
            "loaded_at": loaded_at,
        }))
        .into_response(),
        Err(e) => {
            warn!("location reload failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn reset_locations(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let dir = locations_dir(&state).await;
    let result = blocking(move || {
        let mut fresh = LocationStore::new(dir);
        let removed = fresh.reset()?;
        Ok((fresh, removed))
    })
    .await;

    match result {
        Ok((fresh, removed)) => {
            *state.locations.write().await = fresh;
            Json(serde_json::json!({
                "status": "success",
                "message": "All locations reset.",
                "files_removed": removed,
            }))
            .into_response()
        }
        Err(e) => {
            warn!("location reset failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Save the multipart `files` parts accepted by `accept` into `dir`. `Err`
/// is the response to send instead.
async fn receive_files(
    multipart: &mut Multipart,
    dir: &Path,
    accept: fn(&Path) -> bool,
) -> Result<upload::SavedUploads, Response> {
    let uploads = upload::save_uploads(multipart, dir, accept)
        .await
        .map_err(|e| {
            warn!("upload failed: {e}");
            error_response(e.status(), e.to_string())
        })?;

    if uploads.received == 0 {
        return Err(error_response(StatusCode::BAD_REQUEST, "No files uploaded"));
    }
    if uploads.saved.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "No supported files uploaded",
        ));
    }
    Ok(uploads)
}

/// Accepts `multipart/form-data` with one or more `files` parts holding
/// `*.json` or `*.csv` catalogues, saves them and reloads the catalogue.
async fn upload_locations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let dir = locations_dir(&state).await;
    let uploads = match receive_files(&mut multipart, &dir, locations::is_catalogue_file).await {
        Ok(u) => u,
        Err(response) => return response,
    };

    match refresh_locations(&state, dir).await {
        Ok((total, _)) => Json(serde_json::json!({
            "status": "success",
            "files_uploaded": uploads.saved.len(),
            "files_skipped": uploads.skipped,
            "total_locations": total,
        }))
        .into_response(),
        Err(e) => {
            warn!("location reload after upload failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Accepts `files` parts holding `*.txt`, `*.md` or `*.csv` documents, saves
/// them and rebuilds the knowledge base.
async fn upload_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let dir = documents_dir(&state).await;
    let uploads = match receive_files(&mut multipart, &dir, documents::is_document_file).await {
        Ok(u) => u,
        Err(response) => return response,
    };

    match refresh_documents(&state, dir).await {
        Ok((files, chunks)) => Json(serde_json::json!({
            "status": "success",
            "files_uploaded": uploads.saved.len(),
            "files_skipped": uploads.skipped,
            "docs_added": uploads.saved.len(),
            "total_documents": files,
            "total_chunks": chunks,
        }))
        .into_response(),
        Err(e) => {
            warn!("document reload after upload failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn reset_documents(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    let dir = documents_dir(&state).await;
    let result = blocking(move || {
        let mut fresh = DocumentStore::new(dir);
        let removed = fresh.reset()?;
        Ok((fresh, removed))
    })
    .await;

    match result {
        Ok((fresh, removed)) => {
            *state.documents.write().await = fresh;
            Json(serde_json::json!({
                "status": "success",
                "message": "All documents reset.",
                "files_removed": removed,
            }))
            .into_response()
        }
        Err(e) => {
            warn!("document reset failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
