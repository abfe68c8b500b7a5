//! REST + WebSocket endpoints for submitting, tracking, and fetching jobs.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::jobs::{JobEvent, JobRecord, JobStatus};
use crate::provider::{Dispatcher, GenerationRequest};
use crate::store::JobStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub events: broadcast::Sender<JobEvent>,
}

/// Build the Axum router for the gateway API.
pub fn api_routes(
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<JobEvent>,
) -> Router {
    let state = AppState {
        store,
        dispatcher,
        events,
    };

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/videos", get(list_videos).post(submit_video))
        .route("/api/videos/{id}", get(get_video).delete(remove_video))
        .route("/api/retrieve-video", get(retrieve_video))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({"error": message.into()}))
}

/// Map a dispatch failure onto the API. Provider failures pass through
/// with their original status and body.
fn dispatch_error_response(err: DispatchError) -> (StatusCode, Json<Value>) {
    match err {
        DispatchError::AuthFailed => (StatusCode::UNAUTHORIZED, error_body(err.to_string())),
        DispatchError::Provider { status, body } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            error_body(body),
        ),
        DispatchError::Network(_) | DispatchError::Payment(_) => {
            (StatusCode::BAD_GATEWAY, error_body(err.to_string()))
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "vidgate"
    }))
}

// ── Jobs ────────────────────────────────────────────────────────────────

async fn submit_video(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return (StatusCode::BAD_REQUEST, error_body(e.to_string())).into_response();
    }

    let descriptor = match state.dispatcher.submit(&request).await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!(error = %e, "Submission failed");
            return dispatch_error_response(e).into_response();
        }
    };

    // Flat descriptors carry `id`; operation wrappers carry `name`.
    let provider_ref = descriptor
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| descriptor.get("name").and_then(Value::as_str));
    let Some(provider_ref) = provider_ref else {
        warn!("Provider descriptor carried no job identifier");
        return (
            StatusCode::BAD_GATEWAY,
            error_body("Provider returned no job identifier"),
        )
            .into_response();
    };

    let job = JobRecord::new(provider_ref, &request.model, &request.prompt);
    if let Err(e) = state.store.insert(&job).await {
        warn!(error = %e, "Failed to persist submitted job");
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response();
    }

    info!(job_id = %job.id, provider_ref = %job.provider_ref, model = %job.model, "Job submitted");
    let _ = state.events.send(JobEvent::Progress {
        id: job.id,
        status: JobStatus::Queued,
        progress: 0,
    });

    Json(job).into_response()
}

async fn list_videos(State(state): State<AppState>) -> Response {
    match state.store.list().await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response(),
    }
}

async fn get_video(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.get(id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, error_body("video not found")).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response(),
    }
}

async fn remove_video(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.remove(id).await {
        Ok(()) => {
            info!(job_id = %id, "Job removed");
            let _ = state.events.send(JobEvent::Removed { id });
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response(),
    }
}

// ── Download ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RetrieveParams {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

async fn retrieve_video(
    State(state): State<AppState>,
    Query(params): Query<RetrieveParams>,
) -> Response {
    let Some(video_id) = params.video_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, error_body("videoId is required")).into_response();
    };

    match state.dispatcher.download(&video_id).await {
        Ok((bytes, content_type)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"video-{video_id}.mp4\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(video_id = %video_id, error = %e, "Artifact download failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())).into_response()
        }
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");

    // Subscribe before the initial sync so no event between the two is lost.
    let mut rx = state.events.subscribe();

    // Send the full ledger on connect so a reloaded UI can resume.
    if send_sync(&mut socket, &state).await.is_err() {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            // Forward job events to this client
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind broadcast");
                        if send_sync(&mut socket, &state).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn send_sync(socket: &mut WebSocket, state: &AppState) -> Result<(), ()> {
    let jobs: Vec<JobRecord> = state.store.list().await.unwrap_or_default();
    let sync = JobEvent::Sync { jobs };
    let json = serde_json::to_string(&sync).map_err(|_| ())?;
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}
