use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, put},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use super::view::{DashboardView, Overview};
use super::DashboardState;
use crate::bus::EventBus;
use crate::chat::ChatMessage;
use crate::conversation::{Conversation, RejectReason, SendOutcome};

// -----------------------------------------------------------------------------
// Request / Response Types
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

// -----------------------------------------------------------------------------
// Server State
// -----------------------------------------------------------------------------

pub struct AppState {
    pub dashboard: DashboardState,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    fn conversation(&self) -> Result<Arc<Conversation>, Response> {
        match &self.dashboard {
            DashboardState::Ready(conversation) => Ok(conversation.clone()),
            DashboardState::Unavailable { reason } => Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: format!("Dashboard unavailable: {}", reason),
                }),
            )
                .into_response()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route(
            "/api/chat/messages",
            get(messages_handler).post(send_handler),
        )
        .route("/api/chat/input", put(input_handler))
        .route("/api/chat/events", get(events_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn dashboard_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = match &state.dashboard {
        DashboardState::Ready(conversation) => DashboardView::Ready {
            overview: Overview::from_datasets(conversation.datasets()),
        },
        DashboardState::Unavailable { reason } => DashboardView::Unavailable {
            reason: reason.clone(),
        },
    };
    Json(view)
}

async fn messages_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.conversation() {
        Ok(conversation) => Json(conversation.snapshot()).into_response(),
        Err(response) => response,
    }
}

async fn input_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InputRequest>,
) -> Response {
    match state.conversation() {
        Ok(conversation) => {
            conversation.set_pending_input(request.text);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(response) => response,
    }
}

#[axum::debug_handler]
async fn send_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> Response {
    let conversation = match state.conversation() {
        Ok(conversation) => conversation,
        Err(response) => return response,
    };

    // Run the turn on its own task so a disconnecting client cannot cut it short
    let outcome = tokio::spawn(async move { conversation.send(&request.query).await }).await;

    match outcome {
        Ok(SendOutcome::Answered(reply)) => Json(SendResponse {
            accepted: true,
            reply: Some(reply),
            reason: None,
        })
        .into_response(),
        Ok(SendOutcome::Rejected(reason)) => Json(SendResponse {
            accepted: false,
            reply: None,
            reason: Some(reason),
        })
        .into_response(),
        Err(e) => {
            error!("Send task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Send task failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::BoxError>>> {
    info!("New SSE connection established");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    yield SseEvent::default().json_data(&event).map_err(axum::BoxError::from);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
