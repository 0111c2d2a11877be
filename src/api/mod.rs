//! HTTP host surface
//!
//! Provides:
//! - Health and identity endpoints
//! - POST /event: feed one inbound chat event to the bot
//! - POST /draw: run a generation request, answering with outbound messages

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::bot::ArtBot;
use crate::chat::{ChatEvent, OutboundMessage};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<ArtBot>,
}

/// Build the API router
pub fn router(bot: Arc<ArtBot>) -> Router {
    let state = AppState { bot };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/event", post(handle_event))
        .route("/draw", post(handle_draw))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "artbot",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        keys_configured: state.bot.config().api_keys.len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    keys_configured: usize,
}

/// Notify the bot of one inbound chat event
async fn handle_event(
    State(state): State<AppState>,
    Json(event): Json<ChatEvent>,
) -> impl IntoResponse {
    let recorded = state.bot.observe(&event).await;
    Json(EventResponse { recorded })
}

#[derive(Serialize)]
struct EventResponse {
    recorded: usize,
}

/// Generation request from the host
#[derive(Debug, Serialize, Deserialize)]
pub struct DrawRequest {
    pub event: ChatEvent,
    pub prompt: String,
    /// Gallery index of the reference image; 0 means none
    #[serde(default)]
    pub image_index: u32,
}

/// Run a draw request. The bot never fails; blocked or failed requests come
/// back as ordinary text messages, so this always answers 200.
async fn handle_draw(
    State(state): State<AppState>,
    Json(request): Json<DrawRequest>,
) -> Json<Vec<OutboundMessage>> {
    let messages = state
        .bot
        .draw(&request.event, &request.prompt, request.image_index)
        .await;
    Json(messages)
}
