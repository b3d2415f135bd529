pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod llm;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::llm::LlmService;

/// Per-process state handed to every handler. Built once at startup;
/// requests share it read-only.
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub llm: Arc<LlmService>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        let llm = Arc::new(LlmService::new(&config));
        Self {
            config: Arc::new(config),
            llm,
        }
    }
}

/// Builds the relay router. `/api/chat` sits behind the origin gate;
/// `/health` does not.
pub fn router(state: RelayState) -> Router {
    let chat = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            cors::origin_gate,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(chat)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
