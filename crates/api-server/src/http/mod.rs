use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use fitgenius_core::{CredentialSource, SessionController};

use crate::sessions::{SessionRegistry, SnapshotPublisher};

mod chat;
mod errors;
mod health;
mod observability;
mod widget;

/// What `/v1/info` reports about the running instance.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub model: String,
    pub credential_source: CredentialSource,
}

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
    pub sessions: SessionRegistry,
    pub service: ServiceInfo,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wires the controller to publish transcript snapshots into `sessions`,
    /// which is where transcript reads are served from.
    pub fn new(
        controller: SessionController,
        sessions: SessionRegistry,
        service: ServiceInfo,
        max_upload_bytes: usize,
    ) -> Self {
        let publisher = SnapshotPublisher::new(sessions.clone());
        Self {
            controller: Arc::new(controller.with_observer(Arc::new(publisher))),
            sessions,
            service,
            max_upload_bytes,
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(app_state.max_upload_bytes);

    Router::new()
        .route("/", get(widget::index))
        .route("/healthz", get(health::healthz))
        .route("/v1/info", get(health::service_info))
        .route("/v1/sessions", post(chat::create_session))
        .route("/v1/sessions/{session_id}", delete(chat::delete_session))
        .route(
            "/v1/sessions/{session_id}/transcript",
            get(chat::get_transcript),
        )
        .route(
            "/v1/sessions/{session_id}/messages",
            post(chat::submit_message),
        )
        .route(
            "/v1/sessions/{session_id}/images",
            post(chat::upload_image).layer(upload_limit),
        )
        .route(
            "/v1/sessions/{session_id}/examples/{index}",
            post(chat::run_example),
        )
        .route("/v1/sessions/{session_id}/reset", post(chat::reset_session))
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
        .with_state(app_state)
}
