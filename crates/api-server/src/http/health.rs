use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fitgenius_core::llm::EXAMPLE_PROMPTS;
use fitgenius_core::models::{ExamplePrompt, OkResponse, ServiceInfoResponse};
use fitgenius_core::upload::ACCEPTED_IMAGE_EXTENSIONS;

use super::AppState;

pub(super) async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(OkResponse { ok: true }))
}

pub(super) async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    let examples = EXAMPLE_PROMPTS
        .iter()
        .enumerate()
        .map(|(index, text)| ExamplePrompt {
            index,
            text: (*text).to_string(),
        })
        .collect();

    (
        StatusCode::OK,
        Json(ServiceInfoResponse {
            app: "FitGenius".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model: state.service.model.clone(),
            credential_mode: state.service.credential_source.mode_label().to_string(),
            accepted_image_types: ACCEPTED_IMAGE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            examples,
        }),
    )
}
