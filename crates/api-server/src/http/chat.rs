use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fitgenius_core::models::{
    CreateSessionRequest, InteractionResponse, OkResponse, SubmitMessageRequest,
    TranscriptResponse,
};
use fitgenius_core::upload::ImageUpload;
use fitgenius_core::{Outcome, Session};
use tokio::sync::OwnedMutexGuard;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use super::errors::{
    bad_request_response, controller_error_response, error_response, session_busy_response,
    session_not_found_response,
};

const IMAGE_FIELD: &str = "image";
const QUESTION_FIELD: &str = "question";

/// Starts a session. A body with exported `history` lines resumes that
/// conversation instead of starting from the greeting alone.
pub(super) async fn create_session(State(state): State<AppState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        match serde_json::from_slice::<CreateSessionRequest>(&body) {
            Ok(request) => request,
            Err(err) => {
                return bad_request_response(
                    "invalid_request",
                    &format!("Invalid session request: {err}"),
                );
            }
        }
    };

    let resumed_lines = request.history.len();
    let (session_id, handle) = if request.history.is_empty() {
        state.sessions.create()
    } else {
        state
            .sessions
            .create_with(Session::resume_from_lines(&request.history))
    };
    let session = handle.lock().await;
    info!(
        session_id = %session_id,
        resumed_lines,
        messages = session.transcript().len(),
        "session created"
    );

    (
        StatusCode::CREATED,
        Json(TranscriptResponse::from_session(&session)),
    )
        .into_response()
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(session_id) => session_id,
        Err(response) => return response,
    };

    if !state.sessions.remove(session_id) {
        return session_not_found_response();
    }
    info!(session_id = %session_id, "session discarded");
    (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
}

/// Served from the published snapshot, so it answers with `generating`
/// while another request holds the session.
pub(super) async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(session_id) => session_id,
        Err(response) => return response,
    };

    match state.sessions.snapshot(session_id) {
        Some(transcript) => (StatusCode::OK, Json(transcript)).into_response(),
        None => session_not_found_response(),
    }
}

pub(super) async fn submit_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<SubmitMessageRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request_response("invalid_request", &rejection.body_text()),
    };
    let mut session = match checkout(&state, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let outcome = state
        .controller
        .submit_text(&mut session, &request.text)
        .await;
    log_interaction(&session, "message", outcome);
    interaction_response(outcome, &session)
}

pub(super) async fn run_example(
    State(state): State<AppState>,
    Path((session_id, index)): Path<(String, String)>,
) -> Response {
    let Ok(index) = index.parse::<usize>() else {
        return bad_request_response(
            "invalid_example_index",
            "Example index must be a non-negative integer",
        );
    };
    let mut session = match checkout(&state, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.controller.run_example(&mut session, index).await {
        Ok(outcome) => {
            log_interaction(&session, "example", outcome);
            interaction_response(outcome, &session)
        }
        Err(err) => controller_error_response(err),
    }
}

pub(super) async fn upload_image(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return bad_request_response("invalid_multipart", &rejection.body_text());
        }
    };
    let mut session = match checkout(&state, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    let (upload, question) = match read_image_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    match state
        .controller
        .analyze_image(&mut session, upload, question.as_deref())
        .await
    {
        Ok(outcome) => {
            log_interaction(&session, "image", outcome);
            interaction_response(outcome, &session)
        }
        Err(err) => controller_error_response(err),
    }
}

pub(super) async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let mut session = match checkout(&state, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    state.controller.reset(&mut session);
    (
        StatusCode::OK,
        Json(TranscriptResponse::from_session(&session)),
    )
        .into_response()
}

/// Locks the session for the rest of an input request. A session that is
/// already locked is mid-generation, so the caller gets a conflict instead of
/// waiting.
fn checkout(state: &AppState, raw_session_id: &str) -> Result<OwnedMutexGuard<Session>, Response> {
    let session_id = parse_session_id(raw_session_id)?;
    let handle = state
        .sessions
        .get(session_id)
        .ok_or_else(session_not_found_response)?;
    handle.try_lock_owned().map_err(|_| session_busy_response())
}

fn parse_session_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw)
        .map_err(|_| bad_request_response("invalid_session_id", "Session id must be a UUID"))
}

async fn read_image_form(
    mut multipart: Multipart,
) -> Result<(ImageUpload, Option<String>), Response> {
    let mut upload = None;
    let mut question = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error_response)?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                let file_name = field.file_name().unwrap_or("imagen").to_string();
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(multipart_error_response)?;
                let mut image = ImageUpload::new(file_name, bytes.to_vec());
                if let Some(content_type) = content_type {
                    image = image.with_content_type(content_type);
                }
                upload = Some(image);
            }
            Some(QUESTION_FIELD) => {
                question = Some(field.text().await.map_err(multipart_error_response)?);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| {
        bad_request_response("missing_image", "Multipart field `image` is required")
    })?;
    Ok((upload, question))
}

fn multipart_error_response(err: MultipartError) -> Response {
    let status = err.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "upload_too_large"
    } else {
        "invalid_multipart"
    };
    error_response(status, code, &err.body_text())
}

fn interaction_response(outcome: Outcome, session: &Session) -> Response {
    (
        StatusCode::OK,
        Json(InteractionResponse {
            outcome: outcome.as_str(),
            transcript: TranscriptResponse::from_session(session),
        }),
    )
        .into_response()
}

fn log_interaction(session: &Session, kind: &str, outcome: Outcome) {
    info!(
        kind,
        outcome = outcome.as_str(),
        messages = session.transcript().len(),
        "interaction finished"
    );
}
