use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fitgenius_core::ControllerError;
use fitgenius_core::models::{ErrorBody, ErrorResponse};

pub(super) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn session_not_found_response() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "session_not_found",
        "Session does not exist or has expired",
    )
}

pub(super) fn session_busy_response() -> Response {
    error_response(
        StatusCode::CONFLICT,
        "session_busy",
        "A response is still being generated for this session",
    )
}

pub(super) fn controller_error_response(err: ControllerError) -> Response {
    let message = err.to_string();
    match err {
        ControllerError::UnknownExample(_) => {
            error_response(StatusCode::NOT_FOUND, "unknown_example", &message)
        }
        ControllerError::UnsupportedImage(_) => error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_image",
            &message,
        ),
        ControllerError::EmptyImage => bad_request_response("empty_image", &message),
    }
}
