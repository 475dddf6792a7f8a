use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use fitgenius_core::llm::{
    GatewayFuture, GenerationError, GenerationGateway, GenerationOptions, Turn, VisionImage,
};
use fitgenius_core::{CredentialSource, SessionController};
use fitgenius_server::http::{AppState, ServiceInfo, build_router};
use fitgenius_server::sessions::SessionRegistry;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower::ServiceExt;

const GREETING: &str =
    "¡Hola, soy FitGenius! Entrenador Personal con IA. ¿Qué tipo de rutina de ejercicios necesitas hoy?";
const BOUNDARY: &str = "fitgenius-test-boundary";

struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    fn with_replies(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from(replies)),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

impl GenerationGateway for ScriptedGateway {
    fn generate_text<'a>(
        &'a self,
        _turns: &'a [Turn],
        _options: &'a GenerationOptions,
    ) -> GatewayFuture<'a> {
        let reply = self.next_reply();
        Box::pin(async move { reply })
    }

    fn generate_vision<'a>(
        &'a self,
        _prompt_text: &'a str,
        _image: &'a VisionImage,
    ) -> GatewayFuture<'a> {
        let reply = self.next_reply();
        Box::pin(async move { reply })
    }
}

/// Holds every generation until released so a request can be caught mid-flight.
#[derive(Default)]
struct BlockingGateway {
    started: Notify,
    release: Notify,
}

impl GenerationGateway for BlockingGateway {
    fn generate_text<'a>(
        &'a self,
        _turns: &'a [Turn],
        _options: &'a GenerationOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            self.started.notify_one();
            self.release.notified().await;
            Ok("respuesta tardía".to_string())
        })
    }

    fn generate_vision<'a>(
        &'a self,
        _prompt_text: &'a str,
        _image: &'a VisionImage,
    ) -> GatewayFuture<'a> {
        Box::pin(async move { Err(GenerationError::EmptyResponse) })
    }
}

struct JsonResponse {
    status: StatusCode,
    body: Value,
}

fn build_app(controller: SessionController, max_upload_bytes: usize) -> Router {
    build_router(AppState::new(
        controller,
        SessionRegistry::new(Duration::from_secs(3600)),
        ServiceInfo {
            model: "gemini-test".to_string(),
            credential_source: CredentialSource::Environment,
        },
        max_upload_bytes,
    ))
}

fn app_with_replies(
    replies: Vec<Result<String, GenerationError>>,
) -> (Router, Arc<ScriptedGateway>) {
    let gateway = ScriptedGateway::with_replies(replies);
    let app = build_app(SessionController::new(gateway.clone()), 1024 * 1024);
    (app, gateway)
}

async fn send_json(app: &Router, request: Request<Body>) -> JsonResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should succeed");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let body = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));

    JsonResponse { status, body }
}

fn request(method: Method, uri: &str, json_body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match json_body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    }
}

fn multipart_request(
    uri: &str,
    image: Option<(&str, &str, &[u8])>,
    question: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    if let Some((file_name, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(question) = question {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"question\"\r\n\r\n{question}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request should build")
}

async fn create_session(app: &Router) -> String {
    let created = send_json(app, request(Method::POST, "/v1/sessions", None)).await;
    assert_eq!(created.status, StatusCode::CREATED);
    created.body["session_id"]
        .as_str()
        .expect("session id should be a string")
        .to_string()
}

#[tokio::test]
async fn healthz_echoes_request_id() {
    let (app, _) = app_with_replies(vec![]);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .header("x-request-id", "widget-req-1")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("widget-req-1")
    );
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let body: Value = serde_json::from_slice(&body).expect("health body should be json");
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn info_reports_model_mode_and_examples() {
    let (app, _) = app_with_replies(vec![]);

    let info = send_json(&app, request(Method::GET, "/v1/info", None)).await;

    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.body["app"], "FitGenius");
    assert_eq!(info.body["model"], "gemini-test");
    assert_eq!(info.body["credential_mode"], "local");
    assert_eq!(
        info.body["accepted_image_types"],
        json!(["jpg", "jpeg", "png", "webp"])
    );
    assert_eq!(
        info.body["examples"][0],
        json!({ "index": 0, "text": "Crear rutina para principiante en casa" })
    );
    assert_eq!(info.body["examples"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn widget_page_is_served_at_root() {
    let (app, _) = app_with_replies(vec![]);

    let response = app
        .oneshot(request(Method::GET, "/", None))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    assert!(String::from_utf8_lossy(&body).contains("FitGenius"));
}

#[tokio::test]
async fn new_session_is_seeded_with_greeting() {
    let (app, _) = app_with_replies(vec![]);

    let created = send_json(&app, request(Method::POST, "/v1/sessions", None)).await;

    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "idle");
    assert_eq!(created.body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(created.body["messages"][0]["role"], "assistant");
    assert_eq!(created.body["messages"][0]["text"], GREETING);
}

#[tokio::test]
async fn message_round_trip_appends_user_text_and_reply() {
    let (app, gateway) = app_with_replies(vec![Ok("Rutina: 3x12 sentadillas".to_string())]);
    let session_id = create_session(&app).await;

    let reply = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/messages"),
            Some(json!({ "text": "Rutina para principiante en casa" })),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["outcome"], "replied");
    let messages = &reply.body["transcript"]["messages"];
    assert_eq!(messages.as_array().map(Vec::len), Some(3));
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["text"], "Rutina para principiante en casa");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["text"], "Rutina: 3x12 sentadillas");
    assert_eq!(gateway.calls(), 1);

    let transcript = send_json(
        &app,
        request(
            Method::GET,
            &format!("/v1/sessions/{session_id}/transcript"),
            None,
        ),
    )
    .await;
    assert_eq!(transcript.status, StatusCode::OK);
    assert_eq!(transcript.body["revision"], 2);
    assert_eq!(transcript.body["stats"]["messages"], 3);
}

#[tokio::test]
async fn blank_message_is_ignored() {
    let (app, gateway) = app_with_replies(vec![]);
    let session_id = create_session(&app).await;

    let reply = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/messages"),
            Some(json!({ "text": "   " })),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["outcome"], "ignored");
    assert_eq!(
        reply.body["transcript"]["messages"].as_array().map(Vec::len),
        Some(1)
    );
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn malformed_message_body_is_rejected() {
    let (app, _) = app_with_replies(vec![]);
    let session_id = create_session(&app).await;

    let reply = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/messages"),
            Some(json!({ "mensaje": "hola" })),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn generation_failure_is_returned_as_a_transcript_message() {
    let (app, _) = app_with_replies(vec![Err(GenerationError::Transport(
        "connection reset".to_string(),
    ))]);
    let session_id = create_session(&app).await;

    let reply = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/messages"),
            Some(json!({ "text": "hola" })),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["outcome"], "failed");
    let transcript = &reply.body["transcript"];
    assert_eq!(transcript["status"], "idle");
    assert_eq!(transcript["messages"][2]["kind"], "error");
    assert_eq!(
        transcript["messages"][2]["text"],
        "Error al generar respuesta: generation request failed: connection reset"
    );
    assert_eq!(transcript["last_error"], transcript["messages"][2]["text"]);
}

#[tokio::test]
async fn unknown_and_malformed_session_ids_are_rejected() {
    let (app, _) = app_with_replies(vec![]);

    let missing = send_json(
        &app,
        request(
            Method::GET,
            "/v1/sessions/6f1c2d4e-8a7b-4c3d-9e2f-1a2b3c4d5e6f/transcript",
            None,
        ),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"]["code"], "session_not_found");

    let malformed = send_json(
        &app,
        request(Method::POST, "/v1/sessions/not-a-uuid/reset", None),
    )
    .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["error"]["code"], "invalid_session_id");
}

#[tokio::test]
async fn examples_run_as_typed_text_and_unknown_indexes_fail() {
    let (app, gateway) = app_with_replies(vec![Ok("Plan de 4 días".to_string())]);
    let session_id = create_session(&app).await;

    let reply = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/examples/2"),
            None,
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body["transcript"]["messages"][1]["text"],
        "Rutina para ganar músculo en gimnasio (4 días)"
    );

    let unknown = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/examples/9"),
            None,
        ),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["error"]["code"], "unknown_example");

    let malformed = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/examples/primero"),
            None,
        ),
    )
    .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["error"]["code"], "invalid_example_index");
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn image_upload_is_analyzed_and_staging_is_cleaned_up() {
    let upload_dir = tempfile::tempdir().expect("tempdir should create");
    let gateway = ScriptedGateway::with_replies(vec![Ok("Es una prensa de piernas".to_string())]);
    let controller = SessionController::new(gateway.clone())
        .with_upload_dir(Some(upload_dir.path().to_path_buf()));
    let app = build_app(controller, 1024 * 1024);
    let session_id = create_session(&app).await;

    let reply = send_json(
        &app,
        multipart_request(
            &format!("/v1/sessions/{session_id}/images"),
            Some(("maquina.png", "image/png", b"fake-png")),
            Some("¿Cómo la uso?"),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["outcome"], "replied");
    let transcript = &reply.body["transcript"];
    let uploaded = &transcript["messages"][1];
    assert_eq!(uploaded["kind"], "image");
    assert_eq!(uploaded["question"], "¿Cómo la uso?");
    assert_eq!(
        uploaded["text"],
        "📸 [Imagen subida: maquina.png]\nPregunta: ¿Cómo la uso?"
    );
    assert_eq!(
        uploaded["image"]["data_url"],
        "data:image/png;base64,ZmFrZS1wbmc="
    );
    assert_eq!(
        transcript["messages"][2]["text"],
        "**Análisis de imagen:**\n\nEs una prensa de piernas"
    );
    assert_eq!(transcript["stats"]["images_analyzed"], 1);
    assert_eq!(gateway.calls(), 1);

    let leftovers = std::fs::read_dir(upload_dir.path())
        .expect("upload dir should list")
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn image_upload_validation_errors() {
    let (app, gateway) = app_with_replies(vec![]);
    let session_id = create_session(&app).await;
    let uri = format!("/v1/sessions/{session_id}/images");

    let gif = send_json(
        &app,
        multipart_request(&uri, Some(("clip.gif", "image/gif", b"GIF89a")), None),
    )
    .await;
    assert_eq!(gif.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(gif.body["error"]["code"], "unsupported_image");

    let missing = send_json(&app, multipart_request(&uri, None, Some("¿y esto?"))).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"]["code"], "missing_image");

    let not_multipart = send_json(
        &app,
        request(Method::POST, &uri, Some(json!({ "image": "nope" }))),
    )
    .await;
    assert_eq!(not_multipart.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_multipart.body["error"]["code"], "invalid_multipart");

    let transcript = send_json(
        &app,
        request(
            Method::GET,
            &format!("/v1/sessions/{session_id}/transcript"),
            None,
        ),
    )
    .await;
    assert_eq!(transcript.body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let gateway = ScriptedGateway::with_replies(vec![]);
    let app = build_app(SessionController::new(gateway.clone()), 256);
    let session_id = create_session(&app).await;

    let big = vec![7_u8; 4096];
    let reply = send_json(
        &app,
        multipart_request(
            &format!("/v1/sessions/{session_id}/images"),
            Some(("grande.jpg", "image/jpeg", &big)),
            None,
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(reply.body["error"]["code"], "upload_too_large");
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn reset_and_delete_session() {
    let (app, _) = app_with_replies(vec![Ok("respuesta".to_string())]);
    let session_id = create_session(&app).await;
    send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/messages"),
            Some(json!({ "text": "hola" })),
        ),
    )
    .await;

    let reset = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/reset"),
            None,
        ),
    )
    .await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(reset.body["messages"][0]["text"], GREETING);

    let deleted = send_json(
        &app,
        request(Method::DELETE, &format!("/v1/sessions/{session_id}"), None),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({ "ok": true }));

    let gone = send_json(
        &app,
        request(
            Method::GET,
            &format!("/v1/sessions/{session_id}/transcript"),
            None,
        ),
    )
    .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_is_busy_while_a_reply_is_generating() {
    let gateway = Arc::new(BlockingGateway::default());
    let app = build_app(SessionController::new(gateway.clone()), 1024 * 1024);
    let session_id = create_session(&app).await;
    let messages_uri = format!("/v1/sessions/{session_id}/messages");

    let in_flight = {
        let app = app.clone();
        let uri = messages_uri.clone();
        tokio::spawn(async move {
            send_json(
                &app,
                request(Method::POST, &uri, Some(json!({ "text": "hola" }))),
            )
            .await
        })
    };
    gateway.started.notified().await;

    let second = send_json(
        &app,
        request(
            Method::POST,
            &messages_uri,
            Some(json!({ "text": "¿sigues ahí?" })),
        ),
    )
    .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.body["error"]["code"], "session_busy");

    let reset = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/reset"),
            None,
        ),
    )
    .await;
    assert_eq!(reset.status, StatusCode::CONFLICT);

    let transcript_uri = format!("/v1/sessions/{session_id}/transcript");
    let during = send_json(&app, request(Method::GET, &transcript_uri, None)).await;
    assert_eq!(during.status, StatusCode::OK);
    assert_eq!(during.body["status"], "generating");
    assert_eq!(during.body["messages"].as_array().map(Vec::len), Some(2));
    assert_eq!(during.body["messages"][1]["text"], "hola");

    gateway.release.notify_one();
    let first = in_flight.await.expect("in-flight request should join");
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["transcript"]["messages"][2]["text"], "respuesta tardía");

    let after = send_json(&app, request(Method::GET, &transcript_uri, None)).await;
    assert_eq!(after.body["status"], "idle");
    assert_eq!(after.body["messages"].as_array().map(Vec::len), Some(3));
    assert_eq!(after.body["revision"], first.body["transcript"]["revision"]);
}

#[tokio::test]
async fn session_routes_replace_unusable_request_ids() {
    let (app, _) = app_with_replies(vec![]);
    let session_id = create_session(&app).await;
    let uri = format!("/v1/sessions/{session_id}/transcript");

    let send = |request_id: &'static str| {
        app.clone().oneshot(
            Request::builder()
                .uri(uri.as_str())
                .header("x-request-id", request_id)
                .body(Body::empty())
                .expect("request should build"),
        )
    };
    let echoed = |response: &axum::response::Response| {
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
    };

    let kept = send("widget:transcript/3")
        .await
        .expect("request should succeed");
    assert_eq!(kept.status(), StatusCode::OK);
    assert_eq!(echoed(&kept).as_deref(), Some("widget:transcript/3"));

    let replaced = send("rutina de piernas")
        .await
        .expect("request should succeed");
    assert_eq!(replaced.status(), StatusCode::OK);
    let generated = echoed(&replaced).expect("a request id should be generated");
    assert!(
        uuid::Uuid::parse_str(&generated).is_ok(),
        "expected a generated uuid, got {generated}"
    );
}

#[tokio::test]
async fn session_resumes_from_exported_history() {
    let (app, gateway) = app_with_replies(vec![
        Ok("Press militar 4x8".to_string()),
        Ok("Añade elevaciones laterales".to_string()),
    ]);
    let session_id = create_session(&app).await;
    let first = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{session_id}/messages"),
            Some(json!({ "text": "Rutina de hombros" })),
        ),
    )
    .await;
    let history = first.body["transcript"]["history"].clone();
    assert_eq!(
        history,
        json!([
            format!("Asistente: {GREETING}"),
            "Usuario: Rutina de hombros",
            "Asistente: Press militar 4x8",
        ])
    );

    let resumed = send_json(
        &app,
        request(
            Method::POST,
            "/v1/sessions",
            Some(json!({ "history": history })),
        ),
    )
    .await;
    assert_eq!(resumed.status, StatusCode::CREATED);
    assert_ne!(resumed.body["session_id"], json!(session_id));
    assert_eq!(resumed.body["history"], history);
    let messages = &resumed.body["messages"];
    assert_eq!(messages.as_array().map(Vec::len), Some(3));
    assert_eq!(messages[0]["text"], GREETING);
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[2]["text"], "Press militar 4x8");

    let resumed_id = resumed.body["session_id"]
        .as_str()
        .expect("session id should be a string");
    let next = send_json(
        &app,
        request(
            Method::POST,
            &format!("/v1/sessions/{resumed_id}/messages"),
            Some(json!({ "text": "¿Y para la próxima semana?" })),
        ),
    )
    .await;
    assert_eq!(next.body["outcome"], "replied");
    assert_eq!(
        next.body["transcript"]["messages"].as_array().map(Vec::len),
        Some(5)
    );
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test]
async fn malformed_session_request_is_rejected() {
    let (app, _) = app_with_replies(vec![]);

    let reply = send_json(
        &app,
        request(
            Method::POST,
            "/v1/sessions",
            Some(json!({ "history": "Usuario: hola" })),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn staging_failure_does_not_leak_server_paths() {
    let parent = tempfile::tempdir().expect("tempdir should create");
    let gateway = ScriptedGateway::with_replies(vec![Ok("no debería usarse".to_string())]);
    let controller = SessionController::new(gateway.clone())
        .with_upload_dir(Some(parent.path().join("no-existe")));
    let app = build_app(controller, 1024 * 1024);
    let session_id = create_session(&app).await;

    let reply = send_json(
        &app,
        multipart_request(
            &format!("/v1/sessions/{session_id}/images"),
            Some(("banco.png", "image/png", b"png")),
            None,
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["outcome"], "failed");
    let failure = reply.body["transcript"]["messages"][2]["text"]
        .as_str()
        .expect("failure text should be a string");
    assert_eq!(
        failure,
        "Error al procesar la imagen: no se pudo preparar la imagen subida"
    );
    assert!(!failure.contains(&*parent.path().to_string_lossy()));
    assert_eq!(gateway.calls(), 0);
}
