use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{
    Message, MessageContent, MessageKind, Role, Session, SessionStats, SessionStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMessageRequest {
    pub text: String,
}

/// Optional body of `POST /v1/sessions`. `history` takes the lines a previous
/// transcript exported, so a reloaded page can pick the conversation back up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamplePrompt {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfoResponse {
    pub app: String,
    pub version: String,
    pub model: String,
    pub credential_mode: String,
    pub accepted_image_types: Vec<String>,
    pub examples: Vec<ExamplePrompt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub file_name: String,
    pub mime_type: String,
    pub data_url: String,
}

/// A transcript entry as the renderer draws it.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub position: usize,
    pub role: Role,
    pub kind: MessageKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageView>,
}

impl MessageView {
    pub fn from_message(position: usize, message: &Message) -> Self {
        let (question, image) = match message.content() {
            MessageContent::Image(attachment) => (
                attachment.question.clone(),
                Some(ImageView {
                    file_name: attachment.file_name.clone(),
                    mime_type: attachment.mime_type.clone(),
                    data_url: attachment.data_url(),
                }),
            ),
            _ => (None, None),
        };

        Self {
            position,
            role: message.role(),
            kind: message.kind(),
            text: message.display_text(),
            question,
            image,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub revision: u64,
    pub stats: SessionStats,
    pub messages: Vec<MessageView>,
    pub history: Vec<String>,
}

impl TranscriptResponse {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id(),
            status: session.status(),
            last_error: session.last_error().map(ToString::to_string),
            revision: session.revision(),
            stats: session.stats(),
            messages: session
                .transcript()
                .iter()
                .enumerate()
                .map(|(position, message)| MessageView::from_message(position, message))
                .collect(),
            history: session.history_lines(),
        }
    }
}

/// Returned by every interaction endpoint; failures are part of the transcript,
/// so they still come back as 200.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    pub outcome: &'static str,
    pub transcript: TranscriptResponse,
}
