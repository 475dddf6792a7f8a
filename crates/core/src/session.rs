use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::composer::{ASSISTANT_LINE_PREFIX, USER_LINE_PREFIX, parse_history_line};
use crate::llm::prompts::{ANALYSIS_HEADER, GREETING};
use crate::llm::{Turn, TurnRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn turn_role(self) -> TurnRole {
        match self {
            Self::User => TurnRole::User,
            Self::Assistant => TurnRole::Model,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime_type: String,
    /// Base64 payload, kept so the transcript can show a preview.
    pub data: String,
    pub question: Option<String>,
}

impl ImageAttachment {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
        question: Option<&str>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
            question: question.map(ToString::to_string),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    Image(ImageAttachment),
    ImageAnalysis { text: String },
    Error { text: String },
}

/// One transcript entry. There are no setters: once appended it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    content: MessageContent,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text { text: text.into() },
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text { text: text.into() },
        }
    }

    pub fn user_image(attachment: ImageAttachment) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Image(attachment),
        }
    }

    pub fn image_analysis(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ImageAnalysis { text: text.into() },
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Error { text: text.into() },
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn kind(&self) -> MessageKind {
        match self.content {
            MessageContent::Text { .. } => MessageKind::Text,
            MessageContent::Image(_) | MessageContent::ImageAnalysis { .. } => MessageKind::Image,
            MessageContent::Error { .. } => MessageKind::Error,
        }
    }

    pub fn display_text(&self) -> String {
        match &self.content {
            MessageContent::Text { text } | MessageContent::Error { text } => text.clone(),
            MessageContent::Image(attachment) => {
                let mut rendered = format!("📸 [Imagen subida: {}]", attachment.file_name);
                if let Some(question) = attachment.question.as_deref() {
                    rendered.push_str("\nPregunta: ");
                    rendered.push_str(question);
                }
                rendered
            }
            MessageContent::ImageAnalysis { text } => format!("{ANALYSIS_HEADER}\n\n{text}"),
        }
    }

    /// Only plain conversational text is replayed to the model.
    pub fn replay_turn(&self) -> Option<ReplayTurn> {
        match &self.content {
            MessageContent::Text { text } => Some(ReplayTurn {
                role: self.role,
                text: text.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayTurn {
    pub role: Role,
    pub text: String,
}

impl ReplayTurn {
    pub fn to_turn(&self) -> Turn {
        Turn {
            role: self.role.turn_role(),
            text: self.text.clone(),
        }
    }

    /// Serialized line form, `"Usuario: ..."` or `"Asistente: ..."`.
    pub fn to_history_line(&self) -> String {
        let prefix = match self.role {
            Role::User => USER_LINE_PREFIX,
            Role::Assistant => ASSISTANT_LINE_PREFIX,
        };
        format!("{prefix} {}", self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: vec![seed_message()],
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(seed_message());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn images_analyzed(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| matches!(message.content, MessageContent::Image(_)))
            .count()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Generating,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub messages: usize,
    pub images_analyzed: usize,
}

/// State owned by one browser session: the transcript, the replay history
/// derived from it, and where the controller currently is.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
    store: MessageStore,
    replay: Vec<ReplayTurn>,
    status: SessionStatus,
    last_error: Option<String>,
    revision: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        let now = Utc::now();
        let store = MessageStore::new();
        let replay = replay_from(&store);
        Self {
            id,
            created_at: now,
            last_active_at: now,
            store,
            replay,
            status: SessionStatus::Idle,
            last_error: None,
            revision: 0,
        }
    }

    /// Rebuilds a session from history exported by [`Session::history_lines`].
    /// The greeting is seeded as usual, so a leading greeting line is skipped.
    /// Lines that carry neither prefix are dropped.
    pub fn resume_from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut session = Self::new();
        let mut turns = lines
            .iter()
            .filter_map(|line| parse_history_line(line.as_ref()))
            .peekable();
        if turns
            .peek()
            .is_some_and(|turn| turn.role == TurnRole::Model && turn.text == GREETING)
        {
            turns.next();
        }
        for turn in turns {
            session.store.append(match turn.role {
                TurnRole::User => Message::user_text(turn.text),
                TurnRole::Model => Message::assistant_text(turn.text),
            });
        }
        session.replay = replay_from(&session.store);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    pub fn transcript(&self) -> &[Message] {
        self.store.all()
    }

    pub fn replay_history(&self) -> &[ReplayTurn] {
        &self.replay
    }

    pub fn history_lines(&self) -> Vec<String> {
        self.replay.iter().map(ReplayTurn::to_history_line).collect()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            messages: self.store.len(),
            images_analyzed: self.store.images_analyzed(),
        }
    }

    pub fn append(&mut self, message: Message) {
        if let Some(turn) = message.replay_turn() {
            self.replay.push(turn);
        }
        self.store.append(message);
        self.mark_changed();
    }

    pub fn reset(&mut self) {
        self.store.reset();
        self.replay = replay_from(&self.store);
        self.status = SessionStatus::Idle;
        self.last_error = None;
        self.mark_changed();
    }

    pub(crate) fn begin_generation(&mut self) {
        self.status = SessionStatus::Generating;
        self.last_active_at = Utc::now();
    }

    pub(crate) fn finish_generation(&mut self) {
        self.status = SessionStatus::Idle;
        self.last_error = None;
    }

    pub(crate) fn fail_generation(&mut self, failure: String) {
        self.status = SessionStatus::Error;
        self.last_error = Some(failure);
    }

    pub(crate) fn return_to_idle(&mut self) {
        self.status = SessionStatus::Idle;
    }

    fn mark_changed(&mut self) {
        self.revision = self.revision.saturating_add(1);
        self.last_active_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn seed_message() -> Message {
    Message::assistant_text(GREETING)
}

fn replay_from(store: &MessageStore) -> Vec<ReplayTurn> {
    store.all().iter().filter_map(Message::replay_turn).collect()
}
