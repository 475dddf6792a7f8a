use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::composer::{build_text_turns, compose_vision_prompt};
use crate::llm::prompts::{
    EXAMPLE_PROMPTS, Persona, TEXT_ERROR_MARKER, VISION_ERROR_MARKER, persona_prompt,
};
use crate::llm::{GenerationError, GenerationGateway, GenerationOptions, VisionImage};
use crate::session::{ImageAttachment, Message, Session};
use crate::upload::{ImageUpload, StagedUpload};

/// Told about every transcript mutation so the renderer can redraw.
pub trait TranscriptObserver: Send + Sync {
    fn transcript_changed(&self, session: &Session);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TranscriptObserver for TracingObserver {
    fn transcript_changed(&self, session: &Session) {
        debug!(
            session_id = %session.id(),
            revision = session.revision(),
            messages = session.transcript().len(),
            status = ?session.status(),
            "transcript changed; redraw requested"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Blank input; nothing was appended.
    Ignored,
    Replied,
    /// The failure was recorded as an assistant message.
    Failed,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Replied => "replied",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("unknown example prompt index {0}")]
    UnknownExample(usize),
    #[error("unsupported image type for {0}; accepted: jpg, jpeg, png, webp")]
    UnsupportedImage(String),
    #[error("uploaded image is empty")]
    EmptyImage,
}

#[derive(Debug, Error)]
enum AnalysisError {
    #[error("no se pudo preparar la imagen subida")]
    Staging(#[source] io::Error),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl AnalysisError {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Staging(_) => "staging",
            Self::Generation(err) => err.kind(),
        }
    }
}

/// Runs one user interaction at a time against a session: append the input,
/// compose, call the gateway once, append the reply or the failure.
#[derive(Clone)]
pub struct SessionController {
    gateway: Arc<dyn GenerationGateway>,
    options: GenerationOptions,
    observer: Arc<dyn TranscriptObserver>,
    upload_dir: Option<PathBuf>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self {
            gateway,
            options: GenerationOptions::default(),
            observer: Arc::new(TracingObserver),
            upload_dir: None,
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TranscriptObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_upload_dir(mut self, upload_dir: Option<PathBuf>) -> Self {
        self.upload_dir = upload_dir;
        self
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub async fn submit_text(&self, session: &mut Session, text: &str) -> Outcome {
        let text = text.trim();
        if text.is_empty() {
            debug!(session_id = %session.id(), "ignoring blank submission");
            return Outcome::Ignored;
        }

        let turns = build_text_turns(
            persona_prompt(Persona::TextAdvice),
            session.replay_history(),
            text,
        );
        session.begin_generation();
        self.append(session, Message::user_text(text));

        let started_at = Instant::now();
        match self.gateway.generate_text(&turns, &self.options).await {
            Ok(reply) => {
                session.finish_generation();
                self.append(session, Message::assistant_text(reply));
                info!(
                    session_id = %session.id(),
                    turns = turns.len(),
                    latency_ms = started_at.elapsed().as_millis() as u64,
                    outcome = "success",
                    "text generation completed"
                );
                Outcome::Replied
            }
            Err(err) => {
                self.record_failure(session, TEXT_ERROR_MARKER, &err, err.kind(), started_at)
            }
        }
    }

    pub async fn run_example(
        &self,
        session: &mut Session,
        index: usize,
    ) -> Result<Outcome, ControllerError> {
        let prompt = EXAMPLE_PROMPTS
            .get(index)
            .ok_or(ControllerError::UnknownExample(index))?;
        Ok(self.submit_text(session, prompt).await)
    }

    /// The question is optional; a blank one is treated as absent. Unsupported
    /// uploads are rejected before anything is appended.
    pub async fn analyze_image(
        &self,
        session: &mut Session,
        upload: ImageUpload,
        question: Option<&str>,
    ) -> Result<Outcome, ControllerError> {
        let mime_type = upload
            .mime_type()
            .ok_or_else(|| ControllerError::UnsupportedImage(upload.file_name.clone()))?;
        if upload.bytes.is_empty() {
            return Err(ControllerError::EmptyImage);
        }
        let question = question
            .map(str::trim)
            .filter(|question| !question.is_empty());

        session.begin_generation();
        self.append(
            session,
            Message::user_image(ImageAttachment::new(
                upload.file_name.as_str(),
                mime_type,
                &upload.bytes,
                question,
            )),
        );

        let started_at = Instant::now();
        match self.run_vision(&upload, mime_type, question).await {
            Ok(reply) => {
                session.finish_generation();
                self.append(session, Message::image_analysis(reply));
                info!(
                    session_id = %session.id(),
                    mime_type,
                    image_bytes = upload.bytes.len(),
                    latency_ms = started_at.elapsed().as_millis() as u64,
                    outcome = "success",
                    "image analysis completed"
                );
                Ok(Outcome::Replied)
            }
            Err(err) => Ok(self.record_failure(
                session,
                VISION_ERROR_MARKER,
                &err,
                err.kind(),
                started_at,
            )),
        }
    }

    pub fn reset(&self, session: &mut Session) {
        session.reset();
        info!(session_id = %session.id(), "conversation reset");
        self.observer.transcript_changed(session);
    }

    async fn run_vision(
        &self,
        upload: &ImageUpload,
        mime_type: &str,
        question: Option<&str>,
    ) -> Result<String, AnalysisError> {
        let staged = StagedUpload::stage(upload, self.upload_dir.as_deref())
            .map_err(AnalysisError::Staging)?;
        let read = staged.read_bytes().await;
        let staged_path = staged.path().to_path_buf();
        if let Err(err) = staged.discard() {
            warn!(path = %staged_path.display(), "failed to remove staged upload: {err}");
        }
        let bytes = read.map_err(AnalysisError::Staging)?;

        let prompt = compose_vision_prompt(
            persona_prompt(Persona::ImageAnalysis),
            question,
            VisionImage {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        Ok(self
            .gateway
            .generate_vision(&prompt.text, &prompt.image)
            .await?)
    }

    fn record_failure(
        &self,
        session: &mut Session,
        marker: &str,
        err: &(dyn std::error::Error + 'static),
        error_kind: &'static str,
        started_at: Instant,
    ) -> Outcome {
        let failure = format!("{marker}{err}");
        warn!(
            session_id = %session.id(),
            latency_ms = started_at.elapsed().as_millis() as u64,
            outcome = "failure",
            error_kind,
            cause = %error_chain(err),
            "generation failed"
        );
        session.fail_generation(failure.clone());
        self.append(session, Message::error(failure));
        session.return_to_idle();
        self.observer.transcript_changed(session);
        Outcome::Failed
    }

    fn append(&self, session: &mut Session, message: Message) {
        session.append(message);
        self.observer.transcript_changed(session);
    }
}

/// Full cause chain for logs. The transcript only gets the top-level message,
/// which never carries server paths.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
