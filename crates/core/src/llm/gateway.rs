use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type GatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One role-tagged unit of conversational input for the remote model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// Sampling and length parameters sent with text generations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation request timed out")]
    Timeout,
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation provider returned status={status}: {message}")]
    ProviderFailure { status: u16, message: String },
    #[error("generation provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
    #[error("generation provider returned no text")]
    EmptyResponse,
}

impl GenerationError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::ProviderFailure { .. } => "provider_failure",
            Self::InvalidProviderPayload(_) => "invalid_payload",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// A single blocking round trip to the remote model per call. Implementations
/// never retry and report every failure through `GenerationError`.
pub trait GenerationGateway: Send + Sync {
    fn generate_text<'a>(
        &'a self,
        turns: &'a [Turn],
        options: &'a GenerationOptions,
    ) -> GatewayFuture<'a>;

    fn generate_vision<'a>(
        &'a self,
        prompt_text: &'a str,
        image: &'a VisionImage,
    ) -> GatewayFuture<'a>;
}
