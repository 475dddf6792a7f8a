use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::gateway::{
    GatewayFuture, GenerationError, GenerationGateway, GenerationOptions, Turn, VisionImage,
};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiGatewayConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl GeminiGatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    fn model_url(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{model_path}", self.api_base.trim_end_matches('/'))
    }

    fn generate_content_url(&self) -> String {
        format!("{}:generateContent", self.model_url())
    }
}

impl fmt::Debug for GeminiGatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiGatewayConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum GeminiConnectionError {
    #[error("failed to build Gemini http client: {0}")]
    HttpClient(String),
    #[error("Gemini service is unreachable: {0}")]
    Unreachable(String),
    #[error("Gemini rejected the configuration (status={status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Clone)]
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GeminiGatewayConfig,
}

impl GeminiGateway {
    pub fn new(config: GeminiGatewayConfig) -> Result<Self, GeminiConnectionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GeminiConnectionError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Looks up the configured model once so a bad key or model id stops
    /// startup instead of surfacing on the first chat message.
    pub async fn verify_connection(&self) -> Result<(), GeminiConnectionError> {
        let response = self
            .client
            .get(self.config.model_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|err| GeminiConnectionError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(GeminiConnectionError::Rejected {
            status: status.as_u16(),
            message: parse_provider_error_message(&body),
        })
    }

    async fn send_once(
        &self,
        request: &GenerateContentRequest<'_>,
    ) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.config.generate_content_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::InvalidProviderPayload(format!("response body unreadable: {err}"))
            }
        })?;

        if !status.is_success() {
            return Err(GenerationError::ProviderFailure {
                status: status.as_u16(),
                message: parse_provider_error_message(&body),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|err| {
            GenerationError::InvalidProviderPayload(format!("response is not valid JSON: {err}"))
        })?;

        extract_text(parsed)
    }
}

impl GenerationGateway for GeminiGateway {
    fn generate_text<'a>(
        &'a self,
        turns: &'a [Turn],
        options: &'a GenerationOptions,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let request = GenerateContentRequest {
                contents: turns
                    .iter()
                    .map(|turn| Content {
                        role: turn.role.as_str(),
                        parts: vec![Part::Text {
                            text: turn.text.as_str(),
                        }],
                    })
                    .collect(),
                generation_config: Some(GenerationConfig::from(options)),
            };
            self.send_once(&request).await
        })
    }

    fn generate_vision<'a>(
        &'a self,
        prompt_text: &'a str,
        image: &'a VisionImage,
    ) -> GatewayFuture<'a> {
        Box::pin(async move {
            let request = GenerateContentRequest {
                contents: vec![Content {
                    role: "user",
                    parts: vec![
                        Part::Text { text: prompt_text },
                        Part::InlineData {
                            inline_data: InlineData {
                                mime_type: image.mime_type.as_str(),
                                data: STANDARD.encode(&image.bytes),
                            },
                        },
                    ],
                }],
                generation_config: None,
            };
            self.send_once(&request).await
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
}

impl From<&GenerationOptions> for GenerationConfig {
    fn from(options: &GenerationOptions) -> Self {
        Self {
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k,
            max_output_tokens: options.max_output_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            Some(reason) => Err(GenerationError::InvalidProviderPayload(format!(
                "prompt blocked: {reason}"
            ))),
            None => Err(GenerationError::EmptyResponse),
        };
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(reason) if reason != "STOP" => Err(GenerationError::InvalidProviderPayload(
                format!("candidate finished without text: {reason}"),
            )),
            _ => Err(GenerationError::EmptyResponse),
        };
    }

    Ok(text)
}

fn parse_provider_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        message: Option<String>,
        status: Option<Value>,
    }

    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let Some(details) = parsed.and_then(|envelope| envelope.error) else {
        return "unknown".to_string();
    };

    match (details.status, details.message) {
        (Some(Value::String(status)), Some(message)) => format!("{status}: {message}"),
        (_, Some(message)) => message,
        (Some(Value::String(status)), None) => status,
        _ => "unknown".to_string(),
    }
}
