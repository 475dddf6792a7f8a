use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config_env::{
    optional_trimmed_env, parse_bool_env, parse_f64_env, parse_u32_env, parse_u64_env,
    parse_usize_env, read_secret_file,
};
use crate::llm::{GeminiGatewayConfig, GenerationOptions};

pub const CREDENTIAL_KEY: &str = "GOOGLE_API_KEY";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";
const DEFAULT_SECRETS_DIR: &str = "/run/secrets";
const DEFAULT_SESSION_IDLE_TTL_SECONDS: u64 = 3600;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub credential_source: CredentialSource,
    pub gemini: GeminiGatewayConfig,
    pub verify_connection: bool,
    pub generation: GenerationOptions,
    pub session_idle_ttl_seconds: u64,
    pub max_upload_bytes: usize,
    pub upload_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required credential {key}")]
    MissingCredential { key: String },
    #[error("failed to read secret {path}: {message}")]
    SecretStore { path: String, message: String },
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid number in env var {0}")]
    ParseFloat(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Where the remote-service credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    SecretStore,
    Environment,
}

impl CredentialSource {
    /// Label shown to users: secrets are how hosted deployments are configured,
    /// the environment is how local development is.
    pub const fn mode_label(self) -> &'static str {
        match self {
            Self::SecretStore => "remote",
            Self::Environment => "local",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
    value: String,
    source: CredentialSource,
}

impl ApiCredential {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let secrets_dir = optional_trimmed_env("FITGENIUS_SECRETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR));
        let credential =
            resolve_credential(&secrets_dir, optional_trimmed_env(CREDENTIAL_KEY))?;

        let mut gemini = GeminiGatewayConfig::new(credential.value());
        if let Some(api_base) = optional_trimmed_env("GEMINI_API_BASE") {
            gemini.api_base = validate_api_base(&api_base)?;
        }
        if let Some(model) = optional_trimmed_env("GEMINI_MODEL") {
            gemini.model = model;
        }
        gemini.timeout_ms = parse_u64_env("GEMINI_TIMEOUT_MS", gemini.timeout_ms)?;

        let defaults = GenerationOptions::default();
        let generation = GenerationOptions {
            temperature: parse_f64_env("GEMINI_TEMPERATURE", defaults.temperature)?,
            top_p: parse_f64_env("GEMINI_TOP_P", defaults.top_p)?,
            top_k: parse_u32_env("GEMINI_TOP_K", defaults.top_k)?,
            max_output_tokens: parse_u32_env(
                "GEMINI_MAX_OUTPUT_TOKENS",
                defaults.max_output_tokens,
            )?,
        };
        validate_generation_options(&generation)?;

        Ok(Self {
            bind_addr: optional_trimmed_env("API_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            credential_source: credential.source(),
            gemini,
            verify_connection: parse_bool_env("GEMINI_VERIFY_CONNECTION", true)?,
            generation,
            session_idle_ttl_seconds: parse_u64_env(
                "SESSION_IDLE_TTL_SECONDS",
                DEFAULT_SESSION_IDLE_TTL_SECONDS,
            )?,
            max_upload_bytes: parse_usize_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            upload_dir: optional_trimmed_env("UPLOAD_TMP_DIR").map(PathBuf::from),
        })
    }
}

/// The secret store wins over the environment; neither present is fatal.
pub fn resolve_credential(
    secrets_dir: &Path,
    env_value: Option<String>,
) -> Result<ApiCredential, ConfigError> {
    if let Some(value) = read_secret_file(secrets_dir, CREDENTIAL_KEY)? {
        return Ok(ApiCredential {
            value,
            source: CredentialSource::SecretStore,
        });
    }

    env_value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(|value| ApiCredential {
            value,
            source: CredentialSource::Environment,
        })
        .ok_or_else(|| ConfigError::MissingCredential {
            key: CREDENTIAL_KEY.to_string(),
        })
}

pub fn validate_generation_options(options: &GenerationOptions) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&options.temperature) {
        return Err(ConfigError::InvalidConfiguration(
            "GEMINI_TEMPERATURE must be between 0 and 2".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&options.top_p) {
        return Err(ConfigError::InvalidConfiguration(
            "GEMINI_TOP_P must be between 0 and 1".to_string(),
        ));
    }
    if options.top_k == 0 {
        return Err(ConfigError::InvalidConfiguration(
            "GEMINI_TOP_K must be at least 1".to_string(),
        ));
    }
    if options.max_output_tokens == 0 {
        return Err(ConfigError::InvalidConfiguration(
            "GEMINI_MAX_OUTPUT_TOKENS must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_api_base(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw).map_err(|err| {
        ConfigError::InvalidConfiguration(format!("GEMINI_API_BASE is not a valid URL: {err}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidConfiguration(
            "GEMINI_API_BASE must start with http:// or https://".to_string(),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
