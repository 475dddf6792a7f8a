pub mod config;
mod config_env;
pub mod controller;
pub mod llm;
pub mod models;
pub mod session;
pub mod upload;

pub use config::{AppConfig, ConfigError, CredentialSource};
pub use controller::{
    ControllerError, Outcome, SessionController, TracingObserver, TranscriptObserver,
};
pub use session::{Message, MessageKind, Role, Session, SessionStatus};
