use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fitgenius_core::config::CREDENTIAL_KEY;
use fitgenius_core::llm::GeminiGateway;
use fitgenius_core::{AppConfig, ConfigError, SessionController};
use fitgenius_server::http::{self, AppState, ServiceInfo};
use fitgenius_server::sessions::SessionRegistry;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "fitgenius_server=debug,fitgenius_core=debug,axum=info,tower_http=info".to_string()
        }))
        .init();

    if !dotenv_loaded {
        info!("no .env file found; reading configuration from the environment");
    }

    let config = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(ConfigError::MissingCredential { key }) => {
            error!(
                "No se encontró {key}. Agrega {CREDENTIAL_KEY}=<tu clave> a tu archivo .env \
                 o guárdala en el directorio de secretos (FITGENIUS_SECRETS_DIR)."
            );
            std::process::exit(1);
        }
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    info!(
        credential_mode = config.credential_source.mode_label(),
        model = %config.gemini.model,
        "configuration loaded"
    );

    let gateway = match GeminiGateway::new(config.gemini.clone()) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!("Error al conectar a Gemini: {err}");
            std::process::exit(1);
        }
    };

    if config.verify_connection {
        if let Err(err) = gateway.verify_connection().await {
            error!("Error al conectar a Gemini: {err}");
            std::process::exit(1);
        }
        info!(model = %gateway.model(), "gemini connection verified");
    } else {
        warn!("skipping gemini connection probe");
    }

    let controller = SessionController::new(Arc::new(gateway))
        .with_options(config.generation)
        .with_upload_dir(config.upload_dir.clone());

    let app = http::build_router(AppState::new(
        controller,
        SessionRegistry::new(Duration::from_secs(config.session_idle_ttl_seconds)),
        ServiceInfo {
            model: config.gemini.model.clone(),
            credential_source: config.credential_source,
        },
        config.max_upload_bytes,
    ));

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid API_BIND_ADDR {}: {err}", config.bind_addr);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "fitgenius server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {err}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
