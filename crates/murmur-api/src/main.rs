//! murmur API server binary.
//!
//! Wires the router against PostgreSQL and filesystem blob storage. Without
//! `DATABASE_URL` (or with `--memory`) it falls back to in-memory stores, for
//! local development against nothing.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use murmur_api::{app, AppState};
use murmur_core::defaults;
use murmur_media::HttpSpeechEngine;
use murmur_store::{
    Database, FilesystemBlobStore, MemoryCredentialStore, MemoryNoteStore, PgCredentialStore,
};

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   RUST_LOG    - standard env filter (default: "murmur_api=debug,tower_http=debug")
///
/// Returns the appender guard; dropping it flushes buffered log lines.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "murmur_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("murmur-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();

    let memory_mode = std::env::args().any(|arg| arg == "--memory");

    let host = std::env::var(defaults::ENV_HOST).unwrap_or_else(|_| defaults::DEFAULT_HOST.into());
    let port: u16 = std::env::var(defaults::ENV_PORT)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::DEFAULT_PORT);

    let upload_dir = std::env::var(defaults::ENV_UPLOAD_DIR)
        .unwrap_or_else(|_| defaults::DEFAULT_UPLOAD_DIR.into());
    let blobs = FilesystemBlobStore::new(&upload_dir);
    if let Err(msg) = blobs.validate().await {
        anyhow::bail!("blob storage validation failed: {}", msg);
    }
    info!(upload_dir = %upload_dir, "Blob storage ready");

    let speech = HttpSpeechEngine::from_env().map(Arc::new);
    match &speech {
        Some(engine) => info!(model = engine.model_name(), "Speech backend configured"),
        None => info!("Speech backend not configured; server-side transcription disabled"),
    }

    let token_ttl: Option<i64> = std::env::var(defaults::ENV_TOKEN_TTL_SECS)
        .ok()
        .and_then(|v| v.parse().ok());

    let database_url = std::env::var(defaults::ENV_DATABASE_URL).ok();
    let state = match database_url.filter(|_| !memory_mode) {
        Some(url) => {
            let db = Database::connect(&url)
                .await
                .context("connecting to PostgreSQL")?;
            db.migrate().await.context("running migrations")?;
            info!("Connected to PostgreSQL");
            let credentials = match token_ttl {
                Some(secs) => PgCredentialStore::with_ttl(db.pool.clone(), secs),
                None => db.credentials,
            };
            AppState::new(
                Arc::new(db.notes),
                Arc::new(blobs),
                Arc::new(credentials),
                speech,
            )
        }
        None => {
            warn!("Running with in-memory stores; data will not survive a restart");
            let credentials = match token_ttl {
                Some(secs) => MemoryCredentialStore::with_ttl(secs),
                None => MemoryCredentialStore::new(),
            };
            AppState::new(
                Arc::new(MemoryNoteStore::new()),
                Arc::new(blobs),
                Arc::new(credentials),
                speech,
            )
        }
    };

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
