//! Steward daemon: boots the orchestrator, drives the scheduler loop, and serves the HTTP API.

mod routes;

use chrono::Local;
use std::sync::Arc;
use steward_core::{CoreConfig, Orchestrator};
use steward_skills::{GeminiClient, GoogleWorkspace, LlmMode, SlackMessenger};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const LOG_TARGET: &str = "steward::daemon";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[steward-daemon] .env not loaded: {} (using system environment)", e);
    }

    let config = match CoreConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[steward-daemon] invalid configuration: {e}");
            return Err(e.into());
        }
    };

    std::fs::create_dir_all(config.log_dir())?;
    let file_appender = tracing_appender::rolling::daily(config.log_dir(), "steward.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let mode = LlmMode::from_flag(config.is_live());
    let reasoning = Arc::new(GeminiClient::new(mode));
    let workspace = Arc::new(GoogleWorkspace::from_env());
    let messenger = Arc::new(SlackMessenger::from_env());
    if !workspace.is_configured() {
        tracing::warn!(target: LOG_TARGET, "Google workspace not configured; calendar and tasks read as empty");
    }
    if !messenger.is_configured() {
        tracing::warn!(target: LOG_TARGET, "Slack not configured; notifications will be dropped");
    }

    let http_port = config.http_port;
    let orchestrator = Arc::new(Orchestrator::new(config, reasoning, workspace, messenger)?);
    orchestrator.reset_on_boot();

    let report = orchestrator.preflight().await;
    if report.healthy {
        tracing::info!(target: LOG_TARGET, checks = report.checks.len(), "pre-flight passed");
    } else {
        tracing::error!(target: LOG_TARGET, "pre-flight reported failures; continuing in degraded mode");
    }

    let scheduler = Arc::clone(orchestrator.scheduler());
    scheduler.install_default_jobs(Local::now().naive_local()).await?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(async move {
        let _ = shutdown_rx.changed().await;
    }));

    let app = routes::router(routes::AppState {
        orchestrator: Arc::clone(&orchestrator),
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port)).await?;
    tracing::info!(target: LOG_TARGET, port = http_port, mode = ?mode, "steward daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!(target: LOG_TARGET, "CTRL-C received; shutting down");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        tracing::warn!(target: LOG_TARGET, error = %e, "scheduler task ended abnormally");
    }
    if let Err(e) = orchestrator.conversation().flush() {
        tracing::warn!(target: LOG_TARGET, error = %e, "conversation log flush failed");
    }
    tracing::info!(target: LOG_TARGET, "steward daemon stopped");
    Ok(())
}
