#![forbid(unsafe_code)]

//! `session-exec` — stateful code execution server binary.
//!
//! Bootstraps configuration, the session registry, the idle-reclamation
//! task, and the HTTP execution boundary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use session_exec::config::GlobalConfig;
use session_exec::http::{server, AppState};
use session_exec::orchestrator::reclaim;
use session_exec::orchestrator::SessionRegistry;
use session_exec::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "session-exec", about = "Stateful code execution server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the directory holding per-session storage areas.
    #[arg(long)]
    storage_root: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("session-exec server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(root) = args.storage_root {
        config.storage_root = Some(root);
    }
    config.validate()?;
    let config = Arc::new(config);
    info!(
        execution_ms = config.timeouts.execution_ms,
        session_idle_seconds = config.timeouts.session_idle_seconds,
        sweep_interval_seconds = config.timeouts.sweep_interval_seconds,
        "configuration loaded"
    );

    // ── Session registry and idle reclamation ───────────
    let registry = Arc::new(SessionRegistry::from_config(&config)?);
    let ct = CancellationToken::new();
    let reclaim_handle = reclaim::spawn_reclaim_task(
        Arc::clone(&registry),
        config.sweep_interval(),
        config.session_idle(),
        ct.clone(),
    );
    info!("reclaim task started");

    // ── Start HTTP boundary ─────────────────────────────
    let listener = server::bind(&config).await?;
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        registry: Arc::clone(&registry),
    });
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(listener, state, http_ct).await {
            error!(%err, "http transport failed");
        }
    });

    info!("execution server ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(http_handle, reclaim_handle);
    registry.shutdown().await;
    info!("session-exec shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
