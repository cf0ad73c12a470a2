//! `mcpcp` binary entry point: loads a config, brings
//! up the downstream and admin surfaces, and owns the process lifecycle —
//! hot reload on `SIGHUP`, graceful shutdown on `ctrl_c`/`SIGTERM`,
//! periodic retry-tracker cleanup. `run` starts the proxy; `validate` just
//! loads and schema-checks a config document and exits.

mod downstream;
mod generation;
mod logging;

use clap::{Parser, Subcommand};
use mcpcp_admin::AdminState;
use mcpcp_config::{DownstreamTransportKind, ResolvedConfig};
use mcpcp_core::RequestHandler;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CONFIG_EXIT_CODE: u8 = 2;
const STARTUP_EXIT_CODE: u8 = 1;
const RETRY_TRACKER_CLEANUP_INTERVAL_SECS: u64 = 60;
const DEFAULT_ADMIN_PORT: u16 = 9090;

#[derive(Parser)]
#[command(name = "mcpcp", version, about = "Proxy between an agent client and a set of MCP tool servers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Load a config and run the proxy. The default if no subcommand is given.
    Run {
        #[arg(long, env = "MCPCP_CONFIG", default_value = "mcpcp.json")]
        config: PathBuf,
        /// Host/port for the admin HTTP surface (`/healthz`, `/generation`, `/logs`).
        /// Ambient operator infrastructure, not part of the downstream config document.
        #[arg(long, env = "MCPCP_ADMIN_HOST", default_value = "127.0.0.1")]
        admin_host: String,
        #[arg(long, env = "MCPCP_ADMIN_PORT", default_value_t = DEFAULT_ADMIN_PORT)]
        admin_port: u16,
    },
    /// Load and schema-validate a config document, then exit without starting a server.
    Validate {
        #[arg(long, env = "MCPCP_CONFIG", default_value = "mcpcp.json")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run {
        config: PathBuf::from("mcpcp.json"),
        admin_host: "127.0.0.1".to_string(),
        admin_port: DEFAULT_ADMIN_PORT,
    });

    match command {
        Command::Validate { config } => validate(&config),
        Command::Run { config, admin_host, admin_port } => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    eprintln!("failed to start async runtime: {err}");
                    return ExitCode::from(STARTUP_EXIT_CODE);
                }
            };
            runtime.block_on(run(config, admin_host, admin_port))
        }
    }
}

fn validate(path: &PathBuf) -> ExitCode {
    match mcpcp_config::load(path) {
        Ok(resolved) => {
            println!(
                "config OK: {} upstream(s), downstream transport {:?}",
                resolved.upstreams.len(),
                resolved.downstream.transport
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("config invalid: {err}");
            ExitCode::from(CONFIG_EXIT_CODE)
        }
    }
}

async fn run(config_path: PathBuf, admin_host: String, admin_port: u16) -> ExitCode {
    let resolved = match mcpcp_config::load(&config_path) {
        Ok(resolved) => resolved,
        Err(err) => {
            eprintln!("fatal: {err}");
            return ExitCode::from(CONFIG_EXIT_CODE);
        }
    };

    let log_tail = logging::init(&resolved.log_level);
    tracing::info!(config = %config_path.display(), "loaded configuration");

    let generation_counter = Arc::new(AtomicU64::new(1));
    let first_generation = generation::build_generation(&resolved, 1).await;
    let max_cache_entries = resolved.cache.max_entries;
    let cache_enabled = resolved.cache.enabled;
    let cache_errors = resolved.cache.cache_errors;
    let handler = Arc::new(RequestHandler::new(first_generation, max_cache_entries, cache_enabled, cache_errors));

    let shutdown = CancellationToken::new();

    let retry_task = spawn_retry_tracker_cleanup(handler.clone(), shutdown.clone());
    let admin_task = match spawn_admin_server(handler.clone(), log_tail, &admin_host, admin_port, shutdown.clone()) {
        Ok(task) => task,
        Err(err) => {
            tracing::error!(error = %err, "admin surface failed to bind");
            return ExitCode::from(STARTUP_EXIT_CODE);
        }
    };

    let downstream_task = match spawn_downstream(handler.clone(), &resolved, shutdown.clone()) {
        Ok(task) => task,
        Err(err) => {
            tracing::error!(error = %err, "downstream surface failed to start");
            return ExitCode::from(STARTUP_EXIT_CODE);
        }
    };

    let reload_task = spawn_reload_on_sighup(handler.clone(), config_path.clone(), generation_counter, shutdown.clone());

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping");
    shutdown.cancel();

    let _ = tokio::join!(retry_task, admin_task, downstream_task, reload_task);
    generation::shutdown_generation(&handler.generation()).await;

    ExitCode::SUCCESS
}

fn spawn_retry_tracker_cleanup(handler: Arc<RequestHandler>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(RETRY_TRACKER_CLEANUP_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => handler.cleanup_retry_tracker(RETRY_TRACKER_CLEANUP_INTERVAL_SECS),
                _ = shutdown.cancelled() => break,
            }
        }
    })
}

fn spawn_admin_server(
    handler: Arc<RequestHandler>,
    log_tail: mcpcp_admin::LogTail,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let state = Arc::new(AdminState { handler, log_tail });
    let router = mcpcp_admin::router(state);

    Ok(tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(%addr, "admin surface listening");
                let serve = axum::serve(listener, router);
                tokio::select! {
                    result = serve => {
                        if let Err(err) = result {
                            tracing::error!(error = %err, "admin surface exited with an error");
                        }
                    }
                    _ = shutdown.cancelled() => {}
                }
            }
            Err(err) => tracing::error!(%addr, error = %err, "admin surface failed to bind"),
        }
    }))
}

fn spawn_downstream(
    handler: Arc<RequestHandler>,
    config: &ResolvedConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    match &config.downstream.transport {
        DownstreamTransportKind::Stdio => Ok(tokio::spawn(async move {
            tokio::select! {
                result = downstream::stdio::serve(handler) => {
                    if let Err(err) = result {
                        tracing::error!(error = %err, "stdio downstream surface exited with an error");
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        })),
        DownstreamTransportKind::Sse | DownstreamTransportKind::StreamableHttp => {
            let host = config.downstream.host.clone().ok_or_else(|| anyhow::anyhow!("downstream.host is required for http transports"))?;
            let port = config.downstream.port.ok_or_else(|| anyhow::anyhow!("downstream.port is required for http transports"))?;
            let addr: SocketAddr = format!("{host}:{port}").parse()?;
            let router = downstream::http::router(handler);
            Ok(tokio::spawn(async move {
                match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => {
                        tracing::info!(%addr, "downstream surface listening");
                        let serve = axum::serve(listener, router);
                        tokio::select! {
                            result = serve => {
                                if let Err(err) = result {
                                    tracing::error!(error = %err, "downstream surface exited with an error");
                                }
                            }
                            _ = shutdown.cancelled() => {}
                        }
                    }
                    Err(err) => tracing::error!(%addr, error = %err, "downstream surface failed to bind"),
                }
            }))
        }
    }
}

/// `SIGHUP` triggers a config hot reload: rebuild the config and a fresh
/// generation off to the side, then swap it in atomically
/// (`RequestHandler::set_generation`). A reload failure (bad config,
/// upstream that won't build) is logged and the previous generation keeps
/// running untouched.
#[cfg(unix)]
fn spawn_reload_on_sighup(
    handler: Arc<RequestHandler>,
    config_path: PathBuf,
    generation_counter: Arc<AtomicU64>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(mut sighup) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) else {
            tracing::warn!("failed to install SIGHUP handler; hot reload via signal is unavailable");
            return;
        };
        loop {
            tokio::select! {
                _ = sighup.recv() => reload(&handler, &config_path, &generation_counter).await,
                _ = shutdown.cancelled() => break,
            }
        }
    })
}

#[cfg(not(unix))]
fn spawn_reload_on_sighup(
    _handler: Arc<RequestHandler>,
    _config_path: PathBuf,
    _generation_counter: Arc<AtomicU64>,
    _shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {})
}

async fn reload(handler: &Arc<RequestHandler>, config_path: &PathBuf, generation_counter: &AtomicU64) {
    tracing::info!("reload requested");
    let resolved = match mcpcp_config::load(config_path) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::warn!(error = %err, "reload failed; keeping previous generation");
            return;
        }
    };

    let id = generation_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let previous = handler.generation();
    let next = generation::build_generation(&resolved, id).await;
    handler.set_generation(next);
    generation::shutdown_generation(&previous).await;
    tracing::info!(generation_id = id, "reload complete");
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
