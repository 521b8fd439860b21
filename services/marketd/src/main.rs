use std::{fs, net::SocketAddr, path::PathBuf};

use admin_ipc::{run_server, AdminRequest, DEFAULT_SOCKET_PATH};
use anyhow::bail;
use clap::Parser;
use http_api::{router, AppState, SystemClock};
use metrics::MetricsHandle;
use storage::init_sqlite;
use tokio::net::TcpListener;
use tokio::task;
use tracing::{info, warn, Level};
use uuid::Uuid;

mod admin;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "SQLITE_PATH", default_value = "sqlite://market.db")]
    sqlite_path: String,

    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:4000")]
    http_addr: SocketAddr,

    #[arg(long, env = "ADMIN_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    admin_socket: String,

    #[arg(long, env = "METRICS_ADDR", default_value = "127.0.0.1:9109")]
    metrics_addr: SocketAddr,
}

fn log_startup(args: &Args, run_id: &str) {
    info!(path = %args.sqlite_path, "sqlite path configured");
    info!(addr = %args.http_addr, "http bind planned");
    info!(socket = %args.admin_socket, "admin socket bind planned");
    info!(addr = %args.metrics_addr, "metrics bind planned");
    info!(%run_id, "run initialized");
}

/// Filesystem path behind a `sqlite://` url, without its query string.
/// `None` for memory databases and non-file urls.
fn sqlite_file_path(path: &str) -> Option<PathBuf> {
    let rest = path.strip_prefix("sqlite://")?;
    let path_part = rest.split_once('?').map(|(path, _)| path).unwrap_or(rest);
    Some(PathBuf::from(path_part))
}

fn ensure_sqlite_parent_dir(path: &str) -> anyhow::Result<()> {
    if let Some(parent) = sqlite_file_path(path).as_deref().and_then(|p| p.parent()) {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn validate_sqlite_path(path: &str) -> anyhow::Result<()> {
    const MEMORY_PREFIX: &str = "sqlite::memory:";
    const URL_PREFIX: &str = "sqlite://";

    if path.starts_with(MEMORY_PREFIX) {
        return Ok(());
    }

    if !path.starts_with(URL_PREFIX) {
        bail!("sqlite path must start with `sqlite://` or use `sqlite::memory:`");
    }

    let rest = path.trim_start_matches(URL_PREFIX);
    let (path_part, _) = rest.split_once('?').unwrap_or((rest, ""));
    if path_part.is_empty() {
        bail!("sqlite path is missing a filesystem component after `sqlite://`");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    validate_sqlite_path(&args.sqlite_path)?;
    info!(
        sqlite = %args.sqlite_path,
        http = %args.http_addr,
        "booting marketd"
    );

    ensure_sqlite_parent_dir(&args.sqlite_path)?;

    let run_id = Uuid::new_v4().to_string();
    let store = init_sqlite(&args.sqlite_path).await?;
    log_startup(&args, &run_id);

    let missing_tables = store.validate_required_tables().await?;
    if !missing_tables.is_empty() {
        warn!(tables = ?missing_tables, "sqlite missing required tables");
    }

    let metrics = MetricsHandle::new()?;

    let admin_store = store.clone();
    let admin_metrics = metrics.clone();
    let socket_path = args.admin_socket.clone();
    task::spawn(async move {
        let handler = move |req: AdminRequest| {
            let store = admin_store.clone();
            let metrics = admin_metrics.clone();
            async move { admin::handle(&store, &metrics, &SystemClock, req).await }
        };
        if let Err(err) = run_server(&socket_path, handler).await {
            tracing::error!(error = ?err, "admin ipc server failed");
        }
    });

    let metrics_addr = args.metrics_addr;
    let metrics_task = metrics.clone();
    task::spawn(async move {
        if let Err(err) = metrics_task.serve(metrics_addr).await {
            tracing::error!(error = ?err, "metrics server error");
        }
    });

    let app = router(AppState::new(store, SystemClock, metrics));
    let listener = TcpListener::bind(args.http_addr).await?;
    info!(
        run_id = %run_id,
        sqlite = %args.sqlite_path,
        http_addr = %args.http_addr,
        admin_socket = %args.admin_socket,
        metrics_addr = %args.metrics_addr,
        "ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(run_id = %run_id, "stopped");
    Ok(())
}

#[cfg(test)]
fn cwd_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}
