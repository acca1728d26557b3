//! HTTP server for repo-api: serves a git working copy as a read/write
//! content store.

mod auth;
mod cli;
mod error;
mod routes;

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use repo_api::sync::spawn_periodic;
use repo_api::TaskQueue;

use crate::cli::Args;
use crate::routes::AppState;

const DEFAULT_LOG_FILTER: &str = "repo_api=info,repo_api_server=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    let config = args.load_config().context("failed to load configuration")?;
    config.validate()?;

    let state = AppState::from_config(&config, TaskQueue::new());

    if args.sync {
        let sync = state.sync();
        let outcome = state
            .queue()
            .add(move || async move { sync.sync(None).await })
            .await
            .context("initial sync failed")?;
        info!(?outcome, "initial sync");
        spawn_periodic(state.queue().clone(), state.sync(), config.git.sync_interval());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, repo = %config.repo_dir.display(), "listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}
