use std::panic;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::pipeline::worker::Worker;
use crate::core::traits::engine::EngineError;
use crate::core::workspace::WorkspaceSlot;
use crate::http::client::HttpQueue;
use crate::stubs::engine::EngineStub;

mod config;
mod constants;
mod core;
mod http;
mod stubs;

#[tokio::main]
#[tracing::instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log)),
        )
        .init();
    set_panic_hook();

    let queue = HttpQueue::new(&config.api_url, config.request_timeout())?;
    let engine = EngineStub::new(
        Err(EngineError::Internal {
            msg: "no execution engine configured".to_string(),
        }),
        Duration::from_secs(1),
    );
    let mut worker = Worker::new(
        Arc::new(queue),
        Arc::new(engine),
        WorkspaceSlot::new(&config.data_dir),
        config.poll_interval(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown requested, finishing current task");
        let _ = shutdown_tx.send(true);
    });

    tracing::info!("Polling {} for tasks", config.api_url);
    worker.run(shutdown_rx).await;

    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Could not listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
