//! surged — connection load generator daemon.

use std::sync::Arc;

use anyhow::Result;

use surge_core::config::SurgeConfig;
use surge_pool::{PoolOptions, PrometheusReporter, SocketPool};

mod tcp;

use tcp::TcpConnector;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = SurgeConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = SurgeConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SurgeConfig::default()
    });

    if let Some(target) = std::env::args().nth(1) {
        config.network.target = target;
    }
    tracing::info!(
        addr = %config.network.target,
        api_port = config.network.api_port,
        "surged starting"
    );

    // Pool
    let metrics = Arc::new(PrometheusReporter::new());
    let factory = Arc::new(TcpConnector::from_config(&config.network));
    let (pool, mut fatal_rx) = SocketPool::new(
        factory,
        metrics.clone(),
        PoolOptions::from_config(&config),
    );
    pool.start()?;

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // Control API
    let api_port = config.network.api_port;
    let api_task = {
        let state = surge_api::ApiState {
            pool: pool.clone(),
            metrics,
        };
        tokio::spawn(async move { surge_api::serve(state, api_port).await })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task => {
            tracing::error!("API server exited: {:?}", r);
        }
        Some(e) = fatal_rx.recv() => {
            tracing::error!(error = %e, "socket pool failed");
            return Err(e.into());
        }
    }

    pool.stop();
    pool.stopped().await;
    tracing::info!("socket pool stopped");

    Ok(())
}
