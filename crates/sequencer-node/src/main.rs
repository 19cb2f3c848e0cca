mod config;
mod http;
mod stubs;

use anyhow::Context;
use clap::Parser;
use config::NodeConfig;
use sequencer_bridge::BridgeBatcher;
use sequencer_checkpoint::CheckpointEngine;
use sequencer_shard_router::ShardBackend;
use sequencer_telemetry::{PrometheusExporter, Registry};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Rollup sequencer coordination plane")]
struct Cli {
    /// Path to a YAML configuration file; fields not present fall back to
    /// the built-in defaults.
    #[arg(long, env = "SEQUENCER_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Overrides the configured checkpoint directory.
    #[arg(long, env = "SEQUENCER_CHECKPOINT_DIR")]
    checkpoint_dir: Option<std::path::PathBuf>,

    /// Overrides the configured HTTP bind address.
    #[arg(long, env = "SEQUENCER_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut node_config = match &cli.config {
        Some(path) => {
            let body = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config file {}", path.display()))?;
            NodeConfig::from_yaml(&body).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => NodeConfig::default(),
    };
    if let Some(dir) = cli.checkpoint_dir {
        node_config.checkpoint.checkpoint_dir = dir;
    }
    if let Some(bind) = cli.bind {
        node_config.bind = bind;
    }

    let registry = Arc::new(Registry::new());
    let prometheus = Arc::new(PrometheusExporter::new());

    let shards: Vec<Arc<dyn ShardBackend>> = (0..node_config.shard_count.max(1))
        .map(|_| Arc::new(stubs::InMemoryShard::default()) as Arc<dyn ShardBackend>)
        .collect();
    let shard_router = Arc::new(
        sequencer_shard_router::ShardRouter::new(shards, &node_config.shard_router, Some(registry.clone()))
            .context("constructing shard router")?,
    );

    let checkpoint = Arc::new(CheckpointEngine::new(
        node_config.checkpoint.clone(),
        node_config.sequencer_identity.clone(),
        Some(registry.clone()),
    ));
    if let Some(state) = checkpoint.load_state().await {
        tracing::info!(processed_count = state.processed_count, "restored state from last checkpoint");
    }

    let bridge = Arc::new(BridgeBatcher::new(
        node_config.bridge.clone(),
        Arc::new(stubs::NullSettlementLayer),
        Arc::new(stubs::LoggingExecutor),
        Some(shard_router),
        Some(checkpoint),
        Some(registry.clone()),
    ));

    spawn_metrics_snapshot_loop(registry.clone(), node_config.metrics_dir.clone().into());
    spawn_prometheus_bridge_loop(registry.clone(), prometheus.clone(), bridge.clone());

    let state = http::AppState {
        registry,
        prometheus,
        bridge: bridge.clone(),
    };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&node_config.bind)
        .await
        .with_context(|| format!("binding to {}", node_config.bind))?;
    tracing::info!(bind = %node_config.bind, "sequencer-node listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    bridge.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining in-flight work");
}

fn spawn_metrics_snapshot_loop(registry: Arc<Registry>, dir: std::path::PathBuf) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            if let Err(err) = sequencer_telemetry::save_snapshot(&dir, &registry).await {
                tracing::warn!(error = %err, "failed to persist metrics snapshot");
            }
        }
    });
}

/// Bridges the generic `Registry` counters/gauges the components already
/// record into the `/metrics` scrape surface's fixed set of series.
fn spawn_prometheus_bridge_loop(registry: Arc<Registry>, prometheus: Arc<PrometheusExporter>, bridge: Arc<BridgeBatcher>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(1000));
        let mut last_accepted = 0.0;
        let mut last_succeeded = 0.0;
        let mut last_failed = 0.0;
        loop {
            interval.tick().await;
            let status = bridge.get_status();
            let accepted = (status.metrics.deposits_accepted + status.metrics.withdrawals_accepted) as f64;
            for _ in 0..(accepted - last_accepted).max(0.0) as u64 {
                prometheus.record_accepted();
            }
            last_accepted = accepted;

            let succeeded = status.metrics.operations_succeeded as f64;
            for _ in 0..(succeeded - last_succeeded).max(0.0) as u64 {
                prometheus.record_success(0.0);
            }
            last_succeeded = succeeded;

            let failed = status.metrics.operations_failed as f64;
            for _ in 0..(failed - last_failed).max(0.0) as u64 {
                prometheus.record_error();
            }
            last_failed = failed;

            for (priority, size) in status.pending_deposits_by_priority.iter().enumerate() {
                prometheus.set_queue_size("deposits", priority as u32, *size as i64);
            }
            for (priority, size) in status.pending_withdrawals_by_priority.iter().enumerate() {
                prometheus.set_queue_size("withdrawals", priority as u32, *size as i64);
            }
            prometheus.set_component_status("bridge", true);

            if let Some(batch_analysis) = registry.analyze("bridge.batch_size", sequencer_telemetry::Timeframe::OneMinute) {
                prometheus.record_batch(batch_analysis.mean.round() as usize);
            }
        }
    });
}
