//! flowgridd — the flowgrid daemon.
//!
//! Wires the whole system into one process: the cluster with its
//! dispatcher, the load predictor fed by a periodic sampler, the scaling
//! controller, a synthetic workload generator, and a status log.
//!
//! # Usage
//!
//! ```text
//! flowgridd                              # defaults, run until Ctrl-C
//! flowgridd --config flowgrid.toml      # load a profile
//! flowgridd --run-for 30 --rate 5       # timed run with a rate override
//! ```
//!
//! Shutdown is phased: producers and tickers stop first, then the ingress
//! closes and the dispatcher drains, then every node finishes its queue.

mod workload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use flowgrid_autoscale::{LoadPredictor, ScaleController};
use flowgrid_cluster::Cluster;
use flowgrid_core::GridConfig;

#[derive(Parser)]
#[command(name = "flowgridd", about = "Adaptive job dispatcher with closed-loop scaling")]
struct Cli {
    /// Path to a flowgrid.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    run_for: Option<u64>,

    /// Override workload.rate (jobs per generator tick).
    #[arg(long)]
    rate: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "info,flowgridd=debug,flowgrid_cluster=debug,flowgrid_autoscale=debug"
                        .parse()
                        .unwrap()
                }),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GridConfig::from_file(path)?,
        None => GridConfig::default(),
    };
    if let Some(rate) = cli.rate {
        config.workload.rate = rate;
    }
    config.validate()?;

    run(config, cli.run_for.map(Duration::from_secs)).await
}

async fn run(config: GridConfig, run_for: Option<Duration>) -> anyhow::Result<()> {
    info!("flowgrid daemon starting");

    // ── Subsystems ─────────────────────────────────────────────

    let cluster = Cluster::start(&config.cluster);
    let predictor = Arc::new(LoadPredictor::new(config.predictor.alpha));
    let controller = ScaleController::new(
        Arc::clone(&cluster),
        Arc::clone(&predictor),
        &config.controller,
    );
    info!(
        alpha = config.predictor.alpha,
        target = config.controller.target_latency,
        "forecasting and control initialized"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────

    // Load sampler: feeds the predictor with the cluster's total load.
    let sampler = {
        let cluster = Arc::clone(&cluster);
        let predictor = Arc::clone(&predictor);
        let interval = config.predictor.sample_interval();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        predictor.observe(cluster.total_load().await as f64);
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    };

    // Scaling controller loop.
    let controller_task = tokio::spawn(
        controller.run(config.controller.step_interval(), shutdown_rx.clone()),
    );

    // Status log: one line per second summarizing the control state.
    let status = {
        let cluster = Arc::clone(&cluster);
        let predictor = Arc::clone(&predictor);
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        let nodes = cluster.node_count().await;
                        let load = cluster.total_load().await;
                        let latency = cluster.estimate_latency().await;
                        let forecast = predictor.forecast();
                        info!(
                            nodes,
                            load,
                            latency,
                            forecast,
                            "cluster status"
                        );
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    };

    // Workload generator.
    let generator = tokio::spawn(workload::run_generator(
        Arc::clone(&cluster),
        config.workload.clone(),
        shutdown_rx.clone(),
    ));

    // ── Wait for the exit condition ────────────────────────────

    match run_for {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("run duration elapsed"),
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("received ctrl-c");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("received ctrl-c");
        }
    }

    // ── Phased shutdown ────────────────────────────────────────

    let _ = shutdown_tx.send(true);
    let _ = generator.await;
    let _ = sampler.await;
    let _ = controller_task.await;
    let _ = status.await;
    cluster.shutdown().await;

    info!("flowgridd finished");
    Ok(())
}
