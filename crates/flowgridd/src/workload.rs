//! Synthetic workload source.
//!
//! Enqueues a fixed number of jobs per tick with uniformly random service
//! times and costs, standing in for the external producers a deployment
//! would have. Stops producing as soon as shutdown is signalled or the
//! ingress closes.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{info, warn};

use flowgrid_cluster::{Cluster, ClusterError};
use flowgrid_core::config::WorkloadConfig;
use flowgrid_core::{Job, JobId};

pub async fn run_generator(
    cluster: Arc<Cluster>,
    cfg: WorkloadConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(cfg.tick_interval());
    let mut next_id: JobId = 1;

    info!(
        rate = cfg.rate,
        tick_ms = cfg.tick_interval_ms,
        "workload generator started"
    );

    'producing: loop {
        tokio::select! {
            _ = ticker.tick() => {
                for _ in 0..cfg.rate {
                    let duration =
                        Duration::from_millis(rng.gen_range(cfg.min_duration_ms..cfg.max_duration_ms));
                    let cost = rng.gen_range(cfg.min_cost..=cfg.max_cost);
                    let job = Job::new(next_id, duration, cost);
                    next_id += 1;

                    match cluster.enqueue(job).await {
                        Ok(()) => {}
                        Err(ClusterError::ShuttingDown) => break 'producing,
                        Err(err) => warn!(job = job.id, error = %err, "job rejected at ingress"),
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!(produced = next_id - 1, "workload generator stopped");
}
