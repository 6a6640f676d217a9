//! Scaling controller — the closed loop over forecast and latency.
//!
//! [`ScalePolicy::evaluate`] is the pure decision function; the
//! [`ScaleController`] wraps it with the cooldown gate, reads its inputs
//! from the live cluster and predictor, and applies decisions through the
//! membership mutators (which self-clamp at the configured bounds).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use flowgrid_cluster::Cluster;
use flowgrid_core::config::ControllerConfig;

use crate::predictor::LoadPredictor;

/// Forecast units one node absorbs comfortably.
const ABSORB_PER_NODE: f64 = 1.5;
/// Additional forecast units each added node is worth.
const HEADROOM_PER_NODE: f64 = 2.0;
/// Scale in only when latency falls below this fraction of the target.
const SCALE_IN_FRACTION: f64 = 0.6;

/// A scaling decision for one controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Add this many nodes (the cluster clamps at its ceiling).
    ScaleOut(u32),
    /// Remove one node (the cluster clamps at its floor).
    ScaleIn,
    /// No action; also returned while the cooldown is active.
    Hold,
}

/// The decision rule, separated from the control loop so it can be
/// exercised without a running cluster.
#[derive(Debug, Clone, Copy)]
pub struct ScalePolicy {
    /// Latency setpoint, in the estimator's synthetic units.
    pub target_latency: f64,
    /// Fleet floor; scale-in decisions stop here.
    pub min_nodes: usize,
}

impl ScalePolicy {
    /// Decide from a forecast, a latency estimate, and the fleet size.
    ///
    /// `need = ceil((forecast - 1.5 * n) / 2)` expresses how many nodes the
    /// forecast demands beyond what the fleet absorbs. Latency above target
    /// forces at least one new node even when the forecast looks covered.
    pub fn evaluate(&self, forecast: f64, latency: f64, node_count: usize) -> ScaleDecision {
        let shortfall = forecast - ABSORB_PER_NODE * node_count as f64;
        let need = (shortfall / HEADROOM_PER_NODE).ceil();

        if latency > self.target_latency || need > 0.0 {
            return ScaleDecision::ScaleOut(need.max(1.0) as u32);
        }
        if latency < self.target_latency * SCALE_IN_FRACTION && node_count > self.min_nodes {
            return ScaleDecision::ScaleIn;
        }
        ScaleDecision::Hold
    }
}

/// Periodically sizes the cluster to keep the latency estimate near the
/// target, separating consecutive actions by at least the cooldown.
pub struct ScaleController {
    cluster: Arc<Cluster>,
    predictor: Arc<LoadPredictor>,
    policy: ScalePolicy,
    cooldown: Duration,
    last_action: Option<Instant>,
}

impl ScaleController {
    pub fn new(
        cluster: Arc<Cluster>,
        predictor: Arc<LoadPredictor>,
        cfg: &ControllerConfig,
    ) -> Self {
        let policy = ScalePolicy {
            target_latency: cfg.target_latency,
            min_nodes: cluster.min_nodes(),
        };
        Self {
            cluster,
            predictor,
            policy,
            cooldown: cfg.cooldown(),
            last_action: None,
        }
    }

    /// One controller step: gate on the cooldown, evaluate, apply.
    ///
    /// Returns the decision taken (`Hold` while cooling down). The cooldown
    /// clock restarts whenever a scaling branch is taken, even if the
    /// membership mutator clamped the action at a bound.
    pub async fn step(&mut self) -> ScaleDecision {
        if let Some(last) = self.last_action {
            if last.elapsed() < self.cooldown {
                return ScaleDecision::Hold;
            }
        }

        let forecast = self.predictor.forecast();
        let latency = self.cluster.estimate_latency().await;
        let node_count = self.cluster.node_count().await;
        let decision = self.policy.evaluate(forecast, latency, node_count);

        match decision {
            ScaleDecision::ScaleOut(count) => {
                let mut added = 0u32;
                for _ in 0..count {
                    if !self.cluster.add_node().await {
                        break; // ceiling reached
                    }
                    added += 1;
                }
                info!(
                    forecast,
                    latency,
                    nodes = node_count,
                    requested = count,
                    added,
                    "scaling out"
                );
                self.last_action = Some(Instant::now());
            }
            ScaleDecision::ScaleIn => {
                let removed = self.cluster.remove_node().await;
                info!(forecast, latency, nodes = node_count, removed, "scaling in");
                self.last_action = Some(Instant::now());
            }
            ScaleDecision::Hold => {
                debug!(forecast, latency, nodes = node_count, "steady");
            }
        }
        decision
    }

    /// Run the controller loop until shutdown is signalled.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = interval.as_millis() as u64,
            cooldown_ms = self.cooldown.as_millis() as u64,
            target = self.policy.target_latency,
            "scale controller started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.step().await;
                }
                _ = shutdown.changed() => {
                    info!("scale controller shutting down");
                    break;
                }
            }
        }
    }
}
