//! flowgrid.toml configuration parser.
//!
//! Every section is optional in the file; missing fields fall back to the
//! stock deployment profile (3 nodes of capacity 8, bounds 1..=50, alpha
//! 0.6, 1500 ms cooldown, target 200). `validate()` must pass before any
//! subsystem is constructed.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration tree for a flowgrid process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cluster: ClusterConfig,
    pub predictor: PredictorConfig,
    pub controller: ControllerConfig,
    pub workload: WorkloadConfig,
}

/// Cluster membership and queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Nodes created at startup. Must satisfy `min_nodes <= initial_nodes <= max_nodes`.
    pub initial_nodes: usize,
    /// Capacity units per node, applied to every node ever created.
    pub node_capacity: u32,
    /// Floor on cluster size; scale-in never goes below this.
    pub min_nodes: usize,
    /// Ceiling on cluster size; scale-out never goes above this.
    pub max_nodes: usize,
    /// Per-node mailbox depth.
    pub mailbox_depth: usize,
    /// Shared ingress queue depth; producers block when it is full.
    pub ingress_depth: usize,
    /// Backoff before an unplaceable job is retried, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            initial_nodes: 3,
            node_capacity: 8,
            min_nodes: 1,
            max_nodes: 50,
            mailbox_depth: 50,
            ingress_depth: 1000,
            retry_backoff_ms: 100,
        }
    }
}

impl ClusterConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Demand forecasting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// EMA smoothing factor in (0, 1). Higher weighs recent load heavier.
    pub alpha: f64,
    /// How often the cluster load is sampled into the predictor, in milliseconds.
    pub sample_interval_ms: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            sample_interval_ms: 1000,
        }
    }
}

impl PredictorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Scaling controller parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Latency setpoint in the estimator's synthetic units.
    pub target_latency: f64,
    /// Minimum gap between two scaling actions, in milliseconds.
    pub cooldown_ms: u64,
    /// How often the controller steps, in milliseconds.
    pub step_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_latency: 200.0,
            cooldown_ms: 1500,
            step_interval_ms: 1000,
        }
    }
}

impl ControllerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }
}

/// Synthetic workload shape for the built-in generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Jobs enqueued per tick.
    pub rate: usize,
    /// Tick interval, in milliseconds.
    pub tick_interval_ms: u64,
    /// Inclusive lower bound on job service time, in milliseconds.
    pub min_duration_ms: u64,
    /// Exclusive upper bound on job service time, in milliseconds.
    pub max_duration_ms: u64,
    /// Inclusive lower bound on job cost.
    pub min_cost: u32,
    /// Inclusive upper bound on job cost.
    pub max_cost: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            rate: 5,
            tick_interval_ms: 1000,
            min_duration_ms: 200,
            max_duration_ms: 800,
            min_cost: 1,
            max_cost: 3,
        }
    }
}

impl WorkloadConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl GridConfig {
    /// Load a config tree from a TOML file.
    ///
    /// The result is not yet validated; call [`GridConfig::validate`].
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check every field the subsystems depend on, failing on the first
    /// violation with the offending field named.
    pub fn validate(&self) -> ConfigResult<()> {
        let c = &self.cluster;
        if c.min_nodes > c.max_nodes {
            return Err(ConfigError::InvertedBounds {
                min: c.min_nodes,
                max: c.max_nodes,
            });
        }
        if c.initial_nodes < c.min_nodes || c.initial_nodes > c.max_nodes {
            return Err(ConfigError::InitialOutOfBounds {
                initial: c.initial_nodes,
                min: c.min_nodes,
                max: c.max_nodes,
            });
        }
        if c.node_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if c.mailbox_depth == 0 {
            return Err(ConfigError::ZeroMailboxDepth);
        }
        if c.ingress_depth == 0 {
            return Err(ConfigError::ZeroIngressDepth);
        }

        let p = &self.predictor;
        if !(p.alpha > 0.0 && p.alpha < 1.0) {
            return Err(ConfigError::AlphaOutOfRange(p.alpha));
        }
        if p.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "sample_interval_ms",
            });
        }

        let ctl = &self.controller;
        if ctl.target_latency <= 0.0 {
            return Err(ConfigError::NonPositiveTarget(ctl.target_latency));
        }
        if ctl.cooldown_ms == 0 {
            return Err(ConfigError::ZeroCooldown);
        }
        if ctl.step_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "step_interval_ms",
            });
        }

        let w = &self.workload;
        if w.rate == 0 {
            return Err(ConfigError::ZeroWorkloadRate);
        }
        if w.min_duration_ms >= w.max_duration_ms {
            return Err(ConfigError::EmptyDurationRange {
                min: w.min_duration_ms,
                max: w.max_duration_ms,
            });
        }
        if w.min_cost > w.max_cost {
            return Err(ConfigError::EmptyCostRange {
                min: w.min_cost,
                max: w.max_cost,
            });
        }
        if w.max_cost > c.node_capacity {
            return Err(ConfigError::CostExceedsNodeCapacity {
                cost: w.max_cost,
                capacity: c.node_capacity,
            });
        }

        Ok(())
    }
}
