//! Configuration error types.

use thiserror::Error;

/// Errors detected while loading or validating configuration.
///
/// Construction fails fast: every variant names the offending field so the
/// operator can fix the config without reading source.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("cluster.min_nodes ({min}) exceeds cluster.max_nodes ({max})")]
    InvertedBounds { min: usize, max: usize },

    #[error(
        "cluster.initial_nodes ({initial}) outside [{min}, {max}] (cluster.min_nodes..=cluster.max_nodes)"
    )]
    InitialOutOfBounds {
        initial: usize,
        min: usize,
        max: usize,
    },

    #[error("cluster.node_capacity must be positive")]
    ZeroCapacity,

    #[error("cluster.mailbox_depth must be positive")]
    ZeroMailboxDepth,

    #[error("cluster.ingress_depth must be positive")]
    ZeroIngressDepth,

    #[error("predictor.alpha must lie in the open interval (0, 1), got {0}")]
    AlphaOutOfRange(f64),

    #[error("controller.target_latency must be positive, got {0}")]
    NonPositiveTarget(f64),

    #[error("controller.cooldown_ms must be positive")]
    ZeroCooldown,

    #[error("controller.{field} must be positive")]
    ZeroInterval { field: &'static str },

    #[error("workload.rate must be positive")]
    ZeroWorkloadRate,

    #[error(
        "workload duration range is empty: min_duration_ms ({min}) must be below max_duration_ms ({max})"
    )]
    EmptyDurationRange { min: u64, max: u64 },

    #[error("workload cost range is empty: min_cost ({min}) must not exceed max_cost ({max})")]
    EmptyCostRange { min: u32, max: u32 },

    #[error(
        "workload.max_cost ({cost}) exceeds cluster.node_capacity ({capacity}); such jobs can never be placed"
    )]
    CostExceedsNodeCapacity { cost: u32, capacity: u32 },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
