//! Cluster error types.

use flowgrid_core::JobId;
use thiserror::Error;

/// Errors surfaced by cluster operations.
///
/// Transient placement failures are handled internally by the dispatcher's
/// backoff-and-retry path and never appear here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("job {id} has cost {cost}, which exceeds the per-node capacity {capacity}")]
    CostExceedsCapacity { id: JobId, cost: u32, capacity: u32 },

    #[error("job {id} has zero cost; cost must be at least 1")]
    ZeroCost { id: JobId },

    #[error("cluster is shutting down, ingress is closed")]
    ShuttingDown,
}

pub type ClusterResult<T> = Result<T, ClusterError>;
