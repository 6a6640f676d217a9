//! Domain types for the flowgrid dispatcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier for a job, assigned monotonically by the producer.
pub type JobId = u64;

/// Unique identifier for a worker node in the cluster.
///
/// Assigned from a monotonically increasing counter; ids are never reused,
/// even after a node has been scaled in.
pub type NodeId = u64;

/// A unit of work: a declared service time plus a resource cost.
///
/// Jobs are immutable values. The cost is the number of capacity units a
/// node must hold free for the lifetime of the job; the duration is how
/// long those units stay claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Declared service time.
    pub duration: Duration,
    /// Capacity units claimed while the job runs. Always ≥ 1.
    pub cost: u32,
}

impl Job {
    pub fn new(id: JobId, duration: Duration, cost: u32) -> Self {
        Self { id, duration, cost }
    }
}
