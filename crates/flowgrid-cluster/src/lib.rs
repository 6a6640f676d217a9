//! flowgrid-cluster — worker nodes, membership, and job placement.
//!
//! A [`Cluster`] owns a dynamic set of [`WorkerNode`]s plus one shared
//! bounded ingress queue. A single dispatcher task drains the ingress and
//! places each job on the most lightly loaded node that can hold it,
//! scanning in round-robin order from a rotating cursor so that ties
//! spread across the fleet.
//!
//! # Placement Algorithm
//!
//! ```text
//! start = cursor mod |nodes|
//! scan all nodes from start in round-robin order:
//!     avail = capacity - used
//!     candidate if avail >= job.cost
//!     winner  = candidate with strictly greatest avail
//!               (earliest in scan order on ties)
//!
//! if winner: deliver to winner's mailbox, cursor = winner + 1
//! else:      park the job on the delayed-retry set (100 ms backoff)
//! ```
//!
//! Nodes execute admitted jobs concurrently up to their fixed capacity;
//! admission is enforced by a semaphore sized to the node's capacity, so
//! `used` can never exceed it.

pub mod cluster;
pub mod cursor;
mod dispatcher;
pub mod error;
pub mod node;

pub use cluster::Cluster;
pub use cursor::PlacementCursor;
pub use error::{ClusterError, ClusterResult};
pub use node::WorkerNode;
