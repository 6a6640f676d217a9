//! Cluster — membership, ingress, observability, and phased shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use flowgrid_core::config::ClusterConfig;
use flowgrid_core::{Job, NodeId};

use crate::cursor::PlacementCursor;
use crate::dispatcher::Dispatcher;
use crate::error::{ClusterError, ClusterResult};
use crate::node::NodeHandle;

/// Synthetic latency estimate: mean utilization mapped onto
/// `[BASE_LATENCY, BASE_LATENCY + UTILIZATION_SPAN]`.
const BASE_LATENCY: f64 = 100.0;
const UTILIZATION_SPAN: f64 = 300.0;

/// The mutable set of worker nodes plus the shared ingress queue.
///
/// Membership is mutated only by the scaling controller (through
/// [`Cluster::add_node`] / [`Cluster::remove_node`]) and read by the
/// dispatcher; both sides serialize on the membership lock. Node ids come
/// from a monotonic counter and are never reused.
pub struct Cluster {
    node_capacity: u32,
    min_nodes: usize,
    max_nodes: usize,
    mailbox_depth: usize,

    nodes: RwLock<Vec<NodeHandle>>,
    pub(crate) cursor: PlacementCursor,
    next_node_id: AtomicU64,

    /// Ingress sender; `None` once shutdown has begun.
    ingress: Mutex<Option<mpsc::Sender<Job>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    /// Run tasks of scaled-in nodes, awaited at shutdown so their queued
    /// jobs are not orphaned.
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl Cluster {
    /// Start a cluster: initial nodes plus the dispatcher task.
    ///
    /// The config must have passed `GridConfig::validate`.
    pub fn start(cfg: &ClusterConfig) -> Arc<Self> {
        let (ingress_tx, ingress_rx) = mpsc::channel(cfg.ingress_depth);

        let mut initial = Vec::with_capacity(cfg.initial_nodes);
        for i in 0..cfg.initial_nodes {
            initial.push(NodeHandle::spawn(
                i as NodeId + 1,
                cfg.node_capacity,
                cfg.mailbox_depth,
            ));
        }

        let cluster = Arc::new(Self {
            node_capacity: cfg.node_capacity,
            min_nodes: cfg.min_nodes,
            max_nodes: cfg.max_nodes,
            mailbox_depth: cfg.mailbox_depth,
            nodes: RwLock::new(initial),
            cursor: PlacementCursor::new(),
            next_node_id: AtomicU64::new(cfg.initial_nodes as u64 + 1),
            ingress: Mutex::new(Some(ingress_tx)),
            dispatcher: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
        });

        let dispatcher =
            Dispatcher::new(Arc::clone(&cluster), ingress_rx, cfg.retry_backoff());
        let task = tokio::spawn(dispatcher.run());
        // The lock is uncontended here; the cluster has not been shared yet.
        if let Ok(mut slot) = cluster.dispatcher.try_lock() {
            *slot = Some(task);
        }

        info!(
            nodes = cfg.initial_nodes,
            capacity = cfg.node_capacity,
            min = cfg.min_nodes,
            max = cfg.max_nodes,
            "cluster started"
        );
        cluster
    }

    /// Submit a job to the ingress queue.
    ///
    /// Awaits when the queue is full (producer backpressure). Jobs whose
    /// cost can never fit a node are rejected here rather than circling
    /// the retry path forever.
    pub async fn enqueue(&self, job: Job) -> ClusterResult<()> {
        if job.cost == 0 {
            return Err(ClusterError::ZeroCost { id: job.id });
        }
        if job.cost > self.node_capacity {
            return Err(ClusterError::CostExceedsCapacity {
                id: job.id,
                cost: job.cost,
                capacity: self.node_capacity,
            });
        }

        // Clone the sender out so the lock is not held across the send.
        let tx = self
            .ingress
            .lock()
            .await
            .clone()
            .ok_or(ClusterError::ShuttingDown)?;
        tx.send(job).await.map_err(|_| ClusterError::ShuttingDown)
    }

    /// Grow the fleet by one node. No-op at the ceiling.
    ///
    /// Returns whether a node was actually added.
    pub async fn add_node(&self) -> bool {
        let mut nodes = self.nodes.write().await;
        if nodes.len() >= self.max_nodes {
            debug!(max = self.max_nodes, "scale-out suppressed, at ceiling");
            return false;
        }
        let id = self.next_node_id.fetch_add(1, Ordering::Relaxed);
        nodes.push(NodeHandle::spawn(id, self.node_capacity, self.mailbox_depth));
        info!(node = id, total = nodes.len(), "node added");
        true
    }

    /// Shrink the fleet by one node. No-op at the floor.
    ///
    /// The last node is detached and its mailbox closed; jobs already
    /// queued on it (and in flight) still run to completion. Its task is
    /// retained so shutdown can await the drain.
    pub async fn remove_node(&self) -> bool {
        let handle = {
            let mut nodes = self.nodes.write().await;
            if nodes.len() <= self.min_nodes {
                debug!(min = self.min_nodes, "scale-in suppressed, at floor");
                return false;
            }
            nodes.pop()
        };
        let Some(NodeHandle {
            node,
            mailbox,
            task,
        }) = handle
        else {
            return false;
        };

        info!(node = node.id(), "node removed, draining its queue");
        drop(mailbox); // closes the mailbox; the node task drains and exits
        self.retired.lock().await.push(task);
        true
    }

    /// Snapshot sum of `used` across the fleet.
    pub async fn total_load(&self) -> u64 {
        let nodes = self.nodes.read().await;
        nodes.iter().map(|h| u64::from(h.node.used())).sum()
    }

    /// Synthetic latency signal: `100 + 300 * avg(used/capacity)`, or `0`
    /// for an empty fleet. Not a wall-clock measurement; the controller's
    /// setpoint is expressed in the same units.
    pub async fn estimate_latency(&self) -> f64 {
        let nodes = self.nodes.read().await;
        if nodes.is_empty() {
            return 0.0;
        }
        let total: f64 = nodes
            .iter()
            .map(|h| f64::from(h.node.used()) / f64::from(h.node.capacity()))
            .sum();
        BASE_LATENCY + UTILIZATION_SPAN * (total / nodes.len() as f64)
    }

    /// Current fleet size.
    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Per-node `(id, used)` snapshot, in membership order.
    pub async fn node_loads(&self) -> Vec<(NodeId, u32)> {
        let nodes = self.nodes.read().await;
        nodes.iter().map(|h| (h.node.id(), h.node.used())).collect()
    }

    pub fn node_capacity(&self) -> u32 {
        self.node_capacity
    }

    pub fn min_nodes(&self) -> usize {
        self.min_nodes
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub(crate) fn nodes(&self) -> &RwLock<Vec<NodeHandle>> {
        &self.nodes
    }

    /// Phased shutdown: close the ingress, await the dispatcher's drain,
    /// then close every node mailbox and await every node task (including
    /// nodes scaled in earlier).
    ///
    /// Jobs already accepted into a mailbox complete; jobs the dispatcher
    /// could not place during the final drain are dropped with a warning.
    pub async fn shutdown(&self) {
        info!("cluster shutting down");
        self.ingress.lock().await.take();

        if let Some(task) = self.dispatcher.lock().await.take() {
            let _ = task.await;
        }

        let live: Vec<NodeHandle> = {
            let mut nodes = self.nodes.write().await;
            nodes.drain(..).collect()
        };
        let mut tasks: Vec<JoinHandle<()>> = self.retired.lock().await.drain(..).collect();
        for NodeHandle { task, .. } in live {
            // mailbox sender drops here, closing the node's queue
            tasks.push(task);
        }
        for task in tasks {
            let _ = task.await;
        }
        info!("cluster shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_config() -> ClusterConfig {
        ClusterConfig {
            initial_nodes: 3,
            node_capacity: 8,
            min_nodes: 1,
            max_nodes: 5,
            mailbox_depth: 50,
            ingress_depth: 100,
            retry_backoff_ms: 20,
        }
    }

    #[tokio::test]
    async fn starts_with_initial_membership() {
        let cluster = Cluster::start(&small_config());
        assert_eq!(cluster.node_count().await, 3);
        assert_eq!(cluster.total_load().await, 0);
        assert_eq!(cluster.estimate_latency().await, 100.0);
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn add_node_clamps_at_ceiling() {
        let cluster = Cluster::start(&small_config());
        assert!(cluster.add_node().await);
        assert!(cluster.add_node().await);
        assert!(!cluster.add_node().await); // at max = 5
        assert_eq!(cluster.node_count().await, 5);
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn remove_node_clamps_at_floor() {
        let cluster = Cluster::start(&small_config());
        assert!(cluster.remove_node().await);
        assert!(cluster.remove_node().await);
        assert!(!cluster.remove_node().await); // at min = 1
        assert_eq!(cluster.node_count().await, 1);
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn node_ids_are_never_reused() {
        let cluster = Cluster::start(&small_config());
        cluster.remove_node().await; // drops node 3
        cluster.add_node().await; // must not mint id 3 again

        let ids: Vec<NodeId> = cluster
            .node_loads()
            .await
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![1, 2, 4]);
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn rejects_oversized_and_zero_cost_jobs() {
        let cluster = Cluster::start(&small_config());

        let oversized = Job::new(7, Duration::from_millis(10), 9);
        assert_eq!(
            cluster.enqueue(oversized).await,
            Err(ClusterError::CostExceedsCapacity {
                id: 7,
                cost: 9,
                capacity: 8
            })
        );

        let weightless = Job::new(8, Duration::from_millis(10), 0);
        assert_eq!(
            cluster.enqueue(weightless).await,
            Err(ClusterError::ZeroCost { id: 8 })
        );
        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_rejected() {
        let cluster = Cluster::start(&small_config());
        cluster.shutdown().await;

        let job = Job::new(1, Duration::from_millis(10), 1);
        assert_eq!(cluster.enqueue(job).await, Err(ClusterError::ShuttingDown));
    }

    #[tokio::test]
    async fn latency_estimate_tracks_utilization() {
        let cluster = Cluster::start(&small_config());

        // Three cost-8 jobs saturate all three nodes.
        for id in 0..3 {
            cluster
                .enqueue(Job::new(id, Duration::from_millis(120), 8))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cluster.total_load().await, 24);
        assert!((cluster.estimate_latency().await - 400.0).abs() < f64::EPSILON);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cluster.total_load().await, 0);
        assert_eq!(cluster.estimate_latency().await, 100.0);
        cluster.shutdown().await;
    }
}
