//! Worker node — capacity-bounded concurrent job execution.
//!
//! Each node owns a bounded mailbox and a semaphore holding one permit per
//! capacity unit. The node task admits jobs in mailbox-arrival order:
//! admission acquires `cost` permits (waiting for running jobs to release
//! them when the node is full), then the job body runs concurrently with
//! everything else the node has admitted. `used` is the load signal the
//! dispatcher reads when scoring nodes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::debug;

use flowgrid_core::{Job, NodeId};

/// A worker with a fixed capacity and a running usage count.
///
/// Invariant: `0 <= used <= capacity` at all times. The semaphore is the
/// enforcement; `used` is a lock-free snapshot of the same quantity for
/// placement decisions.
pub struct WorkerNode {
    id: NodeId,
    capacity: u32,
    used: AtomicU32,
    permits: Arc<Semaphore>,
}

impl WorkerNode {
    fn new(id: NodeId, capacity: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            capacity,
            used: AtomicU32::new(0),
            permits: Arc::new(Semaphore::new(capacity as usize)),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Capacity units currently claimed by admitted jobs.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Acquire)
    }

    /// Free capacity as seen by the dispatcher.
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.used())
    }

    /// Mailbox-consuming loop.
    ///
    /// Admits jobs in arrival order, runs each concurrently up to capacity,
    /// and exits once the mailbox is closed, drained, and every in-flight
    /// job has finished. Callers must only deliver jobs with
    /// `cost <= capacity`; the ingress validates this.
    async fn run(self: Arc<Self>, mut mailbox: mpsc::Receiver<Job>) {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                maybe_job = mailbox.recv() => match maybe_job {
                    Some(job) => {
                        let Ok(permit) =
                            self.permits.clone().acquire_many_owned(job.cost).await
                        else {
                            break; // semaphore closed, node is going away
                        };
                        self.used.fetch_add(job.cost, Ordering::AcqRel);
                        debug!(node = self.id, job = job.id, cost = job.cost, "job admitted");

                        let node = Arc::clone(&self);
                        in_flight.spawn(async move {
                            tokio::time::sleep(job.duration).await;
                            node.used.fetch_sub(job.cost, Ordering::AcqRel);
                            drop(permit);
                            debug!(node = node.id, job = job.id, "job completed");
                        });
                    }
                    None => break,
                },
                // Reap finished jobs so the set does not grow unbounded.
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        // Mailbox closed: let in-flight work finish before the task exits.
        while in_flight.join_next().await.is_some() {}
        debug!(node = self.id, "node drained and stopped");
    }
}

/// A live node as the cluster sees it: the shared state, the mailbox
/// sender, and the handle of its run task.
///
/// Dropping `mailbox` is the node's only termination signal; the task then
/// drains whatever was already queued and exits.
pub(crate) struct NodeHandle {
    pub(crate) node: Arc<WorkerNode>,
    pub(crate) mailbox: mpsc::Sender<Job>,
    pub(crate) task: JoinHandle<()>,
}

impl NodeHandle {
    pub(crate) fn spawn(id: NodeId, capacity: u32, mailbox_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(mailbox_depth);
        let node = WorkerNode::new(id, capacity);
        let task = tokio::spawn(Arc::clone(&node).run(rx));
        debug!(node = id, capacity, "node started");
        Self {
            node,
            mailbox: tx,
            task,
        }
    }
}
