//! Dispatcher — single consumer of the ingress queue.
//!
//! Places each job on the most lightly loaded node that can hold it
//! (best-fit-among-sufficient), scanning in round-robin order from the
//! placement cursor. Jobs nothing can hold right now are parked on an
//! in-dispatcher delayed-retry set rather than spawning a sleeper task per
//! job, so saturation cannot leak tasks and retries never race the ingress
//! channel's closure.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use flowgrid_core::Job;

use crate::cluster::Cluster;

/// A job waiting out its backoff before the next placement attempt.
struct PendingRetry {
    due: Instant,
    job: Job,
}

// Min-heap on due time: the soonest retry surfaces first.
impl Ord for PendingRetry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.job.id.cmp(&self.job.id))
    }
}

impl PartialOrd for PendingRetry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingRetry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.job.id == other.job.id
    }
}

impl Eq for PendingRetry {}

pub(crate) struct Dispatcher {
    cluster: Arc<Cluster>,
    ingress: mpsc::Receiver<Job>,
    backoff: Duration,
    pending: BinaryHeap<PendingRetry>,
}

impl Dispatcher {
    pub(crate) fn new(
        cluster: Arc<Cluster>,
        ingress: mpsc::Receiver<Job>,
        backoff: Duration,
    ) -> Self {
        Self {
            cluster,
            ingress,
            backoff,
            pending: BinaryHeap::new(),
        }
    }

    /// Drain the ingress until it closes, interleaving due retries, then
    /// make a final placement pass over whatever is still pending.
    pub(crate) async fn run(mut self) {
        debug!("dispatcher started");
        loop {
            let next_due = self.pending.peek().map(|p| p.due);
            tokio::select! {
                maybe_job = self.ingress.recv() => match maybe_job {
                    Some(job) => self.dispatch(job).await,
                    None => break,
                },
                _ = tokio::time::sleep_until(next_due.unwrap_or_else(Instant::now)),
                    if next_due.is_some() =>
                {
                    self.retry_due().await;
                }
            }
        }
        self.drain_pending().await;
        debug!("dispatcher stopped");
    }

    async fn dispatch(&mut self, job: Job) {
        if self.try_place(job).await {
            return;
        }
        debug!(job = job.id, cost = job.cost, "no node can hold job, backing off");
        self.pending.push(PendingRetry {
            due: Instant::now() + self.backoff,
            job,
        });
    }

    /// Re-attempt every retry whose backoff has elapsed.
    async fn retry_due(&mut self) {
        let now = Instant::now();
        let mut due = Vec::new();
        while self.pending.peek().is_some_and(|p| p.due <= now) {
            if let Some(p) = self.pending.pop() {
                due.push(p.job);
            }
        }
        for job in due {
            self.dispatch(job).await;
        }
    }

    /// Best-fit-among-sufficient scan from the placement cursor.
    ///
    /// Holds the membership lock across the scan and the mailbox send, so
    /// dispatch is serialized against scale-out/in. Returns false when no
    /// node currently has `cost` units free.
    async fn try_place(&self, job: Job) -> bool {
        let nodes = self.cluster.nodes().read().await;
        let count = nodes.len();
        let Some(start) = self.cluster.cursor.start(count) else {
            return false; // empty fleet
        };

        let mut winner: Option<(usize, u32)> = None;
        for offset in 0..count {
            let idx = (start + offset) % count;
            let avail = nodes[idx].node.available();
            // Strictly greater: on ties the node nearest the scan origin wins.
            if avail >= job.cost && winner.is_none_or(|(_, best)| avail > best) {
                winner = Some((idx, avail));
            }
        }
        let Some((idx, avail)) = winner else {
            return false;
        };

        // May wait briefly when the winner's mailbox is full.
        if nodes[idx].mailbox.send(job).await.is_err() {
            return false;
        }
        self.cluster.cursor.advance_past(idx, count);
        debug!(
            job = job.id,
            node = nodes[idx].node.id(),
            avail,
            "job placed"
        );
        true
    }

    /// Final pass once the ingress has closed: one attempt per pending job,
    /// dropping whatever still fits nowhere.
    async fn drain_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        debug!(
            pending = self.pending.len(),
            "ingress closed, final pass over delayed retries"
        );
        let remaining: Vec<Job> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|p| p.job)
            .collect();
        for job in remaining {
            if !self.try_place(job).await {
                warn!(
                    job = job.id,
                    cost = job.cost,
                    "dropping unplaceable job during shutdown drain"
                );
            }
        }
    }
}
