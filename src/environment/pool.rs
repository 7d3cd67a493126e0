use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::environment::FairnessPolicy;
use crate::error::SpawnError;
use crate::types::Priority;

/// Unit of work a worker can run: one message of one actor.
pub(crate) trait Schedulable: Send + Sync {
    fn run_turn(self: Arc<Self>);
}

pub(crate) struct Lane {
    pub ready: SegQueue<Arc<dyn Schedulable>>,
    pub turns: AtomicU64,
}

impl Lane {
    fn new() -> Self {
        Self {
            ready: SegQueue::new(),
            turns: AtomicU64::new(0),
        }
    }

    fn pop(&self) -> Option<Arc<dyn Schedulable>> {
        let next = self.ready.pop()?;
        self.turns.fetch_add(1, Ordering::Relaxed);
        Some(next)
    }
}

/// State shared by the workers and every execution environment.
pub(crate) struct PoolCore {
    lanes: [Lane; 2],
    wake: Notify,
    shutdown: CancellationToken,
    fairness: FairnessPolicy,
}

impl PoolCore {
    pub fn new(fairness: FairnessPolicy) -> Self {
        Self {
            lanes: [Lane::new(), Lane::new()],
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            fairness,
        }
    }

    pub fn lane(&self, priority: Priority) -> &Lane {
        &self.lanes[priority.index()]
    }

    /// Queues a turn; dropped once the pool is stopped.
    pub fn submit(&self, priority: Priority, actor: Arc<dyn Schedulable>) {
        if self.is_stopped() {
            return;
        }
        self.lane(priority).ready.push(actor);
        self.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Picks the next actor to run. `streak` is the calling worker's count of
    /// consecutive turns given to a higher tier while a lower one waited.
    pub fn next_turn(&self, streak: &mut usize) -> Option<Arc<dyn Schedulable>> {
        for (index, lane) in self.lanes.iter().enumerate() {
            if lane.ready.is_empty() {
                continue;
            }
            let lower = &self.lanes[index + 1..];
            let starving = lower.iter().any(|l| !l.ready.is_empty());
            if starving && *streak >= self.fairness.max_high_priority_streak() {
                if let Some(next) = lower.iter().rev().find_map(Lane::pop) {
                    *streak = 0;
                    return Some(next);
                }
            }
            if let Some(next) = lane.pop() {
                *streak = if starving { *streak + 1 } else { 0 };
                return Some(next);
            }
        }
        None
    }
}

/// Fixed-size set of Tokio tasks draining the priority lanes.
pub(crate) struct WorkerPool {
    core: Arc<PoolCore>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn start(size: usize, fairness: FairnessPolicy) -> Result<Self, SpawnError> {
        let runtime = Handle::try_current().map_err(|_| SpawnError::MissingRuntime)?;
        let core = Arc::new(PoolCore::new(fairness));
        let workers = (0..size.max(1))
            .map(|index| runtime.spawn(run_worker(Arc::clone(&core), index)))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            workers = size.max(1),
            streak = fairness.max_high_priority_streak(),
            "Worker pool started"
        );

        Ok(Self {
            core,
            workers: Mutex::new(workers),
        })
    }

    pub fn core(&self) -> &Arc<PoolCore> {
        &self.core
    }

    pub async fn shutdown(&self) {
        self.core.shutdown.cancel();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
        for lane in &self.core.lanes {
            while lane.ready.pop().is_some() {}
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.core.shutdown.cancel();
    }
}

async fn run_worker(core: Arc<PoolCore>, index: usize) {
    let mut streak = 0;
    loop {
        if core.shutdown.is_cancelled() {
            break;
        }
        match core.next_turn(&mut streak) {
            Some(actor) => {
                if catch_unwind(AssertUnwindSafe(|| actor.run_turn())).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!(worker = index, "Turn panicked outside a handler");
                }
                tokio::task::yield_now().await;
            }
            None => {
                tokio::select! {
                    _ = core.shutdown.cancelled() => break,
                    _ = core.wake.notified() => {}
                }
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(worker = index, "Worker exited");

    #[cfg(not(feature = "tracing"))]
    let _ = index;
}
