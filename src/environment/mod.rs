//! Priority execution environments sharing one worker pool.

mod pool;

use std::fmt::{Debug, Formatter};
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) use pool::{PoolCore, Schedulable, WorkerPool};

use crate::types::Priority;

/// Fairness policy between priority tiers.
///
/// A worker serves higher tiers first. Each worker counts the consecutive
/// turns it gave to a higher tier while a lower tier had ready actors; once
/// the count reaches [`max_high_priority_streak`](Self::max_high_priority_streak)
/// the worker serves one actor from the lowest waiting tier and resets the
/// count. Under sustained load on both tiers a normal-priority actor is
/// therefore served at least once every `streak + 1` turns of each worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FairnessPolicy {
    max_high_priority_streak: usize,
}

impl Default for FairnessPolicy {
    fn default() -> Self {
        Self {
            max_high_priority_streak: 8,
        }
    }
}

impl FairnessPolicy {
    /// Policy allowing `streak` consecutive higher-tier turns; clamped to at least 1.
    pub fn new(streak: usize) -> Self {
        Self {
            max_high_priority_streak: streak.max(1),
        }
    }

    /// Consecutive higher-tier turns before a waiting lower tier is served.
    pub fn max_high_priority_streak(&self) -> usize {
        self.max_high_priority_streak
    }
}

/// Handle to one priority lane of the shared worker pool.
///
/// Actors are bound to one environment at spawn time and never migrate.
#[derive(Clone)]
pub struct ExecutionEnvironment {
    priority: Priority,
    core: Arc<PoolCore>,
}

impl ExecutionEnvironment {
    pub(crate) fn new(priority: Priority, core: Arc<PoolCore>) -> Self {
        Self { priority, core }
    }

    /// Tier of this environment.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Actors waiting in this tier's ready queue.
    pub fn pending(&self) -> usize {
        self.core.lane(self.priority).ready.len()
    }

    /// Turns served from this tier since the pool started.
    pub fn turns(&self) -> u64 {
        self.core.lane(self.priority).turns.load(Ordering::Relaxed)
    }

    /// Returns true once the pool has been shut down.
    pub fn is_stopped(&self) -> bool {
        self.core.is_stopped()
    }

    pub(crate) fn submit(&self, actor: Arc<dyn Schedulable>) {
        self.core.submit(self.priority, actor);
    }
}

impl Debug for ExecutionEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEnvironment")
            .field("priority", &self.priority)
            .field("pending", &self.pending())
            .field("turns", &self.turns())
            .finish()
    }
}
