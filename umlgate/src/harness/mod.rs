//! # Render Harness
//!
//! Runs the blocking [`RenderAdapter`](crate::render::RenderAdapter) on a fixed
//! set of dedicated worker threads and gives every task a hard deadline.
//!
//! ## Guarantees
//!
//! * **Bounded latency**: [`RenderPool::execute`] returns no later than the task
//!   timeout (plus scheduling slack), whether or not the engine ever returns.
//! * **Bounded resources**: at most `workers + queue_capacity` tasks are
//!   outstanding. Further submissions fail immediately with
//!   [`RenderError::Saturated`](crate::error::RenderError::Saturated) instead of
//!   queueing without limit.
//! * **Honest accounting**: a task that timed out keeps its slot until its
//!   worker actually finishes. An engine that never returns therefore costs one
//!   slot for good, and the pool reports saturation rather than piling up more
//!   stuck threads.
//! * **Cooperative cancellation**: when the deadline passes or the caller drops
//!   the request, the task's [`CancellationToken`](tokio_util::sync::CancellationToken)
//!   is cancelled. Engines that poll it finish early and free their slot; tasks
//!   still queued are skipped by the workers.
//!
//! The async runtime is never blocked: callers await a oneshot reply under
//! `tokio::time::timeout`.

mod pool;
mod task;

pub use pool::RenderPool;
pub use task::{ExecutionOutcome, ExecutionTask};

use std::{num::NonZeroUsize, time::Duration};

/// Sizing and deadline defaults for a [`RenderPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of dedicated render threads.
    pub workers: usize,
    /// Tasks allowed to wait while all workers are busy.
    pub queue_capacity: usize,
    /// Deadline applied by the gateway when a request does not carry its own.
    pub default_timeout: Duration,
}

impl PoolConfig {
    pub const QUEUE_PER_WORKER: usize = 4;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(workers: usize, queue_capacity: usize, default_timeout: Duration) -> Self {
        Self {
            workers,
            queue_capacity,
            default_timeout,
        }
    }

    /// Maximum number of outstanding tasks.
    pub fn capacity(&self) -> usize {
        self.workers + self.queue_capacity
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(2);
        Self {
            workers,
            queue_capacity: workers * Self::QUEUE_PER_WORKER,
            default_timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}
