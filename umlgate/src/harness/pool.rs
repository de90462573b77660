use super::{ExecutionOutcome, ExecutionTask, PoolConfig};
use crate::{error::RenderError, render::RenderAdapter};
use anyhow::{Context, Result, bail};
use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
    thread,
    time::Instant,
};
use tokio::sync::{
    OwnedSemaphorePermit, Semaphore, TryAcquireError,
    mpsc::{self, error::TrySendError},
    oneshot,
};

type Reply = Result<Vec<u8>, RenderError>;

struct Job {
    task: ExecutionTask,
    reply: oneshot::Sender<Reply>,
    /// Released only when a worker is done with the job.
    _permit: OwnedSemaphorePermit,
}

/// Fixed pool of render threads with per-task deadlines.
pub struct RenderPool {
    config: PoolConfig,
    adapter_name: String,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    slots: Arc<Semaphore>,
}

impl fmt::Debug for RenderPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPool")
            .field("config", &self.config)
            .field("adapter", &self.adapter_name)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl RenderPool {
    /// Starts `config.workers` render threads around `adapter`.
    pub fn new(config: PoolConfig, adapter: Arc<dyn RenderAdapter>) -> Result<Self> {
        if config.workers == 0 {
            bail!("render pool needs at least one worker");
        }

        let capacity = config.capacity();
        let (sender, receiver) = mpsc::channel::<Job>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..config.workers {
            let receiver = Arc::clone(&receiver);
            let adapter = Arc::clone(&adapter);
            thread::Builder::new()
                .name(format!("umlgate-render-{id}"))
                .spawn(move || worker_loop(id, receiver, adapter))
                .with_context(|| format!("failed to spawn render worker {id}"))?;
        }

        tracing::info!(
            "Started render pool: engine={}, workers={}, queue={}, default timeout={}ms",
            adapter.name(),
            config.workers,
            config.queue_capacity,
            config.default_timeout.as_millis()
        );

        Ok(Self {
            adapter_name: adapter.name().to_string(),
            sender: Mutex::new(Some(sender)),
            slots: Arc::new(Semaphore::new(capacity)),
            config,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    /// Tasks queued or running, including timed-out tasks whose worker has
    /// not finished yet.
    pub fn outstanding(&self) -> usize {
        self.capacity()
            .saturating_sub(self.slots.available_permits())
    }

    /// Runs one task to completion, timeout or failure.
    ///
    /// Dropping the returned future cancels the task's token.
    pub async fn execute(&self, task: ExecutionTask) -> ExecutionOutcome {
        if task.cancel.is_cancelled() {
            tracing::debug!("Render task cancelled before submission");
            return ExecutionOutcome::Timeout;
        }

        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                tracing::warn!(
                    "Render pool saturated ({} tasks outstanding), rejecting task",
                    self.capacity()
                );
                return ExecutionOutcome::Failure(RenderError::Saturated {
                    capacity: self.capacity(),
                });
            }
            Err(TryAcquireError::Closed) => {
                return ExecutionOutcome::Failure(RenderError::PoolClosed);
            }
        };

        let Some(sender) = self.sender() else {
            return ExecutionOutcome::Failure(RenderError::PoolClosed);
        };

        let timeout = task.timeout;
        let cancel = task.cancel.clone();
        let guard = cancel.clone().drop_guard();
        let (reply, response) = oneshot::channel();

        let job = Job {
            task,
            reply,
            _permit: permit,
        };
        if let Err(e) = sender.try_send(job) {
            guard.disarm();
            return ExecutionOutcome::Failure(match e {
                TrySendError::Full(_) => RenderError::Saturated {
                    capacity: self.capacity(),
                },
                TrySendError::Closed(_) => RenderError::PoolClosed,
            });
        }

        let outcome = tokio::select! {
            replied = tokio::time::timeout(timeout, response) => match replied {
                Ok(Ok(Ok(bytes))) => ExecutionOutcome::Success(bytes),
                Ok(Ok(Err(error))) => ExecutionOutcome::Failure(error),
                // The worker skipped the task because its token was cancelled.
                Ok(Err(_)) => ExecutionOutcome::Timeout,
                Err(_) => {
                    cancel.cancel();
                    tracing::warn!(
                        "Render task exceeded its {}ms deadline; {} of {} slots in use",
                        timeout.as_millis(),
                        self.outstanding(),
                        self.capacity()
                    );
                    ExecutionOutcome::Timeout
                }
            },
            _ = cancel.cancelled() => {
                tracing::debug!("Render task cancelled by its caller");
                ExecutionOutcome::Timeout
            }
        };

        guard.disarm();
        outcome
    }

    /// Stops accepting tasks. Workers exit once the queue drains; a worker
    /// stuck inside the engine is left to finish on its own.
    pub fn close(&self) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        if sender.is_some() {
            self.slots.close();
            tracing::info!("Closed render pool ({} tasks outstanding)", self.outstanding());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    fn sender(&self) -> Option<mpsc::Sender<Job>> {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Drop for RenderPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    adapter: Arc<dyn RenderAdapter>,
) {
    tracing::debug!("Render worker {} started", id);
    loop {
        let job = {
            let mut receiver = receiver.lock().unwrap_or_else(|e| e.into_inner());
            receiver.blocking_recv()
        };
        let Some(Job {
            task,
            reply,
            _permit: permit,
        }) = job
        else {
            break;
        };

        if task.cancel.is_cancelled() {
            tracing::debug!("Render worker {} skipping cancelled task", id);
            drop(permit);
            drop(reply);
            continue;
        }

        let started = Instant::now();
        let request = &task.request;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            adapter.render(&request.source, request.format, &task.cancel)
        }));
        let outcome = match result {
            Ok(rendered) => rendered.map_err(RenderError::from),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    "Render engine {} panicked on worker {}: {}",
                    adapter.name(),
                    id,
                    message
                );
                Err(RenderError::Internal(format!("engine panicked: {message}")))
            }
        };

        tracing::debug!(
            "Render worker {} finished {} task in {:?}",
            id,
            request.format,
            started.elapsed()
        );
        // Free the slot before the caller can observe the reply.
        drop(permit);
        if reply.send(outcome).is_err() {
            tracing::debug!("Render worker {}: caller no longer waiting", id);
        }
    }
    tracing::debug!("Render worker {} exiting", id);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        render::{OutputFormat, SequenceTextEngine},
        test_utils::{CooperativeEngine, PanickingEngine},
    };
    use std::time::Duration;

    fn pool(workers: usize, queue: usize, adapter: Arc<dyn RenderAdapter>) -> RenderPool {
        RenderPool::new(PoolConfig::new(workers, queue, Duration::from_secs(5)), adapter).unwrap()
    }

    fn task(timeout: Duration) -> ExecutionTask {
        ExecutionTask::render("@startuml\nBob->Alice:hello\n@enduml", OutputFormat::Txt, timeout)
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = RenderPool::new(
            PoolConfig::new(0, 1, Duration::from_secs(1)),
            Arc::new(SequenceTextEngine),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_success_releases_slot() {
        let pool = pool(1, 0, Arc::new(SequenceTextEngine));
        for round in 0..50 {
            let outcome = pool.execute(task(Duration::from_secs(5))).await;
            assert!(outcome.is_success(), "round {round}: {outcome:?}");
            assert_eq!(pool.outstanding(), 0, "round {round}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_back_to_back_renders_never_saturate() {
        let pool = pool(1, 0, Arc::new(SequenceTextEngine));
        for round in 0..500 {
            let outcome = pool.execute(task(Duration::from_secs(5))).await;
            assert!(outcome.is_success(), "round {round}: {outcome:?}");
        }
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_task_is_not_queued() {
        let pool = pool(1, 0, Arc::new(SequenceTextEngine));
        let task = task(Duration::from_secs(5));
        task.cancel.cancel();
        assert_eq!(pool.execute(task).await, ExecutionOutcome::Timeout);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_engine_panic_is_internal_error() {
        let pool = pool(1, 0, Arc::new(PanickingEngine));
        let outcome = pool.execute(task(Duration::from_secs(5))).await;
        let ExecutionOutcome::Failure(RenderError::Internal(message)) = outcome else {
            panic!("expected internal error, got {outcome:?}");
        };
        assert!(message.contains("panicked"), "{message}");

        // The worker survives the panic.
        let outcome = pool.execute(task(Duration::from_secs(5))).await;
        assert!(matches!(outcome, ExecutionOutcome::Failure(RenderError::Internal(_))));
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_tasks() {
        let pool = pool(1, 0, Arc::new(SequenceTextEngine));
        pool.close();
        assert!(pool.is_closed());
        assert_eq!(
            pool.execute(task(Duration::from_secs(1))).await,
            ExecutionOutcome::Failure(RenderError::PoolClosed)
        );
    }

    #[tokio::test]
    async fn test_timeout_cancels_token() {
        let pool = pool(1, 0, Arc::new(CooperativeEngine::default()));
        let task = task(Duration::from_millis(50));
        let cancel = task.cancel.clone();
        assert_eq!(pool.execute(task).await, ExecutionOutcome::Timeout);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
