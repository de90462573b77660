use crate::{
    error::RenderError,
    render::{OutputFormat, RenderRequest},
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One render request with its deadline and cancellation token.
#[derive(Debug, Clone)]
pub struct ExecutionTask {
    pub request: RenderRequest,
    pub timeout: Duration,
    /// Cancelled by the pool when the deadline passes or the caller goes away.
    pub cancel: CancellationToken,
}

impl ExecutionTask {
    pub fn new(request: RenderRequest, timeout: Duration) -> Self {
        Self {
            request,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn render(source: impl Into<String>, format: OutputFormat, timeout: Duration) -> Self {
        Self::new(RenderRequest::new(source, format), timeout)
    }

    /// Uses a caller-owned token, so the caller can also abort the task.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// How one task ended. Exactly one outcome is produced per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success(Vec<u8>),
    /// The deadline passed, or the task's token was cancelled, before the
    /// engine answered.
    Timeout,
    Failure(RenderError),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    /// Folds the outcome into a result, mapping `Timeout` to
    /// [`RenderError::Timeout`] with the given deadline.
    pub fn into_result(self, timeout: Duration) -> Result<Vec<u8>, RenderError> {
        match self {
            ExecutionOutcome::Success(bytes) => Ok(bytes),
            ExecutionOutcome::Timeout => Err(RenderError::Timeout { timeout }),
            ExecutionOutcome::Failure(error) => Err(error),
        }
    }
}
