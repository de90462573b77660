//! Render engines with controllable behavior, for exercising the pool and the
//! gateway in tests.

use crate::{
    error::EngineError,
    render::{OutputFormat, RenderAdapter, SequenceTextEngine},
};
use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

/// Upper bound on how long a test engine blocks, so a forgotten release
/// cannot hang the test binary forever.
pub const MAX_HANG: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

/// Blocks inside `render` and ignores cancellation until [`HangingEngine::release`]
/// is called. Models an engine stuck on a pathological diagram.
#[derive(Debug, Clone, Default)]
pub struct HangingEngine {
    gate: Arc<Gate>,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl HangingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets every blocked and future render return.
    pub fn release(&self) {
        let mut open = self.gate.open.lock().unwrap_or_else(|e| e.into_inner());
        *open = true;
        self.gate.changed.notify_all();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl RenderAdapter for HangingEngine {
    fn name(&self) -> &str {
        "hanging"
    }

    fn render(
        &self,
        _source: &str,
        _format: OutputFormat,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EngineError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + MAX_HANG;
        let mut open = self.gate.open.lock().unwrap_or_else(|e| e.into_inner());
        while !*open {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            open = self
                .gate
                .changed
                .wait_timeout(open, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        drop(open);
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(b"released".to_vec())
    }
}

/// Spins until its token is cancelled, then fails. Counts how many renders
/// observed a cancellation.
#[derive(Debug, Clone, Default)]
pub struct CooperativeEngine {
    cancelled: Arc<AtomicUsize>,
}

impl CooperativeEngine {
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl RenderAdapter for CooperativeEngine {
    fn name(&self) -> &str {
        "cooperative"
    }

    fn render(
        &self,
        _source: &str,
        _format: OutputFormat,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EngineError> {
        let deadline = Instant::now() + MAX_HANG;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(EngineError::Failed("cancelled".to_string()));
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(EngineError::Failed("never cancelled".to_string()))
    }
}

/// Panics on every render.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingEngine;

impl RenderAdapter for PanickingEngine {
    fn name(&self) -> &str {
        "panicking"
    }

    fn render(
        &self,
        _source: &str,
        _format: OutputFormat,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EngineError> {
        panic!("engine exploded");
    }
}

/// Delegates to [`SequenceTextEngine`] after an optional delay and records
/// every source it was asked to render.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    delay: Duration,
    sources: Arc<Mutex<Vec<String>>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.sources().len()
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl RenderAdapter for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn render(
        &self,
        source: &str,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EngineError> {
        self.sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(source.to_string());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        SequenceTextEngine.render(source, format, cancel)
    }
}

/// Polls `condition` every few milliseconds until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    condition()
}
