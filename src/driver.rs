//! Frame loop: pulls one pose at a time, runs it through the counter, and
//! paces the next cycle.
//!
//! The loop is strictly sequential. A new inference is never requested
//! before the previous pose has gone through the whole pipeline, so the
//! counter needs no locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::{FrameLoopConfig, InferenceErrorPolicy};
use crate::counter::{CycleOutcome, JackCounter};
use crate::diagnostics::DiagnosticsSink;
use crate::error::PoseError;
use crate::pose::{Pose, PoseSource};
use crate::trigger::CompletionTrigger;

/// Shared "capture active" flag.
///
/// Cloned into whatever starts and stops capture (console, signal handler).
/// The frame loop clears it itself when the target is reached.
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    inner: Arc<CaptureInner>,
}

#[derive(Debug)]
struct CaptureInner {
    active: AtomicBool,
    changed: Notify,
}

impl CaptureHandle {
    pub fn new(active: bool) -> Self {
        Self {
            inner: Arc::new(CaptureInner {
                active: AtomicBool::new(active),
                changed: Notify::new(),
            }),
        }
    }

    pub fn start(&self) {
        if !self.inner.active.swap(true, Ordering::AcqRel) {
            info!("capture started");
        }
        self.inner.changed.notify_waiters();
    }

    pub fn stop(&self) {
        if self.inner.active.swap(false, Ordering::AcqRel) {
            info!("capture stopped");
        }
        self.inner.changed.notify_waiters();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Resolves once the flag equals `active`.
    pub async fn wait_until(&self, active: bool) {
        loop {
            // Register before checking so a concurrent toggle is not missed.
            let notified = self.inner.changed.notified();
            if self.is_active() == active {
                return;
            }
            notified.await;
        }
    }
}

/// Why the frame loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Capture was stopped from outside.
    Stopped,
    /// Target reached; capture has been stopped.
    Completed,
    /// Inference failed under the halt policy.
    Halted,
    /// The pose source has nothing more to give.
    SourceExhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    /// Results left over from while capture was stopped.
    pub discarded: u64,
    pub dropped: u64,
    pub errors: u64,
    pub reps: u64,
    pub completions: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameLoopOptions {
    pub interval: Duration,
    pub inference_timeout: Option<Duration>,
    pub on_error: InferenceErrorPolicy,
}

impl From<&FrameLoopConfig> for FrameLoopOptions {
    fn from(config: &FrameLoopConfig) -> Self {
        Self {
            interval: config.interval(),
            inference_timeout: config.inference_timeout(),
            on_error: config.on_inference_error,
        }
    }
}

impl Default for FrameLoopOptions {
    fn default() -> Self {
        Self::from(&FrameLoopConfig::default())
    }
}

pub struct FrameLoop<S, T, D> {
    source: S,
    trigger: T,
    sink: D,
    counter: JackCounter,
    capture: CaptureHandle,
    options: FrameLoopOptions,
    stats: LoopStats,
}

impl<S, T, D> FrameLoop<S, T, D>
where
    S: PoseSource,
    T: CompletionTrigger,
    D: DiagnosticsSink,
{
    pub fn new(
        source: S,
        trigger: T,
        sink: D,
        counter: JackCounter,
        capture: CaptureHandle,
        options: FrameLoopOptions,
    ) -> Self {
        Self {
            source,
            trigger,
            sink,
            counter,
            capture,
            options,
            stats: LoopStats::default(),
        }
    }

    pub fn counter(&self) -> &JackCounter {
        &self.counter
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn capture(&self) -> &CaptureHandle {
        &self.capture
    }

    /// Run cycles until capture stops, the target is reached, the source
    /// runs dry, or an inference error hits the halt policy.
    ///
    /// Counter state survives across calls, so a stopped loop can be resumed
    /// by starting capture and calling `run` again. Whatever the source
    /// produced in the meantime is discarded first.
    pub async fn run(&mut self) -> LoopExit {
        let stale = self.source.discard_pending();
        if stale > 0 {
            info!(discarded = stale, "dropped poses produced while capture was stopped");
            self.stats.discarded += stale as u64;
        }

        let exit = self.run_cycles().await;
        let s = self.stats;
        info!(
            ?exit,
            cycles = s.cycles,
            discarded = s.discarded,
            dropped = s.dropped,
            errors = s.errors,
            reps = s.reps,
            completions = s.completions,
            count = self.counter.count(),
            "frame loop finished"
        );
        exit
    }

    async fn run_cycles(&mut self) -> LoopExit {
        loop {
            if !self.capture.is_active() {
                return LoopExit::Stopped;
            }

            let result = self.next_pose().await;

            // Stopped while inference was in flight: the result is stale.
            if !self.capture.is_active() {
                debug!("capture stopped during inference, discarding result");
                return LoopExit::Stopped;
            }
            self.stats.cycles += 1;

            match result {
                Ok(pose) => {
                    if let Some(exit) = self.process(&pose) {
                        return exit;
                    }
                }
                Err(PoseError::Exhausted) => return LoopExit::SourceExhausted,
                Err(e) => {
                    self.stats.errors += 1;
                    warn!(error = %e, "pose inference failed");
                    if self.options.on_error == InferenceErrorPolicy::Halt {
                        self.capture.stop();
                        return LoopExit::Halted;
                    }
                }
            }

            // The delay fully elapses before the next cycle; a stop cuts it short.
            tokio::select! {
                _ = tokio::time::sleep(self.options.interval) => {}
                _ = self.capture.wait_until(false) => return LoopExit::Stopped,
            }
        }
    }

    async fn next_pose(&mut self) -> Result<Pose, PoseError> {
        match self.options.inference_timeout {
            Some(limit) => tokio::time::timeout(limit, self.source.next_pose())
                .await
                .unwrap_or(Err(PoseError::Timeout(limit))),
            None => self.source.next_pose().await,
        }
    }

    fn process(&mut self, pose: &Pose) -> Option<LoopExit> {
        match self.counter.process(pose, &self.trigger, &mut self.sink) {
            CycleOutcome::Dropped => {
                self.stats.dropped += 1;
                None
            }
            CycleOutcome::Rep { .. } => {
                self.stats.reps += 1;
                None
            }
            CycleOutcome::Completed => {
                self.stats.reps += 1;
                self.stats.completions += 1;
                self.capture.stop();
                Some(LoopExit::Completed)
            }
            CycleOutcome::Idle | CycleOutcome::Rearmed => None,
        }
    }
}
