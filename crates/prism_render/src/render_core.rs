//! Render Core
//!
//! Background pass loop of one render session.
//!
//! ```text
//!   Idle ──start──▶ Rendering ◀──────▶ Restarting
//!                      │
//!                      ├─ limit reached ─────────▶ Done(Completed)
//!                      ├─ abort ─────────────────▶ Done(Aborted)
//!                      └─ backend error / panic ─▶ Done(Catastrophic)
//! ```
//!
//! # Locks
//!
//! Two locks are involved and never held together:
//!
//! - the render target lock guards the backend and its pass counter. The
//!   loop holds it for the duration of a pass; the resolver holds it only
//!   while copying the accumulation out.
//! - the [`FrameSlot`] lock guards the presentable frame. Only the resolver
//!   writes it, after the target lock has been released.
//!
//! Resolving therefore never delays the next pass beyond the copy itself.
//!
//! # Resolver
//!
//! After each pass the loop posts a wake-up into a one-element channel and
//! moves on. The resolver reads whatever pass the buffers hold when it gets
//! there, so a backlog collapses into a single read of the newest pass. The
//! resolver is joined before the loop reports `Done`, so after a completed
//! session the slot holds the frame of the last pass.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use prism_core::backend::BackendResult;
use prism_core::errors::{RenderFailure, Result};
use prism_core::settings::{Region, Termination};

use crate::backend::RenderBackend;
use crate::cancellation::{AbortLevel, CancellationToken};
use crate::frame::{Frame, FrameSlot};

// ============================================================================
// Render target
// ============================================================================

/// The backend together with the accumulation state it renders into.
pub struct RenderTarget<B> {
    backend: B,
    pass: u32,
    epoch: u32,
    has_buffers: bool,
}

/// Render target shared between the session, the loop and the resolver.
pub type SharedTarget<B> = Arc<Mutex<RenderTarget<B>>>;

impl<B: RenderBackend> RenderTarget<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pass: 0,
            epoch: 0,
            has_buffers: false,
        }
    }

    #[must_use]
    pub fn shared(backend: B) -> SharedTarget<B> {
        Arc::new(Mutex::new(Self::new(backend)))
    }

    pub fn create_frame_buffers(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.backend.create_frame_buffers(width, height)?;
        self.has_buffers = true;
        Ok(())
    }

    /// Tears down the frame buffers once; later calls do nothing.
    pub fn destroy_frame_buffers(&mut self) {
        if std::mem::take(&mut self.has_buffers) {
            self.backend.destroy_frame_buffers();
        }
    }

    #[inline]
    #[must_use]
    pub fn has_frame_buffers(&self) -> bool {
        self.has_buffers
    }

    /// Passes accumulated since the last clear.
    #[inline]
    #[must_use]
    pub fn pass(&self) -> u32 {
        self.pass
    }

    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn clear(&mut self, restart: bool) -> BackendResult<()> {
        self.backend.clear_frame_buffers()?;
        self.pass = 0;
        if restart {
            self.epoch += 1;
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

/// How a render loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The termination limit was reached.
    Completed,
    Aborted,
    Catastrophic(RenderFailure),
}

impl RenderOutcome {
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Rendering,
    Restarting,
    Done(RenderOutcome),
}

/// Pass counter and elapsed time of the running loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub passes: u32,
    pub elapsed: Duration,
}

struct CoreStatus {
    state: RenderState,
    progress: Progress,
}

type SharedStatus = Arc<Mutex<CoreStatus>>;

// ============================================================================
// Render core
// ============================================================================

pub struct RenderCore<B> {
    target: SharedTarget<B>,
    slot: Arc<FrameSlot>,
    token: CancellationToken,
    termination: Termination,
    region: Option<Region>,
    status: SharedStatus,
}

impl<B: RenderBackend + 'static> RenderCore<B> {
    /// The target must already own frame buffers.
    #[must_use]
    pub fn new(
        target: SharedTarget<B>,
        slot: Arc<FrameSlot>,
        token: CancellationToken,
        termination: Termination,
        region: Option<Region>,
    ) -> Self {
        Self {
            target,
            slot,
            token,
            termination,
            region,
            status: Arc::new(Mutex::new(CoreStatus {
                state: RenderState::Idle,
                progress: Progress::default(),
            })),
        }
    }

    /// Starts the pass loop and its resolver on background threads.
    pub fn spawn(self) -> Result<RenderThread> {
        let (request_tx, request_rx) = flume::bounded(1);
        let (done_tx, done_rx) = flume::bounded(1);

        let resolver = {
            let target = Arc::clone(&self.target);
            let slot = Arc::clone(&self.slot);
            thread::Builder::new()
                .name("prism-frame-resolve".into())
                .spawn(move || resolve_loop(&target, &slot, &request_rx))?
        };

        let status = Arc::clone(&self.status);
        let handle = thread::Builder::new()
            .name("prism-render".into())
            .spawn(move || {
                let outcome = self.run(request_tx, resolver);
                // The receiver is gone only when the session was dropped.
                let _ = done_tx.send(outcome);
            })?;

        Ok(RenderThread {
            handle: Some(handle),
            done: done_rx,
            status,
            outcome: None,
        })
    }

    fn run(self, requests: flume::Sender<()>, resolver: JoinHandle<()>) -> RenderOutcome {
        self.set_state(RenderState::Rendering);
        log::info!("render loop started ({:?})", self.termination);

        let mut started = Instant::now();
        let mut passes = 0;

        let cleared = self.target.lock().clear(false);
        let outcome = match cleared {
            Err(err) => RenderOutcome::Catastrophic(err.into()),
            Ok(()) => loop {
                if self.token.is_cancelled() {
                    break RenderOutcome::Aborted;
                }

                if self.token.take_restart() {
                    self.set_state(RenderState::Restarting);
                    if let Err(err) = self.target.lock().clear(true) {
                        break RenderOutcome::Catastrophic(err.into());
                    }
                    passes = 0;
                    started = Instant::now();
                    self.set_state(RenderState::Rendering);
                    log::debug!("render loop restarted");
                }

                let result = {
                    let mut target = self.target.lock();
                    let result =
                        catch_unwind(AssertUnwindSafe(|| target.backend.render_pass(self.region)));
                    if matches!(result, Ok(Ok(()))) {
                        target.pass += 1;
                        passes = target.pass;
                    }
                    result
                };
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => break RenderOutcome::Catastrophic(err.into()),
                    Err(payload) => {
                        break RenderOutcome::Catastrophic(RenderFailure::Panicked(
                            panic_message(payload.as_ref()),
                        ));
                    }
                }

                let elapsed = started.elapsed();
                self.status.lock().progress = Progress { passes, elapsed };
                log::trace!("pass {passes} done after {elapsed:?}");

                if self.token.abort_level() == AbortLevel::Immediate {
                    continue;
                }

                // Full means a wake-up is pending; the resolver reads the newest pass anyway.
                let _ = requests.try_send(());

                if self.termination.is_reached(passes, elapsed) {
                    break RenderOutcome::Completed;
                }
            },
        };

        // Closing the channel lets the resolver drain and exit.
        drop(requests);
        if resolver.join().is_err() {
            log::error!("frame resolver panicked");
        }

        if self.token.abort_level() == AbortLevel::Immediate {
            self.target.lock().destroy_frame_buffers();
            log::debug!("frame buffers torn down by immediate abort");
        }

        match &outcome {
            RenderOutcome::Catastrophic(failure) => log::error!("render failed: {failure}"),
            other => log::info!("render loop finished: {other:?} after {passes} pass(es)"),
        }
        self.set_state(RenderState::Done(outcome.clone()));
        outcome
    }

    fn set_state(&self, state: RenderState) {
        self.status.lock().state = state;
    }
}

fn resolve_loop<B: RenderBackend>(
    target: &SharedTarget<B>,
    slot: &FrameSlot,
    requests: &flume::Receiver<()>,
) {
    while requests.recv().is_ok() {
        let (raw, pass, epoch) = {
            let mut target = target.lock();
            if target.pass == 0 || !target.has_buffers {
                continue;
            }
            match target.backend.read_accumulation() {
                Ok(raw) => (raw, target.pass, target.epoch),
                Err(err) => {
                    log::warn!("frame read-back failed: {err}");
                    continue;
                }
            }
        };
        slot.publish(Frame::resolve(&raw, pass, epoch));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Thread handle
// ============================================================================

/// Handle to a running render loop.
pub struct RenderThread {
    handle: Option<JoinHandle<()>>,
    done: flume::Receiver<RenderOutcome>,
    status: SharedStatus,
    outcome: Option<RenderOutcome>,
}

impl RenderThread {
    #[must_use]
    pub fn state(&self) -> RenderState {
        self.status.lock().state.clone()
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        self.status.lock().progress
    }

    /// Returns the outcome if the loop has finished, without blocking.
    pub fn try_outcome(&mut self) -> Option<RenderOutcome> {
        if self.outcome.is_none() {
            self.outcome = self.done.try_recv().ok();
        }
        self.outcome.clone()
    }

    /// Waits up to `timeout` for the loop to finish.
    pub fn wait(&mut self, timeout: Duration) -> Option<RenderOutcome> {
        if self.outcome.is_none() {
            self.outcome = self.done.recv_timeout(timeout).ok();
        }
        self.outcome.clone()
    }

    /// Blocks until the loop thread has exited.
    ///
    /// Returns the outcome and the final progress.
    pub fn join(mut self) -> (RenderOutcome, Progress) {
        let outcome = match self.outcome.take() {
            Some(outcome) => Some(outcome),
            None => self.done.recv().ok(),
        };
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("render thread panicked outside the pass call");
        }
        let outcome = outcome.unwrap_or_else(|| {
            RenderOutcome::Catastrophic(RenderFailure::Panicked("render thread exited".into()))
        });
        (outcome, self.progress())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(f: impl FnOnce() + std::panic::UnwindSafe) -> Box<dyn Any + Send> {
        match catch_unwind(f) {
            Ok(()) => panic!("closure did not panic"),
            Err(payload) => payload,
        }
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = payload_of(|| panic!("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = payload_of(|| panic!("{} {}", "formatted", 1));
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");
    }
}
