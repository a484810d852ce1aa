//! Render Session Manager
//!
//! Owns at most one render session per renderer and drives it from the UI
//! thread.
//!
//! Three threads cooperate while a session runs:
//!
//! | Thread      | Work                                                              |
//! |-------------|-------------------------------------------------------------------|
//! | UI          | [`RenderSessionManager::poll`]: input, cancel, progress, repaint  |
//! | render      | pass loop ([`RenderCore`])                                        |
//! | frame copy  | composes the newest frame into the presentation bitmap            |
//!
//! The frame-copy thread composes but never repaints; the UI thread repaints
//! but never composes while the session runs. The host only allows its
//! presentation surface to be touched from the UI thread.
//!
//! # Shutdown order
//!
//! 1. signal abort
//! 2. join the render thread (which joins its resolver)
//! 3. join the frame-copy thread
//! 4. destroy the frame buffers
//! 5. destroy the backend context
//! 6. drop the session record
//!
//! Nothing may read backend buffers once step 4 has run.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use prism_core::errors::{PrismError, Result};
use prism_core::settings::{RenderSettings, Termination};

use crate::backend::RenderBackend;
use crate::cancellation::{AbortLevel, CancellationToken};
use crate::compose::{Bitmap, FrameCompositor};
use crate::frame::FrameSlot;
use crate::render_core::{
    Progress, RenderCore, RenderOutcome, RenderTarget, RenderThread, SharedTarget,
};

/// Host UI surface of a render session. Only ever called on the UI thread.
pub trait SessionUi {
    /// Drains pending host input messages.
    fn pump_messages(&mut self) {}

    /// Whether the user asked to cancel the render.
    fn cancel_requested(&mut self) -> bool;

    fn set_progress(&mut self, text: &str);

    /// Repaints the presentation surface with `bitmap`.
    fn present(&mut self, bitmap: &Bitmap);

    /// Shows a failure to the user.
    fn report_error(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished(RenderOutcome),
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: RenderOutcome,
    pub passes: u32,
    pub elapsed: Duration,
}

/// Progress line for the host status bar.
#[must_use]
pub fn progress_text(termination: &Termination, progress: Progress) -> String {
    match *termination {
        Termination::None => format!("Pass {}", progress.passes),
        Termination::PassCount { passes } => format!("Pass {}/{passes}", progress.passes),
        Termination::WallClock { seconds } => format!(
            "Elapsed {:.1}s/{seconds:.1}s",
            progress.elapsed.as_secs_f64()
        ),
    }
}

#[derive(Default)]
struct Presentation {
    bitmap: Bitmap,
    // Composed but not yet repainted.
    pending: bool,
    presented: u64,
}

struct ActiveSession<B> {
    target: SharedTarget<B>,
    slot: Arc<FrameSlot>,
    token: CancellationToken,
    render: Option<RenderThread>,
    helper: Option<JoinHandle<()>>,
    // Dropping the sender stops the frame-copy thread.
    helper_stop: Option<flume::Sender<()>>,
    presentation: Arc<Mutex<Presentation>>,
}

pub struct RenderSessionManager<B: RenderBackend + 'static> {
    settings: RenderSettings,
    compositor: Arc<FrameCompositor>,
    session: Option<ActiveSession<B>>,
}

impl<B: RenderBackend + 'static> RenderSessionManager<B> {
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        let compositor = FrameCompositor::new(&settings);
        Self::with_compositor(settings, compositor)
    }

    #[must_use]
    pub fn with_compositor(settings: RenderSettings, compositor: FrameCompositor) -> Self {
        Self {
            settings,
            compositor: Arc::new(compositor),
            session: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Creates frame buffers on `backend` and starts rendering.
    ///
    /// # Panics
    ///
    /// Panics if a session is already active on this manager.
    pub fn start(&mut self, backend: B) -> Result<()> {
        assert!(
            self.session.is_none(),
            "a render session is already active for this renderer"
        );
        self.settings.validate()?;

        let target = RenderTarget::shared(backend);
        let created = target
            .lock()
            .create_frame_buffers(self.settings.width, self.settings.height);
        if let Err(err) = created {
            target.lock().backend_mut().destroy_context();
            return Err(err.into());
        }

        let slot = Arc::new(FrameSlot::new());
        let token = CancellationToken::new();
        let presentation = Arc::new(Mutex::new(Presentation::default()));
        let mut session = ActiveSession {
            target: Arc::clone(&target),
            slot: Arc::clone(&slot),
            token: token.clone(),
            render: None,
            helper: None,
            helper_stop: None,
            presentation: Arc::clone(&presentation),
        };

        let core = RenderCore::new(
            target,
            Arc::clone(&slot),
            token,
            self.settings.termination,
            self.settings.region,
        );
        match core.spawn() {
            Ok(render) => session.render = Some(render),
            Err(err) => {
                teardown(&mut session, AbortLevel::Immediate);
                return Err(err);
            }
        }

        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let compositor = Arc::clone(&self.compositor);
        let interval = self.settings.frame_copy_interval();
        let spawned = thread::Builder::new()
            .name("prism-frame-copy".into())
            .spawn(move || frame_copy_loop(&slot, &presentation, &compositor, &stop_rx, interval));
        match spawned {
            Ok(helper) => {
                session.helper = Some(helper);
                session.helper_stop = Some(stop_tx);
            }
            Err(err) => {
                teardown(&mut session, AbortLevel::Immediate);
                return Err(err.into());
            }
        }

        log::info!(
            "render session started: {}x{}, {:?}",
            self.settings.width,
            self.settings.height,
            self.settings.termination
        );
        self.session = Some(session);
        Ok(())
    }

    /// One UI-thread iteration: pump input, check cancel, update progress
    /// and repaint a composed frame if one is waiting.
    pub fn poll(&mut self, ui: &mut dyn SessionUi) -> Result<SessionStatus> {
        let session = self.session.as_mut().ok_or(PrismError::NoActiveSession)?;

        ui.pump_messages();
        if ui.cancel_requested() && !session.token.is_cancelled() {
            log::info!("render cancelled by user");
            session.token.cancel();
        }

        let Some(render) = session.render.as_mut() else {
            return Err(PrismError::NoActiveSession);
        };
        ui.set_progress(&progress_text(&self.settings.termination, render.progress()));

        {
            let mut presentation = session.presentation.lock();
            if presentation.pending {
                ui.present(&presentation.bitmap);
                presentation.pending = false;
                presentation.presented += 1;
            }
        }

        Ok(match render.try_outcome() {
            Some(outcome) => SessionStatus::Finished(outcome),
            None => SessionStatus::Running,
        })
    }

    /// Polls on the UI cadence until the render finishes, then shuts the
    /// session down, repaints the final frame and reports failures.
    pub fn run(&mut self, ui: &mut dyn SessionUi) -> Result<SessionReport> {
        let interval = self.settings.ui_poll_interval();
        while self.poll(ui)? == SessionStatus::Running {
            if let Some(render) = self.session.as_mut().and_then(|s| s.render.as_mut()) {
                render.wait(interval);
            }
        }
        self.finish(ui)
    }

    /// Tears the session down after its loop finished and presents whatever
    /// the frame-copy thread did not get to.
    fn finish(&mut self, ui: &mut dyn SessionUi) -> Result<SessionReport> {
        let mut session = self.session.take().ok_or(PrismError::NoActiveSession)?;
        let report = teardown(&mut session, AbortLevel::Graceful);

        let mut presentation = session.presentation.lock();
        if presentation.pending {
            ui.present(&presentation.bitmap);
            presentation.pending = false;
            presentation.presented += 1;
        }
        if let Some(frame) = session.slot.take() {
            self.compositor.compose_into(&frame, &mut presentation.bitmap);
            ui.present(&presentation.bitmap);
            presentation.presented += 1;
        }
        drop(presentation);

        ui.set_progress(&progress_text(
            &self.settings.termination,
            Progress {
                passes: report.passes,
                elapsed: report.elapsed,
            },
        ));
        if let RenderOutcome::Catastrophic(failure) = &report.outcome {
            ui.report_error(&format!("Rendering failed: {failure}"));
        }
        Ok(report)
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Asks the loop to stop after the pass in flight.
    pub fn cancel(&self) -> Result<()> {
        self.active()?.token.cancel();
        Ok(())
    }

    /// Asks the loop to stop as soon as possible and drop its buffers.
    pub fn cancel_immediate(&self) -> Result<()> {
        self.active()?.token.cancel_immediate();
        Ok(())
    }

    /// Clears accumulation and restarts the pass count, e.g. after a scene
    /// edit during interactive rendering.
    pub fn restart(&self) -> Result<()> {
        self.active()?.token.request_restart();
        Ok(())
    }

    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        self.session
            .as_ref()
            .and_then(|s| s.render.as_ref())
            .map(RenderThread::progress)
    }

    #[must_use]
    pub fn frame_slot(&self) -> Option<Arc<FrameSlot>> {
        self.session.as_ref().map(|s| Arc::clone(&s.slot))
    }

    /// Bitmaps repainted so far in the active session.
    #[must_use]
    pub fn presented_count(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |s| s.presentation.lock().presented)
    }

    /// Aborts the active session and tears it down in order.
    pub fn shutdown(&mut self) -> Result<SessionReport> {
        let mut session = self.session.take().ok_or(PrismError::NoActiveSession)?;
        Ok(teardown(&mut session, AbortLevel::Graceful))
    }

    fn active(&self) -> Result<&ActiveSession<B>> {
        self.session.as_ref().ok_or(PrismError::NoActiveSession)
    }
}

impl<B: RenderBackend + 'static> Drop for RenderSessionManager<B> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            log::warn!("render session dropped while active; aborting");
            teardown(&mut session, AbortLevel::Immediate);
        }
    }
}

/// Runs the shutdown sequence. The record itself is dropped by the caller.
fn teardown<B: RenderBackend>(session: &mut ActiveSession<B>, level: AbortLevel) -> SessionReport {
    match level {
        AbortLevel::Immediate => session.token.cancel_immediate(),
        AbortLevel::Graceful => session.token.cancel(),
        AbortLevel::None => {}
    }

    let (outcome, progress) = match session.render.take() {
        Some(render) => render.join(),
        None => (RenderOutcome::Aborted, Progress::default()),
    };

    drop(session.helper_stop.take());
    if let Some(helper) = session.helper.take()
        && helper.join().is_err()
    {
        log::error!("frame-copy thread panicked");
    }

    {
        let mut target = session.target.lock();
        target.destroy_frame_buffers();
        target.backend_mut().destroy_context();
    }

    log::info!("render session closed: {outcome:?}");
    SessionReport {
        outcome,
        passes: progress.passes,
        elapsed: progress.elapsed,
    }
}

fn frame_copy_loop(
    slot: &FrameSlot,
    presentation: &Mutex<Presentation>,
    compositor: &FrameCompositor,
    stop: &flume::Receiver<()>,
    interval: Duration,
) {
    let mut scratch = Bitmap::default();
    while let Err(flume::RecvTimeoutError::Timeout) = stop.recv_timeout(interval) {
        if presentation.lock().pending {
            continue;
        }
        let Some(frame) = slot.take() else {
            continue;
        };
        compositor.compose_into(&frame, &mut scratch);

        let mut presentation = presentation.lock();
        std::mem::swap(&mut presentation.bitmap, &mut scratch);
        presentation.pending = true;
    }
}
