//! Render backend with scripted pass behaviour.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use prism_core::backend::BackendResult;
use prism_core::errors::BackendError;
use prism_core::settings::Region;
use prism_render::backend::{RawFrame, RenderBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    CreateFrameBuffers { width: u32, height: u32 },
    ClearFrameBuffers,
    /// A pass completed; carries the accumulated pass count.
    Pass(u32),
    /// A pass failed or panicked.
    PassFailed,
    ReadAccumulation(u32),
    DestroyFrameBuffers,
    DestroyContext,
}

/// Shared, ordered log of render backend calls.
#[derive(Debug, Clone, Default)]
pub struct RenderLog(Arc<Mutex<Vec<RenderEvent>>>);

impl RenderLog {
    fn push(&self, event: RenderEvent) {
        self.0.lock().push(event);
    }

    #[must_use]
    pub fn events(&self) -> Vec<RenderEvent> {
        self.0.lock().clone()
    }

    #[must_use]
    pub fn count(&self, event: RenderEvent) -> usize {
        self.0.lock().iter().filter(|&&e| e == event).count()
    }

    #[must_use]
    pub fn contains(&self, event: RenderEvent) -> bool {
        self.count(event) > 0
    }

    #[must_use]
    pub fn passes(&self) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|e| matches!(e, RenderEvent::Pass(_)))
            .count()
    }

    /// Index of the first occurrence of `event`.
    #[must_use]
    pub fn position(&self, event: RenderEvent) -> Option<usize> {
        self.0.lock().iter().position(|&e| e == event)
    }
}

/// Lets a test hold a pass open until it releases it.
pub struct PassGate {
    /// Receives the accumulated pass number each time a pass starts.
    pub entered: flume::Receiver<u32>,
    /// Send (or drop) to let the pass in flight finish.
    pub release: flume::Sender<()>,
}

/// [`RenderBackend`] whose pass `n` resolves to a colour of `n`.
///
/// Every pixel accumulates a radiance of `2n - 1` on pass `n`, so after `n`
/// passes the resolved value is exactly `n`. A frame read from the slot thus
/// tells which pass its buffers held.
pub struct ScriptedRenderer {
    log: RenderLog,
    width: u32,
    height: u32,
    accumulated: u32,
    total_passes: u32,
    fail_at: Option<(u32, i32)>,
    panic_at: Option<u32>,
    pass_delay: Duration,
    gate: Option<(flume::Sender<u32>, flume::Receiver<()>)>,
}

impl ScriptedRenderer {
    #[must_use]
    pub fn new() -> (Self, RenderLog) {
        let log = RenderLog::default();
        let renderer = Self {
            log: log.clone(),
            width: 0,
            height: 0,
            accumulated: 0,
            total_passes: 0,
            fail_at: None,
            panic_at: None,
            pass_delay: Duration::ZERO,
            gate: None,
        };
        (renderer, log)
    }

    /// The `pass`-th call to `render_pass` (1-based, across restarts) fails.
    #[must_use]
    pub fn fail_at(mut self, pass: u32, code: i32) -> Self {
        self.fail_at = Some((pass, code));
        self
    }

    /// The `pass`-th call to `render_pass` panics.
    #[must_use]
    pub fn panic_at(mut self, pass: u32) -> Self {
        self.panic_at = Some(pass);
        self
    }

    #[must_use]
    pub fn with_pass_delay(mut self, delay: Duration) -> Self {
        self.pass_delay = delay;
        self
    }

    /// Makes every pass wait for the returned gate.
    #[must_use]
    pub fn gated(mut self) -> (Self, PassGate) {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        self.gate = Some((entered_tx, release_rx));
        (
            self,
            PassGate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }
}

impl RenderBackend for ScriptedRenderer {
    fn create_frame_buffers(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.width = width;
        self.height = height;
        self.log
            .push(RenderEvent::CreateFrameBuffers { width, height });
        Ok(())
    }

    fn clear_frame_buffers(&mut self) -> BackendResult<()> {
        self.accumulated = 0;
        self.log.push(RenderEvent::ClearFrameBuffers);
        Ok(())
    }

    fn render_pass(&mut self, _region: Option<Region>) -> BackendResult<()> {
        self.total_passes += 1;
        if let Some((entered, release)) = &self.gate {
            let _ = entered.send(self.accumulated + 1);
            // A dropped sender releases every later pass.
            let _ = release.recv();
        }
        if !self.pass_delay.is_zero() {
            std::thread::sleep(self.pass_delay);
        }
        if self.panic_at == Some(self.total_passes) {
            self.log.push(RenderEvent::PassFailed);
            panic!("scripted panic in pass {}", self.total_passes);
        }
        if let Some((pass, code)) = self.fail_at
            && pass == self.total_passes
        {
            self.log.push(RenderEvent::PassFailed);
            return Err(BackendError::new("render_pass", code));
        }
        self.accumulated += 1;
        self.log.push(RenderEvent::Pass(self.accumulated));
        Ok(())
    }

    fn read_accumulation(&mut self) -> BackendResult<RawFrame> {
        self.log.push(RenderEvent::ReadAccumulation(self.accumulated));
        let n = self.accumulated as f32;
        // Sum of (2k - 1) for k in 1..=n is n^2; divided by weight n gives n.
        let sum = n * n;
        let pixels = self.width as usize * self.height as usize;
        Ok(RawFrame {
            width: self.width,
            height: self.height,
            color: vec![[sum, sum, sum, n]; pixels],
            alpha: vec![n; pixels],
        })
    }

    fn destroy_frame_buffers(&mut self) {
        self.log.push(RenderEvent::DestroyFrameBuffers);
    }

    fn destroy_context(&mut self) {
        self.log.push(RenderEvent::DestroyContext);
    }
}
