//! Frame hand-off.
//!
//! A [`FrameSlot`] holds at most one resolved frame: the most recent one.
//! Publishing replaces whatever was not consumed yet, so a slow consumer
//! skips frames instead of queueing them. Frames are ordered by
//! `(epoch, pass)`; the epoch increments on every restart, so a frame from
//! before a restart can never overwrite one from after it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::RawFrame;

/// Resolved, displayable samples of one completed pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Passes accumulated into this frame.
    pub pass: u32,
    /// Restart generation the frame belongs to.
    pub epoch: u32,
    pub color: Vec<[f32; 3]>,
    pub alpha: Vec<f32>,
}

impl Frame {
    /// Divides accumulated samples by their weight.
    ///
    /// The result always holds `width * height` pixels; pixels missing from
    /// a short readback are black and transparent.
    #[must_use]
    pub fn resolve(raw: &RawFrame, pass: u32, epoch: u32) -> Self {
        let pixels = raw.pixel_count();
        if raw.color.len() != pixels {
            log::warn!(
                "accumulation readback holds {} pixel(s), expected {pixels}",
                raw.color.len()
            );
        }
        let mut color = Vec::with_capacity(pixels);
        let mut alpha = Vec::with_capacity(pixels);
        for (i, &[r, g, b, w]) in raw.color.iter().take(pixels).enumerate() {
            let coverage = raw.alpha.get(i).copied().unwrap_or(w);
            if w > 0.0 {
                let inv = 1.0 / w;
                color.push([r * inv, g * inv, b * inv]);
                alpha.push((coverage * inv).clamp(0.0, 1.0));
            } else {
                color.push([0.0; 3]);
                alpha.push(0.0);
            }
        }
        color.resize(pixels, [0.0; 3]);
        alpha.resize(pixels, 0.0);
        Self {
            width: raw.width,
            height: raw.height,
            pass,
            epoch,
            color,
            alpha,
        }
    }

    #[inline]
    #[must_use]
    pub fn stamp(&self) -> (u32, u32) {
        (self.epoch, self.pass)
    }
}

#[derive(Default)]
struct SlotState {
    frame: Option<Arc<Frame>>,
    // Stamp of the newest frame ever published, consumed or not.
    newest: Option<(u32, u32)>,
    published: u64,
}

/// Single-slot, most-recent-wins frame mailbox.
pub struct FrameSlot {
    state: Mutex<SlotState>,
    ready_tx: flume::Sender<()>,
    ready_rx: flume::Receiver<()>,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSlot {
    #[must_use]
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = flume::bounded(1);
        Self {
            state: Mutex::new(SlotState::default()),
            ready_tx,
            ready_rx,
        }
    }

    /// Stores `frame` if it is newer than anything published before.
    ///
    /// Returns `false` when the frame was stale and dropped.
    pub fn publish(&self, frame: Frame) -> bool {
        {
            let mut state = self.state.lock();
            if state.newest.is_some_and(|newest| frame.stamp() <= newest) {
                return false;
            }
            state.newest = Some(frame.stamp());
            state.frame = Some(Arc::new(frame));
            state.published += 1;
        }
        // A full channel already carries a pending notification.
        let _ = self.ready_tx.try_send(());
        true
    }

    /// Removes and returns the unconsumed frame, if any.
    pub fn take(&self) -> Option<Arc<Frame>> {
        self.state.lock().frame.take()
    }

    /// Returns the unconsumed frame without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<Arc<Frame>> {
        self.state.lock().frame.clone()
    }

    /// Stamp of the newest frame ever published.
    #[must_use]
    pub fn newest(&self) -> Option<(u32, u32)> {
        self.state.lock().newest
    }

    /// Number of frames accepted so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.state.lock().published
    }

    /// Waits up to `timeout` for a publish notification.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.ready_rx.recv_timeout(timeout).is_ok()
    }
}
