//! Cancellation and restart signalling for the render loop.
//!
//! The loop polls a [`CancellationToken`] between passes; it never blocks
//! on it. Restart requests are consumed once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// How urgently a render loop was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum AbortLevel {
    None = 0,
    /// Finish the pass in flight, then stop.
    Graceful = 1,
    /// Stop as soon as possible and tear down the frame buffers.
    Immediate = 2,
}

impl AbortLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Graceful,
            _ => Self::Immediate,
        }
    }
}

struct TokenInner {
    level: AtomicU8,
    restart: AtomicBool,
}

/// Signals shared between a render loop and whoever controls it.
///
/// Cloning a token creates another handle to the same signals. An abort can
/// only escalate: a graceful request after an immediate one is ignored.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                level: AtomicU8::new(AbortLevel::None as u8),
                restart: AtomicBool::new(false),
            }),
        }
    }

    /// Requests a graceful stop.
    pub fn cancel(&self) {
        self.escalate(AbortLevel::Graceful);
    }

    /// Requests an immediate stop with frame buffer teardown.
    pub fn cancel_immediate(&self) {
        self.escalate(AbortLevel::Immediate);
    }

    fn escalate(&self, level: AbortLevel) {
        self.inner.level.fetch_max(level as u8, Ordering::AcqRel);
    }

    #[must_use]
    pub fn abort_level(&self) -> AbortLevel {
        AbortLevel::from_raw(self.inner.level.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.abort_level() != AbortLevel::None
    }

    /// Asks the loop to clear its accumulation and start over.
    pub fn request_restart(&self) {
        self.inner.restart.store(true, Ordering::Release);
    }

    /// Consumes a pending restart request.
    #[must_use]
    pub fn take_restart(&self) -> bool {
        self.inner.restart.swap(false, Ordering::AcqRel)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("level", &self.abort_level())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_only_escalates() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert_eq!(token.abort_level(), AbortLevel::None);

        clone.cancel_immediate();
        token.cancel();
        assert_eq!(token.abort_level(), AbortLevel::Immediate);
    }

    #[test]
    fn restart_is_consumed_once() {
        let token = CancellationToken::new();
        token.request_restart();
        assert!(token.take_restart());
        assert!(!token.take_restart());
    }
}
