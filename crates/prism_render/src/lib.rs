//! Progressive rendering.
//!
//! - [`backend`]: frame buffer and pass commands of the path tracer
//! - [`cancellation`]: two-tier abort and restart signals
//! - [`frame`]: resolved frames and the latest-frame hand-off slot
//! - [`render_core`]: background pass loop
//! - [`compose`]: tone mapping into presentable bitmaps
//! - [`session`]: per-renderer session lifecycle driven from the UI thread

pub mod backend;
pub mod cancellation;
pub mod compose;
pub mod frame;
pub mod render_core;
pub mod session;

pub use backend::{RawFrame, RenderBackend};
pub use cancellation::{AbortLevel, CancellationToken};
pub use compose::{Bitmap, FrameCompositor, StampFn};
pub use frame::{Frame, FrameSlot};
pub use render_core::{
    Progress, RenderCore, RenderOutcome, RenderState, RenderTarget, RenderThread, SharedTarget,
};
pub use session::{
    RenderSessionManager, SessionReport, SessionStatus, SessionUi, progress_text,
};
