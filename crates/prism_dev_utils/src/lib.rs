//! Test doubles for the host application and the render backends.
//!
//! - [`MockHost`]: in-memory scene graph implementing `HostScene`
//! - [`RecordingBackend`]: `SceneBackend` that records shapes, shaders and counters
//! - [`ScriptedParser`]: `MaterialParser` with per-material scripted results
//! - [`ScriptedRenderer`]: `RenderBackend` with scripted failures, panics and gating
//! - [`HeadlessUi`]: `SessionUi` that records progress, repaints and errors
//! - [`SyncHarness`]: a `Synchronizer` wired to the doubles above

pub mod harness;
pub mod host;
pub mod parser;
pub mod renderer;
pub mod scene_backend;
pub mod ui;

pub use harness::SyncHarness;
pub use host::{MockHost, triangles};
pub use parser::{DisplacementScript, MaterialScript, ScriptedParser};
pub use renderer::{PassGate, RenderEvent, RenderLog, ScriptedRenderer};
pub use scene_backend::{BackendCounters, CameraState, RecordingBackend, ShapeState};
pub use ui::HeadlessUi;
