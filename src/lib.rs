#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Prism bridge: keeps a path tracer's scene in step with a host scene graph
//! and drives progressive renders from the host UI thread.
//!
//! Scene side: implement [`HostScene`], [`MaterialParser`] and
//! [`SceneBackend`] for your host and backend, then drive a [`Synchronizer`]
//! with host notifications through a [`SyncContext`].
//!
//! Render side: implement [`RenderBackend`] and [`SessionUi`], then call
//! [`RenderSessionManager::start`] followed by [`RenderSessionManager::run`].

pub use glam;

pub use prism_core::{backend, errors, host, ids, material, mesh, settings};
pub use prism_render::{backend as render_backend, cancellation, compose, frame, render_core, session};
pub use prism_sync::{camera, material_cache, shape_builder, stats, synchronizer};

pub use prism_core::{
    BackendError, EvaluatedMesh, HostScene, MaterialParser, MaterialRef, MaterialSlot, MeshData,
    NodeRef, PrismError, RenderFailure, RenderSettings, Result, SceneBackend, SyncSettings,
    Termination, TimeValue,
};
pub use prism_render::{
    Bitmap, CancellationToken, FrameCompositor, FrameSlot, RenderBackend, RenderOutcome,
    RenderSessionManager, SessionReport, SessionUi,
};
pub use prism_sync::{
    CameraDesc, MaterialUpdate, NodeState, SceneStats, ShapeBuilder, SyncContext, SyncFlags,
    Synchronizer,
};
