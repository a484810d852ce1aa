//! Incremental scene synchronization.
//!
//! - [`shape_builder`]: evaluated mesh to per-material-slot backend shapes
//! - [`material_cache`]: shader memoization, user index, multi-material expansion
//! - [`synchronizer`]: node lifecycle, slot resolution, material edit propagation
//! - [`camera`]: host camera to backend camera
//! - [`stats`]: scene statistics

pub mod camera;
pub mod material_cache;
pub mod shape_builder;
pub mod stats;
pub mod synchronizer;

pub use camera::CameraDesc;
pub use material_cache::MaterialCache;
pub use shape_builder::{
    BuildOptions, BuiltShapes, GeometryBuild, ShapeBuilder, SubmeshBuffers, pack_submeshes,
    slot_for_material_id,
};
pub use stats::SceneStats;
pub use synchronizer::{
    MaterialUpdate, NodeState, ShapeRecord, SlotResolution, SyncContext, SyncFlags, Synchronizer,
};
