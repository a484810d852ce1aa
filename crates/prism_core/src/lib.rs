//! Core types of the Prism bridge.
//!
//! - [`ids`]: host identities, core arena keys and backend handles
//! - [`host`]: read-only host scene queries and the material parser contract
//! - [`backend`]: scene graph commands of the path tracing backend
//! - [`mesh`]: evaluated triangle meshes
//! - [`material`]: material slot state, shadow flags, displacement
//! - [`settings`]: synchronization and render configuration
//! - [`errors`]: error types

pub mod backend;
pub mod errors;
pub mod host;
pub mod ids;
pub mod material;
pub mod mesh;
pub mod settings;

pub use backend::{
    BackendResult, CameraParams, Projection, SceneBackend, ShapeDesc, SubdivisionParams,
};
pub use errors::{BackendError, PrismError, RenderFailure, Result};
pub use host::{HostScene, MaterialParser};
pub use ids::{
    CameraHandle, MaterialId, MaterialRef, NodeRef, ShaderHandle, ShapeHandle, ShapeId,
    TimeValue, VolumeShaderHandle,
};
pub use material::{
    BoundaryInterpolation, ClassId, Color, Displacement, MaterialSlot, ParamId, ShaderBuild,
    ShadowFlags,
};
pub use mesh::{EvaluatedMesh, Face, MeshData, NormalSet, UvChannel};
pub use settings::{Region, RenderSettings, SyncSettings, Termination, ToneMapping};
