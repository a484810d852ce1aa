//! Scene backend command surface.
//!
//! [`SceneBackend`] is the opaque scene graph of the path tracer as seen by
//! the synchronizer: shapes, shaders and cameras that can be created,
//! attached, detached and configured. Frame buffers and pass rendering live
//! on the render side (`prism_render::RenderBackend`).

use glam::{Mat4, Vec2, Vec3};

use crate::errors::BackendError;
use crate::ids::{CameraHandle, ShaderHandle, ShapeHandle, VolumeShaderHandle};
use crate::material::{BoundaryInterpolation, Color, Displacement, ShadowFlags};

/// Alias used by every backend command.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Buffers describing one backend shape.
///
/// Positions, normals and UVs are indexed independently. Every face is a
/// triangle, so `face_vertex_counts` is all threes.
#[derive(Debug, Clone, Copy)]
pub struct ShapeDesc<'a> {
    pub positions: &'a [Vec3],
    pub normals: &'a [Vec3],
    /// Primary UV channel. The secondary channel is always disabled.
    pub uvs: Option<&'a [Vec2]>,
    pub vertex_indices: &'a [u32],
    pub normal_indices: &'a [u32],
    pub uv_indices: Option<&'a [u32]>,
    pub face_vertex_counts: &'a [u32],
}

impl ShapeDesc<'_> {
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }
}

/// Subdivision parameters applied together with displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubdivisionParams {
    pub level: u32,
    pub crease_weight: f32,
    pub boundary: BoundaryInterpolation,
}

impl From<&Displacement> for SubdivisionParams {
    fn from(d: &Displacement) -> Self {
        Self {
            level: d.subdivision,
            crease_weight: d.crease_weight,
            boundary: d.boundary,
        }
    }
}

/// Camera projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
    },
    Orthographic {
        /// Width of the view volume in scene units.
        width: f32,
    },
}

/// Camera parameters pushed to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub focal_distance: Option<f32>,
    pub aspect: f32,
}

/// Scene graph commands of the path tracing backend.
pub trait SceneBackend {
    // --- Shapes ---
    fn create_shape(&mut self, desc: &ShapeDesc<'_>) -> BackendResult<ShapeHandle>;
    /// Creates an instance sharing the prototype's geometry.
    fn create_instance(&mut self, prototype: ShapeHandle) -> BackendResult<ShapeHandle>;
    fn destroy_shape(&mut self, shape: ShapeHandle);
    fn attach_shape(&mut self, shape: ShapeHandle) -> BackendResult<()>;
    fn detach_shape(&mut self, shape: ShapeHandle) -> BackendResult<()>;
    fn set_transform(&mut self, shape: ShapeHandle, transform: &Mat4) -> BackendResult<()>;
    fn set_shader(&mut self, shape: ShapeHandle, shader: ShaderHandle) -> BackendResult<()>;
    fn set_volume_shader(
        &mut self,
        shape: ShapeHandle,
        shader: Option<VolumeShaderHandle>,
    ) -> BackendResult<()>;
    /// Sets or (with `None`) removes displacement.
    fn set_displacement(
        &mut self,
        shape: ShapeHandle,
        displacement: Option<&Displacement>,
    ) -> BackendResult<()>;
    fn set_subdivision(&mut self, shape: ShapeHandle, params: SubdivisionParams)
    -> BackendResult<()>;
    fn set_shadow_flags(&mut self, shape: ShapeHandle, flags: ShadowFlags) -> BackendResult<()>;
    fn set_visibility(&mut self, shape: ShapeHandle, visible: bool) -> BackendResult<()>;
    fn set_name(&mut self, shape: ShapeHandle, name: &str) -> BackendResult<()>;

    // --- Shaders ---
    fn create_flat_shader(&mut self, color: Color) -> BackendResult<ShaderHandle>;
    fn release_shader(&mut self, shader: ShaderHandle);
    fn release_volume_shader(&mut self, shader: VolumeShaderHandle);

    // --- Cameras ---
    fn create_camera(&mut self) -> BackendResult<CameraHandle>;
    fn set_camera_params(&mut self, camera: CameraHandle, params: &CameraParams)
    -> BackendResult<()>;
    fn look_at(
        &mut self,
        camera: CameraHandle,
        eye: Vec3,
        target: Vec3,
        up: Vec3,
    ) -> BackendResult<()>;
}
