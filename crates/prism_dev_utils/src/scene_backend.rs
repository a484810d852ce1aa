//! Scene backend that records every command.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use prism_core::backend::{
    BackendResult, CameraParams, SceneBackend, ShapeDesc, SubdivisionParams,
};
use prism_core::errors::BackendError;
use prism_core::ids::{CameraHandle, ShaderHandle, ShapeHandle, VolumeShaderHandle};
use prism_core::material::{Color, Displacement, ShadowFlags};

/// Last known state of one backend shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeState {
    /// Instance prototype, `None` for tessellated shapes.
    pub prototype: Option<ShapeHandle>,
    pub face_count: usize,
    pub positions: Vec<Vec3>,
    pub vertex_indices: Vec<u32>,
    pub uvs: Option<Vec<glam::Vec2>>,
    pub attached: bool,
    pub destroyed: bool,
    pub transform: Mat4,
    pub shader: Option<ShaderHandle>,
    pub volume: Option<VolumeShaderHandle>,
    pub displacement: Option<Displacement>,
    pub subdivision: Option<SubdivisionParams>,
    pub shadow: Option<ShadowFlags>,
    pub visible: Option<bool>,
    pub name: String,
}

impl ShapeState {
    fn new(prototype: Option<ShapeHandle>) -> Self {
        Self {
            prototype,
            face_count: 0,
            positions: Vec::new(),
            vertex_indices: Vec::new(),
            uvs: None,
            attached: false,
            destroyed: false,
            transform: Mat4::IDENTITY,
            shader: None,
            volume: None,
            displacement: None,
            subdivision: None,
            shadow: None,
            visible: None,
            name: String::new(),
        }
    }

    /// Shading-related state, for comparing two resolutions.
    #[must_use]
    pub fn shading(
        &self,
    ) -> (
        Option<ShaderHandle>,
        Option<VolumeShaderHandle>,
        Option<Displacement>,
        Option<ShadowFlags>,
    ) {
        (self.shader, self.volume, self.displacement, self.shadow)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraState {
    pub params: Option<CameraParams>,
    pub look_at: Option<(Vec3, Vec3, Vec3)>,
}

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCounters {
    pub create_shape: usize,
    pub create_instance: usize,
    pub destroy_shape: usize,
    pub attach: usize,
    pub detach: usize,
    pub create_flat_shader: usize,
    pub release_shader: usize,
    pub release_volume_shader: usize,
    pub create_camera: usize,
}

/// In-memory [`SceneBackend`] recording the state it was driven into.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_handle: u64,
    shapes: FxHashMap<ShapeHandle, ShapeState>,
    flat_shaders: FxHashMap<ShaderHandle, Color>,
    released_shaders: Vec<ShaderHandle>,
    released_volumes: Vec<VolumeShaderHandle>,
    cameras: FxHashMap<CameraHandle, CameraState>,
    counters: BackendCounters,
    fail_op: Option<(&'static str, i32)>,
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `op` fail with `code`.
    pub fn fail_on(&mut self, op: &'static str, code: i32) {
        self.fail_op = Some((op, code));
    }

    pub fn clear_failure(&mut self) {
        self.fail_op = None;
    }

    /// Allocates a handle number; all handle kinds share one counter.
    pub fn alloc(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    #[must_use]
    pub fn counters(&self) -> BackendCounters {
        self.counters
    }

    #[must_use]
    pub fn shape(&self, handle: ShapeHandle) -> Option<&ShapeState> {
        self.shapes.get(&handle)
    }

    /// Shapes neither destroyed nor detached.
    pub fn attached_shapes(&self) -> impl Iterator<Item = (ShapeHandle, &ShapeState)> {
        self.shapes
            .iter()
            .filter(|(_, s)| s.attached && !s.destroyed)
            .map(|(&h, s)| (h, s))
    }

    #[must_use]
    pub fn live_shape_count(&self) -> usize {
        self.shapes.values().filter(|s| !s.destroyed).count()
    }

    /// Colour of a flat shader, `None` for shaders from the material parser.
    #[must_use]
    pub fn flat_color(&self, shader: ShaderHandle) -> Option<Color> {
        self.flat_shaders.get(&shader).copied()
    }

    #[must_use]
    pub fn is_released(&self, shader: ShaderHandle) -> bool {
        self.released_shaders.contains(&shader)
    }

    #[must_use]
    pub fn is_volume_released(&self, shader: VolumeShaderHandle) -> bool {
        self.released_volumes.contains(&shader)
    }

    #[must_use]
    pub fn camera(&self, camera: CameraHandle) -> Option<&CameraState> {
        self.cameras.get(&camera)
    }

    fn check(&self, op: &'static str) -> BackendResult<()> {
        match self.fail_op {
            Some((failing, code)) if failing == op => Err(BackendError::new(op, code)),
            _ => Ok(()),
        }
    }

    fn live_shape(&mut self, op: &'static str, shape: ShapeHandle) -> BackendResult<&mut ShapeState> {
        self.check(op)?;
        match self.shapes.get_mut(&shape) {
            Some(state) if !state.destroyed => Ok(state),
            _ => Err(BackendError::new(op, -1)),
        }
    }
}

impl SceneBackend for RecordingBackend {
    fn create_shape(&mut self, desc: &ShapeDesc<'_>) -> BackendResult<ShapeHandle> {
        self.check("create_shape")?;
        self.counters.create_shape += 1;
        let handle = ShapeHandle(self.alloc());
        let mut state = ShapeState::new(None);
        state.face_count = desc.face_count();
        state.positions = desc.positions.to_vec();
        state.vertex_indices = desc.vertex_indices.to_vec();
        state.uvs = desc.uvs.map(<[_]>::to_vec);
        self.shapes.insert(handle, state);
        Ok(handle)
    }

    fn create_instance(&mut self, prototype: ShapeHandle) -> BackendResult<ShapeHandle> {
        self.check("create_instance")?;
        let face_count = match self.shapes.get(&prototype) {
            Some(state) if !state.destroyed => state.face_count,
            _ => return Err(BackendError::new("create_instance", -1)),
        };
        self.counters.create_instance += 1;
        let handle = ShapeHandle(self.alloc());
        let mut state = ShapeState::new(Some(prototype));
        state.face_count = face_count;
        self.shapes.insert(handle, state);
        Ok(handle)
    }

    fn destroy_shape(&mut self, shape: ShapeHandle) {
        self.counters.destroy_shape += 1;
        if let Some(state) = self.shapes.get_mut(&shape) {
            state.destroyed = true;
            state.attached = false;
        }
    }

    fn attach_shape(&mut self, shape: ShapeHandle) -> BackendResult<()> {
        self.live_shape("attach_shape", shape)?.attached = true;
        self.counters.attach += 1;
        Ok(())
    }

    fn detach_shape(&mut self, shape: ShapeHandle) -> BackendResult<()> {
        self.live_shape("detach_shape", shape)?.attached = false;
        self.counters.detach += 1;
        Ok(())
    }

    fn set_transform(&mut self, shape: ShapeHandle, transform: &Mat4) -> BackendResult<()> {
        self.live_shape("set_transform", shape)?.transform = *transform;
        Ok(())
    }

    fn set_shader(&mut self, shape: ShapeHandle, shader: ShaderHandle) -> BackendResult<()> {
        self.live_shape("set_shader", shape)?.shader = Some(shader);
        Ok(())
    }

    fn set_volume_shader(
        &mut self,
        shape: ShapeHandle,
        shader: Option<VolumeShaderHandle>,
    ) -> BackendResult<()> {
        self.live_shape("set_volume_shader", shape)?.volume = shader;
        Ok(())
    }

    fn set_displacement(
        &mut self,
        shape: ShapeHandle,
        displacement: Option<&Displacement>,
    ) -> BackendResult<()> {
        let state = self.live_shape("set_displacement", shape)?;
        state.displacement = displacement.copied();
        if displacement.is_none() {
            state.subdivision = None;
        }
        Ok(())
    }

    fn set_subdivision(
        &mut self,
        shape: ShapeHandle,
        params: SubdivisionParams,
    ) -> BackendResult<()> {
        self.live_shape("set_subdivision", shape)?.subdivision = Some(params);
        Ok(())
    }

    fn set_shadow_flags(&mut self, shape: ShapeHandle, flags: ShadowFlags) -> BackendResult<()> {
        self.live_shape("set_shadow_flags", shape)?.shadow = Some(flags);
        Ok(())
    }

    fn set_visibility(&mut self, shape: ShapeHandle, visible: bool) -> BackendResult<()> {
        self.live_shape("set_visibility", shape)?.visible = Some(visible);
        Ok(())
    }

    fn set_name(&mut self, shape: ShapeHandle, name: &str) -> BackendResult<()> {
        self.live_shape("set_name", shape)?.name = name.to_owned();
        Ok(())
    }

    fn create_flat_shader(&mut self, color: Color) -> BackendResult<ShaderHandle> {
        self.check("create_flat_shader")?;
        self.counters.create_flat_shader += 1;
        let shader = ShaderHandle(self.alloc());
        self.flat_shaders.insert(shader, color);
        Ok(shader)
    }

    fn release_shader(&mut self, shader: ShaderHandle) {
        self.counters.release_shader += 1;
        self.released_shaders.push(shader);
    }

    fn release_volume_shader(&mut self, shader: VolumeShaderHandle) {
        self.counters.release_volume_shader += 1;
        self.released_volumes.push(shader);
    }

    fn create_camera(&mut self) -> BackendResult<CameraHandle> {
        self.check("create_camera")?;
        self.counters.create_camera += 1;
        let camera = CameraHandle(self.alloc());
        self.cameras.insert(camera, CameraState::default());
        Ok(camera)
    }

    fn set_camera_params(
        &mut self,
        camera: CameraHandle,
        params: &CameraParams,
    ) -> BackendResult<()> {
        self.check("set_camera_params")?;
        self.cameras.entry(camera).or_default().params = Some(*params);
        Ok(())
    }

    fn look_at(
        &mut self,
        camera: CameraHandle,
        eye: Vec3,
        target: Vec3,
        up: Vec3,
    ) -> BackendResult<()> {
        self.check("look_at")?;
        self.cameras.entry(camera).or_default().look_at = Some((eye, target, up));
        Ok(())
    }
}
