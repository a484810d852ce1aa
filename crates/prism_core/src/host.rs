//! Host query surface.
//!
//! The bridge never owns host scene objects. Everything it knows about nodes
//! and materials comes through [`HostScene`], and material shading graphs are
//! compiled by an external [`MaterialParser`].

use glam::Mat4;

use crate::backend::SceneBackend;
use crate::ids::{MaterialRef, NodeRef, TimeValue, VolumeShaderHandle};
use crate::material::{ClassId, Displacement, ParamId, ShaderBuild};
use crate::mesh::EvaluatedMesh;

/// Read-only view of the host scene graph.
///
/// Implementations are called from the thread that handles host scene-edit
/// notifications only.
pub trait HostScene {
    /// Evaluates the node's object into a renderable triangle mesh.
    ///
    /// Returns `None` when the object has no renderable representation.
    fn evaluate_mesh(&self, node: NodeRef, time: TimeValue) -> Option<EvaluatedMesh<'_>>;

    /// World transform of the node (object offset included).
    fn world_transform(&self, node: NodeRef, time: TimeValue) -> Mat4;

    /// Material assigned to the node, if any.
    fn node_material(&self, node: NodeRef) -> Option<MaterialRef>;

    /// Viewport wireframe colour of the node.
    fn wireframe_color(&self, node: NodeRef) -> [u8; 3];

    fn is_visible(&self, node: NodeRef, time: TimeValue) -> bool;

    fn node_name(&self, node: NodeRef) -> String;

    /// Class of a material, compared by identity against known tags.
    fn material_class(&self, material: MaterialRef) -> ClassId;

    /// Number of sub-material slots of a container material.
    fn submaterial_count(&self, material: MaterialRef) -> usize;

    /// Sub-material bound to `slot`, `None` when the slot is empty.
    fn submaterial(&self, material: MaterialRef, slot: usize) -> Option<MaterialRef>;

    /// Whether the container's `slot` is switched on.
    fn submaterial_enabled(&self, material: MaterialRef, slot: usize) -> bool;

    /// Boolean parameter value of a material at `time`.
    fn param_bool(&self, material: MaterialRef, param: ParamId, time: TimeValue) -> Option<bool>;

    /// Whether `material` is a multi/sub-object container.
    fn is_multi_material(&self, material: MaterialRef) -> bool {
        self.material_class(material) == ClassId::MULTI_MATERIAL
    }
}

/// Compiles host materials into backend shading objects.
///
/// Treated as a pure function of `(material, time)`: calling it twice with
/// no intervening edit yields equivalent objects. Every backend object it
/// returns is owned by the caller, which releases it when done.
pub trait MaterialParser {
    /// Builds the surface shader graph of `material`.
    fn create_shader(
        &mut self,
        backend: &mut dyn SceneBackend,
        material: MaterialRef,
        time: TimeValue,
    ) -> Option<ShaderBuild>;

    /// Builds the volume shader of `material`, if it has one.
    fn create_volume_shader(
        &mut self,
        backend: &mut dyn SceneBackend,
        material: MaterialRef,
        time: TimeValue,
    ) -> Option<VolumeShaderHandle>;

    /// Resolves the displacement of `material`, `None` when no map is bound.
    ///
    /// The returned [`Displacement::map`] is a fresh shader each call.
    fn displacement(
        &mut self,
        backend: &mut dyn SceneBackend,
        material: MaterialRef,
        time: TimeValue,
    ) -> Option<Displacement>;
}
