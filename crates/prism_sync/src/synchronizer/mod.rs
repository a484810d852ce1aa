//! Synchronizer
//!
//! Keeps a live mirror of backend shapes consistent with the host scene.
//!
//! # Ownership
//!
//! Every backend shape is described by a [`ShapeRecord`] stored in a single
//! arena keyed by [`ShapeId`]. The node map and the material user index hold
//! ids only; the arena alone decides when a record dies.
//!
//! # Node lifecycle
//!
//! ```text
//!              sync_node                  remove_node
//!   Unsynced ─────────────▶ Synced ─────────────────────▶ Unsynced
//!                            │  ▲
//!      cardinality change    │  │  flush_pending_rebuilds
//!      or parity flip        ▼  │
//!                        PendingRebuild
//! ```
//!
//! Edits that keep the number of shapes of a node unchanged are applied in
//! place on the existing shapes.
//!
//! # Shared shaders
//!
//! Flat shaders for unassigned slots are shared per wireframe colour and
//! live until [`Synchronizer::clear`]; a scene has a handful of distinct
//! wireframe colours. Multi-material expansions are dropped as soon as no
//! synchronized node uses the container any more.
//!
//! # Threading
//!
//! The synchronizer is driven from the thread that receives host scene-edit
//! notifications and is never shared with the render thread, so it needs no
//! locking.

mod material_update;
mod resolve;

use std::collections::VecDeque;

use bitflags::bitflags;
use glam::Mat4;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use smallvec::SmallVec;

use prism_core::backend::{BackendResult, SceneBackend};
use prism_core::host::{HostScene, MaterialParser};
use prism_core::ids::{
    CameraHandle, MaterialId, MaterialRef, NodeRef, ShaderHandle, ShapeHandle, ShapeId, TimeValue,
};
use prism_core::material::{MaterialSlot, ShadowFlags};
use prism_core::settings::SyncSettings;

use crate::camera::{self, CameraDesc};
use crate::material_cache::MaterialCache;
use crate::shape_builder::{BuildOptions, GeometryBuild, ShapeBuilder};
use crate::stats::SceneStats;

pub use material_update::MaterialUpdate;
pub use resolve::SlotResolution;

bitflags! {
    /// Scene-wide conditions of the shapes currently synchronized.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct SyncFlags: u32 {
        /// Some shape carries a direct (non-subdivided) displacement.
        const INACCURATE_DISPLACEMENT = 1 << 0;
        const HAS_SHADOW_CATCHER      = 1 << 1;
    }
}

/// Collaborators of one synchronization call.
///
/// Built by the caller for each batch of scene-edit notifications; the
/// synchronizer keeps no reference to any of them.
pub struct SyncContext<'a> {
    pub host: &'a dyn HostScene,
    pub backend: &'a mut dyn SceneBackend,
    pub parser: &'a mut dyn MaterialParser,
    pub time: TimeValue,
}

impl<'a> SyncContext<'a> {
    pub fn new(
        host: &'a dyn HostScene,
        backend: &'a mut dyn SceneBackend,
        parser: &'a mut dyn MaterialParser,
        time: TimeValue,
    ) -> Self {
        Self {
            host,
            backend,
            parser,
            time,
        }
    }
}

/// Synchronization state of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unsynced,
    Synced,
    /// Geometry must be rebuilt before the node is consistent again.
    PendingRebuild,
}

/// One backend shape, bound to exactly one material slot of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeRecord {
    pub handle: ShapeHandle,
    pub node: NodeRef,
    pub slot: MaterialSlot,
    pub slot_index: usize,
    /// Shape whose geometry this instance shares.
    pub prototype: Option<ShapeId>,
    /// Shadow state last pushed to the backend.
    pub shadow: ShadowFlags,
    /// Displacement last pushed to the backend was direct.
    pub direct_displacement: bool,
}

impl ShapeRecord {
    #[inline]
    #[must_use]
    pub fn is_instance(&self) -> bool {
        self.prototype.is_some()
    }
}

pub(crate) type ShapeList = SmallVec<[Option<ShapeId>; 4]>;

struct NodeRecord {
    // One entry per material slot; `None` for slots without faces.
    shapes: ShapeList,
    material: Option<MaterialId>,
    multi: bool,
    mirrored: bool,
    faces: usize,
}

/// Material slots resolved for one node.
pub(crate) struct SlotTable {
    material: Option<MaterialId>,
    multi: bool,
    slots: SmallVec<[MaterialSlot; 4]>,
}

impl SlotTable {
    /// The multi-material this table was expanded from.
    fn container(&self) -> Option<MaterialId> {
        self.material.filter(|_| self.multi)
    }
}

pub struct Synchronizer {
    settings: SyncSettings,

    shapes: SlotMap<ShapeId, ShapeRecord>,
    nodes: FxHashMap<NodeRef, NodeRecord>,
    materials: MaterialCache,

    pending: VecDeque<NodeRef>,
    pending_set: FxHashSet<NodeRef>,

    wire_shaders: FxHashMap<[u8; 3], ShaderHandle>,
    disabled_shader: Option<ShaderHandle>,
    error_shader: Option<ShaderHandle>,
    camera: Option<CameraHandle>,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new(SyncSettings::default())
    }
}

impl Synchronizer {
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            shapes: SlotMap::with_key(),
            nodes: FxHashMap::default(),
            materials: MaterialCache::new(),
            pending: VecDeque::new(),
            pending_set: FxHashSet::default(),
            wire_shaders: FxHashMap::default(),
            disabled_shader: None,
            error_shader: None,
            camera: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    // ========================================================================
    // Geometry lifecycle
    // ========================================================================

    /// Builds (or rebuilds) the shapes of `node`.
    ///
    /// Any shapes the node already had are removed first. A node without
    /// renderable geometry is left unsynced; this is not an error.
    pub fn sync_node(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
    ) -> BackendResult<NodeState> {
        self.remove_node(ctx.backend, node);

        let table = self.slot_table(ctx.host, node);
        let container = table.container();
        let result = self.build_node(ctx, node, table);
        if !matches!(result, Ok(NodeState::Synced))
            && let Some(id) = container
        {
            self.drop_unused_expansion(id);
        }
        result
    }

    fn build_node(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
        table: SlotTable,
    ) -> BackendResult<NodeState> {
        let host = ctx.host;
        let mirrored = is_mirrored(&host.world_transform(node, ctx.time));
        let options = BuildOptions {
            scale: self.settings.master_scale,
            flip_winding: self.settings.flip_odd_parity && mirrored,
        };

        let Some(mesh) = host.evaluate_mesh(node, ctx.time) else {
            log::debug!("node {node:?} has no renderable mesh");
            return Ok(NodeState::Unsynced);
        };

        let built = match ShapeBuilder::build(ctx.backend, mesh, table.slots.len(), options)? {
            GeometryBuild::NoGeometry => {
                log::debug!("node {node:?} has no faces");
                return Ok(NodeState::Unsynced);
            }
            GeometryBuild::Shapes(built) => built,
        };

        let handles = built
            .slots
            .into_iter()
            .map(|slot| slot.map(|handle| (handle, None)))
            .collect();
        self.register_node(ctx, node, table, mirrored, built.face_count, handles)
    }

    /// Synchronizes nodes sharing one evaluated object.
    ///
    /// The first node is tessellated; every other node receives instances of
    /// its shapes.
    ///
    /// # Panics
    ///
    /// Panics if a node of the group resolves to a different number of
    /// material slots than the first node.
    pub fn sync_instance_group(
        &mut self,
        ctx: &mut SyncContext<'_>,
        nodes: &[NodeRef],
    ) -> BackendResult<NodeState> {
        let Some((&representative, others)) = nodes.split_first() else {
            return Ok(NodeState::Unsynced);
        };

        for &node in others {
            self.remove_node(ctx.backend, node);
        }

        let state = self.sync_node(ctx, representative)?;
        if state != NodeState::Synced {
            return Ok(state);
        }

        let (prototypes, faces): (SmallVec<[Option<(ShapeId, ShapeHandle)>; 4]>, usize) = {
            let record = &self.nodes[&representative];
            let prototypes = record
                .shapes
                .iter()
                .map(|id| id.map(|id| (id, self.shapes[id].handle)))
                .collect();
            (prototypes, record.faces)
        };

        for &node in others {
            let table = self.slot_table(ctx.host, node);
            assert_eq!(
                table.slots.len(),
                prototypes.len(),
                "instance {node:?} resolves {} material slot(s) but its group representative \
                 {representative:?} resolves {}",
                table.slots.len(),
                prototypes.len()
            );

            let mut handles = Vec::with_capacity(prototypes.len());
            for prototype in &prototypes {
                let Some((prototype_id, prototype_handle)) = *prototype else {
                    handles.push(None);
                    continue;
                };
                match ctx.backend.create_instance(prototype_handle) {
                    Ok(handle) => handles.push(Some((handle, Some(prototype_id)))),
                    Err(err) => {
                        for (handle, _) in handles.into_iter().flatten() {
                            ctx.backend.destroy_shape(handle);
                        }
                        if let Some(id) = table.container() {
                            self.drop_unused_expansion(id);
                        }
                        return Err(err);
                    }
                }
            }

            let mirrored = is_mirrored(&ctx.host.world_transform(node, ctx.time));
            self.register_node(ctx, node, table, mirrored, faces, handles)?;
        }

        log::debug!(
            "instanced {} node(s) on {representative:?}",
            others.len()
        );
        Ok(NodeState::Synced)
    }

    /// Removes every shape of `node` from the backend and from both indices.
    ///
    /// Returns `false` if the node was not synchronized.
    pub fn remove_node(&mut self, backend: &mut dyn SceneBackend, node: NodeRef) -> bool {
        self.unqueue(node);
        let Some(record) = self.nodes.remove(&node) else {
            return false;
        };

        let removed: FxHashSet<ShapeId> = record.shapes.iter().flatten().copied().collect();
        self.drop_dependent_instances(backend, &removed);

        for id in record.shapes.into_iter().flatten() {
            self.destroy_shape(backend, id);
        }
        if record.multi
            && let Some(id) = record.material
        {
            self.drop_unused_expansion(id);
        }
        log::trace!("removed node {node:?}");
        true
    }

    /// Pushes the world transform of `node` onto its shapes.
    ///
    /// A change of mirroring invalidates the winding baked into the shapes
    /// and queues the node for rebuild instead.
    pub fn update_transform(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
    ) -> BackendResult<NodeState> {
        let Some(record) = self.nodes.get(&node) else {
            return Ok(NodeState::Unsynced);
        };
        if self.pending_set.contains(&node) {
            return Ok(NodeState::PendingRebuild);
        }

        let transform = ctx.host.world_transform(node, ctx.time);
        if self.settings.flip_odd_parity && is_mirrored(&transform) != record.mirrored {
            self.queue_rebuild(node);
            return Ok(NodeState::PendingRebuild);
        }

        let transform = scaled_transform(transform, self.settings.master_scale);
        for handle in self.node_handles(node) {
            ctx.backend.set_transform(handle, &transform)?;
        }
        Ok(NodeState::Synced)
    }

    /// Pushes the host visibility of `node` onto its shapes.
    pub fn update_visibility(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
    ) -> BackendResult<()> {
        let visible = ctx.host.is_visible(node, ctx.time);
        for handle in self.node_handles(node) {
            ctx.backend.set_visibility(handle, visible)?;
        }
        Ok(())
    }

    /// Reacts to a different material being assigned to `node`.
    ///
    /// A change between single and multi-material, or of the number of
    /// sub-material slots, queues the node for rebuild. Otherwise the
    /// existing shapes are re-bound and re-resolved in place.
    pub fn node_material_changed(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
    ) -> BackendResult<NodeState> {
        let Some(record) = self.nodes.get(&node) else {
            return Ok(NodeState::Unsynced);
        };
        let (was_multi, slot_count) = (record.multi, record.shapes.len());

        let table = self.slot_table(ctx.host, node);
        if table.multi != was_multi || table.slots.len() != slot_count {
            log::debug!(
                "node {node:?} changes from {slot_count} to {} material slot(s)",
                table.slots.len()
            );
            self.queue_rebuild(node);
            // The rebuild observes the new container again
            if let Some(id) = table.container() {
                self.drop_unused_expansion(id);
            }
            return Ok(NodeState::PendingRebuild);
        }

        let (previous, shapes) = {
            let record = self.node_mut(node);
            let previous = std::mem::replace(&mut record.material, table.material);
            (previous, record.shapes.clone())
        };
        if was_multi
            && previous != table.material
            && let Some(id) = previous
        {
            self.drop_unused_expansion(id);
        }
        for (slot_index, id) in shapes.into_iter().enumerate() {
            let Some(id) = id else { continue };
            self.rebind_slot(ctx.backend, id, table.slots[slot_index]);
            self.apply_slot(ctx, id)?;
        }
        Ok(self.node_state(node))
    }

    // ========================================================================
    // Rebuild queue
    // ========================================================================

    /// Nodes awaiting a full rebuild, in queue order.
    pub fn pending_rebuilds(&self) -> impl ExactSizeIterator<Item = NodeRef> + '_ {
        self.pending.iter().copied()
    }

    /// Drains the rebuild queue for the caller to process.
    pub fn take_pending_rebuilds(&mut self) -> Vec<NodeRef> {
        self.pending_set.clear();
        self.pending.drain(..).collect()
    }

    /// Rebuilds every queued node, including nodes queued along the way.
    ///
    /// Returns the number of nodes rebuilt.
    pub fn flush_pending_rebuilds(&mut self, ctx: &mut SyncContext<'_>) -> BackendResult<usize> {
        let mut rebuilt = 0;
        while let Some(node) = self.pending.pop_front() {
            self.pending_set.remove(&node);
            self.sync_node(ctx, node)?;
            rebuilt += 1;
        }
        Ok(rebuilt)
    }

    pub(crate) fn queue_rebuild(&mut self, node: NodeRef) -> bool {
        if !self.nodes.contains_key(&node) || !self.pending_set.insert(node) {
            return false;
        }
        log::debug!("queued {node:?} for rebuild");
        self.pending.push_back(node);
        true
    }

    fn unqueue(&mut self, node: NodeRef) {
        if self.pending_set.remove(&node) {
            self.pending.retain(|&n| n != node);
        }
    }

    // ========================================================================
    // Materials & teardown
    // ========================================================================

    /// Forgets a material deleted from the host scene.
    ///
    /// Its cached shaders are released and its id is retired. Shapes that
    /// still referenced it fall back to unassigned and their nodes are queued
    /// for rebuild, which are returned.
    pub fn material_deleted(
        &mut self,
        backend: &mut dyn SceneBackend,
        material: MaterialRef,
    ) -> Vec<NodeRef> {
        let Some(id) = self.materials.lookup(material) else {
            return Vec::new();
        };

        let mut affected = self.container_nodes(id);
        for shape in self.materials.forget(id, backend) {
            if let Some(record) = self.shapes.get_mut(shape) {
                record.slot = MaterialSlot::Unassigned;
                affected.push(record.node);
            }
        }

        affected.sort_unstable();
        affected.dedup();
        affected.retain(|&node| self.queue_rebuild(node) || self.pending_set.contains(&node));
        log::debug!("material {material:?} deleted, {} node(s) affected", affected.len());
        affected
    }

    /// Detaches every shape and releases every shader the synchronizer owns.
    pub fn clear(&mut self, backend: &mut dyn SceneBackend) {
        // Instances go before the shapes they share geometry with.
        let mut shapes: Vec<ShapeRecord> = self.shapes.drain().map(|(_, r)| r).collect();
        shapes.sort_by_key(|r| !r.is_instance());
        for record in shapes {
            if let Err(err) = backend.detach_shape(record.handle) {
                log::warn!("{err}");
            }
            backend.destroy_shape(record.handle);
        }

        self.materials.clear(backend);
        for (_, shader) in self.wire_shaders.drain() {
            backend.release_shader(shader);
        }
        for shader in [self.disabled_shader.take(), self.error_shader.take()]
            .into_iter()
            .flatten()
        {
            backend.release_shader(shader);
        }

        self.nodes.clear();
        self.pending.clear();
        self.pending_set.clear();
        self.camera = None;
        log::debug!("synchronizer cleared");
    }

    // ========================================================================
    // Camera
    // ========================================================================

    /// Pushes the host camera to the backend, creating the backend camera
    /// on first use.
    pub fn sync_camera(
        &mut self,
        backend: &mut dyn SceneBackend,
        desc: &CameraDesc,
    ) -> BackendResult<CameraHandle> {
        camera::sync_camera(backend, &mut self.camera, desc, self.settings.master_scale)
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> Option<CameraHandle> {
        self.camera
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn node_state(&self, node: NodeRef) -> NodeState {
        if self.pending_set.contains(&node) {
            NodeState::PendingRebuild
        } else if self.nodes.contains_key(&node) {
            NodeState::Synced
        } else {
            NodeState::Unsynced
        }
    }

    /// Shapes of `node`, one entry per material slot.
    #[must_use]
    pub fn node_shapes(&self, node: NodeRef) -> Option<&[Option<ShapeId>]> {
        self.nodes.get(&node).map(|r| r.shapes.as_slice())
    }

    #[inline]
    #[must_use]
    pub fn shape(&self, id: ShapeId) -> Option<&ShapeRecord> {
        self.shapes.get(id)
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ShapeId, &ShapeRecord)> {
        self.shapes.iter()
    }

    #[inline]
    #[must_use]
    pub fn materials(&self) -> &MaterialCache {
        &self.materials
    }

    #[must_use]
    pub fn material_id(&self, material: MaterialRef) -> Option<MaterialId> {
        self.materials.lookup(material)
    }

    /// Number of shapes currently assigned `material`.
    #[must_use]
    pub fn material_user_count(&self, material: MaterialRef) -> usize {
        self.materials
            .lookup(material)
            .map_or(0, |id| self.materials.user_count(id))
    }

    #[must_use]
    pub fn is_emissive(&self, material: MaterialRef) -> bool {
        self.materials
            .lookup(material)
            .is_some_and(|id| self.materials.is_emissive(id))
    }

    /// Conditions of the shapes currently synchronized.
    #[must_use]
    pub fn flags(&self) -> SyncFlags {
        let mut flags = SyncFlags::empty();
        for record in self.shapes.values() {
            if record.direct_displacement {
                flags |= SyncFlags::INACCURATE_DISPLACEMENT;
            }
            if record.shadow.contains(ShadowFlags::SHADOW_CATCHER) {
                flags |= SyncFlags::HAS_SHADOW_CATCHER;
            }
        }
        flags
    }

    #[must_use]
    pub fn stats(&self) -> SceneStats {
        SceneStats {
            nodes: self.nodes.len(),
            shapes: self.shapes.len(),
            instances: self.shapes.values().filter(|r| r.is_instance()).count(),
            faces: self.nodes.values().map(|n| n.faces).sum(),
            emissive_materials: self.materials.emissive_count(),
            shadow_catchers: self
                .shapes
                .values()
                .filter(|r| r.shadow.contains(ShadowFlags::SHADOW_CATCHER))
                .count(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn node_mut(&mut self, node: NodeRef) -> &mut NodeRecord {
        self.nodes
            .get_mut(&node)
            .unwrap_or_else(|| panic!("node {node:?} is not synchronized"))
    }

    fn node_handles(&self, node: NodeRef) -> SmallVec<[ShapeHandle; 4]> {
        self.nodes
            .get(&node)
            .map(|record| {
                record
                    .shapes
                    .iter()
                    .flatten()
                    .map(|&id| self.shapes[id].handle)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nodes whose assigned material is the container `id`.
    fn container_nodes(&self, id: MaterialId) -> Vec<NodeRef> {
        self.nodes
            .iter()
            .filter(|(_, record)| record.multi && record.material == Some(id))
            .map(|(&node, _)| node)
            .collect()
    }

    /// Forgets the expansion of container `id` once no node uses it.
    fn drop_unused_expansion(&mut self, id: MaterialId) {
        if self.container_nodes(id).is_empty() && self.materials.take_expansion(id).is_some() {
            log::trace!("dropped expansion of unused multi-material {id:?}");
        }
    }

    /// Nodes owning at least one shape in the user set of `id`.
    fn user_nodes(&self, id: MaterialId) -> Vec<NodeRef> {
        let mut nodes: Vec<NodeRef> = self
            .materials
            .users(id)
            .filter_map(|shape| self.shapes.get(shape).map(|r| r.node))
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Registers freshly created backend shapes under `node` and configures
    /// them. On failure the node is removed again.
    fn register_node(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
        table: SlotTable,
        mirrored: bool,
        faces: usize,
        handles: Vec<Option<(ShapeHandle, Option<ShapeId>)>>,
    ) -> BackendResult<NodeState> {
        self.nodes.insert(
            node,
            NodeRecord {
                shapes: ShapeList::new(),
                material: table.material,
                multi: table.multi,
                mirrored,
                faces,
            },
        );

        let mut created = Vec::with_capacity(handles.len());
        for (slot_index, entry) in handles.into_iter().enumerate() {
            let id = entry.map(|(handle, prototype)| {
                let slot = table.slots[slot_index];
                let id = self.shapes.insert(ShapeRecord {
                    handle,
                    node,
                    slot,
                    slot_index,
                    prototype,
                    shadow: ShadowFlags::default(),
                    direct_displacement: false,
                });
                if let Some(material) = slot.material() {
                    self.materials.add_user(material, id);
                }
                id
            });
            self.node_mut(node).shapes.push(id);
            created.extend(id);
        }

        if let Err(err) = self.configure_shapes(ctx, node, &created) {
            self.remove_node(ctx.backend, node);
            return Err(err);
        }

        log::trace!("synced node {node:?}: {} shape(s)", created.len());
        Ok(NodeState::Synced)
    }

    fn configure_shapes(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
        shapes: &[ShapeId],
    ) -> BackendResult<()> {
        let transform = scaled_transform(
            ctx.host.world_transform(node, ctx.time),
            self.settings.master_scale,
        );
        let visible = ctx.host.is_visible(node, ctx.time);
        let name = ctx.host.node_name(node);

        for &id in shapes {
            let handle = self.shapes[id].handle;
            ctx.backend.set_name(handle, &name)?;
            ctx.backend.set_transform(handle, &transform)?;
            self.apply_slot(ctx, id)?;
            ctx.backend.set_visibility(handle, visible)?;
            ctx.backend.attach_shape(handle)?;
        }
        Ok(())
    }

    /// Moves `shape` to `slot`, keeping the user index consistent.
    fn rebind_slot(&mut self, backend: &mut dyn SceneBackend, shape: ShapeId, slot: MaterialSlot) {
        let old = self.shapes[shape].slot;
        if old == slot {
            return;
        }
        // Add before removing so a shared material never drops to zero users.
        if let Some(material) = slot.material() {
            self.materials.add_user(material, shape);
        }
        self.shapes[shape].slot = slot;
        if let Some(material) = old.material() {
            self.materials.remove_user(material, shape, backend);
        }
    }

    fn destroy_shape(&mut self, backend: &mut dyn SceneBackend, id: ShapeId) {
        let Some(record) = self.shapes.remove(id) else {
            return;
        };
        if let Err(err) = backend.detach_shape(record.handle) {
            log::warn!("{err}");
        }
        backend.destroy_shape(record.handle);
        if let Some(material) = record.slot.material() {
            self.materials.remove_user(material, id, backend);
        }
    }

    /// Destroys instances sharing geometry with `prototypes` and queues their
    /// nodes for rebuild. Their slots become empty placeholders.
    fn drop_dependent_instances(
        &mut self,
        backend: &mut dyn SceneBackend,
        prototypes: &FxHashSet<ShapeId>,
    ) {
        let dependents: Vec<(ShapeId, NodeRef, usize)> = self
            .shapes
            .iter()
            .filter(|(_, r)| r.prototype.is_some_and(|p| prototypes.contains(&p)))
            .map(|(id, r)| (id, r.node, r.slot_index))
            .collect();

        for (id, node, slot_index) in dependents {
            self.destroy_shape(backend, id);
            if let Some(record) = self.nodes.get_mut(&node) {
                record.shapes[slot_index] = None;
            }
            self.queue_rebuild(node);
        }
    }
}

/// `true` when the transform mirrors space (negative determinant).
#[inline]
#[must_use]
pub fn is_mirrored(transform: &Mat4) -> bool {
    transform.determinant() < 0.0
}

/// Applies the master scale to the translation of `transform`.
#[must_use]
pub fn scaled_transform(transform: Mat4, scale: f32) -> Mat4 {
    let mut transform = transform;
    transform.w_axis = (transform.w_axis.truncate() * scale).extend(transform.w_axis.w);
    transform
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn mirroring_is_detected_from_the_determinant() {
        assert!(!is_mirrored(&Mat4::IDENTITY));
        assert!(is_mirrored(&Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0))));
        assert!(!is_mirrored(&Mat4::from_scale(Vec3::new(-1.0, -1.0, 1.0))));
    }

    #[test]
    fn scale_applies_to_translation_only() {
        let t = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::IDENTITY,
            Vec3::new(10.0, 0.0, -4.0),
        );
        let scaled = scaled_transform(t, 0.5);
        assert_eq!(scaled.w_axis.truncate(), Vec3::new(5.0, 0.0, -2.0));
        assert_eq!(scaled.x_axis, t.x_axis);
    }
}
