//! Per-material-slot resolution.
//!
//! The same resolution runs when shapes are first built and when they are
//! updated in place, so re-resolving an unchanged slot pushes identical
//! state to the backend.

use smallvec::smallvec;

use prism_core::backend::{BackendResult, SceneBackend, SubdivisionParams};
use prism_core::host::HostScene;
use prism_core::ids::{MaterialRef, NodeRef, ShaderHandle, ShapeId, TimeValue, VolumeShaderHandle};
use prism_core::material::{ClassId, Color, Displacement, MaterialSlot, ParamId, ShadowFlags};

use super::{NodeState, SlotTable, SyncContext, Synchronizer};

/// Backend state resolved for one material slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotResolution {
    pub shader: ShaderHandle,
    pub volume: Option<VolumeShaderHandle>,
    pub displacement: Option<Displacement>,
    pub shadow: ShadowFlags,
}

impl SlotResolution {
    fn flat(shader: ShaderHandle) -> Self {
        Self {
            shader,
            volume: None,
            displacement: None,
            shadow: ShadowFlags::default(),
        }
    }
}

impl Synchronizer {
    /// Re-resolves every shape of `node` in place.
    pub fn resolve_node(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
    ) -> BackendResult<NodeState> {
        let Some(shapes) = self.node_shapes(node).map(|s| s.to_vec()) else {
            return Ok(NodeState::Unsynced);
        };
        for id in shapes.into_iter().flatten() {
            self.apply_slot(ctx, id)?;
        }
        Ok(self.node_state(node))
    }

    /// Resolves the slot of `shape` and pushes the result to the backend.
    pub(crate) fn apply_slot(
        &mut self,
        ctx: &mut SyncContext<'_>,
        shape: ShapeId,
    ) -> BackendResult<()> {
        let Some(record) = self.shapes.get(shape).copied() else {
            return Ok(());
        };
        let resolved = self.resolve_slot(ctx, record.node, record.slot)?;
        let handle = record.handle;

        ctx.backend.set_shader(handle, resolved.shader)?;
        ctx.backend.set_volume_shader(handle, resolved.volume)?;
        ctx.backend
            .set_displacement(handle, resolved.displacement.as_ref())?;
        if let Some(displacement) = &resolved.displacement
            && !displacement.direct
        {
            ctx.backend
                .set_subdivision(handle, SubdivisionParams::from(displacement))?;
        }
        ctx.backend.set_shadow_flags(handle, resolved.shadow)?;

        let record = &mut self.shapes[shape];
        record.shadow = resolved.shadow;
        record.direct_displacement = resolved.displacement.is_some_and(|d| d.direct);
        Ok(())
    }

    fn resolve_slot(
        &mut self,
        ctx: &mut SyncContext<'_>,
        node: NodeRef,
        slot: MaterialSlot,
    ) -> BackendResult<SlotResolution> {
        let id = match slot {
            MaterialSlot::Unassigned => {
                let color = ctx.host.wireframe_color(node);
                return Ok(SlotResolution::flat(self.wire_shader(ctx.backend, color)?));
            }
            MaterialSlot::Disabled => {
                let color = self.settings.disabled_color;
                let shader = shared_flat_shader(&mut self.disabled_shader, ctx.backend, color)?;
                return Ok(SlotResolution::flat(shader));
            }
            MaterialSlot::Assigned(id) => id,
        };

        let Some(material) = self.materials.material_ref(id) else {
            log::warn!("node {node:?} references a retired material id");
            let color = self.settings.error_color;
            let shader = shared_flat_shader(&mut self.error_shader, ctx.backend, color)?;
            return Ok(SlotResolution::flat(shader));
        };

        let shader = match self.materials.shader(id, ctx.backend, ctx.parser, ctx.time) {
            Some(shader) => shader,
            None => {
                log::warn!("material {material:?} produced no shader; using the error shader");
                let color = self.settings.error_color;
                shared_flat_shader(&mut self.error_shader, ctx.backend, color)?
            }
        };
        let shadow = shadow_flags(ctx.host, material, ctx.time);
        let displacement = self
            .materials
            .displacement(id, ctx.backend, ctx.parser, ctx.time);
        let volume = self
            .materials
            .volume_shader(id, ctx.backend, ctx.parser, ctx.time);

        Ok(SlotResolution {
            shader,
            volume,
            displacement,
            shadow,
        })
    }

    fn wire_shader(
        &mut self,
        backend: &mut dyn SceneBackend,
        rgb: [u8; 3],
    ) -> BackendResult<ShaderHandle> {
        if let Some(&shader) = self.wire_shaders.get(&rgb) {
            return Ok(shader);
        }
        let shader = backend.create_flat_shader(Color::from_rgb8(rgb))?;
        self.wire_shaders.insert(rgb, shader);
        Ok(shader)
    }

    /// Resolves which material slots `node` needs.
    ///
    /// A multi-material container starts being tracked in the expansion
    /// table the first time it is observed here; later structural edits are
    /// detected against that snapshot by [`Synchronizer::update_material`].
    pub(crate) fn slot_table(&mut self, host: &dyn HostScene, node: NodeRef) -> SlotTable {
        let Some(material) = host.node_material(node) else {
            return SlotTable {
                material: None,
                multi: false,
                slots: smallvec![MaterialSlot::Unassigned],
            };
        };

        let id = self.materials.register(material);
        if !host.is_multi_material(material) {
            return SlotTable {
                material: Some(id),
                multi: false,
                slots: smallvec![MaterialSlot::Assigned(id)],
            };
        }

        let expansion = self.materials.observe_expansion(host, material);
        if self.materials.expansion(id).is_none() {
            self.materials.replace_expansion(id, expansion.clone());
        }
        let slots = if expansion.is_empty() {
            smallvec![MaterialSlot::Unassigned]
        } else {
            expansion.into_iter().collect()
        };
        SlotTable {
            material: Some(id),
            multi: true,
            slots,
        }
    }
}

fn shared_flat_shader(
    cached: &mut Option<ShaderHandle>,
    backend: &mut dyn SceneBackend,
    color: Color,
) -> BackendResult<ShaderHandle> {
    if let Some(shader) = *cached {
        return Ok(shader);
    }
    let shader = backend.create_flat_shader(color)?;
    *cached = Some(shader);
    Ok(shader)
}

/// Shadow flags of a material.
///
/// Only material classes the bridge knows expose the flags; anything else
/// casts shadows and is not a catcher.
pub(crate) fn shadow_flags(host: &dyn HostScene, material: MaterialRef, time: TimeValue) -> ShadowFlags {
    let class = host.material_class(material);
    let catcher_default = if class == ClassId::SHADOW_CATCHER {
        true
    } else if class == ClassId::PBR_MATERIAL || class == ClassId::UBER_MATERIAL {
        false
    } else {
        return ShadowFlags::default();
    };

    let casts = host
        .param_bool(material, ParamId::CASTS_SHADOWS, time)
        .unwrap_or(true);
    let catcher = host
        .param_bool(material, ParamId::SHADOW_CATCHER, time)
        .unwrap_or(catcher_default);

    let mut flags = ShadowFlags::empty();
    flags.set(ShadowFlags::CASTS_SHADOWS, casts);
    flags.set(ShadowFlags::SHADOW_CATCHER, catcher);
    flags
}
