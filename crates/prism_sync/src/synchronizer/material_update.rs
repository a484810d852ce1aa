//! Propagation of material edits.
//!
//! Structural edits of a multi-material (sub-material count, slot bindings,
//! becoming or ceasing to be a container) change how many shapes its users
//! need and queue those nodes for rebuild. Every other edit re-resolves the
//! material's current users in place, which is the path taken by ordinary
//! parameter tweaks during interactive preview.

use prism_core::backend::BackendResult;
use prism_core::ids::{MaterialId, MaterialRef, NodeRef};
use prism_core::material::MaterialSlot;

use super::{SyncContext, Synchronizer};

/// What an edit of one material caused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialUpdate {
    /// Nodes newly queued for full rebuild.
    pub rebuild: Vec<NodeRef>,
    /// Shapes re-resolved in place.
    pub updated_in_place: usize,
}

impl MaterialUpdate {
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !self.rebuild.is_empty()
    }
}

impl Synchronizer {
    /// Handles an edit of `material`.
    ///
    /// The cached shaders of the material are always evicted first. A
    /// material the synchronizer has never observed has no users and is
    /// ignored.
    pub fn update_material(
        &mut self,
        ctx: &mut SyncContext<'_>,
        material: MaterialRef,
    ) -> BackendResult<MaterialUpdate> {
        let Some(id) = self.materials.lookup(material) else {
            return Ok(MaterialUpdate::default());
        };

        self.materials.evict(id, ctx.backend);

        let mut update = MaterialUpdate::default();

        if ctx.host.is_multi_material(material) {
            let current = self.materials.observe_expansion(ctx.host, material);
            let previous = self.materials.replace_expansion(id, current.clone());

            match previous {
                Some(previous) if previous.len() != current.len() => {
                    log::debug!(
                        "multi-material {material:?}: {} -> {} slot(s)",
                        previous.len(),
                        current.len()
                    );
                    for slot in &previous {
                        self.queue_slot_users(id, *slot, &mut update.rebuild);
                    }
                    self.queue_nodes(self.container_nodes(id), &mut update.rebuild);
                }
                Some(previous) => {
                    for (old, new) in previous.iter().zip(&current) {
                        if old != new {
                            self.queue_slot_users(id, *old, &mut update.rebuild);
                        }
                    }
                }
                None => {
                    log::debug!("material {material:?} became a multi-material");
                    self.queue_nodes(self.user_nodes(id), &mut update.rebuild);
                }
            }
            // Nodes queued above re-observe the container when rebuilt.
            self.drop_unused_expansion(id);
        } else if let Some(previous) = self.materials.take_expansion(id) {
            log::debug!("material {material:?} is no longer a multi-material");
            for slot in &previous {
                self.queue_slot_users(id, *slot, &mut update.rebuild);
            }
            self.queue_nodes(self.container_nodes(id), &mut update.rebuild);
        } else {
            let users: Vec<_> = self.materials.users(id).collect();
            for shape in users {
                self.apply_slot(ctx, shape)?;
                update.updated_in_place += 1;
            }
        }

        Ok(update)
    }

    /// Queues the nodes affected by a change of one container slot.
    ///
    /// Users of the sub-material that used to be bound are queued. An empty
    /// or disabled slot has no users of its own, so the container's nodes
    /// are queued instead.
    fn queue_slot_users(&mut self, container: MaterialId, slot: MaterialSlot, out: &mut Vec<NodeRef>) {
        let nodes = match slot {
            MaterialSlot::Assigned(sub) => self.user_nodes(sub),
            MaterialSlot::Unassigned | MaterialSlot::Disabled => self.container_nodes(container),
        };
        self.queue_nodes(nodes, out);
    }

    fn queue_nodes(&mut self, nodes: Vec<NodeRef>, out: &mut Vec<NodeRef>) {
        for node in nodes {
            if self.queue_rebuild(node) {
                out.push(node);
            }
        }
    }
}
