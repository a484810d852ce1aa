//! Material / Shader Cache
//!
//! Memoizes shader construction per material and keeps the reverse index
//! from materials to the shapes that use them.
//!
//! Host materials are identified by [`MaterialRef`], an identity the bridge
//! does not control. The first time a reference is observed the cache
//! allocates a generation-tagged [`MaterialId`]; every other table is keyed by
//! that id. Forgetting a material releases its id, so a host identity reused
//! later maps to a fresh id and can never hit a stale entry.
//!
//! Backend objects (surface shader, volume shader, displacement map) are
//! cached per id and released together when the last shape using the
//! material goes away. The id registry itself only shrinks when a material
//! is forgotten or the cache is cleared; ids are small and a host scene
//! references a bounded set of materials.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use prism_core::backend::SceneBackend;
use prism_core::host::{HostScene, MaterialParser};
use prism_core::ids::{
    MaterialId, MaterialRef, ShaderHandle, ShapeId, TimeValue, VolumeShaderHandle,
};
use prism_core::material::{Displacement, MaterialSlot};

#[derive(Default)]
pub struct MaterialCache {
    registry: SlotMap<MaterialId, MaterialRef>,
    lookup: FxHashMap<MaterialRef, MaterialId>,

    shaders: FxHashMap<MaterialId, ShaderHandle>,
    // `None` caches "this material has no volume".
    volumes: FxHashMap<MaterialId, Option<VolumeShaderHandle>>,
    displacements: FxHashMap<MaterialId, Option<Displacement>>,
    emissive: FxHashSet<MaterialId>,

    users: FxHashMap<MaterialId, FxHashSet<ShapeId>>,
    expansions: FxHashMap<MaterialId, Vec<MaterialSlot>>,
}

impl MaterialCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Returns the id of `material`, allocating one on first sight.
    pub fn register(&mut self, material: MaterialRef) -> MaterialId {
        if let Some(&id) = self.lookup.get(&material) {
            return id;
        }
        let id = self.registry.insert(material);
        self.lookup.insert(material, id);
        id
    }

    #[inline]
    #[must_use]
    pub fn lookup(&self, material: MaterialRef) -> Option<MaterialId> {
        self.lookup.get(&material).copied()
    }

    #[inline]
    #[must_use]
    pub fn material_ref(&self, id: MaterialId) -> Option<MaterialRef> {
        self.registry.get(id).copied()
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// Returns the cached surface shader of `id`, building it on a miss.
    ///
    /// A parser miss is not cached; the next resolution asks again.
    pub fn shader(
        &mut self,
        id: MaterialId,
        backend: &mut dyn SceneBackend,
        parser: &mut dyn MaterialParser,
        time: TimeValue,
    ) -> Option<ShaderHandle> {
        if let Some(&shader) = self.shaders.get(&id) {
            return Some(shader);
        }
        let material = self.material_ref(id)?;
        let build = parser.create_shader(backend, material, time)?;
        self.shaders.insert(id, build.shader);
        if build.emissive {
            self.emissive.insert(id);
        } else {
            self.emissive.remove(&id);
        }
        Some(build.shader)
    }

    /// Returns the cached volume shader of `id`, building it on a miss.
    pub fn volume_shader(
        &mut self,
        id: MaterialId,
        backend: &mut dyn SceneBackend,
        parser: &mut dyn MaterialParser,
        time: TimeValue,
    ) -> Option<VolumeShaderHandle> {
        if let Some(&volume) = self.volumes.get(&id) {
            return volume;
        }
        let material = self.material_ref(id)?;
        let volume = parser.create_volume_shader(backend, material, time);
        self.volumes.insert(id, volume);
        volume
    }

    /// Returns the cached displacement of `id`, resolving it on a miss.
    ///
    /// The displacement map belongs to the cache and is released on
    /// eviction.
    pub fn displacement(
        &mut self,
        id: MaterialId,
        backend: &mut dyn SceneBackend,
        parser: &mut dyn MaterialParser,
        time: TimeValue,
    ) -> Option<Displacement> {
        if let Some(&displacement) = self.displacements.get(&id) {
            return displacement;
        }
        let material = self.material_ref(id)?;
        let displacement = parser.displacement(backend, material, time);
        self.displacements.insert(id, displacement);
        displacement
    }

    #[inline]
    #[must_use]
    pub fn cached_shader(&self, id: MaterialId) -> Option<ShaderHandle> {
        self.shaders.get(&id).copied()
    }

    #[inline]
    #[must_use]
    pub fn is_emissive(&self, id: MaterialId) -> bool {
        self.emissive.contains(&id)
    }

    #[inline]
    #[must_use]
    pub fn emissive_count(&self) -> usize {
        self.emissive.len()
    }

    /// Drops and releases every backend object cached for `id`.
    pub fn evict(&mut self, id: MaterialId, backend: &mut dyn SceneBackend) {
        if let Some(shader) = self.shaders.remove(&id) {
            backend.release_shader(shader);
        }
        if let Some(Some(volume)) = self.volumes.remove(&id) {
            backend.release_volume_shader(volume);
        }
        if let Some(Some(displacement)) = self.displacements.remove(&id) {
            backend.release_shader(displacement.map);
        }
        self.emissive.remove(&id);
    }

    // ========================================================================
    // Reverse index
    // ========================================================================

    pub fn add_user(&mut self, id: MaterialId, shape: ShapeId) {
        self.users.entry(id).or_default().insert(shape);
    }

    /// Removes `shape` from the users of `id`.
    ///
    /// When the user set becomes empty the cached shaders are evicted.
    pub fn remove_user(&mut self, id: MaterialId, shape: ShapeId, backend: &mut dyn SceneBackend) {
        let Some(set) = self.users.get_mut(&id) else {
            return;
        };
        set.remove(&shape);
        if set.is_empty() {
            self.users.remove(&id);
            self.evict(id, backend);
        }
    }

    /// Shapes currently assigned `id`, in no particular order.
    pub fn users(&self, id: MaterialId) -> impl Iterator<Item = ShapeId> + '_ {
        self.users.get(&id).into_iter().flatten().copied()
    }

    #[inline]
    #[must_use]
    pub fn user_count(&self, id: MaterialId) -> usize {
        self.users.get(&id).map_or(0, FxHashSet::len)
    }

    // ========================================================================
    // Multi-material expansion
    // ========================================================================

    /// Reads the current sub-material slots of a multi-material container.
    ///
    /// Empty slots are `Unassigned`, switched-off slots are `Disabled`.
    pub fn observe_expansion(
        &mut self,
        host: &dyn HostScene,
        container: MaterialRef,
    ) -> Vec<MaterialSlot> {
        (0..host.submaterial_count(container))
            .map(|slot| {
                if !host.submaterial_enabled(container, slot) {
                    return MaterialSlot::Disabled;
                }
                match host.submaterial(container, slot) {
                    Some(sub) => MaterialSlot::Assigned(self.register(sub)),
                    None => MaterialSlot::Unassigned,
                }
            })
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn expansion(&self, id: MaterialId) -> Option<&[MaterialSlot]> {
        self.expansions.get(&id).map(Vec::as_slice)
    }

    /// Stores a new expansion, returning the previous one.
    pub fn replace_expansion(
        &mut self,
        id: MaterialId,
        slots: Vec<MaterialSlot>,
    ) -> Option<Vec<MaterialSlot>> {
        self.expansions.insert(id, slots)
    }

    pub fn take_expansion(&mut self, id: MaterialId) -> Option<Vec<MaterialSlot>> {
        self.expansions.remove(&id)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Forgets `id` entirely: caches, users, expansion and the id itself.
    ///
    /// Returns the shapes that were still using the material.
    pub fn forget(&mut self, id: MaterialId, backend: &mut dyn SceneBackend) -> Vec<ShapeId> {
        self.evict(id, backend);
        self.expansions.remove(&id);
        let users = self
            .users
            .remove(&id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        if let Some(material) = self.registry.remove(id) {
            self.lookup.remove(&material);
        }
        users
    }

    /// Releases every cached shader and drops all tables.
    pub fn clear(&mut self, backend: &mut dyn SceneBackend) {
        for (_, shader) in self.shaders.drain() {
            backend.release_shader(shader);
        }
        for volume in self.volumes.drain().filter_map(|(_, v)| v) {
            backend.release_volume_shader(volume);
        }
        for displacement in self.displacements.drain().filter_map(|(_, d)| d) {
            backend.release_shader(displacement.map);
        }
        self.emissive.clear();
        self.users.clear();
        self.expansions.clear();
        self.registry.clear();
        self.lookup.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_stable_until_forgotten() {
        let mut cache = MaterialCache::new();
        let a = cache.register(MaterialRef(7));
        assert_eq!(cache.register(MaterialRef(7)), a);
        assert_eq!(cache.material_ref(a), Some(MaterialRef(7)));

        // Forgetting needs a backend only for releases; none are cached here.
        cache.registry.remove(a);
        cache.lookup.remove(&MaterialRef(7));

        let b = cache.register(MaterialRef(7));
        assert_ne!(a, b, "a reused host identity gets a fresh generation");
        assert_eq!(cache.material_ref(a), None);
    }

    #[test]
    fn user_index_tracks_membership() {
        let mut cache = MaterialCache::new();
        let id = cache.register(MaterialRef(1));
        let mut shapes: SlotMap<ShapeId, ()> = SlotMap::with_key();
        let s1 = shapes.insert(());
        let s2 = shapes.insert(());

        cache.add_user(id, s1);
        cache.add_user(id, s2);
        cache.add_user(id, s1);
        assert_eq!(cache.user_count(id), 2);

        let mut users: Vec<_> = cache.users(id).collect();
        users.sort();
        let mut expected = vec![s1, s2];
        expected.sort();
        assert_eq!(users, expected);
    }
}
