//! In-memory host scene.

use std::cell::Cell;

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use prism_core::host::HostScene;
use prism_core::ids::{MaterialRef, NodeRef, TimeValue};
use prism_core::material::{ClassId, ParamId};
use prism_core::mesh::{EvaluatedMesh, Face, MeshData};

#[derive(Debug, Clone)]
struct MockNode {
    mesh: Option<MeshData>,
    fast_face_count: Option<usize>,
    transform: Mat4,
    material: Option<MaterialRef>,
    wireframe: [u8; 3],
    visible: bool,
    name: String,
}

#[derive(Debug, Clone)]
struct MockMaterial {
    class: ClassId,
    submaterials: Vec<Option<MaterialRef>>,
    enabled: Vec<bool>,
    params: FxHashMap<ParamId, bool>,
}

impl MockMaterial {
    fn new(class: ClassId) -> Self {
        Self {
            class,
            submaterials: Vec::new(),
            enabled: Vec::new(),
            params: FxHashMap::default(),
        }
    }
}

/// Host scene graph held in memory. Handles are allocated sequentially.
#[derive(Debug, Default)]
pub struct MockHost {
    nodes: FxHashMap<NodeRef, MockNode>,
    materials: FxHashMap<MaterialRef, MockMaterial>,
    next_id: u64,
    evaluations: Cell<usize>,
}

impl MockHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // --- Nodes ---

    pub fn add_node(&mut self, mesh: MeshData) -> NodeRef {
        let node = NodeRef(self.next());
        self.nodes.insert(
            node,
            MockNode {
                mesh: Some(mesh),
                fast_face_count: None,
                transform: Mat4::IDENTITY,
                material: None,
                wireframe: [128, 128, 128],
                visible: true,
                name: format!("Node{:03}", node.0),
            },
        );
        node
    }

    /// A node whose object has no renderable mesh (a helper, a light).
    pub fn add_empty_node(&mut self) -> NodeRef {
        let node = self.add_node(MeshData::default());
        self.node_mut(node).mesh = None;
        node
    }

    pub fn remove_node(&mut self, node: NodeRef) {
        self.nodes.remove(&node);
    }

    pub fn set_mesh(&mut self, node: NodeRef, mesh: MeshData) {
        self.node_mut(node).mesh = Some(mesh);
    }

    pub fn set_fast_face_count(&mut self, node: NodeRef, count: usize) {
        self.node_mut(node).fast_face_count = Some(count);
    }

    pub fn set_transform(&mut self, node: NodeRef, transform: Mat4) {
        self.node_mut(node).transform = transform;
    }

    pub fn set_material(&mut self, node: NodeRef, material: Option<MaterialRef>) {
        self.node_mut(node).material = material;
    }

    pub fn set_visible(&mut self, node: NodeRef, visible: bool) {
        self.node_mut(node).visible = visible;
    }

    pub fn set_wireframe_color(&mut self, node: NodeRef, rgb: [u8; 3]) {
        self.node_mut(node).wireframe = rgb;
    }

    /// Number of `evaluate_mesh` calls that returned a mesh.
    #[must_use]
    pub fn mesh_evaluations(&self) -> usize {
        self.evaluations.get()
    }

    fn node_mut(&mut self, node: NodeRef) -> &mut MockNode {
        self.nodes
            .get_mut(&node)
            .unwrap_or_else(|| panic!("unknown node {node:?}"))
    }

    // --- Materials ---

    pub fn add_material(&mut self, class: ClassId) -> MaterialRef {
        let material = MaterialRef(self.next());
        self.materials.insert(material, MockMaterial::new(class));
        material
    }

    pub fn add_multi_material(&mut self, submaterials: &[Option<MaterialRef>]) -> MaterialRef {
        let material = self.add_material(ClassId::MULTI_MATERIAL);
        self.set_submaterials(material, submaterials);
        material
    }

    /// Replaces the sub-material slots; every slot is enabled.
    pub fn set_submaterials(&mut self, material: MaterialRef, submaterials: &[Option<MaterialRef>]) {
        let entry = self.material_mut(material);
        entry.submaterials = submaterials.to_vec();
        entry.enabled = vec![true; submaterials.len()];
    }

    pub fn set_submaterial(&mut self, material: MaterialRef, slot: usize, sub: Option<MaterialRef>) {
        self.material_mut(material).submaterials[slot] = sub;
    }

    pub fn set_submaterial_enabled(&mut self, material: MaterialRef, slot: usize, enabled: bool) {
        self.material_mut(material).enabled[slot] = enabled;
    }

    pub fn set_class(&mut self, material: MaterialRef, class: ClassId) {
        self.material_mut(material).class = class;
    }

    pub fn set_param(&mut self, material: MaterialRef, param: ParamId, value: bool) {
        self.material_mut(material).params.insert(param, value);
    }

    pub fn remove_material(&mut self, material: MaterialRef) {
        self.materials.remove(&material);
        for node in self.nodes.values_mut() {
            if node.material == Some(material) {
                node.material = None;
            }
        }
    }

    fn material_mut(&mut self, material: MaterialRef) -> &mut MockMaterial {
        self.materials
            .get_mut(&material)
            .unwrap_or_else(|| panic!("unknown material {material:?}"))
    }
}

impl HostScene for MockHost {
    fn evaluate_mesh(&self, node: NodeRef, _time: TimeValue) -> Option<EvaluatedMesh<'_>> {
        let entry = self.nodes.get(&node)?;
        let mesh = entry.mesh.as_ref()?;
        self.evaluations.set(self.evaluations.get() + 1);
        let evaluated = EvaluatedMesh::borrowed(mesh);
        Some(match entry.fast_face_count {
            Some(count) => evaluated.with_fast_face_count(count),
            None => evaluated,
        })
    }

    fn world_transform(&self, node: NodeRef, _time: TimeValue) -> Mat4 {
        self.nodes.get(&node).map_or(Mat4::IDENTITY, |n| n.transform)
    }

    fn node_material(&self, node: NodeRef) -> Option<MaterialRef> {
        self.nodes.get(&node)?.material
    }

    fn wireframe_color(&self, node: NodeRef) -> [u8; 3] {
        self.nodes.get(&node).map_or([0; 3], |n| n.wireframe)
    }

    fn is_visible(&self, node: NodeRef, _time: TimeValue) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.visible)
    }

    fn node_name(&self, node: NodeRef) -> String {
        self.nodes
            .get(&node)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    fn material_class(&self, material: MaterialRef) -> ClassId {
        self.materials
            .get(&material)
            .map_or(ClassId(0, 0), |m| m.class)
    }

    fn submaterial_count(&self, material: MaterialRef) -> usize {
        self.materials
            .get(&material)
            .map_or(0, |m| m.submaterials.len())
    }

    fn submaterial(&self, material: MaterialRef, slot: usize) -> Option<MaterialRef> {
        *self.materials.get(&material)?.submaterials.get(slot)?
    }

    fn submaterial_enabled(&self, material: MaterialRef, slot: usize) -> bool {
        self.materials
            .get(&material)
            .and_then(|m| m.enabled.get(slot).copied())
            .unwrap_or(false)
    }

    fn param_bool(&self, material: MaterialRef, param: ParamId, _time: TimeValue) -> Option<bool> {
        self.materials.get(&material)?.params.get(&param).copied()
    }
}

// ============================================================================
// Geometry helpers
// ============================================================================

/// One separate triangle per entry of `material_ids`, without normals.
///
/// Triangle `i` sits at `x = i` in the XY plane.
#[must_use]
pub fn triangles(material_ids: &[u32]) -> MeshData {
    let mut positions = Vec::with_capacity(material_ids.len() * 3);
    let mut faces = Vec::with_capacity(material_ids.len());
    for (i, &material_id) in material_ids.iter().enumerate() {
        let x = i as f32;
        let base = positions.len() as u32;
        positions.extend([
            Vec3::new(x, 0.0, 0.0),
            Vec3::new(x + 1.0, 0.0, 0.0),
            Vec3::new(x, 1.0, 0.0),
        ]);
        faces.push(Face::new([base, base + 1, base + 2], material_id));
    }
    MeshData::new(positions, faces)
}
