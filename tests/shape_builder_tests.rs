//! Shape Builder Tests
//!
//! Tests for:
//! - Material id to slot mapping (modulo wrap)
//! - Per-slot packing: placeholders, compaction, normals, scale
//! - Faces with out-of-range indices
//! - Backend shape creation through ShapeBuilder

use std::borrow::Cow;

use glam::{Vec2, Vec3};
use prism::mesh::{EvaluatedMesh, MeshData, UvChannel};
use prism::shape_builder::{
    BuildOptions, GeometryBuild, ShapeBuilder, SubmeshBuffers, ensure_normals, pack_submeshes,
    slot_for_material_id,
};
use prism_dev_utils::{RecordingBackend, triangles};

fn pack(mesh: &MeshData, slot_count: usize, options: BuildOptions) -> Vec<Option<SubmeshBuffers>> {
    let mesh = ensure_normals(Cow::Borrowed(mesh));
    let normals = mesh.normals.clone().expect("normals attached");
    pack_submeshes(&mesh, &normals, slot_count, options)
}

// ============================================================================
// Slot Mapping
// ============================================================================

#[test]
fn material_id_wraps_modulo_slot_count() {
    assert_eq!(slot_for_material_id(5, 3), 2);
    assert_eq!(slot_for_material_id(2, 3), 2);
    assert_eq!(slot_for_material_id(3, 3), 0);
}

#[test]
fn single_slot_takes_every_face() {
    assert_eq!(slot_for_material_id(17, 1), 0);
    // A zero slot count behaves like a single slot
    assert_eq!(slot_for_material_id(17, 0), 0);
}

#[test]
fn face_with_id_five_lands_in_slot_two_of_three() {
    let packed = pack(&triangles(&[5]), 3, BuildOptions::default());

    assert_eq!(packed.len(), 3);
    assert!(packed[0].is_none());
    assert!(packed[1].is_none());
    assert_eq!(packed[2].as_ref().unwrap().face_count(), 1);
}

// ============================================================================
// Packing
// ============================================================================

#[test]
fn output_has_one_entry_per_slot_with_placeholders() {
    let packed = pack(&triangles(&[0, 2, 2]), 4, BuildOptions::default());

    assert_eq!(packed.len(), 4);
    assert_eq!(packed[0].as_ref().unwrap().face_count(), 1);
    assert!(packed[1].is_none());
    assert_eq!(packed[2].as_ref().unwrap().face_count(), 2);
    assert!(packed[3].is_none());
}

#[test]
fn slot_buffers_are_compacted() {
    let packed = pack(&triangles(&[0, 1]), 2, BuildOptions::default());
    let second = packed[1].as_ref().unwrap();

    // Only the three vertices of the second triangle are copied
    assert_eq!(second.positions.len(), 3);
    assert_eq!(second.vertex_indices, vec![0, 1, 2]);
    assert_eq!(second.positions[0], Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(second.face_vertex_counts, vec![3]);
}

#[test]
fn missing_normals_are_computed() {
    let mesh = triangles(&[0]);
    assert!(!mesh.has_normals());

    let packed = pack(&mesh, 1, BuildOptions::default());
    let buffers = packed[0].as_ref().unwrap();

    assert_eq!(buffers.normal_indices.len(), 3);
    for n in &buffers.normals {
        assert!((n.z - 1.0).abs() < 1e-5);
    }
}

#[test]
fn ensure_normals_keeps_borrowed_mesh_with_normals() {
    let mut mesh = triangles(&[0]);
    mesh.compute_vertex_normals();

    let result = ensure_normals(Cow::Borrowed(&mesh));
    assert!(matches!(result, Cow::Borrowed(_)));
}

#[test]
fn positions_are_scaled() {
    let options = BuildOptions {
        scale: 0.01,
        flip_winding: false,
    };
    let packed = pack(&triangles(&[0]), 1, options);
    let buffers = packed[0].as_ref().unwrap();

    assert!((buffers.positions[1].x - 0.01).abs() < 1e-7);
}

#[test]
fn uvs_follow_their_own_indices() {
    let mesh = triangles(&[0, 1]).with_uvs(UvChannel {
        uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
        faces: vec![[0, 1, 2], [2, 2, 2]],
    });
    let packed = pack(&mesh, 2, BuildOptions::default());

    let first = packed[0].as_ref().unwrap();
    assert_eq!(first.uvs.as_ref().unwrap().len(), 3);
    assert_eq!(first.uv_indices.as_deref(), Some(&[0, 1, 2][..]));

    let second = packed[1].as_ref().unwrap();
    assert_eq!(second.uvs.as_deref(), Some(&[Vec2::Y][..]));
    assert_eq!(second.uv_indices.as_deref(), Some(&[0, 0, 0][..]));
}

#[test]
fn mesh_without_uvs_packs_none() {
    let packed = pack(&triangles(&[0]), 1, BuildOptions::default());
    let buffers = packed[0].as_ref().unwrap();

    assert!(buffers.uvs.is_none());
    assert!(buffers.uv_indices.is_none());
}

#[test]
fn faces_with_out_of_range_positions_are_skipped() {
    let mut mesh = triangles(&[0, 1]);
    mesh.faces[1].verts = [3, 4, 99];

    let packed = pack(&mesh, 2, BuildOptions::default());

    assert_eq!(packed[0].as_ref().unwrap().face_count(), 1);
    assert!(packed[1].is_none());
}

#[test]
fn faces_with_out_of_range_uvs_are_skipped() {
    let mesh = triangles(&[0, 0]).with_uvs(UvChannel {
        uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
        faces: vec![[0, 1, 2], [0, 1, 3]],
    });

    let packed = pack(&mesh, 1, BuildOptions::default());
    let buffers = packed[0].as_ref().unwrap();

    assert_eq!(buffers.face_count(), 1);
    assert_eq!(buffers.positions.len(), 3);
    assert_eq!(buffers.uv_indices.as_deref(), Some(&[0, 1, 2][..]));
}

// ============================================================================
// Backend Shapes
// ============================================================================

#[test]
fn build_creates_one_shape_per_non_empty_slot() {
    let mut backend = RecordingBackend::new();
    let mesh = EvaluatedMesh::owned(triangles(&[0, 2]));

    let GeometryBuild::Shapes(built) =
        ShapeBuilder::build(&mut backend, mesh, 3, BuildOptions::default()).unwrap()
    else {
        panic!("expected shapes");
    };

    assert_eq!(built.slots.len(), 3);
    assert!(built.slots[0].is_some());
    assert!(built.slots[1].is_none());
    assert!(built.slots[2].is_some());
    assert_eq!(built.face_count, 2);
    assert_eq!(backend.counters().create_shape, 2);

    let state = backend.shape(built.slots[2].unwrap()).unwrap();
    assert_eq!(state.face_count, 1);
    assert!(!state.attached);
}

#[test]
fn build_of_empty_mesh_creates_nothing() {
    let mut backend = RecordingBackend::new();
    let mesh = EvaluatedMesh::owned(MeshData::default());

    let result = ShapeBuilder::build(&mut backend, mesh, 2, BuildOptions::default()).unwrap();

    assert_eq!(result, GeometryBuild::NoGeometry);
    assert_eq!(backend.counters().create_shape, 0);
}

#[test]
fn build_of_mesh_with_only_malformed_faces_creates_nothing() {
    let mut backend = RecordingBackend::new();
    let mut mesh = triangles(&[0]);
    mesh.faces[0].verts = [0, 1, 7];

    let result = ShapeBuilder::build(
        &mut backend,
        EvaluatedMesh::owned(mesh),
        1,
        BuildOptions::default(),
    )
    .unwrap();

    assert_eq!(result, GeometryBuild::NoGeometry);
    assert_eq!(backend.counters().create_shape, 0);
}

#[test]
fn build_reports_fast_face_count() {
    let mut backend = RecordingBackend::new();
    let mesh = EvaluatedMesh::owned(triangles(&[0, 0])).with_fast_face_count(42);

    let GeometryBuild::Shapes(built) =
        ShapeBuilder::build(&mut backend, mesh, 1, BuildOptions::default()).unwrap()
    else {
        panic!("expected shapes");
    };
    assert_eq!(built.face_count, 42);
}

#[test]
fn build_propagates_backend_failure() {
    let mut backend = RecordingBackend::new();
    backend.fail_on("create_shape", -12);
    let mesh = EvaluatedMesh::owned(triangles(&[0, 1]));

    let err = ShapeBuilder::build(&mut backend, mesh, 2, BuildOptions::default()).unwrap_err();

    assert_eq!(err.op, "create_shape");
    assert_eq!(err.code, -12);
    assert_eq!(backend.live_shape_count(), 0);
}
