//! Shape Builder
//!
//! Converts one evaluated host mesh into backend shapes, one per material slot.
//!
//! # Slot partitioning
//!
//! Faces are assigned to slot `material_id % slot_count`. Out-of-range ids
//! wrap around rather than clamp: id 5 on a three-slot multi-material lands
//! in slot 2. The output always has exactly `slot_count` entries; a slot that
//! received no faces yields `None` so index `i` is always material slot `i`.
//!
//! # Winding
//!
//! When [`BuildOptions::flip_winding`] is set (mirrored node transform) the
//! first two corners of every triangle are swapped in all index buffers and
//! the U coordinate is mirrored (`u' = 1 - u`).
//!
//! # Malformed faces
//!
//! A face referencing a position, normal or UV outside its array is skipped
//! with a warning, the same way normal generation skips it. A mesh whose
//! faces are all skipped produces no geometry.

use std::borrow::Cow;

use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

use prism_core::backend::{BackendResult, SceneBackend, ShapeDesc};
use prism_core::ids::ShapeHandle;
use prism_core::mesh::{EvaluatedMesh, MeshData, NormalSet};

/// Packing options for one build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildOptions {
    /// Master scale applied to positions.
    pub scale: f32,
    /// Swap triangle winding and mirror U.
    pub flip_winding: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            flip_winding: false,
        }
    }
}

/// Compacted buffers of one material slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmeshBuffers {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Option<Vec<Vec2>>,
    pub vertex_indices: Vec<u32>,
    pub normal_indices: Vec<u32>,
    pub uv_indices: Option<Vec<u32>>,
    pub face_vertex_counts: Vec<u32>,
}

impl SubmeshBuffers {
    #[must_use]
    pub fn desc(&self) -> ShapeDesc<'_> {
        ShapeDesc {
            positions: &self.positions,
            normals: &self.normals,
            uvs: self.uvs.as_deref(),
            vertex_indices: &self.vertex_indices,
            normal_indices: &self.normal_indices,
            uv_indices: self.uv_indices.as_deref(),
            face_vertex_counts: &self.face_vertex_counts,
        }
    }

    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }
}

/// Maps source indices onto a compacted per-slot array.
#[derive(Default)]
struct Remap {
    lookup: FxHashMap<u32, u32>,
    order: Vec<u32>,
}

impl Remap {
    fn index(&mut self, source: u32) -> u32 {
        *self.lookup.entry(source).or_insert_with(|| {
            self.order.push(source);
            (self.order.len() - 1) as u32
        })
    }
}

#[derive(Default)]
struct SlotAccumulator {
    positions: Remap,
    normals: Remap,
    uvs: Remap,
    vertex_indices: Vec<u32>,
    normal_indices: Vec<u32>,
    uv_indices: Vec<u32>,
}

/// Which slot a face lands in.
#[inline]
#[must_use]
pub fn slot_for_material_id(material_id: u32, slot_count: usize) -> usize {
    (material_id as usize) % slot_count.max(1)
}

#[inline]
fn in_range(indices: [u32; 3], len: usize) -> bool {
    indices.iter().all(|&i| (i as usize) < len)
}

/// Partitions `mesh` by material slot and packs contiguous buffers per slot.
///
/// `normals` must cover every face of `mesh`.
#[must_use]
pub fn pack_submeshes(
    mesh: &MeshData,
    normals: &NormalSet,
    slot_count: usize,
    options: BuildOptions,
) -> Vec<Option<SubmeshBuffers>> {
    let slot_count = slot_count.max(1);
    assert_eq!(
        normals.faces.len(),
        mesh.faces.len(),
        "normal set must cover every face"
    );

    let uv_channel = mesh
        .uvs
        .as_ref()
        .filter(|uv| uv.faces.len() == mesh.faces.len());

    let mut slots: Vec<Option<SlotAccumulator>> = (0..slot_count).map(|_| None).collect();
    let mut skipped = 0usize;

    for (face_index, face) in mesh.faces.iter().enumerate() {
        let normal_face = normals.faces[face_index];
        let uv_face = uv_channel.map(|uv| uv.faces[face_index]);
        if !in_range(face.verts, mesh.positions.len())
            || !in_range(normal_face, normals.normals.len())
            || uv_face.is_some_and(|t| !in_range(t, uv_channel.map_or(0, |uv| uv.uvs.len())))
        {
            skipped += 1;
            continue;
        }

        let slot = slot_for_material_id(face.material_id, slot_count);
        let acc = slots[slot].get_or_insert_with(SlotAccumulator::default);

        let mut corners = [0usize, 1, 2];
        if options.flip_winding {
            corners.swap(0, 1);
        }

        for corner in corners {
            let v = acc.positions.index(face.verts[corner]);
            acc.vertex_indices.push(v);
            let n = acc.normals.index(normal_face[corner]);
            acc.normal_indices.push(n);
            if let Some(t) = uv_face {
                let t = acc.uvs.index(t[corner]);
                acc.uv_indices.push(t);
            }
        }
    }

    if skipped > 0 {
        log::warn!(
            "skipped {skipped} of {} face(s) with out-of-range indices",
            mesh.faces.len()
        );
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.map(|acc| {
                let face_count = acc.vertex_indices.len() / 3;
                let positions = acc
                    .positions
                    .order
                    .iter()
                    .map(|&i| mesh.positions[i as usize] * options.scale)
                    .collect();
                let normals = acc
                    .normals
                    .order
                    .iter()
                    .map(|&i| normals.normals[i as usize])
                    .collect();
                let uvs = uv_channel.map(|uv| {
                    acc.uvs
                        .order
                        .iter()
                        .map(|&i| {
                            let t = uv.uvs[i as usize];
                            if options.flip_winding {
                                Vec2::new(1.0 - t.x, t.y)
                            } else {
                                t
                            }
                        })
                        .collect()
                });

                SubmeshBuffers {
                    positions,
                    normals,
                    uvs,
                    vertex_indices: acc.vertex_indices,
                    normal_indices: acc.normal_indices,
                    uv_indices: uv_channel.map(|_| acc.uv_indices),
                    face_vertex_counts: vec![3; face_count],
                }
            })
        })
        .collect()
}

/// Attaches computed normals to the mesh when it carries none.
///
/// A borrowed mesh is copied first; the host's object is never mutated.
#[must_use]
pub fn ensure_normals(mesh: Cow<'_, MeshData>) -> Cow<'_, MeshData> {
    if mesh.has_normals() {
        return mesh;
    }
    let mut mesh = mesh;
    mesh.to_mut().compute_vertex_normals();
    mesh
}

/// Result of building the shapes of one mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryBuild {
    /// The mesh has no usable faces; the node stays unrepresented.
    NoGeometry,
    Shapes(BuiltShapes),
}

/// Backend shapes created for one mesh, indexed by material slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltShapes {
    pub slots: Vec<Option<ShapeHandle>>,
    /// Face count for statistics.
    pub face_count: usize,
}

/// Builds backend shapes for evaluated meshes.
pub struct ShapeBuilder;

impl ShapeBuilder {
    /// Packs `mesh` and creates one backend shape per non-empty slot.
    ///
    /// On a backend failure every shape already created by this call is
    /// destroyed before the error is returned.
    pub fn build(
        backend: &mut dyn SceneBackend,
        mesh: EvaluatedMesh<'_>,
        slot_count: usize,
        options: BuildOptions,
    ) -> BackendResult<GeometryBuild> {
        let face_count = mesh.face_count();
        if mesh.mesh.face_count() == 0 {
            return Ok(GeometryBuild::NoGeometry);
        }

        let data = ensure_normals(mesh.mesh);
        let Some(normals) = data.normals.as_ref() else {
            unreachable!("normals are attached by ensure_normals");
        };

        let packed = pack_submeshes(&data, normals, slot_count, options);
        if packed.iter().all(Option::is_none) {
            return Ok(GeometryBuild::NoGeometry);
        }
        let mut slots = Vec::with_capacity(packed.len());

        for buffers in &packed {
            let Some(buffers) = buffers else {
                slots.push(None);
                continue;
            };
            match backend.create_shape(&buffers.desc()) {
                Ok(handle) => slots.push(Some(handle)),
                Err(err) => {
                    for handle in slots.into_iter().flatten() {
                        backend.destroy_shape(handle);
                    }
                    return Err(err);
                }
            }
        }

        log::trace!(
            "built {} shape(s) for {} slot(s), {} face(s)",
            slots.iter().flatten().count(),
            slots.len(),
            face_count
        );

        Ok(GeometryBuild::Shapes(BuiltShapes { slots, face_count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::mesh::{Face, UvChannel};

    fn two_triangle_mesh(material_ids: [u32; 2]) -> MeshData {
        let mut mesh = MeshData::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            vec![
                Face::new([0, 1, 2], material_ids[0]),
                Face::new([0, 2, 3], material_ids[1]),
            ],
        );
        mesh.compute_vertex_normals();
        mesh
    }

    #[test]
    fn remap_is_dense_and_stable() {
        let mut remap = Remap::default();
        assert_eq!(remap.index(10), 0);
        assert_eq!(remap.index(4), 1);
        assert_eq!(remap.index(10), 0);
        assert_eq!(remap.order, vec![10, 4]);
    }

    #[test]
    fn single_slot_shares_vertices() {
        let mesh = two_triangle_mesh([0, 0]);
        let packed = pack_submeshes(
            &mesh,
            mesh.normals.as_ref().unwrap(),
            1,
            BuildOptions::default(),
        );
        let buffers = packed[0].as_ref().unwrap();
        assert_eq!(buffers.positions.len(), 4);
        assert_eq!(buffers.vertex_indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(buffers.face_vertex_counts, vec![3, 3]);
    }

    #[test]
    fn flip_swaps_first_two_corners_and_mirrors_u() {
        let mesh = two_triangle_mesh([0, 0]).with_uvs(UvChannel {
            uvs: vec![Vec2::new(0.25, 0.0), Vec2::new(1.0, 0.5)],
            faces: vec![[0, 1, 0], [1, 1, 0]],
        });
        let options = BuildOptions {
            scale: 2.0,
            flip_winding: true,
        };
        let packed = pack_submeshes(&mesh, mesh.normals.as_ref().unwrap(), 1, options);
        let buffers = packed[0].as_ref().unwrap();

        // [0,1,2] -> [1,0,2]; source vertex 1 is seen first
        assert_eq!(buffers.positions[0], Vec3::X * 2.0);
        assert_eq!(buffers.vertex_indices[..3], [0, 1, 2]);

        let uvs = buffers.uvs.as_ref().unwrap();
        assert!(uvs.contains(&Vec2::new(0.75, 0.0)));
        assert!(uvs.contains(&Vec2::new(0.0, 0.5)));
    }
}
