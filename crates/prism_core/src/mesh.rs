//! Triangle mesh data as evaluated by the host.
//!
//! Positions, normals and texture coordinates are indexed independently (each
//! face carries its own corner indices into each array), matching how DCC
//! applications store split normals and UV seams.

use std::borrow::Cow;

use glam::{Vec2, Vec3};

/// A triangle with its material id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub verts: [u32; 3],
    /// Raw material id; mapped onto a slot with `material_id % slot_count`.
    pub material_id: u32,
}

impl Face {
    #[inline]
    #[must_use]
    pub fn new(verts: [u32; 3], material_id: u32) -> Self {
        Self { verts, material_id }
    }
}

/// Explicit normals with per-face corner indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalSet {
    pub normals: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

/// One texture coordinate channel with per-face corner indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UvChannel {
    pub uvs: Vec<Vec2>,
    pub faces: Vec<[u32; 3]>,
}

/// Renderable triangle mesh snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub normals: Option<NormalSet>,
    pub uvs: Option<UvChannel>,
}

impl MeshData {
    #[must_use]
    pub fn new(positions: Vec<Vec3>, faces: Vec<Face>) -> Self {
        Self {
            positions,
            faces,
            normals: None,
            uvs: None,
        }
    }

    #[must_use]
    pub fn with_uvs(mut self, uvs: UvChannel) -> Self {
        self.uvs = Some(uvs);
        self
    }

    #[must_use]
    pub fn with_normals(mut self, normals: NormalSet) -> Self {
        self.normals = Some(normals);
        self
    }

    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    #[must_use]
    pub fn has_normals(&self) -> bool {
        self.normals
            .as_ref()
            .is_some_and(|n| n.faces.len() == self.faces.len())
    }

    /// Computes smooth area-weighted vertex normals.
    ///
    /// The resulting normal set shares the position indices of each face.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        let count = self.positions.len();

        for face in &self.faces {
            let [i0, i1, i2] = face.verts.map(|i| i as usize);
            if i0 >= count || i1 >= count || i2 >= count {
                continue;
            }
            let v0 = self.positions[i0];
            let v1 = self.positions[i1];
            let v2 = self.positions[i2];

            // |cross| = 2 * triangle area, so larger faces weigh more
            let face_normal = (v1 - v0).cross(v2 - v0);
            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for n in &mut normals {
            *n = n.try_normalize().unwrap_or(Vec3::Z);
        }

        self.normals = Some(NormalSet {
            normals,
            faces: self.faces.iter().map(|f| f.verts).collect(),
        });
    }
}

/// Mesh returned by evaluating a host node at a given time.
///
/// `mesh` is borrowed when the host keeps the evaluated object alive and owned
/// when evaluation produced a temporary.
#[derive(Debug, Clone)]
pub struct EvaluatedMesh<'a> {
    pub mesh: Cow<'a, MeshData>,
    /// Polygon count reported by the host's fast query, if it has one.
    pub fast_face_count: Option<usize>,
}

impl<'a> EvaluatedMesh<'a> {
    #[must_use]
    pub fn borrowed(mesh: &'a MeshData) -> Self {
        Self {
            mesh: Cow::Borrowed(mesh),
            fast_face_count: None,
        }
    }

    #[must_use]
    pub fn owned(mesh: MeshData) -> Self {
        Self {
            mesh: Cow::Owned(mesh),
            fast_face_count: None,
        }
    }

    #[must_use]
    pub fn with_fast_face_count(mut self, count: usize) -> Self {
        self.fast_face_count = Some(count);
        self
    }

    /// Face count for statistics: the fast query when available, otherwise
    /// the parsed mesh.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.fast_face_count.unwrap_or_else(|| self.mesh.face_count())
    }
}
