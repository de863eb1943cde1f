//! Mesh snapshot: read-only copy of a mesh's geometry at one frame.
//!
//! Topology uses the face-counts / face-indices layout; per-corner data
//! (custom normals, UVs, colors) is stored in face-corner order.

use serde::{Deserialize, Serialize};

use crate::util::{Vec2, Vec3};

/// A named per-corner UV layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UvLayer {
    pub name: String,
    pub uvs: Vec<Vec2>,
}

/// A named per-corner color layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorLayer {
    pub name: String,
    pub colors: Vec<Vec3>,
}

/// Geometry of one mesh at one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Vertex count per face (3 or 4).
    pub face_counts: Vec<i32>,
    /// Face vertex indices, concatenated.
    pub face_indices: Vec<i32>,
    /// Material slot per face; empty means slot 0 everywhere.
    #[serde(default)]
    pub face_materials: Vec<u32>,
    /// Smooth flag per face; empty means flat everywhere.
    #[serde(default)]
    pub face_smooth: Vec<bool>,
    /// Per-vertex normals; computed when empty.
    #[serde(default)]
    pub vertex_normals: Vec<Vec3>,
    /// Custom split normals, one per face corner.
    #[serde(default)]
    pub custom_normals: Option<Vec<Vec3>>,
    #[serde(default)]
    pub uv_layers: Vec<UvLayer>,
    #[serde(default)]
    pub color_layers: Vec<ColorLayer>,
}

impl MeshSnapshot {
    /// Create a snapshot from positions and topology.
    pub fn new(positions: Vec<Vec3>, face_counts: Vec<i32>, face_indices: Vec<i32>) -> Self {
        Self { positions, face_counts, face_indices, ..Default::default() }
    }

    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn num_faces(&self) -> usize {
        self.face_counts.len()
    }

    /// Total number of face corners.
    pub fn num_corners(&self) -> usize {
        self.face_indices.len()
    }

    /// Triangles produced by splitting quads.
    pub fn num_triangles(&self) -> usize {
        self.face_counts.iter().map(|&c| if c == 4 { 2 } else { 1 }).sum()
    }

    /// Material slot of face `face`.
    #[inline]
    pub fn material(&self, face: usize) -> u32 {
        self.face_materials.get(face).copied().unwrap_or(0)
    }

    /// Smooth flag of face `face`.
    #[inline]
    pub fn is_smooth(&self, face: usize) -> bool {
        self.face_smooth.get(face).copied().unwrap_or(false)
    }

    /// Check that the mesh has renderable triangles or quads and every
    /// index and per-corner layer is consistent.
    pub fn is_valid(&self) -> bool {
        if self.positions.is_empty() || self.face_counts.is_empty() {
            return false;
        }
        if self.face_counts.iter().any(|&c| c != 3 && c != 4) {
            return false;
        }
        let corners: usize = self.face_counts.iter().map(|&c| c as usize).sum();
        if corners != self.face_indices.len() {
            return false;
        }
        let n = self.positions.len() as i32;
        if self.face_indices.iter().any(|&i| i < 0 || i >= n) {
            return false;
        }
        let custom_ok = self.custom_normals.as_ref().map_or(true, |c| c.len() == corners);
        custom_ok
            && self.uv_layers.iter().all(|l| l.uvs.len() == corners)
            && self.color_layers.iter().all(|l| l.colors.len() == corners)
    }

    /// Unit normal per face (quads use the diagonal cross product).
    pub fn compute_face_normals(&self) -> Vec<Vec3> {
        let mut normals = Vec::with_capacity(self.face_counts.len());
        let mut idx = 0usize;

        for &count in &self.face_counts {
            let count = count.max(0) as usize;
            let corner = |k: usize| {
                self.face_indices
                    .get(idx + k)
                    .and_then(|&i| self.positions.get(i as usize))
                    .copied()
                    .unwrap_or(Vec3::ZERO)
            };
            let normal = match count {
                3 => (corner(1) - corner(0)).cross(corner(2) - corner(0)),
                4 => (corner(2) - corner(0)).cross(corner(3) - corner(1)),
                _ => Vec3::ZERO,
            };
            normals.push(normal.try_normalize().unwrap_or(Vec3::Z));
            idx += count;
        }

        normals
    }

    /// Per-vertex normals: provided ones, or the average of adjacent face normals.
    pub fn compute_vertex_normals(&self, face_normals: &[Vec3]) -> Vec<Vec3> {
        if self.vertex_normals.len() == self.positions.len() {
            return self.vertex_normals.clone();
        }
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        let mut idx = 0usize;
        for (face, &count) in self.face_counts.iter().enumerate() {
            let count = count.max(0) as usize;
            for &v in self.face_indices.iter().skip(idx).take(count) {
                if let Some(slot) = acc.get_mut(v as usize) {
                    *slot += face_normals[face];
                }
            }
            idx += count;
        }
        acc.into_iter().map(|n| n.try_normalize().unwrap_or(Vec3::Z)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshSnapshot {
        MeshSnapshot::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            vec![4],
            vec![0, 1, 2, 3],
        )
    }

    #[test]
    fn test_counts() {
        let mesh = quad();
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(mesh.num_corners(), 4);
        assert_eq!(mesh.num_triangles(), 2);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_invalid_meshes() {
        assert!(!MeshSnapshot::default().is_valid());

        let mut bad_index = quad();
        bad_index.face_indices[3] = 9;
        assert!(!bad_index.is_valid());

        let mut ngon = quad();
        ngon.face_counts = vec![5];
        assert!(!ngon.is_valid());

        let mut short_uvs = quad();
        short_uvs.uv_layers.push(UvLayer { name: "uv".into(), uvs: vec![Vec2::ZERO] });
        assert!(!short_uvs.is_valid());
    }

    #[test]
    fn test_normals() {
        let mesh = quad();
        let face = mesh.compute_face_normals();
        assert_eq!(face, vec![Vec3::Z]);
        let verts = mesh.compute_vertex_normals(&face);
        assert!(verts.iter().all(|n| *n == Vec3::Z));
    }
}
