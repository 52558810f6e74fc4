#![warn(missing_docs)]

//! Triangle meshes for qrslab.
//!
//! Every solid the generator produces is first described as a
//! [`HeightField`] (vertical prisms over a rectilinear lattice) and then
//! meshed. That representation makes union exact and keeps the output
//! watertight by construction; [`TriangleMesh::validate_manifold`] checks it
//! anyway before anything is exported.

pub mod error;
pub mod heightfield;
pub mod validate;

pub use error::{MeshError, Result};
pub use heightfield::HeightField;

use nalgebra::Vector3;

/// Axis-aligned bounds as `(min, max)`.
pub type Bounds = ([f64; 3], [f64; 3]);

/// Indexed triangle mesh.
///
/// Triangles are wound counter-clockwise when seen from outside the solid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32, mm).
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append a vertex and return its index.
    pub fn push_vertex(&mut self, x: f64, y: f64, z: f64) -> u32 {
        let index = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&[x as f32, y as f32, z as f32]);
        index
    }

    /// Append a triangle.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices
            .extend(other.indices.iter().map(|&i| i + offset));
    }

    /// Position of vertex `i` in f64.
    pub fn vertex(&self, i: u32) -> Vector3<f64> {
        let i = i as usize * 3;
        Vector3::new(
            self.vertices[i] as f64,
            self.vertices[i + 1] as f64,
            self.vertices[i + 2] as f64,
        )
    }

    /// Iterate triangles as vertex index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Unit facet normal of triangle `t` (zero for degenerate triangles).
    pub fn facet_normal(&self, t: [u32; 3]) -> Vector3<f64> {
        let (v0, v1, v2) = (self.vertex(t[0]), self.vertex(t[1]), self.vertex(t[2]));
        let n = (v1 - v0).cross(&(v2 - v0));
        let len = n.norm();
        if len > 1e-12 {
            n / len
        } else {
            Vector3::zeros()
        }
    }

    /// Axis-aligned bounding box, or `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<Bounds> {
        if self.vertices.is_empty() {
            return None;
        }

        let mut min = [f64::MAX; 3];
        let mut max = [f64::MIN; 3];
        for chunk in self.vertices.chunks_exact(3) {
            for axis in 0..3 {
                let v = chunk[axis] as f64;
                min[axis] = min[axis].min(v);
                max[axis] = max[axis].max(v);
            }
        }
        Some((min, max))
    }

    /// Signed volume (divergence theorem). Positive for closed meshes with
    /// outward-facing triangles.
    pub fn volume(&self) -> f64 {
        let mut vol = 0.0;
        for t in self.triangles() {
            let (v0, v1, v2) = (self.vertex(t[0]), self.vertex(t[1]), self.vertex(t[2]));
            // Signed volume of tetrahedron formed with origin
            vol += v0.dot(&v1.cross(&v2));
        }
        vol / 6.0
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        self.triangles()
            .map(|t| {
                let (v0, v1, v2) = (self.vertex(t[0]), self.vertex(t[1]), self.vertex(t[2]));
                (v1 - v0).cross(&(v2 - v0)).norm() / 2.0
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> TriangleMesh {
        let mut field = HeightField::new(vec![0.0, 1.0], vec![0.0, 1.0], 0.0).unwrap();
        field.set(0, 0, 1.0).unwrap();
        field.to_mesh()
    }

    #[test]
    fn test_cube_counts() {
        let mesh = unit_cube();
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_triangles(), 12);
    }

    #[test]
    fn test_volume_and_area() {
        let mesh = unit_cube();
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.surface_area(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bounds() {
        let mesh = unit_cube();
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, [0.0, 0.0, 0.0]);
        assert_eq!(max, [1.0, 1.0, 1.0]);
        assert!(TriangleMesh::new().bounds().is_none());
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = unit_cube();
        let b = unit_cube();
        a.merge(&b);
        assert_eq!(a.num_vertices(), 16);
        assert_eq!(a.num_triangles(), 24);
        assert!(a.indices[36..].iter().all(|&i| i >= 8));
    }

    #[test]
    fn test_facet_normals_point_outward() {
        let mesh = unit_cube();
        let centre = Vector3::new(0.5, 0.5, 0.5);
        for t in mesh.triangles() {
            let n = mesh.facet_normal(t);
            let c = (mesh.vertex(t[0]) + mesh.vertex(t[1]) + mesh.vertex(t[2])) / 3.0;
            assert!(n.dot(&(c - centre)) > 0.0, "normal {n:?} points inward");
        }
    }
}
