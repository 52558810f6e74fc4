//! Manifold validation.

use std::collections::HashMap;

use crate::error::{MeshError, Result};
use crate::TriangleMesh;

/// Edge usage statistics of a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeReport {
    /// Undirected edges.
    pub edges: usize,
    /// Edges used by exactly one triangle.
    pub boundary: usize,
    /// Edges used by three or more triangles.
    pub non_manifold: usize,
    /// Edges used twice in the same direction.
    pub misoriented: usize,
    /// Triangles with a repeated vertex index.
    pub degenerate: usize,
}

impl EdgeReport {
    /// True when every edge is shared by exactly two oppositely wound triangles.
    pub fn is_closed_manifold(&self) -> bool {
        self.boundary == 0 && self.non_manifold == 0 && self.misoriented == 0 && self.degenerate == 0
    }
}

impl TriangleMesh {
    /// Count boundary, non-manifold and misoriented edges.
    pub fn edge_report(&self) -> EdgeReport {
        // (lo, hi) -> (uses as lo->hi, uses as hi->lo)
        let mut uses: HashMap<(u32, u32), (u32, u32)> = HashMap::with_capacity(self.indices.len());
        let mut report = EdgeReport::default();

        for t in self.triangles() {
            if t[0] == t[1] || t[1] == t[2] || t[0] == t[2] {
                report.degenerate += 1;
                continue;
            }
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                let entry = uses.entry((a.min(b), a.max(b))).or_default();
                if a < b {
                    entry.0 += 1;
                } else {
                    entry.1 += 1;
                }
            }
        }

        report.edges = uses.len();
        for &(forward, backward) in uses.values() {
            match forward + backward {
                1 => report.boundary += 1,
                2 if forward != 1 => report.misoriented += 1,
                2 => {}
                _ => report.non_manifold += 1,
            }
        }
        report
    }

    /// Copy of the mesh with vertices at bit-identical positions merged,
    /// the way an STL reader rebuilds connectivity.
    pub fn welded(&self) -> TriangleMesh {
        let mut remap: HashMap<[u32; 3], u32> = HashMap::with_capacity(self.num_vertices());
        let mut out = TriangleMesh::new();
        let mut index_of = Vec::with_capacity(self.num_vertices());
        for p in self.vertices.chunks_exact(3) {
            let key = [p[0].to_bits(), p[1].to_bits(), p[2].to_bits()];
            let next = out.num_vertices() as u32;
            let index = *remap.entry(key).or_insert_with(|| {
                out.vertices.extend_from_slice(p);
                next
            });
            index_of.push(index);
        }
        out.indices = self.indices.iter().map(|&i| index_of[i as usize]).collect();
        out
    }

    /// Check that the mesh is a closed, consistently oriented 2-manifold
    /// enclosing positive volume.
    pub fn validate_manifold(&self) -> Result<()> {
        if self.is_empty() {
            return Err(MeshError::Empty);
        }
        let report = self.edge_report();
        if report.degenerate > 0 {
            return Err(MeshError::DegenerateTriangles(report.degenerate));
        }
        if report.boundary > 0 {
            return Err(MeshError::BoundaryEdges(report.boundary));
        }
        if report.non_manifold > 0 {
            return Err(MeshError::NonManifoldEdges(report.non_manifold));
        }
        if report.misoriented > 0 {
            return Err(MeshError::InconsistentOrientation(report.misoriented));
        }
        let volume = self.volume();
        if volume <= 0.0 {
            return Err(MeshError::NonPositiveVolume(volume));
        }
        Ok(())
    }
}
