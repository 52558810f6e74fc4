//! Error types for mesh construction and validation.

use thiserror::Error;

/// Errors from height-field construction, union and mesh validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// Lattice break lines are missing, unsorted or not finite.
    #[error("invalid lattice: {0}")]
    InvalidLattice(String),

    /// A column top is not above the field bottom, or not finite.
    #[error("invalid column top {top} over bottom {bottom}")]
    InvalidColumn {
        /// Requested top.
        top: f64,
        /// Field bottom.
        bottom: f64,
    },

    /// Cell index outside the lattice.
    #[error("cell ({i}, {j}) outside a {nx}x{ny} lattice")]
    CellOutOfRange {
        /// Column index.
        i: usize,
        /// Row index.
        j: usize,
        /// Lattice width in cells.
        nx: usize,
        /// Lattice height in cells.
        ny: usize,
    },

    /// Two columns over the same cell neither touch nor overlap.
    #[error("columns at ({x:.3}, {y:.3}) are disjoint")]
    DisjointColumns {
        /// Cell center X (mm).
        x: f64,
        /// Cell center Y (mm).
        y: f64,
    },

    /// A column would float above the common bottom plane.
    #[error("column at ({x:.3}, {y:.3}) starts at z={lo:.3}, above the common bottom z={bottom:.3}")]
    FloatingColumn {
        /// Cell center X (mm).
        x: f64,
        /// Cell center Y (mm).
        y: f64,
        /// Column bottom.
        lo: f64,
        /// Common bottom.
        bottom: f64,
    },

    /// Edges used by a single triangle.
    #[error("mesh has {0} boundary edges")]
    BoundaryEdges(usize),

    /// Edges used by more than two triangles.
    #[error("mesh has {0} non-manifold edges")]
    NonManifoldEdges(usize),

    /// Neighboring triangles traverse a shared edge in the same direction.
    #[error("mesh has {0} inconsistently oriented edges")]
    InconsistentOrientation(usize),

    /// Triangles repeating a vertex index.
    #[error("mesh has {0} degenerate triangles")]
    DegenerateTriangles(usize),

    /// Signed volume is zero or negative (inward normals).
    #[error("mesh volume {0:.6} is not positive")]
    NonPositiveVolume(f64),

    /// Nothing to mesh or validate.
    #[error("mesh is empty")]
    Empty,
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
