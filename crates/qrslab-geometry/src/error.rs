//! Error types for geometry synthesis.

use qrslab_mesh::MeshError;
use thiserror::Error;

/// Errors from synthesis and partitioning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A dimension is zero, negative or not finite.
    #[error("{name} must be a positive finite number of millimeters, got {value}")]
    InvalidDimension {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A printed feature would be thinner than the manufacturability floor.
    #[error("{feature} size {size_mm:.3} mm is below the minimum printable feature of {min_mm:.3} mm")]
    FeatureTooSmall {
        /// Which feature (module, label pixel).
        feature: &'static str,
        /// Computed size.
        size_mm: f64,
        /// Configured floor.
        min_mm: f64,
    },

    /// The label cannot be placed without overlapping the QR region.
    #[error("label does not fit: {0}")]
    LabelDoesNotFit(String),

    /// The built-in label font has no glyph for this character.
    #[error("label character {0:?} is not in the label font")]
    UnsupportedGlyph(char),

    /// An inlaid label must be shallower than the plate.
    #[error("inlay depth {depth_mm} mm must be less than the base height {base_mm} mm")]
    InlayTooDeep {
        /// Requested depth (text height).
        depth_mm: f64,
        /// Base plate height.
        base_mm: f64,
    },

    /// Solid construction or union failed.
    #[error("solid construction failed: {0}")]
    Mesh(#[from] MeshError),

    /// A produced solid failed manifold validation.
    #[error("{solid} is not a closed manifold: {source}")]
    NonManifold {
        /// Solid name.
        solid: String,
        /// Validation failure.
        source: MeshError,
    },
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;
