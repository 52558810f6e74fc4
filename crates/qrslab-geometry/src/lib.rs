#![warn(missing_docs)]

//! Plate geometry for qrslab.
//!
//! [`synthesize`] turns a QR matrix into three solids: the base plate, the
//! raised dark modules and the label. [`partition`] then groups them by
//! filament, either as two material-tagged objects or as one merged solid
//! with a filament swap height.
//!
//! Units are millimeters. The plate's lower-left bed corner is the origin,
//! X to the right, Y toward the back, Z up.

pub mod error;
pub mod font;
pub mod partition;
pub mod synth;

pub use error::{GeometryError, Result};
pub use partition::{partition, Material, MaterialGroup, OutputMode, PrintableModel};
pub use synth::{synthesize, LabelParams, LabelStyle, Layout, SynthesisParams, SynthesizedSolids};

use qrslab_mesh::{HeightField, TriangleMesh};

/// A named closed solid and the height field it was meshed from.
#[derive(Debug, Clone)]
pub struct Solid {
    /// Object name.
    pub name: String,
    /// Watertight, outward-oriented mesh.
    pub mesh: TriangleMesh,
    /// Source height field.
    pub field: HeightField,
}

impl Solid {
    /// Mesh `field` and check the result is a closed manifold, also once
    /// vertices are welded by position.
    pub fn from_field(name: &str, field: HeightField) -> Result<Self> {
        let mesh = field.to_mesh();
        mesh.welded()
            .validate_manifold()
            .map_err(|source| GeometryError::NonManifold {
                solid: name.to_string(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            mesh,
            field,
        })
    }
}
