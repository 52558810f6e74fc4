//! Grouping solids by filament.

use qrslab_mesh::{Bounds, TriangleMesh};
use tracing::debug;

use crate::error::Result;
use crate::synth::{LabelStyle, SynthesizedSolids};
use crate::Solid;

/// Filament a group is printed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Material {
    /// Plate color.
    Base,
    /// Module and label color.
    Accent,
}

impl Material {
    /// Object name used in exported files.
    pub fn name(self) -> &'static str {
        match self {
            Material::Base => "base",
            Material::Accent => "accent",
        }
    }
}

/// How solids are packaged for export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// One object per material, each tagged with its filament.
    #[default]
    Separate,
    /// A single merged solid with a filament swap height.
    Merged,
}

/// Solids sharing one material.
#[derive(Debug, Clone)]
pub struct MaterialGroup {
    /// Material of every solid in the group.
    pub material: Material,
    /// Solids in synthesis order.
    pub solids: Vec<Solid>,
}

impl MaterialGroup {
    /// All solids concatenated into one mesh, in order.
    pub fn mesh(&self) -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        for solid in &self.solids {
            mesh.merge(&solid.mesh);
        }
        mesh
    }

    /// Total triangle count.
    pub fn num_triangles(&self) -> usize {
        self.solids.iter().map(|s| s.mesh.num_triangles()).sum()
    }
}

/// Partitioned model, ready for export.
#[derive(Debug, Clone)]
pub enum PrintableModel {
    /// Two material groups in one coordinate frame.
    Separate {
        /// Plate.
        base: MaterialGroup,
        /// Modules and label.
        accent: MaterialGroup,
    },
    /// One solid; the printer swaps filament at `swap_height_mm`.
    Merged {
        /// Union of all solids.
        solid: Solid,
        /// Z at which the accent filament starts (mm).
        swap_height_mm: f64,
    },
}

impl PrintableModel {
    /// Packaging mode.
    pub fn mode(&self) -> OutputMode {
        match self {
            PrintableModel::Separate { .. } => OutputMode::Separate,
            PrintableModel::Merged { .. } => OutputMode::Merged,
        }
    }

    /// Total triangle count.
    pub fn num_triangles(&self) -> usize {
        match self {
            PrintableModel::Separate { base, accent } => {
                base.num_triangles() + accent.num_triangles()
            }
            PrintableModel::Merged { solid, .. } => solid.mesh.num_triangles(),
        }
    }

    /// Bounds over every solid.
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            PrintableModel::Separate { base, accent } => base
                .solids
                .iter()
                .chain(&accent.solids)
                .filter_map(|s| s.mesh.bounds())
                .reduce(|(amin, amax), (bmin, bmax)| {
                    (
                        [amin[0].min(bmin[0]), amin[1].min(bmin[1]), amin[2].min(bmin[2])],
                        [amax[0].max(bmax[0]), amax[1].max(bmax[1]), amax[2].max(bmax[2])],
                    )
                }),
            PrintableModel::Merged { solid, .. } => solid.mesh.bounds(),
        }
    }
}

/// Group synthesized solids by material, or merge them into one solid.
///
/// When merging, an inlaid label is left out so its pocket stays open as an
/// engraving; a raised label is joined to the plate.
pub fn partition(solids: SynthesizedSolids, mode: OutputMode) -> Result<PrintableModel> {
    let SynthesizedSolids {
        base,
        accent,
        text,
        layout,
    } = solids;

    match mode {
        OutputMode::Separate => {
            let mut accent_solids = vec![accent];
            accent_solids.extend(text);
            Ok(PrintableModel::Separate {
                base: MaterialGroup {
                    material: Material::Base,
                    solids: vec![base],
                },
                accent: MaterialGroup {
                    material: Material::Accent,
                    solids: accent_solids,
                },
            })
        }
        OutputMode::Merged => {
            let mut field = base.field.union(&accent.field)?;
            match (&text, layout.label_style) {
                (Some(text), LabelStyle::Raised) => field = field.union(&text.field)?,
                (Some(_), LabelStyle::Inlay) => debug!("label engraved into the plate"),
                (None, _) => {}
            }
            let solid = Solid::from_field("merged", field)?;
            debug!(
                triangles = solid.mesh.num_triangles(),
                swap_height_mm = layout.base_height_mm,
                "merged solid"
            );
            Ok(PrintableModel::Merged {
                solid,
                swap_height_mm: layout.base_height_mm,
            })
        }
    }
}
