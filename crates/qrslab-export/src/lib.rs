#![warn(missing_docs)]

//! File export for qrslab plates.
//!
//! Two packagings are supported:
//!
//! - **3MF** for printers with automatic filament switching: one object per
//!   material group, each tagged with its material and pre-assigned to an
//!   extruder.
//! - **Binary STL** for single-nozzle printers: one merged solid plus a
//!   `<stem>.swap.toml` sidecar naming the height of the filament change.
//!
//! Output is byte-reproducible, and files appear atomically: either every
//! file of an export is in place or none is.
//!
//! # Example
//!
//! ```ignore
//! use qrslab_export::{export, ExportOptions, ExportTarget};
//!
//! let target = ExportTarget::from_path("plate.3mf")?;
//! let report = export(&model, &target, &ExportOptions::default())?;
//! println!("wrote {} triangles", report.triangles);
//! ```

pub mod error;
pub mod stl;
pub mod threemf;
mod write;

pub use error::{ExportError, Result};
pub use stl::{stl_bytes, SwapSidecar};
pub use threemf::ThreeMfPackage;

use std::fmt;
use std::path::{Path, PathBuf};

use qrslab_geometry::PrintableModel;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// 3MF package, one object per material.
    ThreeMf,
    /// Binary STL plus swap-height sidecar.
    Stl,
}

impl ExportFormat {
    /// Format implied by the extension of `path` (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "3mf" => Some(ExportFormat::ThreeMf),
            "stl" => Some(ExportFormat::Stl),
            _ => None,
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::ThreeMf => "3mf",
            ExportFormat::Stl => "stl",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::ThreeMf => "3MF",
            ExportFormat::Stl => "STL",
        })
    }
}

/// Where and how to write a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// Output format.
    pub format: ExportFormat,
    /// Output path of the main file.
    pub path: PathBuf,
}

impl ExportTarget {
    /// Target whose format follows the extension of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match ExportFormat::from_path(&path) {
            Some(format) => Ok(Self { format, path }),
            None => Err(ExportError::UnknownFormat(path)),
        }
    }
}

/// A filament as shown by the slicer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSpec {
    /// Material name.
    pub name: String,
    /// `#RRGGBB` or `#RRGGBBAA`.
    #[serde(rename = "color")]
    pub display_color: String,
}

impl MaterialSpec {
    /// Create a material.
    pub fn new(name: impl Into<String>, display_color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_color: display_color.into(),
        }
    }

    /// Check the display color is well formed.
    pub fn validate(&self) -> Result<()> {
        let hex = self
            .display_color
            .strip_prefix('#')
            .ok_or_else(|| ExportError::InvalidColor(self.display_color.clone()))?;
        if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ExportError::InvalidColor(self.display_color.clone()));
        }
        Ok(())
    }
}

/// Export options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Plate filament.
    pub base_material: MaterialSpec,
    /// Module and label filament.
    pub accent_material: MaterialSpec,
    /// Application name recorded in the files.
    pub application: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            base_material: MaterialSpec::new("Green", "#00AA00"),
            accent_material: MaterialSpec::new("White", "#FFFFFF"),
            application: "qrslab".into(),
        }
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Files written, main file first.
    pub files: Vec<PathBuf>,
    /// Triangles written.
    pub triangles: usize,
}

/// Write `model` to `target`.
///
/// Missing parent directories of the target are created.
pub fn export(
    model: &PrintableModel,
    target: &ExportTarget,
    options: &ExportOptions,
) -> Result<ExportReport> {
    options.base_material.validate()?;
    options.accent_material.validate()?;

    let files = match (target.format, model) {
        (ExportFormat::ThreeMf, PrintableModel::Separate { base, accent }) => {
            let package = ThreeMfPackage::new(base, accent, options);
            vec![(target.path.clone(), package.to_bytes()?)]
        }
        (
            ExportFormat::Stl,
            PrintableModel::Merged {
                solid,
                swap_height_mm,
            },
        ) => {
            let sidecar = SwapSidecar::new(&target.path, *swap_height_mm, options);
            vec![
                (target.path.clone(), stl_bytes(&solid.mesh, *swap_height_mm)?),
                (
                    SwapSidecar::path_for(&target.path),
                    sidecar.to_toml()?.into_bytes(),
                ),
            ]
        }
        (ExportFormat::ThreeMf, PrintableModel::Merged { .. }) => {
            return Err(ExportError::UnsupportedModel {
                format: "3MF",
                expected: "separate-object",
            })
        }
        (ExportFormat::Stl, PrintableModel::Separate { .. }) => {
            return Err(ExportError::UnsupportedModel {
                format: "STL",
                expected: "merged single-mesh",
            })
        }
    };

    if let Some(dir) = target.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    write::commit_all(&files)?;

    let report = ExportReport {
        files: files.into_iter().map(|(path, _)| path).collect(),
        triangles: model.num_triangles(),
    };
    info!(
        format = %target.format,
        path = %target.path.display(),
        triangles = report.triangles,
        "model exported"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrslab_geometry::{partition, synthesize, OutputMode, SynthesisParams};
    use qrslab_matrix::{encode, ErrorCorrection};

    fn model(mode: OutputMode) -> PrintableModel {
        let matrix = encode("https://treasures.to/x", ErrorCorrection::M).unwrap();
        let solids = synthesize(&matrix, &SynthesisParams::default()).unwrap();
        partition(solids, mode).unwrap()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(Path::new("a/b.3mf")),
            Some(ExportFormat::ThreeMf)
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("B.STL")),
            Some(ExportFormat::Stl)
        );
        assert_eq!(ExportFormat::from_path(Path::new("plate.obj")), None);
        assert_eq!(ExportFormat::from_path(Path::new("plate")), None);
        assert!(matches!(
            ExportTarget::from_path("plate.obj"),
            Err(ExportError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_color_validation() {
        assert!(MaterialSpec::new("Green", "#00AA00").validate().is_ok());
        assert!(MaterialSpec::new("Clear", "#FFFFFF80").validate().is_ok());
        for bad in ["00AA00", "#00AA0", "#GG0000", ""] {
            assert!(matches!(
                MaterialSpec::new("x", bad).validate(),
                Err(ExportError::InvalidColor(_))
            ));
        }
    }

    #[test]
    fn test_export_3mf() {
        let dir = tempfile::tempdir().unwrap();
        let target = ExportTarget::from_path(dir.path().join("plate.3mf")).unwrap();
        let model = model(OutputMode::Separate);

        let report = export(&model, &target, &ExportOptions::default()).unwrap();
        assert_eq!(report.files, vec![target.path.clone()]);
        assert_eq!(report.triangles, model.num_triangles());

        let bytes = std::fs::read(&target.path).unwrap();
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn test_export_stl_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let target = ExportTarget::from_path(dir.path().join("plate.stl")).unwrap();
        let model = model(OutputMode::Merged);

        let report = export(&model, &target, &ExportOptions::default()).unwrap();
        let sidecar = dir.path().join("plate.swap.toml");
        assert_eq!(report.files, vec![target.path.clone(), sidecar.clone()]);

        let stl = std::fs::read(&target.path).unwrap();
        assert_eq!(stl.len(), 84 + 50 * report.triangles);
        let text = std::fs::read_to_string(&sidecar).unwrap();
        assert!(text.contains("swap_height_mm = 3.0"));
    }

    #[test]
    fn test_reexport_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            (OutputMode::Separate, "plate.3mf"),
            (OutputMode::Merged, "plate.stl"),
        ];
        for (mode, name) in cases {
            let model = model(mode);
            let target = ExportTarget::from_path(dir.path().join(name)).unwrap();

            let first = export(&model, &target, &ExportOptions::default()).unwrap();
            let before: Vec<_> = first
                .files
                .iter()
                .map(|f| std::fs::read(f).unwrap())
                .collect();
            let second = export(&model, &target, &ExportOptions::default()).unwrap();
            assert_eq!(first, second);
            for (file, bytes) in second.files.iter().zip(&before) {
                assert_eq!(&std::fs::read(file).unwrap(), bytes, "{}", file.display());
            }
        }
        // plate.3mf, plate.stl, plate.swap.toml and nothing left over.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = ExportTarget::from_path(dir.path().join("out/plates/a.stl")).unwrap();
        let report =
            export(&model(OutputMode::Merged), &target, &ExportOptions::default()).unwrap();
        let parent = dir.path().join("out/plates");
        assert!(report.files.iter().all(|f| f.starts_with(&parent)));
        assert!(target.path.exists());
    }

    #[test]
    fn test_mode_mismatch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let stl = ExportTarget::from_path(dir.path().join("plate.stl")).unwrap();
        let err = export(&model(OutputMode::Separate), &stl, &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedModel { format: "STL", .. }));

        let threemf = ExportTarget::from_path(dir.path().join("plate.3mf")).unwrap();
        let err = export(&model(OutputMode::Merged), &threemf, &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedModel { format: "3MF", .. }));

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_bad_color_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = ExportTarget::from_path(dir.path().join("plate.3mf")).unwrap();
        let options = ExportOptions {
            accent_material: MaterialSpec::new("White", "white"),
            ..ExportOptions::default()
        };
        let err = export(&model(OutputMode::Separate), &target, &options).unwrap_err();
        assert!(matches!(err, ExportError::InvalidColor(_)));
        assert!(!target.path.exists());
    }

    #[test]
    fn test_failed_sidecar_rolls_back_stl() {
        let dir = tempfile::tempdir().unwrap();
        let target = ExportTarget::from_path(dir.path().join("plate.stl")).unwrap();
        // A directory where the sidecar should go makes the second rename fail.
        std::fs::create_dir(dir.path().join("plate.swap.toml")).unwrap();

        let err = export(&model(OutputMode::Merged), &target, &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
        assert!(!target.path.exists());
        // Only the pre-existing directory remains; no temp files linger.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
