//! Generator configuration.

use std::path::Path;

use qrslab_export::{ExportOptions, MaterialSpec};
use qrslab_geometry::{LabelParams, SynthesisParams};
use qrslab_matrix::ErrorCorrection;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Filaments for the two material groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Materials {
    /// Plate filament.
    pub base: MaterialSpec,
    /// Module and label filament.
    pub accent: MaterialSpec,
}

impl Default for Materials {
    fn default() -> Self {
        let options = ExportOptions::default();
        Self {
            base: options.base_material,
            accent: options.accent_material,
        }
    }
}

/// Everything a generation run needs besides the URL.
///
/// Every field has a default, so a TOML file only needs the values it
/// changes:
///
/// ```toml
/// qr_size_mm = 80.0
/// error_correction = "Q"
///
/// [label]
/// text = "example.org"
/// style = "raised"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Side of the square plate (mm).
    pub qr_size_mm: f64,
    /// Plate thickness (mm).
    pub base_height_mm: f64,
    /// Height of the dark modules above the plate (mm).
    pub accent_height_mm: f64,
    /// Label extrusion height, or inlay depth (mm).
    pub text_height_mm: f64,
    /// Smallest printable XY feature (mm).
    pub min_feature_mm: f64,
    /// Plate corner radius (mm); 0 for square corners.
    pub corner_radius_mm: f64,
    /// Preferred error-correction level.
    pub error_correction: ErrorCorrection,
    /// Weakest level to fall back to for long URLs.
    pub min_error_correction: ErrorCorrection,
    /// Label.
    pub label: LabelParams,
    /// Filaments.
    pub materials: Materials,
}

impl Default for Config {
    fn default() -> Self {
        let params = SynthesisParams::default();
        Self {
            qr_size_mm: params.qr_size_mm,
            base_height_mm: params.base_height_mm,
            accent_height_mm: params.accent_height_mm,
            text_height_mm: params.text_height_mm,
            min_feature_mm: params.min_feature_mm,
            corner_radius_mm: params.corner_radius_mm,
            error_correction: ErrorCorrection::M,
            min_error_correction: ErrorCorrection::L,
            label: params.label,
            materials: Materials::default(),
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject out-of-range values before any work starts.
    pub fn validate(&self) -> Result<()> {
        self.synthesis_params()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        if self.min_error_correction > self.error_correction {
            return Err(Error::Config(format!(
                "min_error_correction {} is stronger than error_correction {}",
                self.min_error_correction, self.error_correction
            )));
        }
        for material in [&self.materials.base, &self.materials.accent] {
            material
                .validate()
                .map_err(|e| Error::Config(format!("material {:?}: {e}", material.name)))?;
        }
        Ok(())
    }

    /// Geometry parameters.
    pub fn synthesis_params(&self) -> SynthesisParams {
        SynthesisParams {
            qr_size_mm: self.qr_size_mm,
            base_height_mm: self.base_height_mm,
            accent_height_mm: self.accent_height_mm,
            text_height_mm: self.text_height_mm,
            min_feature_mm: self.min_feature_mm,
            corner_radius_mm: self.corner_radius_mm,
            label: self.label.clone(),
        }
    }

    /// Export options.
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            base_material: self.materials.base.clone(),
            accent_material: self.materials.accent.clone(),
            ..ExportOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrslab_geometry::LabelStyle;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.qr_size_mm, 70.0);
        assert_eq!(config.base_height_mm, 3.0);
        assert_eq!(config.accent_height_mm, 1.5);
        assert_eq!(config.text_height_mm, 2.0);
        assert_eq!(config.corner_radius_mm, 4.0);
        assert_eq!(config.error_correction, ErrorCorrection::M);
        assert_eq!(config.label.text, "treasures.to");
        assert_eq!(config.materials.base.display_color, "#00AA00");
        assert_eq!(config.materials.accent.name, "White");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r##"
qr_size_mm = 80.0
error_correction = "Q"

[label]
text = "example.org"
style = "raised"

[materials.base]
name = "Black"
color = "#000000"
"##,
        )
        .unwrap();
        assert_eq!(config.qr_size_mm, 80.0);
        assert_eq!(config.base_height_mm, 3.0);
        assert_eq!(config.error_correction, ErrorCorrection::Q);
        assert_eq!(config.label.style, LabelStyle::Raised);
        assert_eq!(config.label.glyph_height_mm, 5.0);
        assert_eq!(config.materials.base.name, "Black");
        assert_eq!(config.materials.accent.name, "White");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.label.text = "hunt #7".into();
        config.min_feature_mm = 0.5;
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.base_height_mm = -1.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.min_error_correction = ErrorCorrection::H;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.materials.accent.display_color = "white".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        assert!(matches!(
            Config::from_toml_str("qr_size_mm = \"big\""),
            Err(Error::ConfigParse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("accent_height_mm = 0.0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("corner_radius_mm = -2.0"),
            Err(Error::Config(_))
        ));
        let square = Config::from_toml_str("corner_radius_mm = 0.0").unwrap();
        assert_eq!(square.synthesis_params().corner_radius_mm, 0.0);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigFile { .. }));
    }
}
