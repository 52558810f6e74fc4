#![warn(missing_docs)]

//! # qrslab
//!
//! Printable two-material QR code plates from URLs.
//!
//! A URL is encoded into a QR module matrix, the matrix becomes a base
//! plate with raised dark modules and a label, the solids are grouped by
//! filament, and the result is written as a color-tagged 3MF package or as
//! a single STL with a filament swap height.
//!
//! # Example
//!
//! ```rust,no_run
//! use qrslab::{generate, Config, ExportTarget};
//!
//! let target = ExportTarget::from_path("treasure.3mf")?;
//! let report = generate("https://treasures.to/abc123", &Config::default(), &target)?;
//! println!("wrote {:?}", report.files);
//! # Ok::<(), qrslab::Error>(())
//! ```

pub mod config;
pub mod error;

pub use config::{Config, Materials};
pub use error::{Error, Result, Stage};

pub use qrslab_export::{
    export, ExportError, ExportFormat, ExportOptions, ExportReport, ExportTarget, MaterialSpec,
};
pub use qrslab_geometry::{
    partition, synthesize, GeometryError, LabelParams, LabelStyle, Material, MaterialGroup,
    OutputMode, PrintableModel, Solid, SynthesisParams,
};
pub use qrslab_matrix::{encode, encode_fit, EncodingError, ErrorCorrection, QrMatrix};
pub use qrslab_mesh::TriangleMesh;

use tracing::{debug_span, info, info_span};

/// Packaging used for a file format.
pub fn output_mode_for(format: ExportFormat) -> OutputMode {
    match format {
        ExportFormat::ThreeMf => OutputMode::Separate,
        ExportFormat::Stl => OutputMode::Merged,
    }
}

/// Encode, synthesize and partition `url` without writing anything.
pub fn build_model(url: &str, config: &Config, mode: OutputMode) -> Result<PrintableModel> {
    config.validate()?;
    let _span = info_span!("plate", url = %url).entered();
    run_geometry(url, config, mode)
}

/// Generate the plate for `url` and write it to `target`.
///
/// The packaging follows the target format: 3MF gets one object per
/// material, STL gets a merged solid plus its swap sidecar.
pub fn generate(url: &str, config: &Config, target: &ExportTarget) -> Result<ExportReport> {
    config.validate()?;
    let _span = info_span!("plate", url = %url).entered();

    let model = run_geometry(url, config, output_mode_for(target.format))?;

    let report = {
        let _stage = debug_span!("stage", stage = %Stage::Export).entered();
        export(&model, target, &config.export_options())
            .map_err(|e| Error::input(url, Stage::Export, e))?
    };
    info!(files = report.files.len(), triangles = report.triangles, "plate generated");
    Ok(report)
}

fn run_geometry(url: &str, config: &Config, mode: OutputMode) -> Result<PrintableModel> {
    let matrix = {
        let _stage = debug_span!("stage", stage = %Stage::Encode).entered();
        encode_fit(url, config.error_correction, config.min_error_correction)
            .map_err(|e| Error::input(url, Stage::Encode, e))?
    };
    info!(
        version = matrix.version(),
        modules = matrix.size(),
        ec = %matrix.ec_level(),
        "encoded"
    );

    let solids = {
        let _stage = debug_span!("stage", stage = %Stage::Synthesize).entered();
        synthesize(&matrix, &config.synthesis_params())
            .map_err(|e| Error::input(url, Stage::Synthesize, e))?
    };

    let _stage = debug_span!("stage", stage = %Stage::Partition).entered();
    partition(solids, mode).map_err(|e| Error::input(url, Stage::Partition, e))
}
