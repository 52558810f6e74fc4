//! Pipeline error type.

use std::fmt;
use std::path::PathBuf;

use qrslab_export::ExportError;
use qrslab_geometry::GeometryError;
use qrslab_matrix::EncodingError;
use thiserror::Error;

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// URL to QR matrix.
    Encode,
    /// Matrix to solids.
    Synthesize,
    /// Solids to material groups.
    Partition,
    /// Model to files.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Encode => "encode",
            Stage::Synthesize => "synthesize",
            Stage::Partition => "partition",
            Stage::Export => "export",
        })
    }
}

/// Errors from configuration and the generation pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration values are out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("cannot read configuration {path}: {source}")]
    ConfigFile {
        /// Configuration file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::Config`].
    #[error("cannot parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// QR encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Geometry synthesis or partitioning failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Writing files failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// A failure tied to one input URL and pipeline stage.
    #[error("{url}: {stage} failed: {source}")]
    Input {
        /// Input URL.
        url: String,
        /// Failing stage.
        stage: Stage,
        /// Underlying error.
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn input(url: &str, stage: Stage, source: impl Into<Error>) -> Self {
        Error::Input {
            url: url.to_string(),
            stage,
            source: Box::new(source.into()),
        }
    }

    /// The error without input context.
    pub fn root(&self) -> &Error {
        match self {
            Error::Input { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stage of the failure, if it came from the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Input { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
