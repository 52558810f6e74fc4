//! Error types for model export.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from writing export files.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The model's packaging does not match the requested format.
    #[error("{format} export needs a {expected} model")]
    UnsupportedModel {
        /// Requested format.
        format: &'static str,
        /// Packaging the format accepts.
        expected: &'static str,
    },

    /// The output path has no recognized extension.
    #[error("cannot tell the export format of {0}; use .3mf or .stl")]
    UnknownFormat(PathBuf),

    /// Triangle count does not fit the file format.
    #[error("{0} triangles do not fit a binary STL")]
    TooLarge(usize),

    /// A material color is not `#RRGGBB` or `#RRGGBBAA`.
    #[error("invalid display color {0:?}")]
    InvalidColor(String),

    /// ZIP archive error.
    #[error("3MF archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Sidecar serialization error.
    #[error("sidecar error: {0}")]
    Sidecar(#[from] toml::ser::Error),

    /// IO error on a specific file.
    #[error("cannot write {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// IO error while assembling a file in memory.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
