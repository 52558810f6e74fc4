//! Error types for QR encoding.

use thiserror::Error;

use crate::ErrorCorrection;

/// Errors that can occur while encoding a payload into a module matrix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Nothing to encode.
    #[error("payload is empty")]
    EmptyPayload,

    /// Payload does not fit in a version 40 symbol at any acceptable level.
    #[error("payload of {len} bytes does not fit a QR symbol at error-correction level {weakest} or stronger")]
    PayloadTooLong {
        /// Payload length in bytes.
        len: usize,
        /// Weakest error-correction level that was tried.
        weakest: ErrorCorrection,
    },

    /// The requested level range is inverted.
    #[error("minimum error-correction level {minimum} is stronger than the preferred level {preferred}")]
    InvalidLevelRange {
        /// Preferred level.
        preferred: ErrorCorrection,
        /// Lowest acceptable level.
        minimum: ErrorCorrection,
    },

    /// The underlying symbol builder rejected the data.
    #[error("QR symbol construction failed: {0}")]
    Symbol(String),
}

/// Result type for encoding operations.
pub type Result<T> = std::result::Result<T, EncodingError>;
