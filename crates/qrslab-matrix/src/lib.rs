#![warn(missing_docs)]

//! QR module matrices for qrslab.
//!
//! Wraps the `qrcode` crate's symbol construction (bit stream, Reed-Solomon
//! codewords, function patterns) and pins the two choices that would
//! otherwise depend on the library version:
//!
//! - payloads are always encoded as a single byte-mode segment, and
//! - the data mask is selected by [`mask::penalty`] in this crate.
//!
//! # Example
//!
//! ```rust
//! use qrslab_matrix::{encode, ErrorCorrection};
//!
//! let matrix = encode("https://treasures.to/abc", ErrorCorrection::M).unwrap();
//! assert_eq!(matrix.size() % 2, 1);
//! ```

pub mod error;
pub mod mask;

pub use error::{EncodingError, Result};
pub use mask::Mask;

use qrcode::bits::Bits;
use qrcode::canvas::Canvas;
use qrcode::types::{Color, EcLevel, QrError, Version};
use serde::{Deserialize, Serialize};

/// Width of the light border required around the symbol, in modules.
pub const QUIET_ZONE_MODULES: usize = 4;

/// Highest QR version (177x177 modules).
const MAX_VERSION: i16 = 40;

/// Error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// ~7% recovery.
    L,
    /// ~15% recovery.
    M,
    /// ~25% recovery.
    Q,
    /// ~30% recovery.
    H,
}

impl ErrorCorrection {
    /// The next weaker level, if any.
    pub fn weaker(self) -> Option<Self> {
        match self {
            ErrorCorrection::H => Some(ErrorCorrection::Q),
            ErrorCorrection::Q => Some(ErrorCorrection::M),
            ErrorCorrection::M => Some(ErrorCorrection::L),
            ErrorCorrection::L => None,
        }
    }

    fn to_ec_level(self) -> EcLevel {
        match self {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

impl std::fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCorrection::L => "L",
            ErrorCorrection::M => "M",
            ErrorCorrection::Q => "Q",
            ErrorCorrection::H => "H",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(ErrorCorrection::L),
            "M" => Ok(ErrorCorrection::M),
            "Q" => Ok(ErrorCorrection::Q),
            "H" => Ok(ErrorCorrection::H),
            other => Err(format!("unknown error-correction level '{other}'")),
        }
    }
}

/// Square grid of QR modules, quiet zone excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    size: usize,
    modules: Vec<bool>,
    version: u8,
    ec_level: ErrorCorrection,
    mask: Mask,
}

impl QrMatrix {
    /// Side length in modules.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the module at column `x`, row `y` (row 0 at the top) is dark.
    ///
    /// Coordinates outside the grid are quiet zone and therefore light.
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.modules[y * self.size + x]
    }

    /// Number of dark modules.
    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|&&m| m).count()
    }

    /// Symbol version (1..=40).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Error-correction level the symbol was built with.
    pub fn ec_level(&self) -> ErrorCorrection {
        self.ec_level
    }

    /// Data mask applied to the symbol.
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Rows of modules, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.modules.chunks(self.size)
    }

    /// Render as text, one line per row (`#` dark, `.` light). Used in logs
    /// and test failure output.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(self.size * (self.size + 1));
        for row in self.rows() {
            out.extend(row.iter().map(|&d| if d { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }
}

/// Encode `payload` at exactly `level`.
///
/// Uses the smallest version whose byte-mode capacity holds the payload.
pub fn encode(payload: &str, level: ErrorCorrection) -> Result<QrMatrix> {
    let data = payload.as_bytes();
    if data.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }

    let bits = byte_mode_bits(data, level)?;
    let version = bits.version();
    let ec_level = level.to_ec_level();
    let (codewords, ec) = qrcode::ec::construct_codewords(&bits.into_bytes(), version, ec_level)
        .map_err(|e| EncodingError::Symbol(e.to_string()))?;

    let mut canvas = Canvas::new(version, ec_level);
    canvas.draw_all_functional_patterns();
    canvas.draw_data(&codewords, &ec);

    let width = version.width() as usize;
    let mut best: Option<(u32, Mask, Vec<bool>)> = None;
    for mask in Mask::ALL {
        let mut candidate = canvas.clone();
        candidate.apply_mask(mask.pattern());
        let modules: Vec<bool> = candidate
            .into_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        let score = mask::penalty(&modules, width);
        // Strict comparison keeps the lowest index on ties.
        if best.as_ref().map_or(true, |(s, _, _)| score < *s) {
            best = Some((score, mask, modules));
        }
    }
    let (score, mask, modules) =
        best.ok_or_else(|| EncodingError::Symbol("no mask pattern evaluated".into()))?;

    let version_number = match version {
        Version::Normal(v) => v as u8,
        Version::Micro(v) => v as u8,
    };
    tracing::debug!(
        version = version_number,
        size = width,
        %level,
        %mask,
        penalty = score,
        "encoded QR matrix"
    );

    Ok(QrMatrix {
        size: width,
        modules,
        version: version_number,
        ec_level: level,
        mask,
    })
}

/// Encode `payload` at `preferred`, stepping down to weaker levels until the
/// payload fits or `minimum` has been tried.
pub fn encode_fit(
    payload: &str,
    preferred: ErrorCorrection,
    minimum: ErrorCorrection,
) -> Result<QrMatrix> {
    if minimum > preferred {
        return Err(EncodingError::InvalidLevelRange { preferred, minimum });
    }
    let mut level = preferred;
    loop {
        match encode(payload, level) {
            Err(EncodingError::PayloadTooLong { .. }) if level > minimum => {
                // `level > minimum` guarantees a weaker level exists.
                let Some(next) = level.weaker() else { break };
                tracing::debug!(from = %level, to = %next, "payload too long, lowering error correction");
                level = next;
            }
            other => return other,
        }
    }
    Err(EncodingError::PayloadTooLong {
        len: payload.len(),
        weakest: level,
    })
}

/// Build the terminated byte-mode bit stream in the smallest fitting version.
fn byte_mode_bits(data: &[u8], level: ErrorCorrection) -> Result<Bits> {
    let ec_level = level.to_ec_level();
    for v in 1..=MAX_VERSION {
        let mut bits = Bits::new(Version::Normal(v));
        let pushed = match bits.push_byte_data(data) {
            Ok(()) => bits.push_terminator(ec_level),
            Err(e) => Err(e),
        };
        match pushed {
            Ok(()) => return Ok(bits),
            Err(QrError::DataTooLong) => continue,
            Err(e) => return Err(EncodingError::Symbol(e.to_string())),
        }
    }
    Err(EncodingError::PayloadTooLong {
        len: data.len(),
        weakest: level,
    })
}
