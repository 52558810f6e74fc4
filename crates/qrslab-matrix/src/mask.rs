//! Mask pattern selection.
//!
//! The mask is chosen here rather than by the symbol library so that the
//! output of a given payload never changes with a library upgrade. All
//! eight patterns are scored with the ISO/IEC 18004 penalty rules and the
//! lowest score wins; ties go to the lowest pattern index.

use qrcode::canvas::MaskPattern;
use serde::{Deserialize, Serialize};

/// Penalty weights N1..N4 from ISO/IEC 18004 section 7.8.3.
const N1: u32 = 3;
const N2: u32 = 3;
const N3: u32 = 40;
const N4: u32 = 10;

/// One of the eight standard data mask patterns, by ISO index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mask(u8);

impl Mask {
    /// All masks in index order.
    pub const ALL: [Mask; 8] = [
        Mask(0),
        Mask(1),
        Mask(2),
        Mask(3),
        Mask(4),
        Mask(5),
        Mask(6),
        Mask(7),
    ];

    /// ISO mask reference (0..=7).
    pub fn index(self) -> u8 {
        self.0
    }

    pub(crate) fn pattern(self) -> MaskPattern {
        match self.0 {
            0 => MaskPattern::Checkerboard,
            1 => MaskPattern::HorizontalLines,
            2 => MaskPattern::VerticalLines,
            3 => MaskPattern::DiagonalLines,
            4 => MaskPattern::LargeCheckerboard,
            5 => MaskPattern::Fields,
            6 => MaskPattern::Diamonds,
            _ => MaskPattern::Meadow,
        }
    }
}

impl std::fmt::Display for Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03b}", self.0)
    }
}

/// Total penalty score of a square module grid (`true` = dark).
pub fn penalty(modules: &[bool], width: usize) -> u32 {
    run_penalty(modules, width)
        + block_penalty(modules, width)
        + finder_penalty(modules, width)
        + balance_penalty(modules)
}

/// N1: runs of five or more same-colored modules in a row or column.
fn run_penalty(modules: &[bool], width: usize) -> u32 {
    let mut score = 0;
    for line in 0..width {
        for horizontal in [true, false] {
            let at = |i: usize| {
                if horizontal {
                    modules[line * width + i]
                } else {
                    modules[i * width + line]
                }
            };
            let mut run = 1;
            for i in 1..width {
                if at(i) == at(i - 1) {
                    run += 1;
                } else {
                    if run >= 5 {
                        score += N1 + (run - 5);
                    }
                    run = 1;
                }
            }
            if run >= 5 {
                score += N1 + (run - 5);
            }
        }
    }
    score
}

/// N2: 2x2 blocks of one color.
fn block_penalty(modules: &[bool], width: usize) -> u32 {
    let mut score = 0;
    for y in 0..width.saturating_sub(1) {
        for x in 0..width - 1 {
            let c = modules[y * width + x];
            if modules[y * width + x + 1] == c
                && modules[(y + 1) * width + x] == c
                && modules[(y + 1) * width + x + 1] == c
            {
                score += N2;
            }
        }
    }
    score
}

/// N3: finder-like 1:1:3:1:1 patterns flanked by four light modules.
///
/// Modules outside the symbol count as light, since the quiet zone is.
fn finder_penalty(modules: &[bool], width: usize) -> u32 {
    const LEFT: [bool; 11] = [
        true, false, true, true, true, false, true, false, false, false, false,
    ];
    const RIGHT: [bool; 11] = [
        false, false, false, false, true, false, true, true, true, false, true,
    ];

    let w = width as isize;
    let get = |x: isize, y: isize| {
        x >= 0 && y >= 0 && x < w && y < w && modules[(y * w + x) as usize]
    };

    let mut score = 0;
    for line in 0..w {
        for start in -10..w {
            for horizontal in [true, false] {
                let window = |i: isize| {
                    if horizontal {
                        get(start + i, line)
                    } else {
                        get(line, start + i)
                    }
                };
                for pattern in [&LEFT, &RIGHT] {
                    if (0..11).all(|i| window(i) == pattern[i as usize]) {
                        score += N3;
                    }
                }
            }
        }
    }
    score
}

/// N4: deviation of the dark ratio from 50%, in 5% steps.
fn balance_penalty(modules: &[bool]) -> u32 {
    if modules.is_empty() {
        return 0;
    }
    let dark = modules.iter().filter(|&&m| m).count();
    let percent = (dark * 100 / modules.len()) as i64;
    let steps = (percent - 50).unsigned_abs() / 5;
    N4 * steps as u32
}
