//! Fixed 5x7 bitmap font for plate labels.

use crate::error::{GeometryError, Result};

/// Glyph width in pixels.
pub const GLYPH_WIDTH: usize = 5;
/// Glyph height in pixels.
pub const GLYPH_HEIGHT: usize = 7;
/// Blank pixel columns between neighboring glyphs.
pub const GLYPH_SPACING: usize = 1;

/// Rows top to bottom; bit 4 is the leftmost pixel.
type Glyph = [u8; GLYPH_HEIGHT];

fn glyph(c: char) -> Option<Glyph> {
    let rows = match c.to_ascii_uppercase() {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '&' => [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        '@' => [0x0E, 0x11, 0x01, 0x0D, 0x15, 0x15, 0x0E],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        _ => return None,
    };
    Some(rows)
}

/// A rendered label: `width` x [`GLYPH_HEIGHT`] pixels, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    pixels: Vec<bool>,
}

impl Bitmap {
    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        GLYPH_HEIGHT
    }

    /// True if pixel `(col, row)` is lit. Out-of-range pixels are unlit.
    pub fn is_lit(&self, col: usize, row: usize) -> bool {
        col < self.width && row < GLYPH_HEIGHT && self.pixels[row * self.width + col]
    }

    /// Number of lit pixels.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }
}

/// Render `text` with the built-in font.
///
/// Lowercase letters are folded to uppercase. Any other character missing
/// from the font fails with [`GeometryError::UnsupportedGlyph`].
pub fn render(text: &str) -> Result<Bitmap> {
    let glyphs = text
        .chars()
        .map(|c| glyph(c).ok_or(GeometryError::UnsupportedGlyph(c)))
        .collect::<Result<Vec<_>>>()?;

    let width = match glyphs.len() {
        0 => 0,
        n => n * (GLYPH_WIDTH + GLYPH_SPACING) - GLYPH_SPACING,
    };
    let mut pixels = vec![false; width * GLYPH_HEIGHT];
    for (k, rows) in glyphs.iter().enumerate() {
        let x0 = k * (GLYPH_WIDTH + GLYPH_SPACING);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) != 0 {
                    pixels[row * width + x0 + col] = true;
                }
            }
        }
    }
    Ok(Bitmap { width, pixels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_width() {
        let bitmap = render("treasures.to").unwrap();
        assert_eq!(bitmap.width(), 12 * 6 - 1);
        assert_eq!(bitmap.height(), 7);
        assert!(bitmap.lit_count() > 0);
    }

    #[test]
    fn test_lowercase_folds() {
        assert_eq!(render("abc").unwrap(), render("ABC").unwrap());
    }

    #[test]
    fn test_glyph_pixels() {
        let bitmap = render("T").unwrap();
        for col in 0..5 {
            assert!(bitmap.is_lit(col, 0));
        }
        assert!(bitmap.is_lit(2, 6));
        assert!(!bitmap.is_lit(0, 6));
        assert!(!bitmap.is_lit(5, 0));
    }

    #[test]
    fn test_spacing_column_is_blank() {
        let bitmap = render("HH").unwrap();
        for row in 0..7 {
            assert!(!bitmap.is_lit(5, row));
        }
    }

    #[test]
    fn test_space_is_blank() {
        let bitmap = render(" ").unwrap();
        assert_eq!(bitmap.width(), 5);
        assert_eq!(bitmap.lit_count(), 0);
    }

    #[test]
    fn test_unsupported_glyph() {
        assert_eq!(render("a~b"), Err(GeometryError::UnsupportedGlyph('~')));
        assert_eq!(render("é"), Err(GeometryError::UnsupportedGlyph('é')));
    }

    #[test]
    fn test_empty_text() {
        let bitmap = render("").unwrap();
        assert_eq!(bitmap.width(), 0);
        assert_eq!(bitmap.lit_count(), 0);
    }
}
