//! QR matrix to plate geometry.
//!
//! The plate is laid out bottom-up: a label band along the front edge,
//! then the QR symbol (with its quiet zone) as a square flush with the back
//! edge. Origin is the plate's lower-left corner on the bed, Z up.
//!
//! Plate corners are rounded with a staircase on the lattice. Modules and
//! label pixels that would touch only at a corner are pulled apart by a
//! small notch, so every exported edge has exactly two faces even after an
//! STL reader welds vertices by position.

use qrslab_matrix::{QrMatrix, QUIET_ZONE_MODULES};
use qrslab_mesh::heightfield::LATTICE_EPSILON;
use qrslab_mesh::HeightField;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GeometryError, Result};
use crate::font::{self, Bitmap, GLYPH_HEIGHT};
use crate::Solid;

/// How the label is formed in the plate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStyle {
    /// Label cells replace the top `text_height` of the plate, flush with its top.
    #[default]
    Inlay,
    /// Label stands `text_height` proud of the plate top.
    Raised,
}

/// Label text and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelParams {
    /// Text to print; rendered with the built-in 5x7 font.
    pub text: String,
    /// Cap height of the rendered glyphs (mm).
    pub glyph_height_mm: f64,
    /// Clearance above and below the label, and to the plate sides (mm).
    pub margin_mm: f64,
    /// Inlaid or raised.
    pub style: LabelStyle,
}

impl Default for LabelParams {
    fn default() -> Self {
        Self {
            text: "treasures.to".into(),
            glyph_height_mm: 5.0,
            margin_mm: 3.0,
            style: LabelStyle::Inlay,
        }
    }
}

/// Geometry synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisParams {
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
    /// Radius of the plate's vertical corner edges (mm); 0 for square corners.
    pub corner_radius_mm: f64,
    /// Label.
    pub label: LabelParams,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            qr_size_mm: 70.0,
            base_height_mm: 3.0,
            accent_height_mm: 1.5,
            text_height_mm: 2.0,
            min_feature_mm: 0.4,
            corner_radius_mm: 4.0,
            label: LabelParams::default(),
        }
    }
}

impl SynthesisParams {
    /// Validate parameters.
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("qr_size_mm", self.qr_size_mm),
            ("base_height_mm", self.base_height_mm),
            ("accent_height_mm", self.accent_height_mm),
            ("text_height_mm", self.text_height_mm),
            ("min_feature_mm", self.min_feature_mm),
            ("label.glyph_height_mm", self.label.glyph_height_mm),
            ("label.margin_mm", self.label.margin_mm),
        ];
        for (name, value) in dims {
            if !value.is_finite() || value <= 0.0 {
                return Err(GeometryError::InvalidDimension { name, value });
            }
        }
        if !self.corner_radius_mm.is_finite() || self.corner_radius_mm < 0.0 {
            return Err(GeometryError::InvalidDimension {
                name: "corner_radius_mm",
                value: self.corner_radius_mm,
            });
        }
        if self.label.style == LabelStyle::Inlay && self.text_height_mm >= self.base_height_mm {
            return Err(GeometryError::InlayTooDeep {
                depth_mm: self.text_height_mm,
                base_mm: self.base_height_mm,
            });
        }
        Ok(())
    }
}

/// Where everything landed on the plate.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Plate side (mm).
    pub plate_size_mm: f64,
    /// Modules per side, quiet zone excluded.
    pub modules: usize,
    /// Module pitch (mm).
    pub pitch_mm: f64,
    /// Lower-left corner of module row `N-1`, column 0.
    pub grid_origin_mm: [f64; 2],
    /// Height of the reserved label band along the front edge (mm).
    pub label_band_mm: f64,
    /// Lower-left corner of the rendered label, if there is one.
    pub label_origin_mm: Option<[f64; 2]>,
    /// Label pixel size (mm).
    pub label_pixel_mm: f64,
    /// Label style.
    pub label_style: LabelStyle,
    /// Plate thickness (mm).
    pub base_height_mm: f64,
    /// Corner radius actually used (mm).
    pub corner_radius_mm: f64,
}

impl Layout {
    /// XY center of module `(x, y)`, row 0 at the back edge.
    pub fn module_center(&self, x: usize, y: usize) -> [f64; 2] {
        let row_from_front = self.modules - 1 - y;
        [
            self.grid_origin_mm[0] + (x as f64 + 0.5) * self.pitch_mm,
            self.grid_origin_mm[1] + (row_from_front as f64 + 0.5) * self.pitch_mm,
        ]
    }

    /// Side of the symbol square including the quiet zone (mm).
    pub fn symbol_side_mm(&self) -> f64 {
        (self.modules + 2 * QUIET_ZONE_MODULES) as f64 * self.pitch_mm
    }
}

/// The three solids of a plate.
#[derive(Debug, Clone)]
pub struct SynthesizedSolids {
    /// Plate, bottom at Z=0.
    pub base: Solid,
    /// Dark modules on top of the plate.
    pub accent: Solid,
    /// Label; `None` when the label has no lit pixels.
    pub text: Option<Solid>,
    /// Placement details.
    pub layout: Layout,
}

/// Build base, accent and label solids for `matrix`.
pub fn synthesize(matrix: &QrMatrix, params: &SynthesisParams) -> Result<SynthesizedSolids> {
    params.validate()?;
    let bitmap = font::render(&params.label.text)?;
    let layout = plan(matrix, params, &bitmap)?;
    debug!(
        modules = layout.modules,
        pitch_mm = layout.pitch_mm,
        label_pixels = bitmap.lit_count(),
        "plate layout"
    );

    let b = params.base_height_mm;
    let t = params.text_height_mm;
    // Well under any cell, which is at least min_feature wide.
    let notch = params.min_feature_mm / 8.0;

    let text_field = match layout.label_origin_mm {
        Some(origin) => Some(label_field(&bitmap, origin, &layout, t)?.separate_diagonals(notch)?),
        None => None,
    };
    let mut base_field = HeightField::cuboid(0.0, 0.0, params.qr_size_mm, params.qr_size_mm, 0.0, b)?;
    if let (Some(text), LabelStyle::Inlay) = (&text_field, layout.label_style) {
        base_field = pocketed(&base_field, b - t, text)?;
    }
    let base_field = round_corners(
        &base_field,
        params.qr_size_mm,
        layout.corner_radius_mm,
        params.min_feature_mm / 2.0,
    )?;
    let accent_field =
        module_field(matrix, &layout, params.accent_height_mm)?.separate_diagonals(notch)?;

    let base = Solid::from_field("base", base_field)?;
    let accent = Solid::from_field("accent", accent_field)?;
    let text = text_field
        .map(|field| Solid::from_field("label", field))
        .transpose()?;

    debug!(
        base_triangles = base.mesh.num_triangles(),
        accent_triangles = accent.mesh.num_triangles(),
        label_triangles = text.as_ref().map_or(0, |s| s.mesh.num_triangles()),
        "solids synthesized"
    );
    Ok(SynthesizedSolids {
        base,
        accent,
        text,
        layout,
    })
}

fn plan(matrix: &QrMatrix, params: &SynthesisParams, bitmap: &Bitmap) -> Result<Layout> {
    let plate = params.qr_size_mm;
    let min = params.min_feature_mm;
    let n = matrix.size();
    let units = (n + 2 * QUIET_ZONE_MODULES) as f64;

    // Even a full-plate symbol would be too fine.
    if plate / units < min {
        return Err(GeometryError::FeatureTooSmall {
            feature: "QR module",
            size_mm: plate / units,
            min_mm: min,
        });
    }

    let label = &params.label;
    let has_label = bitmap.lit_count() > 0;
    let band = if has_label {
        2.0 * label.margin_mm + label.glyph_height_mm
    } else {
        0.0
    };
    let side = plate - band;
    if side <= LATTICE_EPSILON {
        return Err(GeometryError::LabelDoesNotFit(format!(
            "a {band:.2} mm label band leaves no room for the symbol on a {plate:.2} mm plate"
        )));
    }
    let pitch = side / units;
    if pitch < min {
        return Err(GeometryError::FeatureTooSmall {
            feature: "QR module",
            size_mm: pitch,
            min_mm: min,
        });
    }

    let pixel = label.glyph_height_mm / GLYPH_HEIGHT as f64;
    let label_origin = if has_label {
        if pixel < min {
            return Err(GeometryError::FeatureTooSmall {
                feature: "label pixel",
                size_mm: pixel,
                min_mm: min,
            });
        }
        let width = bitmap.width() as f64 * pixel;
        let available = plate - 2.0 * label.margin_mm;
        if width > available + LATTICE_EPSILON {
            return Err(GeometryError::LabelDoesNotFit(format!(
                "{:?} is {width:.2} mm wide but only {available:.2} mm are available",
                label.text
            )));
        }
        Some([(plate - width) / 2.0, label.margin_mm])
    } else {
        None
    };

    let quiet = QUIET_ZONE_MODULES as f64 * pitch;
    let grid_origin = [(plate - side) / 2.0 + quiet, band + quiet];
    let extent = n as f64 * pitch;
    let mut features = vec![[
        grid_origin[0],
        grid_origin[1],
        grid_origin[0] + extent,
        grid_origin[1] + extent,
    ]];
    if let Some([x, y]) = label_origin {
        features.push([
            x,
            y,
            x + bitmap.width() as f64 * pixel,
            y + bitmap.height() as f64 * pixel,
        ]);
    }
    let corner = corner_radius(params.corner_radius_mm, plate, &features);
    if corner < params.corner_radius_mm - LATTICE_EPSILON {
        warn!(
            requested_mm = params.corner_radius_mm,
            used_mm = corner,
            "corner radius reduced to keep clear of the symbol and label"
        );
    }

    Ok(Layout {
        plate_size_mm: plate,
        modules: n,
        pitch_mm: pitch,
        grid_origin_mm: grid_origin,
        label_band_mm: band,
        label_origin_mm: label_origin,
        label_pixel_mm: pixel,
        label_style: label.style,
        base_height_mm: params.base_height_mm,
        corner_radius_mm: corner,
    })
}

/// Largest radius up to `requested` whose corner squares stay clear of
/// every `[x0, y0, x1, y1]` feature rectangle.
fn corner_radius(requested: f64, plate: f64, features: &[[f64; 4]]) -> f64 {
    let mut radius = requested.min(plate / 2.0);
    for &[x0, y0, x1, y1] in features {
        let (left, right) = (x0, plate - x1);
        let (front, back) = (y0, plate - y1);
        // A corner square of side r overlaps the rectangle only if the
        // rectangle is closer than r to both edges of that corner.
        for (dx, dy) in [(left, front), (right, front), (left, back), (right, back)] {
            radius = radius.min(dx.max(dy));
        }
    }
    radius.max(0.0)
}

fn module_field(matrix: &QrMatrix, layout: &Layout, accent_height: f64) -> Result<HeightField> {
    let n = layout.modules;
    let b = layout.base_height_mm;
    let [x0, y0] = layout.grid_origin_mm;
    let mut field = HeightField::grid(x0, y0, layout.pitch_mm, n, n, b)?;
    for y in 0..n {
        for x in 0..n {
            if matrix.is_dark(x, y) {
                field.set(x, n - 1 - y, b + accent_height)?;
            }
        }
    }
    Ok(field)
}

fn label_field(
    bitmap: &Bitmap,
    origin: [f64; 2],
    layout: &Layout,
    text_height: f64,
) -> Result<HeightField> {
    let b = layout.base_height_mm;
    let (bottom, top) = match layout.label_style {
        LabelStyle::Inlay => (b - text_height, b),
        LabelStyle::Raised => (b, b + text_height),
    };
    let h = bitmap.height();
    let mut field = HeightField::grid(
        origin[0],
        origin[1],
        layout.label_pixel_mm,
        bitmap.width(),
        h,
        bottom,
    )?;
    for row in 0..h {
        for col in 0..bitmap.width() {
            if bitmap.is_lit(col, row) {
                field.set(col, h - 1 - row, top)?;
            }
        }
    }
    Ok(field)
}

/// `plate` with the cells under the label lowered to `floor`.
fn pocketed(plate: &HeightField, floor: f64, text: &HeightField) -> Result<HeightField> {
    let mut field = plate.refined(text.xs(), text.ys())?;
    for j in 0..field.ny() {
        for i in 0..field.nx() {
            let [cx, cy] = field.cell_center(i, j);
            if text.column_at(cx, cy).is_some() {
                field.set(i, j, floor)?;
            }
        }
    }
    Ok(field)
}

/// Cut the four vertical corners of a `size` square plate to a staircase
/// following a quarter circle of `radius`, in steps of at most `step`.
fn round_corners(plate: &HeightField, size: f64, radius: f64, step: f64) -> Result<HeightField> {
    let steps = (radius / step).ceil() as usize;
    if radius <= LATTICE_EPSILON || steps < 2 {
        return Ok(plate.clone());
    }
    let lines: Vec<f64> = (1..=steps)
        .map(|k| radius * k as f64 / steps as f64)
        .flat_map(|d| [d, size - d])
        .collect();
    let mut field = plate.refined(&lines, &lines)?;
    for j in 0..field.ny() {
        for i in 0..field.nx() {
            let [cx, cy] = field.cell_center(i, j);
            let dx = (radius - cx).max(cx - (size - radius)).max(0.0);
            let dy = (radius - cy).max(cy - (size - radius)).max(0.0);
            if dx * dx + dy * dy > radius * radius {
                field.clear(i, j)?;
            }
        }
    }
    Ok(field)
}
