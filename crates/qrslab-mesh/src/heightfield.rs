//! Rectilinear height fields and their meshing.
//!
//! A [`HeightField`] is a set of vertical prisms over a rectilinear lattice.
//! All prisms share one bottom plane; each lattice cell is either empty or
//! holds a column `[bottom, top]`.
//!
//! Meshing splits the field into slabs at every distinct Z level. Each slab
//! gets walls around its footprint, and a horizontal face is emitted
//! wherever the footprint changes from one slab to the next. Because every
//! wall spans exactly one slab there are no T-junctions on vertical edges.
//!
//! Lattice vertices are shared between neighboring cells, with one
//! exception: at a "saddle" corner, where only two diagonally opposite
//! cells are solid at some level, each of the two cells gets its own vertex
//! copy so that every edge stays shared by exactly two triangles.
//!
//! Those copies sit at the same position, so a consumer that welds vertices
//! by position (any STL reader) sees four triangles on the shared vertical
//! edge. [`HeightField::separate_diagonals`] removes such contacts from the
//! field itself before meshing.

use std::collections::HashMap;

use crate::error::{MeshError, Result};
use crate::TriangleMesh;

/// Break lines and levels closer than this are treated as equal (mm).
pub const LATTICE_EPSILON: f64 = 1e-9;

/// Vertical prisms over a rectilinear lattice sharing one bottom plane.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    xs: Vec<f64>,
    ys: Vec<f64>,
    bottom: f64,
    tops: Vec<Option<f64>>,
}

// Quadrants around a lattice point, in cyclic order.
const SW: usize = 0;
const SE: usize = 1;
const NE: usize = 2;
const NW: usize = 3;

impl HeightField {
    /// Create an empty field over the lattice with break lines `xs` and `ys`.
    ///
    /// Both lists need at least two strictly increasing finite values.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, bottom: f64) -> Result<Self> {
        check_lines("x", &xs)?;
        check_lines("y", &ys)?;
        if !bottom.is_finite() {
            return Err(MeshError::InvalidLattice(format!(
                "bottom {bottom} is not finite"
            )));
        }
        let cells = (xs.len() - 1) * (ys.len() - 1);
        Ok(Self {
            xs,
            ys,
            bottom,
            tops: vec![None; cells],
        })
    }

    /// A single solid box `[x0, x1] x [y0, y1] x [bottom, top]`.
    pub fn cuboid(x0: f64, y0: f64, x1: f64, y1: f64, bottom: f64, top: f64) -> Result<Self> {
        let mut field = Self::new(vec![x0, x1], vec![y0, y1], bottom)?;
        field.set(0, 0, top)?;
        Ok(field)
    }

    /// Uniform `nx` x `ny` lattice of `pitch`-sized cells starting at `(x0, y0)`.
    pub fn grid(x0: f64, y0: f64, pitch: f64, nx: usize, ny: usize, bottom: f64) -> Result<Self> {
        let xs = (0..=nx).map(|i| x0 + i as f64 * pitch).collect();
        let ys = (0..=ny).map(|j| y0 + j as f64 * pitch).collect();
        Self::new(xs, ys, bottom)
    }

    /// Number of cells along X.
    pub fn nx(&self) -> usize {
        self.xs.len() - 1
    }

    /// Number of cells along Y.
    pub fn ny(&self) -> usize {
        self.ys.len() - 1
    }

    /// X break lines.
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Y break lines.
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Common bottom plane.
    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Highest column top, or `None` when the field is empty.
    pub fn max_top(&self) -> Option<f64> {
        self.tops.iter().flatten().copied().reduce(f64::max)
    }

    /// True when no cell holds a column.
    pub fn is_empty(&self) -> bool {
        self.tops.iter().all(Option::is_none)
    }

    /// Number of solid cells.
    pub fn filled_count(&self) -> usize {
        self.tops.iter().filter(|t| t.is_some()).count()
    }

    /// Column top of cell `(i, j)`, if solid.
    pub fn top(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.nx() && j < self.ny() {
            self.tops[j * self.nx() + i]
        } else {
            None
        }
    }

    /// Make cell `(i, j)` a column from the bottom plane up to `top`.
    pub fn set(&mut self, i: usize, j: usize, top: f64) -> Result<()> {
        let idx = self.index(i, j)?;
        if !top.is_finite() || top <= self.bottom + LATTICE_EPSILON {
            return Err(MeshError::InvalidColumn {
                top,
                bottom: self.bottom,
            });
        }
        self.tops[idx] = Some(top);
        Ok(())
    }

    /// Empty cell `(i, j)`.
    pub fn clear(&mut self, i: usize, j: usize) -> Result<()> {
        let idx = self.index(i, j)?;
        self.tops[idx] = None;
        Ok(())
    }

    /// Solid cells as `(i, j, top)`, row by row from the bottom.
    pub fn filled_cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let nx = self.nx();
        self.tops
            .iter()
            .enumerate()
            .filter_map(move |(idx, top)| top.map(|t| (idx % nx, idx / nx, t)))
    }

    /// Column `(bottom, top)` of the cell containing `(x, y)`.
    ///
    /// Cells are half-open `[x_i, x_{i+1})`; points outside the lattice
    /// have no column.
    pub fn column_at(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let i = locate(&self.xs, x)?;
        let j = locate(&self.ys, y)?;
        self.top(i, j).map(|t| (self.bottom, t))
    }

    /// XY center of cell `(i, j)`.
    pub fn cell_center(&self, i: usize, j: usize) -> [f64; 2] {
        [
            (self.xs[i] + self.xs[i + 1]) / 2.0,
            (self.ys[j] + self.ys[j + 1]) / 2.0,
        ]
    }

    /// Cell `(i, j)` containing `(x, y)`, using the same half-open rule as
    /// [`column_at`](Self::column_at).
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((locate(&self.xs, x)?, locate(&self.ys, y)?))
    }

    /// The same solid on a lattice with the extra break lines added.
    pub fn refined(&self, xs: &[f64], ys: &[f64]) -> Result<HeightField> {
        let mut out = HeightField::new(
            merge_lines(&self.xs, xs),
            merge_lines(&self.ys, ys),
            self.bottom,
        )?;
        for j in 0..out.ny() {
            for i in 0..out.nx() {
                let [cx, cy] = out.cell_center(i, j);
                if let Some((_, top)) = self.column_at(cx, cy) {
                    out.set(i, j, top)?;
                }
            }
        }
        Ok(out)
    }

    /// Break corner-only contacts between columns.
    ///
    /// Where the two cells on one diagonal of a lattice point both rise above
    /// the two cells on the other diagonal, the lower of the pair (the east
    /// one on a tie) has a `notch` x `notch` square at that corner cut down
    /// to the taller of the other two. The result has no saddle corners, so
    /// its mesh stays manifold after welding vertices by position. A field
    /// without saddles comes back unchanged.
    pub fn separate_diagonals(&self, notch: f64) -> Result<HeightField> {
        let cuts = self.diagonal_cuts();
        if cuts.is_empty() {
            return Ok(self.clone());
        }

        let mut xs = Vec::with_capacity(cuts.len());
        let mut ys = Vec::with_capacity(cuts.len());
        for cut in &cuts {
            let (i, j) = cut.cell;
            let span = (self.xs[i + 1] - self.xs[i]).min(self.ys[j + 1] - self.ys[j]);
            if notch <= LATTICE_EPSILON || 2.0 * notch >= span - LATTICE_EPSILON {
                return Err(MeshError::InvalidLattice(format!(
                    "notch {notch} does not fit cell ({i}, {j}) of width {span}"
                )));
            }
            let [x, y] = cut.inner_corner(notch);
            xs.push(x);
            ys.push(y);
        }

        let mut out = self.refined(&xs, &ys)?;
        for cut in &cuts {
            let [x, y] = cut.inner_corner(notch / 2.0);
            let Some((i, j)) = out.cell_at(x, y) else {
                continue;
            };
            match cut.floor {
                Some(top) => out.set(i, j, top)?,
                None => out.clear(i, j)?,
            }
        }
        Ok(out)
    }

    /// Saddle corners and the cell to cut at each.
    fn diagonal_cuts(&self) -> Vec<DiagonalCut> {
        let height = |(i, j): (usize, usize)| self.top(i, j).unwrap_or(self.bottom);
        let mut cuts = Vec::new();
        for gy in 1..self.ny() {
            for gx in 1..self.nx() {
                let sw = (gx - 1, gy - 1);
                let se = (gx, gy - 1);
                let ne = (gx, gy);
                let nw = (gx - 1, gy);
                for (pair, other) in [([sw, ne], [se, nw]), ([se, nw], [sw, ne])] {
                    let (a, b) = (height(pair[0]), height(pair[1]));
                    let floor = height(other[0]).max(height(other[1]));
                    if a.min(b) <= floor + LATTICE_EPSILON {
                        continue;
                    }
                    let cell = if (a - b).abs() <= LATTICE_EPSILON {
                        if pair[0].0 == gx {
                            pair[0]
                        } else {
                            pair[1]
                        }
                    } else if a < b {
                        pair[0]
                    } else {
                        pair[1]
                    };
                    cuts.push(DiagonalCut {
                        corner: [self.xs[gx], self.ys[gy]],
                        east: cell.0 == gx,
                        north: cell.1 == gy,
                        cell,
                        floor: (floor > self.bottom + LATTICE_EPSILON).then_some(floor),
                    });
                }
            }
        }
        cuts
    }

    /// Exact enclosed volume.
    pub fn volume(&self) -> f64 {
        self.filled_cells()
            .map(|(i, j, top)| {
                (self.xs[i + 1] - self.xs[i]) * (self.ys[j + 1] - self.ys[j]) * (top - self.bottom)
            })
            .sum()
    }

    /// Union with `other`.
    ///
    /// Both fields are resampled on the merged lattice. Per cell, columns
    /// that touch or overlap are joined; the result must still rest on one
    /// common bottom plane (the lower of the two), so a column that would
    /// float above it, or two columns separated by a gap, is an error.
    pub fn union(&self, other: &HeightField) -> Result<HeightField> {
        let xs = merge_lines(&self.xs, &other.xs);
        let ys = merge_lines(&self.ys, &other.ys);
        let bottom = self.bottom.min(other.bottom);
        let mut out = HeightField::new(xs, ys, bottom)?;

        for j in 0..out.ny() {
            let cy = (out.ys[j] + out.ys[j + 1]) / 2.0;
            for i in 0..out.nx() {
                let cx = (out.xs[i] + out.xs[i + 1]) / 2.0;
                let joined = match (self.column_at(cx, cy), other.column_at(cx, cy)) {
                    (None, None) => continue,
                    (Some(a), None) | (None, Some(a)) => a,
                    (Some(a), Some(b)) => {
                        let touching = a.0 <= b.1 + LATTICE_EPSILON && b.0 <= a.1 + LATTICE_EPSILON;
                        if !touching {
                            return Err(MeshError::DisjointColumns { x: cx, y: cy });
                        }
                        (a.0.min(b.0), a.1.max(b.1))
                    }
                };
                if joined.0 > bottom + LATTICE_EPSILON {
                    return Err(MeshError::FloatingColumn {
                        x: cx,
                        y: cy,
                        lo: joined.0,
                        bottom,
                    });
                }
                out.set(i, j, joined.1)?;
            }
        }
        Ok(out)
    }

    /// Mesh the field into a closed, outward-oriented triangle mesh.
    ///
    /// Saddle corners are kept manifold by index only; see
    /// [`separate_diagonals`](Self::separate_diagonals).
    pub fn to_mesh(&self) -> TriangleMesh {
        Mesher::new(self).run()
    }

    fn index(&self, i: usize, j: usize) -> Result<usize> {
        if i < self.nx() && j < self.ny() {
            Ok(j * self.nx() + i)
        } else {
            Err(MeshError::CellOutOfRange {
                i,
                j,
                nx: self.nx(),
                ny: self.ny(),
            })
        }
    }
}

fn check_lines(axis: &str, lines: &[f64]) -> Result<()> {
    if lines.len() < 2 {
        return Err(MeshError::InvalidLattice(format!(
            "{axis} needs at least two break lines"
        )));
    }
    if lines.iter().any(|v| !v.is_finite()) {
        return Err(MeshError::InvalidLattice(format!(
            "{axis} break lines must be finite"
        )));
    }
    if lines.windows(2).any(|w| w[1] - w[0] <= LATTICE_EPSILON) {
        return Err(MeshError::InvalidLattice(format!(
            "{axis} break lines must be strictly increasing"
        )));
    }
    Ok(())
}

/// Index of the half-open interval of `lines` containing `v`.
fn locate(lines: &[f64], v: f64) -> Option<usize> {
    let last = *lines.last()?;
    if v < lines[0] || v >= last {
        return None;
    }
    Some(lines.partition_point(|&l| l <= v) - 1)
}

/// Sorted union of two break-line sets, collapsing near-duplicates.
fn merge_lines(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut all: Vec<f64> = a.iter().chain(b).copied().collect();
    all.sort_by(f64::total_cmp);
    let mut out: Vec<f64> = Vec::with_capacity(all.len());
    for v in all {
        match out.last() {
            Some(&last) if v - last <= LATTICE_EPSILON => {}
            _ => out.push(v),
        }
    }
    out
}

/// A notch to cut at a saddle corner.
struct DiagonalCut {
    corner: [f64; 2],
    east: bool,
    north: bool,
    cell: (usize, usize),
    /// New top of the notch, `None` to empty it.
    floor: Option<f64>,
}

impl DiagonalCut {
    /// Point `d` away from the corner, diagonally into the cut cell.
    fn inner_corner(&self, d: f64) -> [f64; 2] {
        let dx = if self.east { d } else { -d };
        let dy = if self.north { d } else { -d };
        [self.corner[0] + dx, self.corner[1] + dy]
    }
}

/// Vertex identity: lattice point, level index, saddle copy (0 = shared).
type VertexKey = (usize, usize, usize, u8);

struct Mesher<'a> {
    field: &'a HeightField,
    /// Distinct Z values, `levels[0]` is the bottom.
    levels: Vec<f64>,
    /// Per cell: index into `levels` of its top, 0 when empty.
    level_of: Vec<usize>,
    vertices: HashMap<VertexKey, u32>,
    mesh: TriangleMesh,
}

impl<'a> Mesher<'a> {
    fn new(field: &'a HeightField) -> Self {
        let mut levels = vec![field.bottom];
        levels.extend(field.tops.iter().flatten().copied());
        levels.sort_by(f64::total_cmp);
        levels.dedup_by(|b, a| *b - *a <= LATTICE_EPSILON);

        let level_of = field
            .tops
            .iter()
            .map(|top| match top {
                Some(t) => levels
                    .partition_point(|&l| l < *t - LATTICE_EPSILON)
                    .min(levels.len() - 1),
                None => 0,
            })
            .collect();

        Self {
            field,
            levels,
            level_of,
            vertices: HashMap::new(),
            mesh: TriangleMesh::new(),
        }
    }

    fn run(mut self) -> TriangleMesh {
        let nx = self.field.nx();
        let ny = self.field.ny();
        let slabs = self.levels.len() - 1;

        for j in 0..ny {
            for i in 0..nx {
                let top = self.level(i as isize, j as isize);
                if top == 0 {
                    continue;
                }
                self.horizontal(i, j, 0, false);
                self.horizontal(i, j, top, true);
            }
        }

        for k in 0..slabs {
            for j in 0..ny {
                for i in 0..nx {
                    let (ii, jj) = (i as isize, j as isize);
                    if self.level(ii, jj) <= k {
                        continue;
                    }
                    if self.level(ii + 1, jj) <= k {
                        self.wall(i, j, k, Side::East);
                    }
                    if self.level(ii, jj + 1) <= k {
                        self.wall(i, j, k, Side::North);
                    }
                    if self.level(ii - 1, jj) <= k {
                        self.wall(i, j, k, Side::West);
                    }
                    if self.level(ii, jj - 1) <= k {
                        self.wall(i, j, k, Side::South);
                    }
                }
            }
        }

        self.mesh
    }

    /// Top level index of a cell; 0 for empty or out-of-range cells.
    fn level(&self, i: isize, j: isize) -> usize {
        let (nx, ny) = (self.field.nx() as isize, self.field.ny() as isize);
        if i < 0 || j < 0 || i >= nx || j >= ny {
            0
        } else {
            self.level_of[(j * nx + i) as usize]
        }
    }

    /// Vertex at corner `corner` of cell `(i, j)`, at level `k`.
    fn vertex(&mut self, i: usize, j: usize, corner: usize, k: usize) -> u32 {
        // The lattice point, and which quadrant the cell occupies around it.
        let (gx, gy, quadrant) = match corner {
            SW => (i, j, NE),
            SE => (i + 1, j, NW),
            NE => (i + 1, j + 1, SW),
            _ => (i, j + 1, SE),
        };

        // A cell takes part in the faces at level k if its top reaches k
        // (and it is solid at all).
        let threshold = k.max(1);
        let (px, py) = (gx as isize, gy as isize);
        let member = [
            self.level(px - 1, py - 1) >= threshold,
            self.level(px, py - 1) >= threshold,
            self.level(px, py) >= threshold,
            self.level(px - 1, py) >= threshold,
        ];
        let saddle = (member[SW] && member[NE] && !member[SE] && !member[NW])
            || (member[SE] && member[NW] && !member[SW] && !member[NE]);
        let copy = if saddle { quadrant as u8 + 1 } else { 0 };

        let key = (gx, gy, k, copy);
        if let Some(&index) = self.vertices.get(&key) {
            return index;
        }
        let index = self
            .mesh
            .push_vertex(self.field.xs[gx], self.field.ys[gy], self.levels[k]);
        self.vertices.insert(key, index);
        index
    }

    /// Top (`up`) or bottom face of cell `(i, j)` at level `k`.
    fn horizontal(&mut self, i: usize, j: usize, k: usize, up: bool) {
        let sw = self.vertex(i, j, SW, k);
        let se = self.vertex(i, j, SE, k);
        let ne = self.vertex(i, j, NE, k);
        let nw = self.vertex(i, j, NW, k);
        if up {
            self.quad(sw, se, ne, nw);
        } else {
            self.quad(sw, nw, ne, se);
        }
    }

    /// Outward wall on `side` of cell `(i, j)` across slab `k`.
    fn wall(&mut self, i: usize, j: usize, k: usize, side: Side) {
        // Corners ordered so the quad winds counter-clockwise from outside.
        let (a, b) = match side {
            Side::East => (SE, NE),
            Side::North => (NE, NW),
            Side::West => (NW, SW),
            Side::South => (SW, SE),
        };
        let a_lo = self.vertex(i, j, a, k);
        let b_lo = self.vertex(i, j, b, k);
        let b_hi = self.vertex(i, j, b, k + 1);
        let a_hi = self.vertex(i, j, a, k + 1);
        self.quad(a_lo, b_lo, b_hi, a_hi);
    }

    fn quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.mesh.push_triangle(a, b, c);
        self.mesh.push_triangle(a, c, d);
    }
}

#[derive(Clone, Copy)]
enum Side {
    East,
    North,
    West,
    South,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_solid(field: &HeightField) -> TriangleMesh {
        let mesh = field.to_mesh();
        mesh.validate_manifold()
            .unwrap_or_else(|e| panic!("not manifold: {e}"));
        assert_relative_eq!(mesh.volume(), field.volume(), epsilon = 1e-4);
        mesh
    }

    /// Deterministic pseudo-random bits (xorshift).
    fn bits(seed: u64, n: usize) -> Vec<bool> {
        let mut s = seed;
        (0..n)
            .map(|_| {
                s ^= s << 13;
                s ^= s >> 7;
                s ^= s << 17;
                s & 1 == 1
            })
            .collect()
    }

    #[test]
    fn test_rejects_bad_lattices() {
        assert!(HeightField::new(vec![0.0], vec![0.0, 1.0], 0.0).is_err());
        assert!(HeightField::new(vec![1.0, 0.0], vec![0.0, 1.0], 0.0).is_err());
        assert!(HeightField::new(vec![0.0, f64::NAN], vec![0.0, 1.0], 0.0).is_err());
        assert!(HeightField::new(vec![0.0, 1.0], vec![0.0, 1.0], f64::INFINITY).is_err());
    }

    #[test]
    fn test_rejects_bad_columns() {
        let mut f = HeightField::new(vec![0.0, 1.0], vec![0.0, 1.0], 2.0).unwrap();
        assert!(matches!(f.set(0, 0, 1.0), Err(MeshError::InvalidColumn { .. })));
        assert!(matches!(f.set(0, 0, 2.0), Err(MeshError::InvalidColumn { .. })));
        assert!(matches!(f.set(1, 0, 3.0), Err(MeshError::CellOutOfRange { .. })));
    }

    #[test]
    fn test_empty_field_meshes_to_nothing() {
        let f = HeightField::grid(0.0, 0.0, 1.0, 3, 3, 0.0).unwrap();
        assert!(f.is_empty());
        assert!(f.to_mesh().is_empty());
    }

    #[test]
    fn test_cuboid() {
        let f = HeightField::cuboid(0.0, 0.0, 70.0, 70.0, 0.0, 3.0).unwrap();
        let mesh = assert_solid(&f);
        assert_eq!(mesh.num_triangles(), 12);
        assert_relative_eq!(mesh.volume(), 70.0 * 70.0 * 3.0, epsilon = 1e-3);
    }

    #[test]
    fn test_adjacent_cells_weld() {
        let mut f = HeightField::grid(0.0, 0.0, 1.0, 2, 1, 0.0).unwrap();
        f.set(0, 0, 1.0).unwrap();
        f.set(1, 0, 1.0).unwrap();
        let mesh = assert_solid(&f);
        // 2x1 lattice block: 6 points on each of the two levels.
        assert_eq!(mesh.num_vertices(), 12);
    }

    #[test]
    fn test_diagonal_saddle_stays_manifold() {
        let mut f = HeightField::grid(0.0, 0.0, 1.0, 2, 2, 0.0).unwrap();
        f.set(0, 0, 1.0).unwrap();
        f.set(1, 1, 1.0).unwrap();
        let mesh = assert_solid(&f);
        // Two separate cubes: the shared corner is split.
        assert_eq!(mesh.num_vertices(), 16);
    }

    #[test]
    fn test_checkerboard() {
        let mut f = HeightField::grid(0.0, 0.0, 0.5, 6, 6, 1.0).unwrap();
        for j in 0..6 {
            for i in 0..6 {
                if (i + j) % 2 == 0 {
                    f.set(i, j, 2.0).unwrap();
                }
            }
        }
        assert_solid(&f);
    }

    #[test]
    fn test_stepped_levels() {
        // Plate with a raised ring and a taller centre: three levels.
        let mut f = HeightField::grid(0.0, 0.0, 1.0, 5, 5, 0.0).unwrap();
        for j in 0..5 {
            for i in 0..5 {
                let ring = i.min(j).min(4 - i).min(4 - j);
                f.set(i, j, 1.0 + ring as f64 * 0.5).unwrap();
            }
        }
        assert_solid(&f);
    }

    #[test]
    fn test_random_multi_level_fields() {
        for seed in 1..20u64 {
            let n = 9;
            let a = bits(seed * 7919, n * n);
            let b = bits(seed * 104_729, n * n);
            let mut f = HeightField::grid(0.0, 0.0, 0.8, n, n, 0.0).unwrap();
            for j in 0..n {
                for i in 0..n {
                    let idx = j * n + i;
                    match (a[idx], b[idx]) {
                        (true, true) => f.set(i, j, 3.0).unwrap(),
                        (true, false) => f.set(i, j, 1.5).unwrap(),
                        (false, true) => f.set(i, j, 4.5).unwrap(),
                        (false, false) => {}
                    }
                }
            }
            assert_solid(&f);
        }
    }

    fn assert_welds(field: &HeightField) {
        let mesh = field.to_mesh().welded();
        mesh.validate_manifold()
            .unwrap_or_else(|e| panic!("not manifold after welding: {e}"));
        assert_relative_eq!(mesh.volume(), field.volume(), epsilon = 1e-4);
    }

    #[test]
    fn test_separate_diagonals_cuts_the_east_cell() {
        let mut f = HeightField::grid(0.0, 0.0, 1.0, 2, 2, 0.0).unwrap();
        f.set(0, 0, 1.0).unwrap();
        f.set(1, 1, 1.0).unwrap();

        let cut = f.separate_diagonals(0.1).unwrap();
        assert_eq!(cut.column_at(0.95, 0.95), Some((0.0, 1.0)));
        assert_eq!(cut.column_at(1.05, 1.05), None);
        assert_eq!(cut.column_at(1.15, 1.05), Some((0.0, 1.0)));
        assert_eq!(cut.column_at(1.5, 1.5), Some((0.0, 1.0)));
        assert_relative_eq!(cut.volume(), 2.0 - 0.01, epsilon = 1e-9);
        assert_welds(&cut);
    }

    #[test]
    fn test_separate_diagonals_lowers_to_neighbor_height() {
        // Modules at 4.5 on a 3.0 plate, touching only at the centre.
        let mut f = HeightField::grid(0.0, 0.0, 1.0, 2, 2, 0.0).unwrap();
        f.set(0, 0, 3.0).unwrap();
        f.set(1, 0, 4.5).unwrap();
        f.set(1, 1, 3.0).unwrap();
        f.set(0, 1, 4.5).unwrap();

        let cut = f.separate_diagonals(0.05).unwrap();
        assert_eq!(cut.column_at(1.01, 0.99), Some((0.0, 3.0)));
        assert_eq!(cut.column_at(0.99, 1.01), Some((0.0, 4.5)));
        assert_welds(&cut);
    }

    #[test]
    fn test_separate_diagonals_is_stable() {
        let mut f = HeightField::grid(0.0, 0.0, 0.5, 6, 6, 1.0).unwrap();
        for j in 0..6 {
            for i in 0..6 {
                if (i + j) % 2 == 0 {
                    f.set(i, j, 2.0).unwrap();
                }
            }
        }
        assert!(f.to_mesh().welded().validate_manifold().is_err());

        let cut = f.separate_diagonals(0.05).unwrap();
        assert_welds(&cut);
        assert_eq!(cut.separate_diagonals(0.05).unwrap(), cut);

        let plain = HeightField::cuboid(0.0, 0.0, 1.0, 1.0, 0.0, 1.0).unwrap();
        assert_eq!(plain.separate_diagonals(0.05).unwrap(), plain);
    }

    #[test]
    fn test_separate_diagonals_random_fields() {
        for seed in 1..20u64 {
            let n = 9;
            let a = bits(seed * 31, n * n);
            let b = bits(seed * 7_411, n * n);
            let mut f = HeightField::grid(0.0, 0.0, 0.8, n, n, 0.0).unwrap();
            for j in 0..n {
                for i in 0..n {
                    match (a[j * n + i], b[j * n + i]) {
                        (true, true) => f.set(i, j, 3.0).unwrap(),
                        (true, false) => f.set(i, j, 1.5).unwrap(),
                        (false, true) => f.set(i, j, 4.5).unwrap(),
                        (false, false) => {}
                    }
                }
            }
            assert_welds(&f.separate_diagonals(0.05).unwrap());
        }
    }

    #[test]
    fn test_separate_diagonals_rejects_oversized_notch() {
        let mut f = HeightField::grid(0.0, 0.0, 1.0, 2, 2, 0.0).unwrap();
        f.set(0, 0, 1.0).unwrap();
        f.set(1, 1, 1.0).unwrap();
        assert!(matches!(
            f.separate_diagonals(0.5),
            Err(MeshError::InvalidLattice(_))
        ));
        assert!(f.separate_diagonals(0.0).is_err());
    }

    #[test]
    fn test_refined_keeps_the_solid() {
        let f = HeightField::cuboid(0.0, 0.0, 2.0, 2.0, 0.0, 1.0).unwrap();
        let r = f.refined(&[0.5, 1.0], &[1.5]).unwrap();
        assert_eq!(r.nx(), 3);
        assert_eq!(r.ny(), 2);
        assert_eq!(r.filled_count(), 6);
        assert_relative_eq!(r.volume(), f.volume(), epsilon = 1e-12);
        assert_eq!(r.cell_at(0.7, 1.6), Some((1, 1)));
        assert_eq!(r.cell_center(1, 1), [0.75, 1.75]);
    }

    #[test]
    fn test_column_lookup_is_half_open() {
        let mut f = HeightField::grid(0.0, 0.0, 1.0, 2, 1, 0.0).unwrap();
        f.set(1, 0, 2.0).unwrap();
        assert_eq!(f.column_at(0.5, 0.5), None);
        assert_eq!(f.column_at(1.0, 0.5), Some((0.0, 2.0)));
        assert_eq!(f.column_at(2.0, 0.5), None);
        assert_eq!(f.column_at(-0.1, 0.5), None);
    }

    #[test]
    fn test_union_stacks_touching_columns() {
        let base = HeightField::cuboid(0.0, 0.0, 4.0, 4.0, 0.0, 3.0).unwrap();
        let mut raised = HeightField::grid(1.0, 1.0, 1.0, 2, 2, 3.0).unwrap();
        raised.set(0, 0, 4.5).unwrap();
        raised.set(1, 1, 4.5).unwrap();

        let merged = base.union(&raised).unwrap();
        assert_eq!(merged.bottom(), 0.0);
        assert_eq!(merged.max_top(), Some(4.5));
        assert_relative_eq!(merged.volume(), base.volume() + raised.volume(), epsilon = 1e-9);
        let mesh = assert_solid(&merged);
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(max[2] - min[2], 4.5, epsilon = 1e-6);
    }

    #[test]
    fn test_union_fills_pockets() {
        let mut plate = HeightField::grid(0.0, 0.0, 1.0, 3, 1, 0.0).unwrap();
        plate.set(0, 0, 3.0).unwrap();
        plate.set(1, 0, 1.0).unwrap();
        plate.set(2, 0, 3.0).unwrap();
        let inlay = HeightField::cuboid(1.0, 0.0, 2.0, 1.0, 1.0, 3.0).unwrap();
        let merged = plate.union(&inlay).unwrap();
        assert!(merged.filled_cells().all(|(_, _, top)| (top - 3.0).abs() < 1e-12));
        assert_solid(&merged);
    }

    #[test]
    fn test_union_rejects_floating_columns() {
        let base = HeightField::cuboid(0.0, 0.0, 2.0, 2.0, 0.0, 3.0).unwrap();
        let beside = HeightField::cuboid(5.0, 0.0, 6.0, 1.0, 3.0, 4.0).unwrap();
        assert!(matches!(
            base.union(&beside),
            Err(MeshError::FloatingColumn { .. })
        ));

        let above = HeightField::cuboid(0.0, 0.0, 1.0, 1.0, 3.5, 4.0).unwrap();
        assert!(matches!(
            base.union(&above),
            Err(MeshError::DisjointColumns { .. })
        ));
    }
}
