//!
//! # Flat21 Hierarchy Flattener
//!
//! Depth-first collapse of a cell's reference tree into flat,
//! absolute-coordinate polygons. Each SREF step composes the child's
//! placement onto the accumulated [Transform]; each AREF step does the
//! same for every lattice point of the array. Boundaries and expanded
//! paths are transformed and emitted, subject to an optional clip window
//! (judged on axis-aligned extents only) and a polygon-count cap.
//!
//! All traversal state lives in the [Flattener] context threaded through
//! the recursion, so [GdsLibrary::extract_polygons] is a pure function of
//! the database plus its parameters.
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local Imports
use crate::data::{GdsCell, GdsElement, GdsError, GdsLibrary, GdsPoint, GdsResult, Poly};
use crate::data::{GdsArrayRef, GdsStructRef};

/// Scanned-polygon interval between progress-callback invocations
pub const PROGRESS_INTERVAL: u64 = 1_000_000;
/// Maximum reference nesting depth. Far above any real hierarchy, and the
/// backstop which turns a cyclic reference graph into an error instead of
/// a stack overflow.
pub const MAX_DEPTH: usize = 1024;

/// Progress hook: invoked with `(emitted, scanned)` counts every
/// [PROGRESS_INTERVAL] scanned polygons. Returning `true` aborts the
/// traversal with [GdsError::Interrupted].
pub type ProgressFn<'a> = dyn FnMut(u64, u64) -> bool + 'a;

/// Clip window in user units: origin and extent
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}
impl Bounds {
    /// Create a new [Bounds] from origin `(x, y)` and extent `(dx, dy)`
    pub fn new(x: f64, y: f64, dx: f64, dy: f64) -> Self {
        Self { x, y, dx, dy }
    }
}

/// Axis-aligned box in database units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BoundBox {
    xmin: i32,
    xmax: i32,
    ymin: i32,
    ymax: i32,
}
impl BoundBox {
    /// Convert a user-unit [Bounds] to database units via the library's
    /// `uu_per_dbunit` scale
    fn from_bounds(b: &Bounds, uu_per_dbunit: f64) -> Self {
        BoundBox {
            xmin: (b.x / uu_per_dbunit) as i32,
            xmax: ((b.x + b.dx) / uu_per_dbunit) as i32,
            ymin: (b.y / uu_per_dbunit) as i32,
            ymax: ((b.y + b.dy) / uu_per_dbunit) as i32,
        }
    }
    /// Overlap test between our box and the axis-aligned extents of ring
    /// `pts`. Four min/max passes, each rejecting as soon as it can; the
    /// ring's closing vertex is excluded. `false` means certainly no
    /// overlap.
    fn overlaps(&self, pts: &[GdsPoint]) -> bool {
        let pts = &pts[..pts.len().saturating_sub(1)];

        let mut maxx = i32::MIN;
        for p in pts {
            if p.x > maxx {
                maxx = p.x;
            }
        }
        if maxx < self.xmin {
            return false;
        }
        let mut maxy = i32::MIN;
        for p in pts {
            if p.y > maxy {
                maxy = p.y;
            }
        }
        if maxy < self.ymin {
            return false;
        }
        let mut minx = i32::MAX;
        for p in pts {
            if p.x < minx {
                minx = p.x;
            }
        }
        if minx > self.xmax {
            return false;
        }
        let mut miny = i32::MAX;
        for p in pts {
            if p.y < miny {
                miny = p.y;
            }
        }
        if miny > self.ymax {
            return false;
        }
        true
    }
}

/// # Accumulated Affine Transform
///
/// Translation, magnification, rotation, and reflection, applied to a
/// point in the STRANS order: mirror about the X axis first, then
/// rotation, then magnification and translation.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Transform {
    /// Translation
    pub x: i32,
    pub y: i32,
    /// Magnification
    pub mag: f64,
    /// Rotation angle, radians counter-clockwise
    pub angle: f64,
    /// Reflection about the X axis, applied before rotation
    pub mirror: bool,
}
impl Default for Transform {
    /// The identity transform
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            mag: 1.0,
            angle: 0.0,
            mirror: false,
        }
    }
}
impl Transform {
    /// Apply to point `p`. The result truncates toward zero.
    pub fn apply(&self, p: GdsPoint) -> GdsPoint {
        let s = self.angle.sin();
        let c = self.angle.cos();
        let sign = if self.mirror { -1.0 } else { 1.0 };
        let (xf, yf) = (p.x as f64, p.y as f64);
        GdsPoint::new(
            (self.x as f64 + self.mag * (xf * c - sign * yf * s)) as i32,
            (self.y as f64 + self.mag * (xf * s + sign * yf * c)) as i32,
        )
    }
    /// Compose with a child reference's local transform. The child's
    /// origin lands at `origin` (already transformed by us);
    /// magnifications multiply, angles add, reflections cancel pairwise.
    fn cascade(&self, origin: GdsPoint, mag: f64, angle: f64, mirror: bool) -> Transform {
        Transform {
            x: origin.x,
            y: origin.y,
            mag: self.mag * mag,
            angle: self.angle + angle,
            mirror: self.mirror ^ mirror,
        }
    }
}

/// # Extraction Options
///
/// Everything [GdsLibrary::extract_polygons] accepts beyond the cell name
/// and the progress hook.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct ExtractOptions {
    /// Clip window, in user units. Polygons whose axis-aligned extents
    /// fall entirely outside are dropped. Overlap is judged on extents
    /// only; survivors are not clipped to the window.
    pub bounds: Option<Bounds>,
    /// Upper bound on emitted polygons. Traversal halts cleanly upon
    /// reaching it, bounding output memory.
    pub max_polys: u64,
    /// Shift every emitted polygon by the clip window's minimum corner,
    /// making that corner the coordinate origin. Off by default, and
    /// meaningless without `bounds`.
    pub rebase: bool,
}
impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            bounds: None,
            max_polys: u64::MAX,
            rebase: false,
        }
    }
}

/// # Flattener
///
/// Traversal context: the output set under construction, the clip window
/// and cap, and the scanned/emitted counters the progress hook reports.
struct Flattener<'lib, 'cb> {
    /// The library being collapsed
    lib: &'lib GdsLibrary,
    /// Clip window, in database units
    bbox: Option<BoundBox>,
    /// Emitted-polygon cap
    max_polys: u64,
    /// Progress hook
    progress: Option<&'cb mut ProgressFn<'cb>>,
    /// Output under construction
    out: Vec<Poly>,
    /// Polygons considered, pre-clip
    scanned: u64,
    /// Polygons emitted; tracks `out.len()`
    emitted: u64,
}
impl<'lib, 'cb> Flattener<'lib, 'cb> {
    /// Depth-first traversal of `cell` under accumulated transform `tra`
    fn collapse_cell(&mut self, cell: &'lib GdsCell, tra: Transform, depth: usize) -> GdsResult<()> {
        if depth > MAX_DEPTH {
            return Err(GdsError::RecursionLimit(depth));
        }
        for elem in cell.elems.iter() {
            if self.emitted >= self.max_polys {
                return Ok(());
            }
            match elem {
                GdsElement::GdsBoundary(b) => self.emit(&b.xy, tra, b.layer)?,
                GdsElement::GdsPath(p) => self.emit(&p.expanded, tra, p.layer)?,
                GdsElement::GdsStructRef(sref) => self.collapse_sref(sref, tra, depth)?,
                GdsElement::GdsArrayRef(aref) => self.collapse_aref(aref, tra, depth)?,
            };
        }
        Ok(())
    }
    /// Recurse into a single instance
    fn collapse_sref(&mut self, sref: &GdsStructRef, tra: Transform, depth: usize) -> GdsResult<()> {
        // Unresolvable references expand to nothing
        let target = match sref.cell {
            Some(ix) => &self.lib.cells[ix],
            None => return Ok(()),
        };
        let origin = tra.apply(sref.xy);
        let sub = tra.cascade(origin, sref.mag, sref.angle, sref.reflected());
        self.collapse_cell(target, sub, depth + 1)
    }
    /// Recurse into every element of an array instance
    fn collapse_aref(&mut self, aref: &GdsArrayRef, tra: Transform, depth: usize) -> GdsResult<()> {
        let target = match aref.cell {
            Some(ix) => &self.lib.cells[ix],
            None => return Ok(()),
        };
        if aref.cols <= 0 || aref.rows <= 0 {
            return Ok(());
        }
        // Per-element displacement along the column and row axes
        let [p1, p2, p3] = aref.xy;
        let v_col = (
            (p2.x - p1.x) as f64 / aref.cols as f64,
            (p2.y - p1.y) as f64 / aref.cols as f64,
        );
        let v_row = (
            (p3.x - p1.x) as f64 / aref.rows as f64,
            (p3.y - p1.y) as f64 / aref.rows as f64,
        );
        let s = tra.angle.sin();
        let c = tra.angle.cos();
        let sign = if tra.mirror { -1.0 } else { 1.0 };
        for col in 0..aref.cols {
            for row in 0..aref.rows {
                if self.emitted >= self.max_polys {
                    return Ok(());
                }
                // The lattice point, in the referencing cell's frame
                let xr = p1.x as f64 + col as f64 * v_col.0 + row as f64 * v_row.0;
                let yr = p1.y as f64 + col as f64 * v_col.1 + row as f64 * v_row.1;
                // And its absolute origin under the accumulated transform
                let origin = GdsPoint::new(
                    (tra.x as f64 + tra.mag * (xr * c - sign * yr * s)) as i32,
                    (tra.y as f64 + tra.mag * (xr * s + sign * yr * c)) as i32,
                );
                let sub = tra.cascade(origin, aref.mag, aref.angle, aref.reflected());
                self.collapse_cell(target, sub, depth + 1)?;
            }
        }
        Ok(())
    }
    /// Transform ring `pts` by `tra` and emit it, subject to the clip
    /// window. One "scan" per call; the progress hook fires every
    /// [PROGRESS_INTERVAL] scans.
    fn emit(&mut self, pts: &[GdsPoint], tra: Transform, layer: i16) -> GdsResult<()> {
        let xy: Vec<GdsPoint> = pts.iter().map(|p| tra.apply(*p)).collect();
        self.scanned += 1;
        let keep = match &self.bbox {
            Some(bb) => bb.overlaps(&xy),
            None => true,
        };
        if keep {
            self.out.push(Poly { layer, xy });
            self.emitted += 1;
        }
        if self.scanned % PROGRESS_INTERVAL == 0 {
            if let Some(cb) = self.progress.as_mut() {
                if cb(self.emitted, self.scanned) {
                    return Err(GdsError::Interrupted);
                }
            }
        }
        Ok(())
    }
}

impl GdsLibrary {
    /// Collapse the hierarchy under the cell named `cell` into a flat
    /// vector of absolute-coordinate [Poly]gons.
    ///
    /// Fails with [GdsError::CellNotFound] if no such cell is defined,
    /// [GdsError::Interrupted] if the progress hook requests termination,
    /// and [GdsError::RecursionLimit] past [MAX_DEPTH] reference nesting
    /// levels (the certain outcome of a cyclic library). References to
    /// undefined cell names contribute nothing and are not errors.
    pub fn extract_polygons<'cb>(
        &self,
        cell: &str,
        opts: &ExtractOptions,
        progress: Option<&'cb mut ProgressFn<'cb>>,
    ) -> GdsResult<Vec<Poly>> {
        let top = self
            .cell(cell)
            .ok_or_else(|| GdsError::CellNotFound(cell.to_string()))?;
        let bbox = opts
            .bounds
            .as_ref()
            .map(|b| BoundBox::from_bounds(b, self.uu_per_dbunit));
        let mut flattener = Flattener {
            lib: self,
            bbox,
            max_polys: opts.max_polys,
            progress,
            out: Vec::new(),
            scanned: 0,
            emitted: 0,
        };
        flattener.collapse_cell(top, Transform::default(), 0)?;
        let mut polys = flattener.out;
        if opts.rebase {
            if let Some(bb) = bbox {
                for poly in polys.iter_mut() {
                    for p in poly.xy.iter_mut() {
                        p.x -= bb.xmin;
                        p.y -= bb.ymin;
                    }
                }
            }
        }
        Ok(polys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GdsBoundary;

    /// A closed unit-square ring with its lower-left at `(x, y)`
    fn unit_square(x: i32, y: i32) -> GdsBoundary {
        GdsBoundary {
            layer: 1,
            xy: GdsPoint::vec(&[(x, y), (x + 1, y), (x + 1, y + 1), (x, y + 1), (x, y)]),
        }
    }
    #[test]
    fn it_counts_scanned_and_emitted() {
        // 100 unit squares on a 10x10 grid at 1000-unit pitch; a 500-unit
        // window anchored at the first scans all of them and keeps one
        let mut cell = GdsCell::new("GRID");
        for i in 0..10 {
            for j in 0..10 {
                cell.elems.push(GdsElement::GdsBoundary(unit_square(i * 1000, j * 1000)));
            }
        }
        let lib = GdsLibrary {
            cells: vec![cell],
            ..Default::default()
        };
        let mut flattener = Flattener {
            lib: &lib,
            bbox: Some(BoundBox {
                xmin: 0,
                xmax: 500,
                ymin: 0,
                ymax: 500,
            }),
            max_polys: u64::MAX,
            progress: None,
            out: Vec::new(),
            scanned: 0,
            emitted: 0,
        };
        flattener
            .collapse_cell(&lib.cells[0], Transform::default(), 0)
            .unwrap();
        assert_eq!(flattener.scanned, 100);
        assert_eq!(flattener.emitted, 1);
        assert_eq!(flattener.out.len(), 1);
    }
    #[test]
    fn it_converts_bounds_to_db_units() {
        let bb = BoundBox::from_bounds(&Bounds::new(0.0, 0.0, 0.05, 0.05), 1e-3);
        assert_eq!(
            bb,
            BoundBox {
                xmin: 0,
                xmax: 50,
                ymin: 0,
                ymax: 50
            }
        );
    }
    #[test]
    fn it_applies_the_identity() {
        let tra = Transform::default();
        let p = GdsPoint::new(-12345, 67890);
        assert_eq!(tra.apply(p), p);
    }
}
