//!
//! # Flat21 Geometry
//!
//! The two geometric kernels of hierarchy collapse: offsetting a path's
//! centerline into the closed ring of its outline, and the
//! point-in-polygon crossing test.
//!

// Local Imports
use crate::data::GdsPoint;

/// A line in implicit form: `a·x + b·y + c = 0`
#[derive(Debug, Clone, Copy, Default)]
struct Line {
    a: f64,
    b: f64,
    c: f64,
}
impl Line {
    /// The line through `p0` and `p1`:
    /// `a = y1 - y0`, `b = -(x1 - x0)`, `c = -b·y0 - a·x0`
    fn through(p0: GdsPoint, p1: GdsPoint) -> Line {
        let a = (p1.y - p0.y) as f64;
        let b = -((p1.x - p0.x) as f64);
        let c = -b * p0.y as f64 - a * p0.x as f64;
        Line { a, b, c }
    }
    /// The parallel line at signed distance `d`:
    /// same `(a, b)`, with `c` shifted by `d·√(a² + b²)`
    fn offset(&self, d: f64) -> Line {
        Line {
            a: self.a,
            b: self.b,
            c: self.c + d * (self.a * self.a + self.b * self.b).sqrt(),
        }
    }
    /// Line-line intersection, in homogeneous coordinates:
    /// `(b1·c2 − b2·c1, a2·c1 − a1·c2, a1·b2 − a2·b1)`,
    /// divided through by the third coordinate and truncated to `i32`.
    /// Near-parallel lines drive the third coordinate toward zero and the
    /// result far away; no clamping is performed.
    fn intersect(&self, other: &Line) -> GdsPoint {
        let xh = self.b * other.c - other.b * self.c;
        let yh = other.a * self.c - self.a * other.c;
        let wh = self.a * other.b - other.a * self.b;
        GdsPoint::new((xh / wh) as i32, (yh / wh) as i32)
    }
    /// Project point `p` onto this line, i.e. intersect with the normal
    /// through `p`:
    /// normal to `ax + by + c = 0` through `(px, py)` is
    /// `a' = b`, `b' = -a`, `c' = a·py - b·px`
    fn project(&self, p: GdsPoint) -> GdsPoint {
        let normal = Line {
            a: self.b,
            b: -self.a,
            c: self.a * p.y as f64 - self.b * p.x as f64,
        };
        self.intersect(&normal)
    }
}
/// Extend the segment `head -> tail` past `tail` by `length`.
/// A zero-length segment is returned unmoved.
fn extend(tail: GdsPoint, head: GdsPoint, length: f64) -> GdsPoint {
    let segx = (tail.x - head.x) as f64;
    let segy = (tail.y - head.y) as f64;
    let norm = (segx * segx + segy * segy).sqrt();
    if norm == 0.0 {
        return tail;
    }
    GdsPoint::new(
        tail.x + ((length / norm) * segx) as i32,
        tail.y + ((length / norm) * segy) as i32,
    )
}

/// Offset an open centerline of `n >= 2` points into the closed
/// `2n+1`-point ring of the path's outline.
///
/// Each centerline segment contributes a pair of parallel lines at
/// ±`width`/2. Ring vertex `i`, for `i` in `0..n`, is the positive-side
/// point of centerline vertex `i`; ring vertex `2n-1-i` is its
/// negative-side partner; vertex `2n` repeats vertex 0 to close the
/// ring. Interior vertices are the intersections of consecutive
/// same-side offsets. The end vertices are the cap points projected onto
/// the first and last offsets, where the cap point is the centerline
/// endpoint itself (`path_type` 0) or the endpoint extended outward by
/// half the width along its segment (`path_type` 2). Type 1 (rounded
/// caps) is not supported and treated as type 0.
///
/// Caveats carried from the format, not corrected here: collinear
/// consecutive segments put the joint intersection arbitrarily far away,
/// and repeated consecutive centerline points leave it undefined. A
/// sharply-bent wide path may self-intersect.
///
/// Centerlines of fewer than two points yield an empty ring.
pub fn expand_path(pts: &[GdsPoint], width: i32, path_type: i16) -> Vec<GdsPoint> {
    let n = pts.len();
    if n < 2 {
        return Vec::new();
    }
    let hwidth = width as f64 / 2.0;

    // Parallel offsets of each segment, on both sides
    let mut plines = Vec::with_capacity(n - 1);
    let mut mlines = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let line = Line::through(pts[i], pts[i + 1]);
        plines.push(line.offset(hwidth));
        mlines.push(line.offset(-hwidth));
    }

    let mut out = vec![GdsPoint::default(); 2 * n + 1];

    // Head cap
    let end = if path_type == 2 {
        extend(pts[0], pts[1], hwidth)
    } else {
        pts[0]
    };
    out[0] = plines[0].project(end);
    out[2 * n - 1] = mlines[0].project(end);
    out[2 * n] = out[0];

    // Interior joints
    for i in 1..n - 1 {
        out[i] = plines[i - 1].intersect(&plines[i]);
        out[2 * n - 1 - i] = mlines[i - 1].intersect(&mlines[i]);
    }

    // Tail cap
    let end = if path_type == 2 {
        extend(pts[n - 1], pts[n - 2], hwidth)
    } else {
        pts[n - 1]
    };
    out[n - 1] = plines[n - 2].project(end);
    out[n] = mlines[n - 2].project(end);

    out
}

/// Point-containment test for closed polygon `poly`, counting the
/// segments crossed by a vertical ray from `p`. The ring's final vertex
/// must repeat its first; inside means an odd crossing count.
/// Points exactly on an edge may report either side.
pub fn poly_contains_point(poly: &[GdsPoint], p: GdsPoint) -> bool {
    let mut count = 0;
    for i in 0..poly.len().saturating_sub(1) {
        let (p0, p1) = (poly[i], poly[i + 1]);
        // Does segment i straddle a vertical line through the test point?
        if (p0.x <= p.x && p1.x > p.x) || (p0.x > p.x && p1.x <= p.x) {
            // Count it if it passes above the point
            let dy = (p1.y - p0.y) as i64;
            let dx = (p1.x - p0.x) as i64;
            let y = p0.y as i64 + (p.x - p0.x) as i64 * dy / dx;
            if (p.y as i64) < y {
                count += 1;
            }
        }
    }
    count % 2 == 1
}
