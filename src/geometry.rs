//! Geometry kernel: pure functions over 3-vectors.
//!
//! Every comparison here is tolerance based. Callers pass the simulation's
//! `epsilon`; two coordinates closer than that are the same coordinate.

use nalgebra::Vector3;

use crate::error::SimError;

/// A point (or direction) in the build volume.
pub type Coord = Vector3<f64>;

/// Segments whose squared sine of the enclosed angle falls below this are
/// treated as parallel by [`closest_points`].
const PARALLEL_TOLERANCE: f64 = 1e-10;

/// Shorthand constructor.
pub fn coord(x: f64, y: f64, z: f64) -> Coord {
    Vector3::new(x, y, z)
}

/// Tolerant scalar equality.
pub fn compare(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

/// Tolerant coordinate equality.
pub fn same_point(a: &Coord, b: &Coord, eps: f64) -> bool {
    (a - b).norm() < eps
}

/// Euclidean distance between two points.
pub fn distance(a: &Coord, b: &Coord) -> f64 {
    (a - b).norm()
}

/// Distance between two points projected onto the xy plane.
pub fn planar_distance(a: &Coord, b: &Coord) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Unit vector in the direction of `v`.
pub fn make_unit(v: &Coord) -> Result<Coord, SimError> {
    v.try_normalize(f64::EPSILON)
        .ok_or_else(|| SimError::GeometryDegenerate(format!("zero-length vector {:?}", v.as_slice())))
}

/// True if `a` and `b` point along the same line (either sense).
pub fn parallel(a: &Coord, b: &Coord, eps: f64) -> bool {
    let scale = a.norm() * b.norm();
    if scale < f64::EPSILON {
        return false;
    }
    a.cross(b).norm() / scale < eps
}

/// Orthogonal projection of `p` onto the infinite line through `a` and `b`.
///
/// Used to re-snap agents onto their beam after floating-point drift. A
/// degenerate line collapses to `a`.
pub fn correct(a: &Coord, b: &Coord, p: &Coord) -> Coord {
    let d = b - a;
    let len_sq = d.norm_squared();
    if len_sq < f64::EPSILON {
        return *a;
    }
    let t = (p - a).dot(&d) / len_sq;
    a + d * t
}

/// True iff `p` lies on segment `a`-`b` within tolerance.
pub fn on_segment(a: &Coord, b: &Coord, p: &Coord, eps: f64) -> bool {
    let d = b - a;
    let len = d.norm();
    if len < eps {
        return same_point(a, p, eps);
    }
    let projection = correct(a, b, p);
    if distance(&projection, p) >= eps {
        return false;
    }
    let t = (projection - a).dot(&d) / (len * len);
    let slack = eps / len;
    t >= -slack && t <= 1.0 + slack
}

/// Shortest-distance point pair between two finite segments.
///
/// Returns `(point on first, point on second)`, or `None` when the segments
/// are parallel and no unique pair exists.
pub fn closest_points(first: (Coord, Coord), second: (Coord, Coord)) -> Option<(Coord, Coord)> {
    let (p1, q1) = first;
    let (p2, q2) = second;
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    if a <= f64::EPSILON && e <= f64::EPSILON {
        return Some((p1, p2));
    }

    let (s, t) = if a <= f64::EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= f64::EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            if denom <= PARALLEL_TOLERANCE * a * e {
                return None;
            }
            let mut s = ((b * f - c * e) / denom).clamp(0.0, 1.0);
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    Some((p1 + d1 * s, p2 + d2 * t))
}

/// Points where a finite segment crosses the surface of a sphere.
///
/// Returns zero, one or two points. Empty when the segment lies wholly
/// inside or outside the sphere, or its line misses the sphere.
pub fn sphere_intersection(segment: (Coord, Coord), center: &Coord, radius: f64, eps: f64) -> Vec<Coord> {
    let (p, q) = segment;
    let d = q - p;
    let a = d.norm_squared();
    if a < f64::EPSILON {
        return Vec::new();
    }
    let m = p - center;
    let b = 2.0 * d.dot(&m);
    let c = m.norm_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }

    let root = disc.sqrt();
    let slack = eps / a.sqrt();
    let mut points: Vec<Coord> = Vec::with_capacity(2);
    for t in [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)] {
        if t < -slack || t > 1.0 + slack {
            continue;
        }
        let point = p + d * t.clamp(0.0, 1.0);
        if !points.iter().any(|existing| same_point(existing, &point, eps)) {
            points.push(point);
        }
    }
    points
}

/// True if the two segments lie on one line and share more than a point.
pub fn collinear_overlap(first: (Coord, Coord), second: (Coord, Coord), eps: f64) -> bool {
    let (a, b) = first;
    let (c, d) = second;
    let dir = b - a;
    let len = dir.norm();
    if len < eps || distance(&c, &d) < eps {
        return false;
    }
    // Both ends of the second segment must sit on the first segment's line.
    if distance(&correct(&a, &b, &c), &c) >= eps || distance(&correct(&a, &b, &d), &d) >= eps {
        return false;
    }
    let unit = dir / len;
    let (mut lo, mut hi) = ((c - a).dot(&unit), (d - a).dot(&unit));
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
    }
    let overlap = hi.min(len) - lo.max(0.0);
    overlap > eps
}

/// Coordinates where two segments touch or cross.
///
/// Crossing segments yield their closest point when the gap is below `eps`.
/// Parallel segments yield whichever endpoints rest on the other segment,
/// which covers beams stacked end to end.
pub fn crossing_points(first: (Coord, Coord), second: (Coord, Coord), eps: f64) -> Vec<Coord> {
    let mut points = Vec::new();
    match closest_points(first, second) {
        Some((on_first, on_second)) => {
            if distance(&on_first, &on_second) < eps {
                points.push(on_first);
            }
        }
        None => {
            let candidates = [
                (first.0, second),
                (first.1, second),
                (second.0, first),
                (second.1, first),
            ];
            for (point, (a, b)) in candidates {
                if on_segment(&a, &b, &point, eps)
                    && !points.iter().any(|existing| same_point(existing, &point, eps))
                {
                    points.push(point);
                }
            }
        }
    }
    points
}

/// True if `p` sits inside the xy rectangle spanned by `origin` and
/// `origin + size`, ignoring height.
pub fn within_footprint(origin: &Coord, size: &Coord, p: &Coord, eps: f64) -> bool {
    let (x0, x1) = ordered(origin.x, origin.x + size.x);
    let (y0, y1) = ordered(origin.y, origin.y + size.y);
    p.x > x0 - eps && p.x < x1 + eps && p.y > y0 - eps && p.y < y1 + eps
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
