// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon primitives on 3D point rings evaluated in the XY plane.
//!
//! Rings are stored closed: the last point repeats the first. Functions that
//! accept rings also tolerate an open ring unless noted otherwise.

use crate::error::{Error, Result};
use nalgebra::{Point2, Point3};

/// Polygons whose area falls below this are rejected as degenerate.
pub const MIN_POLYGON_AREA: f64 = 1e-8;

/// Winding of a ring in the XY plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    AntiClockwise,
}

/// Classification of a point against a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InOut {
    In,
    On,
    Out,
}

/// Planar distance between two points.
#[inline]
pub fn distance_xy(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// True when the two points share the same XY position.
#[inline]
pub fn same_xy(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    a.x == b.x && a.y == b.y
}

/// Parameter of the projection of `p` onto the line `a -> b`.
#[inline]
pub fn project_param(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    ((p.x - a.x) * dx + (p.y - a.y) * dy) / len2
}

/// Distance from `p` to the segment `a -> b`.
pub fn point_segment_distance(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let t = project_param(a, b, p).clamp(0.0, 1.0);
    let qx = a.x + t * (b.x - a.x);
    let qy = a.y + t * (b.y - a.y);
    ((p.x - qx).powi(2) + (p.y - qy).powi(2)).sqrt()
}

/// Signed area of a ring; positive for anticlockwise winding.
pub fn signed_area_xy(ring: &[Point3<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    let n = ring.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y - ring[j].x * ring[i].y;
    }
    area * 0.5
}

/// Winding direction and absolute area of a ring.
pub fn polygon_direction(ring: &[Point3<f64>]) -> (Direction, f64) {
    let area = signed_area_xy(ring);
    let direction = if area < 0.0 {
        Direction::Clockwise
    } else {
        Direction::AntiClockwise
    };
    (direction, area.abs())
}

/// Reverse the ring in place when it winds clockwise. Returns true if reversed.
pub fn make_anticlockwise(ring: &mut [Point3<f64>]) -> bool {
    if signed_area_xy(ring) < 0.0 {
        ring.reverse();
        true
    } else {
        false
    }
}

/// True when first and last point coincide within `tolerance`.
pub fn is_closed(ring: &[Point3<f64>], tolerance: f64) -> bool {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 => {
            same_xy(first, last) || distance_xy(first, last) <= tolerance
        }
        _ => false,
    }
}

/// Classify `(x, y)` against a ring. Points within `tolerance` of an edge are `On`.
pub fn point_in_on_out(x: f64, y: f64, ring: &[Point3<f64>], tolerance: f64) -> InOut {
    if ring.len() < 3 {
        return InOut::Out;
    }

    let p = Point2::new(x, y);
    let n = ring.len();
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        let d = point_segment_distance(&Point2::new(a.x, a.y), &Point2::new(b.x, b.y), &p);
        if d <= tolerance {
            return InOut::On;
        }
    }

    // Ray casting
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = &ring[i];
        let pj = &ring[j];
        if ((pi.y > y) != (pj.y > y)) && (x < (pj.x - pi.x) * (y - pi.y) / (pj.y - pi.y) + pi.x) {
            inside = !inside;
        }
        j = i;
    }

    if inside {
        InOut::In
    } else {
        InOut::Out
    }
}

/// Result of intersecting two segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    /// The segments do not meet.
    None,
    /// The segments meet in one point; `t` and `u` are the parameters along
    /// the first and second segment.
    Point { t: f64, u: f64, x: f64, y: f64 },
    /// The segments are collinear and share more than a point.
    Overlap,
}

/// Intersect segment `a -> b` with segment `c -> d`.
pub fn intersect_segments(
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
    d: &Point2<f64>,
    tolerance: f64,
) -> SegmentIntersection {
    let rx = b.x - a.x;
    let ry = b.y - a.y;
    let sx = d.x - c.x;
    let sy = d.y - c.y;
    let denom = rx * sy - ry * sx;
    let qpx = c.x - a.x;
    let qpy = c.y - a.y;

    let len_r = (rx * rx + ry * ry).sqrt();
    let len_s = (sx * sx + sy * sy).sqrt();
    if len_r == 0.0 || len_s == 0.0 {
        return SegmentIntersection::None;
    }

    if denom.abs() <= f64::EPSILON * len_r * len_s {
        // Parallel; collinear when c lies on the line a -> b
        let offset = (qpx * ry - qpy * rx).abs() / len_r;
        if offset > tolerance {
            return SegmentIntersection::None;
        }
        let t0 = project_param(a, b, c);
        let t1 = project_param(a, b, d);
        let (lo, hi) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
        let eps = tolerance / len_r;
        if hi < -eps || lo > 1.0 + eps {
            return SegmentIntersection::None;
        }
        let overlap = hi.min(1.0) - lo.max(0.0);
        if overlap * len_r > tolerance {
            return SegmentIntersection::Overlap;
        }
        // Collinear segments touching end to end
        let t = lo.max(0.0).min(1.0);
        let u = project_param(c, d, &Point2::new(a.x + t * rx, a.y + t * ry));
        return SegmentIntersection::Point {
            t,
            u,
            x: a.x + t * rx,
            y: a.y + t * ry,
        };
    }

    let t = (qpx * sy - qpy * sx) / denom;
    let u = (qpx * ry - qpy * rx) / denom;
    let eps_t = tolerance / len_r;
    let eps_u = tolerance / len_s;
    if t < -eps_t || t > 1.0 + eps_t || u < -eps_u || u > 1.0 + eps_u {
        return SegmentIntersection::None;
    }

    let t = t.clamp(0.0, 1.0);
    SegmentIntersection::Point {
        t,
        u: u.clamp(0.0, 1.0),
        x: a.x + t * rx,
        y: a.y + t * ry,
    }
}

/// True when a closed ring crosses or touches itself away from shared vertices.
pub fn has_knots(ring: &[Point3<f64>]) -> bool {
    let n = ring.len();
    if n < 4 {
        return false;
    }
    let closed = same_xy(&ring[0], &ring[n - 1]);
    let segments = n - 1;

    let pts: Vec<Point2<f64>> = ring.iter().map(|p| Point2::new(p.x, p.y)).collect();
    for i in 0..segments {
        for j in (i + 1)..segments {
            let adjacent = j == i + 1 || (closed && i == 0 && j == segments - 1);
            let hit = intersect_segments(&pts[i], &pts[i + 1], &pts[j], &pts[j + 1], 0.0);
            match hit {
                SegmentIntersection::None => {}
                SegmentIntersection::Overlap => return true,
                SegmentIntersection::Point { t, u, .. } => {
                    if !adjacent {
                        return true;
                    }
                    // Adjacent segments may only meet at their shared vertex
                    let at_shared = if j == i + 1 {
                        t == 1.0 && u == 0.0
                    } else {
                        t == 0.0 && u == 1.0
                    };
                    if !at_shared {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Remove consecutive duplicates (within `tolerance`) from a point string.
/// Fails when fewer than two distinct points remain.
pub fn validate_string_points(points: &mut Vec<Point3<f64>>, tolerance: f64) -> Result<()> {
    points.dedup_by(|b, a| distance_xy(a, b) <= tolerance);
    if points.len() < 2 {
        return Err(Error::InvalidPolygon(
            "point string has fewer than 2 distinct points".to_string(),
        ));
    }
    Ok(())
}

/// Validate a closed polygon ring in place.
///
/// Removes duplicate and collinear points within `tolerance`, then rejects
/// rings with fewer than three distinct vertices or self-intersections. The
/// ring stays closed on success.
pub fn validate_polygon_points(points: &mut Vec<Point3<f64>>, tolerance: f64) -> Result<()> {
    if !is_closed(points, tolerance) {
        return Err(Error::InvalidPolygon("polygon is not closed".to_string()));
    }

    // Work on the open ring
    points.pop();
    points.dedup_by(|b, a| distance_xy(a, b) <= tolerance);
    while points.len() > 1 && distance_xy(&points[0], &points[points.len() - 1]) <= tolerance {
        points.pop();
    }

    let mut removed = true;
    while removed && points.len() > 3 {
        removed = false;
        let n = points.len();
        for i in 0..n {
            let prev = points[(i + n - 1) % n];
            let curr = points[i];
            let next = points[(i + 1) % n];
            let a = Point2::new(prev.x, prev.y);
            let b = Point2::new(next.x, next.y);
            let c = Point2::new(curr.x, curr.y);
            let t = project_param(&a, &b, &c);
            if (0.0..=1.0).contains(&t) && point_segment_distance(&a, &b, &c) <= tolerance {
                points.remove(i);
                removed = true;
                break;
            }
        }
    }

    if points.len() < 3 {
        return Err(Error::InvalidPolygon(format!(
            "polygon has {} distinct vertices",
            points.len()
        )));
    }

    let first = points[0];
    points.push(first);

    if has_knots(points) {
        return Err(Error::InvalidPolygon("polygon intersects itself".to_string()));
    }

    Ok(())
}
