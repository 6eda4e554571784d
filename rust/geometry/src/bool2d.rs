// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Area booleans over DTM boundary rings.
//!
//! Area union, intersection and parity over closed rings using the
//! i_overlay crate. Results come back as a [`Region`]: a list of shapes, each
//! an outer contour with zero or more holes.

use crate::polygon::same_xy;
use crate::MIN_POLYGON_AREA;
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::{Point2, Point3};

/// Open contour: the closing point is implied, never repeated.
pub type Contour = Vec<Point2<f64>>;

/// One connected area: an outer boundary with holes
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Outer boundary (counter-clockwise)
    pub outer: Contour,
    /// Holes (counter-clockwise, so the hole area is on their left)
    pub holes: Vec<Contour>,
}

impl Shape {
    /// Create a shape without holes
    pub fn new(outer: Contour) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }
}

/// Result of a boolean operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    pub shapes: Vec<Shape>,
}

impl Region {
    /// Region made of a single ring
    pub fn from_ring(ring: &[Point3<f64>]) -> Self {
        let mut contour = ring_to_contour(ring);
        if !has_area(&contour) {
            return Self::default();
        }
        orient(&mut contour, true);
        Self {
            shapes: vec![Shape::new(contour)],
        }
    }

    /// True when nothing with area is left
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Number of connected areas
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// True when the region is one loop without holes
    pub fn is_single_loop(&self) -> bool {
        self.shapes.len() == 1 && self.shapes[0].holes.is_empty()
    }

    /// Total enclosed area
    pub fn area(&self) -> f64 {
        self.shapes
            .iter()
            .map(|s| {
                let holes: f64 = s.holes.iter().map(|h| contour_area(h).abs()).sum();
                contour_area(&s.outer).abs() - holes
            })
            .sum()
    }

    /// Overlay input: outers anticlockwise, holes clockwise.
    fn to_paths(&self) -> Vec<Vec<[f64; 2]>> {
        self.shapes
            .iter()
            .flat_map(|shape| {
                std::iter::once(path(&shape.outer, true)).chain(shape.holes.iter().map(|h| path(h, false)))
            })
            .collect()
    }
}

/// Area union of two regions
pub fn union(a: &Region, b: &Region) -> Region {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    overlay(a, b, OverlayRule::Union)
}

/// Area union of many closed rings, folded pairwise
pub fn union_rings(rings: &[Vec<Point3<f64>>]) -> Region {
    rings
        .iter()
        .map(|r| Region::from_ring(r))
        .fold(Region::default(), |acc, r| union(&acc, &r))
}

/// Area intersection of two closed rings
pub fn intersection(a: &[Point3<f64>], b: &[Point3<f64>]) -> Region {
    overlay(&Region::from_ring(a), &Region::from_ring(b), OverlayRule::Intersect)
}

/// Area parity (symmetric difference) of two closed rings
pub fn parity(a: &[Point3<f64>], b: &[Point3<f64>]) -> Region {
    overlay(&Region::from_ring(a), &Region::from_ring(b), OverlayRule::Xor)
}

/// Drop the closing point of a ring and flatten it to XY
pub fn ring_to_contour(ring: &[Point3<f64>]) -> Contour {
    let mut end = ring.len();
    if end > 1 && same_xy(&ring[0], &ring[end - 1]) {
        end -= 1;
    }
    ring[..end].iter().map(|p| Point2::new(p.x, p.y)).collect()
}

/// Close a contour into a ring at zero elevation
pub fn contour_to_ring(contour: &[Point2<f64>]) -> Vec<Point3<f64>> {
    let mut ring: Vec<Point3<f64>> = contour.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

fn overlay(a: &Region, b: &Region, rule: OverlayRule) -> Region {
    let shapes = a.to_paths().overlay(&b.to_paths(), rule, FillRule::EvenOdd);
    let mut region = Region::default();
    for contours in &shapes {
        // First contour is the outer boundary, the rest are its holes
        let mut contours = contours
            .iter()
            .map(|c| c.iter().map(|&[x, y]| Point2::new(x, y)).collect::<Contour>());
        let Some(mut outer) = contours.next() else {
            continue;
        };
        if !has_area(&outer) {
            continue;
        }
        orient(&mut outer, true);
        let holes = contours
            .filter(|hole| has_area(hole))
            .map(|mut hole| {
                orient(&mut hole, true);
                hole
            })
            .collect();
        region.shapes.push(Shape { outer, holes });
    }
    region
}

/// Shoelace area, positive for anticlockwise contours.
fn contour_area(contour: &[Point2<f64>]) -> f64 {
    let Some(&last) = contour.last() else {
        return 0.0;
    };
    let (sum, _) = contour
        .iter()
        .fold((0.0, last), |(sum, prev), &p| (sum + prev.x * p.y - p.x * prev.y, p));
    sum * 0.5
}

fn has_area(contour: &[Point2<f64>]) -> bool {
    contour.len() >= 3 && contour_area(contour).abs() >= MIN_POLYGON_AREA
}

/// Reverse `contour` in place unless it already winds the requested way.
fn orient(contour: &mut [Point2<f64>], anticlockwise: bool) {
    let area = contour_area(contour);
    if (anticlockwise && area < 0.0) || (!anticlockwise && area > 0.0) {
        contour.reverse();
    }
}

fn path(contour: &[Point2<f64>], anticlockwise: bool) -> Vec<[f64; 2]> {
    let mut contour = contour.to_vec();
    orient(&mut contour, anticlockwise);
    contour.into_iter().map(|p| [p.x, p.y]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x0, y0, 0.0),
            Point3::new(x1, y0, 0.0),
            Point3::new(x1, y1, 0.0),
            Point3::new(x0, y1, 0.0),
            Point3::new(x0, y0, 0.0),
        ]
    }

    #[test]
    fn test_contour_winding() {
        let mut contour = ring_to_contour(&square(0.0, 0.0, 1.0, 1.0));
        assert_relative_eq!(contour_area(&contour), 1.0);
        orient(&mut contour, false);
        assert_relative_eq!(contour_area(&contour), -1.0);
        orient(&mut contour, false);
        assert_relative_eq!(contour_area(&contour), -1.0);
    }

    #[test]
    fn test_ring_contour_conversion() {
        let ring = square(0.0, 0.0, 2.0, 2.0);
        let contour = ring_to_contour(&ring);
        assert_eq!(contour.len(), 4);
        let back = contour_to_ring(&contour);
        assert_eq!(back.len(), 5);
        assert!(same_xy(&back[0], &back[4]));
    }

    #[test]
    fn test_union_of_overlapping_squares() {
        let rings = vec![square(0.0, 0.0, 2.0, 2.0), square(1.0, 1.0, 3.0, 3.0)];
        let result = union_rings(&rings);
        assert!(result.is_single_loop());
        assert_relative_eq!(result.area(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_of_nested_squares_is_outer() {
        let rings = vec![square(0.0, 0.0, 10.0, 10.0), square(2.0, 2.0, 8.0, 8.0)];
        let result = union_rings(&rings);
        assert!(result.is_single_loop());
        assert_relative_eq!(result.area(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_of_frame_has_hole() {
        let rings = vec![
            square(0.0, 0.0, 10.0, 2.0),
            square(8.0, 0.0, 10.0, 10.0),
            square(0.0, 8.0, 10.0, 10.0),
            square(0.0, 0.0, 2.0, 10.0),
        ];
        let result = union_rings(&rings);
        assert_eq!(result.shape_count(), 1);
        assert_eq!(result.shapes[0].holes.len(), 1);
        assert_relative_eq!(result.area(), 64.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parity_of_identical_rings_is_empty() {
        let a = square(0.0, 0.0, 5.0, 5.0);
        assert!(parity(&a, &a).is_empty());
        let b = square(1.0, 1.0, 4.0, 4.0);
        assert!(!parity(&a, &b).is_empty());
    }

    #[test]
    fn test_intersection_single_loop() {
        let a = square(0.0, 0.0, 4.0, 4.0);
        let b = square(2.0, 2.0, 6.0, 6.0);
        let result = intersection(&a, &b);
        assert_eq!(result.shape_count(), 1);
        assert_relative_eq!(result.area(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_rings_make_empty_regions() {
        let flat = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ];
        assert!(Region::from_ring(&flat).is_empty());
        assert!(Region::from_ring(&flat[..2]).is_empty());
        assert!(!Region::from_ring(&square(0.0, 0.0, 1.0, 1.0)).is_empty());
    }
}
