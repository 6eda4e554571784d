// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned XY ranges used as the cheap filter in front of exact
//! polygon tests.

use nalgebra::{Point2, Point3};

/// XY bounding range of a point set. Elevations are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range2d {
    pub low: Point2<f64>,
    pub high: Point2<f64>,
}

impl Range2d {
    /// Range of a single point.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self {
            low: Point2::new(x, y),
            high: Point2::new(x, y),
        }
    }

    /// Range of a 3D point set, `None` when the set is empty.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut range = Self::from_point(first.x, first.y);
        for p in iter {
            range.extend(p.x, p.y);
        }
        Some(range)
    }

    /// Grow the range to include `(x, y)`.
    pub fn extend(&mut self, x: f64, y: f64) {
        self.low.x = self.low.x.min(x);
        self.low.y = self.low.y.min(y);
        self.high.x = self.high.x.max(x);
        self.high.y = self.high.y.max(y);
    }

    /// True when `other` lies inside this range (boundaries inclusive).
    pub fn contains_range(&self, other: &Range2d) -> bool {
        other.low.x >= self.low.x
            && other.low.y >= self.low.y
            && other.high.x <= self.high.x
            && other.high.y <= self.high.y
    }

    /// True when the two ranges touch or overlap.
    pub fn overlaps(&self, other: &Range2d) -> bool {
        self.low.x <= other.high.x
            && self.high.x >= other.low.x
            && self.low.y <= other.high.y
            && self.high.y >= other.low.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_is_inclusive() {
        let outer = Range2d {
            low: Point2::new(0.0, 0.0),
            high: Point2::new(10.0, 10.0),
        };
        let inner = Range2d {
            low: Point2::new(2.0, 0.0),
            high: Point2::new(10.0, 8.0),
        };
        assert!(outer.contains_range(&inner));
        assert!(outer.contains_range(&outer));
        assert!(!inner.contains_range(&outer));
    }

    #[test]
    fn from_points_ignores_elevation() {
        let pts = vec![
            Point3::new(1.0, 5.0, 100.0),
            Point3::new(-2.0, 3.0, -40.0),
            Point3::new(4.0, 4.0, 0.0),
        ];
        let range = Range2d::from_points(&pts).unwrap();
        assert_eq!(range.low, Point2::new(-2.0, 3.0));
        assert_eq!(range.high, Point2::new(4.0, 5.0));
        assert!(Range2d::from_points(&Vec::<Point3<f64>>::new()).is_none());
    }

    #[test]
    fn overlap_detection() {
        let a = Range2d {
            low: Point2::new(0.0, 0.0),
            high: Point2::new(10.0, 10.0),
        };
        let b = Range2d {
            low: Point2::new(5.0, 5.0),
            high: Point2::new(15.0, 15.0),
        };
        let c = Range2d {
            low: Point2::new(20.0, 20.0),
            high: Point2::new(30.0, 30.0),
        };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
