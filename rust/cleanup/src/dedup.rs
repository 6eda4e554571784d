// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collapse geometrically identical boundary features.
//!
//! Two features are the same when they share type, point count and range and
//! their rings match point for point, allowing a different start point and
//! reversed order.

use dtm_lite_geometry::Range2d;
use dtm_lite_tin::FeatureType;
use nalgebra::Point3;

/// A distinct ring and every feature that carries it.
#[derive(Debug, Clone)]
pub struct UniqueFeature {
    pub points: Vec<Point3<f64>>,
    /// Feature indices sharing the ring, first one is canonical.
    pub features: Vec<usize>,
    pub feature_type: FeatureType,
    pub range: Range2d,
}

/// Ordered set of distinct boundary rings.
#[derive(Debug, Clone, Default)]
pub struct UniqueFeatureSet {
    items: Vec<UniqueFeature>,
}

impl UniqueFeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature. Returns true when the ring was not seen before.
    pub fn add(&mut self, points: &[Point3<f64>], feature: usize, feature_type: FeatureType) -> bool {
        let Some(range) = Range2d::from_points(points) else {
            return false;
        };

        for item in &mut self.items {
            if item.points.len() != points.len() || item.feature_type != feature_type || item.range != range {
                continue;
            }
            if same_ring(&item.points, points) {
                item.features.push(feature);
                return false;
            }
        }

        self.items.push(UniqueFeature {
            points: points.to_vec(),
            features: vec![feature],
            feature_type,
            range,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UniqueFeature> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a UniqueFeatureSet {
    type Item = &'a UniqueFeature;
    type IntoIter = std::slice::Iter<'a, UniqueFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Exact ring equality up to rotation and reversal.
fn same_ring(a: &[Point3<f64>], b: &[Point3<f64>]) -> bool {
    let a = open_ring(a);
    let b = open_ring(b);
    let n = a.len();
    if n != b.len() {
        return false;
    }
    if n == 0 {
        return true;
    }

    let Some(start) = a.iter().position(|p| *p == b[0]) else {
        return false;
    };
    let forward = (1..n).all(|i| b[i] == a[(start + i) % n]);
    forward || (1..n).all(|i| b[i] == a[(start + n - i) % n])
}

fn open_ring(ring: &[Point3<f64>]) -> &[Point3<f64>] {
    match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}
