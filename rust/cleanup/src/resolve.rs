// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygonal-hole resolution of a composite loop.
//!
//! A loop owned by several features of one class is recorded as a single
//! cleaned boundary. The area union of the contributing features can leave
//! holes (a ring of voids around solid ground); each hole is peeled out of a
//! scratch network and stitched back into the scratch DTM with the opposite
//! class, so the next pass of that class picks it up.

use std::collections::BTreeSet;

use dtm_lite_geometry::bool2d::{contour_to_ring, union_rings};
use dtm_lite_geometry::polygon::same_xy;
use dtm_lite_tin::{
    Dtm, FeatureId, FeatureProvenance, FeatureState, FeatureType, TinNetwork, NULL_USER_TAG,
};
use nalgebra::Point3;

use crate::error::{Error, Result};
use crate::stitch::store_with_provenance;
use crate::walk::find_polygons;

/// A loop owned by more than one feature of the same class.
#[derive(Debug, Clone)]
pub struct Composite<'a> {
    /// Outline of the loop, closed.
    pub ring: &'a [Point3<f64>],
    /// Contributing scratch features.
    pub features: &'a BTreeSet<usize>,
    /// Type the cleaned boundary is stored as.
    pub feature_type: FeatureType,
    /// Id the cleaned boundary derives from.
    pub use_feature_id: FeatureId,
}

/// Record `composite` in `cleaned` and stitch the holes of its union back
/// into `scratch` with the opposite class.
///
/// Rings of three points or fewer are rejected with
/// [`Error::DegenerateLoop`] before anything is stored.
pub fn resolve_composite(
    scratch: &mut Dtm,
    cleaned: &mut Dtm,
    network: &TinNetwork,
    composite: &Composite<'_>,
) -> Result<()> {
    if composite.ring.len() <= 3 {
        return Err(Error::DegenerateLoop {
            points: composite.ring.len(),
        });
    }

    let Some(&first) = composite.features.first() else {
        return Err(Error::Invariant("composite loop without features".to_string()));
    };
    if scratch.feature(first).map(|f| f.state) == Some(FeatureState::Deleted) {
        tracing::trace!(feature = first, "composite already resolved");
        return Ok(());
    }

    cleaned.store_derived_feature(
        composite.feature_type,
        NULL_USER_TAG,
        Some(composite.use_feature_id),
        FeatureProvenance::Merged(composite.use_feature_id),
        composite.ring,
    )?;

    let mut closed = Vec::new();
    let mut open = Vec::new();
    for &feature in composite.features {
        let points = scratch.feature_points(feature)?;
        match (points.first(), points.last()) {
            (Some(a), Some(b)) if points.len() > 1 && same_xy(a, b) => closed.push(points),
            _ => open.push(points),
        }
    }
    closed.extend(assemble_chains(open));

    let region = union_rings(&closed);
    let mut outers = Vec::with_capacity(region.shape_count());
    let mut holes = Vec::new();
    for shape in &region.shapes {
        outers.push(contour_to_ring(&shape.outer));
        if !region.is_single_loop() {
            holes.extend(shape.holes.iter().map(|h| contour_to_ring(h)));
        }
    }
    tracing::debug!(
        features = composite.features.len(),
        outers = outers.len(),
        holes = holes.len(),
        "resolved composite union"
    );

    let flipped = if composite.feature_type.is_void_like() {
        FeatureType::Island
    } else {
        FeatureType::Void
    };

    let mut inner = Dtm::with_settings(*scratch.settings());
    for hole in &holes {
        inner.store_feature(FeatureType::Breakline, flipped.code(), None, hole)?;
    }
    extract_inner_loops(&outers, network.tolerance(), &mut inner, flipped)?;
    if inner.feature_count() == 0 {
        return Ok(());
    }

    let inner_network = inner.triangulate()?;
    let polygons = find_polygons(inner_network);
    for mut polygon in polygons {
        let closes = matches!((polygon.first(), polygon.last()), (Some(a), Some(b)) if polygon.len() > 3 && same_xy(a, b));
        if !closes {
            continue;
        }
        store_with_provenance(scratch, network, composite.features, &mut polygon, flipped)?;
    }
    Ok(())
}

/// Store into `inner` every edge of `outers` that lies inside their common
/// hull, reversed so it bounds the enclosed area anticlockwise.
fn extract_inner_loops(
    outers: &[Vec<Point3<f64>>],
    tolerance: f64,
    inner: &mut Dtm,
    flipped: FeatureType,
) -> Result<()> {
    let input: Vec<(usize, Vec<Point3<f64>>)> = outers.iter().cloned().enumerate().collect();
    if input.iter().map(|(_, r)| r.len()).sum::<usize>() < 3 {
        return Ok(());
    }
    let network = TinNetwork::build(&input, tolerance)?;

    let mut stored = 0;
    for (p, q) in network.links() {
        if network.is_hull_link(p, q) {
            continue;
        }
        let link = if network.has_feature_edge(p, q) {
            [*network.point(q), *network.point(p)]
        } else if network.has_feature_edge(q, p) {
            [*network.point(p), *network.point(q)]
        } else {
            continue;
        };
        inner.store_feature(FeatureType::Breakline, flipped.code(), None, &link)?;
        stored += 1;
    }
    if stored > 0 {
        tracing::trace!(links = stored, "extracted inner links");
    }
    Ok(())
}

/// Join open point strings end to end into closed rings. Strings that cannot
/// be closed are dropped.
pub fn assemble_chains(mut open: Vec<Vec<Point3<f64>>>) -> Vec<Vec<Point3<f64>>> {
    let mut rings = Vec::new();
    while let Some(mut chain) = open.pop() {
        loop {
            let (Some(&head), Some(&tail)) = (chain.first(), chain.last()) else {
                break;
            };
            if chain.len() > 3 && same_xy(&head, &tail) {
                rings.push(chain);
                break;
            }
            let next = open.iter().position(|c| {
                c.first().is_some_and(|p| same_xy(p, &tail)) || c.last().is_some_and(|p| same_xy(p, &tail))
            });
            let Some(at) = next else {
                tracing::debug!(points = chain.len(), "dropped open chain");
                break;
            };
            let mut piece = open.swap_remove(at);
            if piece.first().is_some_and(|p| !same_xy(p, &tail)) {
                piece.reverse();
            }
            chain.extend(piece.into_iter().skip(1));
        }
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtm_lite_geometry::polygon::signed_area_xy;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x0, y0, 0.0),
            Point3::new(x1, y0, 0.0),
            Point3::new(x1, y1, 0.0),
            Point3::new(x0, y1, 0.0),
            Point3::new(x0, y0, 0.0),
        ]
    }

    fn scratch_of(rings: &[Vec<Point3<f64>>], ty: FeatureType) -> Dtm {
        let mut dtm = Dtm::new();
        for (i, ring) in rings.iter().enumerate() {
            dtm.store_feature(FeatureType::Breakline, ty.code(), Some(100 + i as i64), ring)
                .unwrap();
        }
        dtm.triangulate().unwrap();
        dtm
    }

    #[test]
    fn three_point_ring_is_rejected() {
        let mut scratch = scratch_of(&[rect(0.0, 0.0, 4.0, 4.0)], FeatureType::Void);
        let network = scratch.shared_network().unwrap();
        let mut cleaned = Dtm::new();
        let ring = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let features = BTreeSet::from([0]);
        let composite = Composite {
            ring: &ring,
            features: &features,
            feature_type: FeatureType::Void,
            use_feature_id: 100,
        };
        let err = resolve_composite(&mut scratch, &mut cleaned, &network, &composite).unwrap_err();
        assert!(matches!(err, Error::DegenerateLoop { points: 3 }));
        assert_eq!(cleaned.feature_count(), 0);
    }

    #[test]
    fn ring_of_voids_punches_an_island() {
        // Four bars framing the square (4,4)-(6,6)
        let bars = [
            rect(2.0, 2.0, 8.0, 4.0),
            rect(6.0, 2.0, 8.0, 8.0),
            rect(2.0, 6.0, 8.0, 8.0),
            rect(2.0, 2.0, 4.0, 8.0),
        ];
        let mut scratch = scratch_of(&bars, FeatureType::Void);
        let network = scratch.shared_network().unwrap();
        let before = scratch.feature_count();
        let mut cleaned = Dtm::new();

        let outline = rect(2.0, 2.0, 8.0, 8.0);
        let features: BTreeSet<usize> = (0..4).collect();
        let composite = Composite {
            ring: &outline,
            features: &features,
            feature_type: FeatureType::Void,
            use_feature_id: 100,
        };
        resolve_composite(&mut scratch, &mut cleaned, &network, &composite).unwrap();

        assert_eq!(cleaned.feature_count(), 1);
        let record = &cleaned.features()[0];
        assert_eq!(record.feature_type, FeatureType::Void);
        assert_eq!(record.user_tag, NULL_USER_TAG);
        assert_eq!(record.provenance, FeatureProvenance::Merged(100));

        let stitched = &scratch.features()[before..];
        assert!(!stitched.is_empty());
        let mut area = 0.0;
        for (i, f) in stitched.iter().enumerate() {
            assert_eq!(f.tagged_type(), Some(FeatureType::Island));
            assert!(f.provenance.is_merged());
            let pts = scratch.feature_points(before + i).unwrap();
            area += pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0;
        }
        // Runs of one anticlockwise ring add up to its area
        approx::assert_relative_eq!(area.abs(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn nested_union_has_no_holes() {
        let rings = [rect(0.0, 0.0, 10.0, 10.0), rect(2.0, 2.0, 8.0, 8.0)];
        let mut scratch = scratch_of(&rings, FeatureType::Void);
        let network = scratch.shared_network().unwrap();
        let before = scratch.feature_count();
        let mut cleaned = Dtm::new();

        let features = BTreeSet::from([0, 1]);
        let composite = Composite {
            ring: &rings[0],
            features: &features,
            feature_type: FeatureType::Void,
            use_feature_id: 100,
        };
        resolve_composite(&mut scratch, &mut cleaned, &network, &composite).unwrap();
        assert_eq!(cleaned.feature_count(), 1);
        assert_eq!(scratch.feature_count(), before);
        approx::assert_relative_eq!(signed_area_xy(&cleaned.feature_points(0).unwrap()), 100.0);
    }

    #[test]
    fn deleted_representative_is_a_no_op() {
        let rings = [rect(0.0, 0.0, 10.0, 10.0), rect(5.0, 5.0, 15.0, 15.0)];
        let mut scratch = scratch_of(&rings, FeatureType::Void);
        let network = scratch.shared_network().unwrap();
        scratch.remove_feature(0).unwrap();
        let mut cleaned = Dtm::new();

        let features = BTreeSet::from([0, 1]);
        let composite = Composite {
            ring: &rings[0],
            features: &features,
            feature_type: FeatureType::Void,
            use_feature_id: 100,
        };
        resolve_composite(&mut scratch, &mut cleaned, &network, &composite).unwrap();
        assert_eq!(cleaned.feature_count(), 0);
    }

    #[test]
    fn chains_close_through_reversed_pieces() {
        let p = |x: f64, y: f64| Point3::new(x, y, 0.0);
        let open = vec![
            vec![p(0.0, 0.0), p(4.0, 0.0)],
            vec![p(4.0, 4.0), p(4.0, 0.0)],
            vec![p(4.0, 4.0), p(0.0, 4.0), p(0.0, 0.0)],
            vec![p(9.0, 9.0), p(10.0, 9.0)],
        ];
        let rings = assemble_chains(open);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 5);
        assert!(same_xy(&rings[0][0], &rings[0][4]));
    }
}
