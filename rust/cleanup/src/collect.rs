// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pull in features nested inside a composite loop.

use std::collections::{BTreeSet, VecDeque};

use dtm_lite_tin::{Dtm, TinNetwork};

use crate::classify::{feature_class, EdgeClass};
use crate::walk::TraceMap;

/// Grow `features` with every `class` feature reachable through shared
/// edges that are not part of the traced outline.
///
/// Two anticlockwise rings touching along an edge run it in opposite
/// directions, so each off-outline edge of a member is looked up reversed.
pub fn collect_internal_connecting(
    network: &TinNetwork,
    dtm: &Dtm,
    trace: &TraceMap,
    class: EdgeClass,
    features: &mut BTreeSet<usize>,
) {
    let before = features.len();
    let mut queue: VecDeque<usize> = features.iter().copied().collect();

    while let Some(feature) = queue.pop_front() {
        let Some(ring) = network.feature_ring(feature) else {
            continue;
        };
        for pair in ring.windows(2) {
            let (p1, p2) = (pair[0], pair[1]);
            if trace.next(p1) == Some(p2) {
                continue;
            }
            for other in network.features_on_edge(p2, p1) {
                if feature_class(dtm, other) == Some(class) && features.insert(other) {
                    queue.push_back(other);
                }
            }
        }
    }

    if features.len() > before {
        tracing::trace!(added = features.len() - before, "collected internal connecting features");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::is_breakline_edge;
    use crate::walk::walk_hull_loop;
    use dtm_lite_tin::FeatureType;
    use nalgebra::Point3;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x0, y0, 0.0),
            Point3::new(x1, y0, 0.0),
            Point3::new(x1, y1, 0.0),
            Point3::new(x0, y1, 0.0),
            Point3::new(x0, y0, 0.0),
        ]
    }

    #[test]
    fn neighbour_behind_the_outline_is_collected() {
        // B sits on A's bottom edge, C sits on top of B, only touching it
        let mut dtm = Dtm::new();
        let tag = FeatureType::Void.code();
        for ring in [rect(0.0, 0.0, 10.0, 10.0), rect(2.0, 0.0, 8.0, 5.0), rect(2.0, 5.0, 8.0, 8.0)] {
            dtm.store_feature(FeatureType::Breakline, tag, None, &ring).unwrap();
        }
        dtm.triangulate().unwrap();
        let network = dtm.shared_network().unwrap();

        let hull = &network.hull_loops()[0];
        let (sp, np) = (hull[0], hull[1]);
        assert!(is_breakline_edge(&network, &dtm, sp, np, EdgeClass::VoidLike));

        let mut trace = TraceMap::new();
        let found = walk_hull_loop(&network, &dtm, sp, np, EdgeClass::VoidLike, &mut trace).unwrap();
        assert_eq!(found.features.iter().copied().collect::<Vec<_>>(), vec![0, 1]);

        let mut features = found.features.clone();
        collect_internal_connecting(&network, &dtm, &trace, EdgeClass::VoidLike, &mut features);
        assert_eq!(features.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn other_class_is_not_collected() {
        let mut dtm = Dtm::new();
        dtm.store_feature(FeatureType::Breakline, FeatureType::Void.code(), None, &rect(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        dtm.store_feature(FeatureType::Breakline, FeatureType::Void.code(), None, &rect(2.0, 0.0, 8.0, 5.0))
            .unwrap();
        dtm.store_feature(FeatureType::Breakline, FeatureType::Island.code(), None, &rect(2.0, 5.0, 8.0, 8.0))
            .unwrap();
        dtm.triangulate().unwrap();
        let network = dtm.shared_network().unwrap();

        let hull = &network.hull_loops()[0];
        let mut trace = TraceMap::new();
        let found = walk_hull_loop(&network, &dtm, hull[0], hull[1], EdgeClass::VoidLike, &mut trace).unwrap();
        let mut features = found.features;
        collect_internal_connecting(&network, &dtm, &trace, EdgeClass::VoidLike, &mut features);
        assert!(!features.contains(&2));
    }
}
