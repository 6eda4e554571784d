// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fragment joining and hull feature policy.
//!
//! Line fragments (`VoidLine`, `HoleLine`, `HullLine`) whose endpoints meet
//! within tolerance are chained into single features. Chains that close
//! become the matching polygon type.

use dtm_lite_geometry::polygon::{distance_xy, same_xy};
use dtm_lite_tin::{Dtm, DtmState, FeatureState, FeatureType, JoinRecord};
use nalgebra::Point3;
use serde::Serialize;

use crate::error::Result;

/// Feature counts around one join pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinSummary {
    /// Fragments of the joined type before the pass.
    pub before: usize,
    /// Features left once the fragments are chained.
    pub after: usize,
    /// Fragments deleted because they were merged into a new feature.
    pub replaced: usize,
}

/// Outcome of the hull feature policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HullCheck {
    /// Drape hulls and hull lines set aside.
    pub dropped: usize,
    /// Hull line fragments merged.
    pub joined: usize,
}

struct Chain {
    sources: Vec<usize>,
    points: Vec<Point3<f64>>,
}

impl Chain {
    fn is_closed(&self, tolerance: f64) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => self.points.len() > 2 && distance_xy(a, b) <= tolerance,
            _ => false,
        }
    }

    fn touches(&self, piece: &[Point3<f64>], tolerance: f64) -> bool {
        let ends = [self.points.first(), self.points.last()];
        let piece_ends = [piece.first(), piece.last()];
        ends.iter().flatten().any(|a| piece_ends.iter().flatten().any(|b| distance_xy(a, b) <= tolerance))
    }

    /// Append or prepend `piece` if one of its ends meets one of the chain's.
    fn attach(&mut self, piece: &[Point3<f64>], tolerance: f64) -> bool {
        let (Some(&head), Some(&tail)) = (self.points.first(), self.points.last()) else {
            return false;
        };
        let (Some(start), Some(end)) = (piece.first(), piece.last()) else {
            return false;
        };
        let meets = |a: &Point3<f64>, b: &Point3<f64>| distance_xy(a, b) <= tolerance;

        if meets(&tail, start) {
            self.points.extend(piece.iter().skip(1).copied());
        } else if meets(&tail, end) {
            self.points.extend(piece.iter().rev().skip(1).copied());
        } else if meets(&head, end) {
            let mut joined = piece[..piece.len() - 1].to_vec();
            joined.append(&mut self.points);
            self.points = joined;
        } else if meets(&head, start) {
            let mut joined: Vec<_> = piece.iter().rev().copied().collect();
            joined.pop();
            joined.append(&mut self.points);
            self.points = joined;
        } else {
            return false;
        }
        true
    }
}

/// Chain every active `from` feature with fragments sharing an endpoint
/// within `tolerance`. Closed chains are stored as `to`, open ones keep
/// `from`. Merged fragments are rolled back and deleted.
pub fn join_feature_type(
    dtm: &mut Dtm,
    tolerance: f64,
    from: FeatureType,
    to: FeatureType,
) -> Result<JoinSummary> {
    dtm.require_state(DtmState::Data)?;

    let indices: Vec<usize> = dtm
        .active_features()
        .filter(|(_, f)| f.feature_type == from)
        .map(|(i, _)| i)
        .collect();
    let mut summary = JoinSummary {
        before: indices.len(),
        ..JoinSummary::default()
    };
    if indices.is_empty() {
        return Ok(summary);
    }

    let mut pool = Vec::with_capacity(indices.len());
    for index in indices {
        pool.push((index, dtm.feature_points(index)?));
    }
    pool.reverse();

    let mut chains = Vec::new();
    while let Some((index, points)) = pool.pop() {
        let mut chain = Chain {
            sources: vec![index],
            points,
        };
        while !chain.is_closed(tolerance) {
            let Some(at) = pool.iter().rposition(|(_, p)| chain.touches(p, tolerance)) else {
                break;
            };
            let (next, piece) = pool.remove(at);
            chain.attach(&piece, tolerance);
            chain.sources.push(next);
        }
        chains.push(chain);
    }

    for mut chain in chains {
        summary.after += 1;
        let closed = chain.is_closed(tolerance);
        if closed {
            let first = chain.points[0];
            let last = chain.points.len() - 1;
            if !same_xy(&first, &chain.points[last]) {
                chain.points[last] = first;
            }
        }

        if let [single] = chain.sources[..] {
            if closed && from != to {
                dtm.replace_feature_points(single, &chain.points)?;
                dtm.set_feature_type(single, to)?;
            }
            continue;
        }

        let user_tag = dtm.feature(chain.sources[0]).map_or(0, |f| f.user_tag);
        let feature_type = if closed { to } else { from };
        let new = dtm.store_feature(feature_type, user_tag, None, &chain.points)?;
        let new_id = dtm.feature(new).map_or(0, |f| f.id);

        let mut sources = Vec::with_capacity(chain.sources.len());
        for &index in &chain.sources {
            if let Some(f) = dtm.feature(index) {
                sources.push(f.id);
            }
            dtm.roll_back_feature(index)?;
            dtm.remove_feature(index)?;
        }
        summary.replaced += chain.sources.len();
        tracing::trace!(new_id, fragments = sources.len(), ?feature_type, "joined fragments");
        if let Some(store) = dtm.rollback_mut() {
            store.record_join(JoinRecord { new_id, sources });
        }
    }

    tracing::debug!(?from, ?to, before = summary.before, after = summary.after, "joined feature type");
    Ok(summary)
}

/// Join void lines into voids and hole lines into holes.
pub fn join_voids_and_holes(dtm: &mut Dtm, tolerance: f64) -> Result<usize> {
    let voids = join_feature_type(dtm, tolerance, FeatureType::VoidLine, FeatureType::Void)?;
    let holes = join_feature_type(dtm, tolerance, FeatureType::HoleLine, FeatureType::Hole)?;
    Ok(voids.replaced + holes.replaced)
}

/// Join hull lines. A single resulting line that closes within `pp_tol`
/// becomes the hull.
pub fn join_hull_lines(dtm: &mut Dtm) -> Result<JoinSummary> {
    let tolerance = dtm.settings().pp_tol;
    let summary = join_feature_type(dtm, tolerance, FeatureType::HullLine, FeatureType::HullLine)?;
    if summary.after != 1 {
        return Ok(summary);
    }

    let line = dtm
        .active_features()
        .find(|(_, f)| f.feature_type == FeatureType::HullLine)
        .map(|(i, _)| i);
    if let Some(index) = line {
        let points = dtm.feature_points(index)?;
        if let (Some(a), Some(b)) = (points.first(), points.last()) {
            if distance_xy(a, b) <= tolerance {
                dtm.set_feature_type(index, FeatureType::Hull)?;
                tracing::debug!(feature = index, "promoted hull line to hull");
            }
        }
    }
    Ok(summary)
}

/// Apply the hull precedence rules: a hull beats a drape hull, and either
/// beats hull lines. Set-aside features keep their points out of line in
/// `TinError` state. Hull lines left standing are joined.
pub fn check_hull_features(dtm: &mut Dtm) -> Result<HullCheck> {
    dtm.require_state(DtmState::Data)?;

    let (mut hulls, mut drape_hulls, mut hull_lines) = (0, 0, 0);
    for (_, feature) in dtm.active_features() {
        match feature.feature_type {
            FeatureType::Hull => hulls += 1,
            FeatureType::DrapeHull => drape_hulls += 1,
            FeatureType::HullLine => hull_lines += 1,
            _ => {}
        }
    }
    let drop_drape_hulls = hulls > 0 && drape_hulls > 0;
    let drop_hull_lines = hull_lines > 0 && (hulls > 0 || drape_hulls > 0);
    tracing::debug!(hulls, drape_hulls, hull_lines, drop_drape_hulls, drop_hull_lines, "checking hull features");

    let mut check = HullCheck::default();
    if drop_drape_hulls || drop_hull_lines {
        for index in 0..dtm.feature_count() {
            let Some(feature) = dtm.feature(index) else {
                continue;
            };
            if !matches!(feature.state, FeatureState::Data | FeatureState::PointsArray) {
                continue;
            }
            let drop = match feature.feature_type {
                FeatureType::DrapeHull => drop_drape_hulls,
                FeatureType::HullLine => drop_hull_lines,
                _ => false,
            };
            if drop {
                dtm.capture_points_out_of_line(index)?;
                dtm.set_feature_state(index, FeatureState::TinError)?;
                check.dropped += 1;
            }
        }
    }

    if hull_lines > 0 && !drop_hull_lines {
        check.joined = join_hull_lines(dtm)?.replaced;
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtm_lite_tin::FeaturePoints;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point3<f64>> {
        coords.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect()
    }

    #[test]
    fn void_lines_close_into_a_void() {
        let mut dtm = Dtm::new();
        dtm.enable_rollback();
        dtm.store_feature(FeatureType::VoidLine, 5, Some(1), &pts(&[(0.0, 0.0), (4.0, 0.0)])).unwrap();
        // Reversed fragment
        dtm.store_feature(FeatureType::VoidLine, 6, Some(2), &pts(&[(4.0, 4.0), (4.0, 0.0)])).unwrap();
        dtm.store_feature(FeatureType::VoidLine, 7, Some(3), &pts(&[(4.0, 4.0), (0.0, 4.0), (0.0, 0.00001)]))
            .unwrap();

        let summary = join_feature_type(&mut dtm, 1e-3, FeatureType::VoidLine, FeatureType::Void).unwrap();
        assert_eq!(summary, JoinSummary { before: 3, after: 1, replaced: 3 });

        let (index, void) = dtm.active_features().next().unwrap();
        assert_eq!(void.feature_type, FeatureType::Void);
        assert_eq!(void.user_tag, 5);
        let ring = dtm.feature_points(index).unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);

        let store = dtm.rollback().unwrap();
        assert_eq!(store.features().len(), 3);
        assert_eq!(store.joins()[0].sources, vec![1, 2, 3]);
    }

    #[test]
    fn open_chain_keeps_its_type() {
        let mut dtm = Dtm::new();
        dtm.store_feature(FeatureType::HoleLine, 0, None, &pts(&[(0.0, 0.0), (4.0, 0.0)])).unwrap();
        dtm.store_feature(FeatureType::HoleLine, 0, None, &pts(&[(4.0, 0.0), (4.0, 4.0)])).unwrap();
        dtm.store_feature(FeatureType::HoleLine, 0, None, &pts(&[(9.0, 9.0), (9.0, 10.0)])).unwrap();

        let replaced = join_voids_and_holes(&mut dtm, 1e-4).unwrap();
        assert_eq!(replaced, 2);
        let types: Vec<_> = dtm.active_features().map(|(_, f)| f.feature_type).collect();
        assert_eq!(types, vec![FeatureType::HoleLine, FeatureType::HoleLine]);
    }

    #[test]
    fn single_closed_fragment_changes_type_in_place() {
        let mut dtm = Dtm::new();
        let index = dtm
            .store_feature(FeatureType::VoidLine, 0, Some(9), &pts(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)]))
            .unwrap();
        let summary = join_feature_type(&mut dtm, 1e-4, FeatureType::VoidLine, FeatureType::Void).unwrap();
        assert_eq!(summary.replaced, 0);
        assert_eq!(dtm.feature(index).unwrap().feature_type, FeatureType::Void);
        assert_eq!(dtm.feature(index).unwrap().id, 9);
    }

    #[test]
    fn hull_lines_become_the_hull() {
        let mut dtm = Dtm::new();
        dtm.store_feature(FeatureType::HullLine, 0, None, &pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)])).unwrap();
        dtm.store_feature(FeatureType::HullLine, 0, None, &pts(&[(10.0, 10.0), (0.0, 10.0), (0.0, 0.0)])).unwrap();

        let check = check_hull_features(&mut dtm).unwrap();
        assert_eq!(check, HullCheck { dropped: 0, joined: 2 });
        let hulls: Vec<_> = dtm.active_features().map(|(_, f)| f.feature_type).collect();
        assert_eq!(hulls, vec![FeatureType::Hull]);
    }

    #[test]
    fn hull_wins_over_drape_hull_and_hull_lines() {
        let mut dtm = Dtm::new();
        let square = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        dtm.store_feature(FeatureType::Hull, 0, None, &square).unwrap();
        let drape = dtm.store_feature(FeatureType::DrapeHull, 0, None, &square).unwrap();
        let line = dtm.store_feature(FeatureType::HullLine, 0, None, &pts(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();

        let check = check_hull_features(&mut dtm).unwrap();
        assert_eq!(check.dropped, 2);
        assert_eq!(check.joined, 0);
        for index in [drape, line] {
            let feature = dtm.feature(index).unwrap();
            assert_eq!(feature.state, FeatureState::TinError);
            assert!(matches!(feature.points, FeaturePoints::Array(_)));
        }
    }
}
