// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of resolved boundaries with the live DTM.

use dtm_lite_geometry::polygon::same_xy;
use dtm_lite_tin::{Dtm, DtmState, FeatureId, FeatureProvenance, FeatureType, NULL_USER_TAG};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::config::CleanupConfig;
use crate::error::Result;
use crate::orchestrator::resolve_multiple_intersecting;

/// What a cleanup call did to the feature table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Features rejected by validation.
    pub validation_errors: usize,
    /// Boundary features rolled back and deleted.
    pub removed: usize,
    /// Resolved boundary features stored.
    pub added: usize,
    /// Boundary features left as they were.
    pub unchanged: usize,
    /// Hull features set aside by the hull precedence rules.
    pub dropped_hull_features: usize,
    /// Line fragments merged by the join passes.
    pub joined: usize,
}

impl CleanupReport {
    /// True when the boundary set came out exactly as it went in.
    pub fn is_unchanged(&self) -> bool {
        self.removed == 0 && self.added == 0
    }
}

/// Resolve the closed void, island and hole features of `dtm` against each
/// other and write the result back. Only `removed`, `added` and `unchanged`
/// are filled in the returned report.
pub fn resolve_void_and_islands(dtm: &mut Dtm, config: &CleanupConfig) -> Result<CleanupReport> {
    dtm.require_state(DtmState::Data)?;

    let mut bndy = Dtm::with_settings(*dtm.settings());
    let mut considered = Vec::new();
    let (mut voids, mut islands) = (0, 0);
    for (index, feature) in dtm.active_features() {
        if !feature.feature_type.is_void_or_island() {
            continue;
        }
        let points = dtm.feature_points(index)?;
        let closed = matches!((points.first(), points.last()), (Some(a), Some(b)) if points.len() > 1 && same_xy(a, b));
        if !closed {
            tracing::trace!(feature = index, id = feature.id, "open boundary ignored");
            continue;
        }
        match feature.feature_type {
            FeatureType::Island => islands += 1,
            _ => voids += 1,
        }
        bndy.store_feature(feature.feature_type, feature.user_tag, Some(feature.id), &points)?;
        considered.push(index);
    }

    let mut report = CleanupReport::default();
    if voids <= 1 && islands <= 1 {
        report.unchanged = considered.len();
        tracing::debug!(voids, islands, "nothing to resolve");
        return Ok(report);
    }
    resolve_multiple_intersecting(&mut bndy, config)?;

    let mut unchanged: FxHashSet<FeatureId> = FxHashSet::default();
    let mut changed = Vec::new();
    for (index, feature) in bndy.active_features() {
        if feature.provenance == FeatureProvenance::Direct(feature.id) {
            unchanged.insert(feature.id);
        } else {
            changed.push(index);
        }
    }

    let mut replaced_ids = Vec::new();
    for &index in &considered {
        let Some(id) = dtm.feature(index).map(|f| f.id) else {
            continue;
        };
        if unchanged.contains(&id) {
            report.unchanged += 1;
            continue;
        }
        dtm.roll_back_feature(index)?;
        dtm.remove_feature(index)?;
        replaced_ids.push(id);
        report.removed += 1;
    }

    let mut assigned: FxHashSet<FeatureId> = FxHashSet::default();
    let mut spare = replaced_ids.into_iter();
    for index in changed {
        let Some(feature) = bndy.feature(index) else {
            continue;
        };
        let source = feature.provenance.source();
        let user_tag = dtm
            .find_feature_by_id(source)
            .and_then(|i| dtm.feature(i))
            .map_or(NULL_USER_TAG, |f| f.user_tag);

        let id = if !dtm.is_id_in_use(source) && !assigned.contains(&source) {
            Some(source)
        } else {
            spare.by_ref().find(|id| !dtm.is_id_in_use(*id) && !assigned.contains(id))
        };
        if let Some(id) = id {
            assigned.insert(id);
        }

        let points = bndy.feature_points(index)?;
        let stored = dtm.store_feature(feature.feature_type, user_tag, id, &points)?;
        tracing::trace!(
            feature = stored,
            source,
            ?id,
            feature_type = ?feature.feature_type,
            "stored resolved boundary"
        );
        report.added += 1;
    }

    tracing::debug!(
        removed = report.removed,
        added = report.added,
        unchanged = report.unchanged,
        "reconciled boundaries"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn single_void_and_island_are_left_alone() {
        let mut dtm = Dtm::new();
        dtm.store_feature(FeatureType::Void, 1, None, &rect(0.0, 0.0, 4.0, 4.0)).unwrap();
        dtm.store_feature(FeatureType::Island, 2, None, &rect(1.0, 1.0, 3.0, 3.0)).unwrap();
        let report = resolve_void_and_islands(&mut dtm, &CleanupConfig::default()).unwrap();
        assert!(report.is_unchanged());
        assert_eq!(report.unchanged, 2);
    }

    #[test]
    fn merged_void_reuses_source_id_and_tag() {
        let mut dtm = Dtm::new();
        dtm.enable_rollback();
        dtm.store_feature(FeatureType::Void, 41, Some(7), &rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        dtm.store_feature(FeatureType::Void, 42, Some(8), &rect(5.0, 5.0, 15.0, 15.0)).unwrap();
        dtm.store_feature(FeatureType::Breakline, 0, Some(9), &rect(20.0, 0.0, 30.0, 10.0)).unwrap();

        let report = resolve_void_and_islands(&mut dtm, &CleanupConfig::default()).unwrap();
        assert_eq!(report.removed, 2);
        assert_eq!(report.added, 1);
        assert_eq!(report.unchanged, 0);

        let voids: Vec<_> = dtm
            .active_features()
            .filter(|(_, f)| f.feature_type == FeatureType::Void)
            .map(|(_, f)| (f.id, f.user_tag))
            .collect();
        assert_eq!(voids, vec![(7, 41)]);
        assert_eq!(dtm.rollback().unwrap().features().len(), 2);
        assert!(dtm.active_features().any(|(_, f)| f.id == 9));
    }

    #[test]
    fn open_boundaries_are_not_considered() {
        let mut dtm = Dtm::new();
        let mut open = rect(0.0, 0.0, 4.0, 4.0);
        open.pop();
        dtm.store_feature(FeatureType::Void, 1, None, &open).unwrap();
        dtm.store_feature(FeatureType::Void, 1, None, &rect(10.0, 0.0, 14.0, 4.0)).unwrap();
        let report = resolve_void_and_islands(&mut dtm, &CleanupConfig::default()).unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(dtm.active_features().count(), 2);
    }
}
