// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;

use approx::assert_relative_eq;
use dtm_lite_cleanup::resolve::{resolve_composite, Composite};
use dtm_lite_cleanup::{
    resolve_multiple_intersecting, CleanupConfig, CleanupReport, DtmCleaner, Error, Forest, ForestItem,
};
use dtm_lite_geometry::polygon::signed_area_xy;
use dtm_lite_tin::{Dtm, FeatureId, FeatureProvenance, FeatureState, FeatureType};
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

/// Active void/island features as (type, id, user tag), sorted by id.
fn boundaries(dtm: &Dtm) -> Vec<(FeatureType, FeatureId, i64)> {
    let mut out: Vec<_> = dtm
        .active_features()
        .filter(|(_, f)| f.feature_type.is_void_or_island())
        .map(|(_, f)| (f.feature_type, f.id, f.user_tag))
        .collect();
    out.sort_by_key(|b| b.1);
    out
}

fn fixture(name: &str) -> Dtm {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name);
    let json = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {}: {e}", path.display()));
    Dtm::from_json(&json).unwrap()
}

#[test]
fn resolved_dtm_is_idempotent() {
    let mut dtm = Dtm::new();
    dtm.store_feature(FeatureType::Void, 1, None, &rect(0.0, 0.0, 4.0, 4.0)).unwrap();
    dtm.store_feature(FeatureType::Void, 2, None, &rect(10.0, 0.0, 14.0, 4.0)).unwrap();
    dtm.store_feature(FeatureType::Island, 3, None, &rect(20.0, 0.0, 24.0, 4.0)).unwrap();
    let before = boundaries(&dtm);

    let cleaner = DtmCleaner::new();
    for _ in 0..2 {
        let report = cleaner.clean(&mut dtm).unwrap();
        assert!(report.is_unchanged());
        assert_eq!(report.unchanged, 3);
        assert_eq!(boundaries(&dtm), before);
    }
}

#[test]
fn breaklines_survive_the_default_pipeline() {
    let line = |coords: &[(f64, f64, f64)]| -> Vec<Point3<f64>> {
        coords.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect()
    };
    let breaklines = [
        (21, line(&[(30.0, 0.0, 5.0), (34.0, 1.0, 5.5), (38.0, 0.0, 6.0)])),
        (22, line(&[(30.0, 10.0, 2.0), (34.0, 10.0, 2.0), (34.0, 14.0, 3.0), (30.0, 10.0, 2.0)])),
        (23, line(&[(40.0, 0.0, 1.0), (44.0, 4.0, 1.0), (44.0, 0.0, 1.0), (40.0, 4.0, 1.0), (40.0, 0.0, 1.0)])),
    ];

    let mut dtm = Dtm::new();
    dtm.store_feature(FeatureType::Void, 0, Some(1), &rect(0.0, 0.0, 10.0, 10.0)).unwrap();
    for (id, points) in &breaklines {
        dtm.store_feature(FeatureType::Breakline, 0, Some(*id), points).unwrap();
    }
    dtm.store_feature(FeatureType::Void, 0, Some(2), &rect(5.0, 5.0, 15.0, 15.0)).unwrap();
    dtm.store_feature(FeatureType::Island, 0, Some(3), &rect(20.0, 0.0, 24.0, 4.0)).unwrap();

    let report = DtmCleaner::new().clean(&mut dtm).unwrap();
    assert_eq!(report.validation_errors, 0);
    assert_eq!(report.removed, 2);
    assert_eq!(report.added, 1);

    let kept: BTreeSet<FeatureId> = dtm
        .active_features()
        .filter(|(_, f)| f.feature_type == FeatureType::Breakline)
        .map(|(_, f)| f.id)
        .collect();
    assert_eq!(kept, BTreeSet::from([21, 22, 23]));
    for (id, points) in &breaklines {
        let index = dtm.find_feature_by_id(*id).unwrap();
        assert_eq!(dtm.feature(index).unwrap().state, FeatureState::Data);
        assert_eq!(&dtm.feature_points(index).unwrap(), points);
    }
}

#[test]
fn fixture_ponds_merge_once() {
    let mut dtm = fixture("overlapping_ponds.json");
    dtm.enable_rollback();
    let cleaner = DtmCleaner::new();

    let first = cleaner.clean(&mut dtm).unwrap();
    assert_eq!((first.removed, first.added, first.unchanged), (2, 1, 1));
    assert_eq!(
        boundaries(&dtm),
        vec![(FeatureType::Void, 10, 501), (FeatureType::Island, 13, 503)]
    );
    let rollback = dtm.rollback().unwrap();
    assert!(rollback.contains(10) && rollback.contains(11));
    assert!(dtm.active_features().any(|(_, f)| f.id == 12 && f.feature_type == FeatureType::Breakline));

    let void = dtm
        .active_features()
        .find(|(_, f)| f.feature_type == FeatureType::Void)
        .map(|(i, _)| i)
        .unwrap();
    let ring = dtm.feature_points(void).unwrap();
    assert_relative_eq!(signed_area_xy(&ring).abs(), 175.0, epsilon = 1e-6);
    assert!(ring.iter().all(|p| (p.z - 12.5).abs() < 1e-9));

    let second = cleaner.clean(&mut dtm).unwrap();
    assert!(second.is_unchanged());
}

#[test]
fn validation_turns_polygons_anticlockwise() {
    let mut dtm = Dtm::new();
    let mut clockwise = rect(0.0, 0.0, 6.0, 3.0);
    clockwise.reverse();
    let void = dtm.store_feature(FeatureType::Void, 1, None, &clockwise).unwrap();
    let island = dtm.store_feature(FeatureType::Island, 2, None, &rect(20.0, 0.0, 22.0, 2.0)).unwrap();

    let report = DtmCleaner::new().clean(&mut dtm).unwrap();
    assert_eq!(report.validation_errors, 0);
    assert_relative_eq!(signed_area_xy(&dtm.feature_points(void).unwrap()), 18.0);
    assert_relative_eq!(signed_area_xy(&dtm.feature_points(island).unwrap()), 4.0);
}

#[test]
fn nested_void_is_absorbed() {
    let mut dtm = Dtm::new();
    dtm.store_feature(FeatureType::Void, 21, Some(1), &rect(0.0, 0.0, 10.0, 10.0)).unwrap();
    let inner = dtm.store_feature(FeatureType::Void, 22, Some(2), &rect(2.0, 2.0, 8.0, 8.0)).unwrap();

    let report = DtmCleaner::new().clean(&mut dtm).unwrap();
    assert_eq!((report.removed, report.added, report.unchanged), (1, 0, 1));
    assert_eq!(boundaries(&dtm), vec![(FeatureType::Void, 1, 21)]);
    assert_eq!(dtm.feature(inner).unwrap().state, FeatureState::Deleted);
}

#[test]
fn coincident_void_and_island_cancel() {
    let mut bndy = Dtm::new();
    bndy.store_feature(FeatureType::Void, 0, Some(1), &rect(0.0, 0.0, 5.0, 5.0)).unwrap();
    bndy.store_feature(FeatureType::Island, 0, Some(2), &rect(0.0, 0.0, 5.0, 5.0)).unwrap();

    let outcome = resolve_multiple_intersecting(&mut bndy, &CleanupConfig::default()).unwrap();
    assert_eq!(outcome.kept, 0);
    assert!(boundaries(&bndy).is_empty());
}

#[test]
fn frame_of_voids_leaves_an_island() {
    let mut dtm = Dtm::new();
    for (id, bar) in [
        rect(2.0, 2.0, 8.0, 4.0),
        rect(6.0, 2.0, 8.0, 8.0),
        rect(2.0, 6.0, 8.0, 8.0),
        rect(2.0, 2.0, 4.0, 8.0),
    ]
    .iter()
    .enumerate()
    {
        dtm.store_feature(FeatureType::Void, 100 + id as i64, Some(id as FeatureId + 1), bar).unwrap();
    }

    let report = DtmCleaner::new().clean(&mut dtm).unwrap();
    assert_eq!(report.removed, 4);
    assert_eq!(report.added, 2);

    let mut areas: Vec<(FeatureType, f64)> = dtm
        .active_features()
        .map(|(i, f)| (f.feature_type, signed_area_xy(&dtm.feature_points(i).unwrap()).abs()))
        .collect();
    areas.sort_by(|a, b| a.1.total_cmp(&b.1));
    assert_eq!(areas.len(), 2);
    assert_eq!(areas[0].0, FeatureType::Island);
    assert_relative_eq!(areas[0].1, 4.0, epsilon = 1e-6);
    assert_eq!(areas[1].0, FeatureType::Void);
    assert_relative_eq!(areas[1].1, 36.0, epsilon = 1e-6);

    let ids: BTreeSet<FeatureId> = dtm.active_features().map(|(_, f)| f.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| (1..=4).contains(id)));
}

#[test]
fn three_point_composite_is_rejected() {
    let mut scratch = Dtm::new();
    let triangle = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(4.0, 0.0, 0.0),
        Point3::new(0.0, 4.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
    ];
    scratch
        .store_feature(FeatureType::Breakline, FeatureType::Void.code(), None, &triangle)
        .unwrap();
    scratch.triangulate().unwrap();
    let network = scratch.shared_network().unwrap();
    let mut cleaned = Dtm::new();

    let features: BTreeSet<usize> = [0].into_iter().collect();
    let composite = Composite {
        ring: &triangle[..3],
        features: &features,
        feature_type: FeatureType::Void,
        use_feature_id: 1,
    };
    let err = resolve_composite(&mut scratch, &mut cleaned, &network, &composite).unwrap_err();
    assert!(matches!(err, Error::DegenerateLoop { points: 3 }));
    assert_eq!(cleaned.feature_count(), 0);
}

#[test]
fn single_owner_loops_keep_identity() {
    let mut bndy = Dtm::new();
    bndy.store_feature(FeatureType::Hole, 31, Some(5), &rect(0.0, 0.0, 3.0, 3.0)).unwrap();
    bndy.store_feature(FeatureType::Island, 32, Some(6), &rect(10.0, 0.0, 13.0, 3.0)).unwrap();
    bndy.store_feature(FeatureType::Island, 33, Some(7), &rect(20.0, 0.0, 23.0, 3.0)).unwrap();

    resolve_multiple_intersecting(&mut bndy, &CleanupConfig::default()).unwrap();
    let kept: Vec<_> = {
        let mut kept: Vec<_> = bndy
            .active_features()
            .map(|(_, f)| (f.id, f.feature_type, f.user_tag, f.provenance))
            .collect();
        kept.sort_by_key(|k| k.0);
        kept
    };
    assert_eq!(
        kept,
        vec![
            (5, FeatureType::Hole, 31, FeatureProvenance::Direct(5)),
            (6, FeatureType::Island, 32, FeatureProvenance::Direct(6)),
            (7, FeatureType::Island, 33, FeatureProvenance::Direct(7)),
        ]
    );
}

#[test]
fn forest_tracks_nesting() {
    let items = [
        (rect(0.0, 0.0, 10.0, 10.0), FeatureType::Void),
        (rect(2.0, 2.0, 8.0, 8.0), FeatureType::Island),
        (rect(4.0, 4.0, 6.0, 6.0), FeatureType::Void),
        (rect(4.0, 4.0, 6.0, 6.0), FeatureType::Void),
    ];
    let forest = Forest::build(
        items.iter().enumerate().map(|(source, (ring, feature_type))| ForestItem {
            ring: ring.clone(),
            feature_type: *feature_type,
            source,
        }),
        1e-4,
    );

    let keys = forest.keys().to_vec();
    assert_eq!(keys.len(), 4);
    assert_eq!(forest.roots(), &keys[..1]);
    assert!(forest.is_descendant(keys[2], keys[0]));
    assert!(forest.is_descendant(keys[2], keys[1]));
    assert!(!forest.is_descendant(keys[0], keys[2]));

    let kept: Vec<usize> = forest.kept().map(|n| n.source).collect();
    assert_eq!(kept, vec![0, 1, 2]);
}

#[test]
fn override_strategy_replaces_builtin() {
    let cleaner = DtmCleaner::with_config(CleanupConfig {
        force_close: false,
        ..CleanupConfig::default()
    })
    .with_override(|dtm: &mut Dtm, config: &CleanupConfig| -> dtm_lite_cleanup::Result<CleanupReport> {
        assert!(!config.force_close);
        let doomed: Vec<usize> = dtm.active_features().map(|(i, _)| i).collect();
        for &index in &doomed {
            dtm.remove_feature(index)?;
        }
        Ok(CleanupReport {
            removed: doomed.len(),
            ..CleanupReport::default()
        })
    });

    let mut dtm = Dtm::new();
    dtm.store_feature(FeatureType::Void, 1, None, &rect(0.0, 0.0, 10.0, 10.0)).unwrap();
    dtm.store_feature(FeatureType::Void, 2, None, &rect(5.0, 5.0, 15.0, 15.0)).unwrap();

    let report = cleaner.clean(&mut dtm).unwrap();
    assert_eq!(report.removed, 2);
    assert_eq!(report.added, 0);
    assert_eq!(dtm.active_features().count(), 0);
}

#[test]
fn report_serializes() {
    let report = CleanupReport {
        removed: 2,
        added: 1,
        ..CleanupReport::default()
    };
    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["removed"], 2);
    assert_eq!(json["validation_errors"], 0);
}
