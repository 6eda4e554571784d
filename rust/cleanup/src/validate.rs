// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature point validation.
//!
//! Every untriangulated polygonal feature is closed, filtered and checked.
//! Valid points are spliced back into the shared point array and turned
//! anticlockwise; invalid polygons are rolled back and deleted. Failures are
//! counted, never returned as errors.
//!
//! Line strings are never closed, area checked or deleted here. Unless
//! `polygonal_only` is set, open strings lose consecutive duplicate points.

use dtm_lite_geometry::polygon::{
    distance_xy, has_knots, same_xy, signed_area_xy, validate_polygon_points,
    validate_string_points,
};
use dtm_lite_geometry::MIN_POLYGON_AREA;
use dtm_lite_tin::{Dtm, DtmState, FeatureState, FeatureType};
use nalgebra::Point3;

use crate::error::Result;

/// Validate every polygonal feature in `Data` state. Returns the number of
/// features rejected.
pub fn validate_features(
    dtm: &mut Dtm,
    force_close: bool,
    close_tolerance: f64,
    filter_tolerance: f64,
    polygonal_only: bool,
) -> Result<usize> {
    dtm.require_state(DtmState::Data)?;
    tracing::debug!(
        features = dtm.feature_count(),
        force_close,
        close_tolerance,
        filter_tolerance,
        polygonal_only,
        "validating features"
    );

    let mut errors = 0;
    for index in 0..dtm.feature_count() {
        let Some(feature) = dtm.feature(index) else {
            continue;
        };
        if feature.state != FeatureState::Data || feature.feature_type == FeatureType::Spots {
            continue;
        }
        let feature_type = feature.feature_type;
        if !feature_type.is_polygonal() {
            if !polygonal_only {
                filter_open_string(dtm, index, filter_tolerance)?;
            }
            continue;
        }

        let mut points = dtm.feature_points(index)?;
        match validate_ring(&mut points, force_close, close_tolerance, filter_tolerance) {
            Ok(()) => {
                dtm.replace_feature_points(index, &points)?;
                dtm.set_feature_anticlockwise(index)?;
            }
            Err(reason) => {
                tracing::warn!(feature = index, ?feature_type, %reason, "feature failed validation");
                errors += 1;
                dtm.roll_back_feature(index)?;
                dtm.remove_feature(index)?;
            }
        }
    }

    tracing::debug!(errors, "validated features");
    Ok(errors)
}

/// Drop consecutive duplicates from an open line string. Closed strings and
/// strings that would collapse are left as they are.
fn filter_open_string(dtm: &mut Dtm, index: usize, filter_tolerance: f64) -> Result<()> {
    let mut points = dtm.feature_points(index)?;
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Ok(());
    };
    if points.len() < 2 || same_xy(first, last) {
        return Ok(());
    }
    let before = points.len();
    if let Err(reason) = validate_string_points(&mut points, filter_tolerance) {
        tracing::debug!(feature = index, %reason, "line string left unfiltered");
        return Ok(());
    }
    if points.len() != before {
        dtm.replace_feature_points(index, &points)?;
    }
    Ok(())
}

/// Close and filter one polygon ring.
fn validate_ring(
    points: &mut Vec<Point3<f64>>,
    force_close: bool,
    close_tolerance: f64,
    filter_tolerance: f64,
) -> std::result::Result<(), String> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Err("feature has no points".to_string());
    };

    let mut closed = points.len() > 1 && same_xy(&first, &last);
    if !closed && points.len() > 1 && distance_xy(&first, &last) <= close_tolerance {
        points[0] = last;
        closed = true;
    }
    if !closed && force_close {
        points.push(first);
        closed = !has_knots(points);
    }
    if !closed {
        return Err("polygon is not closed".to_string());
    }

    validate_polygon_points(points, filter_tolerance).map_err(|e| e.to_string())?;
    let area = signed_area_xy(points).abs();
    if area < MIN_POLYGON_AREA {
        return Err(format!("polygon area {area:e} is below the minimum"));
    }
    Ok(())
}
