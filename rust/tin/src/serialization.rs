// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON serialization for DTM feature tables.
//!
//! A snapshot carries the settings and every feature record with its points
//! inlined, so fixtures stay readable. The network is not serialized: a
//! restored DTM is always in `Data` state and must be triangulated again.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::dtm::{Dtm, DtmSettings};
use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureId, FeaturePoints, FeatureProvenance, FeatureState, FeatureType};

/// Serializable representation of a DTM.
#[derive(Debug, Serialize, Deserialize)]
pub struct DtmSnapshot {
    pub settings: DtmSettings,
    pub features: Vec<FeatureSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub id: FeatureId,
    pub feature_type: FeatureType,
    pub state: FeatureState,
    pub user_tag: i64,
    pub provenance: FeatureProvenance,
    pub points: Vec<[f64; 3]>,
}

impl Dtm {
    /// Serializes the feature table to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.to_snapshot()?;
        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Creates a serializable snapshot of the feature table.
    pub fn to_snapshot(&self) -> Result<DtmSnapshot> {
        let mut features = Vec::with_capacity(self.features.len());
        for (index, f) in self.features.iter().enumerate() {
            features.push(FeatureSnapshot {
                id: f.id,
                feature_type: f.feature_type,
                state: f.state,
                user_tag: f.user_tag,
                provenance: f.provenance,
                points: self
                    .feature_points(index)?
                    .iter()
                    .map(|p| [p.x, p.y, p.z])
                    .collect(),
            });
        }
        Ok(DtmSnapshot {
            settings: *self.settings(),
            features,
        })
    }

    /// Deserializes a DTM from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: DtmSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Self::from_snapshot(&snapshot))
    }

    /// Rebuilds a DTM in `Data` state from a snapshot.
    ///
    /// Features that were part of a network return to the shared point
    /// array; out-of-line records stay out of line.
    pub fn from_snapshot(snap: &DtmSnapshot) -> Self {
        let mut dtm = Dtm::with_settings(snap.settings);

        for fs in &snap.features {
            let points: Vec<Point3<f64>> = fs.points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect();
            let (state, storage) = match fs.state {
                FeatureState::Deleted => (FeatureState::Deleted, FeaturePoints::None),
                _ if points.is_empty() => (FeatureState::Deleted, FeaturePoints::None),
                FeatureState::Data | FeatureState::Tin => {
                    let first = dtm.points.len();
                    dtm.points.extend_from_slice(&points);
                    (
                        FeatureState::Data,
                        FeaturePoints::Offset {
                            first,
                            count: points.len(),
                        },
                    )
                }
                state => (state, FeaturePoints::Array(points)),
            };

            dtm.next_id = dtm.next_id.max(fs.id + 1);
            dtm.features.push(Feature {
                feature_type: fs.feature_type,
                state,
                user_tag: fs.user_tag,
                id: fs.id,
                provenance: fs.provenance,
                points: storage,
            });
        }

        dtm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtm::DtmState;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(x0, y0, 2.0),
            Point3::new(x1, y0, 2.0),
            Point3::new(x1, y1, 2.0),
            Point3::new(x0, y1, 2.0),
            Point3::new(x0, y0, 2.0),
        ]
    }

    #[test]
    fn roundtrip_empty_dtm() {
        let dtm = Dtm::new();
        let json = dtm.to_json().unwrap();
        let restored = Dtm::from_json(&json).unwrap();
        assert_eq!(restored.feature_count(), 0);
        assert_eq!(restored.state(), DtmState::Data);
    }

    #[test]
    fn roundtrip_feature_table() {
        let mut dtm = Dtm::new();
        dtm.store_feature(FeatureType::Void, 3, Some(4), &square(0.0, 0.0, 1.0, 1.0)).unwrap();
        dtm.store_derived_feature(
            FeatureType::Island,
            5,
            None,
            FeatureProvenance::Merged(4),
            &square(2.0, 2.0, 3.0, 3.0),
        )
        .unwrap();
        let hull_line = dtm.store_feature(FeatureType::HullLine, 0, None, &square(5.0, 5.0, 6.0, 6.0)).unwrap();
        dtm.capture_points_out_of_line(hull_line).unwrap();
        dtm.set_feature_state(hull_line, FeatureState::TinError).unwrap();

        let json = dtm.to_json().unwrap();
        let restored = Dtm::from_json(&json).unwrap();

        assert_eq!(restored.feature_count(), 3);
        assert_eq!(restored.features()[0].id, 4);
        assert_eq!(restored.features()[1].provenance, FeatureProvenance::Merged(4));
        assert_eq!(restored.features()[1].user_tag, 5);
        assert_eq!(restored.features()[2].state, FeatureState::TinError);
        assert!(matches!(restored.features()[2].points, FeaturePoints::Array(_)));
        assert_eq!(restored.feature_points(1).unwrap(), dtm.feature_points(1).unwrap());
    }

    #[test]
    fn restored_ids_continue_after_highest() {
        let mut dtm = Dtm::new();
        dtm.store_feature(FeatureType::Void, 0, Some(41), &square(0.0, 0.0, 1.0, 1.0)).unwrap();
        let mut restored = Dtm::from_json(&dtm.to_json().unwrap()).unwrap();
        let index = restored.store_feature(FeatureType::Void, 0, None, &square(2.0, 2.0, 3.0, 3.0)).unwrap();
        assert_eq!(restored.features()[index].id, 42);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(Dtm::from_json("{ not json"), Err(Error::Serialization(_))));
    }
}
