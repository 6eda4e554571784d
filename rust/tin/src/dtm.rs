// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The DTM object: shared point array, feature table and state machine.
//!
//! A DTM starts in [`DtmState::Data`]: features are point strings stored in a
//! shared point array. [`Dtm::triangulate`] moves it to [`DtmState::Tin`],
//! building the [`TinNetwork`] the cleanup walks run against. Features stored
//! while triangulated are held out of line until the next triangulation.

use std::sync::Arc;

use dtm_lite_geometry::polygon::make_anticlockwise;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureId, FeaturePoints, FeatureProvenance, FeatureState, FeatureType};
use crate::network::TinNetwork;

/// Processing state of a DTM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtmState {
    /// Untriangulated feature list.
    Data,
    /// Triangulated: the breakline network and hull are valid.
    Tin,
}

/// Which cleanup passes a DTM asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupFlags {
    /// Join, validate and resolve void/island/hole boundaries.
    pub voids_and_islands: bool,
    /// Reconcile hull, drape hull and hull line features.
    pub hull_features: bool,
}

impl Default for CleanupFlags {
    fn default() -> Self {
        Self {
            voids_and_islands: true,
            hull_features: true,
        }
    }
}

/// Tolerances and capability flags carried by every DTM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DtmSettings {
    /// Point to point tolerance.
    pub pp_tol: f64,
    /// Point to line tolerance.
    pub pl_tol: f64,
    pub cleanup: CleanupFlags,
}

impl Default for DtmSettings {
    fn default() -> Self {
        Self {
            pp_tol: 1e-4,
            pl_tol: 1e-4,
            cleanup: CleanupFlags::default(),
        }
    }
}

/// Fragments replaced by one joined feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRecord {
    pub new_id: FeatureId,
    pub sources: Vec<FeatureId>,
}

/// Copies of features as they were before cleanup touched them, so a caller
/// can undo the edit.
#[derive(Debug, Clone, Default)]
pub struct RollbackStore {
    features: Vec<Feature>,
    joins: Vec<JoinRecord>,
}

impl RollbackStore {
    /// Captured features, points held out of line.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn joins(&self) -> &[JoinRecord] {
        &self.joins
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.features.iter().any(|f| f.id == id)
    }

    pub fn record_join(&mut self, record: JoinRecord) {
        self.joins.push(record);
    }

    fn capture(&mut self, feature: Feature) {
        if !self.contains(feature.id) {
            self.features.push(feature);
        }
    }
}

/// Aggregate point and feature store.
#[derive(Debug, Clone)]
pub struct Dtm {
    settings: DtmSettings,
    state: DtmState,
    pub(crate) points: Vec<Point3<f64>>,
    pub(crate) features: Vec<Feature>,
    pub(crate) next_id: FeatureId,
    rollback: Option<RollbackStore>,
    network: Option<Arc<TinNetwork>>,
}

impl Default for Dtm {
    fn default() -> Self {
        Self::new()
    }
}

impl Dtm {
    /// Creates an empty DTM with default settings.
    pub fn new() -> Self {
        Self::with_settings(DtmSettings::default())
    }

    pub fn with_settings(settings: DtmSettings) -> Self {
        Self {
            settings,
            state: DtmState::Data,
            points: Vec::new(),
            features: Vec::new(),
            next_id: 0,
            rollback: None,
            network: None,
        }
    }

    pub fn state(&self) -> DtmState {
        self.state
    }

    pub fn settings(&self) -> &DtmSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DtmSettings {
        &mut self.settings
    }

    /// Fails with [`Error::InvalidState`] unless the DTM is in `expected` state.
    pub fn require_state(&self, expected: DtmState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    // --- Rollback ---

    /// Start capturing rolled back features.
    pub fn enable_rollback(&mut self) {
        if self.rollback.is_none() {
            self.rollback = Some(RollbackStore::default());
        }
    }

    pub fn rollback(&self) -> Option<&RollbackStore> {
        self.rollback.as_ref()
    }

    pub fn rollback_mut(&mut self) -> Option<&mut RollbackStore> {
        self.rollback.as_mut()
    }

    // --- Feature storage ---

    /// Stores a feature whose provenance is itself. A fresh id is assigned
    /// when `id` is `None`. Returns the feature index.
    pub fn store_feature(
        &mut self,
        feature_type: FeatureType,
        user_tag: i64,
        id: Option<FeatureId>,
        points: &[Point3<f64>],
    ) -> Result<usize> {
        self.store_with(feature_type, user_tag, id, None, points)
    }

    /// Stores a feature derived from another one.
    pub fn store_derived_feature(
        &mut self,
        feature_type: FeatureType,
        user_tag: i64,
        id: Option<FeatureId>,
        provenance: FeatureProvenance,
        points: &[Point3<f64>],
    ) -> Result<usize> {
        self.store_with(feature_type, user_tag, id, Some(provenance), points)
    }

    fn store_with(
        &mut self,
        feature_type: FeatureType,
        user_tag: i64,
        id: Option<FeatureId>,
        provenance: Option<FeatureProvenance>,
        points: &[Point3<f64>],
    ) -> Result<usize> {
        if points.is_empty() {
            return Err(Error::DegeneratePolygon(format!(
                "{feature_type:?} feature has no points"
            )));
        }

        let id = match id {
            Some(id) => {
                self.next_id = self.next_id.max(id + 1);
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };

        let (state, storage) = match self.state {
            DtmState::Data => {
                let first = self.points.len();
                self.points.extend_from_slice(points);
                (
                    FeatureState::Data,
                    FeaturePoints::Offset {
                        first,
                        count: points.len(),
                    },
                )
            }
            DtmState::Tin => (FeatureState::PointsArray, FeaturePoints::Array(points.to_vec())),
        };

        self.features.push(Feature {
            feature_type,
            state,
            user_tag,
            id,
            provenance: provenance.unwrap_or(FeatureProvenance::Direct(id)),
            points: storage,
        });
        Ok(self.features.len() - 1)
    }

    // --- Feature access ---

    pub fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Features still taking part in processing, with their indices.
    pub fn active_features(&self) -> impl Iterator<Item = (usize, &Feature)> {
        self.features.iter().enumerate().filter(|(_, f)| f.is_active())
    }

    /// Index of the feature carrying `id`, preferring active records.
    pub fn find_feature_by_id(&self, id: FeatureId) -> Option<usize> {
        self.features
            .iter()
            .position(|f| f.id == id && f.is_active())
            .or_else(|| self.features.iter().position(|f| f.id == id))
    }

    /// True when an active feature carries `id`.
    pub fn is_id_in_use(&self, id: FeatureId) -> bool {
        self.features.iter().any(|f| f.id == id && f.is_active())
    }

    /// Copy of a feature's points, owned by the caller.
    pub fn feature_points(&self, index: usize) -> Result<Vec<Point3<f64>>> {
        let feature = self.features.get(index).ok_or(Error::FeatureNotFound(index))?;
        Ok(match &feature.points {
            FeaturePoints::None => Vec::new(),
            FeaturePoints::Offset { first, count } => self.points[*first..*first + *count].to_vec(),
            FeaturePoints::Array(points) => points.clone(),
        })
    }

    fn feature_mut(&mut self, index: usize) -> Result<&mut Feature> {
        self.features.get_mut(index).ok_or(Error::FeatureNotFound(index))
    }

    pub fn set_feature_type(&mut self, index: usize, feature_type: FeatureType) -> Result<()> {
        self.feature_mut(index)?.feature_type = feature_type;
        Ok(())
    }

    /// Set a feature's state. Deleting a feature releases its points.
    pub fn set_feature_state(&mut self, index: usize, state: FeatureState) -> Result<()> {
        let feature = self.feature_mut(index)?;
        feature.state = state;
        if state == FeatureState::Deleted {
            feature.points = FeaturePoints::None;
        }
        Ok(())
    }

    // --- Feature editing ---

    /// Mark a feature deleted and release its points.
    pub fn remove_feature(&mut self, index: usize) -> Result<()> {
        self.set_feature_state(index, FeatureState::Deleted)
    }

    /// Capture a copy of the feature into the rollback store, when enabled.
    pub fn roll_back_feature(&mut self, index: usize) -> Result<()> {
        if self.rollback.is_none() {
            return Ok(());
        }
        let mut copy = self.features.get(index).cloned().ok_or(Error::FeatureNotFound(index))?;
        copy.points = FeaturePoints::Array(self.feature_points(index)?);
        if let Some(store) = self.rollback.as_mut() {
            store.capture(copy);
        }
        Ok(())
    }

    /// Move a feature's points out of the shared array into its own buffer.
    pub fn capture_points_out_of_line(&mut self, index: usize) -> Result<()> {
        let points = self.feature_points(index)?;
        let feature = self.feature_mut(index)?;
        if matches!(feature.points, FeaturePoints::Offset { .. }) {
            feature.points = FeaturePoints::Array(points);
        }
        Ok(())
    }

    /// Replace a feature's points. For features in the shared array the run
    /// is spliced in place and every later run is shifted by the size change.
    pub fn replace_feature_points(&mut self, index: usize, points: &[Point3<f64>]) -> Result<()> {
        self.require_state(DtmState::Data)?;
        let current = self.feature_mut(index)?.points.clone();
        match current {
            FeaturePoints::Offset { first, count } => {
                self.points.splice(first..first + count, points.iter().copied());
                let end = first + count;
                let grow = points.len();
                for (i, feature) in self.features.iter_mut().enumerate() {
                    if i == index {
                        feature.points = FeaturePoints::Offset { first, count: grow };
                    } else if let FeaturePoints::Offset { first: other, .. } = &mut feature.points {
                        if *other >= end {
                            *other = *other + grow - count;
                        }
                    }
                }
            }
            FeaturePoints::Array(_) => {
                self.feature_mut(index)?.points = FeaturePoints::Array(points.to_vec());
            }
            FeaturePoints::None => {
                return Err(Error::DegeneratePolygon(format!(
                    "feature {index} has no points to replace"
                )));
            }
        }
        Ok(())
    }

    /// Reverse a feature's points when they wind clockwise. Returns true if reversed.
    pub fn set_feature_anticlockwise(&mut self, index: usize) -> Result<bool> {
        let mut points = self.feature_points(index)?;
        if make_anticlockwise(&mut points) {
            self.replace_feature_points(index, &points)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Drop deleted features and every point no longer referenced.
    pub fn compact_features(&mut self) -> Result<()> {
        self.require_state(DtmState::Data)?;
        let before = self.features.len();
        let old = std::mem::take(&mut self.points);
        self.features.retain(|f| f.state != FeatureState::Deleted);

        let mut points = Vec::with_capacity(old.len());
        for feature in &mut self.features {
            if let FeaturePoints::Offset { first, count } = feature.points {
                let start = points.len();
                points.extend_from_slice(&old[first..first + count]);
                feature.points = FeaturePoints::Offset { first: start, count };
            }
        }
        self.points = points;

        tracing::trace!(
            removed = before - self.features.len(),
            remaining = self.features.len(),
            "compacted feature table"
        );
        Ok(())
    }

    // --- Triangulation ---

    /// Build the breakline network from every active feature.
    pub fn triangulate(&mut self) -> Result<&TinNetwork> {
        self.require_state(DtmState::Data)?;

        let mut input = Vec::new();
        for (index, feature) in self.features.iter().enumerate() {
            if feature.is_active() && feature.num_points() > 1 {
                input.push((index, self.feature_points(index)?));
            }
        }

        let network = TinNetwork::build(&input, self.settings.pp_tol)?;
        for feature in &mut self.features {
            if matches!(feature.state, FeatureState::Data | FeatureState::PointsArray) {
                feature.state = FeatureState::Tin;
            }
        }
        self.state = DtmState::Tin;
        Ok(&**self.network.insert(Arc::new(network)))
    }

    /// The breakline network, while triangulated.
    pub fn network(&self) -> Option<&TinNetwork> {
        self.network.as_deref()
    }

    /// Shared handle to the network, so walks can hold it while the feature
    /// table is edited. Stays valid after the DTM leaves `Tin` state.
    pub fn shared_network(&self) -> Option<Arc<TinNetwork>> {
        self.network.clone()
    }

    /// Move the DTM to `state`. Returning to `Data` discards the network.
    pub fn change_state(&mut self, state: DtmState) -> Result<()> {
        match (self.state, state) {
            (DtmState::Tin, DtmState::Data) => {
                self.network = None;
                for feature in &mut self.features {
                    if feature.state == FeatureState::Tin {
                        feature.state = match feature.points {
                            FeaturePoints::Array(_) => FeatureState::PointsArray,
                            _ => FeatureState::Data,
                        };
                    }
                }
                self.state = DtmState::Data;
            }
            (DtmState::Data, DtmState::Tin) => {
                self.triangulate()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Mesh point closest to `(x, y)`.
    pub fn closest_point(&self, x: f64, y: f64) -> Result<usize> {
        let network = self.network.as_ref().ok_or(Error::InvalidState {
            expected: DtmState::Tin,
            found: self.state,
        })?;
        network
            .closest_point(x, y)
            .ok_or_else(|| Error::Triangulation("network has no points".to_string()))
    }
}
