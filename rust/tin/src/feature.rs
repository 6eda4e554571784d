// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature records held in the DTM feature table.
//!
//! A feature is a typed point string. Its points either live in the DTM's
//! shared point array (`FeaturePoints::Offset`) or in a buffer owned by the
//! feature itself (`FeaturePoints::Array`) when they are not yet committed or
//! have been captured out of line.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Identifier of a feature, stable across compaction.
pub type FeatureId = i64;

/// User tag written on features that carry no caller-supplied tag.
pub const NULL_USER_TAG: i64 = -999;

/// Semantic type of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureType {
    Spots,
    Breakline,
    SoftBreakline,
    ContourLine,
    Void,
    BreakVoid,
    DrapeVoid,
    Hole,
    Island,
    VoidLine,
    HoleLine,
    Hull,
    DrapeHull,
    HullLine,
    Polygon,
    Region,
}

impl FeatureType {
    /// Numeric code of the type, used when a type is stored in a user tag.
    pub fn code(self) -> i64 {
        match self {
            FeatureType::Spots => 0,
            FeatureType::Breakline => 10,
            FeatureType::SoftBreakline => 11,
            FeatureType::ContourLine => 12,
            FeatureType::Void => 13,
            FeatureType::BreakVoid => 14,
            FeatureType::DrapeVoid => 15,
            FeatureType::Island => 16,
            FeatureType::Hole => 17,
            FeatureType::VoidLine => 18,
            FeatureType::HoleLine => 19,
            FeatureType::Hull => 20,
            FeatureType::DrapeHull => 21,
            FeatureType::HullLine => 22,
            FeatureType::Polygon => 23,
            FeatureType::Region => 24,
        }
    }

    /// Inverse of [`FeatureType::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        let ty = match code {
            0 => FeatureType::Spots,
            10 => FeatureType::Breakline,
            11 => FeatureType::SoftBreakline,
            12 => FeatureType::ContourLine,
            13 => FeatureType::Void,
            14 => FeatureType::BreakVoid,
            15 => FeatureType::DrapeVoid,
            16 => FeatureType::Island,
            17 => FeatureType::Hole,
            18 => FeatureType::VoidLine,
            19 => FeatureType::HoleLine,
            20 => FeatureType::Hull,
            21 => FeatureType::DrapeHull,
            22 => FeatureType::HullLine,
            23 => FeatureType::Polygon,
            24 => FeatureType::Region,
            _ => return None,
        };
        Some(ty)
    }

    /// Types validated as closed rings.
    pub fn is_polygonal(self) -> bool {
        matches!(
            self,
            FeatureType::Void
                | FeatureType::BreakVoid
                | FeatureType::DrapeVoid
                | FeatureType::Hole
                | FeatureType::Island
                | FeatureType::Hull
                | FeatureType::Polygon
                | FeatureType::Region
        )
    }

    /// Void, island and hole boundaries: the types resolved against each other.
    pub fn is_void_or_island(self) -> bool {
        matches!(
            self,
            FeatureType::Void
                | FeatureType::BreakVoid
                | FeatureType::DrapeVoid
                | FeatureType::Hole
                | FeatureType::Island
        )
    }

    /// Everything except `Island` is treated as void-like.
    pub fn is_void_like(self) -> bool {
        self != FeatureType::Island
    }
}

/// Lifecycle state of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureState {
    /// Stored in the shared point array of an untriangulated DTM.
    Data,
    /// Points held out of line, waiting to join the network.
    PointsArray,
    /// Part of the current breakline network.
    Tin,
    /// Superseded or rejected; holds no points.
    Deleted,
    /// Removed by policy; points kept out of line so the record can be restored.
    TinError,
}

impl FeatureState {
    /// States whose features still take part in processing.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            FeatureState::Data | FeatureState::PointsArray | FeatureState::Tin
        )
    }
}

/// Where a feature's geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureProvenance {
    /// The geometry is (part of) the named feature itself.
    Direct(FeatureId),
    /// The geometry was derived by merging, starting from the named feature.
    Merged(FeatureId),
}

impl FeatureProvenance {
    /// The feature the geometry traces back to.
    pub fn source(self) -> FeatureId {
        match self {
            FeatureProvenance::Direct(id) | FeatureProvenance::Merged(id) => id,
        }
    }

    pub fn is_merged(self) -> bool {
        matches!(self, FeatureProvenance::Merged(_))
    }
}

/// Storage of a feature's points.
#[derive(Debug, Clone, PartialEq)]
pub enum FeaturePoints {
    /// No points (deleted features).
    None,
    /// A run of the DTM's shared point array.
    Offset { first: usize, count: usize },
    /// A buffer owned by the feature.
    Array(Vec<Point3<f64>>),
}

impl FeaturePoints {
    pub fn len(&self) -> usize {
        match self {
            FeaturePoints::None => 0,
            FeaturePoints::Offset { count, .. } => *count,
            FeaturePoints::Array(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One record of the feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub feature_type: FeatureType,
    pub state: FeatureState,
    pub user_tag: i64,
    pub id: FeatureId,
    pub provenance: FeatureProvenance,
    pub points: FeaturePoints,
}

impl Feature {
    /// Number of points in the feature.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// True while the feature still takes part in processing.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Real type of a scratch breakline, smuggled through the user tag.
    pub fn tagged_type(&self) -> Option<FeatureType> {
        FeatureType::from_code(self.user_tag)
    }
}
