// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # DTM-Lite TIN
//!
//! Terrain feature store and breakline network.
//!
//! A [`Dtm`] owns a shared point array and a table of typed features (voids,
//! islands, holes, hulls, breaklines, ...). Triangulating it builds a
//! [`TinNetwork`]: the noded graph of every feature segment, with angularly
//! sorted adjacency, per-edge feature ownership and the outer hull. The
//! cleanup passes walk this network to recover simple loops.
//!
//! ## Example
//!
//! ```rust
//! use dtm_lite_tin::{Dtm, FeatureType};
//! use nalgebra::Point3;
//!
//! let ring = [
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(10.0, 0.0, 0.0),
//!     Point3::new(10.0, 10.0, 0.0),
//!     Point3::new(0.0, 0.0, 0.0),
//! ];
//! let mut dtm = Dtm::new();
//! dtm.store_feature(FeatureType::Void, 1, None, &ring).unwrap();
//! let network = dtm.triangulate().unwrap();
//! assert_eq!(network.hull_loops().len(), 1);
//! ```

pub mod dtm;
pub mod error;
pub mod feature;
pub mod network;
pub mod serialization;

pub use dtm::{CleanupFlags, Dtm, DtmSettings, DtmState, JoinRecord, RollbackStore};
pub use error::{Error, Result};
pub use feature::{
    Feature, FeatureId, FeaturePoints, FeatureProvenance, FeatureState, FeatureType,
    NULL_USER_TAG,
};
pub use network::{FeatureEdge, TinNetwork, MIN_POINT_TOLERANCE};
pub use serialization::{DtmSnapshot, FeatureSnapshot};
