// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # DTM-Lite Cleanup
//!
//! Resolution of overlapping void, island and hole boundaries.
//!
//! Boundaries are copied into a scratch [`Dtm`](dtm_lite_tin::Dtm) as tagged
//! breaklines and triangulated. Walking the hull of the resulting network
//! peels off one maximal loop at a time: single-owner loops pass through,
//! composite loops are unioned and their interior islands recovered. A
//! containment forest then removes nested duplicates and cancelling
//! void/island pairs before the result replaces the live boundaries.
//!
//! ## Example
//!
//! ```rust
//! use dtm_lite_cleanup::DtmCleaner;
//! use dtm_lite_tin::{Dtm, FeatureType};
//! use nalgebra::Point3;
//!
//! fn square(x: f64, y: f64, size: f64) -> Vec<Point3<f64>> {
//!     vec![
//!         Point3::new(x, y, 0.0),
//!         Point3::new(x + size, y, 0.0),
//!         Point3::new(x + size, y + size, 0.0),
//!         Point3::new(x, y + size, 0.0),
//!         Point3::new(x, y, 0.0),
//!     ]
//! }
//!
//! let mut dtm = Dtm::new();
//! dtm.store_feature(FeatureType::Void, 1, None, &square(0.0, 0.0, 10.0)).unwrap();
//! dtm.store_feature(FeatureType::Void, 2, None, &square(5.0, 5.0, 10.0)).unwrap();
//!
//! let report = DtmCleaner::new().clean(&mut dtm).unwrap();
//! assert_eq!((report.removed, report.added), (2, 1));
//! ```

pub mod classify;
pub mod cleaner;
pub mod collect;
pub mod config;
pub mod dedup;
pub mod error;
pub mod forest;
pub mod join;
pub mod orchestrator;
pub mod reconcile;
pub mod resolve;
pub mod stitch;
pub mod validate;
pub mod walk;

pub use classify::EdgeClass;
pub use cleaner::{BuiltinCleanup, CleanupStrategy, DtmCleaner};
pub use config::CleanupConfig;
pub use dedup::{UniqueFeature, UniqueFeatureSet};
pub use error::{Error, Result};
pub use forest::{Forest, ForestItem, ForestNode, NodeKey};
pub use join::{check_hull_features, join_hull_lines, join_voids_and_holes, HullCheck, JoinSummary};
pub use orchestrator::{resolve_multiple_intersecting, ResolveOutcome};
pub use reconcile::{resolve_void_and_islands, CleanupReport};
pub use validate::validate_features;
