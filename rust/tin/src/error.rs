// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for DTM operations.

use crate::dtm::DtmState;
use crate::feature::FeatureId;

/// Result type alias for DTM operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing or triangulating a DTM.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation requires the DTM to be in another state.
    #[error("method requires a DTM in {expected:?} state, found {found:?}")]
    InvalidState { expected: DtmState, found: DtmState },

    /// A feature index is out of range.
    #[error("feature index {0} not found")]
    FeatureNotFound(usize),

    /// No live feature carries the given id.
    #[error("feature id {0} not found")]
    FeatureIdNotFound(FeatureId),

    /// A feature has too few points to be stored.
    #[error("degenerate feature: {0}")]
    DegeneratePolygon(String),

    /// The breakline network could not be built.
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    /// A geometry primitive rejected its input.
    #[error(transparent)]
    Geometry(#[from] dtm_lite_geometry::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
