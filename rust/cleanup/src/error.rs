// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for cleanup passes.

/// Result type alias for cleanup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a cleanup call.
///
/// Degenerate features and unsupported void/island combinations are not
/// errors: they are counted or logged and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The feature store or network rejected an operation.
    #[error(transparent)]
    Tin(#[from] dtm_lite_tin::Error),

    /// A geometry primitive rejected its input.
    #[error(transparent)]
    Geometry(#[from] dtm_lite_geometry::Error),

    /// A resolved loop has too few points to enclose an area.
    #[error("degenerate loop with {points} points")]
    DegenerateLoop { points: usize },

    /// A walk or lookup reached a state with no defined fallback.
    #[error("internal invariant broken: {0}")]
    Invariant(String),

    /// An injected cleanup strategy failed.
    #[error("cleanup override failed: {0}")]
    Override(String),
}
