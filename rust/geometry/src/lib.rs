// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DTM-Lite Geometry
//!
//! Planar polygon primitives for terrain features: winding, containment,
//! validation of point rings, and area booleans through i_overlay.

pub mod bool2d;
pub mod error;
pub mod polygon;
pub mod range;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3};

pub use bool2d::{Contour, Region, Shape};
pub use error::{Error, Result};
pub use polygon::{Direction, InOut, MIN_POLYGON_AREA};
pub use range::Range2d;
