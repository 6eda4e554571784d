// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cleanup configuration loaded from environment variables.

use serde::{Deserialize, Serialize};

/// Default cap on orchestrator passes.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Cleanup configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Close open polygonal features by repeating their first point.
    pub force_close: bool,
    /// Gap under which a polygon counts as closed. Defaults to the DTM `pp_tol`.
    pub close_tolerance: Option<f64>,
    /// Distance under which points are filtered out. Defaults to the DTM `pp_tol`.
    pub filter_tolerance: Option<f64>,
    /// Leave line strings untouched. Otherwise open strings lose consecutive
    /// duplicate points. Strings are never closed or deleted either way.
    pub polygonal_only: bool,
    /// Safety cap on orchestrator passes.
    pub max_iterations: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            force_close: true,
            close_tolerance: None,
            filter_tolerance: None,
            polygonal_only: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl CleanupConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            force_close: std::env::var("DTM_CLEANUP_FORCE_CLOSE")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.force_close),
            close_tolerance: std::env::var("DTM_CLEANUP_CLOSE_TOLERANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|t: &f64| *t >= 0.0),
            filter_tolerance: std::env::var("DTM_CLEANUP_FILTER_TOLERANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|t: &f64| *t >= 0.0),
            polygonal_only: defaults.polygonal_only,
            max_iterations: std::env::var("DTM_CLEANUP_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_iterations),
        }
    }

    /// Close tolerance to use for a DTM with point tolerance `pp_tol`.
    pub fn close_tolerance_for(&self, pp_tol: f64) -> f64 {
        self.close_tolerance.unwrap_or(pp_tol)
    }

    /// Filter tolerance to use for a DTM with point tolerance `pp_tol`.
    pub fn filter_tolerance_for(&self, pp_tol: f64) -> f64 {
        self.filter_tolerance.unwrap_or(pp_tol)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
