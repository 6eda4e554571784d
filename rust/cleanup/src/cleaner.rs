// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cleanup entry point.
//!
//! [`DtmCleaner`] runs one [`CleanupStrategy`]. The built-in strategy is
//! hull checks, then joining, validation and void/island resolution; a
//! caller may inject its own strategy in place of the whole pipeline.

use std::sync::Arc;

use dtm_lite_tin::{Dtm, DtmState};

use crate::config::CleanupConfig;
use crate::error::Result;
use crate::join::{check_hull_features, join_voids_and_holes};
use crate::reconcile::{resolve_void_and_islands, CleanupReport};
use crate::validate::validate_features;

/// A complete cleanup algorithm.
pub trait CleanupStrategy: Send + Sync {
    /// Clean `dtm` in place.
    fn clean(&self, dtm: &mut Dtm, config: &CleanupConfig) -> Result<CleanupReport>;
}

impl<F> CleanupStrategy for F
where
    F: Fn(&mut Dtm, &CleanupConfig) -> Result<CleanupReport> + Send + Sync,
{
    fn clean(&self, dtm: &mut Dtm, config: &CleanupConfig) -> Result<CleanupReport> {
        self(dtm, config)
    }
}

/// The built-in cleanup pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCleanup;

impl CleanupStrategy for BuiltinCleanup {
    fn clean(&self, dtm: &mut Dtm, config: &CleanupConfig) -> Result<CleanupReport> {
        dtm.require_state(DtmState::Data)?;
        let settings = *dtm.settings();
        if !settings.cleanup.voids_and_islands {
            tracing::debug!("void and island cleanup not requested");
            return Ok(CleanupReport::default());
        }

        let mut report = CleanupReport::default();
        if settings.cleanup.hull_features {
            let hull = check_hull_features(dtm)?;
            report.dropped_hull_features = hull.dropped;
            report.joined += hull.joined;
        }
        report.joined += join_voids_and_holes(dtm, settings.pp_tol)?;

        report.validation_errors = validate_features(
            dtm,
            config.force_close,
            config.close_tolerance_for(settings.pp_tol),
            config.filter_tolerance_for(settings.pp_tol),
            config.polygonal_only,
        )?;
        if report.validation_errors > 0 {
            tracing::warn!(errors = report.validation_errors, "features removed by validation");
        }

        let resolved = resolve_void_and_islands(dtm, config)?;
        report.removed = resolved.removed;
        report.added = resolved.added;
        report.unchanged = resolved.unchanged;

        tracing::info!(
            validation_errors = report.validation_errors,
            removed = report.removed,
            added = report.added,
            unchanged = report.unchanged,
            dropped_hull_features = report.dropped_hull_features,
            joined = report.joined,
            "cleaned dtm"
        );
        Ok(report)
    }
}

/// Runs a cleanup strategy with a fixed configuration.
#[derive(Clone)]
pub struct DtmCleaner {
    config: CleanupConfig,
    strategy: Arc<dyn CleanupStrategy>,
}

impl DtmCleaner {
    /// Cleaner running the built-in pipeline with default configuration.
    pub fn new() -> Self {
        Self::with_config(CleanupConfig::default())
    }

    pub fn with_config(config: CleanupConfig) -> Self {
        Self {
            config,
            strategy: Arc::new(BuiltinCleanup),
        }
    }

    /// Replace the whole pipeline with `strategy`.
    pub fn with_override(mut self, strategy: impl CleanupStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Clean `dtm` in place.
    pub fn clean(&self, dtm: &mut Dtm) -> Result<CleanupReport> {
        tracing::debug!(features = dtm.feature_count(), "cleanup started");
        self.strategy.clean(dtm, &self.config)
    }
}

impl Default for DtmCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DtmCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DtmCleaner").field("config", &self.config).finish_non_exhaustive()
    }
}
