// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of intersecting void, island and hole boundaries.
//!
//! The boundaries of a DTM are loaded, once per distinct ring, into a scratch
//! DTM as tagged breaklines. Each pass triangulates the scratch DTM and walks
//! its hull looking for one class of edges (void-like, then island-like, and
//! so on). Every loop found is either passed through, when a single feature
//! owns it, or resolved as a composite. Resolved features leave the scratch
//! DTM; holes punched by a composite come back with the opposite class for a
//! later pass. When passes stop finding loops the cleaned boundaries are
//! sorted into a containment forest and the survivors replace the input.

use std::collections::BTreeSet;

use dtm_lite_geometry::polygon::make_anticlockwise;
use dtm_lite_tin::{
    Dtm, DtmState, FeatureId, FeatureProvenance, FeatureType, TinNetwork, NULL_USER_TAG,
};
use nalgebra::Point3;

use crate::classify::{is_breakline_edge, EdgeClass};
use crate::collect::collect_internal_connecting;
use crate::config::CleanupConfig;
use crate::dedup::UniqueFeatureSet;
use crate::error::{Error, Result};
use crate::forest::{Forest, ForestItem};
use crate::resolve::{resolve_composite, Composite};
use crate::walk::{walk_hull_loop, HullLoop, TraceMap};

/// Counters of one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Hull passes run.
    pub passes: usize,
    /// Loops recorded as cleaned boundaries.
    pub cleaned: usize,
    /// Boundaries surviving the containment forest.
    pub kept: usize,
    /// Composite loops mixing voids and islands, dropped.
    pub dropped_mixed: usize,
    /// Scratch features still unresolved when the passes stopped.
    pub abandoned: usize,
}

/// What a composite loop resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompositeKind {
    /// Every owner matches the walked class.
    Resolve(FeatureType),
    /// Every owner is of the other class.
    OtherClass,
    /// Voids and islands together; not supported.
    Mixed { voids: usize, islands: usize },
}

/// Sort a composite by the tagged types of its owners.
fn composite_kind(class: EdgeClass, owners: impl IntoIterator<Item = FeatureType>) -> CompositeKind {
    let mut voids = 0;
    let mut islands = 0;
    let mut first_void = None;
    for ty in owners {
        if ty == FeatureType::Island {
            islands += 1;
        } else {
            voids += 1;
            first_void.get_or_insert(ty);
        }
    }
    match (class, first_void) {
        _ if voids > 0 && islands > 0 => CompositeKind::Mixed { voids, islands },
        (EdgeClass::VoidLike, Some(ty)) => CompositeKind::Resolve(ty),
        (EdgeClass::IslandLike, None) if islands > 0 => CompositeKind::Resolve(FeatureType::Island),
        _ => CompositeKind::OtherClass,
    }
}

/// Work state shared by the loops of one run.
struct Resolver<'a> {
    bndy: &'a Dtm,
    scratch: Dtm,
    cleaned: Dtm,
    outcome: ResolveOutcome,
}

/// Resolve the void, island and hole features of `bndy` against each other,
/// replacing them with the resolved set. `bndy` must be untriangulated.
pub fn resolve_multiple_intersecting(bndy: &mut Dtm, config: &CleanupConfig) -> Result<ResolveOutcome> {
    bndy.require_state(DtmState::Data)?;

    let mut unique = UniqueFeatureSet::new();
    for (index, feature) in bndy.active_features() {
        if feature.feature_type.is_void_or_island() {
            unique.add(&bndy.feature_points(index)?, index, feature.feature_type);
        }
    }
    tracing::debug!(unique = unique.len(), "resolving intersecting boundaries");

    let mut scratch = Dtm::with_settings(*bndy.settings());
    for item in &unique {
        let Some(&first) = item.features.first() else {
            continue;
        };
        let id = bndy.feature(first).map(|f| f.id).ok_or(dtm_lite_tin::Error::FeatureNotFound(first))?;
        // Hull walks follow anticlockwise feature edges
        let mut ring = item.points.clone();
        make_anticlockwise(&mut ring);
        scratch.store_derived_feature(
            FeatureType::Breakline,
            item.feature_type.code(),
            Some(id),
            FeatureProvenance::Direct(id),
            &ring,
        )?;
    }

    let mut resolver = Resolver {
        bndy: &*bndy,
        scratch,
        cleaned: Dtm::with_settings(*bndy.settings()),
        outcome: ResolveOutcome::default(),
    };
    resolver.run(config)?;

    let Resolver { cleaned, mut outcome, .. } = resolver;
    outcome.kept = replace_boundaries(bndy, &cleaned)?;
    tracing::debug!(
        passes = outcome.passes,
        cleaned = outcome.cleaned,
        kept = outcome.kept,
        dropped_mixed = outcome.dropped_mixed,
        abandoned = outcome.abandoned,
        "resolved intersecting boundaries"
    );
    Ok(outcome)
}

impl Resolver<'_> {
    fn run(&mut self, config: &CleanupConfig) -> Result<()> {
        let mut class = EdgeClass::VoidLike;
        let mut idle = 0;

        while self.scratch.feature_count() > 0 {
            if self.outcome.passes >= config.max_iterations {
                tracing::warn!(passes = self.outcome.passes, "stopped at the pass limit");
                break;
            }
            self.outcome.passes += 1;

            if let Err(e) = self.scratch.triangulate() {
                tracing::debug!(error = %e, "scratch triangulation failed, stopping");
                break;
            }
            let network = self
                .scratch
                .shared_network()
                .ok_or_else(|| Error::Invariant("triangulated scratch DTM has no network".to_string()))?;

            let changed = self.hull_pass(&network, class)?;

            self.scratch.change_state(DtmState::Data)?;
            self.scratch.compact_features()?;
            class = class.flip();

            if changed {
                idle = 0;
            } else {
                idle += 1;
                if idle >= 2 {
                    break;
                }
            }
        }

        self.outcome.abandoned = self.scratch.active_features().count();
        if self.outcome.abandoned > 0 {
            tracing::warn!(
                abandoned = self.outcome.abandoned,
                passes = self.outcome.passes,
                "boundaries left unresolved"
            );
        }
        Ok(())
    }

    /// Walk every hull loop of `network` once. Returns true if a loop was found.
    fn hull_pass(&mut self, network: &TinNetwork, class: EdgeClass) -> Result<bool> {
        let mut trace = TraceMap::new();
        let mut changed = false;

        for hull in network.hull_loops() {
            for k in 0..hull.len() {
                let (sp, np) = (hull[k], hull[(k + 1) % hull.len()]);
                if trace.is_visited(sp) || !is_breakline_edge(network, &self.scratch, sp, np, class) {
                    continue;
                }
                let Some(found) = walk_hull_loop(network, &self.scratch, sp, np, class, &mut trace) else {
                    continue;
                };
                changed = true;
                self.resolve_loop(network, &trace, found, class)?;
            }
        }
        tracing::trace!(?class, changed, "finished hull pass");
        Ok(changed)
    }

    fn resolve_loop(&mut self, network: &TinNetwork, trace: &TraceMap, found: HullLoop, class: EdgeClass) -> Result<()> {
        let ring = found.points(network);
        let mut features = found.features;

        if let [only] = features.iter().copied().collect::<Vec<_>>()[..] {
            return self.pass_through(only, &ring);
        }

        collect_internal_connecting(network, &self.scratch, trace, class, &mut features);
        let first = *features
            .first()
            .ok_or_else(|| Error::Invariant("hull loop without owning features".to_string()))?;
        let use_feature_id = self.scratch_feature(first)?.provenance.source();

        let mut owners = Vec::with_capacity(features.len());
        for &feature in &features {
            owners.extend(self.scratch_feature(feature)?.tagged_type());
        }
        let resolved_type = match composite_kind(class, owners) {
            CompositeKind::Resolve(feature_type) => Some(feature_type),
            CompositeKind::OtherClass => {
                tracing::trace!(?class, "composite of the other class, deleting");
                None
            }
            CompositeKind::Mixed { voids, islands } => {
                tracing::warn!(voids, islands, use_feature_id, "mixed void and island composite dropped");
                self.outcome.dropped_mixed += 1;
                None
            }
        };

        if let Some(feature_type) = resolved_type {
            let composite = Composite {
                ring: &ring,
                features: &features,
                feature_type,
                use_feature_id,
            };
            match resolve_composite(&mut self.scratch, &mut self.cleaned, network, &composite) {
                Ok(()) => self.outcome.cleaned += 1,
                Err(Error::DegenerateLoop { points }) => {
                    tracing::warn!(points, use_feature_id, "degenerate composite loop skipped");
                }
                Err(e) => return Err(e),
            }
        }

        self.delete_all(&features)
    }

    /// A loop owned by one feature is recorded as it is.
    fn pass_through(&mut self, feature: usize, ring: &[Point3<f64>]) -> Result<()> {
        let (provenance, tagged) = {
            let f = self.scratch_feature(feature)?;
            (f.provenance, f.tagged_type())
        };
        let feature_type = tagged.ok_or_else(|| Error::Invariant(format!("scratch feature {feature} has no type tag")))?;

        let (user_tag, id) = match provenance {
            FeatureProvenance::Direct(source) => (self.bndy_user_tag(source), source),
            FeatureProvenance::Merged(source) => (NULL_USER_TAG, source),
        };
        self.cleaned.store_derived_feature(feature_type, user_tag, Some(id), provenance, ring)?;
        self.outcome.cleaned += 1;
        tracing::trace!(feature, id, ?feature_type, "passed loop through");

        self.scratch.remove_feature(feature)?;
        Ok(())
    }

    fn delete_all(&mut self, features: &BTreeSet<usize>) -> Result<()> {
        for &feature in features {
            self.scratch.remove_feature(feature)?;
        }
        Ok(())
    }

    fn scratch_feature(&self, index: usize) -> Result<&dtm_lite_tin::Feature> {
        self.scratch
            .feature(index)
            .ok_or(Error::Tin(dtm_lite_tin::Error::FeatureNotFound(index)))
    }

    fn bndy_user_tag(&self, id: FeatureId) -> i64 {
        self.bndy
            .find_feature_by_id(id)
            .and_then(|i| self.bndy.feature(i))
            .map_or(NULL_USER_TAG, |f| f.user_tag)
    }
}

/// Replace the boundaries of `bndy` with the forest survivors of `cleaned`.
/// Returns the number stored.
fn replace_boundaries(bndy: &mut Dtm, cleaned: &Dtm) -> Result<usize> {
    let originals: Vec<usize> = bndy
        .active_features()
        .filter(|(_, f)| f.feature_type.is_void_or_island())
        .map(|(i, _)| i)
        .collect();
    for index in originals {
        bndy.remove_feature(index)?;
    }

    let mut items = Vec::with_capacity(cleaned.feature_count());
    for (index, feature) in cleaned.active_features() {
        items.push(ForestItem {
            ring: cleaned.feature_points(index)?,
            feature_type: feature.feature_type,
            source: index,
        });
    }
    let forest = Forest::build(items, bndy.settings().pp_tol);

    let mut kept = 0;
    for node in forest.kept() {
        let Some(record) = cleaned.feature(node.source) else {
            continue;
        };
        bndy.store_derived_feature(
            node.feature_type,
            record.user_tag,
            Some(record.id),
            record.provenance,
            &node.ring,
        )?;
        kept += 1;
    }
    Ok(kept)
}
