// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Breakline classification of network edges.
//!
//! In a scratch DTM every boundary is stored as a `Breakline` whose user tag
//! carries the real feature type. An edge is void-like when an owning
//! breakline was tagged with anything but `Island`, island-like otherwise.

use std::collections::BTreeSet;

use dtm_lite_tin::{Dtm, FeatureType, TinNetwork};

/// Class of polygon boundary an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeClass {
    VoidLike,
    IslandLike,
}

impl EdgeClass {
    pub fn of(feature_type: FeatureType) -> Self {
        if feature_type.is_void_like() {
            EdgeClass::VoidLike
        } else {
            EdgeClass::IslandLike
        }
    }

    /// The other class.
    pub fn flip(self) -> Self {
        match self {
            EdgeClass::VoidLike => EdgeClass::IslandLike,
            EdgeClass::IslandLike => EdgeClass::VoidLike,
        }
    }
}

/// Class of a scratch feature, `None` unless it is a live tagged breakline.
pub fn feature_class(dtm: &Dtm, feature: usize) -> Option<EdgeClass> {
    let f = dtm.feature(feature)?;
    if f.feature_type != FeatureType::Breakline || !f.is_active() {
        return None;
    }
    f.tagged_type().map(EdgeClass::of)
}

/// True when a breakline of `class` owns the directed edge `p -> q`.
pub fn is_breakline_edge(network: &TinNetwork, dtm: &Dtm, p: usize, q: usize, class: EdgeClass) -> bool {
    network
        .features_on_edge(p, q)
        .any(|f| feature_class(dtm, f) == Some(class))
}

/// True when any feature owns the directed edge `p -> q`, whatever its class.
pub fn is_breakline_edge_any(network: &TinNetwork, p: usize, q: usize) -> bool {
    network.has_feature_edge(p, q)
}

/// Add every feature of `class` owning the directed edge `p -> q` to `out`.
pub fn collect_features_on_edge(
    network: &TinNetwork,
    dtm: &Dtm,
    p: usize,
    q: usize,
    class: EdgeClass,
    out: &mut BTreeSet<usize>,
) {
    out.extend(
        network
            .features_on_edge(p, q)
            .filter(|&f| feature_class(dtm, f) == Some(class)),
    );
}
