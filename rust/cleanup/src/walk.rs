// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loop extraction over a breakline network.
//!
//! Two walks are provided:
//!
//! - [`walk_hull_loop`] follows breaklines of one class from a hull edge,
//!   always taking the rightmost turn, and returns the outer boundary of the
//!   breaklines met there together with the features owning it.
//! - [`find_polygons`] peels every simple closed loop out of the directed
//!   feature edges, turning clockwise at branch points.
//!
//! Visit state lives in maps owned by the caller or the walk itself; nothing
//! is written to the network.

use std::collections::BTreeSet;

use dtm_lite_tin::{Dtm, TinNetwork};
use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::classify::{collect_features_on_edge, is_breakline_edge, EdgeClass};

/// Loops traced during one hull pass, as `point -> next point` links.
#[derive(Debug, Clone, Default)]
pub struct TraceMap {
    next: FxHashMap<usize, usize>,
}

impl TraceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a traced loop leaves `p`.
    pub fn is_visited(&self, p: usize) -> bool {
        self.next.contains_key(&p)
    }

    /// Point a traced loop goes to from `p`.
    pub fn next(&self, p: usize) -> Option<usize> {
        self.next.get(&p).copied()
    }

    fn record(&mut self, ring: &[usize]) {
        for pair in ring.windows(2) {
            self.next.insert(pair[0], pair[1]);
        }
    }

    fn mark(&mut self, p: usize, q: usize) {
        self.next.insert(p, q);
    }
}

/// A closed loop found from the hull.
#[derive(Debug, Clone, PartialEq)]
pub struct HullLoop {
    /// Mesh points, first repeated last.
    pub ring: Vec<usize>,
    /// Features of the walked class owning the loop's edges.
    pub features: BTreeSet<usize>,
}

impl HullLoop {
    pub fn points(&self, network: &TinNetwork) -> Vec<Point3<f64>> {
        self.ring.iter().map(|&p| *network.point(p)).collect()
    }
}

/// Walk the boundary of `class` breaklines starting with the hull edge
/// `sp -> np`. Returns `None` on a dead end.
///
/// At each point the walk rotates anticlockwise from the incoming point until
/// it finds an outgoing breakline of `class`. Re-entering a point already on
/// the chain drops the sub-loop closed there.
pub fn walk_hull_loop(
    network: &TinNetwork,
    dtm: &Dtm,
    sp: usize,
    np: usize,
    class: EdgeClass,
    trace: &mut TraceMap,
) -> Option<HullLoop> {
    let cap = network.directed_edge_count() + 2;
    trace.mark(sp, np);

    let mut chain = vec![sp];
    let mut position: FxHashMap<usize, usize> = FxHashMap::default();
    position.insert(sp, 0);

    let (mut hp, mut np) = (sp, np);
    let mut steps = 0;
    while np != sp {
        steps += 1;
        if steps > cap {
            tracing::warn!(start = sp, steps, "hull walk exceeded its step bound");
            return None;
        }

        let Some(next) = next_class_edge(network, dtm, np, hp, class) else {
            tracing::warn!(point = np, ?class, "hull walk reached a dead end");
            return None;
        };

        if let Some(at) = position.get(&np).copied() {
            for p in chain.drain(at..) {
                position.remove(&p);
            }
        }
        position.insert(np, chain.len());
        chain.push(np);

        hp = np;
        np = next;
    }

    chain.push(sp);
    trace.record(&chain);

    let mut features = BTreeSet::new();
    for pair in chain.windows(2) {
        collect_features_on_edge(network, dtm, pair[0], pair[1], class, &mut features);
    }
    tracing::trace!(points = chain.len(), features = features.len(), "traced hull loop");

    Some(HullLoop { ring: chain, features })
}

/// First outgoing `class` breakline met rotating anticlockwise around `p`
/// from `from`.
fn next_class_edge(network: &TinNetwork, dtm: &Dtm, p: usize, from: usize, class: EdgeClass) -> Option<usize> {
    let mut candidate = network.next_anticlockwise(p, from)?;
    for _ in 0..network.degree(p) {
        if is_breakline_edge(network, dtm, p, candidate, class) {
            return Some(candidate);
        }
        candidate = network.next_anticlockwise(p, candidate)?;
    }
    None
}

/// Every simple closed loop formed by the network's directed feature edges.
/// Loops are returned as closed point rings; chains that dead-end are dropped.
pub fn find_polygons(network: &TinNetwork) -> Vec<Vec<Point3<f64>>> {
    let mut marked: FxHashSet<(usize, usize)> = FxHashSet::default();
    let mut result = Vec::new();

    for p in 0..network.point_count() {
        for edge in network.feature_edges(p) {
            if !marked.contains(&(p, edge.next)) {
                trace_polygons(network, p, edge.next, &mut marked, &mut result);
            }
        }
    }
    result
}

fn trace_polygons(
    network: &TinNetwork,
    start: usize,
    first: usize,
    marked: &mut FxHashSet<(usize, usize)>,
    result: &mut Vec<Vec<Point3<f64>>>,
) {
    let cap = network.directed_edge_count() + 2;
    let mut trace: FxHashMap<usize, usize> = FxHashMap::default();
    let (mut p1, mut p2) = (start, first);

    for _ in 0..cap {
        marked.insert((p1, p2));
        if trace.contains_key(&p1) {
            result.push(take_loop(network, &mut trace, p1));
        }
        trace.insert(p1, p2);

        let Some(np) = next_feature_edge(network, p1, p2) else {
            return;
        };
        p1 = p2;
        p2 = np;
        if p1 == start {
            result.push(take_loop(network, &mut trace, p1));
            return;
        }
    }
    tracing::debug!(start, "polygon walk exceeded its step bound");
}

/// Continuation after arriving at `p2` from `p1`. Branch points take the
/// first feature edge met rotating clockwise from the incoming edge.
fn next_feature_edge(network: &TinNetwork, p1: usize, p2: usize) -> Option<usize> {
    let edges = network.feature_edges(p2);
    match edges.len() {
        0 => None,
        1 => Some(edges[0].next),
        _ => {
            let mut t = network.next_clockwise(p2, p1)?;
            for _ in 0..network.degree(p2) {
                if t == p1 || network.has_feature_edge(p2, t) {
                    break;
                }
                t = network.next_clockwise(p2, t)?;
            }
            network.has_feature_edge(p2, t).then_some(t)
        }
    }
}

/// Follow and clear the trace from `start`, returning the visited points.
fn take_loop(network: &TinNetwork, trace: &mut FxHashMap<usize, usize>, start: usize) -> Vec<Point3<f64>> {
    let mut ring = Vec::new();
    let mut current = Some(start);
    while let Some(p) = current {
        ring.push(*network.point(p));
        current = trace.remove(&p);
    }
    ring
}
