// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Containment forest of cleaned boundaries.
//!
//! Items are inserted in order; each one is hung below the innermost earlier
//! item containing it. A child of the same class as its parent adds nothing
//! and is discarded. A child of the opposite class with the same range and no
//! area parity with its parent cancels it, and both are discarded.
//!
//! Nodes live in a `slotmap` arena; keys stay valid while the forest grows.

use dtm_lite_geometry::bool2d::{intersection, parity};
use dtm_lite_geometry::polygon::{point_in_on_out, InOut};
use dtm_lite_geometry::{Range2d, MIN_POLYGON_AREA};
use dtm_lite_tin::FeatureType;
use nalgebra::Point3;
use slotmap::{new_key_type, SlotMap};

use crate::classify::EdgeClass;

new_key_type! {
    /// Key of a node in the containment forest.
    pub struct NodeKey;
}

/// A cleaned boundary offered to the forest.
#[derive(Debug, Clone)]
pub struct ForestItem {
    /// Closed ring.
    pub ring: Vec<Point3<f64>>,
    pub feature_type: FeatureType,
    /// Index of the boundary in the DTM it came from.
    pub source: usize,
}

#[derive(Debug, Clone)]
pub struct ForestNode {
    pub ring: Vec<Point3<f64>>,
    pub range: Range2d,
    pub feature_type: FeatureType,
    pub class: EdgeClass,
    pub source: usize,
    /// False for duplicates and cancelling pairs.
    pub keep: bool,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

#[derive(Debug, Default)]
pub struct Forest {
    nodes: SlotMap<NodeKey, ForestNode>,
    roots: Vec<NodeKey>,
    order: Vec<NodeKey>,
}

impl Forest {
    /// Build the forest. `tolerance` is the on-boundary distance used by the
    /// representative point test.
    pub fn build(items: impl IntoIterator<Item = ForestItem>, tolerance: f64) -> Self {
        let mut forest = Self::default();
        for item in items {
            forest.insert(item, tolerance);
        }
        tracing::debug!(
            items = forest.order.len(),
            kept = forest.kept().count(),
            roots = forest.roots.len(),
            "built containment forest"
        );
        forest
    }

    fn insert(&mut self, item: ForestItem, tolerance: f64) {
        let Some(range) = Range2d::from_points(&item.ring) else {
            tracing::trace!(source = item.source, "skipped empty boundary");
            return;
        };
        let class = EdgeClass::of(item.feature_type);
        let parent = self.find_parent(&self.roots, &item.ring, &range, tolerance);

        let mut keep = true;
        if let Some(parent_key) = parent {
            let parent_node = &self.nodes[parent_key];
            if parent_node.class == class {
                tracing::trace!(source = item.source, parent = parent_node.source, "discarded nested duplicate");
                keep = false;
            } else if parent_node.range == range && cancels(&parent_node.ring, &item.ring) {
                tracing::trace!(source = item.source, parent = parent_node.source, "discarded cancelling pair");
                keep = false;
                self.nodes[parent_key].keep = false;
            }
        }

        let key = self.nodes.insert(ForestNode {
            ring: item.ring,
            range,
            feature_type: item.feature_type,
            class,
            source: item.source,
            keep,
            parent,
            children: Vec::new(),
        });
        self.order.push(key);

        if keep {
            match parent {
                Some(parent_key) => self.nodes[parent_key].children.push(key),
                None => self.roots.push(key),
            }
        }
    }

    /// Innermost node among `candidates` and their descendants containing
    /// the ring.
    fn find_parent(
        &self,
        candidates: &[NodeKey],
        ring: &[Point3<f64>],
        range: &Range2d,
        tolerance: f64,
    ) -> Option<NodeKey> {
        let start = ring.first()?;
        for &key in candidates {
            let node = &self.nodes[key];
            if !node.range.contains_range(range) {
                continue;
            }
            if let Some(inner) = self.find_parent(&node.children, ring, range, tolerance) {
                return Some(inner);
            }
            match point_in_on_out(start.x, start.y, &node.ring, tolerance) {
                InOut::In => return Some(key),
                InOut::On if intersection(ring, &node.ring).shape_count() == 1 => return Some(key),
                _ => {}
            }
        }
        None
    }

    pub fn node(&self, key: NodeKey) -> Option<&ForestNode> {
        self.nodes.get(key)
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> &[NodeKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Kept nodes in insertion order.
    pub fn kept(&self) -> impl Iterator<Item = &ForestNode> + '_ {
        self.order.iter().map(|&k| &self.nodes[k]).filter(|n| n.keep)
    }

    /// True when `ancestor` is on the parent chain of `key`.
    pub fn is_descendant(&self, key: NodeKey, ancestor: NodeKey) -> bool {
        let mut current = self.nodes.get(key).and_then(|n| n.parent);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.nodes.get(k).and_then(|n| n.parent);
        }
        false
    }
}

fn cancels(a: &[Point3<f64>], b: &[Point3<f64>]) -> bool {
    let difference = parity(a, b);
    difference.is_empty() || difference.area() < MIN_POLYGON_AREA
}
