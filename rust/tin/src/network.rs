// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Noded breakline network of a triangulated DTM.
//!
//! Triangulating a DTM merges coincident feature points, nodes every pair of
//! crossing, touching or overlapping feature segments and records, per mesh
//! point:
//!
//! - its neighbours sorted anticlockwise, for next-clockwise and
//!   next-anticlockwise rotation queries
//! - its directed feature edges (`point -> next` tagged with the owning feature)
//!
//! The hull is the outer face of every connected component that is not
//! enclosed by another component, walked anticlockwise. Only constraint edges
//! are materialised: free edges of the triangulation carry no feature and are
//! never consulted by the walks built on top of this network.

use dtm_lite_geometry::polygon::{
    distance_xy, intersect_segments, point_in_on_out, point_segment_distance, project_param,
    InOut, SegmentIntersection,
};
use nalgebra::{Point2, Point3};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Smallest tolerance used when merging points.
pub const MIN_POINT_TOLERANCE: f64 = 1e-9;

/// A directed feature edge leaving a mesh point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureEdge {
    /// Mesh point the edge runs to.
    pub next: usize,
    /// Index of the owning feature in the feature table.
    pub feature: usize,
}

/// Breakline network built by [`crate::Dtm::triangulate`].
#[derive(Debug, Clone)]
pub struct TinNetwork {
    points: Vec<Point3<f64>>,
    neighbours: Vec<SmallVec<[usize; 6]>>,
    feature_edges: Vec<SmallVec<[FeatureEdge; 4]>>,
    feature_rings: FxHashMap<usize, Vec<usize>>,
    hull: Vec<Vec<usize>>,
    hull_edges: FxHashSet<(usize, usize)>,
    directed_edges: usize,
    tolerance: f64,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: usize,
    b: usize,
    feature: usize,
}

/// Grid hash used to merge points closer than the tolerance.
struct PointIndex {
    cell: f64,
    grid: FxHashMap<(i64, i64), SmallVec<[usize; 2]>>,
}

impl PointIndex {
    fn new(tolerance: f64) -> Self {
        Self {
            cell: tolerance,
            grid: FxHashMap::default(),
        }
    }

    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        ((x / self.cell).floor() as i64, (y / self.cell).floor() as i64)
    }

    fn find(&self, points: &[Point3<f64>], p: &Point3<f64>) -> Option<usize> {
        let (cx, cy) = self.cell_of(p.x, p.y);
        let mut best: Option<(usize, f64)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.grid.get(&(cx + dx, cy + dy)) {
                    for &i in bucket {
                        let d = distance_xy(&points[i], p);
                        if d <= self.cell && best.map_or(true, |(_, bd)| d < bd) {
                            best = Some((i, d));
                        }
                    }
                }
            }
        }
        best.map(|(i, _)| i)
    }

    fn insert(&mut self, points: &mut Vec<Point3<f64>>, p: Point3<f64>) -> usize {
        if let Some(existing) = self.find(points, &p) {
            return existing;
        }
        let index = points.len();
        points.push(p);
        let key = self.cell_of(p.x, p.y);
        self.grid.entry(key).or_default().push(index);
        index
    }
}

impl TinNetwork {
    /// Build the network from `(feature index, points)` pairs.
    pub fn build(features: &[(usize, Vec<Point3<f64>>)], tolerance: f64) -> Result<Self> {
        let tolerance = tolerance.max(MIN_POINT_TOLERANCE);
        let mut points: Vec<Point3<f64>> = Vec::new();
        let mut index = PointIndex::new(tolerance);

        // Merge points and cut features into segments
        let mut segments: Vec<Segment> = Vec::new();
        let mut feature_segments: Vec<(usize, Vec<usize>)> = Vec::with_capacity(features.len());
        for (feature, feature_points) in features {
            let mut seg_ids = Vec::new();
            let mut prev: Option<usize> = None;
            for p in feature_points {
                let v = index.insert(&mut points, *p);
                if let Some(u) = prev {
                    if u != v {
                        seg_ids.push(segments.len());
                        segments.push(Segment {
                            a: u,
                            b: v,
                            feature: *feature,
                        });
                    }
                }
                prev = Some(v);
            }
            feature_segments.push((*feature, seg_ids));
        }

        if points.len() < 3 {
            return Err(Error::Triangulation(format!(
                "{} distinct points, at least 3 required",
                points.len()
            )));
        }

        let splits = node_segments(&segments, &mut points, &mut index, tolerance);

        // Sub-edges, adjacency and directed feature edges
        let n = points.len();
        let mut links: FxHashSet<(usize, usize)> = FxHashSet::default();
        let mut feature_edges: Vec<SmallVec<[FeatureEdge; 4]>> = vec![SmallVec::new(); n];
        let mut feature_rings: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        let mut directed_edges = 0;

        for (feature, seg_ids) in &feature_segments {
            let mut ring: Vec<usize> = Vec::new();
            for &s in seg_ids {
                let seg = segments[s];
                let mut chain: Vec<usize> = Vec::with_capacity(splits[s].len() + 2);
                chain.push(seg.a);
                chain.extend(splits[s].iter().map(|&(_, v)| v));
                chain.push(seg.b);
                chain.dedup();

                if ring.is_empty() {
                    ring.push(chain[0]);
                }
                for pair in chain.windows(2) {
                    let (p, q) = (pair[0], pair[1]);
                    links.insert((p.min(q), p.max(q)));
                    let edge = FeatureEdge {
                        next: q,
                        feature: seg.feature,
                    };
                    if !feature_edges[p].contains(&edge) {
                        feature_edges[p].push(edge);
                        directed_edges += 1;
                    }
                    ring.push(q);
                }
            }
            if ring.len() > 1 {
                feature_rings.insert(*feature, ring);
            }
        }

        let mut neighbours: Vec<SmallVec<[usize; 6]>> = vec![SmallVec::new(); n];
        for &(p, q) in &links {
            neighbours[p].push(q);
            neighbours[q].push(p);
        }
        for (p, list) in neighbours.iter_mut().enumerate() {
            let origin = points[p];
            list.sort_by(|&a, &b| {
                let ta = (points[a].y - origin.y).atan2(points[a].x - origin.x);
                let tb = (points[b].y - origin.y).atan2(points[b].x - origin.x);
                ta.total_cmp(&tb)
            });
        }

        let mut network = Self {
            points,
            neighbours,
            feature_edges,
            feature_rings,
            hull: Vec::new(),
            hull_edges: FxHashSet::default(),
            directed_edges,
            tolerance,
        };
        network.build_hull()?;

        tracing::debug!(
            points = network.points.len(),
            links = links.len(),
            directed_edges,
            hull_loops = network.hull.len(),
            "built breakline network"
        );
        Ok(network)
    }

    // --- Points ---

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, p: usize) -> &Point3<f64> {
        &self.points[p]
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Tolerance the network was noded with.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Mesh point closest to `(x, y)`.
    pub fn closest_point(&self, x: f64, y: f64) -> Option<usize> {
        let target = Point3::new(x, y, 0.0);
        self.points
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.neighbours[*i].is_empty())
            .map(|(i, p)| (i, distance_xy(p, &target)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    // --- Adjacency ---

    /// Neighbours of `p` in anticlockwise order.
    pub fn neighbours(&self, p: usize) -> &[usize] {
        &self.neighbours[p]
    }

    pub fn degree(&self, p: usize) -> usize {
        self.neighbours[p].len()
    }

    /// Neighbour of `p` following `q` when rotating anticlockwise around `p`.
    pub fn next_anticlockwise(&self, p: usize, q: usize) -> Option<usize> {
        let list = &self.neighbours[p];
        let pos = list.iter().position(|&n| n == q)?;
        Some(list[(pos + 1) % list.len()])
    }

    /// Neighbour of `p` following `q` when rotating clockwise around `p`.
    pub fn next_clockwise(&self, p: usize, q: usize) -> Option<usize> {
        let list = &self.neighbours[p];
        let pos = list.iter().position(|&n| n == q)?;
        Some(list[(pos + list.len() - 1) % list.len()])
    }

    /// Every undirected link once, as `(low, high)` point pairs.
    pub fn links(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.neighbours
            .iter()
            .enumerate()
            .flat_map(|(p, list)| list.iter().filter(move |&&q| q > p).map(move |&q| (p, q)))
    }

    // --- Feature edges ---

    /// Directed feature edges leaving `p`.
    pub fn feature_edges(&self, p: usize) -> &[FeatureEdge] {
        &self.feature_edges[p]
    }

    /// Features owning the directed edge `p -> q`.
    pub fn features_on_edge(&self, p: usize, q: usize) -> impl Iterator<Item = usize> + '_ {
        self.feature_edges[p]
            .iter()
            .filter(move |e| e.next == q)
            .map(|e| e.feature)
    }

    /// True when any feature owns the directed edge `p -> q`.
    pub fn has_feature_edge(&self, p: usize, q: usize) -> bool {
        self.feature_edges[p].iter().any(|e| e.next == q)
    }

    /// First feature found on the link, trying `p -> q` before `q -> p`.
    pub fn first_feature_on_link(&self, p: usize, q: usize) -> Option<usize> {
        self.features_on_edge(p, q)
            .next()
            .or_else(|| self.features_on_edge(q, p).next())
    }

    /// Total number of directed feature edges.
    pub fn directed_edge_count(&self) -> usize {
        self.directed_edges
    }

    /// Mesh points of a feature in feature order.
    pub fn feature_ring(&self, feature: usize) -> Option<&[usize]> {
        self.feature_rings.get(&feature).map(Vec::as_slice)
    }

    /// Point following `p` along `feature`, if `p` lies on it.
    pub fn next_point_for_feature(&self, feature: usize, p: usize) -> Option<usize> {
        self.feature_edges[p]
            .iter()
            .find(|e| e.feature == feature)
            .map(|e| e.next)
    }

    /// Chain of links from `p` to `q` running along the straight segment
    /// between them, used when intermediate mesh points split the segment.
    pub fn collinear_path(&self, p: usize, q: usize) -> Option<Vec<usize>> {
        let a = Point2::new(self.points[p].x, self.points[p].y);
        let b = Point2::new(self.points[q].x, self.points[q].y);
        let mut path = vec![p];
        let mut current = p;
        let mut param = 0.0;
        while current != q {
            let step = self.neighbours[current]
                .iter()
                .copied()
                .filter_map(|n| {
                    let c = Point2::new(self.points[n].x, self.points[n].y);
                    let t = project_param(&a, &b, &c);
                    let on_line = point_segment_distance(&a, &b, &c) <= self.tolerance;
                    (on_line && t > param && t <= 1.0 + f64::EPSILON).then_some((n, t))
                })
                .min_by(|x, y| x.1.total_cmp(&y.1))?;
            current = step.0;
            param = step.1;
            path.push(current);
            if path.len() > self.points.len() {
                return None;
            }
        }
        Some(path)
    }

    // --- Hull ---

    /// Anticlockwise outer loops, closing point implied.
    pub fn hull_loops(&self) -> &[Vec<usize>] {
        &self.hull
    }

    /// True when `p -> q` or `q -> p` is a hull edge.
    pub fn is_hull_link(&self, p: usize, q: usize) -> bool {
        self.hull_edges.contains(&(p, q)) || self.hull_edges.contains(&(q, p))
    }

    fn build_hull(&mut self) -> Result<()> {
        let n = self.points.len();
        let mut component = vec![usize::MAX; n];
        let mut starts: Vec<usize> = Vec::new();

        for seed in 0..n {
            if component[seed] != usize::MAX || self.neighbours[seed].is_empty() {
                continue;
            }
            let id = starts.len();
            let mut start = seed;
            let mut queue = std::collections::VecDeque::from([seed]);
            component[seed] = id;
            while let Some(p) = queue.pop_front() {
                let (sp, pp) = (&self.points[start], &self.points[p]);
                if pp.y < sp.y || (pp.y == sp.y && pp.x < sp.x) {
                    start = p;
                }
                for &q in &self.neighbours[p] {
                    if component[q] == usize::MAX {
                        component[q] = id;
                        queue.push_back(q);
                    }
                }
            }
            starts.push(start);
        }

        let mut loops = Vec::with_capacity(starts.len());
        for &start in &starts {
            loops.push(self.outer_face(start)?);
        }

        // Components lying inside another component's outer loop are not hull
        let rings: Vec<Vec<Point3<f64>>> = loops
            .iter()
            .map(|l| l.iter().map(|&p| self.points[p]).collect())
            .collect();
        for (i, outer) in loops.iter().enumerate() {
            let s = &self.points[starts[i]];
            let enclosed = rings.iter().enumerate().any(|(j, ring)| {
                j != i && point_in_on_out(s.x, s.y, ring, 0.0) == InOut::In
            });
            if enclosed {
                continue;
            }
            for k in 0..outer.len() {
                self.hull_edges.insert((outer[k], outer[(k + 1) % outer.len()]));
            }
            self.hull.push(outer.clone());
        }
        Ok(())
    }

    /// Walk the outer face of the component holding `start`, the lowest
    /// (then leftmost) point of that component.
    fn outer_face(&self, start: usize) -> Result<Vec<usize>> {
        // All neighbours of the lowest point lie in [0, pi]; the smallest
        // angle is the first one met rotating anticlockwise from straight down.
        let first = self.neighbours[start][0];
        let limit = 2 * self.links().count() + 2;

        let mut face = vec![start];
        let mut prev = start;
        let mut cur = first;
        let mut steps = 0;
        loop {
            let next = self
                .next_anticlockwise(cur, prev)
                .ok_or_else(|| Error::Triangulation(format!("broken adjacency at point {cur}")))?;
            prev = cur;
            cur = next;
            if prev == start && cur == first {
                break;
            }
            face.push(prev);
            steps += 1;
            if steps > limit {
                return Err(Error::Triangulation(format!(
                    "hull walk from point {start} does not close"
                )));
            }
        }
        Ok(face)
    }
}

/// Find every crossing, touching or overlapping pair of segments and return,
/// per segment, the interior split vertices sorted along the segment.
fn node_segments(
    segments: &[Segment],
    points: &mut Vec<Point3<f64>>,
    index: &mut PointIndex,
    tolerance: f64,
) -> Vec<Vec<(f64, usize)>> {
    let mut splits: Vec<Vec<(f64, usize)>> = vec![Vec::new(); segments.len()];

    let bounds = |s: &Segment, pts: &[Point3<f64>]| {
        let (a, b) = (pts[s.a], pts[s.b]);
        (a.x.min(b.x), a.x.max(b.x), a.y.min(b.y), a.y.max(b.y))
    };

    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by(|&i, &j| {
        bounds(&segments[i], &points[..])
            .0
            .total_cmp(&bounds(&segments[j], &points[..]).0)
    });

    for (k, &i) in order.iter().enumerate() {
        let bi = bounds(&segments[i], &points[..]);
        for &j in &order[k + 1..] {
            let bj = bounds(&segments[j], &points[..]);
            if bj.0 > bi.1 + tolerance {
                break;
            }
            if bj.2 > bi.3 + tolerance || bj.3 < bi.2 - tolerance {
                continue;
            }
            node_pair(segments, i, j, points, index, tolerance, &mut splits);
        }
    }

    for (s, list) in splits.iter_mut().enumerate() {
        let seg = segments[s];
        list.retain(|&(_, v)| v != seg.a && v != seg.b);
        list.sort_by(|x, y| x.0.total_cmp(&y.0));
        list.dedup_by(|x, y| x.1 == y.1);
    }
    splits
}

fn node_pair(
    segments: &[Segment],
    i: usize,
    j: usize,
    points: &mut Vec<Point3<f64>>,
    index: &mut PointIndex,
    tolerance: f64,
    splits: &mut [Vec<(f64, usize)>],
) {
    let (si, sj) = (segments[i], segments[j]);
    let flat = |p: &Point3<f64>| Point2::new(p.x, p.y);
    let (a, b) = (flat(&points[si.a]), flat(&points[si.b]));
    let (c, d) = (flat(&points[sj.a]), flat(&points[sj.b]));
    let len_i = (b - a).norm();
    let len_j = (d - c).norm();

    match intersect_segments(&a, &b, &c, &d, tolerance) {
        SegmentIntersection::None => {}
        SegmentIntersection::Point { t, u, x, y } => {
            let v = if t * len_i <= tolerance {
                si.a
            } else if (1.0 - t) * len_i <= tolerance {
                si.b
            } else if u * len_j <= tolerance {
                sj.a
            } else if (1.0 - u) * len_j <= tolerance {
                sj.b
            } else {
                let (pa, pb) = (points[si.a], points[si.b]);
                let z = pa.z + t * (pb.z - pa.z);
                index.insert(points, Point3::new(x, y, z))
            };
            splits[i].push((t, v));
            splits[j].push((u, v));
        }
        SegmentIntersection::Overlap => {
            for (v, p) in [(sj.a, c), (sj.b, d)] {
                let t = project_param(&a, &b, &p);
                if t > 0.0 && t < 1.0 {
                    splits[i].push((t, v));
                }
            }
            for (v, p) in [(si.a, a), (si.b, b)] {
                let u = project_param(&c, &d, &p);
                if u > 0.0 && u < 1.0 {
                    splits[j].push((u, v));
                }
            }
        }
    }
}
