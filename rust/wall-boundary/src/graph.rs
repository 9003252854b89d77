// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Undirected wall graph over snapped nodes.
//!
//! Nodes and edges live in flat arenas and refer to each other by index.
//! Building the graph drops segments that collapsed onto a single node,
//! optionally adds nodes where edges cross and splits edges at every node
//! lying on them, keeps one edge per node pair and
//! finally prunes dangling chains from the set of active edges. Pruned edges
//! stay in the arena so diagnostics can still see them.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::polygon_ops::{crossing_point, point_to_segment_distance, project_onto_segment};
use crate::snap::SnapResult;
use crate::spatial::SpatialIndex;
use crate::types::{BoundingBox, Point2D};

/// A canonical snapped vertex
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: usize,
    pub position: Point2D,
    /// Ids of every edge touching this node, active or not
    pub incident: SmallVec<[usize; 4]>,
}

/// An undirected edge between two distinct nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    pub id: usize,
    pub a: usize,
    pub b: usize,
    /// Index of the segment this edge came from
    pub segment: usize,
}

impl GraphEdge {
    /// The endpoint opposite `node`.
    pub fn other(&self, node: usize) -> usize {
        if node == self.a {
            self.b
        } else {
            self.a
        }
    }
}

/// Counters collected while building the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub collapsed_segments: usize,
    pub duplicate_edges: usize,
    /// Nodes added where two edges cross
    pub crossings: usize,
    /// Edge splits at nodes lying on the edge, crossing nodes included
    pub t_junction_splits: usize,
    pub dangling_nodes: usize,
}

/// Options for [`WallGraph::build`]
#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    pub snap_tolerance: f64,
    pub split_t_junctions: bool,
}

/// Arena-backed undirected wall graph
#[derive(Debug, Clone, Default)]
pub struct WallGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    active: Vec<bool>,
    stats: GraphStats,
}

impl WallGraph {
    /// Builds the graph from snapped segment endpoints.
    pub fn build(snap: &SnapResult, options: GraphOptions) -> Self {
        let mut stats = GraphStats::default();

        let mut raw: Vec<(usize, usize, usize)> = Vec::with_capacity(snap.endpoints.len());
        for (segment, &[a, b]) in snap.endpoints.iter().enumerate() {
            if a == b {
                stats.collapsed_segments += 1;
            } else {
                raw.push((a, b, segment));
            }
        }

        let mut positions = snap.nodes.clone();
        if options.split_t_junctions && !raw.is_empty() {
            stats.crossings = add_crossing_nodes(&mut positions, &raw, options.snap_tolerance);
            let (split, count) = split_t_junctions(&positions, &raw, options.snap_tolerance);
            raw = split;
            stats.t_junction_splits = count;
        }

        let mut nodes: Vec<GraphNode> = positions
            .iter()
            .enumerate()
            .map(|(id, &position)| GraphNode {
                id,
                position,
                incident: SmallVec::new(),
            })
            .collect();

        let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
        let mut edges = Vec::with_capacity(raw.len());
        for (a, b, segment) in raw {
            if !seen.insert((a.min(b), a.max(b))) {
                stats.duplicate_edges += 1;
                continue;
            }
            let id = edges.len();
            edges.push(GraphEdge { id, a, b, segment });
            nodes[a].incident.push(id);
            nodes[b].incident.push(id);
        }

        let mut graph = Self {
            active: vec![true; edges.len()],
            nodes,
            edges,
            stats,
        };
        graph.prune_dangling();

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            active_edges = graph.active_edge_count(),
            collapsed = graph.stats.collapsed_segments,
            duplicates = graph.stats.duplicate_edges,
            crossings = graph.stats.crossings,
            t_junctions = graph.stats.t_junction_splits,
            dangling = graph.stats.dangling_nodes,
            "Built wall graph"
        );

        graph
    }

    /// Repeatedly deactivates edges hanging off degree-1 nodes.
    fn prune_dangling(&mut self) {
        let initial: Vec<usize> = self.nodes.iter().map(|n| n.incident.len()).collect();
        let mut degree = initial.clone();
        let mut queue: Vec<usize> = (0..self.nodes.len()).filter(|&n| degree[n] == 1).collect();

        while let Some(node) = queue.pop() {
            if degree[node] != 1 {
                continue;
            }
            let Some(&edge) = self.nodes[node]
                .incident
                .iter()
                .find(|&&e| self.active[e])
            else {
                continue;
            };
            self.active[edge] = false;
            degree[node] -= 1;

            let other = self.edges[edge].other(node);
            degree[other] -= 1;
            if degree[other] == 1 {
                queue.push(other);
            }
        }

        self.stats.dangling_nodes = (0..self.nodes.len())
            .filter(|&n| initial[n] > 0 && degree[n] == 0)
            .count();
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    /// False once the edge was pruned as part of a dangling chain.
    pub fn is_active(&self, edge: usize) -> bool {
        self.active.get(edge).copied().unwrap_or(false)
    }

    pub fn active_edge_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Active edges incident to `node`.
    pub fn active_incident(&self, node: usize) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.nodes
            .get(node)
            .into_iter()
            .flat_map(|n| n.incident.iter())
            .filter(|&&e| self.active[e])
            .map(|&e| &self.edges[e])
    }

    /// Number of active edges at `node`.
    pub fn degree(&self, node: usize) -> usize {
        self.active_incident(node).count()
    }
}

/// Grid cell for edge and node lookups, roughly one node per cell on an
/// even spread.
fn grid_cell(extent: &BoundingBox, count: usize, tolerance: f64) -> f64 {
    (extent.width().max(extent.height()) / (count.max(1) as f64).sqrt()).max(tolerance)
}

/// Appends a node wherever two edges cross away from their endpoints.
///
/// Crossings within `tolerance` of an existing endpoint are left to the
/// T-junction pass, and crossings within `tolerance` of each other share one
/// node. Returns the number of nodes added.
fn add_crossing_nodes(
    nodes: &mut Vec<Point2D>,
    raw: &[(usize, usize, usize)],
    tolerance: f64,
) -> usize {
    let Some(extent) = BoundingBox::from_points(nodes.iter()) else {
        return 0;
    };
    let cell = grid_cell(&extent, nodes.len(), tolerance);
    let key = |v: f64| (v / cell).floor() as i64;

    let mut grid: FxHashMap<(i64, i64), SmallVec<[usize; 4]>> = FxHashMap::default();
    for (i, &(a, b, _)) in raw.iter().enumerate() {
        let bounds = BoundingBox::new(nodes[a], nodes[b]);
        for cx in key(bounds.min_x)..=key(bounds.max_x) {
            for cy in key(bounds.min_y)..=key(bounds.max_y) {
                grid.entry((cx, cy)).or_default().push(i);
            }
        }
    }

    let mut tested: FxHashSet<(usize, usize)> = FxHashSet::default();
    let mut crossings = Vec::new();
    for bucket in grid.values() {
        for (k, &i) in bucket.iter().enumerate() {
            for &j in &bucket[k + 1..] {
                if !tested.insert((i.min(j), i.max(j))) {
                    continue;
                }
                let (a, b, _) = raw[i];
                let (c, d, _) = raw[j];
                if a == c || a == d || b == c || b == d {
                    continue;
                }
                let Some(x) = crossing_point(&nodes[a], &nodes[b], &nodes[c], &nodes[d]) else {
                    continue;
                };
                if [a, b, c, d].iter().all(|&n| nodes[n].distance_to(&x) > tolerance) {
                    crossings.push(x);
                }
            }
        }
    }

    // Stable node ids regardless of bucket order
    crossings.sort_by(|p, q| p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y)));

    let first = nodes.len();
    let mut index = SpatialIndex::new(tolerance);
    for x in crossings {
        if index.find_all_near(&x, tolerance).is_empty() {
            index.insert(nodes.len(), x);
            nodes.push(x);
        }
    }
    nodes.len() - first
}

/// Splits each edge at every node lying within `tolerance` of its interior.
///
/// Returns the new edge list and the number of splits made.
fn split_t_junctions(
    nodes: &[Point2D],
    raw: &[(usize, usize, usize)],
    tolerance: f64,
) -> (Vec<(usize, usize, usize)>, usize) {
    let Some(extent) = BoundingBox::from_points(nodes) else {
        return (raw.to_vec(), 0);
    };
    let index = SpatialIndex::from_points(nodes, grid_cell(&extent, nodes.len(), tolerance));

    let mut splits = 0;
    let mut result = Vec::with_capacity(raw.len());

    for &(a, b, segment) in raw {
        let (pa, pb) = (nodes[a], nodes[b]);
        let search = BoundingBox::new(pa, pb).expand(tolerance);

        let mut hits: Vec<(f64, usize)> = index
            .find_in_box(&search)
            .into_iter()
            .filter(|&c| c != a && c != b)
            .filter_map(|c| {
                let pc = nodes[c];
                if pc.distance_to(&pa) <= tolerance || pc.distance_to(&pb) <= tolerance {
                    return None;
                }
                let t = project_onto_segment(&pc, &pa, &pb);
                let interior = t > 0.0 && t < 1.0;
                let touches = point_to_segment_distance(&pc, &pa, &pb) <= tolerance;
                (interior && touches).then_some((t, c))
            })
            .collect();

        if hits.is_empty() {
            result.push((a, b, segment));
            continue;
        }

        hits.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
        splits += hits.len();

        let mut prev = a;
        for (_, c) in hits {
            result.push((prev, c, segment));
            prev = c;
        }
        result.push((prev, b, segment));
    }

    (result, splits)
}
