// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loop tracing over the wall graph.
//!
//! Every active edge contributes two half-edges. At each node the incident
//! edges are ordered counter-clockwise by angle; leaving a node along `v→w`
//! after arriving along `u→v` picks the edge just clockwise of `v→u`, which
//! keeps the traced face on the left. Every half-edge belongs to exactly one
//! face walk, so tracing touches each half-edge once.
//!
//! Face walks can revisit a node where two cycles meet at a cut vertex or
//! hang off a bridge. Such walks are split into simple cycles. The outer face
//! of a simple component walks the same node cycle as its bounded face in the
//! opposite direction, so cycles are keyed by a direction-independent
//! canonical form and kept once.

use std::f64::consts::PI;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::WallGraph;
use crate::polygon_ops::{is_simple, perimeter, signed_area};
use crate::types::{BoundingBox, Point2D};

/// A closed cycle of graph nodes
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLoop {
    /// Node ids in counter-clockwise order, first == last
    pub nodes: Vec<usize>,
    /// Node positions, counter-clockwise, first point not repeated
    pub polygon: Vec<Point2D>,
    pub perimeter: f64,
    /// Positive for counter-clockwise polygons
    pub signed_area: f64,
    /// Number of distinct nodes
    pub point_count: usize,
    pub bounds: BoundingBox,
}

impl BoundaryLoop {
    pub fn area(&self) -> f64 {
        self.signed_area.abs()
    }
}

/// Counters from one tracing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceStats {
    /// Distinct simple cycles found, before filtering; equals the number of
    /// loops returned plus the degenerate and self-intersecting ones
    pub loops_traced: usize,
    /// Cycles with fewer than three nodes or negligible area
    pub degenerate_loops: usize,
    pub self_intersecting_loops: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TraceResult {
    pub loops: Vec<BoundaryLoop>,
    pub stats: TraceStats,
}

/// Traces all closed boundary loops of the active part of `graph`.
///
/// Loops whose area is below `snap_tolerance²` are treated as degenerate.
pub fn trace_loops(graph: &WallGraph, snap_tolerance: f64) -> TraceResult {
    let rotation = RotationSystem::new(graph);
    let mut stats = TraceStats::default();
    let mut seen: FxHashSet<Vec<usize>> = FxHashSet::default();
    let mut loops = Vec::new();

    let min_area = snap_tolerance * snap_tolerance;
    let mut visited = vec![false; graph.edge_count() * 2];

    for start in 0..visited.len() {
        if visited[start] || !graph.is_active(start / 2) {
            continue;
        }

        let walk = rotation.walk_face(start, &mut visited);
        for cycle in split_simple_cycles(&walk) {
            if !seen.insert(canonical_key(&cycle)) {
                continue;
            }
            stats.loops_traced += 1;
            if cycle.len() < 3 {
                stats.degenerate_loops += 1;
                continue;
            }

            let Some(boundary) = build_loop(graph, cycle) else {
                stats.degenerate_loops += 1;
                continue;
            };
            if boundary.area() < min_area {
                stats.degenerate_loops += 1;
            } else if !is_simple(&boundary.polygon) {
                stats.self_intersecting_loops += 1;
            } else {
                loops.push(boundary);
            }
        }
    }

    tracing::debug!(
        loops = loops.len(),
        traced = stats.loops_traced,
        degenerate = stats.degenerate_loops,
        self_intersecting = stats.self_intersecting_loops,
        "Traced boundary loops"
    );

    TraceResult { loops, stats }
}

/// Angular ordering of active edges around every node.
///
/// Half-edge `2 * e` runs `a → b` along edge `e`, `2 * e + 1` runs `b → a`.
struct RotationSystem<'a> {
    graph: &'a WallGraph,
    /// Node id → outgoing half-edges sorted counter-clockwise
    around: Vec<Vec<usize>>,
    /// Half-edge → its position in `around` of its origin node
    slot: Vec<usize>,
}

impl<'a> RotationSystem<'a> {
    fn new(graph: &'a WallGraph) -> Self {
        let mut around: Vec<Vec<usize>> = vec![Vec::new(); graph.node_count()];
        let mut slot = vec![usize::MAX; graph.edge_count() * 2];

        for node in graph.nodes() {
            let mut outgoing: Vec<(f64, usize)> = graph
                .active_incident(node.id)
                .map(|edge| {
                    let half = if edge.a == node.id { edge.id * 2 } else { edge.id * 2 + 1 };
                    let target = graph.nodes()[edge.other(node.id)].position;
                    let dir = node.position.vector_to(&target);
                    // atan2 in (-π, π], shifted to [0, 2π)
                    let angle = dir.y.atan2(dir.x).rem_euclid(2.0 * PI);
                    (angle, half)
                })
                .collect();
            outgoing.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

            for (i, &(_, half)) in outgoing.iter().enumerate() {
                slot[half] = i;
            }
            around[node.id] = outgoing.into_iter().map(|(_, half)| half).collect();
        }

        Self {
            graph,
            around,
            slot,
        }
    }

    fn origin(&self, half: usize) -> usize {
        let edge = &self.graph.edges()[half / 2];
        if half % 2 == 0 {
            edge.a
        } else {
            edge.b
        }
    }

    fn next(&self, half: usize) -> usize {
        let twin = half ^ 1;
        let at = self.origin(twin);
        let ring = &self.around[at];
        let i = self.slot[twin];
        ring[(i + ring.len() - 1) % ring.len()]
    }

    /// Follows the face to the left of `start`, returning its origin nodes.
    fn walk_face(&self, start: usize, visited: &mut [bool]) -> Vec<usize> {
        let mut nodes = Vec::new();
        let mut half = start;
        while !visited[half] {
            visited[half] = true;
            nodes.push(self.origin(half));
            half = self.next(half);
        }
        nodes
    }
}

/// Splits a closed walk into simple cycles at repeated nodes.
fn split_simple_cycles(walk: &[usize]) -> Vec<Vec<usize>> {
    let mut cycles = Vec::new();
    let mut stack: Vec<usize> = Vec::with_capacity(walk.len());
    let mut position: FxHashMap<usize, usize> = FxHashMap::default();

    let closing = walk.first().copied();
    for &node in walk.iter().chain(closing.iter()) {
        if let Some(&at) = position.get(&node) {
            let cycle: Vec<usize> = stack.drain(at..).collect();
            for n in &cycle {
                position.remove(n);
            }
            cycles.push(cycle);
        }
        position.insert(node, stack.len());
        stack.push(node);
    }

    cycles
}

/// Rotation and direction independent key for a node cycle.
fn canonical_key(cycle: &[usize]) -> Vec<usize> {
    let n = cycle.len();
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, &node)| node)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let forward = cycle[(start + 1) % n];
    let backward = cycle[(start + n - 1) % n];
    if forward <= backward {
        (0..n).map(|k| cycle[(start + k) % n]).collect()
    } else {
        (0..n).map(|k| cycle[(start + n - k) % n]).collect()
    }
}

/// Orients the cycle counter-clockwise and derives its geometry.
fn build_loop(graph: &WallGraph, mut cycle: Vec<usize>) -> Option<BoundaryLoop> {
    let positions = graph.nodes();
    let mut polygon: Vec<Point2D> = cycle.iter().map(|&n| positions[n].position).collect();

    let mut area = signed_area(&polygon);
    if area < 0.0 {
        cycle.reverse();
        polygon.reverse();
        area = -area;
    }

    let bounds = BoundingBox::from_points(&polygon)?;
    let point_count = cycle.len();
    let first = *cycle.first()?;
    cycle.push(first);

    Some(BoundaryLoop {
        perimeter: perimeter(&polygon),
        signed_area: area,
        point_count,
        bounds,
        nodes: cycle,
        polygon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;
    use crate::snap::SnapResult;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    fn graph(nodes: Vec<Point2D>, endpoints: Vec<[usize; 2]>) -> WallGraph {
        WallGraph::build(
            &SnapResult { nodes, endpoints },
            GraphOptions {
                snap_tolerance: 0.5,
                split_t_junctions: true,
            },
        )
    }

    fn square() -> WallGraph {
        graph(
            vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)],
            vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        )
    }

    #[test]
    fn test_square_single_loop() {
        let result = trace_loops(&square(), 0.5);

        assert_eq!(result.loops.len(), 1);
        let boundary = &result.loops[0];
        assert_eq!(boundary.point_count, 4);
        assert_eq!(boundary.nodes.first(), boundary.nodes.last());
        assert!((boundary.perimeter - 40.0).abs() < 1e-9);
        assert!(boundary.signed_area > 0.0);
    }

    #[test]
    fn test_two_rooms_sharing_a_wall() {
        // 0---1---2
        // |   |   |
        // 5---4---3
        let g = graph(
            vec![
                p(0.0, 10.0),
                p(10.0, 10.0),
                p(20.0, 10.0),
                p(20.0, 0.0),
                p(10.0, 0.0),
                p(0.0, 0.0),
            ],
            vec![[0, 1], [1, 2], [2, 3], [3, 4], [4, 5], [5, 0], [1, 4]],
        );
        let result = trace_loops(&g, 0.5);

        // Two rooms plus the outer perimeter
        assert_eq!(result.loops.len(), 3);
        let mut areas: Vec<f64> = result.loops.iter().map(|l| l.area()).collect();
        areas.sort_by(f64::total_cmp);
        assert_eq!(areas, vec![100.0, 100.0, 200.0]);
    }

    #[test]
    fn test_no_duplicate_loops() {
        let result = trace_loops(&square(), 0.5);
        let keys: FxHashSet<Vec<usize>> = result
            .loops
            .iter()
            .map(|l| canonical_key(&l.nodes[..l.nodes.len() - 1]))
            .collect();
        assert_eq!(keys.len(), result.loops.len());
    }

    #[test]
    fn test_dangling_stub_ignored() {
        let g = graph(
            vec![
                p(0.0, 0.0),
                p(10.0, 0.0),
                p(10.0, 10.0),
                p(0.0, 10.0),
                p(14.0, 14.0),
            ],
            vec![[0, 1], [1, 2], [2, 3], [3, 0], [2, 4]],
        );
        let result = trace_loops(&g, 0.5);
        assert_eq!(result.loops.len(), 1);
        assert_eq!(result.loops[0].point_count, 4);
    }

    #[test]
    fn test_cycles_joined_by_bridge() {
        // Two triangles joined by a single edge 2-3
        let g = graph(
            vec![
                p(0.0, 0.0),
                p(4.0, 0.0),
                p(2.0, 3.0),
                p(10.0, 3.0),
                p(8.0, 6.0),
                p(12.0, 6.0),
            ],
            vec![[0, 1], [1, 2], [2, 0], [2, 3], [3, 5], [5, 4], [4, 3]],
        );
        let result = trace_loops(&g, 0.5);

        assert_eq!(result.loops.len(), 2);
        assert!(result.loops.iter().all(|l| l.point_count == 3));
        // The walk along both sides of the bridge collapses to a 2-node cycle
        assert!(result.stats.degenerate_loops >= 1);
    }

    #[test]
    fn test_crossing_without_node_is_self_intersecting() {
        // Bow-tie: edges 0-2 and 1-3 cross, left without a node there
        let snap = SnapResult {
            nodes: vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 4.0)],
            endpoints: vec![[0, 2], [2, 1], [1, 3], [3, 0]],
        };
        let unsplit = WallGraph::build(
            &snap,
            GraphOptions {
                snap_tolerance: 0.5,
                split_t_junctions: false,
            },
        );
        let result = trace_loops(&unsplit, 0.5);

        assert!(result.loops.is_empty());
        assert_eq!(result.stats.self_intersecting_loops, 1);

        // With splitting on, the crossing becomes a node shared by two triangles
        let split = graph(snap.nodes, snap.endpoints);
        let result = trace_loops(&split, 0.5);
        assert_eq!(result.loops.len(), 2);
        assert!(result.loops.iter().all(|l| l.point_count == 3));
    }

    #[test]
    fn test_split_simple_cycles_at_cut_vertex() {
        // Figure-eight walk through node 0
        let cycles = split_simple_cycles(&[0, 1, 2, 0, 3, 4]);
        assert_eq!(cycles, vec![vec![0, 1, 2], vec![0, 3, 4]]);
    }

    #[test]
    fn test_canonical_key_ignores_direction() {
        assert_eq!(canonical_key(&[3, 1, 2]), canonical_key(&[2, 1, 3]));
        assert_eq!(canonical_key(&[3, 1, 2]), vec![1, 2, 3]);
    }
}
