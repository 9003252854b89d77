// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall boundary reconstruction from vector floor plans
//!
//! This crate turns the raw path commands of an architectural PDF page into
//! closed, labeled wall boundary polygons:
//! 1. Extracting wall-like straight segments from stroked primitives
//! 2. Snapping near-coincident endpoints into shared graph nodes
//! 3. Tracing the resulting wall graph into closed loops
//! 4. Classifying loops as exterior outer/inner, interior or garage walls
//! 5. Optionally reconciling the labels with external region hints
//!
//! # Usage
//!
//! ```rust,ignore
//! use ifc_lite_wall_boundary::{trace_boundaries, HintInput, TraceConfig, WallLabel};
//!
//! let output = trace_boundaries(&primitives, Some(&hints), &TraceConfig::default())?;
//!
//! if let Some(outer) = output.exterior_outer() {
//!     println!("outer perimeter: {:.1} pt", outer.perimeter);
//! }
//! for interior in output.with_label(WallLabel::Interior) {
//!     // ...
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod hints;
pub mod polygon_ops;
pub mod snap;
pub mod spatial;
pub mod tracer;
pub mod types;

pub use classifier::{building_bounds, classify_loops, Classification, PageContext};
pub use config::TraceConfig;
pub use error::{Error, Result};
pub use extract::{extract_segments, ExtractionResult, ExtractionStats};
pub use graph::{GraphOptions, WallGraph};
pub use hints::{apply_hints, HintOutcome};
pub use snap::{snap_points, snap_segments, SnapResult};
pub use tracer::{trace_loops, BoundaryLoop, TraceResult};
pub use types::{
    BoundingBox, ClassifiedBoundary, Diagnostics, Hint, HintInput, HintTransform, LabelSource,
    PageMetadata, PathCommand, Point2D, Primitive, Rgb, Segment, SegmentOrigin, TraceOutput,
    WallLabel,
};

/// Runs the full pipeline on one page
///
/// # Arguments
///
/// * `primitives` - Raw path commands of the page, in drawing order
/// * `hints` - Optional region hints and page metadata from the floor analysis
/// * `config` - Tolerances and thresholds
///
/// # Returns
///
/// The classified boundaries, the retained segments unmodified, the page
/// metadata and per-stage diagnostics. An empty or wall-free page yields an
/// empty output. The only error is an invalid `config`.
pub fn trace_boundaries(
    primitives: &[Primitive],
    hints: Option<&HintInput>,
    config: &TraceConfig,
) -> Result<TraceOutput> {
    config.validate()?;

    let ExtractionResult { segments, stats } = extract_segments(primitives, config);
    let metadata = hints.map(|h| h.metadata.clone());

    let Some(extent) = BoundingBox::from_points(segments.iter().flat_map(|s| [&s.start, &s.end]))
    else {
        tracing::info!(
            primitives = primitives.len(),
            "No wall segments on page"
        );
        return Ok(TraceOutput {
            metadata,
            diagnostics: Diagnostics {
                extraction: stats,
                ..Default::default()
            },
            ..Default::default()
        });
    };

    let snap = snap_segments(&segments, config.snap_tolerance);
    let graph = WallGraph::build(
        &snap,
        GraphOptions {
            snap_tolerance: config.snap_tolerance,
            split_t_junctions: config.split_t_junctions,
        },
    );
    let traced = trace_loops(&graph, config.snap_tolerance);

    let endpoints = segments.iter().flat_map(|s| [&s.start, &s.end]);
    let building = building_bounds(endpoints, config.outlier_percentile).unwrap_or(extent);
    let page = PageContext {
        extent,
        building,
        metadata: hints.map(|h| &h.metadata),
        transform: hints.map(|h| h.transform).unwrap_or_default(),
    };
    let Classification {
        mut boundaries,
        outer_spans_extent,
        inner_candidates,
    } = classify_loops(&traced.loops, &page, config);

    let outcome = match hints {
        Some(input) => apply_hints(&mut boundaries, input, config),
        None => HintOutcome::default(),
    };

    let graph_stats = graph.stats();
    let diagnostics = Diagnostics {
        extraction: stats,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        collapsed_segments: graph_stats.collapsed_segments,
        duplicate_edges: graph_stats.duplicate_edges,
        crossings: graph_stats.crossings,
        t_junction_splits: graph_stats.t_junction_splits,
        dangling_nodes: graph_stats.dangling_nodes,
        loops_traced: traced.stats.loops_traced,
        degenerate_loops: traced.stats.degenerate_loops,
        self_intersecting_loops: traced.stats.self_intersecting_loops,
        outer_spans_extent,
        inner_candidates,
        hints_applied: outcome.applied,
        hints_ignored: outcome.ignored,
    };

    tracing::info!(
        primitives = primitives.len(),
        segments = segments.len(),
        nodes = diagnostics.node_count,
        boundaries = boundaries.len(),
        hints_applied = outcome.applied,
        "Traced wall boundaries"
    );

    Ok(TraceOutput {
        boundaries,
        segments,
        metadata,
        diagnostics,
    })
}
