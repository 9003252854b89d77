// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index for tolerance-based point lookup.
//!
//! Uses a grid-based spatial hash for O(1) average-case neighbour queries.
//! Points are identified by the caller's integer ids; the index keeps its own
//! copy of their coordinates so it can be queried without the owning arena.

use rustc_hash::FxHashMap;

use crate::types::{BoundingBox, Point2D};

/// A spatial hash grid over 2D points.
///
/// The grid divides the plane into square cells of side `cell_size`. Queries
/// with a radius no larger than `cell_size` only need the 3x3 neighbourhood of
/// the query cell.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: FxHashMap<(i64, i64), Vec<usize>>,
    positions: FxHashMap<usize, Point2D>,
}

impl SpatialIndex {
    /// Creates a new spatial index with the given cell size.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(1e-12),
            grid: FxHashMap::default(),
            positions: FxHashMap::default(),
        }
    }

    /// Builds an index over `points`, using each point's slice index as its id.
    pub fn from_points(points: &[Point2D], cell_size: f64) -> Self {
        let mut index = Self::new(cell_size);
        for (id, p) in points.iter().enumerate() {
            index.insert(id, *p);
        }
        index
    }

    /// Inserts a point id at the given coordinates.
    pub fn insert(&mut self, id: usize, p: Point2D) {
        let cell = self.cell_coords(&p);
        self.grid.entry(cell).or_default().push(id);
        self.positions.insert(id, p);
    }

    /// Finds all ids within `tolerance` of `p`, in insertion order per cell.
    pub fn find_all_near(&self, p: &Point2D, tolerance: f64) -> Vec<usize> {
        let tol_sq = tolerance * tolerance;
        let reach = (tolerance / self.cell_size).ceil().max(1.0) as i64;
        let (cx, cy) = self.cell_coords(p);
        let mut result = Vec::new();

        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if let Some(ids) = self.grid.get(&(cx + dx, cy + dy)) {
                    for &id in ids {
                        if let Some(q) = self.positions.get(&id) {
                            if q.distance_sq_to(p) <= tol_sq {
                                result.push(id);
                            }
                        }
                    }
                }
            }
        }

        result
    }

    /// Finds all ids inside `bbox` (inclusive).
    pub fn find_in_box(&self, bbox: &BoundingBox) -> Vec<usize> {
        let (x0, y0) = self.cell_coords(&Point2D::new(bbox.min_x, bbox.min_y));
        let (x1, y1) = self.cell_coords(&Point2D::new(bbox.max_x, bbox.max_y));
        let mut result = Vec::new();

        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(ids) = self.grid.get(&(cx, cy)) {
                    for &id in ids {
                        if let Some(q) = self.positions.get(&id) {
                            if q.x >= bbox.min_x
                                && q.x <= bbox.max_x
                                && q.y >= bbox.min_y
                                && q.y <= bbox.max_y
                            {
                                result.push(id);
                            }
                        }
                    }
                }
            }
        }

        result
    }

    fn cell_coords(&self, p: &Point2D) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_index_find_all_near() {
        let points = vec![Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0)];
        let index = SpatialIndex::from_points(&points, 0.01);

        // Exact match
        assert_eq!(index.find_all_near(&Point2D::new(0.0, 0.0), 0.001), vec![0]);

        // Within tolerance
        assert_eq!(index.find_all_near(&Point2D::new(0.001, 0.0), 0.01), vec![0]);

        // Outside tolerance
        assert!(index.find_all_near(&Point2D::new(1.0, 0.0), 0.01).is_empty());
    }

    #[test]
    fn find_all_near_crosses_cell_borders() {
        // Straddles the cell boundary at x = 0
        let points = vec![Point2D::new(-0.004, 0.0), Point2D::new(0.004, 0.0)];
        let index = SpatialIndex::from_points(&points, 0.01);

        let near = index.find_all_near(&Point2D::new(-0.004, 0.0), 0.01);
        assert_eq!(near.len(), 2);
    }

    #[test]
    fn find_in_box() {
        let points = vec![
            Point2D::new(1.0, 1.0),
            Point2D::new(5.0, 5.0),
            Point2D::new(9.0, 1.0),
        ];
        let index = SpatialIndex::from_points(&points, 2.0);
        let bbox = BoundingBox::new(Point2D::new(0.0, 0.0), Point2D::new(6.0, 6.0));

        let mut found = index.find_in_box(&bbox);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn larger_radius_than_cell() {
        let points = vec![Point2D::new(0.0, 0.0), Point2D::new(3.0, 0.0)];
        let index = SpatialIndex::from_points(&points, 1.0);

        assert_eq!(index.find_all_near(&Point2D::new(0.0, 0.0), 3.5).len(), 2);
    }
}
