//! Spatial partitioning for proximity queries.
//!
//! Divides the plane into square cells and records which entities overlap
//! each cell, so radius and area queries only look at nearby cells instead of
//! every entity in the city.
//!
//! The grid does not watch the entity store. Callers register entities
//! explicitly and must re-register an entity after moving it; until then the
//! grid answers from the position it was last given.

use std::collections::{BTreeSet, HashMap};

use city_common::GridPosition;

use crate::components::EntityId;

/// Cell coordinates `(column, row)`.
pub type CellKey = (i32, i32);

/// What the grid remembers about a registered entity.
#[derive(Debug, Clone)]
struct Membership {
    position: GridPosition,
    cells: Vec<CellKey>,
}

/// Uniform grid index over entity rectangles.
#[derive(Debug)]
pub struct SpatialGrid {
    /// Cell side length in grid units.
    cell_size: i32,
    /// Cell -> entities whose rectangle spans it.
    cells: HashMap<CellKey, BTreeSet<EntityId>>,
    /// Reverse lookup: entity -> position and cells at registration time.
    entity_cells: HashMap<EntityId, Membership>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SpatialGrid {
    /// Create a grid with the given cell size (clamped to at least 1).
    pub fn new(cell_size: i32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> i32 {
        self.cell_size
    }

    /// Cell containing the grid coordinate `(x, y)`.
    #[inline]
    pub fn cell_of(&self, x: i32, y: i32) -> CellKey {
        (x.div_euclid(self.cell_size), y.div_euclid(self.cell_size))
    }

    /// Inclusive cell range `(min, max)` covered by a rectangle.
    fn cell_range(&self, position: &GridPosition) -> (CellKey, CellKey) {
        let size = i64::from(self.cell_size);
        let min = self.cell_of(position.x, position.y);
        // the far edge can sit past i32::MAX; no cell beyond it can be occupied
        let to_cell = |edge: i64| i32::try_from((edge - 1).div_euclid(size)).unwrap_or(i32::MAX);
        let max = (to_cell(position.right()), to_cell(position.bottom()));
        (min, max)
    }

    fn cells_spanned(&self, position: &GridPosition) -> Vec<CellKey> {
        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(position);
        let mut keys = Vec::new();
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                keys.push((cx, cy));
            }
        }
        keys
    }

    /// Ids registered in any cell of the inclusive range, each once.
    ///
    /// Walks the range cell by cell while it is smaller than the number of
    /// occupied cells, and the occupied cells otherwise, so a huge query on a
    /// sparse grid costs the occupancy rather than the area.
    fn candidates(&self, min: (i64, i64), max: (i64, i64)) -> BTreeSet<EntityId> {
        let span = |lo: i64, hi: i64| (i128::from(hi) - i128::from(lo) + 1).max(0) as u128;
        let range_cells = span(min.0, max.0).saturating_mul(span(min.1, max.1));

        let mut ids = BTreeSet::new();
        if range_cells > self.cells.len() as u128 {
            for (&(cx, cy), bucket) in &self.cells {
                let (cx, cy) = (i64::from(cx), i64::from(cy));
                if (min.0..=max.0).contains(&cx) && (min.1..=max.1).contains(&cy) {
                    ids.extend(bucket.iter().copied());
                }
            }
        } else {
            for cx in min.0..=max.0 {
                for cy in min.1..=max.1 {
                    let (Ok(cx), Ok(cy)) = (i32::try_from(cx), i32::try_from(cy)) else {
                        continue;
                    };
                    if let Some(bucket) = self.cells.get(&(cx, cy)) {
                        ids.extend(bucket.iter().copied());
                    }
                }
            }
        }
        ids
    }

    /// Register an entity under every cell its rectangle spans.
    ///
    /// Registering an id that is already present replaces its old cells.
    pub fn add_entity(&mut self, id: EntityId, position: GridPosition) {
        self.remove_entity(id);

        let cells = self.cells_spanned(&position);
        for key in &cells {
            self.cells.entry(*key).or_default().insert(id);
        }
        self.entity_cells.insert(id, Membership { position, cells });
    }

    /// Remove an entity from the grid. Unknown ids are ignored.
    pub fn remove_entity(&mut self, id: EntityId) {
        let Some(membership) = self.entity_cells.remove(&id) else {
            return;
        };
        for key in membership.cells {
            if let Some(bucket) = self.cells.get_mut(&key) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
    }

    /// Entities whose center lies within `radius` of `center`'s center.
    ///
    /// Measures centroid to centroid, which is close enough for small
    /// buildings. Results are deduplicated and sorted by id.
    pub fn entities_in_radius(&self, center: &GridPosition, radius: f64) -> Vec<EntityId> {
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let origin = center.center();
        let size = f64::from(self.cell_size);
        // float to int casts saturate, so an unbounded radius clamps to i64
        let min = (
            ((origin.x - radius) / size).floor() as i64,
            ((origin.y - radius) / size).floor() as i64,
        );
        let max = (
            ((origin.x + radius) / size).floor() as i64,
            ((origin.y + radius) / size).floor() as i64,
        );

        self.candidates(min, max)
            .into_iter()
            .filter(|id| {
                self.entity_cells
                    .get(id)
                    .is_some_and(|m| m.position.center().distance(origin) <= radius)
            })
            .collect()
    }

    /// Entities whose rectangle overlaps `area`, sorted by id.
    pub fn entities_in_area(&self, area: &GridPosition) -> Vec<EntityId> {
        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(area);
        self.candidates(
            (i64::from(min_x), i64::from(min_y)),
            (i64::from(max_x), i64::from(max_y)),
        )
        .into_iter()
        .filter(|id| {
            self.entity_cells
                .get(id)
                .is_some_and(|m| area.overlaps(&m.position))
        })
        .collect()
    }

    /// Entities registered under a single cell, sorted by id.
    pub fn entities_in_cell(&self, cx: i32, cy: i32) -> Vec<EntityId> {
        self.cells
            .get(&(cx, cy))
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Cells recorded for an entity at its last registration.
    pub fn cells_of(&self, id: EntityId) -> Option<&[CellKey]> {
        self.entity_cells.get(&id).map(|m| m.cells.as_slice())
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cells.clear();
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of registered entities.
    pub fn entity_count(&self) -> usize {
        self.entity_cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> GridPosition {
        GridPosition::new(x, y, w, h).unwrap()
    }

    #[test]
    fn wide_entity_spans_several_cells() {
        let mut grid = SpatialGrid::new(10);
        grid.add_entity(EntityId(1), rect(8, 8, 5, 5));

        let mut cells = grid.cells_of(EntityId(1)).unwrap().to_vec();
        cells.sort();
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(grid.cell_count(), 4);
        assert_eq!(grid.entities_in_cell(1, 1), vec![EntityId(1)]);
    }

    #[test]
    fn negative_coordinates_floor_correctly() {
        let grid = SpatialGrid::new(10);
        assert_eq!(grid.cell_of(-1, -10), (-1, -1));
        assert_eq!(grid.cell_of(-11, 9), (-2, 0));
    }

    #[test]
    fn remove_deletes_empty_buckets() {
        let mut grid = SpatialGrid::new(10);
        grid.add_entity(EntityId(1), rect(0, 0, 1, 1));
        grid.add_entity(EntityId(2), rect(1, 1, 1, 1));
        grid.remove_entity(EntityId(1));
        assert_eq!(grid.cell_count(), 1);
        grid.remove_entity(EntityId(2));
        assert_eq!(grid.cell_count(), 0);
        assert_eq!(grid.entity_count(), 0);

        // unknown ids are a no-op
        grid.remove_entity(EntityId(99));
    }

    #[test]
    fn radius_query_uses_centroids() {
        let mut grid = SpatialGrid::new(10);
        grid.add_entity(EntityId(1), rect(0, 0, 1, 1));
        grid.add_entity(EntityId(2), rect(14, 0, 1, 1));
        grid.add_entity(EntityId(3), rect(100, 100, 1, 1));

        let here = rect(0, 0, 1, 1);
        assert_eq!(grid.entities_in_radius(&here, 15.0), vec![EntityId(1), EntityId(2)]);
        assert_eq!(grid.entities_in_radius(&here, 5.0), vec![EntityId(1)]);
        assert!(grid.entities_in_radius(&here, -1.0).is_empty());
    }

    #[test]
    fn area_query_requires_true_overlap() {
        let mut grid = SpatialGrid::new(10);
        grid.add_entity(EntityId(1), rect(0, 0, 2, 2));
        grid.add_entity(EntityId(2), rect(2, 0, 2, 2));

        // same cell, but only touching the second entity's left edge
        assert_eq!(grid.entities_in_area(&rect(0, 0, 2, 2)), vec![EntityId(1)]);
        assert_eq!(
            grid.entities_in_area(&rect(1, 1, 2, 2)),
            vec![EntityId(1), EntityId(2)]
        );
    }

    #[test]
    fn grid_answers_from_last_registered_position() {
        let mut grid = SpatialGrid::new(10);
        grid.add_entity(EntityId(1), rect(0, 0, 1, 1));

        // entity moved but not re-registered: still found at the old spot
        assert_eq!(grid.entities_in_area(&rect(0, 0, 1, 1)), vec![EntityId(1)]);

        grid.add_entity(EntityId(1), rect(50, 50, 1, 1));
        assert!(grid.entities_in_area(&rect(0, 0, 1, 1)).is_empty());
        assert_eq!(grid.entities_in_area(&rect(50, 50, 1, 1)), vec![EntityId(1)]);
        assert_eq!(grid.cell_count(), 1);
    }

    #[test]
    fn huge_queries_on_a_sparse_grid_scan_only_occupied_cells() {
        let mut grid = SpatialGrid::new(1);
        grid.add_entity(EntityId(1), rect(0, 0, 1, 1));
        grid.add_entity(EntityId(2), rect(5_000, 5_000, 1, 1));
        grid.add_entity(EntityId(3), rect(-90_000, -90_000, 1, 1));

        let here = rect(0, 0, 1, 1);
        assert_eq!(
            grid.entities_in_radius(&here, 20_000.0),
            vec![EntityId(1), EntityId(2)]
        );
        assert_eq!(
            grid.entities_in_radius(&here, f64::INFINITY),
            vec![EntityId(1), EntityId(2), EntityId(3)]
        );
        assert_eq!(grid.entities_in_radius(&here, f64::MAX).len(), 3);

        let everywhere = rect(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(grid.entities_in_area(&everywhere), vec![EntityId(3)]);
        let whole_plane_right = rect(-1, -1, i32::MAX, i32::MAX);
        assert_eq!(
            grid.entities_in_area(&whole_plane_right),
            vec![EntityId(1), EntityId(2)]
        );
    }

    #[test]
    fn entity_at_the_coordinate_limit_is_indexed() {
        let mut grid = SpatialGrid::new(10);
        let far = rect(i32::MAX, i32::MAX, 1, 1);
        grid.add_entity(EntityId(1), far);

        assert_eq!(grid.cells_of(EntityId(1)).unwrap().len(), 1);
        assert_eq!(grid.entities_in_area(&far), vec![EntityId(1)]);
        assert_eq!(grid.entities_in_radius(&far, 0.0), vec![EntityId(1)]);
    }

    proptest! {
        #[test]
        fn registered_entity_is_found_until_removed(
            x in -200i32..200, y in -200i32..200, w in 1i32..30, h in 1i32..30, cell in 1i32..25,
        ) {
            let mut grid = SpatialGrid::new(cell);
            let position = rect(x, y, w, h);
            grid.add_entity(EntityId(1), position);
            prop_assert!(grid.entities_in_area(&position).contains(&EntityId(1)));
            prop_assert!(grid.entities_in_radius(&position, 0.0).contains(&EntityId(1)));

            grid.remove_entity(EntityId(1));
            prop_assert!(!grid.entities_in_area(&position).contains(&EntityId(1)));
            prop_assert_eq!(grid.cell_count(), 0);
        }
    }
}
