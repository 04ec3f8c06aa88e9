//! Spatial grid partitioning for efficient neighbor queries.
//!
//! This module provides O(1) cell lookup and O(K) neighbor queries where K is
//! the average neighbors per cell, replacing O(N²) brute-force iteration over
//! the body roster.
//!
//! ## Cell Size Choice
//!
//! Cell size (`GRID_CELL_SIZE` in `constants.rs`) is 2000 units — equal to the
//! ship sight range — so a fixed 3×3 neighbourhood covers every query the
//! collision and AI phases make.  Planets are deliberately NOT queried through
//! the grid: at up to 3000 units radius they span many cells, so the collision
//! phase matches them pairwise against a snapshot instead.
//!
//! The grid is rebuilt from scratch every frame.  Occupancy changes every
//! frame anyway, so incremental maintenance would cost more than it saves.

use crate::body::CelestialBody;
use crate::config::SimConfig;
use bevy::prelude::*;
use std::collections::HashMap;

/// Resource holding the spatial grid for this frame.
///
/// Only interaction-plane bodies (`z < 0.5`) are inserted; background bodies
/// neither collide nor attract and would only pad the buckets.
#[derive(Resource, Debug, Clone, Default)]
pub struct SpatialGrid {
    /// Map from cell coordinates to entity list
    cells: HashMap<(i32, i32), Vec<Entity>>,
    cell_size: f32,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cells: HashMap::default(),
            cell_size,
        }
    }

    /// Compute grid cell coordinates for a world position
    fn world_to_cell(&self, pos: Vec2) -> (i32, i32) {
        let x = (pos.x / self.cell_size).floor() as i32;
        let y = (pos.y / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Insert an entity at a position. Call after clear() for bulk rebuild.
    pub fn insert(&mut self, entity: Entity, pos: Vec2) {
        let cell = self.world_to_cell(pos);
        self.cells.entry(cell).or_default().push(entity);
    }

    /// Clear all grid data (call before each frame rebuild)
    pub fn clear(&mut self) {
        // Retain allocations but clear contents to avoid re-allocating Vec capacity
        for v in self.cells.values_mut() {
            v.clear();
        }
        // Remove cells that are now empty to avoid iterating them next frame
        self.cells.retain(|_, v| !v.is_empty());
    }

    /// All entities in the 3×3 cell neighbourhood of `pos`.
    ///
    /// Note: results include entities further than one cell size away — callers
    /// must do the exact distance check themselves (the grid is a conservative
    /// over-approximation).
    pub fn neighbors(&self, pos: Vec2) -> Vec<Entity> {
        let cell = self.world_to_cell(pos);
        let mut out = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(entities) = self.cells.get(&(cell.0 + dx, cell.1 + dy)) {
                    out.extend_from_slice(entities);
                }
            }
        }
        out
    }

    /// Same as [`neighbors`](Self::neighbors) but excluding `entity` itself.
    pub fn neighbors_excluding(&self, entity: Entity, pos: Vec2) -> Vec<Entity> {
        let cell = self.world_to_cell(pos);
        let mut out = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(entities) = self.cells.get(&(cell.0 + dx, cell.1 + dy)) {
                    for &e in entities {
                        if e != entity {
                            out.push(e);
                        }
                    }
                }
            }
        }
        out
    }
}

/// System to rebuild the spatial grid each frame.
/// Must run AFTER body integration and BEFORE collision resolution and AI.
pub fn rebuild_spatial_grid_system(
    mut grid: ResMut<SpatialGrid>,
    config: Res<SimConfig>,
    query: Query<(Entity, &CelestialBody)>,
) {
    if grid.cell_size != config.grid_cell_size {
        grid.cell_size = config.grid_cell_size;
        grid.cells.clear();
    }
    grid.clear();

    for (entity, body) in query.iter() {
        if body.z < 0.5 {
            grid.insert(entity, body.pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_entities() -> (Entity, Entity) {
        let mut world = World::new();
        (world.spawn_empty().id(), world.spawn_empty().id())
    }

    #[test]
    fn neighbors_cross_cell_boundaries() {
        // Two points within one cell size of each other, straddling a boundary:
        // each must see the other (no false negatives).
        let mut grid = SpatialGrid::new(2000.0);
        let (a, b) = two_entities();
        let pa = Vec2::new(1999.0, 0.0);
        let pb = Vec2::new(2001.0, 0.0);
        grid.insert(a, pa);
        grid.insert(b, pb);

        assert!(grid.neighbors_excluding(a, pa).contains(&b));
        assert!(grid.neighbors_excluding(b, pb).contains(&a));
    }

    #[test]
    fn diagonal_neighbors_within_chebyshev_one_are_found() {
        let mut grid = SpatialGrid::new(2000.0);
        let (a, b) = two_entities();
        let pa = Vec2::new(-10.0, -10.0);
        let pb = Vec2::new(10.0, 10.0);
        grid.insert(a, pa);
        grid.insert(b, pb);

        assert!(grid.neighbors_excluding(a, pa).contains(&b));
    }

    #[test]
    fn far_entities_are_not_returned() {
        let mut grid = SpatialGrid::new(2000.0);
        let (a, b) = two_entities();
        grid.insert(a, Vec2::ZERO);
        grid.insert(b, Vec2::new(9000.0, 9000.0));

        assert!(!grid.neighbors_excluding(a, Vec2::ZERO).contains(&b));
    }

    #[test]
    fn clear_retains_no_stale_entries() {
        let mut grid = SpatialGrid::new(2000.0);
        let (a, _) = two_entities();
        grid.insert(a, Vec2::ZERO);
        grid.clear();
        assert!(grid.neighbors(Vec2::ZERO).is_empty());
    }

    #[test]
    fn negative_coordinates_bucket_correctly() {
        let mut grid = SpatialGrid::new(2000.0);
        let (a, _) = two_entities();
        // floor(-1.0 / 2000.0) = -1, not 0: a body just left of the origin must
        // still be visible from a query just right of it.
        let pa = Vec2::new(-1.0, -1.0);
        grid.insert(a, pa);
        assert!(grid.neighbors(Vec2::new(1.0, 1.0)).contains(&a));
    }
}
