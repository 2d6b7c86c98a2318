//! Uniform spatial grid for collision broad-phase.
//!
//! The [`SpatialGrid`] divides the world into fixed-size cells and rebuilds
//! cell membership from scratch every tick — no incremental migration, so
//! grid content is only meaningful within the tick that built it. Cells hold
//! non-owning [`EntityId`]s; queries resolve them against the
//! [`EntityManager`](crate::manager::EntityManager) so despawned or
//! deactivated entities drop out of results without any grid bookkeeping.
//!
//! [`potential_collisions`](SpatialGrid::potential_collisions) is a
//! broad-phase filter only; [`check_collision`](SpatialGrid::check_collision)
//! is the narrow-phase AABB test. Boxes that merely touch at an edge do
//! **not** count as colliding.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::components::{Collision, Transform};
use crate::entity::{Entity, EntityId};
use crate::manager::EntityManager;

// ---------------------------------------------------------------------------
// GridStats
// ---------------------------------------------------------------------------

/// Diagnostic counters for the debug overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridStats {
    /// Cells with at least one entity after the last rebuild.
    pub occupied_cells: usize,
    /// Entities placed in the grid by the last rebuild.
    pub tracked_entities: usize,
    /// Lifetime count of broad-phase queries.
    pub queries: u64,
    /// Lifetime count of candidates returned by broad-phase queries.
    pub candidates: u64,
    /// Lifetime count of narrow-phase tests that reported an overlap.
    pub hits: u64,
}

// ---------------------------------------------------------------------------
// SpatialGrid
// ---------------------------------------------------------------------------

/// Grid-based spatial partition over a fixed world rectangle.
pub struct SpatialGrid {
    cell_size: f32,
    cols: i32,
    rows: i32,
    cells: HashMap<(i32, i32), Vec<EntityId>>,
    entity_cells: HashMap<EntityId, Vec<(i32, i32)>>,
    queries: u64,
    candidates: u64,
    hits: u64,
}

impl SpatialGrid {
    /// Build a grid covering `width` x `height` world units with square cells
    /// of `cell_size`.
    ///
    /// # Panics
    ///
    /// Non-positive or non-finite dimensions or cell size are a misconfigured
    /// system, not a runtime condition, and panic here.
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        assert!(
            width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0,
            "spatial grid dimensions must be positive and finite (got {width} x {height})"
        );
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "spatial grid cell size must be positive and finite (got {cell_size})"
        );
        Self {
            cell_size,
            cols: (width / cell_size) as i32 + 1,
            rows: (height / cell_size) as i32 + 1,
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
            queries: 0,
            candidates: 0,
            hits: 0,
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> i32 {
        self.cols
    }

    /// Number of rows.
    pub fn rows(&self) -> i32 {
        self.rows
    }

    /// Drop all cell membership. Counters are kept; they are lifetime totals.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cells.clear();
    }

    /// Rebuild cell membership from the current entity positions.
    ///
    /// Only active entities with both a transform and a collision extent are
    /// placed; anything else is simply absent from the grid and from all
    /// collision results. An entity is listed under every cell its box
    /// (centered at `position + offset`, sized by the collision extents)
    /// overlaps, and the exact cell set is recorded per entity for later
    /// lookups.
    pub fn update<'a, I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        self.clear();

        for entity in entities {
            if !entity.is_active() {
                continue;
            }
            let (Some(transform), Some(collision)) =
                (entity.get::<Transform>(), entity.get::<Collision>())
            else {
                continue;
            };

            let cx = transform.position.x + collision.offset.x;
            let cy = transform.position.y + collision.offset.y;
            let (min_col, max_col) =
                self.axis_range(cx - collision.width / 2.0, cx + collision.width / 2.0, self.cols);
            let (min_row, max_row) = self.axis_range(
                cy - collision.height / 2.0,
                cy + collision.height / 2.0,
                self.rows,
            );

            let id = entity.id();
            let mut occupied = Vec::new();
            for col in min_col..=max_col {
                for row in min_row..=max_row {
                    self.cells.entry((col, row)).or_default().push(id);
                    occupied.push((col, row));
                }
            }
            self.entity_cells.insert(id, occupied);
        }
    }

    /// Broad-phase query: every entity sharing at least one cell with
    /// `entity`, deduplicated, excluding `entity` itself and anything no
    /// longer tracked or active in `manager`.
    ///
    /// An entity absent from the grid (no transform/collision, inactive at
    /// rebuild time, or never rebuilt over) yields an empty list.
    pub fn potential_collisions(
        &mut self,
        entity: &Entity,
        manager: &EntityManager,
    ) -> Vec<EntityId> {
        self.queries += 1;

        let Some(occupied) = self.entity_cells.get(&entity.id()) else {
            return Vec::new();
        };

        let mut found: HashSet<EntityId> = HashSet::new();
        for cell in occupied {
            if let Some(ids) = self.cells.get(cell) {
                for &other in ids {
                    if other == entity.id() {
                        continue;
                    }
                    if manager.get_entity(other).is_some_and(|e| e.is_active()) {
                        found.insert(other);
                    }
                }
            }
        }

        self.candidates += found.len() as u64;
        found.into_iter().collect()
    }

    /// Narrow-phase AABB test.
    ///
    /// Boxes overlap iff their intervals overlap on *both* axes, strictly:
    /// edge-touching (zero-area overlap) is **not** a collision. Entities
    /// missing a transform or collision extent never collide.
    pub fn check_collision(&mut self, a: &Entity, b: &Entity) -> bool {
        let (Some(ta), Some(ca)) = (a.get::<Transform>(), a.get::<Collision>()) else {
            return false;
        };
        let (Some(tb), Some(cb)) = (b.get::<Transform>(), b.get::<Collision>()) else {
            return false;
        };

        let ax = ta.position.x + ca.offset.x;
        let ay = ta.position.y + ca.offset.y;
        let bx = tb.position.x + cb.offset.x;
        let by = tb.position.y + cb.offset.y;
        let overlap_x = (ax - bx).abs() * 2.0 < ca.width + cb.width;
        let overlap_y = (ay - by).abs() * 2.0 < ca.height + cb.height;

        let colliding = overlap_x && overlap_y;
        if colliding {
            self.hits += 1;
        }
        colliding
    }

    /// All active entities in cells overlapped by the axis-aligned box of
    /// half-width `radius` around `(x, y)`, deduplicated.
    ///
    /// Cell-granular, like the original: an entity in an overlapped cell is
    /// returned even if it sits slightly outside the exact circle.
    pub fn nearby(&self, x: f32, y: f32, radius: f32, manager: &EntityManager) -> Vec<EntityId> {
        let (min_col, max_col) = self.axis_range(x - radius, x + radius, self.cols);
        let (min_row, max_row) = self.axis_range(y - radius, y + radius, self.rows);

        let mut found: HashSet<EntityId> = HashSet::new();
        for col in min_col..=max_col {
            for row in min_row..=max_row {
                if let Some(ids) = self.cells.get(&(col, row)) {
                    for &id in ids {
                        if manager.get_entity(id).is_some_and(|e| e.is_active()) {
                            found.insert(id);
                        }
                    }
                }
            }
        }
        found.into_iter().collect()
    }

    /// Current diagnostic counters.
    pub fn stats(&self) -> GridStats {
        GridStats {
            occupied_cells: self.cells.len(),
            tracked_entities: self.entity_cells.len(),
            queries: self.queries,
            candidates: self.candidates,
            hits: self.hits,
        }
    }

    // -- internal helpers ---------------------------------------------------

    /// Inclusive cell range covered by `[min, max]` on one axis, clamped to
    /// `[0, cell_count - 1]`.
    fn axis_range(&self, min: f32, max: f32, cell_count: i32) -> (i32, i32) {
        let lo = ((min / self.cell_size).floor() as i32).clamp(0, cell_count - 1);
        let hi = ((max / self.cell_size).floor() as i32).clamp(0, cell_count - 1);
        (lo, hi)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
