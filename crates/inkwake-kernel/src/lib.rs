//! Inkwake Kernel -- entity lifecycle, spatial partitioning and object pools
//! for a 2D arcade simulation.
//!
//! This crate is the simulation core: it owns the entities, decides when the
//! entity set may change, answers "what is near what", and recycles
//! short-lived objects. It deliberately knows nothing about rendering
//! backends, input, audio or scene flow; those layers drive the kernel and
//! consume its queries.
//!
//! The central discipline is *deferred mutation*: entity additions and
//! removals requested at any point during a tick are queued and applied only
//! at fixed flush points inside [`EntityManager::update`](manager::EntityManager::update),
//! so gameplay code may spawn and destroy freely while the entity set is
//! being iterated.
//!
//! # Quick Start
//!
//! ```
//! use inkwake_kernel::prelude::*;
//!
//! let mut manager = EntityManager::new();
//!
//! let mut ship = Entity::new("player_ship");
//! ship.add_component(Box::new(Transform::at(400.0, 300.0)));
//! ship.add_component(Box::new(Physics::new()));
//! ship.add_component(Box::new(Collision::new(32.0, 32.0)));
//! ship.add_tag("player");
//! let ship_id = manager.add_entity(ship);
//!
//! // Additions are deferred: the ship joins the world at the next update.
//! assert!(manager.get_entity(ship_id).is_none());
//! manager.update(1.0 / 60.0);
//! assert!(manager.get_entity(ship_id).is_some());
//!
//! // Rebuild the broad-phase and ask who is near the ship.
//! let mut grid = SpatialGrid::new(800.0, 600.0, 100.0);
//! grid.update(manager.entities());
//! let ship = manager.get_entity(ship_id).unwrap();
//! assert!(grid.potential_collisions(ship, &manager).is_empty());
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod components;
pub mod entity;
pub mod grid;
pub mod manager;
pub mod pool;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentBase, ComponentKind, TypedComponent};
    pub use crate::components::{
        Collision, InkColor, InkSlime, Physics, Transform, Vec2,
    };
    pub use crate::entity::{Entity, EntityId};
    pub use crate::grid::{GridStats, SpatialGrid};
    pub use crate::manager::EntityManager;
    pub use crate::pool::{ObjectPool, PoolStats, ProjectilePool, PROJECTILE_SPEED};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
