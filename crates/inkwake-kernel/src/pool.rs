//! Object pooling: a generic value pool and the per-color projectile pool.
//!
//! [`ObjectPool`] recycles arbitrary values through factory and reset
//! closures. [`ProjectilePool`] is the specialized variant the game actually
//! runs on: it keeps one sub-pool of pooled *entities* per [`InkColor`], so a
//! burst of red ink never steals capacity from the purple sub-pool.
//!
//! Pooled entities are owned by the [`EntityManager`] like any other entity;
//! the pool tracks ids only. Every operation that touches entity state
//! therefore takes the manager as an explicit parameter. Released projectiles
//! stay alive but deactivated, parked far outside the playfield, invisible to
//! the spatial grid and the update pass until reacquired.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::components::{Collision, InkColor, InkSlime, Physics, Transform, Vec2};
use crate::entity::{Entity, EntityId};
use crate::manager::EntityManager;

/// Speed applied to a projectile's velocity on acquisition, units per second.
pub const PROJECTILE_SPEED: f32 = 300.0;

/// Off-screen parking spot for released projectiles.
pub const PARK_POSITION: Vec2 = Vec2 {
    x: -1000.0,
    y: -1000.0,
};

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Occupancy counters for one pool (or one projectile sub-pool).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStats {
    /// Objects currently handed out.
    pub active_count: usize,
    /// Objects parked and ready for reuse.
    pub inactive_count: usize,
    /// `active_count + inactive_count`.
    pub total_count: usize,
    /// High-water mark of `active_count`.
    pub peak_active_count: usize,
    /// Objects ever built by the factory, including pre-warmed ones.
    pub total_created: usize,
}

// ---------------------------------------------------------------------------
// ObjectPool
// ---------------------------------------------------------------------------

/// A grow-only pool of reusable values.
///
/// `get` prefers a recycled value and falls back to the factory; the pool
/// never shrinks. `release` runs the reset closure exactly once per recycle,
/// so a value acquired, released, and acquired again has been reset exactly
/// once in between. `T` is expected to be a cheap handle (an id, an index, a
/// small struct): the pool keeps the canonical value and hands out clones.
pub struct ObjectPool<T: Clone + PartialEq> {
    factory: Box<dyn FnMut() -> T>,
    reset: Box<dyn FnMut(&mut T)>,
    active: Vec<T>,
    inactive: Vec<T>,
    peak_active: usize,
    total_created: usize,
}

impl<T: Clone + PartialEq> ObjectPool<T> {
    /// Empty pool over the given factory and reset closures.
    pub fn new(factory: Box<dyn FnMut() -> T>, reset: Box<dyn FnMut(&mut T)>) -> Self {
        Self {
            factory,
            reset,
            active: Vec::new(),
            inactive: Vec::new(),
            peak_active: 0,
            total_created: 0,
        }
    }

    /// Build `count` values up front so the first `count` acquisitions hit
    /// the recycle path.
    pub fn prewarm(&mut self, count: usize) {
        for _ in 0..count {
            let value = (self.factory)();
            self.total_created += 1;
            self.inactive.push(value);
        }
    }

    /// Acquire a value, recycling if possible.
    pub fn get(&mut self) -> T {
        let value = match self.inactive.pop() {
            Some(value) => value,
            None => {
                self.total_created += 1;
                (self.factory)()
            }
        };
        self.active.push(value.clone());
        self.peak_active = self.peak_active.max(self.active.len());
        value
    }

    /// Return a value to the pool.
    ///
    /// The value is reset and parked for reuse. Releasing a value the pool
    /// did not hand out (or releasing twice) is a logged no-op, never a
    /// panic and never a double-insert.
    pub fn release(&mut self, value: T) {
        let Some(index) = self.active.iter().position(|v| *v == value) else {
            debug!("release of a value this pool does not own; ignoring");
            return;
        };
        let mut value = self.active.swap_remove(index);
        (self.reset)(&mut value);
        self.inactive.push(value);
    }

    /// Return every outstanding value at once.
    pub fn release_all(&mut self) {
        while let Some(mut value) = self.active.pop() {
            (self.reset)(&mut value);
            self.inactive.push(value);
        }
    }

    /// Current occupancy counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active_count: self.active.len(),
            inactive_count: self.inactive.len(),
            total_count: self.active.len() + self.inactive.len(),
            peak_active_count: self.peak_active,
            total_created: self.total_created,
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectilePool
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Partition {
    active: Vec<EntityId>,
    inactive: Vec<EntityId>,
    peak_active: usize,
    total_created: usize,
}

/// Per-color pool of ink projectile entities.
///
/// Each [`InkColor`] owns an isolated sub-pool; ids never migrate between
/// colors. The factory builds a fresh, deactivated, parked projectile entity
/// for a color; the default factory produces the standard loadout of
/// transform, physics, collision box and ink payload, plus a `projectile`
/// tag.
pub struct ProjectilePool {
    factory: Box<dyn FnMut(InkColor) -> Entity>,
    partitions: HashMap<InkColor, Partition>,
}

impl ProjectilePool {
    /// Pool over the standard projectile loadout.
    pub fn new() -> Self {
        Self::with_factory(Box::new(default_projectile))
    }

    /// Pool over a custom projectile factory.
    ///
    /// The factory must return a *deactivated* entity carrying at least an
    /// [`InkSlime`] of the requested color; the pool relies on that component
    /// to route releases back to the right sub-pool.
    pub fn with_factory(factory: Box<dyn FnMut(InkColor) -> Entity>) -> Self {
        let partitions = InkColor::ALL
            .iter()
            .map(|&color| (color, Partition::default()))
            .collect();
        Self { factory, partitions }
    }

    /// Spawn `per_color` parked projectiles for every color into `manager`.
    ///
    /// The entities join the manager's table at its next update flush and
    /// become reusable from then on; acquisitions made before that flush
    /// build fresh entities rather than touching queued ones.
    pub fn prewarm(&mut self, manager: &mut EntityManager, per_color: usize) {
        for &color in &InkColor::ALL {
            for _ in 0..per_color {
                let entity = (self.factory)(color);
                let id = manager.add_entity(entity);
                let partition = self.partition_mut(color);
                partition.total_created += 1;
                partition.inactive.push(id);
            }
        }
        debug!(per_color, "projectile pool pre-warmed");
    }

    /// Acquire a projectile of `color` at `(x, y)` flying along `direction`.
    ///
    /// Reuses a parked entity when one is available, otherwise builds a new
    /// one and hands it to the manager. `direction` is normalized before the
    /// speed is applied; a zero direction yields a parked-in-place,
    /// motionless but active projectile.
    pub fn get_projectile(
        &mut self,
        manager: &mut EntityManager,
        x: f32,
        y: f32,
        direction: Vec2,
        color: InkColor,
    ) -> EntityId {
        let velocity = direction.normalized() * PROJECTILE_SPEED;

        // Parked ids whose entity was destroyed behind the pool's back are
        // skipped, not resurrected. Ids still sitting in the manager's add
        // queue (a prewarm this tick) are not addressable yet; they go back
        // in the pool.
        let partition = self.partitions.get_mut(&color).expect("all colors seeded");
        let mut reused = None;
        let mut still_pending = Vec::new();
        while let Some(id) = partition.inactive.pop() {
            if let Some(entity) = manager.get_entity_mut(id) {
                arm(entity, x, y, velocity);
                reused = Some(id);
                break;
            }
            if manager.is_pending(id) {
                still_pending.push(id);
            }
        }
        partition.inactive.extend(still_pending);

        let id = match reused {
            Some(id) => {
                trace!(%id, color = %color, "projectile reused");
                id
            }
            None => {
                // Pending entities are not reachable through the manager yet,
                // so the miss path configures the entity before handing it
                // over.
                let mut entity = (self.factory)(color);
                arm(&mut entity, x, y, velocity);
                let id = manager.add_entity(entity);
                let partition = self.partition_mut(color);
                partition.total_created += 1;
                trace!(%id, color = %color, "projectile pool grew");
                id
            }
        };

        let partition = self.partition_mut(color);
        partition.active.push(id);
        partition.peak_active = partition.peak_active.max(partition.active.len());
        id
    }

    /// Park an outstanding projectile for reuse.
    ///
    /// The sub-pool is resolved from the entity's own [`InkSlime`] color
    /// (falling back to the default color if the component is gone). Ids the
    /// pool never handed out, or already-parked ids, are a logged no-op.
    pub fn release_projectile(&mut self, manager: &mut EntityManager, id: EntityId) {
        let Some(entity) = manager.get_entity_mut(id) else {
            debug!(%id, "release of an unknown projectile entity; ignoring");
            return;
        };
        let color = entity.get::<InkSlime>().map(|s| s.color).unwrap_or_default();

        let partition = self.partition_mut(color);
        let Some(index) = partition.active.iter().position(|&a| a == id) else {
            debug!(%id, color = %color, "release of a projectile this pool does not own; ignoring");
            return;
        };
        partition.active.swap_remove(index);

        park(entity);
        partition.inactive.push(id);
        trace!(%id, color = %color, "projectile parked");
    }

    /// Park every outstanding projectile whose lifetime has run out.
    ///
    /// Returns the number of projectiles released.
    pub fn release_expired(&mut self, manager: &mut EntityManager) -> usize {
        let mut expired = Vec::new();
        for partition in self.partitions.values() {
            for &id in &partition.active {
                if manager
                    .get_entity(id)
                    .and_then(|e| e.get::<InkSlime>())
                    .is_some_and(InkSlime::is_expired)
                {
                    expired.push(id);
                }
            }
        }
        for &id in &expired {
            self.release_projectile(manager, id);
        }
        expired.len()
    }

    /// Occupancy counters for one color's sub-pool.
    pub fn stats(&self, color: InkColor) -> PoolStats {
        let partition = &self.partitions[&color];
        PoolStats {
            active_count: partition.active.len(),
            inactive_count: partition.inactive.len(),
            total_count: partition.active.len() + partition.inactive.len(),
            peak_active_count: partition.peak_active,
            total_created: partition.total_created,
        }
    }

    /// Occupancy counters for every color.
    pub fn all_stats(&self) -> HashMap<InkColor, PoolStats> {
        InkColor::ALL
            .iter()
            .map(|&color| (color, self.stats(color)))
            .collect()
    }

    fn partition_mut(&mut self, color: InkColor) -> &mut Partition {
        self.partitions.get_mut(&color).expect("all colors seeded")
    }
}

impl Default for ProjectilePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard projectile loadout, deactivated and parked.
fn default_projectile(color: InkColor) -> Entity {
    let mut entity = Entity::new(format!("projectile_{color}"));
    entity.add_component(Box::new(Transform::at(PARK_POSITION.x, PARK_POSITION.y)));
    entity.add_component(Box::new(Physics::new()));
    entity.add_component(Box::new(Collision::new(16.0, 16.0)));
    entity.add_component(Box::new(InkSlime::new(color)));
    entity.add_tag("projectile");
    entity.set_active(false);
    entity
}

/// Put a pooled entity into flight.
fn arm(entity: &mut Entity, x: f32, y: f32, velocity: Vec2) {
    entity.set_active(true);
    if let Some(transform) = entity.get_mut::<Transform>() {
        transform.set_position(x, y);
    }
    if let Some(physics) = entity.get_mut::<Physics>() {
        physics.velocity = velocity;
        physics.acceleration = Vec2::ZERO;
    }
    if let Some(slime) = entity.get_mut::<InkSlime>() {
        slime.age = 0.0;
    }
}

/// Park a pooled entity off-screen and strip its motion.
fn park(entity: &mut Entity) {
    entity.set_active(false);
    if let Some(transform) = entity.get_mut::<Transform>() {
        transform.set_position(PARK_POSITION.x, PARK_POSITION.y);
    }
    if let Some(physics) = entity.get_mut::<Physics>() {
        physics.velocity = Vec2::ZERO;
        physics.acceleration = Vec2::ZERO;
    }
    if let Some(slime) = entity.get_mut::<InkSlime>() {
        slime.age = 0.0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const DT: f32 = 1.0 / 60.0;

    // -- generic pool --------------------------------------------------------

    fn counting_pool() -> (ObjectPool<u32>, Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let made = Rc::new(Cell::new(0));
        let resets = Rc::new(Cell::new(0));
        let made2 = Rc::clone(&made);
        let resets2 = Rc::clone(&resets);
        let pool = ObjectPool::new(
            Box::new(move || {
                made2.set(made2.get() + 1);
                made2.get()
            }),
            Box::new(move |_| resets2.set(resets2.get() + 1)),
        );
        (pool, made, resets)
    }

    #[test]
    fn get_reuses_released_value() {
        let (mut pool, made, resets) = counting_pool();
        let first = pool.get();
        pool.release(first);
        let second = pool.get();

        assert_eq!(first, second);
        assert_eq!(made.get(), 1);
        assert_eq!(resets.get(), 1);
    }

    #[test]
    fn pool_grows_when_empty() {
        let (mut pool, made, _) = counting_pool();
        let a = pool.get();
        let b = pool.get();
        assert_ne!(a, b);
        assert_eq!(made.get(), 2);
        assert_eq!(pool.stats().active_count, 2);
        assert_eq!(pool.stats().total_created, 2);
    }

    #[test]
    fn foreign_release_is_ignored() {
        let (mut pool, _, resets) = counting_pool();
        pool.release(99);
        assert_eq!(resets.get(), 0);
        assert_eq!(pool.stats().inactive_count, 0);
    }

    #[test]
    fn double_release_is_ignored() {
        let (mut pool, _, resets) = counting_pool();
        let v = pool.get();
        pool.release(v);
        pool.release(v);
        assert_eq!(resets.get(), 1);
        assert_eq!(pool.stats().inactive_count, 1);
    }

    #[test]
    fn prewarm_fills_inactive_without_activating() {
        let (mut pool, made, _) = counting_pool();
        pool.prewarm(3);

        let stats = pool.stats();
        assert_eq!(made.get(), 3);
        assert_eq!(stats.inactive_count, 3);
        assert_eq!(stats.active_count, 0);

        pool.get();
        assert_eq!(made.get(), 3);
    }

    #[test]
    fn release_all_parks_everything() {
        let (mut pool, _, resets) = counting_pool();
        pool.get();
        pool.get();
        pool.get();
        pool.release_all();

        let stats = pool.stats();
        assert_eq!(stats.active_count, 0);
        assert_eq!(stats.inactive_count, 3);
        assert_eq!(stats.peak_active_count, 3);
        assert_eq!(resets.get(), 3);
    }

    // -- projectile pool -----------------------------------------------------

    #[test]
    fn acquired_projectile_is_armed() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let id = pool.get_projectile(&mut mgr, 40.0, 60.0, Vec2::new(1.0, 0.0), InkColor::Red);
        mgr.update(DT);

        let entity = mgr.get_entity(id).unwrap();
        assert!(entity.is_active());
        assert!(entity.has_tag("projectile"));

        let transform = entity.get::<Transform>().unwrap();
        // One tick of drift at most has not happened: the manager does not
        // apply velocity to transforms itself.
        assert_eq!((transform.position.x, transform.position.y), (40.0, 60.0));

        let physics = entity.get::<Physics>().unwrap();
        assert!((physics.velocity.x - PROJECTILE_SPEED).abs() < 1e-3);
        assert_eq!(entity.get::<InkSlime>().unwrap().color, InkColor::Red);
    }

    #[test]
    fn direction_is_normalized_before_speed() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let id = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(0.0, 10.0), InkColor::Green);
        mgr.update(DT);

        let physics = mgr.get_entity(id).unwrap().get::<Physics>().unwrap();
        assert!((physics.velocity.length() - PROJECTILE_SPEED).abs() < 1e-3);
        assert_eq!(physics.velocity.x, 0.0);
    }

    #[test]
    fn release_parks_and_reuse_returns_same_entity() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let id = pool.get_projectile(&mut mgr, 10.0, 10.0, Vec2::new(1.0, 0.0), InkColor::Purple);
        mgr.update(DT);
        pool.release_projectile(&mut mgr, id);

        let parked = mgr.get_entity(id).unwrap();
        assert!(!parked.is_active());
        let transform = parked.get::<Transform>().unwrap();
        assert_eq!(transform.position, PARK_POSITION);
        assert_eq!(parked.get::<Physics>().unwrap().velocity, Vec2::ZERO);

        let again = pool.get_projectile(&mut mgr, 5.0, 5.0, Vec2::new(0.0, 1.0), InkColor::Purple);
        assert_eq!(again, id);
        assert_eq!(mgr.get_entity(id).unwrap().get::<InkSlime>().unwrap().age, 0.0);
    }

    #[test]
    fn colors_draw_from_isolated_partitions() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let red = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Red);
        mgr.update(DT);
        pool.release_projectile(&mut mgr, red);

        // A parked red projectile must not satisfy a green request.
        let green = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Green);
        assert_ne!(green, red);
        assert_eq!(pool.stats(InkColor::Red).inactive_count, 1);
        assert_eq!(pool.stats(InkColor::Green).active_count, 1);
    }

    #[test]
    fn prewarm_spawns_parked_entities_per_color() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();
        pool.prewarm(&mut mgr, 2);
        mgr.update(DT);

        assert_eq!(mgr.entity_count(), 2 * InkColor::ALL.len());
        assert_eq!(mgr.active_entity_count(), 0);
        for &color in &InkColor::ALL {
            let stats = pool.stats(color);
            assert_eq!(stats.inactive_count, 2);
            assert_eq!(stats.total_created, 2);
        }

        // The next acquisition reuses instead of growing.
        pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Rainbow);
        assert_eq!(pool.stats(InkColor::Rainbow).total_created, 2);
    }

    #[test]
    fn foreign_and_double_release_are_ignored() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let stray = mgr.add_entity(Entity::new("stray"));
        mgr.update(DT);
        pool.release_projectile(&mut mgr, stray);
        assert_eq!(pool.stats(InkColor::DarkBlue).inactive_count, 0);

        let id = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Red);
        mgr.update(DT);
        pool.release_projectile(&mut mgr, id);
        pool.release_projectile(&mut mgr, id);
        assert_eq!(pool.stats(InkColor::Red).inactive_count, 1);
    }

    #[test]
    fn destroyed_parked_id_is_skipped_not_resurrected() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let id = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Red);
        mgr.update(DT);
        pool.release_projectile(&mut mgr, id);
        mgr.remove_entity(id);
        mgr.update(DT);

        let next = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Red);
        assert_ne!(next, id);
        assert_eq!(pool.stats(InkColor::Red).total_created, 2);
    }

    #[test]
    fn release_expired_parks_only_aged_out_projectiles() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let old = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Red);
        let fresh = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::Green);
        mgr.update(DT);

        mgr.get_entity_mut(old)
            .unwrap()
            .get_mut::<InkSlime>()
            .unwrap()
            .age = 6.0;

        assert_eq!(pool.release_expired(&mut mgr), 1);
        assert!(!mgr.get_entity(old).unwrap().is_active());
        assert!(mgr.get_entity(fresh).unwrap().is_active());
    }

    #[test]
    fn peak_active_tracks_high_water_mark() {
        let mut mgr = EntityManager::new();
        let mut pool = ProjectilePool::new();

        let a = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::DarkBlue);
        let b = pool.get_projectile(&mut mgr, 0.0, 0.0, Vec2::new(1.0, 0.0), InkColor::DarkBlue);
        mgr.update(DT);
        pool.release_projectile(&mut mgr, a);
        pool.release_projectile(&mut mgr, b);

        let stats = pool.stats(InkColor::DarkBlue);
        assert_eq!(stats.active_count, 0);
        assert_eq!(stats.peak_active_count, 2);
        assert_eq!(stats.total_count, 2);
    }
}
