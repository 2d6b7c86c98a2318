//! Entity lifecycle, the authoritative entity table, and tag-indexed queries.
//!
//! The [`EntityManager`] exclusively owns every tracked entity. Mutations of
//! the entity *set* are deferred: [`add_entity`](EntityManager::add_entity)
//! and [`remove_entity`](EntityManager::remove_entity) only enqueue, and the
//! queues are flushed at fixed points inside [`update`](EntityManager::update).
//! That discipline is what makes "mutate the set while iterating it" safe in a
//! single-threaded tick without locks, and it gives queries a precise
//! visibility contract:
//!
//! - an entity added this tick is **invisible** to queries until the next
//!   update's add flush;
//! - an entity destroyed this tick stays **visible** to queries until the
//!   remove flush at the end of that update.
//!
//! Both sides of that contract are load-bearing; gameplay code schedules work
//! around them.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::component::ComponentKind;
use crate::components::Transform;
use crate::entity::{Entity, EntityId};

// ---------------------------------------------------------------------------
// EntityManager
// ---------------------------------------------------------------------------

/// Owns the authoritative entity table, the tag index, and the deferred
/// add/remove queues.
///
/// The tag index maps each tag to the set of tracked entity ids carrying it.
/// It may lag the table mid-tick but is reconciled at every flush; tag edits
/// on tracked entities must go through [`add_tag`](EntityManager::add_tag) /
/// [`remove_tag`](EntityManager::remove_tag) so index and entity never drift
/// across a tick boundary.
pub struct EntityManager {
    entities: HashMap<EntityId, Entity>,
    pending_add: Vec<Entity>,
    pending_remove: Vec<EntityId>,
    tag_index: HashMap<String, HashSet<EntityId>>,
}

impl EntityManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            tag_index: HashMap::new(),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Submit an entity for tracking. Deferred: the entity joins the
    /// authoritative table at the next update's add flush and is invisible to
    /// queries until then. Returns the entity's id as a handle.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        self.pending_add.push(entity);
        id
    }

    /// Request removal of a tracked entity. Deferred: the entity leaves the
    /// table at the next remove flush. Unknown ids are silently ignored.
    ///
    /// Prefer destroying the entity (via
    /// [`Entity::destroy`](crate::entity::Entity::destroy)) when components
    /// should release resources immediately; the remove flush destroys popped
    /// entities anyway, so `on_remove` fires on this path too, just later.
    pub fn remove_entity(&mut self, id: EntityId) {
        if self.entities.contains_key(&id) {
            self.pending_remove.push(id);
        }
    }

    /// Advance the simulation by one tick.
    ///
    /// Fixed order: flush pending adds, update a snapshot of the current
    /// entities, flush pending removes. An entity that marks itself for
    /// destruction during its own update (or was marked between ticks) is
    /// enqueued right after its update returns and is gone from table and tag
    /// index by the time this call returns.
    pub fn update(&mut self, dt: f32) {
        self.flush_additions();

        let snapshot: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in snapshot {
            if let Some(entity) = self.entities.get_mut(&id) {
                if entity.is_active() && !entity.is_marked_for_destruction() {
                    entity.update(dt);
                }
                if entity.is_marked_for_destruction() {
                    self.pending_remove.push(id);
                }
            }
        }

        self.flush_removals();
    }

    /// Render all active entities, back to front.
    ///
    /// A separate pass, not gated by the update state machine. Entities are
    /// ordered by transform position `y` ascending for paint-order layering;
    /// entities without a transform sort as `0.0`.
    pub fn render(&mut self, surface: &mut dyn Any) {
        let mut order: Vec<(EntityId, f32)> = self
            .entities
            .values()
            .map(|e| {
                let depth = e.get::<Transform>().map_or(0.0, |t| t.position.y);
                (e.id(), depth)
            })
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (id, _) in order {
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.render(surface);
            }
        }
    }

    /// Destroy and drop every entity and clear all bookkeeping, including the
    /// pending queues.
    pub fn clear(&mut self) {
        for entity in self.entities.values_mut() {
            entity.destroy();
        }
        self.entities.clear();
        self.pending_add.clear();
        self.pending_remove.clear();
        self.tag_index.clear();
    }

    // -- queries ------------------------------------------------------------

    /// Look up a tracked entity by id. Pending entities are not found.
    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable lookup of a tracked entity.
    pub fn get_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// All tracked entities, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All tracked entities carrying the tag.
    pub fn get_entities_with_tag(&self, tag: &str) -> Vec<&Entity> {
        match self.tag_index.get(tag) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.entities.get(id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All tracked entities with a component of the given kind.
    pub fn get_entities_with_component(&self, kind: ComponentKind) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.has_component(kind))
            .collect()
    }

    /// All tracked entities carrying *all* of `tags` and *all* of `kinds`.
    pub fn get_entities_matching(&self, tags: &[&str], kinds: &[ComponentKind]) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| tags.iter().all(|t| e.has_tag(t)))
            .filter(|e| kinds.iter().all(|k| e.has_component(*k)))
            .collect()
    }

    /// Whether `id` is queued for addition but not yet flushed into the
    /// table. Existence bookkeeping only; pending entities stay invisible to
    /// every query above.
    pub fn is_pending(&self, id: EntityId) -> bool {
        self.pending_add.iter().any(|e| e.id() == id)
    }

    /// Number of tracked entities. Pending adds do not count.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of tracked, active entities.
    pub fn active_entity_count(&self) -> usize {
        self.entities.values().filter(|e| e.is_active()).count()
    }

    // -- tags ---------------------------------------------------------------

    /// Add a tag to a tracked entity, keeping the tag index in sync.
    /// No-op for unknown ids.
    pub fn add_tag(&mut self, id: EntityId, tag: &str) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.add_tag(tag);
            self.tag_index.entry(tag.to_owned()).or_default().insert(id);
        }
    }

    /// Remove a tag from a tracked entity, keeping the tag index in sync.
    /// No-op for unknown ids or absent tags.
    pub fn remove_tag(&mut self, id: EntityId, tag: &str) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.remove_tag(tag);
            if let Some(ids) = self.tag_index.get_mut(tag) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }

    // -- flush points -------------------------------------------------------

    fn flush_additions(&mut self) {
        if self.pending_add.is_empty() {
            return;
        }
        let count = self.pending_add.len();
        for entity in self.pending_add.drain(..) {
            let id = entity.id();
            for tag in entity.tags() {
                self.tag_index
                    .entry(tag.clone())
                    .or_default()
                    .insert(id);
            }
            self.entities.insert(id, entity);
        }
        trace!(count, "flushed pending entity additions");
    }

    fn flush_removals(&mut self) {
        if self.pending_remove.is_empty() {
            return;
        }
        let mut count = 0usize;
        for id in std::mem::take(&mut self.pending_remove) {
            // Duplicate ids in the queue are harmless: the second pop misses.
            if let Some(mut entity) = self.entities.remove(&id) {
                // Fires on_remove for entities removed without an explicit
                // destroy; idempotent for ones already destroyed.
                entity.destroy();
                for tag in entity.tags() {
                    if let Some(ids) = self.tag_index.get_mut(tag) {
                        ids.remove(&id);
                        if ids.is_empty() {
                            self.tag_index.remove(tag);
                        }
                    }
                }
                debug!(%id, name = entity.name(), "entity removed");
                count += 1;
            }
        }
        trace!(count, "flushed pending entity removals");
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentBase};
    use std::any::Any;

    const DT: f32 = 1.0 / 60.0;

    fn tagged(name: &str, tags: &[&str]) -> Entity {
        let mut e = Entity::new(name);
        for tag in tags {
            e.add_tag(*tag);
        }
        e
    }

    // -- deferred visibility -------------------------------------------------

    #[test]
    fn pending_entities_invisible_until_flush() {
        let mut mgr = EntityManager::new();
        let id = mgr.add_entity(tagged("ship", &["ship"]));

        assert!(mgr.get_entity(id).is_none());
        assert!(mgr.get_entities_with_tag("ship").is_empty());
        assert_eq!(mgr.entity_count(), 0);

        mgr.update(DT);

        assert!(mgr.get_entity(id).is_some());
        assert_eq!(mgr.get_entities_with_tag("ship").len(), 1);
        assert_eq!(mgr.entity_count(), 1);
    }

    #[test]
    fn removed_entities_visible_until_flush() {
        let mut mgr = EntityManager::new();
        let id = mgr.add_entity(tagged("ship", &["ship"]));
        mgr.update(DT);

        mgr.remove_entity(id);
        // Still queryable until the next update's remove flush.
        assert!(mgr.get_entity(id).is_some());
        assert_eq!(mgr.get_entities_with_tag("ship").len(), 1);

        mgr.update(DT);
        assert!(mgr.get_entity(id).is_none());
        assert!(mgr.get_entities_with_tag("ship").is_empty());
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut mgr = EntityManager::new();
        let orphan = Entity::new("never-tracked");
        mgr.remove_entity(orphan.id());
        mgr.update(DT);
        assert_eq!(mgr.entity_count(), 0);
    }

    // -- destruction during the update pass ---------------------------------

    /// Component that requests owner destruction after a set number of ticks.
    struct Fuse {
        base: ComponentBase,
        remaining: u32,
    }

    impl Fuse {
        fn new(ticks: u32) -> Box<Self> {
            Box::new(Self {
                base: ComponentBase::new(),
                remaining: ticks,
            })
        }
    }

    impl Component for Fuse {
        fn kind(&self) -> ComponentKind {
            ComponentKind::Health
        }
        fn base(&self) -> &ComponentBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }
        fn update(&mut self, _dt: f32) {
            if self.remaining == 0 {
                self.base.request_owner_destruction();
            } else {
                self.remaining -= 1;
            }
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn self_destruction_fully_removed_same_tick() {
        let mut mgr = EntityManager::new();

        let mut doomed = tagged("doomed", &["enemy"]);
        doomed.add_component(Fuse::new(0));
        let doomed_id = mgr.add_entity(doomed);
        let bystander_id = mgr.add_entity(tagged("bystander", &["enemy"]));

        mgr.update(DT); // flush in
        mgr.update(DT); // doomed destroys itself during this tick

        assert!(mgr.get_entity(doomed_id).is_none());
        let enemies = mgr.get_entities_with_tag("enemy");
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies[0].id(), bystander_id);
    }

    #[test]
    fn externally_destroyed_entity_collected_next_update() {
        let mut mgr = EntityManager::new();
        let id = mgr.add_entity(tagged("ship", &["ship"]));
        mgr.update(DT);

        mgr.get_entity_mut(id).unwrap().destroy();
        // Destroyed but not yet flushed: still in the table, components gone.
        assert!(mgr.get_entity(id).is_some());

        mgr.update(DT);
        assert!(mgr.get_entity(id).is_none());
        assert!(mgr.get_entities_with_tag("ship").is_empty());
    }

    // -- queries -------------------------------------------------------------

    #[test]
    fn component_and_combined_queries() {
        let mut mgr = EntityManager::new();

        let mut ship = tagged("ship", &["ship"]);
        ship.add_component(Box::new(crate::components::Transform::at(0.0, 0.0)));
        ship.add_component(Box::new(crate::components::Collision::new(32.0, 32.0)));
        mgr.add_entity(ship);

        let mut ghost = tagged("ghost", &["ship"]);
        ghost.add_component(Box::new(crate::components::Transform::at(1.0, 1.0)));
        mgr.add_entity(ghost);

        mgr.update(DT);

        assert_eq!(
            mgr.get_entities_with_component(ComponentKind::Transform).len(),
            2
        );
        assert_eq!(
            mgr.get_entities_with_component(ComponentKind::Collision).len(),
            1
        );
        assert_eq!(
            mgr.get_entities_matching(&["ship"], &[ComponentKind::Collision])
                .len(),
            1
        );
        assert_eq!(
            mgr.get_entities_matching(&["ship"], &[]).len(),
            2
        );
        assert!(mgr
            .get_entities_matching(&["kraken"], &[])
            .is_empty());
    }

    #[test]
    fn manager_tag_ops_keep_index_in_sync() {
        let mut mgr = EntityManager::new();
        let id = mgr.add_entity(Entity::new("ship"));
        mgr.update(DT);

        mgr.add_tag(id, "flagship");
        assert_eq!(mgr.get_entities_with_tag("flagship").len(), 1);
        assert!(mgr.get_entity(id).unwrap().has_tag("flagship"));

        mgr.remove_tag(id, "flagship");
        assert!(mgr.get_entities_with_tag("flagship").is_empty());
        assert!(!mgr.get_entity(id).unwrap().has_tag("flagship"));
    }

    #[test]
    fn tag_index_entry_dropped_when_empty() {
        let mut mgr = EntityManager::new();
        let id = mgr.add_entity(tagged("only", &["loner"]));
        mgr.update(DT);
        mgr.remove_entity(id);
        mgr.update(DT);
        // Index entry fully gone, not an empty set.
        assert!(!mgr.tag_index.contains_key("loner"));
    }

    // -- counts and clear ----------------------------------------------------

    #[test]
    fn counts_track_active_flag() {
        let mut mgr = EntityManager::new();
        let a = mgr.add_entity(Entity::new("a"));
        mgr.add_entity(Entity::new("b"));
        mgr.update(DT);

        assert_eq!(mgr.entity_count(), 2);
        assert_eq!(mgr.active_entity_count(), 2);

        mgr.get_entity_mut(a).unwrap().set_active(false);
        assert_eq!(mgr.entity_count(), 2);
        assert_eq!(mgr.active_entity_count(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let mut mgr = EntityManager::new();
        mgr.add_entity(tagged("a", &["x"]));
        mgr.add_entity(tagged("b", &["x"]));
        mgr.update(DT);
        mgr.add_entity(Entity::new("pending"));

        mgr.clear();
        assert_eq!(mgr.entity_count(), 0);
        assert!(mgr.get_entities_with_tag("x").is_empty());

        // A pending entity queued before clear must not resurface.
        mgr.update(DT);
        assert_eq!(mgr.entity_count(), 0);
    }

    // -- render ordering -----------------------------------------------------

    #[test]
    fn render_orders_by_y_ascending() {
        use crate::components::Transform;

        struct Recorder {
            base: ComponentBase,
            label: u32,
        }
        impl Component for Recorder {
            fn kind(&self) -> ComponentKind {
                ComponentKind::Render
            }
            fn base(&self) -> &ComponentBase {
                &self.base
            }
            fn base_mut(&mut self) -> &mut ComponentBase {
                &mut self.base
            }
            fn update(&mut self, _dt: f32) {}
            fn render(&mut self, surface: &mut dyn Any) {
                if let Some(log) = surface.downcast_mut::<Vec<u32>>() {
                    log.push(self.label);
                }
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut mgr = EntityManager::new();
        for (label, y) in [(1u32, 30.0f32), (2, 10.0), (3, 20.0)] {
            let mut e = Entity::new(format!("e{label}"));
            e.add_component(Box::new(Transform::at(0.0, y)));
            e.add_component(Box::new(Recorder {
                base: ComponentBase::new(),
                label,
            }));
            mgr.add_entity(e);
        }
        // One inactive entity that must not render.
        let hidden = mgr.add_entity(Entity::new("hidden"));
        mgr.update(DT);
        mgr.get_entity_mut(hidden).unwrap().set_active(false);

        let mut log: Vec<u32> = Vec::new();
        mgr.render(&mut log);
        assert_eq!(log, vec![2, 3, 1]);
    }
}
