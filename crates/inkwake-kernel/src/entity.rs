//! Entities: uniquely identified containers of components and tags.
//!
//! An [`Entity`] is a typed bag holding at most one component per
//! [`ComponentKind`], a set of string tags, and an active/destruction flag
//! pair. Entities are created free-standing and only become tracked once
//! submitted to the [`EntityManager`](crate::manager::EntityManager) and its
//! pending-add queue is flushed.
//!
//! [`EntityId`]s come from a process-wide monotonic counter, so an id is
//! unique for the lifetime of the process and is never reused. That makes the
//! id itself a safe non-owning handle: a stale id simply fails table lookups.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKind, TypedComponent};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque, unique entity identifier.
///
/// Generated at entity construction and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A game object: components keyed by kind, tags, and lifecycle flags.
///
/// Inactive entities are skipped by update and render but remain addressable.
/// Once [`destroy`](Entity::destroy) has run, the component map is empty and
/// [`get_component`](Entity::get_component) returns `None` for every kind,
/// even before the manager physically removes the entity at its next flush.
pub struct Entity {
    id: EntityId,
    name: String,
    components: HashMap<ComponentKind, Box<dyn Component>>,
    tags: HashSet<String>,
    active: bool,
    marked_for_destruction: bool,
}

impl Entity {
    /// Create a free-standing entity. `name` is for debugging only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::next(),
            name: name.into(),
            components: HashMap::new(),
            tags: HashSet::new(),
            active: true,
            marked_for_destruction: false,
        }
    }

    /// The entity's unique, stable id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether update and render consider this entity.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate or deactivate the entity without destroying it.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether [`destroy`](Entity::destroy) has run.
    pub fn is_marked_for_destruction(&self) -> bool {
        self.marked_for_destruction
    }

    // -- components ---------------------------------------------------------

    /// Attach a component, replacing any existing component of the same kind.
    ///
    /// The replaced component's `on_remove` fires before the new component's
    /// `on_add`. Returns a reference to the attached component.
    pub fn add_component(&mut self, component: Box<dyn Component>) -> &mut dyn Component {
        let kind = component.kind();
        if let Some(mut old) = self.components.remove(&kind) {
            old.on_remove();
            old.base_mut().set_owner(None);
        }
        self.components.insert(kind, component);
        let slot = self
            .components
            .get_mut(&kind)
            .expect("component just inserted");
        slot.base_mut().set_owner(Some(self.id));
        slot.on_add();
        slot.as_mut()
    }

    /// The attached component of the given kind, if any. Never allocates.
    pub fn get_component(&self, kind: ComponentKind) -> Option<&dyn Component> {
        self.components.get(&kind).map(|c| c.as_ref())
    }

    /// Mutable access to the attached component of the given kind.
    pub fn get_component_mut(&mut self, kind: ComponentKind) -> Option<&mut dyn Component> {
        self.components.get_mut(&kind).map(|c| c.as_mut())
    }

    /// Typed access to an attached component.
    pub fn get<T: TypedComponent>(&self) -> Option<&T> {
        self.get_component(T::KIND)?.as_any().downcast_ref()
    }

    /// Typed mutable access to an attached component.
    pub fn get_mut<T: TypedComponent>(&mut self) -> Option<&mut T> {
        self.get_component_mut(T::KIND)?.as_any_mut().downcast_mut()
    }

    /// Detach and return the component of the given kind, firing `on_remove`.
    pub fn remove_component(&mut self, kind: ComponentKind) -> Option<Box<dyn Component>> {
        let mut component = self.components.remove(&kind)?;
        component.on_remove();
        component.base_mut().set_owner(None);
        Some(component)
    }

    /// Whether a component of the given kind is attached.
    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.contains_key(&kind)
    }

    /// Kinds currently attached, in no particular order.
    pub fn component_kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.components.keys().copied()
    }

    // -- tags ---------------------------------------------------------------

    /// Add a tag. Duplicates collapse.
    ///
    /// Once the entity is tracked by a manager, prefer
    /// [`EntityManager::add_tag`](crate::manager::EntityManager::add_tag) so
    /// the tag index stays in sync.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Whether the entity carries the tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Remove a tag. No-op if absent.
    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.remove(tag);
    }

    /// The current tag set.
    pub fn tags(&self) -> &HashSet<String> {
        &self.tags
    }

    // -- lifecycle ----------------------------------------------------------

    /// Update every enabled component by `dt` seconds.
    ///
    /// No-op while inactive. Iterates a snapshot of the component kinds taken
    /// at the start of the call, so a kind detached mid-pass is skipped rather
    /// than tripping over the map. If any component requested owner
    /// destruction during the pass, [`destroy`](Entity::destroy) runs before
    /// returning.
    pub fn update(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        let kinds: Vec<ComponentKind> = self.components.keys().copied().collect();
        for kind in kinds {
            if let Some(component) = self.components.get_mut(&kind) {
                if component.is_enabled() {
                    component.update(dt);
                }
            }
        }
        if self
            .components
            .values()
            .any(|c| c.base().destruction_requested())
        {
            self.destroy();
        }
    }

    /// Invoke the render-kind component's draw hook, if attached and enabled.
    ///
    /// No-op while inactive. The surface is whatever the frame driver hands
    /// down; the kernel does not interpret it.
    pub fn render(&mut self, surface: &mut dyn Any) {
        if !self.active {
            return;
        }
        if let Some(component) = self.components.get_mut(&ComponentKind::Render) {
            if component.is_enabled() {
                component.render(surface);
            }
        }
    }

    /// Mark the entity for destruction and detach every component.
    ///
    /// Sets `active = false` and `marked_for_destruction = true`, then fires
    /// `on_remove` for each component and empties the map. Idempotent: a
    /// second call finds the map already empty and does nothing further. The
    /// manager pops the entity from its table at the next remove flush.
    pub fn destroy(&mut self) {
        self.marked_for_destruction = true;
        self.active = false;
        for (_, mut component) in self.components.drain() {
            component.on_remove();
            component.base_mut().set_owner(None);
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("tags", &self.tags)
            .field("active", &self.active)
            .field("marked_for_destruction", &self.marked_for_destruction)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
