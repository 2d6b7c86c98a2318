//! Component model: type tags, shared per-component state, and the behavior trait.
//!
//! A component is the leaf unit of behavior and state in the kernel. Each
//! component is attached to exactly one [`Entity`](crate::entity::Entity) at a
//! time, identified by a [`ComponentKind`] type tag, and updated once per tick
//! while enabled. The kernel stores components as `Box<dyn Component>` behind
//! a closed tag enum rather than string keys, so lookups stay cheap and typed
//! access goes through `Any` downcasts instead of stringly-typed maps.
//!
//! # Ordering
//!
//! Within a single entity update, component kinds are visited in no particular
//! order. Behavior components must tolerate either order relative to their
//! siblings; the kernel makes no sequencing guarantee and never will.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// ComponentKind
// ---------------------------------------------------------------------------

/// Closed enumeration of component type tags.
///
/// An entity holds at most one component per kind. The set is fixed per
/// project; gameplay collaborators implement behaviors for these tags, the
/// kernel itself only reads `Transform` and `Collision` (spatial grid) and
/// `Physics` / `InkSlime` (projectile pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Position, rotation and scale in world space.
    Transform,
    /// Axis-aligned collision extents.
    Collision,
    /// Velocity and acceleration.
    Physics,
    /// Draw hook, invoked during the render pass.
    Render,
    /// Hit points and damage handling.
    Health,
    /// Firing logic.
    Weapon,
    /// Player input mapping.
    Input,
    /// Enemy steering and decisions.
    Ai,
    /// Sprite animation state.
    Animation,
    /// Ink projectile payload (color, damage, lifetime).
    InkSlime,
}

impl ComponentKind {
    /// Stable lowercase name, matching the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Transform => "transform",
            ComponentKind::Collision => "collision",
            ComponentKind::Physics => "physics",
            ComponentKind::Render => "render",
            ComponentKind::Health => "health",
            ComponentKind::Weapon => "weapon",
            ComponentKind::Input => "input",
            ComponentKind::Ai => "ai",
            ComponentKind::Animation => "animation",
            ComponentKind::InkSlime => "ink_slime",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ComponentBase
// ---------------------------------------------------------------------------

/// State shared by every component: the owner back-reference and the enabled
/// flag.
///
/// The owner is a non-owning [`EntityId`] handle. It is set exactly when the
/// component is attached and cleared exactly when it is detached; it is never
/// dangling in between because ids are never reused.
#[derive(Debug, Clone)]
pub struct ComponentBase {
    owner: Option<EntityId>,
    enabled: bool,
    destroy_requested: bool,
}

impl ComponentBase {
    /// Fresh, detached, enabled state.
    pub fn new() -> Self {
        Self {
            owner: None,
            enabled: true,
            destroy_requested: false,
        }
    }

    /// The owning entity, while attached.
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<EntityId>) {
        self.owner = owner;
        if owner.is_none() {
            self.destroy_requested = false;
        }
    }

    /// Whether the per-tick update runs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle the per-tick update without detaching the component.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Ask the owning entity to destroy itself at the end of its current
    /// update.
    ///
    /// Components update with exclusive access to themselves only, so they
    /// cannot call `destroy()` on their owner directly. Setting this flag is
    /// the deferred equivalent: the entity honors it once the component
    /// snapshot has finished updating.
    pub fn request_owner_destruction(&mut self) {
        self.destroy_requested = true;
    }

    pub(crate) fn destruction_requested(&self) -> bool {
        self.destroy_requested
    }
}

impl Default for ComponentBase {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A typed, attachable unit of per-tick behavior and state.
///
/// Implementors embed a [`ComponentBase`] and expose it through
/// [`base`](Component::base) / [`base_mut`](Component::base_mut); the enabled
/// flag and owner handle live there. `on_add` runs once, synchronously,
/// immediately after attachment (sibling components are already reachable
/// through the owner id); `on_remove` runs once at detachment and is the
/// place to release external resources.
///
/// The kernel never catches panics from component code: a misbehaving
/// component takes the tick down with it, which is deliberate.
pub trait Component: Any {
    /// The type tag this component occupies on its entity.
    fn kind(&self) -> ComponentKind;

    /// Shared component state.
    fn base(&self) -> &ComponentBase;

    /// Shared component state, mutably.
    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Advance the component by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Hook invoked once, right after attachment.
    fn on_add(&mut self) {}

    /// Hook invoked once, at detachment.
    fn on_remove(&mut self) {}

    /// Draw hook, invoked by the render pass for the `Render` kind.
    ///
    /// The kernel is renderer-agnostic; the surface is whatever concrete type
    /// the frame driver supplies, passed as `&mut dyn Any` for the component
    /// to downcast.
    fn render(&mut self, _surface: &mut dyn Any) {}

    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed downcasting, mutably.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The owning entity, while attached.
    fn owner(&self) -> Option<EntityId> {
        self.base().owner()
    }

    /// Whether the per-tick update runs.
    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    /// Toggle the per-tick update without detaching the component.
    fn set_enabled(&mut self, enabled: bool) {
        self.base_mut().set_enabled(enabled);
    }
}

/// A component type with a statically known tag, enabling
/// [`Entity::get::<T>()`](crate::entity::Entity::get).
pub trait TypedComponent: Component + Sized {
    /// The tag this type always registers under.
    const KIND: ComponentKind;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
