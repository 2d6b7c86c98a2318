//! Concrete components the kernel itself consumes.
//!
//! The spatial grid reads [`Transform`] (position) and [`Collision`]
//! (extents); the projectile pool reads and writes [`Transform`], [`Physics`]
//! (velocity) and [`InkSlime`] (color discriminator, lifetime). Everything
//! else — health, weapons, AI, animation — is gameplay-side and lives outside
//! the kernel; those behaviors implement [`Component`] against the kinds in
//! [`ComponentKind`](crate::component::ComponentKind).

use std::any::Any;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentBase, ComponentKind, TypedComponent};

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A plain 2D vector. Just enough arithmetic for the kernel's needs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    /// Construct from coordinates.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction. The zero vector normalizes to zero.
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len > 0.0 {
            Vec2::new(self.x / len, self.y / len)
        } else {
            Vec2::ZERO
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Position, rotation and scale in 2D world space.
///
/// `update` captures the previous position each tick for interpolation and
/// collision resolution by gameplay code.
#[derive(Debug, Clone)]
pub struct Transform {
    base: ComponentBase,
    /// World-space position.
    pub position: Vec2,
    /// Position at the start of the previous update.
    pub previous_position: Vec2,
    /// Rotation in degrees, clockwise-positive.
    pub rotation: f32,
    /// Per-axis scale factors.
    pub scale: Vec2,
}

impl Transform {
    /// A transform at the origin.
    pub fn new() -> Self {
        Self::at(0.0, 0.0)
    }

    /// A transform at the given position.
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            base: ComponentBase::new(),
            position: Vec2::new(x, y),
            previous_position: Vec2::new(x, y),
            rotation: 0.0,
            scale: Vec2::new(1.0, 1.0),
        }
    }

    /// Set the absolute position.
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    /// Move by a relative amount.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.position += Vec2::new(dx, dy);
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Transform {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Transform
    }
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
    fn update(&mut self, _dt: f32) {
        self.previous_position = self.position;
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedComponent for Transform {
    const KIND: ComponentKind = ComponentKind::Transform;
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// Axis-aligned collision extents, centered on the entity's position.
#[derive(Debug, Clone)]
pub struct Collision {
    base: ComponentBase,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
    /// Trigger boxes report overlap but do not block movement.
    pub is_trigger: bool,
    /// Offset of the box center from the entity position.
    pub offset: Vec2,
}

impl Collision {
    /// A solid collision box of the given extents.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            base: ComponentBase::new(),
            width,
            height,
            is_trigger: false,
            offset: Vec2::ZERO,
        }
    }
}

impl Component for Collision {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Collision
    }
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
    fn update(&mut self, _dt: f32) {
        // Overlap testing happens in the spatial grid, not here.
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedComponent for Collision {
    const KIND: ComponentKind = ComponentKind::Collision;
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Velocity and acceleration with a per-axis speed clamp and friction decay.
///
/// The component integrates its own velocity; applying velocity to the
/// owner's [`Transform`] is the frame driver's job, since components update
/// with access to themselves only.
#[derive(Debug, Clone)]
pub struct Physics {
    base: ComponentBase,
    /// Current velocity, units per second.
    pub velocity: Vec2,
    /// Current acceleration, units per second squared.
    pub acceleration: Vec2,
    /// Per-axis speed clamp.
    pub max_velocity: Vec2,
    /// Friction decel magnitude, units per second squared. Zero disables.
    pub friction: f32,
}

impl Physics {
    /// A motionless body with the default clamp and no friction.
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new(),
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            max_velocity: Vec2::new(500.0, 500.0),
            friction: 0.0,
        }
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Physics {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Physics
    }
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
    fn update(&mut self, dt: f32) {
        self.velocity += self.acceleration * dt;

        self.velocity.x = self.velocity.x.clamp(-self.max_velocity.x, self.max_velocity.x);
        self.velocity.y = self.velocity.y.clamp(-self.max_velocity.y, self.max_velocity.y);

        if self.friction > 0.0 && self.velocity.length() > 0.0 {
            let decel = self.velocity.normalized() * (self.friction * dt);
            if decel.length() >= self.velocity.length() {
                self.velocity = Vec2::ZERO;
            } else {
                self.velocity -= decel;
            }
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedComponent for Physics {
    const KIND: ComponentKind = ComponentKind::Physics;
}

// ---------------------------------------------------------------------------
// InkColor
// ---------------------------------------------------------------------------

/// Ink color, the discriminator key for projectile sub-pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InkColor {
    /// The default ink; also the fallback when a color cannot be resolved.
    #[default]
    DarkBlue,
    Purple,
    Green,
    Red,
    Rainbow,
}

impl InkColor {
    /// Every color, in declaration order.
    pub const ALL: [InkColor; 5] = [
        InkColor::DarkBlue,
        InkColor::Purple,
        InkColor::Green,
        InkColor::Red,
        InkColor::Rainbow,
    ];

    /// Stable lowercase name, matching the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            InkColor::DarkBlue => "dark_blue",
            InkColor::Purple => "purple",
            InkColor::Green => "green",
            InkColor::Red => "red",
            InkColor::Rainbow => "rainbow",
        }
    }
}

impl fmt::Display for InkColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// InkSlime
// ---------------------------------------------------------------------------

/// Ink projectile payload: color, damage, and a lifetime clock.
///
/// The component only tracks its age; deciding what to do with an expired
/// projectile (typically releasing it back to the pool) is gameplay's call.
#[derive(Debug, Clone)]
pub struct InkSlime {
    base: ComponentBase,
    /// Ink color; read back by the projectile pool on release.
    pub color: InkColor,
    /// Ink load added to a ship on hit.
    pub damage: u32,
    /// Seconds before the projectile counts as expired.
    pub lifetime: f32,
    /// Seconds since activation.
    pub age: f32,
}

impl InkSlime {
    /// A projectile payload of the given color with default damage.
    pub fn new(color: InkColor) -> Self {
        Self {
            base: ComponentBase::new(),
            color,
            damage: 10,
            lifetime: 5.0,
            age: 0.0,
        }
    }

    /// Whether the projectile has outlived its lifetime.
    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }
}

impl Component for InkSlime {
    fn kind(&self) -> ComponentKind {
        ComponentKind::InkSlime
    }
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
    fn update(&mut self, dt: f32) {
        self.age += dt;
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl TypedComponent for InkSlime {
    const KIND: ComponentKind = ComponentKind::InkSlime;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
