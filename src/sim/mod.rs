//! Simulation core
//!
//! Everything that moves lives here:
//! - Entities and their shared registry
//! - Fixed-timestep physics with seeded randomness
//! - Spring smoothing of display positions
//! - The tick driver that ties them together
//!
//! No rendering or terminal dependencies.

pub mod animation;
pub mod entity;
pub mod physics;
pub mod registry;
pub mod tick;

pub use animation::{AnimationState, Smoother, Spring, SpringConfig};
pub use entity::{Bounds, Color, Entity, EntityId, EntityKind, PALETTE, SPRITE_SYMBOLS, Variant};
pub use physics::{CollisionPair, PhysicsConfig, PhysicsEngine, WorldBounds};
pub use registry::EntityRegistry;
pub use tick::{Command, Simulation};
