//! Term Physics - a toy 2D physics playground for the terminal
//!
//! Core modules:
//! - `sim`: Simulation core (entities, registry, physics, spring animation, tick driver)
//! - `settings`: JSON configuration with compile-time defaults
//!
//! Rendering, layout and input routing live outside this crate. They read
//! display positions and feed [`sim::Command`]s back in.

pub mod settings;
pub mod sim;

pub use settings::{Settings, SettingsError};

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Tick driver frequency (frames per second)
    pub const TICK_RATE: u32 = 60;
    /// Physics timestep while running (seconds of simulated time per tick)
    pub const PHYSICS_DT: f32 = 0.1;

    /// Physics defaults
    pub const GRAVITY: f32 = 25.0;
    pub const AIR_RESISTANCE: f32 = 0.05;
    pub const RESTITUTION: f32 = 0.7;
    pub const STATIC_FRICTION: f32 = 0.8;
    pub const CONTACT_DAMPING: f32 = 0.9;
    pub const MAX_VELOCITY: f32 = 50.0;
    pub const MIN_VELOCITY: f32 = 0.05;
    pub const CONTACT_TOLERANCE: f32 = 0.1;

    /// Lower wall coordinate on both axes
    pub const MIN_BOUND: f32 = 1.0;
    /// Distance kept between the upper walls and the pane edges
    pub const WALL_MARGIN: f32 = 2.0;
    /// Replacement for a non-positive or non-finite pane dimension
    pub const FALLBACK_DIMENSION: f32 = 10.0;

    /// Fraction of the overlap each body is pushed back per collision
    pub const SEPARATION_FACTOR: f32 = 0.5;
    /// Energy kept by the normal velocity on every entity-entity collision (5% lost)
    pub const COLLISION_ENERGY_RETENTION: f32 = 0.95;
    /// Half-width of the random nudge applied to coincident centers
    pub const COINCIDENT_JITTER: f32 = 0.05;

    /// Spring defaults (angular frequency and damping ratio)
    pub const SPRING_FPS: u32 = 60;
    pub const SPRING_TENSION: f32 = 300.0;
    pub const SPRING_DAMPING: f32 = 30.0;
    pub const ANIMATION_POSITION_TOLERANCE: f32 = 0.01;
    pub const ANIMATION_VELOCITY_THRESHOLD: f32 = 0.01;

    /// Chance a sprite advances its glyph frame on a physics tick
    pub const SPRITE_FRAME_CHANCE: f64 = 0.1;

    /// Entity caps selectable at runtime (first one is the default)
    pub const ENTITY_LIMITS: [usize; 3] = [50, 200, 1000];
    pub const DEFAULT_ENTITY_LIMIT: usize = 50;
    /// Entities added by one stress test
    pub const STRESS_TEST_ENTITIES: usize = 20;
    /// Random velocity magnitude for user-spawned entities
    pub const SPAWN_VELOCITY: f32 = 5.0;
    /// Random velocity magnitude for stress-test entities
    pub const STRESS_VELOCITY: f32 = 10.0;

    /// Resize reconciliation: inset from the new wall and bounce damping
    pub const RESIZE_INSET: f32 = 0.5;
    pub const RESIZE_BOUNCE: f32 = 0.7;

    /// Default pane size before the first resize notification
    pub const DEFAULT_WIDTH: f32 = 80.0;
    pub const DEFAULT_HEIGHT: f32 = 24.0;
}

/// Return `value` if finite, otherwise `fallback`
#[inline]
pub fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

/// Per-axis [`finite_or`]
#[inline]
pub fn finite_vec_or(value: Vec2, fallback: Vec2) -> Vec2 {
    Vec2::new(finite_or(value.x, fallback.x), finite_or(value.y, fallback.y))
}
