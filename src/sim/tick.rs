//! Fixed timestep simulation driver
//!
//! Owns the registry, physics engine and smoother, plus the parameters the
//! user picks for new entities. Input arrives as [`Command`]s; [`Simulation::tick`]
//! advances one frame.

use std::sync::Arc;

use glam::Vec2;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::animation::Smoother;
use super::entity::{Color, Entity, EntityKind, PALETTE};
use super::physics::{PhysicsEngine, WorldBounds};
use super::registry::EntityRegistry;
use crate::Settings;
use crate::consts::*;

/// Gravity presets cycled by [`Command::CycleGravity`]
pub const GRAVITY_LEVELS: [f32; 4] = [0.0, 10.0, 25.0, 50.0];
/// Size classes cycled by [`Command::CycleSize`]
pub const ENTITY_SIZES: [u32; 4] = [1, 2, 3, 4];

/// Lowest spawn coordinate on both axes
const SPAWN_MIN: i32 = 2;
/// Spawn rows for user-added entities (2, 3 or 4)
const SPAWN_ROWS: i32 = 3;

/// User intent, decoupled from whatever produces it (keys, buttons, scripts)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    AddSphere,
    AddSprite,
    Clear,
    TogglePause,
    /// Clear everything and resume
    Reset,
    CycleGravity,
    CycleBounce,
    CycleSize,
    CycleColor,
    StressTest,
    CycleEntityLimit,
    Resize { width: f32, height: f32 },
}

/// Next value after `current` in a fixed cycle, or the first if unknown
fn cycle_next<T: Copy + PartialEq>(levels: &[T], current: T) -> T {
    levels
        .iter()
        .position(|&level| level == current)
        .map_or(levels[0], |i| levels[(i + 1) % levels.len()])
}

fn next_restitution(current: f32) -> f32 {
    if current <= 0.1 {
        0.3
    } else if current <= 0.3 {
        0.7
    } else if current <= 0.7 {
        1.0
    } else {
        0.1
    }
}

/// Integer coordinate in `[SPAWN_MIN, upper)`; tiny panes collapse to `SPAWN_MIN`
fn spawn_coordinate<R: Rng + ?Sized>(rng: &mut R, upper: f32) -> f32 {
    let upper = upper.floor() as i32;
    if upper <= SPAWN_MIN {
        return SPAWN_MIN as f32;
    }
    rng.random_range(SPAWN_MIN..upper) as f32
}

/// Pull an entity lying beyond the walls back inside, bouncing outward motion
fn reconcile_with_bounds(entity: &mut Entity, bounds: WorldBounds) {
    let pos = entity.position();
    let vel = entity.velocity();
    let mut new_pos = pos;
    let mut new_vel = vel;

    if pos.x > bounds.max.x {
        new_pos.x = bounds.max.x - RESIZE_INSET;
        if vel.x > 0.0 {
            new_vel.x = -vel.x * RESIZE_BOUNCE;
        }
    } else if pos.x < bounds.min.x {
        new_pos.x = bounds.min.x + RESIZE_INSET;
        if vel.x < 0.0 {
            new_vel.x = -vel.x * RESIZE_BOUNCE;
        }
    }

    if pos.y > bounds.max.y {
        new_pos.y = bounds.max.y - RESIZE_INSET;
        if vel.y > 0.0 {
            new_vel.y = -vel.y * RESIZE_BOUNCE;
        }
    } else if pos.y < bounds.min.y {
        new_pos.y = bounds.min.y + RESIZE_INSET;
        if vel.y < 0.0 {
            new_vel.y = -vel.y * RESIZE_BOUNCE;
        }
    }

    if new_pos != pos {
        entity.set_immediate_position(new_pos);
    }
    if new_vel != vel {
        entity.set_velocity(new_vel);
    }
}

/// Playground state advanced once per fixed frame
#[derive(Debug)]
pub struct Simulation {
    registry: Arc<EntityRegistry>,
    engine: PhysicsEngine,
    smoother: Smoother,
    /// Spawn positions and kinds; separate from the engine's stream
    rng: Pcg32,
    width: f32,
    height: f32,
    paused: bool,
    selected_size: u32,
    color_index: usize,
    entity_limit: usize,
    tick_count: u64,
}

impl Simulation {
    pub fn new(settings: &Settings) -> Self {
        Self::with_dimensions(settings, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    pub fn with_dimensions(settings: &Settings, width: f32, height: f32) -> Self {
        let entity_limit = if settings.entity_limit == 0 {
            DEFAULT_ENTITY_LIMIT
        } else {
            settings.entity_limit
        };
        Self {
            registry: Arc::new(EntityRegistry::new()),
            engine: PhysicsEngine::new(width, height, settings.physics, settings.seed),
            smoother: Smoother::new(settings.spring),
            rng: Pcg32::seed_from_u64(settings.seed.wrapping_add(1)),
            width,
            height,
            paused: false,
            selected_size: ENTITY_SIZES[0],
            color_index: 0,
            entity_limit,
            tick_count: 0,
        }
    }

    /// Shared handle for concurrent readers (renderers, stats)
    pub fn registry(&self) -> Arc<EntityRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn engine(&self) -> &PhysicsEngine {
        &self.engine
    }

    pub fn smoother(&self) -> &Smoother {
        &self.smoother
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn selected_size(&self) -> u32 {
        self.selected_size
    }

    pub fn selected_color(&self) -> Color {
        PALETTE[self.color_index]
    }

    pub fn entity_limit(&self) -> usize {
        self.entity_limit
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn dimensions(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Advance one frame: physics while running, display smoothing always
    pub fn tick(&mut self) {
        let engine = &mut self.engine;
        let smoother = &self.smoother;
        let paused = self.paused;
        self.registry.update(|entities| {
            if !paused {
                engine.apply_physics(entities);
                engine.handle_collisions(entities);
            }
            for entity in entities.iter_mut() {
                entity.update_animation(smoother);
            }
        });
        self.tick_count += 1;
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::AddSphere => {
                self.spawn(EntityKind::Sphere);
            }
            Command::AddSprite => {
                self.spawn(EntityKind::Sprite);
            }
            Command::Clear => self.registry.clear(),
            Command::TogglePause => self.set_paused(!self.paused),
            Command::Reset => {
                self.registry.clear();
                self.set_paused(false);
            }
            Command::CycleGravity => {
                let gravity = cycle_next(&GRAVITY_LEVELS, self.engine.gravity());
                self.engine.set_gravity(gravity);
                log::debug!("Gravity set to {}", gravity);
            }
            Command::CycleBounce => {
                let restitution = next_restitution(self.engine.restitution());
                self.engine.set_restitution(restitution);
                log::debug!("Restitution set to {}", restitution);
            }
            Command::CycleSize => {
                self.selected_size = cycle_next(&ENTITY_SIZES, self.selected_size);
            }
            Command::CycleColor => {
                self.color_index = (self.color_index + 1) % PALETTE.len();
            }
            Command::StressTest => {
                self.stress_test();
            }
            Command::CycleEntityLimit => {
                self.entity_limit = cycle_next(&ENTITY_LIMITS, self.entity_limit);
                log::info!("Entity limit now {}", self.entity_limit);
            }
            Command::Resize { width, height } => self.resize(width, height),
        }
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused {
            self.engine.pause();
        } else {
            self.engine.resume();
        }
    }

    /// Add one entity near the top with the selected size and color
    ///
    /// Returns false when the registry is already at the entity limit.
    pub fn spawn(&mut self, kind: EntityKind) -> bool {
        if self.registry.count() >= self.entity_limit {
            log::info!("Entity limit {} reached, not adding {}", self.entity_limit, kind.as_str());
            return false;
        }
        let pos = Vec2::new(
            spawn_coordinate(&mut self.rng, self.width - WALL_MARGIN),
            self.rng.random_range(SPAWN_MIN..SPAWN_MIN + SPAWN_ROWS) as f32,
        );
        let size = self.selected_size as i32;
        let color = self.selected_color();
        let entity = self.make_entity(kind, pos, size, color, SPAWN_VELOCITY);
        self.registry.add_bounded(entity, self.entity_limit)
    }

    /// Add up to [`STRESS_TEST_ENTITIES`] random entities, stopping at the limit
    pub fn stress_test(&mut self) -> usize {
        let mut added = 0;
        for _ in 0..STRESS_TEST_ENTITIES {
            if self.registry.count() >= self.entity_limit {
                break;
            }
            let kind = if self.rng.random_bool(0.5) {
                EntityKind::Sphere
            } else {
                EntityKind::Sprite
            };
            let pos = Vec2::new(
                spawn_coordinate(&mut self.rng, self.width - WALL_MARGIN),
                spawn_coordinate(&mut self.rng, self.height - 2.0 * WALL_MARGIN),
            );
            let size = self.rng.random_range(1..=4);
            let color = PALETTE.choose(&mut self.rng).copied().unwrap_or(PALETTE[0]);
            let entity = self.make_entity(kind, pos, size, color, STRESS_VELOCITY);
            if !self.registry.add_bounded(entity, self.entity_limit) {
                break;
            }
            added += 1;
        }
        log::info!(
            "Stress test added {} entities ({} total, limit {})",
            added,
            self.registry.count(),
            self.entity_limit
        );
        added
    }

    fn make_entity(
        &mut self,
        kind: EntityKind,
        pos: Vec2,
        size: i32,
        color: Color,
        velocity: f32,
    ) -> Entity {
        let mut entity = match kind {
            EntityKind::Sphere => Entity::sphere(pos, size, color),
            EntityKind::Sprite => Entity::sprite(pos, size, color, None, &mut self.rng),
        };
        self.engine.add_random_velocity(&mut entity, velocity);
        entity
    }

    /// New pane size: move the walls, bring stragglers inside, resync display
    pub fn resize(&mut self, width: f32, height: f32) {
        self.engine.update_bounds(width, height);
        self.width = finite_positive_or_fallback(width);
        self.height = finite_positive_or_fallback(height);

        let bounds = self.engine.bounds();
        let smoother = &self.smoother;
        self.registry.update(|entities| {
            for entity in entities.iter_mut() {
                reconcile_with_bounds(entity, bounds);
                entity.update_animation(smoother);
            }
        });
    }
}

fn finite_positive_or_fallback(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        FALLBACK_DIMENSION
    }
}
