//! Fixed-timestep kinematics and collision response
//!
//! Entities are circles. Each tick applies gravity and drag, integrates with
//! semi-implicit Euler, reflects off the walls and settles slow motion; a
//! second pass finds overlapping pairs and pushes them apart with an
//! equal-mass impulse. Invalid inputs are ignored, never reported.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId};
use crate::consts::*;

/// Tunable physics constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Downward acceleration (units/s²)
    pub gravity: f32,
    /// Drag coefficient (0-1)
    pub air_resistance: f32,
    /// Normal velocity kept after a bounce (0-1)
    pub restitution: f32,
    /// Velocity multiplier applied to nearly resting entities
    pub static_friction: f32,
    /// Velocity multiplier applied to slow touching pairs
    pub contact_damping: f32,
    /// Seconds of simulated time per tick while running
    pub time_step: f32,
    pub max_velocity: f32,
    /// Components slower than this are zeroed
    pub min_velocity: f32,
    /// Overlap allowed before two entities count as colliding
    pub contact_tolerance: f32,
    /// Gap between the upper walls and the pane edges
    pub wall_margin: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            air_resistance: AIR_RESISTANCE,
            restitution: RESTITUTION,
            static_friction: STATIC_FRICTION,
            contact_damping: CONTACT_DAMPING,
            time_step: PHYSICS_DT,
            max_velocity: MAX_VELOCITY,
            min_velocity: MIN_VELOCITY,
            contact_tolerance: CONTACT_TOLERANCE,
            wall_margin: WALL_MARGIN,
        }
    }
}

impl PhysicsConfig {
    /// Replace out-of-range fields with their defaults
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let unit = |value: f32, fallback: f32, name: &str| {
            if (0.0..=1.0).contains(&value) {
                value
            } else {
                log::debug!("Rejected {} = {}, using {}", name, value, fallback);
                fallback
            }
        };
        let non_negative = |value: f32, fallback: f32, name: &str| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                log::debug!("Rejected {} = {}, using {}", name, value, fallback);
                fallback
            }
        };
        let positive = |value: f32, fallback: f32, name: &str| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                log::debug!("Rejected {} = {}, using {}", name, value, fallback);
                fallback
            }
        };

        Self {
            gravity: if self.gravity.is_finite() {
                self.gravity
            } else {
                defaults.gravity
            },
            air_resistance: unit(self.air_resistance, defaults.air_resistance, "air_resistance"),
            restitution: unit(self.restitution, defaults.restitution, "restitution"),
            static_friction: unit(self.static_friction, defaults.static_friction, "static_friction"),
            contact_damping: unit(self.contact_damping, defaults.contact_damping, "contact_damping"),
            time_step: positive(self.time_step, defaults.time_step, "time_step"),
            max_velocity: positive(self.max_velocity, defaults.max_velocity, "max_velocity"),
            min_velocity: non_negative(self.min_velocity, defaults.min_velocity, "min_velocity"),
            contact_tolerance: non_negative(
                self.contact_tolerance,
                defaults.contact_tolerance,
                "contact_tolerance",
            ),
            wall_margin: non_negative(self.wall_margin, defaults.wall_margin, "wall_margin"),
        }
    }
}

/// Walls of the simulation area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl WorldBounds {
    /// Walls for a pane of `width` x `height`, keeping `margin` from the far edges
    pub fn from_dimensions(width: f32, height: f32, margin: f32) -> Self {
        let dimension = |value: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                FALLBACK_DIMENSION
            }
        };
        Self {
            min: Vec2::splat(MIN_BOUND),
            max: Vec2::new(dimension(width) - margin, dimension(height) - margin),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// Two entities found overlapping in one detection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionPair {
    /// Index of the first entity in the slice passed to detection
    pub first: usize,
    pub second: usize,
    pub first_id: EntityId,
    pub second_id: EntityId,
}

impl CollisionPair {
    pub fn involves(&self, id: EntityId) -> bool {
        self.first_id == id || self.second_id == id
    }
}

/// Borrow two distinct slice elements mutably (`a < b`)
fn pair_mut(entities: &mut [Entity], a: usize, b: usize) -> (&mut Entity, &mut Entity) {
    debug_assert!(a < b);
    let (head, tail) = entities.split_at_mut(b);
    (&mut head[a], &mut tail[0])
}

/// Advances entity kinematics one fixed step at a time
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    bounds: WorldBounds,
    /// Current timestep; zero while paused
    dt: f32,
    rng: Pcg32,
}

impl PhysicsEngine {
    pub fn new(width: f32, height: f32, config: PhysicsConfig, seed: u64) -> Self {
        let config = config.sanitized();
        Self {
            bounds: WorldBounds::from_dimensions(width, height, config.wall_margin),
            dt: config.time_step,
            config,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Default constants and a fixed seed
    pub fn with_dimensions(width: f32, height: f32) -> Self {
        Self::new(width, height, PhysicsConfig::default(), 0)
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    pub fn time_step(&self) -> f32 {
        self.dt
    }

    /// Recompute the far walls for a new pane size; the near walls never move
    pub fn update_bounds(&mut self, width: f32, height: f32) {
        self.bounds = WorldBounds::from_dimensions(width, height, self.config.wall_margin);
        log::debug!(
            "Physics bounds now ({}, {}) - ({}, {})",
            self.bounds.min.x,
            self.bounds.min.y,
            self.bounds.max.x,
            self.bounds.max.y
        );
    }

    /// Per-entity pass: gravity, drag, integration, walls, velocity settling
    pub fn apply_physics(&mut self, entities: &mut [Entity]) {
        if !self.is_running() {
            return;
        }
        for entity in entities.iter_mut() {
            self.apply_gravity(entity);
            self.apply_air_resistance(entity);
            entity.update(self.dt, &mut self.rng);
            self.handle_boundary_collisions(entity);
            self.cap_velocity(entity);
        }
    }

    fn apply_gravity(&self, entity: &mut Entity) {
        entity.apply_force(Vec2::new(0.0, self.config.gravity * self.dt));
    }

    fn apply_air_resistance(&self, entity: &mut Entity) {
        entity.apply_force(-self.config.air_resistance * entity.velocity());
    }

    /// Reflect off the walls, X first so the Y pass sees the corrected position
    fn handle_boundary_collisions(&self, entity: &mut Entity) {
        let half = entity.collision_radius();
        let restitution = self.config.restitution;
        let WorldBounds { min, max } = self.bounds;
        let mut pos = entity.position();

        if pos.x - half <= min.x {
            pos.x = min.x + half;
            self.bounce(entity, pos, Vec2::new(-restitution, 1.0));
        } else if pos.x + half >= max.x {
            pos.x = max.x - half;
            self.bounce(entity, pos, Vec2::new(-restitution, 1.0));
        }

        if pos.y - half <= min.y {
            pos.y = min.y + half;
            self.bounce(entity, pos, Vec2::new(1.0, -restitution));
        } else if pos.y + half >= max.y {
            pos.y = max.y - half;
            self.bounce(entity, pos, Vec2::new(1.0, -restitution));
        }
    }

    fn bounce(&self, entity: &mut Entity, pos: Vec2, velocity_scale: Vec2) {
        // Snap the display too: a spring slide back from outside the wall looks wrong
        entity.set_immediate_position(pos);
        entity.set_velocity(entity.velocity() * velocity_scale);
    }

    /// Clamp speed, apply static friction near rest and zero tiny components
    pub fn cap_velocity(&self, entity: &mut Entity) {
        let max = self.config.max_velocity;
        let min = self.config.min_velocity;
        let mut vel = entity.velocity().clamp(Vec2::splat(-max), Vec2::splat(max));

        if vel.length() < min * 3.0 {
            vel *= self.config.static_friction;
        }
        if vel.x.abs() < min {
            vel.x = 0.0;
        }
        if vel.y.abs() < min {
            vel.y = 0.0;
        }

        entity.set_velocity(vel);
    }

    /// Circle test with contact tolerance
    pub fn is_colliding(&self, a: &Entity, b: &Entity) -> bool {
        let distance = a.position().distance(b.position());
        distance < a.collision_radius() + b.collision_radius() - self.config.contact_tolerance
    }

    /// Every overlapping unordered pair, in slice order
    pub fn find_collisions(&self, entities: &[Entity]) -> Vec<CollisionPair> {
        let mut pairs = Vec::new();
        for (i, a) in entities.iter().enumerate() {
            for (j, b) in entities.iter().enumerate().skip(i + 1) {
                if self.is_colliding(a, b) {
                    pairs.push(CollisionPair {
                        first: i,
                        second: j,
                        first_id: a.id(),
                        second_id: b.id(),
                    });
                }
            }
        }
        pairs
    }

    /// Detect and resolve all pairs in a single pass, returning what was found
    ///
    /// Pairs are resolved in order without iterating to convergence, so a
    /// cluster of three or more may keep some overlap until later ticks.
    pub fn handle_collisions(&mut self, entities: &mut [Entity]) -> Vec<CollisionPair> {
        if !self.is_running() {
            return Vec::new();
        }
        let pairs = self.find_collisions(entities);
        for pair in &pairs {
            let (a, b) = pair_mut(entities, pair.first, pair.second);
            self.resolve_collision(a, b);
        }
        pairs
    }

    fn resolve_collision(&mut self, a: &mut Entity, b: &mut Entity) {
        let (pos_a, pos_b) = (a.position(), b.position());
        let mut delta = pos_b - pos_a;
        let mut distance = delta.length();

        if distance == 0.0 {
            delta = Vec2::new(
                self.rng.random_range(-COINCIDENT_JITTER..COINCIDENT_JITTER),
                self.rng.random_range(-COINCIDENT_JITTER..COINCIDENT_JITTER),
            );
            distance = delta.length();
        }
        let normal = if distance > 0.0 {
            delta / distance
        } else {
            Vec2::X
        };

        let min_distance =
            a.collision_radius() + b.collision_radius() - self.config.contact_tolerance;
        let overlap = min_distance - distance;
        if overlap > 0.0 {
            // Half the overlap each; a full push-out would inject energy
            let separation = normal * overlap * SEPARATION_FACTOR;
            a.set_immediate_position(pos_a - separation);
            b.set_immediate_position(pos_b + separation);
        }

        let (mut vel_a, mut vel_b) = (a.velocity(), b.velocity());
        let relative = vel_b - vel_a;
        if relative.dot(normal) > 0.0 {
            // Already separating
            return;
        }

        let relative_speed = relative.length();
        let min_velocity = self.config.min_velocity;
        if relative_speed < min_velocity * 2.0 {
            if relative_speed < min_velocity {
                a.set_velocity(Vec2::ZERO);
                b.set_velocity(Vec2::ZERO);
                return;
            }
            vel_a *= self.config.contact_damping;
            vel_b *= self.config.contact_damping;
        }

        // Equal-mass impulse: afterwards the pair separates at
        // restitution * retention times the approach speed.
        let approach = (vel_b - vel_a).dot(normal);
        let bounce = self.config.restitution * COLLISION_ENERGY_RETENTION;
        let impulse = approach * (1.0 + bounce) / 2.0;

        a.set_velocity(vel_a + normal * impulse);
        b.set_velocity(vel_b - normal * impulse);
    }

    /// Add a uniform random kick within ±magnitude/2 on each axis
    pub fn add_random_velocity(&mut self, entity: &mut Entity, magnitude: f32) {
        if !magnitude.is_finite() || magnitude < 0.0 {
            return;
        }
        let kick = Vec2::new(
            (self.rng.random::<f32>() - 0.5) * magnitude,
            (self.rng.random::<f32>() - 0.5) * magnitude,
        );
        entity.set_velocity(entity.velocity() + kick);
    }

    pub fn gravity(&self) -> f32 {
        self.config.gravity
    }

    /// Non-finite values are ignored
    pub fn set_gravity(&mut self, gravity: f32) {
        if gravity.is_finite() {
            self.config.gravity = gravity;
        } else {
            log::debug!("Ignoring gravity {}", gravity);
        }
    }

    pub fn restitution(&self) -> f32 {
        self.config.restitution
    }

    /// Values outside [0, 1] are ignored
    pub fn set_restitution(&mut self, restitution: f32) {
        if (0.0..=1.0).contains(&restitution) {
            self.config.restitution = restitution;
        } else {
            log::debug!("Ignoring restitution {}", restitution);
        }
    }

    pub fn pause(&mut self) {
        self.dt = 0.0;
        log::debug!("Physics paused");
    }

    pub fn resume(&mut self) {
        self.dt = self.config.time_step;
        log::debug!("Physics resumed (dt = {})", self.dt);
    }

    pub fn is_running(&self) -> bool {
        self.dt > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::PALETTE;
    use proptest::prelude::*;

    fn sphere(x: f32, y: f32, size: i32) -> Entity {
        Entity::sphere(Vec2::new(x, y), size, PALETTE[0])
    }

    #[test]
    fn test_new_engine_defaults() {
        let engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        assert_eq!(engine.gravity(), 25.0);
        assert_eq!(engine.restitution(), 0.7);
        assert_eq!(engine.config().air_resistance, 0.05);
        assert_eq!(engine.bounds().min, Vec2::new(1.0, 1.0));
        assert_eq!(engine.bounds().max, Vec2::new(98.0, 48.0));
        assert_eq!(engine.time_step(), 0.1);
        assert!(engine.is_running());
    }

    #[test]
    fn test_degenerate_dimensions_fall_back() {
        for (w, h) in [(0.0, 0.0), (-10.0, -5.0), (f32::NAN, f32::INFINITY)] {
            let engine = PhysicsEngine::with_dimensions(w, h);
            assert_eq!(engine.bounds().max, Vec2::new(8.0, 8.0));
        }
    }

    #[test]
    fn test_invalid_config_is_sanitized() {
        let config = PhysicsConfig {
            gravity: f32::NAN,
            restitution: 3.0,
            time_step: -1.0,
            max_velocity: 0.0,
            ..Default::default()
        };
        let engine = PhysicsEngine::new(50.0, 50.0, config, 1);
        assert_eq!(engine.gravity(), GRAVITY);
        assert_eq!(engine.restitution(), RESTITUTION);
        assert_eq!(engine.time_step(), PHYSICS_DT);
        assert_eq!(engine.config().max_velocity, MAX_VELOCITY);
    }

    #[test]
    fn test_gravity_accelerates_downward() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 1)];
        engine.apply_physics(&mut entities);

        let vel = entities[0].velocity();
        assert!(vel.y > 0.0);
        assert_eq!(vel.x, 0.0);
    }

    #[test]
    fn test_position_integrates_velocity() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 1)];
        entities[0].set_velocity(Vec2::new(5.0, -3.0));
        engine.apply_physics(&mut entities);

        let pos = entities[0].position();
        assert!((pos.x - 10.5).abs() < 0.1);
        // Gravity outweighs the upward start
        assert!(pos.y > 10.0 - 0.3);
    }

    #[test]
    fn test_left_wall_bounce() {
        let mut engine = PhysicsEngine::with_dimensions(20.0, 20.0);
        let mut entities = [sphere(0.5, 10.0, 2)];
        entities[0].set_velocity(Vec2::new(-5.0, 0.0));
        engine.apply_physics(&mut entities);

        assert!(entities[0].position().x > 0.0);
        assert!(entities[0].position().x > engine.bounds().min.x);
        assert!(entities[0].velocity().x > 0.0);
        // Teleported, not animated back inside
        assert_eq!(entities[0].display_position().x, entities[0].position().x);
    }

    #[test]
    fn test_wall_bounce_scales_by_restitution() {
        let mut engine = PhysicsEngine::with_dimensions(20.0, 20.0);
        let mut entities = [sphere(1.5, 10.0, 2)];
        entities[0].set_velocity(Vec2::new(-5.0, 0.0));
        engine.apply_physics(&mut entities);

        // Drag first: -5 + 0.05 * 5 = -4.75, then reflected
        let expected = 4.75 * 0.7;
        let vx = entities[0].velocity().x;
        assert!((vx - expected).abs() < 1e-4, "vx = {}", vx);

        let pos = entities[0].position();
        let bounds = engine.bounds();
        assert!(pos.x > bounds.min.x && pos.x < bounds.max.x);
    }

    #[test]
    fn test_bottom_wall_bounce() {
        let mut engine = PhysicsEngine::with_dimensions(20.0, 20.0);
        let mut entities = [sphere(10.0, 18.5, 1)];
        entities[0].set_velocity(Vec2::new(0.0, 5.0));
        engine.apply_physics(&mut entities);

        assert!(entities[0].position().y < engine.bounds().max.y);
        assert!(entities[0].velocity().y < 0.0);
    }

    #[test]
    fn test_corner_bounce_reflects_both_axes() {
        let mut engine = PhysicsEngine::with_dimensions(20.0, 20.0);
        engine.set_gravity(0.0);
        let mut entities = [sphere(1.2, 1.2, 2)];
        entities[0].set_velocity(Vec2::new(-5.0, -5.0));
        engine.apply_physics(&mut entities);

        let vel = entities[0].velocity();
        assert!(vel.x > 0.0 && vel.y > 0.0);
        assert_eq!(entities[0].position(), Vec2::new(1.5, 1.5));
    }

    #[test]
    fn test_fast_entity_stays_inside() {
        let mut engine = PhysicsEngine::with_dimensions(10.0, 10.0);
        let mut entities = [sphere(5.0, 5.0, 1)];
        entities[0].set_velocity(Vec2::new(1000.0, 1000.0));
        engine.apply_physics(&mut entities);

        let pos = entities[0].position();
        assert!(pos.x <= engine.bounds().max.x);
        assert!(pos.y <= engine.bounds().max.y);
    }

    #[test]
    fn test_oversized_entity_does_not_panic() {
        let mut engine = PhysicsEngine::with_dimensions(10.0, 10.0);
        let mut entities = [sphere(5.0, 5.0, 20), sphere(1.0, 1.0, 1)];
        engine.apply_physics(&mut entities);
        engine.handle_collisions(&mut entities);
        engine.update_bounds(0.0, 0.0);
        engine.apply_physics(&mut entities);
        assert!(entities.iter().all(|e| e.position().is_finite()));
    }

    #[test]
    fn test_velocity_is_capped() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(50.0, 25.0, 1)];
        entities[0].set_velocity(Vec2::new(100.0, -100.0));
        engine.apply_physics(&mut entities);

        let vel = entities[0].velocity();
        assert!(vel.x.abs() <= 50.0);
        assert!(vel.y.abs() <= 50.0);
    }

    #[test]
    fn test_air_resistance_slows_horizontal_motion() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(50.0, 25.0, 1)];
        entities[0].set_velocity(Vec2::new(10.0, 5.0));
        for _ in 0..10 {
            engine.apply_physics(&mut entities);
        }
        assert!(entities[0].velocity().x.abs() < 10.0);
    }

    #[test]
    fn test_slow_velocity_settles_to_zero() {
        let engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entity = sphere(50.0, 25.0, 1);
        entity.set_velocity(Vec2::new(0.1, 0.1));

        let mut ticks = 0;
        while entity.velocity() != Vec2::ZERO {
            engine.cap_velocity(&mut entity);
            ticks += 1;
            assert!(ticks < 20, "velocity never settled");
        }
        for _ in 0..5 {
            engine.cap_velocity(&mut entity);
            assert_eq!(entity.velocity(), Vec2::ZERO);
        }
    }

    #[test]
    fn test_detects_only_overlapping_pair() {
        let engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let entities = [
            sphere(10.0, 10.0, 2),
            sphere(10.5, 10.5, 2),
            sphere(20.0, 20.0, 2),
        ];
        let pairs = engine.find_collisions(&entities);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].first, pairs[0].second), (0, 1));
        assert!(pairs[0].involves(entities[0].id()));
        assert!(pairs[0].involves(entities[1].id()));
        assert!(!pairs[0].involves(entities[2].id()));
    }

    #[test]
    fn test_contact_tolerance_lets_small_spheres_touch() {
        let engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let a = sphere(10.0, 10.0, 1);
        let b = sphere(10.5, 10.5, 1);
        // 0.707 apart, threshold 0.8 - 0.1: touching but not colliding
        assert!(!engine.is_colliding(&a, &b));
        assert!(a.check_collision(&b));
    }

    #[test]
    fn test_head_on_collision_reverses_both() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 1), sphere(10.6, 10.0, 1)];
        entities[0].set_velocity(Vec2::new(5.0, 0.0));
        entities[1].set_velocity(Vec2::new(-5.0, 0.0));
        let pairs = engine.handle_collisions(&mut entities);

        assert_eq!(pairs.len(), 1);
        assert!(entities[0].velocity().x < 0.0);
        assert!(entities[1].velocity().x > 0.0);
    }

    #[test]
    fn test_collision_impulse_is_symmetric_and_separating() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 2), sphere(10.5, 10.5, 2)];
        entities[0].set_velocity(Vec2::new(3.0, 1.0));
        entities[1].set_velocity(Vec2::new(-2.0, -4.0));
        let before = [entities[0].velocity(), entities[1].velocity()];
        let normal = (entities[1].position() - entities[0].position()).normalize();

        engine.handle_collisions(&mut entities);

        let delta_a = entities[0].velocity() - before[0];
        let delta_b = entities[1].velocity() - before[1];
        assert!((delta_a + delta_b).length() < 1e-4);
        assert!(delta_a.perp_dot(normal).abs() < 1e-4);

        let relative = entities[1].velocity() - entities[0].velocity();
        assert!(relative.dot(normal) > 0.0);
    }

    #[test]
    fn test_overlap_is_partially_separated() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 2), sphere(10.4, 10.0, 2)];
        engine.handle_collisions(&mut entities);

        // Overlap 0.5, half of it split between the two
        assert!((entities[0].position().x - 9.75).abs() < 1e-5);
        assert!((entities[1].position().x - 10.65).abs() < 1e-5);
        assert_eq!(entities[0].display_position(), entities[0].position());
    }

    #[test]
    fn test_separating_pair_keeps_velocity() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 2), sphere(10.5, 10.0, 2)];
        entities[0].set_velocity(Vec2::new(-2.0, 0.0));
        entities[1].set_velocity(Vec2::new(2.0, 0.0));
        engine.handle_collisions(&mut entities);

        assert_eq!(entities[0].velocity(), Vec2::new(-2.0, 0.0));
        assert_eq!(entities[1].velocity(), Vec2::new(2.0, 0.0));
    }

    #[test]
    fn test_resting_contact_stops_both() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 2), sphere(10.5, 10.0, 2)];
        entities[0].set_velocity(Vec2::new(0.01, 0.0));
        entities[1].set_velocity(Vec2::new(-0.01, 0.0));
        engine.handle_collisions(&mut entities);

        assert_eq!(entities[0].velocity(), Vec2::ZERO);
        assert_eq!(entities[1].velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_slow_contact_is_damped() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 2), sphere(10.5, 10.0, 2)];
        entities[0].set_velocity(Vec2::new(0.035, 0.0));
        entities[1].set_velocity(Vec2::new(-0.035, 0.0));
        engine.handle_collisions(&mut entities);

        // Relative speed 0.07: damped to ±0.0315, then the impulse uses those
        let approach = -0.063;
        let impulse = approach * (1.0 + 0.7 * 0.95) / 2.0;
        let expected = 0.0315 + impulse;
        let (va, vb) = (entities[0].velocity(), entities[1].velocity());
        assert!((va.x - expected).abs() < 1e-6, "va = {}", va.x);
        assert!((vb.x + expected).abs() < 1e-6, "vb = {}", vb.x);
        assert_eq!((va.y, vb.y), (0.0, 0.0));

        let separation = vb.x - va.x;
        assert!(separation > 0.0);
        assert!((separation - 0.063 * 0.665).abs() < 1e-6);
    }

    #[test]
    fn test_collision_radius_follows_bounds() {
        let engine = PhysicsEngine::with_dimensions(100.0, 50.0);

        let mut a = sphere(10.0, 10.0, 1);
        let mut b = sphere(11.5, 10.0, 1);
        assert!(!engine.is_colliding(&a, &b));
        a.set_radius(1.0);
        b.set_radius(1.0);
        assert!(engine.is_colliding(&a, &b));
        assert_eq!(engine.find_collisions(&[a, b]).len(), 1);

        // Size 3: both kinds use extent 1.3, so the threshold is 1.2
        let mut rng = Pcg32::seed_from_u64(3);
        let sprite = Entity::sprite(Vec2::new(10.0, 20.0), 3, PALETTE[1], None, &mut rng);
        let near = sphere(11.1, 20.0, 3);
        let far = sphere(8.75, 20.0, 3);
        assert!((sprite.collision_radius() - 0.65).abs() < 1e-6);
        assert!(engine.is_colliding(&sprite, &near));
        assert!(!engine.is_colliding(&sprite, &far));

        let pairs = engine.find_collisions(&[sprite.clone(), far, near]);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].first, pairs[0].second), (0, 2));
        assert_eq!(pairs[0].first_id, sprite.id());
    }

    #[test]
    fn test_coincident_centers_are_pushed_apart() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entities = [sphere(10.0, 10.0, 2), sphere(10.0, 10.0, 2)];
        engine.handle_collisions(&mut entities);

        assert_ne!(entities[0].position(), entities[1].position());
        assert!(entities.iter().all(|e| e.position().is_finite()));
        assert!(entities.iter().all(|e| e.velocity().is_finite()));
    }

    #[test]
    fn test_paused_engine_does_nothing() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        engine.pause();
        assert!(!engine.is_running());
        assert_eq!(engine.time_step(), 0.0);

        let mut entities = [sphere(10.0, 10.0, 2), sphere(10.4, 10.0, 2)];
        entities[0].set_velocity(Vec2::new(3.0, 0.0));
        engine.apply_physics(&mut entities);
        assert!(engine.handle_collisions(&mut entities).is_empty());
        assert_eq!(entities[0].position(), Vec2::new(10.0, 10.0));
        assert_eq!(entities[0].velocity(), Vec2::new(3.0, 0.0));

        engine.resume();
        assert!(engine.is_running());
        assert_eq!(engine.time_step(), 0.1);
    }

    #[test]
    fn test_settings_validation() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        engine.set_gravity(50.0);
        assert_eq!(engine.gravity(), 50.0);
        engine.set_gravity(f32::INFINITY);
        engine.set_gravity(f32::NAN);
        assert_eq!(engine.gravity(), 50.0);

        engine.set_restitution(0.9);
        assert_eq!(engine.restitution(), 0.9);
        engine.set_restitution(1.5);
        engine.set_restitution(-0.1);
        engine.set_restitution(f32::NAN);
        assert_eq!(engine.restitution(), 0.9);
        engine.set_restitution(1.0);
        assert_eq!(engine.restitution(), 1.0);
    }

    #[test]
    fn test_update_bounds_keeps_min() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        engine.update_bounds(200.0, 100.0);
        assert_eq!(engine.bounds().max, Vec2::new(198.0, 98.0));
        assert_eq!(engine.bounds().min, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_random_velocity_within_range() {
        let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
        let mut entity = sphere(10.0, 10.0, 1);
        engine.add_random_velocity(&mut entity, 10.0);

        let vel = entity.velocity();
        assert_ne!(vel, Vec2::ZERO);
        assert!(vel.x.abs() <= 5.0 && vel.y.abs() <= 5.0);

        engine.add_random_velocity(&mut entity, f32::NAN);
        assert_eq!(entity.velocity(), vel);
    }

    #[test]
    fn test_full_cycle_stays_in_bounds() {
        let mut engine = PhysicsEngine::with_dimensions(50.0, 30.0);
        let mut entities = [sphere(25.0, 5.0, 1), sphere(10.0, 10.0, 1)];
        entities[0].set_velocity(Vec2::new(2.0, 0.0));
        entities[1].set_velocity(Vec2::new(-1.0, 3.0));

        for _ in 0..20 {
            engine.apply_physics(&mut entities);
            engine.handle_collisions(&mut entities);
        }

        let bounds = engine.bounds();
        for entity in &entities {
            let pos = entity.position();
            let r = entity.collision_radius();
            assert!(pos.x - r >= bounds.min.x - 1e-4 && pos.x + r <= bounds.max.x + 1e-4);
            assert!(pos.y - r >= bounds.min.y - 1e-4 && pos.y + r <= bounds.max.y + 1e-4);
        }
        assert_ne!(entities[0].position(), Vec2::new(25.0, 5.0));
        assert_ne!(entities[1].position(), Vec2::new(10.0, 10.0));
    }

    proptest! {
        #[test]
        fn prop_state_stays_finite(
            x in 0.0f32..100.0,
            y in 0.0f32..50.0,
            vx in -1000.0f32..1000.0,
            vy in -1000.0f32..1000.0,
            size in -2i32..8,
        ) {
            let mut engine = PhysicsEngine::with_dimensions(100.0, 50.0);
            let mut entities = [sphere(x, y, size), sphere(50.0, 25.0, 1)];
            entities[0].set_velocity(Vec2::new(vx, vy));
            for _ in 0..5 {
                engine.apply_physics(&mut entities);
                engine.handle_collisions(&mut entities);
            }
            for entity in &entities {
                prop_assert!(entity.position().is_finite());
                prop_assert!(entity.velocity().is_finite());
            }
        }
    }
}
