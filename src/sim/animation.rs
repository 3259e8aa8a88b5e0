//! Spring-smoothed display positions
//!
//! Physics moves the authoritative position in coarse steps; the renderer
//! draws a display position that chases it through a damped spring. Each
//! frame is one closed-form oscillator step, so the scheme is stable for any
//! tension/damping/frame-rate combination.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::{finite_or, finite_vec_or};

const EPSILON: f32 = 1e-4;

/// Spring tuning shared by every entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    /// Frames per second the spring is stepped at
    pub fps: u32,
    /// Angular frequency (higher = faster convergence)
    pub tension: f32,
    /// Damping ratio (>= 1 never overshoots)
    pub damping: f32,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            fps: SPRING_FPS,
            tension: SPRING_TENSION,
            damping: SPRING_DAMPING,
        }
    }
}

/// Precomputed step coefficients of a damped harmonic oscillator
///
/// Relative to the equilibrium `t`, one step maps `(x, v)` to
/// `(x * pos_pos + v * pos_vel, x * vel_pos + v * vel_vel)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pos_pos: f32,
    pos_vel: f32,
    vel_pos: f32,
    vel_vel: f32,
}

impl Spring {
    /// A spring that never moves anything
    pub const IDENTITY: Self = Self {
        pos_pos: 1.0,
        pos_vel: 0.0,
        vel_pos: 0.0,
        vel_vel: 1.0,
    };

    pub fn new(dt: f32, angular_frequency: f32, damping_ratio: f32) -> Self {
        let dt = finite_or(dt, 0.0).max(0.0);
        let omega = finite_or(angular_frequency, 0.0).max(0.0);
        let zeta = finite_or(damping_ratio, 0.0).max(0.0);

        if omega < EPSILON {
            return Self::IDENTITY;
        }

        if zeta > 1.0 + EPSILON {
            // Over-damped: two real roots z1 < z2 < 0 with z1 * z2 = omega^2.
            // z2 is derived from the product to avoid cancellation when zeta is large.
            let root = (zeta * zeta - 1.0).sqrt();
            let z1 = -omega * (zeta + root);
            let z2 = -omega / (zeta + root);
            let e1 = (z1 * dt).exp();
            let e2 = (z2 * dt).exp();
            let inv = 1.0 / (z2 - z1);

            Self {
                pos_pos: (z2 * e1 - z1 * e2) * inv,
                pos_vel: (e2 - e1) * inv,
                vel_pos: z1 * z2 * (e1 - e2) * inv,
                vel_vel: (z2 * e2 - z1 * e1) * inv,
            }
        } else if zeta < 1.0 - EPSILON {
            // Under-damped
            let omega_zeta = omega * zeta;
            let alpha = omega * (1.0 - zeta * zeta).sqrt();
            let exp_term = (-omega_zeta * dt).exp();
            let (sin_term, cos_term) = (alpha * dt).sin_cos();
            let exp_sin = exp_term * sin_term;
            let exp_cos = exp_term * cos_term;
            let exp_omega_zeta_sin_over_alpha = exp_term * omega_zeta * sin_term / alpha;

            Self {
                pos_pos: exp_cos + exp_omega_zeta_sin_over_alpha,
                pos_vel: exp_sin / alpha,
                vel_pos: -exp_sin * alpha - omega_zeta * exp_omega_zeta_sin_over_alpha,
                vel_vel: exp_cos - exp_omega_zeta_sin_over_alpha,
            }
        } else {
            // Critically damped
            let exp_term = (-omega * dt).exp();
            let time_exp = dt * exp_term;
            let time_exp_freq = time_exp * omega;

            Self {
                pos_pos: time_exp_freq + exp_term,
                pos_vel: time_exp,
                vel_pos: -omega * time_exp_freq,
                vel_vel: -time_exp_freq + exp_term,
            }
        }
    }

    /// Build from config, stepping at `1 / fps` seconds
    pub fn from_config(config: &SpringConfig) -> Self {
        let fps = config.fps.max(1) as f32;
        Self::new(1.0 / fps, config.tension, config.damping)
    }

    /// Advance one step toward `target`, returning the new position and velocity
    #[inline]
    pub fn update(&self, pos: f32, vel: f32, target: f32) -> (f32, f32) {
        let offset = pos - target;
        (
            offset * self.pos_pos + vel * self.pos_vel + target,
            offset * self.vel_pos + vel * self.vel_vel,
        )
    }
}

/// Per-entity animation state: what is drawn vs. where physics says it is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationState {
    display: Vec2,
    target: Vec2,
    /// Spring-internal velocity, unrelated to the physics velocity
    velocity: Vec2,
    animating: bool,
}

impl AnimationState {
    /// At rest at `pos`
    pub fn new(pos: Vec2) -> Self {
        Self {
            display: pos,
            target: pos,
            velocity: Vec2::ZERO,
            animating: false,
        }
    }

    pub fn display_position(&self) -> Vec2 {
        self.display
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Chase a new target; a non-finite axis keeps the current display value
    pub fn set_target(&mut self, target: Vec2) {
        self.target = finite_vec_or(target, self.display);
        self.animating = true;
    }

    /// Teleport display and target together, dropping any spring motion
    pub fn set_immediate(&mut self, pos: Vec2) {
        let pos = finite_vec_or(pos, self.display);
        self.display = pos;
        self.target = pos;
        self.velocity = Vec2::ZERO;
        self.animating = false;
    }
}

/// Steps every entity's spring once per frame
#[derive(Debug, Clone)]
pub struct Smoother {
    config: SpringConfig,
    spring: Spring,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(SpringConfig::default())
    }
}

impl Smoother {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            spring: Spring::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &SpringConfig {
        &self.config
    }

    /// Run one spring step on both axes and settle once close enough
    pub fn advance(&self, state: &mut AnimationState) {
        let (x, vx) = self
            .spring
            .update(state.display.x, state.velocity.x, state.target.x);
        let (y, vy) = self
            .spring
            .update(state.display.y, state.velocity.y, state.target.y);

        state.display = Vec2::new(x, y);
        state.velocity = Vec2::new(vx, vy);

        let offset = (state.display - state.target).abs();
        let speed = state.velocity.abs();
        if offset.max_element() < ANIMATION_POSITION_TOLERANCE
            && speed.max_element() < ANIMATION_VELOCITY_THRESHOLD
        {
            state.animating = false;
        }
    }
}
