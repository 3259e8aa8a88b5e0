//! Simulation entities
//!
//! Every entity is a circle approximated by its bounding box. Spheres and
//! sprites share one record; the [`Variant`] carries what differs (radius for
//! spheres, glyph frames for sprites).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::animation::{AnimationState, Smoother};
use crate::consts::SPRITE_FRAME_CHANCE;
use crate::{finite_or, finite_vec_or};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique entity identifier, never reused within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity type tag (what the renderer switches on)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Sphere,
    Sprite,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Sphere, EntityKind::Sprite];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sphere => "sphere",
            EntityKind::Sprite => "sprite",
        }
    }
}

/// 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Colors offered to the user for new entities
pub const PALETTE: [Color; 16] = [
    Color::rgb(0x00, 0xFF, 0x7F), // Spring Green
    Color::rgb(0xFF, 0xD7, 0x00), // Gold
    Color::rgb(0x1E, 0x90, 0xFF), // Dodger Blue
    Color::rgb(0xFF, 0x69, 0xB4), // Hot Pink
    Color::rgb(0x00, 0xCE, 0xD1), // Dark Turquoise
    Color::rgb(0xFF, 0x45, 0x00), // Orange Red
    Color::rgb(0xF0, 0xF8, 0xFF), // Alice Blue
    Color::rgb(0xFF, 0x63, 0x47), // Tomato
    Color::rgb(0x40, 0xE0, 0xD0), // Turquoise
    Color::rgb(0x87, 0xCE, 0xEB), // Sky Blue
    Color::rgb(0x98, 0xFB, 0x98), // Pale Green
    Color::rgb(0xFF, 0xA5, 0x00), // Orange
    Color::rgb(0xDA, 0x70, 0xD6), // Orchid
    Color::rgb(0x20, 0xB2, 0xAA), // Light Sea Green
    Color::rgb(0xFF, 0xB6, 0xC1), // Light Pink
    Color::rgb(0xAD, 0xFF, 0x2F), // Green Yellow
];

/// Symbols a sprite picks from when none is given
pub const SPRITE_SYMBOLS: [&str; 8] = ["◆", "◇", "★", "☆", "▲", "△", "♦", "♢"];

const SPHERE_SYMBOL: &str = "●";

/// Diameter used for mass, collision box and glyph scale
pub fn effective_extent(size: u32) -> f32 {
    match size {
        0 | 1 => 0.8,
        2 => 1.0,
        3 => 1.3,
        4 => 1.6,
        n => n as f32 * 0.8,
    }
}

/// Negative sizes fall back to the smallest class
fn size_class(size: i32) -> u32 {
    u32::try_from(size).unwrap_or(1)
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub size: Vec2,
}

impl Bounds {
    pub fn centered(center: Vec2, extent: f32) -> Self {
        Self {
            min: center - Vec2::splat(extent / 2.0),
            size: Vec2::splat(extent),
        }
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }

    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    /// Touching edges count as overlapping
    pub fn overlaps(&self, other: &Bounds) -> bool {
        let (a_max, b_max) = (self.max(), other.max());
        !(a_max.x < other.min.x
            || b_max.x < self.min.x
            || a_max.y < other.min.y
            || b_max.y < self.min.y)
    }
}

/// What differs between entity kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Variant {
    Sphere {
        radius: f32,
    },
    Sprite {
        frames: Vec<String>,
        current_frame: usize,
    },
}

/// A simulated body
///
/// Serialize-only: entities are built by the factories so ids stay unique
/// and mass follows the size class.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    id: EntityId,
    /// Physics position (authoritative for collisions)
    pos: Vec2,
    vel: Vec2,
    size: u32,
    mass: f32,
    color: Color,
    symbol: String,
    variant: Variant,
    animation: AnimationState,
}

impl Entity {
    /// Create a sphere; mass equals its effective extent
    pub fn sphere(pos: Vec2, size: i32, color: Color) -> Self {
        let size = size_class(size);
        let extent = effective_extent(size);
        Self::with_variant(
            pos,
            size,
            extent,
            color,
            SPHERE_SYMBOL.to_string(),
            Variant::Sphere {
                radius: extent / 2.0,
            },
        )
    }

    /// Create a sprite, 20% lighter than a sphere of the same size
    ///
    /// A missing or empty symbol is drawn from [`SPRITE_SYMBOLS`].
    pub fn sprite<R: Rng + ?Sized>(
        pos: Vec2,
        size: i32,
        color: Color,
        symbol: Option<&str>,
        rng: &mut R,
    ) -> Self {
        let size = size_class(size);
        let symbol = match symbol {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => SPRITE_SYMBOLS
                .choose(rng)
                .copied()
                .unwrap_or(SPRITE_SYMBOLS[0])
                .to_string(),
        };
        Self::with_variant(
            pos,
            size,
            effective_extent(size) * 0.8,
            color,
            symbol.clone(),
            Variant::Sprite {
                frames: vec![symbol],
                current_frame: 0,
            },
        )
    }

    fn with_variant(
        pos: Vec2,
        size: u32,
        mass: f32,
        color: Color,
        symbol: String,
        variant: Variant,
    ) -> Self {
        let pos = finite_vec_or(pos, Vec2::ZERO);
        Self {
            id: EntityId::next(),
            pos,
            vel: Vec2::ZERO,
            size,
            mass,
            color,
            symbol,
            variant,
            animation: AnimationState::new(pos),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        match self.variant {
            Variant::Sphere { .. } => EntityKind::Sphere,
            Variant::Sprite { .. } => EntityKind::Sprite,
        }
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    pub fn position(&self) -> Vec2 {
        self.pos
    }

    /// Move the physics position; the display follows on the next animation steps
    pub fn set_position(&mut self, pos: Vec2) {
        self.pos = finite_vec_or(pos, self.pos);
        self.animation.set_target(self.pos);
    }

    /// Move physics and display position together (no visible slide)
    pub fn set_immediate_position(&mut self, pos: Vec2) {
        self.pos = finite_vec_or(pos, self.pos);
        self.animation.set_immediate(self.pos);
    }

    pub fn display_position(&self) -> Vec2 {
        self.animation.display_position()
    }

    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    /// Advance the display position one spring step
    pub fn update_animation(&mut self, smoother: &Smoother) {
        smoother.advance(&mut self.animation);
    }

    pub fn velocity(&self) -> Vec2 {
        self.vel
    }

    /// Non-finite components are reset to zero
    pub fn set_velocity(&mut self, vel: Vec2) {
        self.vel = finite_vec_or(vel, Vec2::ZERO);
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Instantaneous force: velocity changes by `force / mass`
    pub fn apply_force(&mut self, force: Vec2) {
        if self.mass > 0.0 {
            self.set_velocity(self.vel + force / self.mass);
        }
    }

    /// Integrate position over `dt` and retarget the animation
    ///
    /// Sprites with more than one frame may also advance their glyph.
    pub fn update<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R) {
        let dt = finite_or(dt, 0.0);
        self.set_position(self.pos + self.vel * dt);

        let animated = matches!(&self.variant, Variant::Sprite { frames, .. } if frames.len() > 1);
        if animated && rng.random_bool(SPRITE_FRAME_CHANCE) {
            self.next_frame();
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Change size class; extent, mass and sphere radius follow
    pub fn set_size(&mut self, size: i32) {
        self.size = size_class(size);
        let extent = effective_extent(self.size);
        match &mut self.variant {
            Variant::Sphere { radius } => {
                *radius = extent / 2.0;
                self.mass = extent;
            }
            Variant::Sprite { .. } => self.mass = extent * 0.8,
        }
    }

    pub fn effective_extent(&self) -> f32 {
        effective_extent(self.size)
    }

    /// Sphere radius, `None` for sprites
    pub fn sphere_radius(&self) -> Option<f32> {
        match self.variant {
            Variant::Sphere { radius } => Some(radius),
            Variant::Sprite { .. } => None,
        }
    }

    /// Set a sphere's radius directly, snapping the size class to the nearest match
    ///
    /// Ignored for sprites and for non-positive or non-finite radii.
    pub fn set_radius(&mut self, new_radius: f32) {
        if !new_radius.is_finite() || new_radius <= 0.0 {
            return;
        }
        if let Variant::Sphere { radius } = &mut self.variant {
            *radius = new_radius;
            self.size = if new_radius <= 0.4 {
                1
            } else if new_radius <= 0.5 {
                2
            } else if new_radius <= 0.65 {
                3
            } else {
                4
            };
            self.mass = effective_extent(self.size);
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Replace the symbol; a sprite's animation collapses to this single frame
    pub fn set_symbol(&mut self, symbol: &str) {
        if symbol.is_empty() {
            return;
        }
        self.symbol = symbol.to_string();
        if let Variant::Sprite {
            frames,
            current_frame,
        } = &mut self.variant
        {
            *frames = vec![self.symbol.clone()];
            *current_frame = 0;
        }
    }

    /// Give a sprite a glyph sequence (ignored for spheres or empty input)
    pub fn set_animation(&mut self, new_frames: Vec<String>) {
        if new_frames.is_empty() {
            return;
        }
        if let Variant::Sprite {
            frames,
            current_frame,
        } = &mut self.variant
        {
            self.symbol = new_frames[0].clone();
            *frames = new_frames;
            *current_frame = 0;
        }
    }

    /// Step a sprite to its next glyph frame
    pub fn next_frame(&mut self) {
        if let Variant::Sprite {
            frames,
            current_frame,
        } = &mut self.variant
        {
            if frames.len() > 1 {
                *current_frame = (*current_frame + 1) % frames.len();
                self.symbol = frames[*current_frame].clone();
            }
        }
    }

    /// Collision box: the exact circle box for spheres, the extent box otherwise
    pub fn bounds(&self) -> Bounds {
        match self.variant {
            Variant::Sphere { radius } => Bounds::centered(self.pos, radius * 2.0),
            Variant::Sprite { .. } => Bounds::centered(self.pos, self.effective_extent()),
        }
    }

    /// Radius used by the physics engine for circle tests
    pub fn collision_radius(&self) -> f32 {
        self.bounds().width() / 2.0
    }

    /// Bounding-box overlap test
    pub fn check_collision(&self, other: &Entity) -> bool {
        self.bounds().overlaps(&other.bounds())
    }

    /// Glyph to draw, scaled by size class
    pub fn glyph(&self) -> &str {
        match (self.size, self.kind()) {
            (1, EntityKind::Sphere) => "●",
            (1, EntityKind::Sprite) => "◆",
            (2, EntityKind::Sphere) => "⬤",
            (2, EntityKind::Sprite) => "◉",
            (3, EntityKind::Sphere) => "⭘",
            (3, EntityKind::Sprite) => "⬢",
            (4, EntityKind::Sphere) => "⬢",
            (4, EntityKind::Sprite) => "⬛",
            _ => &self.symbol,
        }
    }
}
