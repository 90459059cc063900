use super::geometry::Rect;
use super::powerup::JumpBoost;
use super::{ControlInput, PhysicalState};

pub const PLAYER_WIDTH: f64 = 32.0;
pub const PLAYER_HEIGHT: f64 = 48.0;
pub const PLAYER_SPEED: f64 = 6.0;
pub const PLAYER_JUMP_SPEED: f64 = -18.0;
pub const PLAYER_GRAVITY: f64 = 0.7;
pub const PLAYER_MAX_FALL_SPEED: f64 = 15.0;
pub const FRICTION: f64 = 0.1;
pub const MAX_JUMPS: u32 = 2;

const VELOCITY_SNAP: f64 = 0.1;

/// The controllable body. Constants are per frame at 60 Hz; every update
/// takes the elapsed frame count so variable `dt` stays consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub rect: Rect,
    pub vel_x: f64,
    pub vel_y: f64,
    pub on_ground: bool,
    pub jump_count: u32,
    pub jump_boost: Option<JumpBoost>,
}

impl Body {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            rect: Rect::new(x, y, PLAYER_WIDTH, PLAYER_HEIGHT),
            vel_x: 0.0,
            vel_y: 0.0,
            on_ground: false,
            jump_count: 0,
            jump_boost: None,
        }
    }

    pub fn reset_to(&mut self, x: f64, y: f64) {
        *self = Self::new(x, y);
    }

    /// Horizontal intent and jump. `friction` is the damping of the surface
    /// the body stood on during the previous step.
    pub fn apply_input(&mut self, input: ControlInput, friction: f64, frames: f64) {
        if input.left && !input.right {
            self.vel_x = -PLAYER_SPEED;
        } else if input.right && !input.left {
            self.vel_x = PLAYER_SPEED;
        } else {
            self.vel_x *= (1.0 - friction).powf(frames);
            if self.vel_x.abs() < VELOCITY_SNAP {
                self.vel_x = 0.0;
            }
        }

        if input.jump {
            self.jump();
        }
    }

    pub fn can_jump(&self) -> bool {
        self.on_ground || self.jump_count < MAX_JUMPS
    }

    /// Ground jump or double jump. Both consume one of the available jumps.
    pub fn jump(&mut self) -> bool {
        if !self.can_jump() {
            return false;
        }
        self.vel_y = self.jump_velocity();
        self.on_ground = false;
        self.jump_count += 1;
        true
    }

    pub fn jump_velocity(&self) -> f64 {
        PLAYER_JUMP_SPEED * self.jump_boost.map_or(1.0, |boost| boost.multiplier)
    }

    /// A new boost replaces any running one.
    pub fn grant_jump_boost(&mut self, boost: JumpBoost) {
        self.jump_boost = Some(boost);
    }

    pub fn tick_boost(&mut self, dt: f64) {
        if let Some(boost) = &mut self.jump_boost {
            boost.remaining -= dt;
            if boost.remaining <= 0.0 {
                self.jump_boost = None;
            }
        }
    }

    pub fn apply_gravity(&mut self, frames: f64) {
        self.vel_y = (self.vel_y + PLAYER_GRAVITY * frames).min(PLAYER_MAX_FALL_SPEED);
    }

    pub fn land_on(&mut self, top: f64) {
        self.rect.set_bottom(top);
        self.vel_y = 0.0;
        self.on_ground = true;
        self.jump_count = 0;
    }

    pub fn physical_state(&self) -> PhysicalState {
        PhysicalState {
            x: self.rect.x,
            y: self.rect.y,
            vel_x: self.vel_x,
            vel_y: self.vel_y,
            on_ground: self.on_ground,
        }
    }
}
