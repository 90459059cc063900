//! Physics/collision contract consumed by the learning agent.
//!
//! The agent never inspects platform identity. It issues a [`ControlInput`]
//! per tick through an [`Environment`] and reads back the resolved
//! [`PhysicalState`] together with the [`ContactFlags`] raised by whatever the
//! body is standing on.

pub mod body;
pub mod geometry;
pub mod level;
pub mod platform;
pub mod powerup;

use bitflags::bitflags;

pub use body::Body;
pub use geometry::Rect;
pub use level::Level;
pub use platform::{Platform, PlatformKind};
pub use powerup::{JumpBoost, PowerUp, PowerUpKind};

/// Frame rate the per-frame physics constants were tuned at.
pub const REFERENCE_FPS: f64 = 60.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

/// Continuous state of the body sampled after collision resolution.
///
/// `y` grows downward, so negative `vel_y` means rising.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhysicalState {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub on_ground: bool,
}

bitflags! {
    /// Platform and pickup side effects observed during the last step.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ContactFlags: u8 {
        const ON_ICE = 1 << 0;
        const ON_BOUNCY = 1 << 1;
        const ON_ONE_WAY = 1 << 2;
        const DISAPPEAR_REQUESTED = 1 << 3;
        const RIDING_ELEVATOR = 1 << 4;
        const POWERUP_COLLECTED = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub state: PhysicalState,
    pub can_double_jump: bool,
    pub contacts: ContactFlags,
}

/// Everything the episode controller needs from the world.
pub trait Environment {
    fn observe(&self) -> PhysicalState;

    /// Horizontal coordinate the agent is trying to reach.
    fn goal_x(&self) -> f64;

    fn spawn_x(&self) -> f64;

    fn step(&mut self, input: ControlInput, dt: f64) -> StepReport;

    /// Body is below the lethal boundary.
    fn is_dead(&self) -> bool;

    /// Body intersects the goal region.
    fn reached_goal(&self) -> bool;

    /// Put the body back at the spawn point with zero velocity.
    fn respawn(&mut self);
}
