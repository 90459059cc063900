use super::config::EncoderConfig;
use super::types::{HorizontalMotion, StateKey, VerticalMotion};
use crate::physics::PhysicalState;

fn horizontal_bucket(vel_x: f64, deadband: f64) -> HorizontalMotion {
    if vel_x > deadband {
        HorizontalMotion::Right
    } else if vel_x < -deadband {
        HorizontalMotion::Left
    } else {
        HorizontalMotion::Still
    }
}

fn vertical_bucket(vel_y: f64, on_ground: bool, deadband: f64) -> VerticalMotion {
    if on_ground {
        VerticalMotion::Neutral
    } else if vel_y < -deadband {
        VerticalMotion::Rising
    } else if vel_y > deadband {
        VerticalMotion::Falling
    } else {
        VerticalMotion::Neutral
    }
}

fn cell(value: f64, size: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    (value / size.max(f64::EPSILON)).floor().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Maps the continuous body state onto its [`StateKey`].
///
/// Pure and total: non-finite inputs fall into cell 0, the goal bucket is
/// capped so the key space stays bounded.
pub fn encode(state: &PhysicalState, goal_x: f64, config: &EncoderConfig) -> StateKey {
    let deadband = config.velocity_deadband.abs();
    let distance = (goal_x - state.x).abs();
    let goal_bucket = if distance.is_finite() {
        (distance / config.goal_bucket_size.max(f64::EPSILON))
            .floor()
            .min(config.goal_bucket_cap as f64) as u8
    } else {
        config.goal_bucket_cap
    };

    StateKey {
        grid_x: cell(state.x, config.cell_size),
        grid_y: cell(state.y, config.cell_size),
        on_ground: state.on_ground,
        horizontal: horizontal_bucket(state.vel_x, deadband),
        vertical: vertical_bucket(state.vel_y, state.on_ground, deadband),
        goal_bucket,
    }
}
