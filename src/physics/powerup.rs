use serde::{Deserialize, Serialize};

use super::geometry::Rect;

pub const POWERUP_SIZE: f64 = 24.0;
pub const JUMP_BOOST_SECONDS: f64 = 10.0;
pub const JUMP_BOOST_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    JumpBoost,
}

impl PowerUpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JumpBoost => "jump_boost",
        }
    }
}

/// A timed jump-velocity multiplier carried by the body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpBoost {
    pub multiplier: f64,
    pub remaining: f64,
}

/// A one-shot pickup. Collected pickups stay gone until the level respawns.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerUp {
    pub rect: Rect,
    pub kind: PowerUpKind,
    multiplier: f64,
    duration: f64,
    collected: bool,
}

impl PowerUp {
    /// Centred on (`center_x`, `center_y`).
    pub fn jump_boost(center_x: f64, center_y: f64, multiplier: f64, duration: f64) -> Self {
        let half = POWERUP_SIZE / 2.0;
        Self {
            rect: Rect::new(center_x - half, center_y - half, POWERUP_SIZE, POWERUP_SIZE),
            kind: PowerUpKind::JumpBoost,
            multiplier: if multiplier.is_finite() { multiplier.max(0.0) } else { 1.0 },
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            collected: false,
        }
    }

    pub fn is_collected(&self) -> bool {
        self.collected
    }

    /// Hands out the effect the first time `body` touches the pickup.
    pub fn try_collect(&mut self, body: &Rect) -> Option<JumpBoost> {
        if self.collected || !self.rect.intersects(body) {
            return None;
        }
        self.collected = true;
        match self.kind {
            PowerUpKind::JumpBoost => Some(JumpBoost {
                multiplier: self.multiplier,
                remaining: self.duration,
            }),
        }
    }

    pub fn reset(&mut self) {
        self.collected = false;
    }
}
