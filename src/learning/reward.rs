use std::collections::HashMap;

use super::config::RewardConfig;
use super::types::{Action, Emotion};
use crate::physics::REFERENCE_FPS;

/// Bounded mood plus per-action reinforcement accumulators.
#[derive(Debug, Clone)]
pub struct RewardModel {
    config: RewardConfig,
    mood: f64,
    positive: HashMap<Action, f64>,
    negative: HashMap<Action, f64>,
}

impl RewardModel {
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            mood: 0.0,
            positive: HashMap::new(),
            negative: HashMap::new(),
        }
    }

    fn scaled(&self, intensity: f64, boosted: bool) -> f64 {
        let intensity = if intensity.is_finite() { intensity.abs() } else { 0.0 };
        if boosted {
            intensity * self.config.directional_multiplier
        } else {
            intensity
        }
    }

    pub fn on_success(&mut self, intensity: f64, action: Option<Action>) {
        let boosted = action.is_some_and(|a| a.is_rightward());
        let amount = self.scaled(intensity, boosted);
        // Never pulls a post-victory mood down to the regular ceiling.
        let ceiling = self.config.mood_cap.max(self.mood);
        self.mood = (self.mood + amount).min(ceiling);
        if let Some(action) = action {
            let cap = self.config.reinforcement_cap;
            let slot = self.positive.entry(action).or_insert(0.0);
            *slot = (*slot + amount).min(cap);
        }
    }

    pub fn on_failure(&mut self, intensity: f64, action: Option<Action>) {
        let boosted = action.is_some_and(|a| a.is_leftward());
        let amount = self.scaled(intensity, boosted);
        self.mood = (self.mood - amount).max(-self.config.mood_cap);
        if let Some(action) = action {
            let cap = self.config.reinforcement_cap;
            let slot = self.negative.entry(action).or_insert(0.0);
            *slot = (*slot + amount).min(cap);
        }
    }

    pub fn on_stagnation(&mut self) {
        self.mood = (self.mood - self.config.stagnation_penalty).max(-self.config.mood_cap);
    }

    /// The only path that lifts mood past the regular ceiling.
    pub fn on_victory(&mut self, intensity: f64) {
        let amount = self.scaled(intensity, false);
        self.mood = (self.mood + amount).min(self.config.victory_cap);
    }

    pub fn decay(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.mood *= self.config.decay_per_frame.powf(dt * REFERENCE_FPS);
    }

    pub fn on_death_decay(&mut self) {
        self.mood *= self.config.death_decay;
    }

    pub fn mood(&self) -> f64 {
        self.mood
    }

    pub fn emotion(&self) -> Emotion {
        if self.mood <= self.config.frustrated_below {
            Emotion::Frustrated
        } else if self.mood >= self.config.content_above {
            Emotion::Content
        } else {
            Emotion::Neutral
        }
    }

    pub fn positive(&self, action: Action) -> f64 {
        self.positive.get(&action).copied().unwrap_or(0.0)
    }

    pub fn negative(&self, action: Action) -> f64 {
        self.negative.get(&action).copied().unwrap_or(0.0)
    }

    /// Net reinforcement in `[-1, 1]`.
    pub fn bias(&self, action: Action) -> f64 {
        let cap = self.config.reinforcement_cap.max(f64::EPSILON);
        (self.positive(action) - self.negative(action)) / cap
    }

    /// Restores persisted values, clamping them into their valid ranges.
    pub fn restore(&mut self, mood: f64, positive: HashMap<Action, f64>, negative: HashMap<Action, f64>) {
        let cap = self.config.reinforcement_cap;
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, cap) } else { 0.0 };
        self.mood = if mood.is_finite() {
            mood.clamp(-self.config.mood_cap, self.config.victory_cap)
        } else {
            0.0
        };
        self.positive = positive.into_iter().map(|(a, v)| (a, clamp(v))).collect();
        self.negative = negative.into_iter().map(|(a, v)| (a, clamp(v))).collect();
    }

    pub fn reset(&mut self) {
        self.mood = 0.0;
        self.positive.clear();
        self.negative.clear();
    }
}

impl Default for RewardModel {
    fn default() -> Self {
        Self::new(RewardConfig::default())
    }
}
