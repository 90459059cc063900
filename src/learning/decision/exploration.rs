use std::collections::VecDeque;

use crate::learning::config::ExplorationConfig;

/// How the controller wants the exploration probability adjusted for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ExplorationMode {
    #[default]
    Computed,
    /// At least this rate.
    Boosted(f64),
    /// Computed rate plus this amount.
    Additive(f64),
    /// Exactly this rate.
    Fixed(f64),
}

/// Decaying exploration rate with a trailing success window.
#[derive(Debug, Clone)]
pub struct ExplorationSchedule {
    config: ExplorationConfig,
    window: VecDeque<bool>,
}

impl ExplorationSchedule {
    pub fn new(config: ExplorationConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.struggle_window),
            config,
        }
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    pub fn record_outcome(&mut self, success: bool) {
        self.window.push_back(success);
        while self.window.len() > self.config.struggle_window.max(1) {
            self.window.pop_front();
        }
    }

    /// `None` until the window has filled once.
    pub fn trailing_success_rate(&self) -> Option<f64> {
        if self.window.is_empty() || self.window.len() < self.config.struggle_window {
            return None;
        }
        let successes = self.window.iter().filter(|s| **s).count();
        Some(successes as f64 / self.window.len() as f64)
    }

    pub fn base_rate(&self, states_with_success: usize, attempts: u32) -> f64 {
        let c = &self.config;
        let knowledge = 1.0 + states_with_success as f64 / c.success_state_scale.max(f64::EPSILON);
        let experience = 1.0 + attempts as f64 / c.attempt_scale.max(f64::EPSILON);
        let mut rate = (c.initial_rate / (knowledge * experience)).max(c.min_rate);

        if let Some(recent) = self.trailing_success_rate() {
            if recent < c.struggle_threshold {
                rate = rate.max(c.struggle_rate);
            }
        }
        rate.clamp(0.0, 1.0)
    }

    pub fn effective_rate(&self, mode: ExplorationMode, states_with_success: usize, attempts: u32) -> f64 {
        let rate = match mode {
            ExplorationMode::Computed => self.base_rate(states_with_success, attempts),
            ExplorationMode::Boosted(floor) => self.base_rate(states_with_success, attempts).max(floor),
            ExplorationMode::Additive(extra) => self.base_rate(states_with_success, attempts) + extra,
            ExplorationMode::Fixed(rate) => rate,
        };
        if rate.is_finite() {
            rate.clamp(0.0, 1.0)
        } else {
            self.config.min_rate
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self::new(ExplorationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_decays_but_keeps_floor() {
        let schedule = ExplorationSchedule::default();
        let early = schedule.base_rate(0, 0);
        let later = schedule.base_rate(40, 25);
        let late = schedule.base_rate(100_000, 100_000);
        assert!((early - 0.9).abs() < 1e-9);
        assert!(later < early);
        assert!((late - ExplorationConfig::default().min_rate).abs() < 1e-9);
    }

    #[test]
    fn struggling_window_reboosts() {
        let mut schedule = ExplorationSchedule::default();
        let quiet = schedule.base_rate(1000, 1000);
        for _ in 0..30 {
            schedule.record_outcome(false);
        }
        let boosted = schedule.base_rate(1000, 1000);
        assert!(boosted > quiet);
        assert!((boosted - 0.45).abs() < 1e-9);
    }

    #[test]
    fn modes_adjust_rate() {
        let schedule = ExplorationSchedule::default();
        let base = schedule.base_rate(1000, 1000);
        assert_eq!(schedule.effective_rate(ExplorationMode::Boosted(0.6), 1000, 1000), 0.6);
        assert!((schedule.effective_rate(ExplorationMode::Additive(0.15), 1000, 1000) - (base + 0.15)).abs() < 1e-9);
        assert_eq!(schedule.effective_rate(ExplorationMode::Fixed(2.0), 0, 0), 1.0);
    }
}
