use std::collections::{HashMap, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::RouteConfig;
use super::types::{Action, RoutePhase, StateKey};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub state: StateKey,
    pub action: Action,
    /// Horizontal position reached after the action.
    pub distance: f64,
}

/// Remembers the furthest route ever taken and replays it when the agent
/// needs to find its way back to the frontier.
#[derive(Debug, Clone)]
pub struct RouteTracker {
    config: RouteConfig,
    best_distance: f64,
    route: VecDeque<RouteStep>,
    candidate: VecDeque<RouteStep>,
    candidate_trimmed: usize,
    attempt_start_best: f64,
    attempt_max: f64,
    anchor: f64,
    step_failures: HashMap<usize, u32>,
    replay_index: usize,
    last_replayed: Option<usize>,
    recovering: bool,
    phase: RoutePhase,
    escape_override: Option<f64>,
}

fn push_bounded(steps: &mut VecDeque<RouteStep>, step: RouteStep, max_len: usize) -> usize {
    steps.push_back(step);
    let mut trimmed = 0;
    while steps.len() > max_len.max(1) {
        steps.pop_front();
        trimmed += 1;
    }
    trimmed
}

impl RouteTracker {
    pub fn new(config: RouteConfig) -> Self {
        Self {
            config,
            best_distance: 0.0,
            route: VecDeque::new(),
            candidate: VecDeque::new(),
            candidate_trimmed: 0,
            attempt_start_best: 0.0,
            attempt_max: 0.0,
            anchor: 0.0,
            step_failures: HashMap::new(),
            replay_index: 0,
            last_replayed: None,
            recovering: false,
            phase: RoutePhase::Reset,
            escape_override: None,
        }
    }

    pub fn best_distance(&self) -> f64 {
        self.best_distance
    }

    pub fn route(&self) -> &VecDeque<RouteStep> {
        &self.route
    }

    pub fn candidate(&self) -> &VecDeque<RouteStep> {
        &self.candidate
    }

    pub fn phase(&self) -> RoutePhase {
        self.phase
    }

    pub fn attempt_max(&self) -> f64 {
        self.attempt_max
    }

    pub fn is_recovering(&self) -> bool {
        self.recovering
    }

    pub fn replay_index(&self) -> usize {
        self.replay_index
    }

    pub fn step_failures(&self, index: usize) -> u32 {
        self.step_failures.get(&index).copied().unwrap_or(0)
    }

    pub fn is_step_disabled(&self, index: usize) -> bool {
        self.step_failures(index) >= self.config.max_step_failures
    }

    /// Pins the escape probability, e.g. to 1.0 to force abstention.
    pub fn set_escape_override(&mut self, probability: Option<f64>) {
        self.escape_override = probability;
    }

    pub fn begin_attempt(&mut self, spawn_x: f64) {
        self.candidate.clear();
        self.candidate_trimmed = 0;
        self.attempt_start_best = self.best_distance;
        self.attempt_max = spawn_x;
        self.anchor = spawn_x;
        self.replay_index = 0;
        self.last_replayed = None;
        self.recovering = false;
        self.phase = RoutePhase::Building;
    }

    /// Whether the running (or just finished) attempt beat the best it started with.
    pub fn attempt_set_record(&self) -> bool {
        self.best_distance > self.attempt_start_best
    }

    /// Feeds the position reached after `action` was taken in `state`.
    pub fn observe(&mut self, state: StateKey, action: Option<Action>, x: f64) -> RoutePhase {
        if !x.is_finite() {
            return self.phase;
        }
        self.attempt_max = self.attempt_max.max(x);

        if let Some(action) = action {
            self.append_candidate(RouteStep {
                state,
                action,
                distance: x,
            });
        }

        if x > self.best_distance {
            let extending = self.phase == RoutePhase::ExtendingRecord;
            self.best_distance = x;
            self.adopt_candidate(extending);
            if !extending {
                tracing::debug!(best = x, steps = self.route.len(), "route extending record");
            }
            self.phase = RoutePhase::ExtendingRecord;
        } else if self.phase == RoutePhase::ExtendingRecord {
            self.phase = RoutePhase::Building;
        }
        self.phase
    }

    fn append_candidate(&mut self, step: RouteStep) {
        let gained = step.distance - self.anchor;
        let required = if step.action.is_leftward() {
            self.config.corrective_min_distance
        } else {
            self.config.min_step_progress
        };
        if gained < required {
            return;
        }

        // Same action again one cell over replaces the previous step.
        if let Some(last) = self.candidate.back_mut() {
            if last.action == step.action && last.state.grid_x.abs_diff(step.state.grid_x) <= 1 {
                last.distance = step.distance;
                self.anchor = step.distance;
                return;
            }
        }

        self.candidate_trimmed += push_bounded(&mut self.candidate, step, self.config.max_len);
        self.anchor = step.distance;
    }

    fn adopt_candidate(&mut self, extending: bool) {
        let trimmed = std::mem::take(&mut self.candidate_trimmed);
        self.route = self.candidate.clone();
        if !extending {
            self.step_failures.clear();
            self.replay_index = 0;
            self.last_replayed = None;
        } else if trimmed > 0 {
            self.shift_failures(trimmed);
        }
    }

    fn shift_failures(&mut self, by: usize) {
        self.step_failures = self
            .step_failures
            .drain()
            .filter(|(index, _)| *index >= by)
            .map(|(index, count)| (index - by, count))
            .collect();
        self.replay_index = self.replay_index.saturating_sub(by);
        self.last_replayed = self.last_replayed.and_then(|i| i.checked_sub(by));
    }

    /// Picks the next route step to replay, or `None` to let the selector
    /// decide (escape roll, nothing to replay, or past the end).
    pub fn try_recover<R: Rng + ?Sized>(&mut self, state: &StateKey, stagnant: bool, rng: &mut R) -> Option<Action> {
        if self.route.is_empty() {
            return None;
        }
        let escape = self.escape_override.unwrap_or_else(|| {
            self.config.escape_probability + if stagnant { self.config.stagnant_escape_bonus } else { 0.0 }
        });
        if rng.random_bool(escape.clamp(0.0, 1.0)) {
            return None;
        }

        let end = (self.replay_index + self.config.lookahead).min(self.route.len());
        let matched = (self.replay_index..end)
            .find(|&i| !self.is_step_disabled(i) && self.route[i].state.is_near(state, self.config.tolerance));
        // Nothing nearby: replay the current step unless it has been disabled.
        let index = match matched {
            Some(i) => i,
            None if self.replay_index < self.route.len() && !self.is_step_disabled(self.replay_index) => {
                self.replay_index
            }
            None => return None,
        };

        self.replay_index = index + 1;
        self.last_replayed = Some(index);
        self.recovering = true;
        tracing::debug!(index, action = %self.route[index].action, "replaying route step");
        Some(self.route[index].action)
    }

    pub fn enter_recovery(&mut self) {
        self.recovering = true;
    }

    /// Leaves recovery once `x` is back within the margin of the best.
    /// Returns `true` when this call ended recovery.
    pub fn update_recovery(&mut self, x: f64) -> bool {
        if self.recovering && x >= self.best_distance - self.config.exit_margin {
            self.recovering = false;
            self.record_recovery_success();
            return true;
        }
        false
    }

    pub fn record_recovery_failure(&mut self) {
        let Some(index) = self.last_replayed else {
            return;
        };
        let count = self.step_failures.entry(index).or_insert(0);
        *count = count.saturating_add(1);
        if *count == self.config.max_step_failures {
            tracing::debug!(index, "route step disabled after repeated failures");
        }
    }

    pub fn record_recovery_success(&mut self) {
        if let Some(index) = self.last_replayed.take() {
            self.step_failures.remove(&index);
        }
    }

    /// Stored action for this exact state, if the best route passes through it.
    pub fn suggested_action(&self, state: &StateKey) -> Option<Action> {
        self.route
            .iter()
            .enumerate()
            .find(|(i, step)| step.state == *state && !self.is_step_disabled(*i))
            .map(|(_, step)| step.action)
    }

    pub fn end_attempt(&mut self) -> bool {
        let record = self.attempt_set_record();
        self.recovering = false;
        self.phase = RoutePhase::Reset;
        record
    }

    pub fn restore(&mut self, best_distance: f64, steps: Vec<RouteStep>) {
        self.best_distance = if best_distance.is_finite() { best_distance.max(0.0) } else { 0.0 };
        let skip = steps.len().saturating_sub(self.config.max_len);
        self.route = steps.into_iter().skip(skip).collect();
        self.step_failures.clear();
        self.replay_index = 0;
        self.last_replayed = None;
    }

    pub fn clear(&mut self) {
        let escape_override = self.escape_override;
        *self = Self::new(self.config.clone());
        self.escape_override = escape_override;
    }
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new(RouteConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::types::{HorizontalMotion, VerticalMotion};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn state(x: i32) -> StateKey {
        StateKey {
            grid_x: x,
            grid_y: 0,
            on_ground: true,
            horizontal: HorizontalMotion::Right,
            vertical: VerticalMotion::Neutral,
            goal_bucket: 10,
        }
    }

    fn tracker_with_route(len: i32) -> RouteTracker {
        let mut tracker = RouteTracker::default();
        tracker.begin_attempt(0.0);
        let actions = [Action::JumpRight, Action::MoveRight];
        for i in 0..len {
            let action = actions[(i % 2) as usize];
            tracker.observe(state(i * 5), Some(action), (i as f64 + 1.0) * 100.0);
        }
        tracker.end_attempt();
        tracker
    }

    #[test]
    fn best_distance_never_decreases() {
        let mut tracker = RouteTracker::default();
        tracker.begin_attempt(200.0);
        tracker.observe(state(7), Some(Action::JumpRight), 500.0);
        tracker.end_attempt();
        tracker.begin_attempt(200.0);
        tracker.observe(state(7), Some(Action::MoveLeft), 100.0);
        assert_eq!(tracker.best_distance(), 500.0);
        assert!(!tracker.attempt_set_record());
    }

    #[test]
    fn small_steps_are_filtered() {
        let mut tracker = RouteTracker::default();
        tracker.begin_attempt(200.0);
        tracker.observe(state(6), Some(Action::JumpOnly), 205.0);
        assert!(tracker.candidate().is_empty());
        tracker.observe(state(6), Some(Action::JumpOnly), 220.0);
        assert_eq!(tracker.candidate().len(), 1);
    }

    #[test]
    fn leftward_step_needs_larger_gain() {
        let mut tracker = RouteTracker::default();
        tracker.begin_attempt(0.0);
        tracker.observe(state(0), Some(Action::JumpLeft), 20.0);
        assert!(tracker.candidate().is_empty());
        tracker.observe(state(0), Some(Action::JumpLeft), 40.0);
        assert_eq!(tracker.candidate().len(), 1);
    }

    #[test]
    fn repeated_action_nearby_replaces_last_step() {
        let mut tracker = RouteTracker::default();
        tracker.begin_attempt(0.0);
        tracker.observe(state(1), Some(Action::MoveRight), 30.0);
        tracker.observe(state(2), Some(Action::MoveRight), 60.0);
        assert_eq!(tracker.candidate().len(), 1);
        assert_eq!(tracker.candidate()[0].distance, 60.0);
    }

    #[test]
    fn record_attempt_becomes_stored_route() {
        let tracker = tracker_with_route(4);
        assert_eq!(tracker.route().len(), 4);
        assert_eq!(tracker.best_distance(), 400.0);
        assert_eq!(tracker.phase(), RoutePhase::Reset);
    }

    #[test]
    fn route_is_bounded() {
        let tracker = tracker_with_route(80);
        assert_eq!(tracker.route().len(), RouteConfig::default().max_len);
        assert_eq!(tracker.route().back().map(|s| s.distance), Some(8000.0));
    }

    #[test]
    fn escape_override_forces_abstention() {
        let mut tracker = tracker_with_route(4);
        tracker.set_escape_override(Some(1.0));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(tracker.try_recover(&state(0), false, &mut rng), None);
        }
    }

    #[test]
    fn recovery_matches_nearby_state_within_lookahead() {
        let mut tracker = tracker_with_route(6);
        tracker.set_escape_override(Some(0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let action = tracker.try_recover(&state(10), false, &mut rng);
        assert_eq!(action, Some(Action::JumpRight));
        assert_eq!(tracker.replay_index(), 3);
        assert!(tracker.is_recovering());
    }

    #[test]
    fn failing_step_gets_disabled() {
        let mut tracker = tracker_with_route(2);
        tracker.set_escape_override(Some(0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..3 {
            tracker.begin_attempt(0.0);
            assert_eq!(tracker.try_recover(&state(0), false, &mut rng), Some(Action::JumpRight));
            tracker.record_recovery_failure();
        }
        assert!(tracker.is_step_disabled(0));
        tracker.begin_attempt(0.0);
        // Step 0 is disabled and nothing else is near: exploration takes over.
        assert_eq!(tracker.try_recover(&state(0), false, &mut rng), None);
        assert_eq!(tracker.replay_index(), 0);
        assert_eq!(tracker.try_recover(&state(5), false, &mut rng), Some(Action::MoveRight));
        assert_eq!(tracker.try_recover(&state(5), false, &mut rng), None);
    }

    #[test]
    fn unmatched_state_replays_current_step_only() {
        let mut tracker = tracker_with_route(10);
        tracker.set_escape_override(Some(0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        tracker.begin_attempt(0.0);
        assert_eq!(tracker.try_recover(&state(200), false, &mut rng), Some(Action::JumpRight));
        assert_eq!(tracker.replay_index(), 1);

        for _ in 0..3 {
            tracker.begin_attempt(0.0);
            tracker.try_recover(&state(200), false, &mut rng);
            tracker.record_recovery_failure();
        }
        tracker.begin_attempt(0.0);
        assert_eq!(tracker.try_recover(&state(200), false, &mut rng), None);
        assert_eq!(tracker.replay_index(), 0);
    }

    #[test]
    fn extreme_restored_cells_do_not_overflow() {
        let mut tracker = RouteTracker::default();
        let far = StateKey {
            grid_x: i32::MIN,
            ..state(0)
        };
        tracker.restore(500.0, vec![RouteStep { state: far, action: Action::JumpRight, distance: 500.0 }]);
        tracker.set_escape_override(Some(0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        tracker.begin_attempt(0.0);
        let near_max = StateKey {
            grid_x: i32::MAX,
            ..state(0)
        };
        assert_eq!(tracker.try_recover(&near_max, false, &mut rng), Some(Action::JumpRight));

        tracker.begin_attempt(0.0);
        tracker.observe(far, Some(Action::MoveRight), 40.0);
        tracker.observe(near_max, Some(Action::MoveRight), 80.0);
        assert_eq!(tracker.candidate().len(), 2);
    }

    #[test]
    fn extending_record_ends_once_position_stops_rising() {
        let mut tracker = RouteTracker::default();
        tracker.begin_attempt(200.0);
        assert_eq!(tracker.observe(state(7), Some(Action::MoveRight), 300.0), RoutePhase::ExtendingRecord);
        assert_eq!(tracker.observe(state(7), Some(Action::Wait), 300.0), RoutePhase::Building);
        assert_eq!(tracker.observe(state(8), Some(Action::MoveRight), 340.0), RoutePhase::ExtendingRecord);
    }

    #[test]
    fn recovery_exits_near_best() {
        let mut tracker = tracker_with_route(4);
        tracker.begin_attempt(0.0);
        tracker.enter_recovery();
        assert!(!tracker.update_recovery(300.0));
        assert!(tracker.update_recovery(360.0));
        assert!(!tracker.is_recovering());
    }
}
