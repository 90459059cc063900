use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::exploration::{ExplorationMode, ExplorationSchedule};
use super::heuristic::HeuristicBonus;
use crate::learning::config::ExplorationConfig;
use crate::learning::memory::MemoryStore;
use crate::learning::reward::RewardModel;
use crate::learning::types::{Action, DecisionSource, StateKey};

const FALLBACK_ACTIONS: [Action; 2] = [Action::JumpRight, Action::JumpOnly];

/// Per-decision inputs owned by the controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext {
    pub attempts: u32,
    pub exploration: ExplorationMode,
    pub route_hint: Option<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub action: Action,
    pub source: DecisionSource,
    pub score: f64,
    pub exploration_rate: f64,
}

/// `mean + c * sqrt(ln(visits) / attempts)`; untried pairs are infinitely attractive.
pub fn ucb_score(mean: f64, state_visits: u32, attempts: u32, c: f64) -> f64 {
    if attempts == 0 {
        return f64::INFINITY;
    }
    let visits = state_visits.max(1) as f64;
    mean + c * (visits.ln() / attempts as f64).sqrt()
}

#[derive(Debug, Clone)]
pub struct ActionSelector {
    schedule: ExplorationSchedule,
    heuristic: HeuristicBonus,
}

impl ActionSelector {
    pub fn new(config: ExplorationConfig) -> Self {
        Self {
            schedule: ExplorationSchedule::new(config),
            heuristic: HeuristicBonus::default(),
        }
    }

    pub fn schedule(&self) -> &ExplorationSchedule {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut ExplorationSchedule {
        &mut self.schedule
    }

    fn config(&self) -> &ExplorationConfig {
        self.schedule.config()
    }

    /// Actions not yet proven bad here. Never empty.
    pub fn candidates(&self, state: &StateKey, memory: &MemoryStore) -> Vec<Action> {
        let allowed: Vec<Action> = Action::ALL
            .into_iter()
            .filter(|a| !memory.is_known_failure(state, *a))
            .collect();
        if allowed.is_empty() {
            FALLBACK_ACTIONS.to_vec()
        } else {
            allowed
        }
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        state: &StateKey,
        memory: &MemoryStore,
        reward: &RewardModel,
        ctx: &SelectionContext,
        rng: &mut R,
    ) -> Selection {
        let rate = self
            .schedule
            .effective_rate(ctx.exploration, memory.states_with_success(), ctx.attempts);
        let candidates = self.candidates(state, memory);
        let exhausted = Action::ALL.iter().all(|a| memory.is_known_failure(state, *a));

        if rng.random_bool(rate) {
            let action = self.explore(&candidates, rng);
            return Selection {
                action,
                source: if exhausted { DecisionSource::Fallback } else { DecisionSource::Explore },
                score: 0.0,
                exploration_rate: rate,
            };
        }

        let (action, score) = self.exploit(state, memory, reward, ctx, &candidates, rng);
        Selection {
            action,
            source: if exhausted { DecisionSource::Fallback } else { DecisionSource::Exploit },
            score,
            exploration_rate: rate,
        }
    }

    fn explore<R: Rng + ?Sized>(&self, candidates: &[Action], rng: &mut R) -> Action {
        let config = self.config();
        let progressive: Vec<Action> = candidates.iter().copied().filter(|a| a.is_progressive()).collect();
        if !progressive.is_empty() && rng.random_bool(config.upward_bias.clamp(0.0, 1.0)) {
            if let Some(action) = progressive.choose(rng) {
                return *action;
            }
        }

        let weights: Vec<f64> = candidates
            .iter()
            .map(|a| if a.is_leftward() { config.leftward_weight.max(0.0) } else { 1.0 })
            .collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => candidates[dist.sample(rng)],
            Err(_) => candidates.choose(rng).copied().unwrap_or(Action::JumpRight),
        }
    }

    /// `(action, score, heuristic bonus)` for every candidate.
    pub fn scores(
        &self,
        state: &StateKey,
        memory: &MemoryStore,
        reward: &RewardModel,
        route_hint: Option<Action>,
        candidates: &[Action],
    ) -> Vec<(Action, f64, f64)> {
        let visits = memory.visits(state);
        candidates
            .iter()
            .map(|&action| {
                let bonus = self.heuristic.total(action, state, reward, route_hint);
                let ucb = ucb_score(
                    memory.mean_reward(state, action),
                    visits,
                    memory.attempts(state, action),
                    self.config().ucb_c,
                );
                (action, ucb + bonus, bonus)
            })
            .collect()
    }

    fn exploit<R: Rng + ?Sized>(
        &self,
        state: &StateKey,
        memory: &MemoryStore,
        reward: &RewardModel,
        ctx: &SelectionContext,
        candidates: &[Action],
        rng: &mut R,
    ) -> (Action, f64) {
        let mut scored = self.scores(state, memory, reward, ctx.route_hint, candidates);
        // Descending by score, then bonus (separates untried actions), stable otherwise.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.2.total_cmp(&a.2)));

        let Some(&(best, best_score, _)) = scored.first() else {
            return (Action::JumpRight, 0.0);
        };

        let all_finite = scored.iter().all(|(_, s, _)| s.is_finite());
        if all_finite && memory.confidence(state, best) < self.config().low_confidence {
            let top: Vec<(Action, f64, f64)> = scored.iter().copied().take(self.config().top_k.max(1)).collect();
            if let Some(&(action, score, _)) = top.choose(rng) {
                return (action, score);
            }
        }
        (best, best_score)
    }
}

impl Default for ActionSelector {
    fn default() -> Self {
        Self::new(ExplorationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::types::{HorizontalMotion, VerticalMotion};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn state() -> StateKey {
        StateKey {
            grid_x: 4,
            grid_y: 10,
            on_ground: true,
            horizontal: HorizontalMotion::Still,
            vertical: VerticalMotion::Neutral,
            goal_bucket: 20,
        }
    }

    fn exploit_only() -> SelectionContext {
        SelectionContext {
            exploration: ExplorationMode::Fixed(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn untried_scores_infinite() {
        assert_eq!(ucb_score(0.0, 10, 0, 1.4), f64::INFINITY);
        let tried = ucb_score(0.5, 10, 5, 1.4);
        assert!(tried.is_finite() && tried > 0.5);
        assert_eq!(ucb_score(0.5, 0, 1, 1.4), 0.5);
    }

    #[test]
    fn cold_start_prefers_jump_right() {
        let selector = ActionSelector::default();
        let memory = MemoryStore::default();
        let reward = RewardModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let selection = selector.select(&state(), &memory, &reward, &exploit_only(), &mut rng);
        assert_eq!(selection.action, Action::JumpRight);
        assert_eq!(selection.source, DecisionSource::Exploit);
    }

    #[test]
    fn known_failures_are_never_chosen() {
        let selector = ActionSelector::default();
        let mut memory = MemoryStore::default();
        for action in [Action::JumpRight, Action::MoveRight, Action::JumpOnly] {
            for _ in 0..3 {
                memory.record_failure(state(), action);
            }
        }
        let reward = RewardModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let ctx = SelectionContext {
                exploration: ExplorationMode::Fixed(0.5),
                ..Default::default()
            };
            let action = selector.select(&state(), &memory, &reward, &ctx, &mut rng).action;
            assert!(!memory.is_known_failure(&state(), action));
        }
    }

    #[test]
    fn exhausted_state_falls_back_to_jumps() {
        let selector = ActionSelector::default();
        let mut memory = MemoryStore::default();
        for action in Action::ALL {
            for _ in 0..3 {
                memory.record_failure(state(), action);
            }
        }
        assert_eq!(selector.candidates(&state(), &memory), FALLBACK_ACTIONS.to_vec());
    }

    #[test]
    fn confident_best_is_exploited_deterministically() {
        let selector = ActionSelector::default();
        let mut memory = MemoryStore::default();
        for action in Action::ALL.into_iter().filter(|a| *a != Action::MoveRight) {
            for i in 0..20 {
                if i % 4 == 0 {
                    memory.record_success(state(), action, 20.0);
                } else {
                    memory.record_failure(state(), action);
                }
            }
        }
        for _ in 0..20 {
            memory.record_success(state(), Action::MoveRight, 40.0);
        }
        let reward = RewardModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..20 {
            let selection = selector.select(&state(), &memory, &reward, &exploit_only(), &mut rng);
            assert_eq!(selection.action, Action::MoveRight);
        }
    }
}
