use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::config::LearningConfig;
use super::decision::{ActionSelector, Selection, SelectionContext};
use super::encoder;
use super::memory::MemoryStore;
use super::reward::RewardModel;
use super::route::RouteTracker;
use super::types::{Action, StateKey};
use crate::physics::PhysicalState;

/// Everything the agent has learned, plus the randomness driving its choices.
#[derive(Debug, Clone)]
pub struct Agent {
    config: LearningConfig,
    memory: MemoryStore,
    reward: RewardModel,
    route: RouteTracker,
    selector: ActionSelector,
    rng: ChaCha8Rng,
}

impl Agent {
    pub fn new(config: LearningConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    pub fn with_seed(config: LearningConfig, seed: u64) -> Self {
        Self {
            memory: MemoryStore::new(config.memory.clone()),
            reward: RewardModel::new(config.reward.clone()),
            route: RouteTracker::new(config.route.clone()),
            selector: ActionSelector::new(config.exploration.clone()),
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryStore {
        &mut self.memory
    }

    pub fn reward(&self) -> &RewardModel {
        &self.reward
    }

    pub fn reward_mut(&mut self) -> &mut RewardModel {
        &mut self.reward
    }

    pub fn route(&self) -> &RouteTracker {
        &self.route
    }

    pub fn route_mut(&mut self) -> &mut RouteTracker {
        &mut self.route
    }

    pub fn selector(&self) -> &ActionSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut ActionSelector {
        &mut self.selector
    }

    pub fn encode(&self, state: &PhysicalState, goal_x: f64) -> StateKey {
        encoder::encode(state, goal_x, &self.config.encoder)
    }

    pub fn select(&mut self, state: &StateKey, ctx: &SelectionContext) -> Selection {
        self.selector
            .select(state, &self.memory, &self.reward, ctx, &mut self.rng)
    }

    pub fn try_recover(&mut self, state: &StateKey, stagnant: bool) -> Option<Action> {
        self.route.try_recover(state, stagnant, &mut self.rng)
    }

    /// Forgets everything learned. Configuration and the RNG stream survive.
    pub fn erase(&mut self) {
        self.memory.clear();
        self.reward.reset();
        self.route.clear();
        self.selector.schedule_mut().reset();
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(LearningConfig::default())
    }
}
