use crate::learning::{
    Agent, EpisodeController, EpisodeSummary, LearningConfig, PersistenceError, SnapshotStore, TickOutcome,
};
use crate::physics::Environment;

/// One agent learning one environment, with the manual controls a player
/// would have.
pub struct Session<E: Environment> {
    env: E,
    agent: Agent,
    controller: EpisodeController,
}

impl<E: Environment> Session<E> {
    pub fn new(env: E, agent: Agent, controller: EpisodeController) -> Self {
        Self {
            env,
            agent,
            controller,
        }
    }

    /// Builds a session and loads whatever `store` holds into the agent.
    pub fn with_store(env: E, agent: Agent, config: &LearningConfig, store: Box<dyn SnapshotStore>) -> Self {
        let mut session = Self::new(env, agent, EpisodeController::new(config).with_store(store));
        session.controller.restore(&mut session.agent);
        session
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    pub fn controller(&self) -> &EpisodeController {
        &self.controller
    }

    pub fn tick(&mut self, dt: f64) -> TickOutcome {
        self.controller.tick(&mut self.agent, &mut self.env, dt)
    }

    /// Runs until `attempts` attempts have ended or `max_ticks` ticks elapsed.
    pub fn run_attempts(&mut self, attempts: usize, dt: f64, max_ticks: u64) -> Vec<EpisodeSummary> {
        let mut summaries = Vec::with_capacity(attempts);
        let mut ticks = 0u64;
        while summaries.len() < attempts && ticks < max_ticks {
            ticks += 1;
            match self.tick(dt) {
                TickOutcome::Died(summary) | TickOutcome::Won(summary) => summaries.push(summary),
                TickOutcome::Paused => break,
                TickOutcome::Running => {}
            }
        }
        summaries
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn resume(&mut self) {
        self.controller.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.controller.is_paused()
    }

    pub fn force_save(&self) -> Result<(), PersistenceError> {
        self.controller.force_save(&self.agent)
    }

    pub fn erase_all_learning_data(&mut self) {
        self.controller.erase_all(&mut self.agent, &mut self.env);
    }

    pub fn restart_current_attempt(&mut self) {
        self.controller.restart_attempt(&mut self.agent, &mut self.env);
    }
}
