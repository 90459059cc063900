use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::config::{EpisodeConfig, FeatureFlags, LearningConfig};
use super::decision::{ExplorationMode, SelectionContext};
use super::persistence::{LearningSnapshot, PersistenceError, SnapshotStore};
use super::types::{Action, DecisionSource, Emotion, EpisodePhase, MemoryKey, StateKey};
use crate::physics::{ControlInput, Environment, PhysicalState};

/// Cumulative across sessions; persisted with the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCounters {
    pub attempts: u32,
    pub deaths: u32,
    pub victories: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeathCause {
    Fell,
    /// No new attempt-best for too long.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub attempt: u32,
    pub reached: f64,
    pub personal_best: f64,
    pub new_record: bool,
    pub decisions: usize,
    pub elapsed: f64,
    pub mood: f64,
    pub cause: Option<DeathCause>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Running,
    Paused,
    Died(EpisodeSummary),
    Won(EpisodeSummary),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoggedDecision {
    pub state: StateKey,
    pub action: Action,
    pub x: f64,
    pub y: f64,
    pub source: DecisionSource,
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeState {
    pub phase: EpisodePhase,
    pub counters: EpisodeCounters,
    pub last_distance: f64,
    pub last_action: Option<Action>,
    pub stagnation_timer: f64,
    pub stagnant: bool,
    pub inefficiency_streak: u32,
    pub elapsed: f64,
    pub attempt_best: f64,
    pub since_attempt_best: f64,
    stagnation_anchor: f64,
}

impl EpisodeState {
    fn reset_attempt(&mut self, spawn_x: f64) {
        self.phase = EpisodePhase::Running;
        self.last_distance = spawn_x;
        self.last_action = None;
        self.stagnation_timer = 0.0;
        self.stagnant = false;
        self.stagnation_anchor = spawn_x;
        self.inefficiency_streak = 0;
        self.elapsed = 0.0;
        self.attempt_best = spawn_x;
        self.since_attempt_best = 0.0;
    }
}

/// Drives one agent through attempts: throttled decisions, outcome
/// feedback, death and victory handling, periodic snapshots.
pub struct EpisodeController {
    config: EpisodeConfig,
    flags: FeatureFlags,
    state: EpisodeState,
    log: VecDeque<LoggedDecision>,
    pending: Option<LoggedDecision>,
    input: ControlInput,
    decision_timer: f64,
    attempt_open: bool,
    paused: bool,
    store: Option<Box<dyn SnapshotStore>>,
}

impl EpisodeController {
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            config: config.episode.clone(),
            flags: config.feature_flags.clone(),
            state: EpisodeState::default(),
            log: VecDeque::with_capacity(config.episode.action_log_capacity.min(4096)),
            pending: None,
            input: ControlInput::default(),
            decision_timer: 0.0,
            attempt_open: false,
            paused: false,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn counters(&self) -> EpisodeCounters {
        self.state.counters
    }

    pub fn log(&self) -> &VecDeque<LoggedDecision> {
        &self.log
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current_input(&self) -> ControlInput {
        self.input
    }

    /// Loads stored learning into `agent`. Missing or unreadable data leaves
    /// the agent fresh.
    pub fn restore(&mut self, agent: &mut Agent) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = store.load_or_default();
        self.state.counters = snapshot.apply(agent);
        tracing::info!(
            attempts = self.state.counters.attempts,
            personal_best = agent.route().best_distance(),
            entries = agent.memory().len(),
            "learning data restored"
        );
    }

    pub fn tick<E: Environment + ?Sized>(&mut self, agent: &mut Agent, env: &mut E, dt: f64) -> TickOutcome {
        if self.paused {
            return TickOutcome::Paused;
        }
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        if !self.attempt_open {
            self.begin_attempt(agent, env.spawn_x());
        }

        self.state.elapsed += dt;
        self.state.since_attempt_best += dt;
        agent.reward_mut().decay(dt);

        self.decision_timer -= dt;
        if self.decision_timer <= 0.0 {
            self.decide(agent, env);
            self.decision_timer = self.config.decision_interval.max(0.0);
        }

        let report = env.step(self.input, dt);
        // Jumps are edge triggered; holding would burn the double jump at once.
        self.input.jump = false;

        let x = report.state.x;
        self.observe_position(agent, x);
        self.update_stagnation(agent, x, dt);

        if env.reached_goal() {
            let summary = self.conclude_victory(agent, x);
            env.respawn();
            return TickOutcome::Won(summary);
        }
        if env.is_dead() {
            let summary = self.conclude_death(agent, x, DeathCause::Fell);
            env.respawn();
            return TickOutcome::Died(summary);
        }
        if self.flags.time_limit_enabled && self.state.since_attempt_best >= self.config.max_attempt_seconds {
            let summary = self.conclude_death(agent, x, DeathCause::Timeout);
            env.respawn();
            return TickOutcome::Died(summary);
        }
        TickOutcome::Running
    }

    pub fn begin_attempt(&mut self, agent: &mut Agent, spawn_x: f64) {
        self.state.counters.attempts = self.state.counters.attempts.saturating_add(1);
        self.state.reset_attempt(spawn_x);
        self.log.clear();
        self.pending = None;
        self.input = ControlInput::default();
        self.decision_timer = 0.0;
        self.attempt_open = true;
        agent.route_mut().begin_attempt(spawn_x);
        tracing::debug!(attempt = self.state.counters.attempts, "attempt started");
    }

    fn decide<E: Environment + ?Sized>(&mut self, agent: &mut Agent, env: &E) {
        let physical = env.observe();
        let state = agent.encode(&physical, env.goal_x());
        let (action, source) = self.choose(agent, &state, physical.x);
        self.commit_decision(agent, state, action, source, &physical);
    }

    fn choose(&mut self, agent: &mut Agent, state: &StateKey, x: f64) -> (Action, DecisionSource) {
        let emotion = agent.reward().emotion();
        let best = agent.route().best_distance();

        if self.flags.anger_recovery_enabled && !agent.route().route().is_empty() {
            let frustrated_and_behind =
                emotion == Emotion::Frustrated && best - x > self.config.recovery_distance;
            if frustrated_and_behind || agent.route().is_recovering() {
                if let Some(action) = agent.try_recover(state, self.state.stagnant) {
                    return (action, DecisionSource::Recovery);
                }
            }
        }

        let ctx = SelectionContext {
            attempts: self.state.counters.attempts,
            exploration: self.exploration_mode(agent, x),
            route_hint: agent.route().suggested_action(state),
        };
        let selection = agent.select(state, &ctx);
        (selection.action, selection.source)
    }

    /// Content or close to the frontier explores more; a run of unproductive
    /// decisions adds a flat boost.
    fn exploration_mode(&self, agent: &Agent, x: f64) -> ExplorationMode {
        let exploration_config = agent.selector().schedule().config();
        let best = agent.route().best_distance();
        let near_frontier = best > 0.0 && (best - x).abs() <= self.config.frontier_margin;
        if agent.reward().emotion() == Emotion::Content || near_frontier {
            ExplorationMode::Boosted(exploration_config.happy_rate)
        } else if self.state.inefficiency_streak >= self.config.inefficiency_limit {
            ExplorationMode::Additive(exploration_config.inefficiency_boost)
        } else {
            ExplorationMode::Computed
        }
    }

    /// Applies `action` as the current control input and settles the
    /// previous decision against the position it led to.
    pub fn commit_decision(
        &mut self,
        agent: &mut Agent,
        state: StateKey,
        action: Action,
        source: DecisionSource,
        physical: &PhysicalState,
    ) {
        if !self.attempt_open {
            self.begin_attempt(agent, physical.x);
        }
        self.settle_pending(agent, physical.x, physical.y);

        self.input = action.control_input();
        self.state.last_action = Some(action);
        let decision = LoggedDecision {
            state,
            action,
            x: physical.x,
            y: physical.y,
            source,
        };
        self.pending = Some(decision);
        self.log.push_back(decision);
        while self.log.len() > self.config.action_log_capacity.max(1) {
            self.log.pop_front();
        }
        tracing::trace!(%action, source = source.as_str(), x = physical.x, "decision");
    }

    fn settle_pending(&mut self, agent: &mut Agent, x: f64, y: f64) {
        let Some(previous) = self.pending.take() else {
            return;
        };
        let advanced = x - previous.x;
        let climbed = previous.y - y;
        let progressed =
            advanced >= self.config.meaningful_progress || climbed >= self.config.climb_progress;

        if progressed {
            agent
                .memory_mut()
                .record_success(previous.state, previous.action, advanced.max(climbed));
            agent
                .reward_mut()
                .on_success(self.config.progress_intensity, Some(previous.action));
            self.state.inefficiency_streak = 0;
        } else {
            agent.memory_mut().record_failure(previous.state, previous.action);
            self.state.inefficiency_streak = self.state.inefficiency_streak.saturating_add(1);
        }
        agent.selector_mut().schedule_mut().record_outcome(progressed);
    }

    /// Feeds the body's horizontal position to the route tracker and the
    /// attempt timers.
    pub fn observe_position(&mut self, agent: &mut Agent, x: f64) {
        if !x.is_finite() {
            return;
        }
        if let Some(pending) = self.pending {
            let before = agent.route().best_distance();
            agent.route_mut().observe(pending.state, Some(pending.action), x);
            let after = agent.route().best_distance();
            if after > before && before > 0.0 && self.state.attempt_best <= before {
                tracing::info!(personal_best = after, previous = before, "new personal best");
            }
        }
        if x > self.state.attempt_best {
            self.state.attempt_best = x;
            self.state.since_attempt_best = 0.0;
        }
        if agent.route_mut().update_recovery(x) {
            tracing::debug!(x, "recovery reached the frontier");
        }
        self.state.last_distance = x;
    }

    fn update_stagnation(&mut self, agent: &mut Agent, x: f64, dt: f64) {
        if (x - self.state.stagnation_anchor).abs() > self.config.stagnation_move_epsilon {
            self.state.stagnation_anchor = x;
            self.state.stagnation_timer = 0.0;
            self.state.stagnant = false;
            return;
        }
        self.state.stagnation_timer += dt;
        if self.state.stagnation_timer >= self.config.stagnation_seconds {
            agent.reward_mut().on_stagnation();
            self.state.stagnant = true;
            self.state.stagnation_timer = 0.0;
        }
    }

    fn summary(&self, agent: &Agent, reached: f64, new_record: bool, cause: Option<DeathCause>) -> EpisodeSummary {
        EpisodeSummary {
            attempt: self.state.counters.attempts,
            reached,
            personal_best: agent.route().best_distance(),
            new_record,
            decisions: self.log.len(),
            elapsed: self.state.elapsed,
            mood: agent.reward().mood(),
            cause,
        }
    }

    /// Ends the attempt as a death at `x` and assigns credit to the most
    /// recent decisions.
    pub fn conclude_death(&mut self, agent: &mut Agent, x: f64, cause: DeathCause) -> EpisodeSummary {
        self.state.phase = EpisodePhase::Dying;
        self.observe_position(agent, x);
        // The fatal decision is judged by the credit window, not by its own progress.
        self.pending = None;

        let new_record = agent.route().attempt_set_record();
        let window = self.config.credit_window.min(self.log.len());
        let recent: Vec<LoggedDecision> = self.log.iter().rev().take(window).copied().collect();
        for (age, decision) in recent.iter().enumerate() {
            if new_record {
                agent
                    .memory_mut()
                    .record_success(decision.state, decision.action, (x - decision.x).max(0.0));
                agent
                    .reward_mut()
                    .on_success(self.config.progress_intensity, Some(decision.action));
            } else {
                let weight = 1.0 / (1.0 + age as f64);
                agent.memory_mut().record_failure(decision.state, decision.action);
                agent
                    .reward_mut()
                    .on_failure(self.config.death_intensity * weight, Some(decision.action));
            }
        }

        if !new_record {
            agent.route_mut().record_recovery_failure();
        }
        agent.reward_mut().on_death_decay();
        self.state.counters.deaths = self.state.counters.deaths.saturating_add(1);

        let summary = self.summary(agent, x, new_record, Some(cause));
        tracing::info!(
            attempt = summary.attempt,
            reached = x,
            personal_best = summary.personal_best,
            new_record,
            cause = ?cause,
            mood = summary.mood,
            "attempt ended in death"
        );
        self.finish_attempt(agent);
        summary
    }

    pub fn conclude_victory(&mut self, agent: &mut Agent, x: f64) -> EpisodeSummary {
        self.state.phase = EpisodePhase::Winning;
        self.observe_position(agent, x);
        self.pending = None;

        agent.reward_mut().on_victory(self.config.victory_intensity);
        let mut seen: HashSet<MemoryKey> = HashSet::new();
        let decisions: Vec<LoggedDecision> = self.log.iter().copied().collect();
        for decision in decisions {
            if seen.insert(MemoryKey::new(decision.state, decision.action)) {
                agent
                    .memory_mut()
                    .record_success(decision.state, decision.action, (x - decision.x).max(0.0));
            }
        }
        agent.route_mut().record_recovery_success();
        self.state.counters.victories = self.state.counters.victories.saturating_add(1);

        let new_record = agent.route().attempt_set_record();
        let summary = self.summary(agent, x, new_record, None);
        tracing::info!(
            attempt = summary.attempt,
            victories = self.state.counters.victories,
            decisions = summary.decisions,
            "goal reached"
        );
        self.finish_attempt(agent);
        summary
    }

    fn finish_attempt(&mut self, agent: &mut Agent) {
        agent.route_mut().end_attempt();
        self.state.phase = EpisodePhase::Resetting;
        self.log.clear();
        self.pending = None;
        self.input = ControlInput::default();
        self.attempt_open = false;

        let every = self.config.autosave_every;
        if self.flags.autosave_enabled && every > 0 && self.state.counters.attempts % every == 0 {
            if let Err(err) = self.save(agent) {
                tracing::warn!(error = %err, "autosave failed");
            }
        }
    }

    fn save(&self, agent: &Agent) -> Result<(), PersistenceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let snapshot = LearningSnapshot::capture(agent, &self.state.counters);
        store.save(&snapshot)?;
        tracing::info!(
            attempts = self.state.counters.attempts,
            entries = agent.memory().len(),
            "learning data saved"
        );
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn force_save(&self, agent: &Agent) -> Result<(), PersistenceError> {
        self.save(agent)
    }

    /// Forgets all learning, zeroes the counters and deletes the stored document.
    pub fn erase_all<E: Environment + ?Sized>(&mut self, agent: &mut Agent, env: &mut E) {
        agent.erase();
        self.state = EpisodeState::default();
        if let Some(store) = &self.store {
            if let Err(err) = store.erase() {
                tracing::warn!(error = %err, "failed to delete learning data");
            }
        }
        self.abandon_attempt(agent, env);
        tracing::info!("all learning data erased");
    }

    /// Drops the running attempt without counting it as a death.
    pub fn restart_attempt<E: Environment + ?Sized>(&mut self, agent: &mut Agent, env: &mut E) {
        self.abandon_attempt(agent, env);
        tracing::info!(attempt = self.state.counters.attempts, "attempt restarted");
    }

    fn abandon_attempt<E: Environment + ?Sized>(&mut self, agent: &mut Agent, env: &mut E) {
        agent.route_mut().end_attempt();
        self.log.clear();
        self.pending = None;
        self.input = ControlInput::default();
        self.attempt_open = false;
        self.state.phase = EpisodePhase::Resetting;
        env.respawn();
    }
}
