use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::config::MemoryConfig;
use super::types::{Action, MemoryKey, StateKey};

/// Outcome counters for one (state, action) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub success_count: u32,
    pub failure_count: u32,
    pub attempt_count: u32,
    pub avg_progress: f64,
}

impl MemoryEntry {
    pub fn success_rate(&self) -> f64 {
        self.success_count as f64 / self.attempt_count.max(1) as f64
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    config: MemoryConfig,
    entries: HashMap<MemoryKey, MemoryEntry>,
    visits: HashMap<StateKey, u32>,
    successful_states: HashSet<StateKey>,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            visits: HashMap::new(),
            successful_states: HashSet::new(),
        }
    }

    /// Rebuilds a store from restored tables. Counters are taken as given;
    /// callers repair inconsistencies before handing them over.
    pub fn from_parts(
        config: MemoryConfig,
        entries: HashMap<MemoryKey, MemoryEntry>,
        visits: HashMap<StateKey, u32>,
    ) -> Self {
        let successful_states = entries
            .iter()
            .filter(|(_, e)| e.success_count > 0)
            .map(|(k, _)| k.state)
            .collect();
        let mut store = Self {
            config,
            entries,
            visits,
            successful_states,
        };
        let max = store.config.max_entries;
        store.trim_to(max);
        store
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn record_success(&mut self, state: StateKey, action: Action, progress: f64) {
        let alpha = self.config.progress_alpha;
        let entry = self.entries.entry(MemoryKey::new(state, action)).or_default();
        let progress = if progress.is_finite() { progress } else { 0.0 };
        entry.avg_progress = if entry.attempt_count == 0 {
            progress
        } else {
            alpha * progress + (1.0 - alpha) * entry.avg_progress
        };
        entry.success_count = entry.success_count.saturating_add(1);
        entry.attempt_count = entry.attempt_count.saturating_add(1);
        debug_assert_eq!(
            u64::from(entry.success_count) + u64::from(entry.failure_count),
            u64::from(entry.attempt_count)
        );
        self.successful_states.insert(state);
        self.bump_visit(state);
        self.trim_if_needed();
    }

    pub fn record_failure(&mut self, state: StateKey, action: Action) {
        let entry = self.entries.entry(MemoryKey::new(state, action)).or_default();
        entry.failure_count = entry.failure_count.saturating_add(1);
        entry.attempt_count = entry.attempt_count.saturating_add(1);
        debug_assert_eq!(
            u64::from(entry.success_count) + u64::from(entry.failure_count),
            u64::from(entry.attempt_count)
        );
        self.bump_visit(state);
        self.trim_if_needed();
    }

    fn bump_visit(&mut self, state: StateKey) {
        let visits = self.visits.entry(state).or_insert(0);
        *visits = visits.saturating_add(1);
    }

    pub fn entry(&self, state: &StateKey, action: Action) -> Option<&MemoryEntry> {
        self.entries.get(&MemoryKey::new(*state, action))
    }

    pub fn attempts(&self, state: &StateKey, action: Action) -> u32 {
        self.entry(state, action).map(|e| e.attempt_count).unwrap_or(0)
    }

    pub fn visits(&self, state: &StateKey) -> u32 {
        self.visits.get(state).copied().unwrap_or(0)
    }

    /// Success rate damped by how often the pair was tried. 0 for unseen pairs.
    pub fn confidence(&self, state: &StateKey, action: Action) -> f64 {
        let Some(entry) = self.entry(state, action) else {
            return 0.0;
        };
        let experience = (entry.attempt_count as f64 / self.config.confidence_attempts.max(1) as f64).min(1.0);
        (entry.success_rate() * experience).clamp(0.0, 1.0)
    }

    pub fn is_known_failure(&self, state: &StateKey, action: Action) -> bool {
        self.entry(state, action).is_some_and(|e| {
            e.attempt_count >= self.config.known_failure_attempts
                && e.success_rate() < self.config.known_failure_rate
        })
    }

    /// Highest-confidence action above the threshold. Ties go to the earlier
    /// action in [`Action::ALL`].
    pub fn best_action(&self, state: &StateKey) -> Option<Action> {
        let mut best: Option<(Action, f64)> = None;
        for action in Action::ALL {
            let confidence = self.confidence(state, action);
            if confidence <= self.config.best_action_confidence {
                continue;
            }
            if best.map_or(true, |(_, c)| confidence > c) {
                best = Some((action, confidence));
            }
        }
        best.map(|(action, _)| action)
    }

    /// Empirical reward used as the UCB1 mean.
    pub fn mean_reward(&self, state: &StateKey, action: Action) -> f64 {
        self.entry(state, action).map(|e| e.success_rate()).unwrap_or(0.0)
    }

    pub fn states_with_success(&self) -> usize {
        self.successful_states.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&MemoryKey, &MemoryEntry)> {
        self.entries.iter()
    }

    pub fn visit_counts(&self) -> impl Iterator<Item = (&StateKey, &u32)> {
        self.visits.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.visits.clear();
        self.successful_states.clear();
    }

    /// Trims in batches down to 90% of the cap so a full store does not
    /// rank every entry on each new pair.
    fn trim_if_needed(&mut self) {
        let max = self.config.max_entries;
        if self.entries.len() > max {
            self.trim_to(max - max / 10);
        }
    }

    /// Evicts the least-attempted entries until at most `max` remain.
    /// Visit counts of states with no remaining entry go with them.
    pub fn trim_to(&mut self, max: usize) {
        if self.entries.len() <= max {
            return;
        }
        let mut ranked: Vec<(MemoryKey, u32)> =
            self.entries.iter().map(|(k, e)| (*k, e.attempt_count)).collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let excess = self.entries.len() - max;
        for (key, _) in ranked.into_iter().take(excess) {
            self.entries.remove(&key);
        }

        let live: HashSet<StateKey> = self.entries.keys().map(|k| k.state).collect();
        self.visits.retain(|state, _| live.contains(state));
        self.successful_states = self
            .entries
            .iter()
            .filter(|(_, e)| e.success_count > 0)
            .map(|(k, _)| k.state)
            .collect();
        tracing::debug!(evicted = excess, remaining = self.entries.len(), "memory trimmed");
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}
