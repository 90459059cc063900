use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::engine::EpisodeCounters;
use super::memory::{MemoryEntry, MemoryStore};
use super::route::RouteStep;
use super::types::{Action, MemoryKey, StateKey};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("no learning data at {}", .0.display())]
    NotFound(PathBuf),
    #[error("learning data is corrupt: {0}")]
    Corrupt(String),
    #[error("learning data io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// `(state, action, distance)` in text form.
pub type RouteTriple = (String, String, f64);

/// The on-disk document. Every field defaults so older or partial
/// documents still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSnapshot {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success: BTreeMap<String, u32>,
    #[serde(default)]
    pub failure: BTreeMap<String, u32>,
    #[serde(default)]
    pub attempts: BTreeMap<String, u32>,
    #[serde(default)]
    pub avg_progress: BTreeMap<String, f64>,
    #[serde(default)]
    pub state_visits: BTreeMap<String, u32>,
    #[serde(default)]
    pub positive_reinforcement: BTreeMap<String, f64>,
    #[serde(default)]
    pub negative_reinforcement: BTreeMap<String, f64>,
    #[serde(default)]
    pub personal_best: f64,
    #[serde(default)]
    pub personal_best_route: Vec<RouteTriple>,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub victory_count: u32,
    #[serde(default)]
    pub death_count: u32,
    #[serde(default)]
    pub mood: f64,
}

fn current_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for LearningSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: None,
            success: BTreeMap::new(),
            failure: BTreeMap::new(),
            attempts: BTreeMap::new(),
            avg_progress: BTreeMap::new(),
            state_visits: BTreeMap::new(),
            positive_reinforcement: BTreeMap::new(),
            negative_reinforcement: BTreeMap::new(),
            personal_best: 0.0,
            personal_best_route: Vec::new(),
            attempt_count: 0,
            victory_count: 0,
            death_count: 0,
            mood: 0.0,
        }
    }
}

fn lenient_field<T: DeserializeOwned + Default>(map: &serde_json::Map<String, serde_json::Value>, name: &str) -> T {
    match map.get(name) {
        None | Some(serde_json::Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|err| {
            tracing::warn!(field = name, error = %err, "discarding malformed snapshot field");
            T::default()
        }),
    }
}

impl LearningSnapshot {
    pub fn capture(agent: &Agent, counters: &EpisodeCounters) -> Self {
        let mut snapshot = Self {
            saved_at: Some(Utc::now()),
            personal_best: agent.route().best_distance(),
            attempt_count: counters.attempts,
            victory_count: counters.victories,
            death_count: counters.deaths,
            mood: agent.reward().mood(),
            ..Self::default()
        };

        for (key, entry) in agent.memory().entries() {
            let composite = key.to_composite();
            snapshot.success.insert(composite.clone(), entry.success_count);
            snapshot.failure.insert(composite.clone(), entry.failure_count);
            snapshot.attempts.insert(composite.clone(), entry.attempt_count);
            snapshot.avg_progress.insert(composite, entry.avg_progress);
        }
        for (state, visits) in agent.memory().visit_counts() {
            snapshot.state_visits.insert(state.to_string(), *visits);
        }
        for action in Action::ALL {
            let positive = agent.reward().positive(action);
            let negative = agent.reward().negative(action);
            if positive != 0.0 {
                snapshot.positive_reinforcement.insert(action.as_str().to_string(), positive);
            }
            if negative != 0.0 {
                snapshot.negative_reinforcement.insert(action.as_str().to_string(), negative);
            }
        }
        snapshot.personal_best_route = agent
            .route()
            .route()
            .iter()
            .map(|step| (step.state.to_string(), step.action.as_str().to_string(), step.distance))
            .collect();
        snapshot
    }

    /// Loads the snapshot into `agent`, replacing what it knew, and returns
    /// the restored counters. Malformed keys are skipped and inconsistent
    /// counters repaired.
    pub fn apply(&self, agent: &mut Agent) -> EpisodeCounters {
        let mut entries: HashMap<MemoryKey, MemoryEntry> = HashMap::new();
        let mut skipped = 0usize;
        let keys = self
            .success
            .keys()
            .chain(self.failure.keys())
            .chain(self.attempts.keys())
            .chain(self.avg_progress.keys());
        for composite in keys {
            let key = match MemoryKey::from_composite(composite) {
                Ok(key) => key,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            if entries.contains_key(&key) {
                continue;
            }
            let success_count = self.success.get(composite).copied().unwrap_or(0);
            let failure_count = self.failure.get(composite).copied().unwrap_or(0);
            let stored_attempts = self.attempts.get(composite).copied().unwrap_or(0);
            let attempt_count = success_count.saturating_add(failure_count);
            if stored_attempts != attempt_count {
                tracing::warn!(key = %composite, stored_attempts, attempt_count, "repairing attempt count");
            }
            let avg_progress = self
                .avg_progress
                .get(composite)
                .copied()
                .filter(|p| p.is_finite())
                .unwrap_or(0.0);
            entries.insert(
                key,
                MemoryEntry {
                    success_count,
                    failure_count,
                    attempt_count,
                    avg_progress,
                },
            );
        }

        let mut visits: HashMap<StateKey, u32> = HashMap::new();
        for (text, count) in &self.state_visits {
            match text.parse::<StateKey>() {
                Ok(state) => {
                    visits.insert(state, *count);
                }
                Err(_) => skipped += 1,
            }
        }
        for (key, entry) in &entries {
            let visits = visits.entry(key.state).or_insert(0);
            if *visits < entry.attempt_count {
                *visits = entry.attempt_count;
            }
        }

        let parse_reinforcement = |table: &BTreeMap<String, f64>, skipped: &mut usize| {
            let mut out = HashMap::new();
            for (name, value) in table {
                match Action::parse(name) {
                    Some(action) => {
                        out.insert(action, *value);
                    }
                    None => *skipped += 1,
                }
            }
            out
        };
        let positive = parse_reinforcement(&self.positive_reinforcement, &mut skipped);
        let negative = parse_reinforcement(&self.negative_reinforcement, &mut skipped);

        let mut steps = Vec::with_capacity(self.personal_best_route.len());
        for (state, action, distance) in &self.personal_best_route {
            match (state.parse::<StateKey>(), Action::parse(action)) {
                (Ok(state), Some(action)) if distance.is_finite() => steps.push(RouteStep {
                    state,
                    action,
                    distance: *distance,
                }),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "skipped malformed entries while restoring learning data");
        }

        let memory_config = agent.memory().config().clone();
        *agent.memory_mut() = MemoryStore::from_parts(memory_config, entries, visits);
        agent.reward_mut().restore(self.mood, positive, negative);
        agent.route_mut().restore(self.personal_best, steps);

        EpisodeCounters {
            attempts: self.attempt_count,
            deaths: self.death_count,
            victories: self.victory_count,
        }
    }

    /// Parses a document field by field, keeping whatever is well formed.
    pub fn from_value_lenient(value: serde_json::Value) -> Result<Self, PersistenceError> {
        let serde_json::Value::Object(map) = value else {
            return Err(PersistenceError::Corrupt("document is not a JSON object".to_string()));
        };
        if let Ok(snapshot) = serde_json::from_value::<Self>(serde_json::Value::Object(map.clone())) {
            return Ok(snapshot);
        }

        let version = lenient_field::<Option<u32>>(&map, "version").unwrap_or(SNAPSHOT_VERSION);
        Ok(Self {
            version,
            saved_at: lenient_field(&map, "saved_at"),
            success: lenient_field(&map, "success"),
            failure: lenient_field(&map, "failure"),
            attempts: lenient_field(&map, "attempts"),
            avg_progress: lenient_field(&map, "avg_progress"),
            state_visits: lenient_field(&map, "state_visits"),
            positive_reinforcement: lenient_field(&map, "positive_reinforcement"),
            negative_reinforcement: lenient_field(&map, "negative_reinforcement"),
            personal_best: lenient_field(&map, "personal_best"),
            personal_best_route: lenient_field(&map, "personal_best_route"),
            attempt_count: lenient_field(&map, "attempt_count"),
            victory_count: lenient_field(&map, "victory_count"),
            death_count: lenient_field(&map, "death_count"),
            mood: lenient_field(&map, "mood"),
        })
    }
}

/// Where learning snapshots live.
pub trait SnapshotStore {
    fn save(&self, snapshot: &LearningSnapshot) -> Result<(), PersistenceError>;

    fn load(&self) -> Result<LearningSnapshot, PersistenceError>;

    /// Removing a document that does not exist is not an error.
    fn erase(&self) -> Result<(), PersistenceError>;

    fn exists(&self) -> bool;

    /// Empty state when nothing usable is stored.
    fn load_or_default(&self) -> LearningSnapshot {
        match self.load() {
            Ok(snapshot) => snapshot,
            Err(PersistenceError::NotFound(path)) => {
                tracing::info!(path = %path.display(), "no learning data yet, starting fresh");
                LearningSnapshot::default()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load learning data, starting fresh");
                LearningSnapshot::default()
            }
        }
    }
}

/// JSON document on the local filesystem, written atomically.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "learning_data.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, snapshot: &LearningSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();
        std::fs::write(&temp, body)?;
        std::fs::rename(&temp, &self.path)?;
        tracing::debug!(path = %self.path.display(), entries = snapshot.attempts.len(), "learning data saved");
        Ok(())
    }

    fn load(&self) -> Result<LearningSnapshot, PersistenceError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(self.path.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let snapshot = LearningSnapshot::from_value_lenient(value)?;
        if snapshot.version > SNAPSHOT_VERSION {
            tracing::warn!(
                version = snapshot.version,
                supported = SNAPSHOT_VERSION,
                "learning data written by a newer version, unknown fields ignored"
            );
        }
        Ok(snapshot)
    }

    fn erase(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::config::LearningConfig;
    use crate::physics::PhysicalState;

    fn trained_agent() -> Agent {
        let mut agent = Agent::with_seed(LearningConfig::default(), 9);
        let physical = PhysicalState {
            x: 200.0,
            y: 5900.0,
            on_ground: true,
            ..Default::default()
        };
        let state = agent.encode(&physical, 6550.0);
        agent.memory_mut().record_success(state, Action::JumpRight, 40.0);
        agent.memory_mut().record_failure(state, Action::Wait);
        agent.reward_mut().on_success(2.0, Some(Action::JumpRight));
        agent.route_mut().begin_attempt(200.0);
        agent.route_mut().observe(state, Some(Action::JumpRight), 320.0);
        agent
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(PersistenceError::NotFound(_))));
        assert_eq!(store.load_or_default(), LearningSnapshot::default());
        assert!(store.erase().is_ok());
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learning.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(PersistenceError::Corrupt(_))));
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(store.load(), Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn save_then_load_restores_agent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("learning.json"));
        let agent = trained_agent();
        let counters = EpisodeCounters {
            attempts: 3,
            deaths: 2,
            victories: 1,
        };
        store.save(&LearningSnapshot::capture(&agent, &counters)).unwrap();
        assert!(store.exists());

        let mut restored = Agent::with_seed(LearningConfig::default(), 1);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.apply(&mut restored), counters);
        assert_eq!(restored.memory().len(), agent.memory().len());
        assert_eq!(restored.route().best_distance(), 320.0);
        assert_eq!(restored.route().route().len(), 1);
        assert!((restored.reward().mood() - agent.reward().mood()).abs() < 1e-12);
    }

    #[test]
    fn malformed_field_is_recovered_individually() {
        let value = serde_json::json!({
            "version": 1,
            "success": {"0,0,1,S,N,3|jump_right": 2},
            "failure": "oops",
            "personal_best": 750.0,
            "attempt_count": 4
        });
        let snapshot = LearningSnapshot::from_value_lenient(value).unwrap();
        assert!(snapshot.failure.is_empty());
        assert_eq!(snapshot.success.len(), 1);
        assert_eq!(snapshot.personal_best, 750.0);
        assert_eq!(snapshot.attempt_count, 4);
    }

    #[test]
    fn inconsistent_counts_are_repaired_on_apply() {
        let mut snapshot = LearningSnapshot::default();
        let key = "1,2,1,R,N,4|move_right".to_string();
        snapshot.success.insert(key.clone(), 3);
        snapshot.failure.insert(key.clone(), 1);
        snapshot.attempts.insert(key, 99);
        snapshot.success.insert("bogus".to_string(), 5);

        let mut agent = Agent::with_seed(LearningConfig::default(), 2);
        snapshot.apply(&mut agent);
        assert_eq!(agent.memory().len(), 1);
        let (_, entry) = agent.memory().entries().next().unwrap();
        assert_eq!(entry.attempt_count, 4);
    }

    #[test]
    fn extreme_route_cells_restore_without_panicking() {
        let mut snapshot = LearningSnapshot {
            personal_best: 900.0,
            ..LearningSnapshot::default()
        };
        snapshot
            .personal_best_route
            .push(("-2147483648,0,1,R,N,10".to_string(), "jump_right".to_string(), 900.0));

        let mut agent = Agent::with_seed(LearningConfig::default(), 9);
        snapshot.apply(&mut agent);
        agent.route_mut().set_escape_override(Some(0.0));
        agent.route_mut().begin_attempt(200.0);
        let here: StateKey = "3,0,1,R,N,10".parse().unwrap();
        assert_eq!(agent.try_recover(&here, false), Some(Action::JumpRight));
    }
}
