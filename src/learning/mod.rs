//! The learning agent: state encoding, outcome memory, mood, the
//! personal-best route, UCB1 action selection and the episode loop that
//! ties them to an [`Environment`](crate::physics::Environment).

pub mod agent;
pub mod config;
pub mod decision;
pub mod encoder;
pub mod engine;
pub mod memory;
pub mod persistence;
pub mod reward;
pub mod route;
pub mod types;

pub use agent::Agent;
pub use config::LearningConfig;
pub use engine::{DeathCause, EpisodeController, EpisodeCounters, EpisodeSummary, TickOutcome};
pub use memory::{MemoryEntry, MemoryStore};
pub use persistence::{JsonFileStore, LearningSnapshot, PersistenceError, SnapshotStore};
pub use reward::RewardModel;
pub use route::{RouteStep, RouteTracker};
pub use types::{Action, DecisionSource, Emotion, MemoryKey, StateKey};
