use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub cell_size: f64,
    /// Speeds below this magnitude count as no motion.
    pub velocity_deadband: f64,
    pub goal_bucket_size: f64,
    pub goal_bucket_cap: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            cell_size: 30.0,
            velocity_deadband: 0.5,
            goal_bucket_size: 100.0,
            goal_bucket_cap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub progress_alpha: f64,
    pub confidence_attempts: u32,
    pub known_failure_attempts: u32,
    pub known_failure_rate: f64,
    pub best_action_confidence: f64,
    pub max_entries: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            progress_alpha: 0.3,
            confidence_attempts: 10,
            known_failure_attempts: 3,
            known_failure_rate: 0.2,
            best_action_confidence: 0.3,
            max_entries: 50_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    pub mood_cap: f64,
    pub victory_cap: f64,
    pub directional_multiplier: f64,
    pub reinforcement_cap: f64,
    pub stagnation_penalty: f64,
    /// Per-frame multiplicative decay at 60 Hz.
    pub decay_per_frame: f64,
    pub death_decay: f64,
    pub frustrated_below: f64,
    pub content_above: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            mood_cap: 10.0,
            victory_cap: 15.0,
            directional_multiplier: 1.5,
            reinforcement_cap: 10.0,
            stagnation_penalty: 0.3,
            decay_per_frame: 0.998,
            death_decay: 0.9,
            frustrated_below: -3.0,
            content_above: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub max_len: usize,
    pub min_step_progress: f64,
    pub corrective_min_distance: f64,
    pub lookahead: usize,
    pub tolerance: i32,
    pub max_step_failures: u32,
    pub escape_probability: f64,
    pub stagnant_escape_bonus: f64,
    pub exit_margin: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_len: 50,
            min_step_progress: 15.0,
            corrective_min_distance: 30.0,
            lookahead: 5,
            tolerance: 1,
            max_step_failures: 3,
            escape_probability: 0.3,
            stagnant_escape_bonus: 0.2,
            exit_margin: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationConfig {
    pub initial_rate: f64,
    pub min_rate: f64,
    pub success_state_scale: f64,
    pub attempt_scale: f64,
    pub struggle_window: usize,
    pub struggle_threshold: f64,
    pub struggle_rate: f64,
    pub upward_bias: f64,
    pub leftward_weight: f64,
    pub happy_rate: f64,
    pub inefficiency_boost: f64,
    pub ucb_c: f64,
    pub low_confidence: f64,
    pub top_k: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            initial_rate: 0.9,
            min_rate: 0.08,
            success_state_scale: 40.0,
            attempt_scale: 25.0,
            struggle_window: 30,
            struggle_threshold: 0.1,
            struggle_rate: 0.45,
            upward_bias: 0.8,
            leftward_weight: 0.25,
            happy_rate: 0.6,
            inefficiency_boost: 0.15,
            ucb_c: 1.4,
            low_confidence: 0.3,
            top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeConfig {
    pub decision_interval: f64,
    pub meaningful_progress: f64,
    pub climb_progress: f64,
    pub stagnation_seconds: f64,
    pub stagnation_move_epsilon: f64,
    pub inefficiency_limit: u32,
    pub credit_window: usize,
    pub death_intensity: f64,
    pub progress_intensity: f64,
    pub victory_intensity: f64,
    pub autosave_every: u32,
    pub max_attempt_seconds: f64,
    pub action_log_capacity: usize,
    pub recovery_distance: f64,
    pub frontier_margin: f64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            decision_interval: 0.1,
            meaningful_progress: 15.0,
            climb_progress: 40.0,
            stagnation_seconds: 3.0,
            stagnation_move_epsilon: 5.0,
            inefficiency_limit: 8,
            credit_window: 5,
            death_intensity: 2.0,
            progress_intensity: 1.0,
            victory_intensity: 15.0,
            autosave_every: 10,
            max_attempt_seconds: 60.0,
            action_log_capacity: 2048,
            recovery_distance: 150.0,
            frontier_margin: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub anger_recovery_enabled: bool,
    pub autosave_enabled: bool,
    pub time_limit_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            anger_recovery_enabled: true,
            autosave_enabled: true,
            time_limit_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LearningConfig {
    pub encoder: EncoderConfig,
    pub memory: MemoryConfig,
    pub reward: RewardConfig,
    pub route: RouteConfig,
    pub exploration: ExplorationConfig,
    pub episode: EpisodeConfig,
    pub feature_flags: FeatureFlags,
}

impl LearningConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LEARNING_ANGER_RECOVERY") {
            config.feature_flags.anger_recovery_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("LEARNING_AUTOSAVE") {
            config.feature_flags.autosave_enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("LEARNING_MEANINGFUL_PROGRESS") {
            if let Ok(v) = val.parse::<f64>() {
                config.episode.meaningful_progress = v.max(0.0);
            }
        }
        if let Ok(val) = std::env::var("LEARNING_STAGNATION_SECONDS") {
            if let Ok(v) = val.parse::<f64>() {
                config.episode.stagnation_seconds = v.max(0.1);
            }
        }
        if let Ok(val) = std::env::var("LEARNING_DECISION_INTERVAL") {
            if let Ok(v) = val.parse::<f64>() {
                config.episode.decision_interval = v.max(0.0);
            }
        }

        config
    }
}
