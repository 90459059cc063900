use std::path::PathBuf;

const APP_DIR: &str = "learning-platformer";
const SAVE_FILE: &str = "learning_data.json";

/// Process-level settings for the headless runner.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub save_path: PathBuf,
    pub max_attempts: u32,
    pub tick_hz: f64,
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let save_path = std::env::var("LEARNING_SAVE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_save_path);

        let max_attempts = std::env::var("LEARNING_MAX_ATTEMPTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(100);

        let tick_hz = std::env::var("LEARNING_TICK_HZ")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|hz| hz.is_finite() && *hz > 0.0)
            .unwrap_or(60.0);

        let seed = std::env::var("LEARNING_SEED")
            .ok()
            .and_then(|value| value.parse::<u64>().ok());

        Self {
            log_level,
            save_path,
            max_attempts,
            tick_hz,
            seed,
        }
    }

    pub fn tick_dt(&self) -> f64 {
        1.0 / self.tick_hz
    }
}

pub fn default_save_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR).join(SAVE_FILE))
        .unwrap_or_else(|| PathBuf::from(SAVE_FILE))
}
