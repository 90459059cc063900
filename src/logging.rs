use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "learning-platformer.log";
const DEFAULT_LOG_DIR: &str = "./logs";

/// Keeps the background log writer alive; drop it last.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Where the run's logs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    /// Daily rolling file output, when enabled.
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    /// `ENABLE_FILE_LOGS` switches the file output on, `LOG_DIR` moves it.
    pub fn from_env(filter: &str) -> Self {
        let enabled = std::env::var("ENABLE_FILE_LOGS").ok();
        let dir = std::env::var("LOG_DIR").ok();
        Self::resolve(filter, enabled.as_deref(), dir.as_deref())
    }

    fn resolve(filter: &str, enabled: Option<&str>, dir: Option<&str>) -> Self {
        let file_dir = matches!(enabled, Some("true") | Some("1"))
            .then(|| PathBuf::from(dir.filter(|d| !d.is_empty()).unwrap_or(DEFAULT_LOG_DIR)));
        Self {
            filter: filter.to_string(),
            file_dir,
        }
    }
}

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(dir: &Path) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {err}", dir.display());
        return None;
    }
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

/// Installs the global subscriber. The file layer is skipped, with a note on
/// stderr, when its directory cannot be created.
pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let (file_layer, guard) = match settings.file_dir.as_deref().and_then(file_writer) {
        Some((writer, guard)) => {
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
            (Some(layer), Some(FileLogGuard { _guard: guard }))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(&settings.filter))
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    guard
}

/// Root span for one headless run; every attempt log line carries the seed
/// and the snapshot location.
pub fn run_span(seed: Option<u64>, save_path: &Path) -> tracing::Span {
    match seed {
        Some(seed) => tracing::info_span!("run", seed, save_path = %save_path.display()),
        None => tracing::info_span!("run", seed = "random", save_path = %save_path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_output_is_opt_in() {
        let settings = LogSettings::resolve("debug", None, Some("/tmp/x"));
        assert_eq!(settings.file_dir, None);
        assert_eq!(settings.filter, "debug");
        assert_eq!(LogSettings::resolve("info", Some("no"), None).file_dir, None);
    }

    #[test]
    fn file_dir_defaults_when_unset_or_blank() {
        let default = Some(PathBuf::from(DEFAULT_LOG_DIR));
        assert_eq!(LogSettings::resolve("info", Some("1"), None).file_dir, default);
        assert_eq!(LogSettings::resolve("info", Some("true"), Some("")).file_dir, default);
        assert_eq!(
            LogSettings::resolve("info", Some("true"), Some("/var/log/lp")).file_dir,
            Some(PathBuf::from("/var/log/lp"))
        );
    }

    #[test]
    fn unwritable_log_dir_skips_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        assert!(file_writer(&blocker.join("logs")).is_none());
    }
}
