use learning_platformer::config::Config;
use learning_platformer::learning::{Agent, JsonFileStore, LearningConfig, TickOutcome};
use learning_platformer::logging::{init_tracing, run_span, LogSettings};
use learning_platformer::physics::Level;
use learning_platformer::session::Session;

fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&LogSettings::from_env(&config.log_level));
    let _run = run_span(config.seed, &config.save_path).entered();

    let learning = LearningConfig::from_env();
    let agent = match config.seed {
        Some(seed) => Agent::with_seed(learning.clone(), seed),
        None => Agent::new(learning.clone()),
    };
    let store = JsonFileStore::new(&config.save_path);
    tracing::info!(
        max_attempts = config.max_attempts,
        tick_hz = config.tick_hz,
        "starting headless learning run"
    );

    let mut session = Session::with_store(Level::standard(), agent, &learning, Box::new(store));
    let dt = config.tick_dt();
    let mut finished = 0u32;

    while finished < config.max_attempts {
        match session.tick(dt) {
            TickOutcome::Died(summary) => {
                finished += 1;
                tracing::info!(
                    attempt = summary.attempt,
                    reached = summary.reached,
                    personal_best = summary.personal_best,
                    cause = ?summary.cause,
                    "attempt summary"
                );
            }
            TickOutcome::Won(summary) => {
                finished += 1;
                tracing::info!(attempt = summary.attempt, elapsed = summary.elapsed, "victory");
            }
            TickOutcome::Running | TickOutcome::Paused => {}
        }
    }

    if let Err(err) = session.force_save() {
        tracing::warn!(error = %err, "final save failed");
    }
    tracing::info!(
        attempts = session.controller().counters().attempts,
        deaths = session.controller().counters().deaths,
        victories = session.controller().counters().victories,
        personal_best = session.agent().route().best_distance(),
        "run finished"
    );
}
