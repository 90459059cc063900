pub mod exploration;
pub mod heuristic;
pub mod ucb;

pub use exploration::{ExplorationMode, ExplorationSchedule};
pub use heuristic::HeuristicBonus;
pub use ucb::{ucb_score, ActionSelector, Selection, SelectionContext};
