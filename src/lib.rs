pub mod config;
pub mod learning;
pub mod logging;
pub mod physics;
pub mod session;
