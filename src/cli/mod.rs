//! Command line interface for the nearby session handler

pub mod args;
pub mod config;
pub mod replay;

pub use args::{Args, Commands};
pub use config::ConfigDiscovery;
pub use replay::{ReplayScript, ReplayStep, replay, replay_until};
