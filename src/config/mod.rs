//! Configuration module for egrader
//!
//! Grader-wide settings (roster column names, default report, timeouts,
//! log level) layered from user config, a local `egrader.toml` and the
//! environment.

mod user_config;

pub use user_config::{GraderConfig, LOCAL_CONFIG_FILE};
