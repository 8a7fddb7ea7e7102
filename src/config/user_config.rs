//! Layered grader configuration
//!
//! Supports loading config from:
//! - Environment variables (`EGRADER_LOG_LEVEL`, `EGRADER_DEFAULT_REPORT`)
//! - ./egrader.toml
//! - ~/.config/egrader/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = "egrader.toml";

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct GraderConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: Option<String>,

    /// Roster column holding the user id (CSV rosters)
    pub id_column: Option<String>,

    /// Roster column holding the repository base address (CSV rosters)
    pub repo_base_column: Option<String>,

    /// Roster column holding the user email (CSV rosters, optional)
    pub email_column: Option<String>,

    /// Report renderer used when `report` is given no type
    pub default_report: Option<String>,

    /// Seconds to wait between clones/pulls
    pub fetch_wait_secs: Option<f64>,

    /// Default timeout for the `run_command` check
    pub command_timeout_secs: Option<u64>,
}

impl GraderConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. Local config (./egrader.toml)
    /// 3. User config (~/.config/egrader/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = GraderConfig::default();

        if let Some(path) = Self::user_config_path().filter(|p| p.exists()) {
            config.merge(Self::from_file(&path)?);
        }

        let local = Path::new(LOCAL_CONFIG_FILE);
        if local.exists() {
            config.merge(Self::from_file(local)?);
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a single TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// Get the user config directory path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("egrader").join("config.toml"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: GraderConfig) {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.id_column.is_some() {
            self.id_column = other.id_column;
        }
        if other.repo_base_column.is_some() {
            self.repo_base_column = other.repo_base_column;
        }
        if other.email_column.is_some() {
            self.email_column = other.email_column;
        }
        if other.default_report.is_some() {
            self.default_report = other.default_report;
        }
        if other.fetch_wait_secs.is_some() {
            self.fetch_wait_secs = other.fetch_wait_secs;
        }
        if other.command_timeout_secs.is_some() {
            self.command_timeout_secs = other.command_timeout_secs;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("EGRADER_LOG_LEVEL") {
            self.log_level = Some(level.to_lowercase());
        }
        if let Some(report) = lookup("EGRADER_DEFAULT_REPORT") {
            self.default_report = Some(report);
        }
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("warn")
    }

    pub fn id_column(&self) -> &str {
        self.id_column.as_deref().unwrap_or("id")
    }

    pub fn repo_base_column(&self) -> &str {
        self.repo_base_column.as_deref().unwrap_or("repo_base")
    }

    pub fn email_column(&self) -> &str {
        self.email_column.as_deref().unwrap_or("email")
    }

    pub fn default_report(&self) -> &str {
        self.default_report.as_deref().unwrap_or("basic")
    }

    pub fn fetch_wait_secs(&self) -> f64 {
        self.fetch_wait_secs.unwrap_or(0.0)
    }

    pub fn command_timeout_secs(&self) -> u64 {
        self.command_timeout_secs.unwrap_or(30)
    }
}
