//! Error types for the grader library
//!
//! Configuration problems (missing plugins, bad rules, duplicate repos) and
//! broken inter-repo contracts are fatal and surface here. Failures inside a
//! single check never do: check plugins turn them into a grade of 0.

use std::path::PathBuf;
use thiserror::Error;

use crate::plugins::PluginGroup;

/// Errors that abort a grader operation
#[derive(Error, Debug)]
pub enum GraderError {
    #[error("Plugin(s) not found in group '{group}': {}", missing.join(", "))]
    PluginLoad {
        group: PluginGroup,
        missing: Vec<String>,
    },

    #[error("Repository '{0}' appears more than once in the rules")]
    DuplicateRepo(String),

    #[error("Negative weight {weight} for '{name}'")]
    NegativeWeight { name: String, weight: f64 },

    #[error("Invalid parameters for '{plugin}': {reason}")]
    InvalidParams { plugin: String, reason: String },

    #[error("Unable to parse rules file {path:?}: {reason}")]
    RulesFormat { path: PathBuf, reason: String },

    #[error(
        "Inter-repository check '{plugin}' returned {got} grades for {expected} repositories"
    )]
    InterCheckMismatch {
        plugin: String,
        expected: usize,
        got: usize,
    },

    #[error("Required file or folder not found: {0:?}")]
    MissingFile(PathBuf),

    #[error(
        "Assessment folder {0:?} already exists, stopping operation. Check the -e/--existing option for alternative behavior."
    )]
    AssessFolderExists(PathBuf),

    #[error("Roster error in {path:?}: {reason}")]
    Roster { path: PathBuf, reason: String },

    #[error("Invalid arguments: {0}")]
    CliArgs(String),

    #[error("User '{0}' has an invalid repository URL")]
    InvalidUrl(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for grader operations
pub type GraderResult<T> = Result<T, GraderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_load_lists_every_missing_name() {
        let err = GraderError::PluginLoad {
            group: PluginGroup::RepoCheck,
            missing: vec!["foo".into(), "bar".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("repo-check"));
        assert!(msg.contains("foo, bar"));
    }

    #[test]
    fn test_cli_args_message() {
        let err = GraderError::CliArgs("-x, -y".into());
        assert_eq!(err.to_string(), "Invalid arguments: -x, -y");
    }
}
