//! Rules file loaders
//!
//! A rules file is an ordered list of rules. Both formats share the same
//! shape and the same validation (non-negative weights, unique repos).

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{GraderError, GraderResult};
use crate::models::{validate_rules, Rule};
use crate::plugins::{Plugin, PluginRegistry, RulesLoader};

fn rules_error(path: &Path, reason: impl ToString) -> GraderError {
    GraderError::RulesFormat {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}

fn finish(path: &Path, rules: Vec<Rule>) -> GraderResult<Vec<Rule>> {
    validate_rules(&rules)?;
    debug!("Loaded {} rules from {:?}", rules.len(), path);
    Ok(rules)
}

/// YAML rules (`.yaml`, `.yml`)
pub struct YamlLoader;

impl Plugin for YamlLoader {
    fn name(&self) -> &str {
        "yaml"
    }

    fn doc(&self) -> &str {
        "Load assessment rules from a YAML file."
    }
}

impl RulesLoader for YamlLoader {
    fn extensions(&self) -> &[&'static str] {
        &["yaml", "yml"]
    }

    fn load(&self, path: &Path) -> GraderResult<Vec<Rule>> {
        let content = fs::read_to_string(path)?;
        let rules: Vec<Rule> =
            serde_yaml::from_str(&content).map_err(|e| rules_error(path, e))?;
        finish(path, rules)
    }
}

/// JSON rules (`.json`)
pub struct JsonLoader;

impl Plugin for JsonLoader {
    fn name(&self) -> &str {
        "json"
    }

    fn doc(&self) -> &str {
        "Load assessment rules from a JSON file."
    }
}

impl RulesLoader for JsonLoader {
    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn load(&self, path: &Path) -> GraderResult<Vec<Rule>> {
        let content = fs::read_to_string(path)?;
        let rules: Vec<Rule> =
            serde_json::from_str(&content).map_err(|e| rules_error(path, e))?;
        finish(path, rules)
    }
}

/// Load a rules file with the loader registered for its extension.
pub fn load_rules(plugins: &PluginRegistry, path: &Path) -> GraderResult<Vec<Rule>> {
    plugins.loader_for(path)?.load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML_RULES: &str = r#"
- repo: hw1
  weight: 0.6
  assessments:
    - name: min_commits
      weight: 0.5
      params:
        minimum: 3
    - name: repo_exists
      weight: 0.5
  inter_assessments:
    - name: more_commits_bonus
      params:
        bonuses: [0.1, 0.05]
- repo: hw2
  weight: 0.4
"#;

    #[test]
    fn test_yaml_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yml");
        fs::write(&path, YAML_RULES).unwrap();

        let rules = load_rules(&PluginRegistry::builtin(), &path).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].repo, "hw1");
        assert_eq!(rules[0].assessments.len(), 2);
        assert_eq!(rules[0].assessments[0].params["minimum"], 3);
        assert!(rules[0].assessments[1].params.is_empty());
        assert_eq!(rules[0].inter_assessments[0].weight, 1.0);
        assert!(rules[1].assessments.is_empty());
    }

    #[test]
    fn test_json_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"[{"repo": "hw1", "weight": 1.0,
                 "assessments": [{"name": "repo_exists", "weight": 1.0}]}]"#,
        )
        .unwrap();

        let rules = load_rules(&PluginRegistry::builtin(), &path).unwrap();
        assert_eq!(rules[0].assessments[0].name, "repo_exists");
    }

    #[test]
    fn test_duplicate_repo_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yaml");
        fs::write(&path, "- repo: hw1\n  weight: 1\n- repo: hw1\n  weight: 1\n").unwrap();

        let err = load_rules(&PluginRegistry::builtin(), &path).unwrap_err();
        assert!(matches!(err, GraderError::DuplicateRepo(_)));
    }

    #[test]
    fn test_malformed_rules_name_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.yml");
        fs::write(&path, "- repo: [not, a, string]\n").unwrap();

        let err = load_rules(&PluginRegistry::builtin(), &path).unwrap_err();
        assert!(matches!(err, GraderError::RulesFormat { .. }));
        assert!(err.to_string().contains("rules.yml"));
    }

    #[test]
    fn test_unknown_extension() {
        let err = load_rules(&PluginRegistry::builtin(), Path::new("rules.txt")).unwrap_err();
        assert!(matches!(err, GraderError::PluginLoad { .. }));
    }
}
