//! Core data models for egrader
//!
//! Rules and check specs come from the rules file and are read-only for the
//! whole run. The grade tree (`Assessment` → `AssessedRepo` →
//! `AssessedStudent` → `AssessmentResult`) is built fresh by the assessment
//! engine and persisted as a whole.
//!
//! Aggregate grades are methods, never stored fields, so attaching
//! inter-repository assessments after the first pass can't leave a stale
//! total behind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{GraderError, GraderResult};

/// Opaque check parameters, passed through to plugins untouched
pub type Params = Map<String, Value>;

fn default_weight() -> f64 {
    1.0
}

/// A named check plus its weight and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub params: Params,
}

/// Binding of a logical repository name to a weight and its checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub repo: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub assessments: Vec<CheckSpec>,
    #[serde(default)]
    pub inter_assessments: Vec<CheckSpec>,
}

/// Validate a loaded rule set: non-negative weights and unique repo names
pub fn validate_rules(rules: &[Rule]) -> GraderResult<()> {
    let mut seen = HashSet::new();

    for rule in rules {
        if !seen.insert(rule.repo.as_str()) {
            return Err(GraderError::DuplicateRepo(rule.repo.clone()));
        }
        check_weight(&rule.repo, rule.weight)?;
        for spec in rule.assessments.iter().chain(&rule.inter_assessments) {
            check_weight(&format!("{}/{}", rule.repo, spec.name), spec.weight)?;
        }
    }

    Ok(())
}

fn check_weight(name: &str, weight: f64) -> GraderResult<()> {
    // NaN fails this comparison too
    if weight >= 0.0 {
        Ok(())
    } else {
        Err(GraderError::NegativeWeight {
            name: name.to_string(),
            weight,
        })
    }
}

/// Result of running one check against one repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub name: String,
    pub description: String,
    pub parameters: Params,
    pub weight: f64,
    pub grade_raw: f64,
}

impl Assessment {
    pub fn new(spec: &CheckSpec, description: impl Into<String>, grade_raw: f64) -> Self {
        Self {
            name: spec.name.clone(),
            description: description.into(),
            parameters: spec.params.clone(),
            weight: spec.weight,
            grade_raw,
        }
    }

    pub fn grade_final(&self) -> f64 {
        self.grade_raw * self.weight
    }
}

/// All assessments for one (user, logical repository) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedRepo {
    pub name: String,
    pub weight: f64,
    /// Set only when the user had this repository
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub inter_assessments: Vec<Assessment>,
}

impl AssessedRepo {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            local_path: None,
            assessments: Vec::new(),
            inter_assessments: Vec::new(),
        }
    }

    pub fn add_assessment(&mut self, assessment: Assessment) {
        self.assessments.push(assessment);
    }

    pub fn add_inter_assessment(&mut self, assessment: Assessment) {
        self.inter_assessments.push(assessment);
    }

    /// No assessments of either kind; different from a repo that scored zero
    pub fn is_empty(&self) -> bool {
        self.assessments.is_empty() && self.inter_assessments.is_empty()
    }

    /// Intra-repo assessments followed by inter-repo ones
    pub fn all_assessments(&self) -> impl Iterator<Item = &Assessment> {
        self.assessments.iter().chain(&self.inter_assessments)
    }

    pub fn grade_raw(&self) -> f64 {
        self.all_assessments().map(Assessment::grade_final).sum()
    }

    pub fn grade_final(&self) -> f64 {
        self.grade_raw() * self.weight
    }
}

/// One user's grade tree, one `AssessedRepo` per rule in rule order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedStudent {
    pub id: String,
    #[serde(default)]
    pub assessed_repos: Vec<AssessedRepo>,
}

impl AssessedStudent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            assessed_repos: Vec::new(),
        }
    }

    pub fn add_assessed_repo(&mut self, repo: AssessedRepo) {
        self.assessed_repos.push(repo);
    }

    pub fn grade(&self) -> f64 {
        self.assessed_repos.iter().map(AssessedRepo::grade_final).sum()
    }

    pub fn assessment_count(&self) -> usize {
        self.assessed_repos
            .iter()
            .map(|r| r.assessments.len() + r.inter_assessments.len())
            .sum()
    }
}

/// Full output of one assessment run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub students: Vec<AssessedStudent>,
}

impl AssessmentResult {
    pub fn assessment_count(&self) -> usize {
        self.students.iter().map(AssessedStudent::assessment_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, weight: f64) -> CheckSpec {
        CheckSpec {
            name: name.into(),
            weight,
            params: Params::new(),
        }
    }

    #[test]
    fn test_repo_grade_is_weighted_sum() {
        let mut repo = AssessedRepo::new("hw1", 2.0);
        repo.add_assessment(Assessment::new(&spec("a", 0.5), "", 1.0));
        repo.add_assessment(Assessment::new(&spec("b", 0.5), "", 0.0));

        assert_eq!(repo.grade_raw(), 0.5);
        assert_eq!(repo.grade_final(), 1.0);
    }

    #[test]
    fn test_inter_assessments_count_toward_raw_grade() {
        let mut repo = AssessedRepo::new("hw1", 1.0);
        repo.add_assessment(Assessment::new(&spec("a", 1.0), "", 0.5));
        repo.add_inter_assessment(Assessment::new(&spec("bonus", 1.0), "", 0.25));

        assert_eq!(repo.grade_raw(), 0.75);
        assert_eq!(repo.all_assessments().count(), 2);
    }

    #[test]
    fn test_student_grade_tracks_late_inter_assessments() {
        let mut student = AssessedStudent::new("42");
        student.add_assessed_repo(AssessedRepo::new("hw1", 1.0));
        assert_eq!(student.grade(), 0.0);

        student.assessed_repos[0]
            .add_inter_assessment(Assessment::new(&spec("bonus", 1.0), "", 0.3));
        assert!((student.grade() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_empty_repo_is_distinct_from_zero_score() {
        let empty = AssessedRepo::new("hw1", 1.0);
        let mut zero = AssessedRepo::new("hw1", 1.0);
        zero.add_assessment(Assessment::new(&spec("a", 1.0), "", 0.0));

        assert!(empty.is_empty());
        assert!(!zero.is_empty());
        assert_eq!(empty.grade_final(), zero.grade_final());
    }

    #[test]
    fn test_validate_rules_rejects_duplicates() {
        let rule = Rule {
            repo: "hw1".into(),
            weight: 1.0,
            assessments: vec![],
            inter_assessments: vec![],
        };
        let err = validate_rules(&[rule.clone(), rule]).unwrap_err();
        assert!(matches!(err, GraderError::DuplicateRepo(name) if name == "hw1"));
    }

    #[test]
    fn test_validate_rules_rejects_negative_check_weight() {
        let rule = Rule {
            repo: "hw1".into(),
            weight: 1.0,
            assessments: vec![spec("min_commits", -0.5)],
            inter_assessments: vec![],
        };
        let err = validate_rules(&[rule]).unwrap_err();
        assert!(matches!(err, GraderError::NegativeWeight { .. }));
    }

    #[test]
    fn test_check_spec_defaults() {
        let spec: CheckSpec = serde_json::from_str(r#"{"name": "repo_exists"}"#).unwrap();
        assert_eq!(spec.weight, 1.0);
        assert!(spec.params.is_empty());
    }
}
