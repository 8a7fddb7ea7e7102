//! Assessment engine
//!
//! Evaluates the rules against every user in the registry and builds the
//! grade tree.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   AssessmentEngine                      │
//! ├─────────────────────────────────────────────────────────┤
//! │  0. Resolve every check the rules name (all-or-nothing) │
//! │     and validate their parameters                       │
//! │  1. Pass 1: per user, per rule, intra-repo checks       │
//! │     (optionally one user per rayon task)                │
//! │  2. Index fetched repos by logical name                 │
//! │  3. Pass 2: per rule, inter-repo checks over the index, │
//! │     grades zipped back by position                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is evaluated until step 0 succeeds, so a misconfigured rules file
//! never produces a partial result.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{GraderError, GraderResult};
use crate::models::{
    validate_rules, AssessedRepo, AssessedStudent, Assessment, AssessmentResult, Rule,
};
use crate::plugins::{InterRepoCheck, PluginRegistry, RepoCheck};
use crate::registry::{Registry, User};

/// Called with (users done, total users) after each user's first pass
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

type RepoChecks = BTreeMap<String, Arc<dyn RepoCheck>>;
type InterChecks = BTreeMap<String, Arc<dyn InterRepoCheck>>;

/// Runs rules against a registry using the plugin registry
pub struct AssessmentEngine<'a> {
    plugins: &'a PluginRegistry,
    parallel: bool,
    progress: Option<ProgressCallback>,
}

impl<'a> AssessmentEngine<'a> {
    pub fn new(plugins: &'a PluginRegistry) -> Self {
        Self {
            plugins,
            parallel: false,
            progress: None,
        }
    }

    /// Run the first pass with one rayon task per user
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Assess every user against every rule.
    pub fn assess(&self, rules: &[Rule], registry: &Registry) -> GraderResult<AssessmentResult> {
        validate_rules(rules)?;
        let (checks, inter_checks) = self.resolve(rules)?;

        let mut students = self.first_pass(rules, &registry.users, &checks);
        let by_name = index_fetched(&students);
        second_pass(rules, &mut students, &by_name, &inter_checks)?;

        let result = AssessmentResult { students };
        info!(
            "Performed {} assessments for {} users",
            result.assessment_count(),
            result.students.len()
        );
        Ok(result)
    }

    /// Resolve and validate every plugin the rules need, before any work.
    fn resolve(&self, rules: &[Rule]) -> GraderResult<(RepoChecks, InterChecks)> {
        let checks = self
            .plugins
            .repo_checks
            .resolve_many(rules.iter().flat_map(|r| &r.assessments).map(|s| &s.name))?;
        let inter_checks = self.plugins.inter_repo_checks.resolve_many(
            rules
                .iter()
                .flat_map(|r| &r.inter_assessments)
                .map(|s| &s.name),
        )?;

        for rule in rules {
            for spec in &rule.assessments {
                if let Some(check) = checks.get(&spec.name) {
                    check.validate(&spec.params)?;
                }
            }
            for spec in &rule.inter_assessments {
                if let Some(check) = inter_checks.get(&spec.name) {
                    check.validate(&spec.params)?;
                }
            }
        }

        Ok((checks, inter_checks))
    }

    fn first_pass(&self, rules: &[Rule], users: &[User], checks: &RepoChecks) -> Vec<AssessedStudent> {
        let done = AtomicUsize::new(0);
        let total = users.len();
        let assess_one = |user: &User| {
            let student = assess_student(user, rules, checks);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(cb) = &self.progress {
                cb(n, total);
            }
            student
        };

        if self.parallel {
            // collect() on an indexed parallel iterator keeps registry order
            users.par_iter().map(assess_one).collect()
        } else {
            users.iter().map(assess_one).collect()
        }
    }
}

/// Pass 1 for a single user: one `AssessedRepo` per rule, in rule order.
fn assess_student(user: &User, rules: &[Rule], checks: &RepoChecks) -> AssessedStudent {
    let mut student = AssessedStudent::new(user.id.clone());

    for rule in rules {
        let mut repo = AssessedRepo::new(rule.repo.clone(), rule.weight);

        if let Some(path) = user.repo_path(&rule.repo) {
            repo.local_path = Some(path.to_string_lossy().into_owned());

            for spec in &rule.assessments {
                let Some(check) = checks.get(&spec.name) else {
                    continue;
                };
                let grade = check.assess(user, path, &spec.params);
                debug!("{} / {} / {}: {}", user.id, rule.repo, spec.name, grade);
                repo.add_assessment(Assessment::new(spec, check.describe(), grade));
            }
        } else {
            debug!("User {} has no repository {}", user.id, rule.repo);
        }

        student.add_assessed_repo(repo);
    }

    student
}

/// (student index, repo index) of every fetched repo, keyed by logical name,
/// in registry order.
fn index_fetched(students: &[AssessedStudent]) -> HashMap<String, Vec<(usize, usize)>> {
    let mut by_name: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
    for (s, student) in students.iter().enumerate() {
        for (r, repo) in student.assessed_repos.iter().enumerate() {
            if repo.local_path.is_some() {
                by_name.entry(repo.name.clone()).or_default().push((s, r));
            }
        }
    }
    by_name
}

/// Pass 2: run inter-repo checks and zip grades back by position.
fn second_pass(
    rules: &[Rule],
    students: &mut [AssessedStudent],
    by_name: &HashMap<String, Vec<(usize, usize)>>,
    inter_checks: &InterChecks,
) -> GraderResult<()> {
    for rule in rules.iter().filter(|r| !r.inter_assessments.is_empty()) {
        let slots = by_name.get(&rule.repo).map(Vec::as_slice).unwrap_or(&[]);
        if slots.is_empty() {
            debug!("No fetched {} repositories to compare", rule.repo);
            continue;
        }

        let paths: Vec<PathBuf> = slots
            .iter()
            .filter_map(|&(s, r)| students[s].assessed_repos[r].local_path.as_ref())
            .map(PathBuf::from)
            .collect();
        let path_refs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();

        for spec in &rule.inter_assessments {
            let Some(check) = inter_checks.get(&spec.name) else {
                continue;
            };

            let grades = check.assess(&path_refs, &spec.params);
            if grades.len() != slots.len() {
                return Err(GraderError::InterCheckMismatch {
                    plugin: spec.name.clone(),
                    expected: slots.len(),
                    got: grades.len(),
                });
            }

            let description = check.describe();
            for (&(s, r), grade) in slots.iter().zip(grades) {
                students[s].assessed_repos[r]
                    .add_inter_assessment(Assessment::new(spec, description.clone(), grade));
            }
        }
    }

    Ok(())
}
