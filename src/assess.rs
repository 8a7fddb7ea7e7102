//! The `assess` operation: rules + registry in, result artifact out

use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::{AssessmentEngine, ProgressCallback};
use crate::error::GraderResult;
use crate::loaders::load_rules;
use crate::models::AssessmentResult;
use crate::paths;
use crate::plugins::PluginRegistry;
use crate::registry::Registry;

/// Options for one assessment run
#[derive(Default, Clone)]
pub struct AssessOptions {
    pub parallel: bool,
    pub progress: Option<ProgressCallback>,
}

/// What a run produced, for the caller's summary line
#[derive(Debug, Clone, PartialEq)]
pub struct AssessSummary {
    pub users: usize,
    pub assessments: usize,
}

/// Load a persisted assessment result.
pub fn load_result(path: &Path) -> GraderResult<AssessmentResult> {
    paths::require_exists(path)?;
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Persist an assessment result, replacing any previous artifact.
pub fn save_result(path: &Path, result: &AssessmentResult) -> GraderResult<()> {
    let content = serde_yaml::to_string(result)?;
    fs::write(path, content)?;
    debug!("Saved assessment result to {:?}", path);
    Ok(())
}

/// Assess every registered user and write `assessed_students.yml`.
///
/// Inputs are checked eagerly: the rules file, the assessment folder and the
/// registry artifact must all exist before any plugin is resolved. Nothing
/// is written unless the whole run succeeds.
pub fn assess(
    plugins: &PluginRegistry,
    rules_path: &Path,
    assess_folder: &Path,
    options: &AssessOptions,
) -> GraderResult<AssessSummary> {
    paths::require_exists(rules_path)?;
    paths::require_exists(assess_folder)?;
    let registry_path = paths::registry_file(assess_folder);
    paths::require_exists(&registry_path)?;

    let rules = load_rules(plugins, rules_path)?;
    let registry = Registry::load(&registry_path)?;
    info!(
        "Assessing {} users against {} rules",
        registry.users.len(),
        rules.len()
    );

    let mut engine = AssessmentEngine::new(plugins).with_parallel(options.parallel);
    if let Some(cb) = &options.progress {
        engine = engine.with_progress_callback(cb.clone());
    }
    let result = engine.assess(&rules, &registry)?;

    save_result(&paths::result_file(assess_folder), &result)?;

    Ok(AssessSummary {
        users: result.students.len(),
        assessments: result.assessment_count(),
    })
}
