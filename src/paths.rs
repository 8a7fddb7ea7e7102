//! Assessment folder layout
//!
//! ```text
//! <assess folder>/
//!   validated_git_urls.yml      registry written by `fetch`
//!   assessed_students.yml       result written by `assess`
//!   student_repos/<id>/<repo>/  working trees
//!   reports_md/<id>.md          per-user Markdown reports
//! ```

use std::path::{Path, PathBuf};

use crate::error::{GraderError, GraderResult};

const REGISTRY_FILE: &str = "validated_git_urls.yml";
const RESULT_FILE: &str = "assessed_students.yml";
const REPOS_DIR: &str = "student_repos";
const REPORTS_MD_DIR: &str = "reports_md";
const DEFAULT_FOLDER_PREFIX: &str = "out_";

/// Default assessment folder for a rules file: `out_<rules stem>`.
pub fn default_assess_folder(rules_path: &Path) -> PathBuf {
    let stem = rules_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rules".to_string());
    PathBuf::from(format!("{}{}", DEFAULT_FOLDER_PREFIX, stem))
}

/// Use the given folder, or derive it from the rules file name.
pub fn resolve_assess_folder(folder: Option<&Path>, rules_path: Option<&Path>) -> Option<PathBuf> {
    match (folder, rules_path) {
        (Some(folder), _) => Some(folder.to_path_buf()),
        (None, Some(rules)) => Some(default_assess_folder(rules)),
        (None, None) => None,
    }
}

/// Get the registry artifact path.
pub fn registry_file(assess_folder: &Path) -> PathBuf {
    assess_folder.join(REGISTRY_FILE)
}

/// Get the assessment result artifact path.
pub fn result_file(assess_folder: &Path) -> PathBuf {
    assess_folder.join(RESULT_FILE)
}

/// Get the folder holding every user's working trees.
pub fn repos_dir(assess_folder: &Path) -> PathBuf {
    assess_folder.join(REPOS_DIR)
}

/// Get the working tree path for one user's repository.
pub fn repo_dir(assess_folder: &Path, user_id: &str, repo_name: &str) -> PathBuf {
    repos_dir(assess_folder)
        .join(path_component(user_id))
        .join(path_component(repo_name))
}

/// Get the folder holding per-user Markdown reports.
pub fn reports_md_dir(assess_folder: &Path) -> PathBuf {
    assess_folder.join(REPORTS_MD_DIR)
}

/// Get the Markdown report path for one user.
pub fn student_report_file(assess_folder: &Path, user_id: &str) -> PathBuf {
    reports_md_dir(assess_folder)
        .join(format!("{}.md", path_component(user_id)))
}

/// Fail with `MissingFile` unless the path exists.
pub fn require_exists(path: &Path) -> GraderResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(GraderError::MissingFile(path.to_path_buf()))
    }
}

/// Keep ids from escaping their folder (`../x`, absolute paths).
///
/// Not injective: `a/b` and `a_b` share a folder, so rosters are checked
/// for collisions when loaded.
pub(crate) fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}
