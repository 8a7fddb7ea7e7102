//! The `fetch` operation: clone or update every user's repositories
//!
//! Fetching must finish and persist the registry before `assess` runs; the
//! registry artifact is the hand-off between the two.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GraderConfig;
use crate::error::{GraderError, GraderResult};
use crate::git::GitTransport;
use crate::loaders::load_rules;
use crate::paths;
use crate::plugins::PluginRegistry;
use crate::registry::Registry;

/// What to do when the assessment folder already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingPolicy {
    #[default]
    Stop,
    Update,
    Overwrite,
}

impl FromStr for ExistingPolicy {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stop" => Ok(ExistingPolicy::Stop),
            "update" => Ok(ExistingPolicy::Update),
            "overwrite" => Ok(ExistingPolicy::Overwrite),
            _ => Err(GraderError::CliArgs(format!(
                "{} (expected stop, update or overwrite)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ExistingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExistingPolicy::Stop => write!(f, "stop"),
            ExistingPolicy::Update => write!(f, "update"),
            ExistingPolicy::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// Options for one fetch run
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub existing: ExistingPolicy,
    /// Pause between successive clones/pulls
    pub wait: Duration,
    pub show_progress: bool,
}

/// Counts for the summary line
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSummary {
    pub repos: usize,
    pub users: usize,
    pub valid_urls: usize,
    pub repos_dir: PathBuf,
    pub registry_file: PathBuf,
}

/// Fetch every rule's repository for every user with a valid address.
pub fn fetch(
    plugins: &PluginRegistry,
    config: &GraderConfig,
    transport: &dyn GitTransport,
    roster_path: &Path,
    rules_path: &Path,
    assess_folder: &Path,
    options: &FetchOptions,
) -> GraderResult<FetchSummary> {
    paths::require_exists(roster_path)?;
    paths::require_exists(rules_path)?;

    prepare_folder(assess_folder, options.existing)?;

    let repo_names: Vec<String> = load_rules(plugins, rules_path)?
        .into_iter()
        .map(|rule| rule.repo)
        .collect();

    // Reusing the saved registry skips address validation on updates
    let registry_file = paths::registry_file(assess_folder);
    let mut registry = if registry_file.exists() {
        debug!("Reusing registry {:?}", registry_file);
        Registry::load(&registry_file)?
    } else {
        Registry::load_roster(roster_path, config)?
    };

    fetch_repos(assess_folder, &mut registry, &repo_names, transport, options);
    registry.save(&registry_file)?;

    let summary = FetchSummary {
        repos: registry.repo_count(),
        users: registry.users.len(),
        valid_urls: registry.valid_url_count(),
        repos_dir: paths::repos_dir(assess_folder),
        registry_file,
    };
    info!(
        "Fetched {} repositories from {} users",
        summary.repos, summary.users
    );
    Ok(summary)
}

fn prepare_folder(folder: &Path, policy: ExistingPolicy) -> GraderResult<()> {
    if folder.exists() {
        match policy {
            ExistingPolicy::Stop => return Err(GraderError::AssessFolderExists(folder.into())),
            ExistingPolicy::Update => {
                debug!("Updating existing assessment folder {:?}", folder);
                return Ok(());
            }
            ExistingPolicy::Overwrite => {
                info!("Assessment folder {:?} already exists, deleting it", folder);
                fs::remove_dir_all(folder)?;
            }
        }
    }
    fs::create_dir_all(folder)?;
    Ok(())
}

/// Clone missing working trees and pull existing ones.
///
/// A failed clone means the user lacks that repository. A failed pull keeps
/// the existing tree.
fn fetch_repos(
    assess_folder: &Path,
    registry: &mut Registry,
    repo_names: &[String],
    transport: &dyn GitTransport,
    options: &FetchOptions,
) {
    let total = registry.valid_url_count() * repo_names.len();
    let bar = if options.show_progress {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░  ");
        ProgressBar::new(total as u64).with_style(style)
    } else {
        ProgressBar::hidden()
    };

    let mut any_fetch = false;

    for user in registry.users.iter_mut().filter(|u| u.has_valid_url()) {
        for repo_name in repo_names {
            if any_fetch && !options.wait.is_zero() {
                thread::sleep(options.wait);
            }
            any_fetch = true;
            bar.set_message(format!("{}/{}", user.id, repo_name));

            let repo_dir = paths::repo_dir(assess_folder, &user.id, repo_name);

            if repo_dir.exists() {
                if let Err(e) = transport.pull(&repo_dir) {
                    warn!("Could not update {:?}: {}", repo_dir, e);
                }
                user.add_repo(repo_name.clone(), &repo_dir);
            } else {
                match user.repo_url(repo_name) {
                    Ok(url) => match clone_into(transport, &url, &repo_dir) {
                        Ok(()) => user.add_repo(repo_name.clone(), &repo_dir),
                        Err(e) => debug!("No {} for user {}: {}", repo_name, user.id, e),
                    },
                    Err(e) => warn!("{}", e),
                }
            }

            bar.inc(1);
        }
    }

    bar.finish_and_clear();
}

fn clone_into(transport: &dyn GitTransport, url: &str, dest: &Path) -> GraderResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let result = transport.clone_repo(url, dest);
    if result.is_err() && dest.exists() {
        // Don't let a half-written clone pass for a fetched repository
        let _ = fs::remove_dir_all(dest);
    }
    result
}
