//! Fetch command - clone or update student repositories

use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::time::Duration;

use egrader::config::GraderConfig;
use egrader::fetch::{fetch, ExistingPolicy, FetchOptions};
use egrader::git::Git2Transport;
use egrader::paths;
use egrader::plugins::PluginRegistry;

pub fn run(
    plugins: &PluginRegistry,
    config: &GraderConfig,
    roster: &Path,
    rules: &Path,
    assess_folder: Option<&Path>,
    existing: &str,
    wait_secs: f64,
) -> Result<()> {
    let folder = paths::resolve_assess_folder(assess_folder, Some(rules))
        .context("No assessment folder given")?;
    let existing: ExistingPolicy = existing.parse()?;
    let wait = Duration::try_from_secs_f64(wait_secs.max(0.0))
        .with_context(|| format!("Invalid wait time: {}", wait_secs))?;

    println!(
        "- Absolute assessment path: {}.",
        style(std::path::absolute(&folder).unwrap_or_else(|_| folder.clone()).display()).cyan()
    );

    let options = FetchOptions {
        existing,
        wait,
        show_progress: console::user_attended_stderr(),
    };
    let summary = fetch(plugins, config, &Git2Transport, roster, rules, &folder, &options)?;

    println!(
        "- Fetched {} repositories from {} students, {} of which with valid URLs.",
        style(summary.repos).green(),
        style(summary.users).cyan(),
        style(summary.valid_urls).cyan()
    );
    println!("- Repositories saved at {}.", summary.repos_dir.display());
    println!(
        "- URL and repository validation report available at {}.",
        summary.registry_file.display()
    );
    Ok(())
}
