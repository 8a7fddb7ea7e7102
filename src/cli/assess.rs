//! Assess command - grade every fetched repository

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

use egrader::assess::{assess, AssessOptions};
use egrader::paths;
use egrader::plugins::PluginRegistry;

pub fn run(
    plugins: &PluginRegistry,
    rules: &Path,
    assess_folder: Option<&Path>,
    parallel: bool,
) -> Result<()> {
    let folder = paths::resolve_assess_folder(assess_folder, Some(rules))
        .context("No assessment folder given")?;

    let bar = if console::user_attended_stderr() {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} Assessing [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░  ");
        ProgressBar::new(0).with_style(style)
    } else {
        ProgressBar::hidden()
    };

    let progress_bar = bar.clone();
    let options = AssessOptions {
        parallel,
        progress: Some(Arc::new(move |done: usize, total: usize| {
            progress_bar.set_length(total as u64);
            progress_bar.set_position(done as u64);
        })),
    };

    let summary = assess(plugins, rules, &folder, &options);
    bar.finish_and_clear();
    let summary = summary?;

    println!(
        "- Performed {} assessments for {} students.",
        style(summary.assessments).green(),
        style(summary.users).cyan()
    );
    println!(
        "- Results saved at {}.",
        paths::result_file(&folder).display()
    );
    Ok(())
}
