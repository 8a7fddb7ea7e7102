//! CLI command definitions and handlers

mod assess;
mod fetch;
mod plugins;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use egrader::config::GraderConfig;
use egrader::plugins::PluginRegistry;

/// egrader - Auto-grader for Git-hosted exercises
#[derive(Parser, Debug)]
#[command(name = "egrader")]
#[command(
    version,
    about = "Exercise grader: fetch student Git repositories, assess them with pluggable checks, report grades",
    after_help = "\
Examples:
  egrader fetch students.txt rules.yml            Clone into out_rules/
  egrader fetch -e update students.csv rules.yml  Pull repositories fetched before
  egrader assess rules.yml                        Grade out_rules/
  egrader report out_rules tsv                    Grades as a TSV table
  egrader report out_rules markdown -f            One Markdown file per student
  egrader plugins                                 List available plugins"
)]
pub struct Cli {
    /// Show the full error chain when a command fails
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch all repositories
    Fetch {
        /// Action to take when fetch has already been performed before
        #[arg(short = 'e', long, default_value = "stop", value_parser = ["stop", "update", "overwrite"])]
        existing: String,

        /// Time in seconds to wait between clones/fetches
        #[arg(short = 'w', long, value_name = "SECS")]
        wait: Option<f64>,

        /// Student roster: `id email url` lines, or CSV with id/repo_base columns
        roster: PathBuf,

        /// Assessment rules (YAML or JSON)
        rules: PathBuf,

        /// Folder where assessment data will be placed (defaults to out_<RULES stem>)
        assess_folder: Option<PathBuf>,
    },

    /// Perform assessment
    Assess {
        /// Assess users in parallel
        #[arg(long)]
        parallel: bool,

        /// Assessment rules (YAML or JSON)
        rules: PathBuf,

        /// Folder where assessment data is located (defaults to out_<RULES stem>)
        assess_folder: Option<PathBuf>,
    },

    /// Generate an assessment report
    Report {
        /// Folder where assessment data is located
        assess_folder: PathBuf,

        /// Type of report (defaults to the configured report, `basic`)
        report_type: Option<String>,

        /// Arguments passed to the report renderer
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        report_args: Vec<String>,
    },

    /// List available plugins
    Plugins,
}

pub fn run(cli: &Cli, config: &GraderConfig) -> Result<()> {
    let plugins = PluginRegistry::builtin_with(config);

    match &cli.command {
        Commands::Fetch {
            existing,
            wait,
            roster,
            rules,
            assess_folder,
        } => fetch::run(
            &plugins,
            config,
            roster,
            rules,
            assess_folder.as_deref(),
            existing,
            wait.unwrap_or_else(|| config.fetch_wait_secs()),
        ),

        Commands::Assess {
            parallel,
            rules,
            assess_folder,
        } => assess::run(&plugins, rules, assess_folder.as_deref(), *parallel),

        Commands::Report {
            assess_folder,
            report_type,
            report_args,
        } => report::run(
            &plugins,
            assess_folder,
            report_type.as_deref().unwrap_or_else(|| config.default_report()),
            report_args,
        ),

        Commands::Plugins => plugins::run(&plugins),
    }
}
