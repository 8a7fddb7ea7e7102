//! egrader - Exercise grader CLI
//!
//! Fetches student repositories, assesses them against a rules file and
//! reports the resulting grades.

mod cli;

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use egrader::config::GraderConfig;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let config = match GraderConfig::load() {
        Ok(config) => config,
        Err(e) => return fail(&e, cli.debug),
    };

    // Initialize logging: --log-level, then EGRADER_LOG_LEVEL / config files
    let level = cli.log_level.as_deref().unwrap_or_else(|| config.log_level());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match cli::run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e, cli.debug),
    }
}

fn fail(err: &anyhow::Error, debug: bool) -> ExitCode {
    eprintln!("{} {:#}", style("error:").red().bold(), err);
    if debug {
        eprintln!("-------- Error details --------");
        eprintln!("{:?}", err);
    }
    ExitCode::FAILURE
}
