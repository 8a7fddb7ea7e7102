//! Report renderers for assessment results
//!
//! Renderers are plugins resolved by name:
//! - `basic` - Plain per-user grade list
//! - `tsv` - Tab-separated `student_id`/`grade` table
//! - `markdown` - Long-form Markdown, optionally one file per user (`-f`)
//!
//! Every renderer tolerates empty repositories and never mutates the result.

mod basic;
mod markdown;
mod tsv;

pub use basic::BasicReport;
pub use markdown::MarkdownReport;
pub use tsv::TsvReport;

use std::path::Path;

use crate::assess::load_result;
use crate::error::GraderResult;
use crate::paths;
use crate::plugins::{PluginRegistry, ReportContext};

/// Load the result artifact from a folder and render it with `renderer`.
pub fn report(
    plugins: &PluginRegistry,
    assess_folder: &Path,
    renderer: &str,
    args: &[String],
) -> GraderResult<String> {
    paths::require_exists(assess_folder)?;
    let renderer = plugins.renderers.resolve_one(renderer)?;
    let result = load_result(&paths::result_file(assess_folder))?;

    let ctx = ReportContext {
        assess_folder: assess_folder.to_path_buf(),
    };
    renderer.render(&ctx, &result, args)
}
