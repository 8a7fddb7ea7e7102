//! Report command - render a stored assessment

use anyhow::Result;
use std::path::Path;

use egrader::plugins::PluginRegistry;
use egrader::reporters;

pub fn run(
    plugins: &PluginRegistry,
    assess_folder: &Path,
    report_type: &str,
    args: &[String],
) -> Result<()> {
    // Rendered output goes to stdout untouched so it can be piped
    let output = reporters::report(plugins, assess_folder, report_type, args)?;
    print!("{}", output);
    Ok(())
}
