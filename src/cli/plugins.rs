//! Plugins command - list every plugin by group

use anyhow::Result;
use console::style;

use egrader::plugins::{PluginGroup, PluginRegistry};

pub fn run(plugins: &PluginRegistry) -> Result<()> {
    for group in PluginGroup::ALL {
        println!("{}", style(format!(":: {}", group.title())).bold());
        for (name, description) in plugins.describe(group) {
            println!("\t{}\n\t\t{}", style(name).cyan(), description);
        }
        println!();
    }
    Ok(())
}
