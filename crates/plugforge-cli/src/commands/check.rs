use clap::Args;
use colored::Colorize;
use plugforge_ast::{DescriptorDiscovery, DescriptorParser};
use plugforge_manifest::PluginDescriptor;
use std::path::PathBuf;

use crate::common::{load_project_config, load_registry};
use crate::errors::CliError;
use crate::GlobalOpts;

use super::generator_defaults;

#[derive(Args, Debug, Clone)]
pub struct CheckCommand {
    /// Root of the plugin's Java sources
    #[arg(default_value = ".")]
    pub source: PathBuf,

    /// Extra platform registry layered over the built-in one
    #[arg(long, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// Project config file (default: nearest plugforge.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the descriptor as JSON
    #[arg(long)]
    pub json: bool,
}

/// Scan, parse and validate without emitting anything
pub fn handle_check(cmd: CheckCommand, _opts: &GlobalOpts) -> Result<i32, CliError> {
    let config = load_project_config(cmd.config.as_deref(), &cmd.source)?;
    let registry = load_registry(cmd.registry.as_deref(), config.as_ref())?;
    let parser =
        DescriptorParser::new(registry.keys()).with_generator_defaults(generator_defaults(config.as_ref()));

    let descriptor = DescriptorDiscovery::discover(&cmd.source, &parser)?;
    if cmd.json {
        let json = serde_json::to_string_pretty(&descriptor)
            .map_err(|e| CliError::Report(anyhow::Error::new(e).context("failed to serialize descriptor")))?;
        println!("{json}");
    } else {
        print_descriptor(&descriptor);
    }
    Ok(0)
}

fn print_descriptor(descriptor: &PluginDescriptor) {
    println!(
        "{} {} {}",
        descriptor.display_name().bold().green(),
        descriptor.version,
        format!("({})", descriptor.id).dimmed()
    );
    println!("  entry point: {}", descriptor.entry_point.qualified_name);
    if let Some(bootstrap) = &descriptor.bootstrap {
        println!("  bootstrap:   {bootstrap}");
    }
    if let Some(description) = &descriptor.description {
        println!("  description: {description}");
    }
    if !descriptor.authors.is_empty() {
        println!("  authors:     {}", descriptor.authors.join(", "));
    }
    if !descriptor.target_platforms.is_empty() {
        println!("  platforms:   {}", descriptor.target_platforms.join(", "));
    }

    if !descriptor.dependencies.is_empty() {
        println!("{}", " Dependencies:".bold().blue());
        for dep in &descriptor.dependencies {
            let mut line = format!("    - {}", dep.id);
            if let Some(range) = &dep.version_range {
                line.push_str(&format!(" {range}"));
            }
            if !dep.required {
                line.push_str(&format!(" {}", "(optional)".dimmed()));
            }
            if !dep.platforms.is_empty() {
                line.push_str(&format!(" [{}]", dep.platforms.join(", ")));
            }
            println!("{line}");
        }
    }
    if !descriptor.commands.is_empty() {
        println!("{}", " Commands:".bold().blue());
        for command in &descriptor.commands {
            if command.aliases.is_empty() {
                println!("    - /{}", command.name);
            } else {
                println!("    - /{} ({})", command.name, command.aliases.join(", "));
            }
        }
    }
    if !descriptor.permissions.is_empty() {
        println!("{}", " Permissions:".bold().blue());
        for permission in &descriptor.permissions {
            println!("    - {} [{}]", permission.node, permission.default.as_str());
        }
    }
}
