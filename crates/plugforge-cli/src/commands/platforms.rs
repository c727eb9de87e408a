use clap::Args;
use colored::Colorize;
use plugforge_manifest::manifest::manifest_path;
use std::path::PathBuf;

use crate::common::{load_project_config, load_registry};
use crate::errors::CliError;
use crate::GlobalOpts;

#[derive(Args, Debug, Clone)]
pub struct PlatformsCommand {
    /// Extra platform registry layered over the built-in one
    #[arg(long, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// Project config file (default: nearest plugforge.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// List every registered platform in registry order
pub fn handle_platforms(cmd: PlatformsCommand, _opts: &GlobalOpts) -> Result<i32, CliError> {
    let cwd = PathBuf::from(".");
    let config = load_project_config(cmd.config.as_deref(), &cwd)?;
    let registry = load_registry(cmd.registry.as_deref(), config.as_ref())?;

    println!("{}", "Platforms:".bold().green());
    for platform in registry.list() {
        let mut line = format!(" {:<12} {}", platform.key.bold().blue(), platform.display_name());
        if let Some(format) = &platform.manifest.format {
            line.push_str(&format!(" {}", format!("[{format}]").dimmed()));
        }
        if let Ok(path) = manifest_path(platform) {
            line.push_str(&format!(" {}", path.display()));
        }
        if let Some(version) = platform.api.as_ref().and_then(|api| api.version.as_deref()) {
            line.push_str(&format!(" {}", format!("api {version}").dimmed()));
        }
        println!("{line}");
    }
    Ok(0)
}
