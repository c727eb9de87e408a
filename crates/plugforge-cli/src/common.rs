//! Common types and utilities shared across commands

use clap::Parser;
use plugforge_config::ProjectConfig;
use plugforge_manifest::PlatformRegistry;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::CliError;

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Only print errors and warnings")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(long, global = true, help = "Do not mirror output to the log file")]
    pub no_log_file: bool,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Explicit `--config` file, else the nearest `plugforge.toml` above the sources
pub fn load_project_config(
    explicit: Option<&Path>,
    source_root: &Path,
) -> Result<Option<ProjectConfig>, CliError> {
    let config = match explicit {
        Some(path) => Some(ProjectConfig::load(path)?),
        None => ProjectConfig::discover(source_root)?,
    };
    if let Some(origin) = config.as_ref().and_then(|c| c.origin.as_deref()) {
        debug!("Using project config {}", origin.display());
    }
    Ok(config)
}

/// Built-in platforms, overlaid with the `--registry` file or the config's registry
pub fn load_registry(
    explicit: Option<&Path>,
    config: Option<&ProjectConfig>,
) -> Result<PlatformRegistry, CliError> {
    let builtin = PlatformRegistry::builtin()?;
    let overlay: Option<PathBuf> = explicit
        .map(Path::to_path_buf)
        .or_else(|| config.and_then(ProjectConfig::registry_path));
    match overlay {
        Some(path) => Ok(builtin.merge(PlatformRegistry::from_path(&path)?)),
        None => Ok(builtin),
    }
}
