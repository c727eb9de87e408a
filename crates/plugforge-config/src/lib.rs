//! Project configuration for plugforge
//!
//! A project may carry a `plugforge.toml` next to its sources (or in any
//! ancestor directory). Command-line flags override it; a per-user file in
//! the platform config directory is used when the project has none.
//!
//! ```toml
//! output = "build/plugforge"
//! platforms = ["bukkit", "velocity"]
//! registry = "platforms.toml"
//! layout = "package"
//! strict = false
//!
//! [generator]
//! class_name = "{name}{platform}"
//! package_name = "{package}.platform.{platform}"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "plugforge.toml";

/// Default output root, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "plugforge-out";

/// Error type for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid plugforge TOML
    #[error("Invalid config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Where generated bootstrap sources are placed under each platform directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `<platform>/<id>_<platform>.java`
    #[default]
    Flat,
    /// `<platform>/src/<package path>/<Class>.java`
    Package,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layout::Flat => "flat",
            Layout::Package => "package",
        })
    }
}

/// Defaults for the generated class and package names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub class_name: Option<String>,
    pub package_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub output: Option<PathBuf>,
    pub platforms: Vec<String>,
    pub registry: Option<PathBuf>,
    pub layout: Option<Layout>,
    pub strict: Option<bool>,
    pub generator: GeneratorConfig,

    /// File this configuration was read from
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ProjectConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.message().to_string(),
            })?;
        config.origin = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find the project config for a source root, falling back to the user config
    pub fn discover(start: &Path) -> Result<Option<Self>, ConfigError> {
        if let Some(found) = Self::discover_in_ancestors(start)? {
            return Ok(Some(found));
        }
        match user_config_path() {
            Some(path) if path.is_file() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }

    /// Nearest `plugforge.toml` in `start` or any of its ancestors
    pub fn discover_in_ancestors(start: &Path) -> Result<Option<Self>, ConfigError> {
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Self::load(&candidate).map(Some);
            }
        }
        Ok(None)
    }

    /// Resolve a path from the file relative to the file's directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.origin.as_deref().and_then(Path::parent) {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output.as_deref().map(|p| self.resolve_path(p))
    }

    pub fn registry_path(&self) -> Option<PathBuf> {
        self.registry.as_deref().map(|p| self.resolve_path(p))
    }
}

/// `<config dir>/plugforge/plugforge.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("plugforge").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> Option<PathBuf> {
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, content).ok()?;
        Some(path)
    }

    #[test]
    fn test_load_full_config() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Some(path) = write_config(
            temp_dir.path(),
            r#"
output = "build/out"
platforms = ["velocity", "bukkit"]
layout = "package"
strict = true

[generator]
class_name = "{name}Boot{platform}"
"#,
        ) else {
            return;
        };

        let result = ProjectConfig::load(&path);
        assert!(result.is_ok(), "config should load: {:?}", result.err());
        let Ok(config) = result else { return };
        assert_eq!(config.platforms, vec!["velocity", "bukkit"]);
        assert_eq!(config.layout, Some(Layout::Package));
        assert_eq!(config.strict, Some(true));
        assert_eq!(
            config.generator.class_name.as_deref(),
            Some("{name}Boot{platform}")
        );
        assert_eq!(config.output_dir(), Some(temp_dir.path().join("build/out")));
    }

    #[test]
    fn test_discover_walks_ancestors() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let nested = temp_dir.path().join("src/main/java");
        assert!(fs::create_dir_all(&nested).is_ok());
        assert!(write_config(temp_dir.path(), "platforms = [\"nukkit\"]\n").is_some());

        let found = ProjectConfig::discover_in_ancestors(&nested);
        assert!(matches!(&found, Ok(Some(c)) if c.platforms == vec!["nukkit"]));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Some(path) = write_config(temp_dir.path(), "outptu = \"x\"\n") else {
            return;
        };
        assert!(matches!(
            ProjectConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ProjectConfig::load(Path::new("/tmp/plugforge_missing_12345/plugforge.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_error_messages_and_source() {
        use std::error::Error as _;

        let result = ProjectConfig::load(Path::new("/tmp/plugforge_missing_12345/plugforge.toml"));
        let Err(error) = result else {
            panic!("missing file should fail");
        };
        assert!(error.to_string().starts_with("Failed to read config /tmp/plugforge_missing_12345"));
        assert!(error.source().is_some());

        let parse = ConfigError::Parse {
            path: PathBuf::from("plugforge.toml"),
            message: "unknown field `outptu`".to_string(),
        };
        assert_eq!(parse.to_string(), "Invalid config plugforge.toml: unknown field `outptu`");
        assert!(parse.source().is_none());
    }
}
