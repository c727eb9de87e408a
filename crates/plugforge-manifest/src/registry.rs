//! Platform registry
//!
//! Registration is data: the built-in platforms ship as an embedded TOML
//! table, and a project can layer its own registry file on top. Entries are
//! ordered by key so every listing and every report is deterministic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::errors::RegistryError;
use crate::platform::PlatformSpec;

const BUILTIN_PLATFORMS: &str = include_str!("platforms.toml");

pub const DEFAULT_CONTEXT_CLASS: &str = "dev.plugforge.api.PluginContext";

static KEY_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").ok());

/// Registry-wide settings shared by every generated bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeSpec {
    #[serde(default = "default_context_class")]
    pub context_class: String,
}

fn default_context_class() -> String {
    DEFAULT_CONTEXT_CLASS.to_string()
}

impl Default for RuntimeSpec {
    fn default() -> Self {
        Self {
            context_class: default_context_class(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    runtime: Option<RuntimeSpec>,
    #[serde(default)]
    platforms: BTreeMap<String, PlatformSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct PlatformRegistry {
    runtime: RuntimeSpec,
    platforms: BTreeMap<String, PlatformSpec>,
}

impl PlatformRegistry {
    /// Registry with no platforms
    pub fn empty() -> Self {
        Self::default()
    }

    /// The platforms shipped with plugforge
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_PLATFORMS, "<builtin>")
    }

    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        debug!("Loading platform registry from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(content).map_err(|source| RegistryError::Decode {
            origin: origin.to_string(),
            source,
        })?;

        let mut registry = Self {
            runtime: file.runtime.unwrap_or_default(),
            platforms: BTreeMap::new(),
        };
        for (key, spec) in file.platforms {
            registry = registry.with_platform(&key, spec)?;
        }
        debug!(
            "Loaded {} platform(s) from {}",
            registry.platforms.len(),
            origin
        );
        Ok(registry)
    }

    /// Add or replace one platform
    pub fn with_platform(mut self, key: &str, mut spec: PlatformSpec) -> Result<Self, RegistryError> {
        let valid = KEY_RE.as_ref().is_some_and(|re| re.is_match(key));
        if !valid {
            return Err(RegistryError::InvalidKey(key.to_string()));
        }
        spec.key = key.to_string();
        self.platforms.insert(key.to_string(), spec);
        Ok(self)
    }

    /// Layer `overlay` on top: its platforms add to or replace ours by key
    pub fn merge(mut self, overlay: PlatformRegistry) -> Self {
        if overlay.runtime != RuntimeSpec::default() {
            self.runtime = overlay.runtime;
        }
        for (key, spec) in overlay.platforms {
            if self.platforms.contains_key(&key) {
                debug!("Platform '{}' replaced by overlay registry", key);
            }
            self.platforms.insert(key, spec);
        }
        self
    }

    pub fn lookup(&self, key: &str) -> Option<&PlatformSpec> {
        self.platforms.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.platforms.contains_key(key)
    }

    /// All platforms, ordered by key
    pub fn list(&self) -> impl Iterator<Item = &PlatformSpec> {
        self.platforms.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    pub fn runtime(&self) -> &RuntimeSpec {
        &self.runtime
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManifestFormat;

    #[test]
    fn test_builtin_registry_is_sorted() {
        let Ok(registry) = PlatformRegistry::builtin() else {
            panic!("builtin registry must load");
        };
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(
            keys,
            vec![
                "bukkit",
                "bungeecord",
                "fabric",
                "folia",
                "minestom",
                "nukkit",
                "sponge",
                "velocity"
            ]
        );
        assert_eq!(registry.runtime().context_class, DEFAULT_CONTEXT_CLASS);
    }

    #[test]
    fn test_builtin_platforms_are_complete() {
        let Ok(registry) = PlatformRegistry::builtin() else {
            panic!("builtin registry must load");
        };
        for spec in registry.list() {
            assert_eq!(registry.lookup(&spec.key).map(|s| &s.key), Some(&spec.key));
            let format = spec.manifest.format.as_deref().unwrap_or_default();
            assert!(format.parse::<ManifestFormat>().is_ok(), "{}", spec.key);
            assert!(spec.manifest.path.is_some(), "{}", spec.key);
            assert!(spec.entry_point.context.logger.is_some(), "{}", spec.key);
            assert!(!spec.entry_point.methods.is_empty(), "{}", spec.key);
        }
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = PlatformRegistry::empty();
        assert!(registry.lookup("bukkit").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overlay_replaces_and_adds() {
        let Ok(base) = PlatformRegistry::builtin() else {
            panic!("builtin registry must load");
        };
        let overlay = PlatformRegistry::from_toml_str(
            r#"
            [platforms.bukkit]
            display_name = "Spigot"

            [platforms.limbo]
            display_name = "Limbo"
            "#,
            "overlay",
        );
        let Ok(overlay) = overlay else {
            panic!("overlay must parse");
        };
        let merged = base.merge(overlay);
        assert_eq!(merged.len(), 9);
        assert_eq!(
            merged.lookup("bukkit").and_then(|s| s.display_name.as_deref()),
            Some("Spigot")
        );
        assert!(merged.contains("limbo"));
        assert_eq!(merged.runtime().context_class, DEFAULT_CONTEXT_CLASS);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let result = PlatformRegistry::from_toml_str("[platforms.Bad_Key]\n", "inline");
        assert!(matches!(result, Err(RegistryError::InvalidKey(key)) if key == "Bad_Key"));
    }

    #[test]
    fn test_undecodable_registry() {
        let result = PlatformRegistry::from_toml_str("platforms = 3", "inline");
        assert!(matches!(result, Err(RegistryError::Decode { .. })));
    }
}
