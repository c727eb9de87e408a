//! Plugin descriptor and generated artifact types
//!
//! The descriptor is built once per compilation by the descriptor parser and
//! shared read-only by every platform unit.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{Version, VersionReq};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;
use std::path::PathBuf;

use crate::naming;
use crate::platform::PlatformSpec;

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// The single, validated description of one plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub authors: SmallVec<[String; 2]>,
    pub entry_point: EntryPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<String>,
    pub generator: GeneratorOptions,
    pub dependencies: Vec<DependencySpec>,
    pub commands: Vec<CommandSpec>,
    pub permissions: Vec<PermissionSpec>,
    pub target_platforms: Vec<String>,
}

impl PluginDescriptor {
    /// Minimal descriptor; everything besides id, version and entry point starts empty
    pub fn new(id: impl Into<String>, version: Version, entry_point: EntryPoint) -> Self {
        Self {
            id: id.into(),
            name: None,
            version,
            description: None,
            url: None,
            license: None,
            authors: SmallVec::new(),
            entry_point,
            bootstrap: None,
            generator: GeneratorOptions::default(),
            dependencies: Vec::new(),
            commands: Vec::new(),
            permissions: Vec::new(),
            target_platforms: Vec::new(),
        }
    }

    /// Human readable name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.id)
    }

    /// Dependencies declared for every platform or explicitly for `platform`
    pub fn dependencies_for<'a>(
        &'a self,
        platform: &'a str,
    ) -> impl Iterator<Item = &'a DependencySpec> + 'a {
        self.dependencies
            .iter()
            .filter(move |dep| dep.applies_to(platform))
    }

    /// Simple name of the generated bootstrap class for `platform`
    pub fn generated_class_name(&self, platform: &PlatformSpec) -> String {
        self.generator
            .class_name
            .replace("{name}", &self.entry_point.simple_name)
            .replace("{platform}", &platform.display_name())
            .replace("{id}", &naming::kebab_to_pascal(&self.id))
    }

    /// Package of the generated bootstrap class for `platform`
    pub fn generated_package(&self, platform: &PlatformSpec) -> String {
        let rendered = self
            .generator
            .package_name
            .replace("{package}", &self.entry_point.package)
            .replace("{platform}", &platform.key)
            .replace("{id}", &self.id.replace('-', "_"));
        // An empty entry package leaves a leading dot behind
        rendered.trim_matches('.').to_string()
    }

    /// Fully-qualified name of the generated bootstrap class for `platform`
    pub fn generated_main(&self, platform: &PlatformSpec) -> String {
        naming::qualify(
            &self.generated_package(platform),
            &self.generated_class_name(platform),
        )
    }
}

/// The unified plugin class carrying `@Plugin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    pub qualified_name: String,
    pub simple_name: String,
    pub package: String,
}

impl EntryPoint {
    pub fn from_qualified(qualified: &str) -> Self {
        let (package, simple) = naming::split_qualified(qualified);
        Self {
            qualified_name: qualified.to_string(),
            simple_name: simple.to_string(),
            package: package.to_string(),
        }
    }
}

pub const DEFAULT_CLASS_NAME_FORMAT: &str = "{name}{platform}";
pub const DEFAULT_PACKAGE_NAME_FORMAT: &str = "{package}.platform.{platform}";

/// Formats for the generated bootstrap class name and package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorOptions {
    pub class_name: String,
    pub package_name: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_CLASS_NAME_FORMAT.to_string(),
            package_name: DEFAULT_PACKAGE_NAME_FORMAT.to_string(),
        }
    }
}

// =============================================================================
// DEPENDENCIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySpec {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_range: Option<VersionRange>,
    pub required: bool,
    /// Platform keys this dependency applies to; empty means all
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub platforms: SmallVec<[String; 2]>,
}

impl DependencySpec {
    pub fn applies_to(&self, platform: &str) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|key| key == platform)
    }
}

static INTERVAL_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^([\[(])\s*([^,\[\]()\s]*)\s*(?:(,)\s*([^,\[\]()\s]*)\s*)?([\])])$").ok()
});

static INTERVAL_BOUND_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*([-.][0-9A-Za-z][0-9A-Za-z.-]*)?$").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeSyntax {
    /// Cargo-style requirement, e.g. `>=1.2, <2`
    Semver,
    /// Maven-style interval, e.g. `[1.0,2.0)`
    Interval,
}

/// A syntactically checked dependency version range, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRange {
    pub raw: String,
    pub syntax: RangeSyntax,
}

impl VersionRange {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("range is empty".to_string());
        }
        if raw.starts_with('[') || raw.starts_with('(') {
            return parse_interval(raw).map(|()| Self {
                raw: raw.to_string(),
                syntax: RangeSyntax::Interval,
            });
        }
        VersionReq::parse(raw)
            .map(|_| Self {
                raw: raw.to_string(),
                syntax: RangeSyntax::Semver,
            })
            .map_err(|e| e.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn parse_interval(raw: &str) -> Result<(), String> {
    let (Some(interval), Some(bound)) = (INTERVAL_RE.as_ref(), INTERVAL_BOUND_RE.as_ref()) else {
        return Err("interval grammar unavailable".to_string());
    };
    let caps = interval
        .captures(raw)
        .ok_or_else(|| "expected an interval such as `[1.0,2.0)`".to_string())?;
    let open = caps.get(1).map_or("", |m| m.as_str());
    let lower = caps.get(2).map_or("", |m| m.as_str());
    let has_comma = caps.get(3).is_some();
    let upper = caps.get(4).map_or("", |m| m.as_str());
    let close = caps.get(5).map_or("", |m| m.as_str());

    for value in [lower, upper] {
        if !value.is_empty() && !bound.is_match(value) {
            return Err(format!("`{value}` is not a version"));
        }
    }
    if !has_comma {
        // `[1.2]` pins an exact version
        if open != "[" || close != "]" || lower.is_empty() {
            return Err("an exact version must be written `[x.y]`".to_string());
        }
    } else if lower.is_empty() && upper.is_empty() {
        return Err("interval has no bounds".to_string());
    }
    Ok(())
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// =============================================================================
// COMMANDS & PERMISSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub aliases: SmallVec<[String; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: SmallVec::new(),
            permission: None,
            usage: None,
            description: None,
        }
    }
}

/// Who holds a permission when nothing else grants or denies it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionDefault {
    True,
    #[default]
    False,
    Op,
    NotOp,
}

impl PermissionDefault {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "op" => Some(Self::Op),
            "not-op" | "notop" => Some(Self::NotOp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Op => "op",
            Self::NotOp => "not op",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSpec {
    pub node: String,
    pub default: PermissionDefault,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PermissionSpec {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            default: PermissionDefault::default(),
            description: None,
        }
    }
}

// =============================================================================
// ARTIFACTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Code,
    Manifest,
}

/// One emitted file, relative to the output root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    pub platform: String,
    pub kind: ArtifactKind,
    #[serde(skip)]
    pub content: String,
    pub output_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new(
            "demo",
            Version::new(1, 0, 0),
            EntryPoint::from_qualified("com.example.demo.Demo"),
        )
    }

    #[test]
    fn test_version_range_syntax() {
        assert_eq!(
            VersionRange::parse("[1.0,2.0)").map(|r| r.syntax),
            Ok(RangeSyntax::Interval)
        );
        assert_eq!(
            VersionRange::parse(">=1.2, <2").map(|r| r.syntax),
            Ok(RangeSyntax::Semver)
        );
        assert!(VersionRange::parse("(,1.0]").is_ok());
        assert!(VersionRange::parse("[1.2]").is_ok());
        assert!(VersionRange::parse("2.x").is_ok());

        assert!(VersionRange::parse("[1.0,2.0").is_err());
        assert!(VersionRange::parse("(1.2)").is_err());
        assert!(VersionRange::parse("[,]").is_err());
        assert!(VersionRange::parse("not a range").is_err());
        assert!(VersionRange::parse("").is_err());
    }

    #[test]
    fn test_dependencies_for_platform() {
        let mut desc = descriptor();
        desc.dependencies.push(DependencySpec {
            id: "Vault".to_string(),
            version_range: None,
            required: true,
            platforms: SmallVec::new(),
        });
        desc.dependencies.push(DependencySpec {
            id: "luckperms".to_string(),
            version_range: None,
            required: false,
            platforms: SmallVec::from_vec(vec!["velocity".to_string()]),
        });

        let bukkit: Vec<_> = desc.dependencies_for("bukkit").map(|d| d.id.as_str()).collect();
        let velocity: Vec<_> = desc
            .dependencies_for("velocity")
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(bukkit, vec!["Vault"]);
        assert_eq!(velocity, vec!["Vault", "luckperms"]);
    }

    #[test]
    fn test_generated_names() {
        let desc = descriptor();
        let platform = PlatformSpec::named("bukkit");
        assert_eq!(desc.generated_class_name(&platform), "DemoBukkit");
        assert_eq!(
            desc.generated_main(&platform),
            "com.example.demo.platform.bukkit.DemoBukkit"
        );

        let mut root = desc.clone();
        root.entry_point = EntryPoint::from_qualified("Demo");
        assert_eq!(root.generated_package(&platform), "platform.bukkit");
    }

    #[test]
    fn test_permission_default_parse() {
        assert_eq!(PermissionDefault::parse("OP"), Some(PermissionDefault::Op));
        assert_eq!(
            PermissionDefault::parse("not_op"),
            Some(PermissionDefault::NotOp)
        );
        assert_eq!(PermissionDefault::parse("sometimes"), None);
    }
}
