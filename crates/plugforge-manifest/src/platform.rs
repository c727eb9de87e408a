//! Static platform specifications
//!
//! Every field is optional at the serde level: a platform with an incomplete
//! contract still loads, and the gap surfaces as a `ContractError` when that
//! platform is emitted. Other platforms are unaffected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::naming;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformSpec {
    /// Registry key, filled from the table name
    #[serde(skip)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub entry_point: EntryPointContract,
    #[serde(default)]
    pub manifest: ManifestSchema,
    #[serde(default)]
    pub constraints: Vec<IdentifierConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiRange>,
}

impl PlatformSpec {
    /// Empty spec for `key`
    pub fn named(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    /// Name used in generated class names (`Bukkit`, `Velocity`)
    pub fn display_name(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name.chars().filter(|c| !c.is_whitespace()).collect(),
            _ => naming::kebab_to_pascal(&self.key),
        }
    }

    pub fn file_extension(&self) -> &str {
        self.entry_point.file_extension.as_deref().unwrap_or("java")
    }
}

// =============================================================================
// ENTRY POINT CONTRACT
// =============================================================================

/// What the generated bootstrap class must look like for the host to load it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub class_annotations: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<ConstructorSpec>,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
    #[serde(default)]
    pub context: ContextSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorSpec {
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<String>,
}

/// A method the host calls; either routed to a lifecycle hook or given a literal body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    /// Lines run before the hook dispatch
    #[serde(default)]
    pub prelude: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<String>>,
}

/// Platform expressions used to build the unified plugin context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_directory: Option<String>,
}

/// Unified lifecycle hooks of the user plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleHook {
    Load,
    Enable,
    Disable,
}

impl LifecycleHook {
    pub const ALL: [LifecycleHook; 3] = [Self::Load, Self::Enable, Self::Disable];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }

    /// Method on the unified plugin class this hook calls
    pub fn plugin_method(self) -> &'static str {
        match self {
            Self::Load => "onLoad",
            Self::Enable => "onEnable",
            Self::Disable => "onDisable",
        }
    }
}

impl FromStr for LifecycleHook {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load" => Ok(Self::Load),
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            other => Err(format!(
                "unknown hook `{other}` (expected load, enable or disable)"
            )),
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MANIFEST SCHEMA
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// TOML
    KeyValue,
    /// YAML
    StructuredMarkup,
    /// JSON
    StructuredData,
}

impl FromStr for ManifestFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key-value" | "toml" => Ok(Self::KeyValue),
            "structured-markup" | "yaml" => Ok(Self::StructuredMarkup),
            "structured-data" | "json" => Ok(Self::StructuredData),
            other => Err(format!("unknown manifest format `{other}`")),
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KeyValue => "key-value",
            Self::StructuredMarkup => "structured-markup",
            Self::StructuredData => "structured-data",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub dependency_fields: Vec<FieldMapping>,
    #[serde(default)]
    pub command_fields: Vec<FieldMapping>,
    #[serde(default)]
    pub permission_fields: Vec<FieldMapping>,
    #[serde(default)]
    pub implicit_dependencies: Vec<ImplicitDependency>,
}

/// One manifest key and where its value comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<toml::Value>,
    /// Used when `source` resolves to nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<toml::Value>,
}

/// A dependency the platform always needs, such as Sponge's API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitDependency {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// CONSTRAINTS & API
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierConstraint {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub forbidden_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
