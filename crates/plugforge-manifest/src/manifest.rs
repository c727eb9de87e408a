//! Manifest emission
//!
//! A platform's manifest is described entirely by its field mapping: an
//! ordered list of `{key, source | value}` entries. The emitter resolves each
//! source against the descriptor, builds an ordered value tree, checks the
//! platform's identifier constraints and serialises the tree in the
//! platform's format.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::errors::{ConstraintError, ConstraintRule, ContractError, PlatformError};
use crate::platform::{FieldMapping, ManifestFormat, PlatformSpec};
use crate::types::{
    ArtifactKind, CommandSpec, GeneratedArtifact, PermissionDefault, PermissionSpec,
    PluginDescriptor, VersionRange,
};
use crate::value::{ManifestTable, ManifestValue};

/// A successfully emitted manifest plus anything the platform could not represent
#[derive(Debug, Clone)]
pub struct EmittedManifest {
    pub artifact: GeneratedArtifact,
    pub warnings: Vec<String>,
}

/// Where a top-level manifest value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSource {
    Id,
    Name,
    Version,
    Description,
    Url,
    License,
    Authors,
    Author,
    Contributors,
    Main,
    EntryPoint,
    ApiVersion,
    ApiRange,
    Platform,
    Depend,
    Softdepend,
    Dependencies,
    RequiredVersions,
    OptionalVersions,
    Commands,
    CommandList,
    Permissions,
    PermissionList,
}

impl FromStr for FieldSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "id" => Self::Id,
            "name" => Self::Name,
            "version" => Self::Version,
            "description" => Self::Description,
            "url" => Self::Url,
            "license" => Self::License,
            "authors" => Self::Authors,
            "author" => Self::Author,
            "contributors" => Self::Contributors,
            "main" => Self::Main,
            "entry_point" => Self::EntryPoint,
            "api_version" => Self::ApiVersion,
            "api_range" => Self::ApiRange,
            "platform" => Self::Platform,
            "depend" => Self::Depend,
            "softdepend" => Self::Softdepend,
            "dependencies" => Self::Dependencies,
            "required_versions" => Self::RequiredVersions,
            "optional_versions" => Self::OptionalVersions,
            "commands" => Self::Commands,
            "command_list" => Self::CommandList,
            "permissions" => Self::Permissions,
            "permission_list" => Self::PermissionList,
            other => return Err(format!("unknown source `{other}`")),
        })
    }
}

/// A dependency as seen by one platform, implicit ones included
#[derive(Debug, Clone)]
struct ResolvedDependency {
    id: String,
    version: Option<String>,
    required: bool,
}

pub struct ManifestEmitter;

impl ManifestEmitter {
    /// Emit the manifest of `descriptor` for `platform`.
    ///
    /// Every contract and constraint problem is collected before returning so
    /// the report can list them all.
    pub fn emit(
        descriptor: &PluginDescriptor,
        platform: &PlatformSpec,
    ) -> Result<EmittedManifest, Vec<PlatformError>> {
        let ctx = EmitContext::new(descriptor, platform);
        let mut errors: Vec<PlatformError> = Vec::new();

        let format = match platform.manifest.format.as_deref() {
            Some(raw) => match raw.parse::<ManifestFormat>() {
                Ok(format) => Some(format),
                Err(reason) => {
                    errors.push(ctx.contract("manifest.format", reason).into());
                    None
                }
            },
            None => {
                errors.push(ctx.contract("manifest.format", "missing").into());
                None
            }
        };

        let output_path = match manifest_path(platform) {
            Ok(path) => Some(path),
            Err(reason) => {
                errors.push(ctx.contract("manifest.path", reason).into());
                None
            }
        };

        if let Some(error) = ctx.check_api_range() {
            errors.push(error.into());
        }

        let (constraint_errors, contract_errors) = ctx.check_constraints();
        errors.extend(contract_errors.into_iter().map(PlatformError::from));
        errors.extend(constraint_errors.into_iter().map(PlatformError::from));

        let table = match ctx.build_table() {
            Ok(table) => Some(table),
            Err(contract_errors) => {
                errors.extend(contract_errors.into_iter().map(PlatformError::from));
                None
            }
        };

        let (Some(format), Some(output_path), Some(table), true) =
            (format, output_path, table, errors.is_empty())
        else {
            return Err(errors);
        };

        let content = serialize(&table, format).map_err(|reason| {
            vec![PlatformError::from(ctx.contract("manifest", reason))]
        })?;
        debug!(
            "Emitted {} manifest for '{}' ({} bytes)",
            format,
            platform.key,
            content.len()
        );

        Ok(EmittedManifest {
            artifact: GeneratedArtifact {
                platform: platform.key.clone(),
                kind: ArtifactKind::Manifest,
                content,
                output_path,
            },
            warnings: ctx.warnings(),
        })
    }
}

/// `<platform>/<manifest path>`, refusing anything that escapes the platform directory
pub fn manifest_path(platform: &PlatformSpec) -> Result<PathBuf, String> {
    let raw = platform
        .manifest
        .path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| "missing".to_string())?;
    let relative = Path::new(raw);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(format!("`{raw}` must be a plain relative path"));
    }
    Ok(Path::new(&platform.key).join(relative))
}

struct EmitContext<'a> {
    descriptor: &'a PluginDescriptor,
    platform: &'a PlatformSpec,
    main: String,
    dependencies: Vec<ResolvedDependency>,
}

impl<'a> EmitContext<'a> {
    fn new(descriptor: &'a PluginDescriptor, platform: &'a PlatformSpec) -> Self {
        let mut dependencies: Vec<ResolvedDependency> = descriptor
            .dependencies_for(&platform.key)
            .map(|dep| ResolvedDependency {
                id: dep.id.clone(),
                version: dep.version_range.as_ref().map(|r| r.raw.clone()),
                required: dep.required,
            })
            .collect();
        for implicit in &platform.manifest.implicit_dependencies {
            let declared = dependencies
                .iter()
                .any(|dep| dep.id.eq_ignore_ascii_case(&implicit.id));
            if !declared {
                dependencies.push(ResolvedDependency {
                    id: implicit.id.clone(),
                    version: implicit.version.clone(),
                    required: implicit.required,
                });
            }
        }

        Self {
            descriptor,
            platform,
            main: descriptor.generated_main(platform),
            dependencies,
        }
    }

    fn contract(&self, element: impl Into<String>, reason: impl Into<String>) -> ContractError {
        ContractError::new(&self.platform.key, element, reason)
    }

    // -------------------------------------------------------------------------
    // value tree
    // -------------------------------------------------------------------------

    fn build_table(&self) -> Result<ManifestTable, Vec<ContractError>> {
        let mut table = ManifestTable::new();
        let mut errors = Vec::new();

        for (index, mapping) in self.platform.manifest.fields.iter().enumerate() {
            let element = format!("manifest.fields[{index}] ({})", mapping.key);
            let resolved = resolve_mapping(mapping, |source| {
                let source = source.parse::<FieldSource>()?;
                self.resolve(source)
            });
            match resolved {
                Ok(Some(value)) => {
                    if let Err(reason) = table.insert_path(&mapping.key, value) {
                        errors.push(self.contract(element, reason));
                    }
                }
                Ok(None) => {}
                Err(reason) => errors.push(self.contract(element, reason)),
            }
        }

        if errors.is_empty() {
            Ok(table)
        } else {
            Err(errors)
        }
    }

    fn resolve(&self, source: FieldSource) -> Result<Option<ManifestValue>, String> {
        let desc = self.descriptor;
        let text = |value: Option<&String>| value.map(|s| ManifestValue::String(s.clone()));

        Ok(match source {
            FieldSource::Id => Some(desc.id.as_str().into()),
            FieldSource::Name => Some(desc.display_name().into()),
            FieldSource::Version => Some(desc.version.to_string().into()),
            FieldSource::Description => text(desc.description.as_ref()),
            FieldSource::Url => text(desc.url.as_ref()),
            FieldSource::License => text(desc.license.as_ref()),
            FieldSource::Authors => Some(ManifestValue::string_list(desc.authors.iter().cloned())),
            FieldSource::Author => Some(desc.authors.join(", ").into()),
            FieldSource::Contributors => Some(ManifestValue::List(
                desc.authors
                    .iter()
                    .map(|author| {
                        let mut entry = ManifestTable::new();
                        entry.insert("name", author.as_str().into());
                        ManifestValue::Table(entry)
                    })
                    .collect(),
            )),
            FieldSource::Main => Some(self.main.as_str().into()),
            FieldSource::EntryPoint => Some(desc.entry_point.qualified_name.as_str().into()),
            FieldSource::ApiVersion => self
                .platform
                .api
                .as_ref()
                .and_then(|api| text(api.version.as_ref())),
            FieldSource::ApiRange => self
                .platform
                .api
                .as_ref()
                .and_then(|api| text(api.range.as_ref())),
            FieldSource::Platform => Some(self.platform.key.as_str().into()),
            FieldSource::Depend => Some(ManifestValue::string_list(
                self.dependencies
                    .iter()
                    .filter(|dep| dep.required)
                    .map(|dep| dep.id.clone()),
            )),
            FieldSource::Softdepend => Some(ManifestValue::string_list(
                self.dependencies
                    .iter()
                    .filter(|dep| !dep.required)
                    .map(|dep| dep.id.clone()),
            )),
            FieldSource::RequiredVersions => Some(self.version_table(true)),
            FieldSource::OptionalVersions => Some(self.version_table(false)),
            FieldSource::Dependencies => {
                let mappings = entry_mappings(
                    &self.platform.manifest.dependency_fields,
                    &[("id", "id"), ("version", "version"), ("optional", "optional")],
                );
                let entries = self
                    .dependencies
                    .iter()
                    .map(|dep| {
                        build_entry(&mappings, "manifest.dependency_fields", |source| {
                            dependency_value(source, dep)
                        })
                        .map(ManifestValue::Table)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(ManifestValue::List(entries))
            }
            FieldSource::Commands | FieldSource::CommandList => {
                let mappings = entry_mappings(
                    &self.platform.manifest.command_fields,
                    &[
                        ("description", "description"),
                        ("usage", "usage"),
                        ("aliases", "aliases"),
                        ("permission", "permission"),
                    ],
                );
                let keyed = source == FieldSource::Commands;
                self.entry_collection(
                    desc.commands.iter().map(|cmd| (cmd.name.as_str(), cmd)),
                    &mappings,
                    "manifest.command_fields",
                    keyed,
                    command_value,
                )?
            }
            FieldSource::Permissions | FieldSource::PermissionList => {
                let mappings = entry_mappings(
                    &self.platform.manifest.permission_fields,
                    &[("description", "description"), ("default", "default")],
                );
                let keyed = source == FieldSource::Permissions;
                self.entry_collection(
                    desc.permissions.iter().map(|perm| (perm.node.as_str(), perm)),
                    &mappings,
                    "manifest.permission_fields",
                    keyed,
                    permission_value,
                )?
            }
        })
    }

    fn version_table(&self, required: bool) -> ManifestValue {
        let mut table = ManifestTable::new();
        for dep in self.dependencies.iter().filter(|dep| dep.required == required) {
            let version = dep.version.clone().unwrap_or_else(|| "*".to_string());
            table.insert(dep.id.clone(), version.into());
        }
        ManifestValue::Table(table)
    }

    /// Commands or permissions, either keyed by name or as a list of tables
    fn entry_collection<'e, T: 'e>(
        &self,
        entries: impl Iterator<Item = (&'e str, &'e T)>,
        mappings: &[FieldMapping],
        element: &str,
        keyed: bool,
        value_of: fn(&str, &T) -> Result<Option<ManifestValue>, String>,
    ) -> Result<Option<ManifestValue>, String> {
        if keyed {
            let mut table = ManifestTable::new();
            for (name, entry) in entries {
                let fields = build_entry(mappings, element, |source| value_of(source, entry))?;
                table.insert(name, ManifestValue::Table(fields));
            }
            Ok(Some(ManifestValue::Table(table)))
        } else {
            let list = entries
                .map(|(_, entry)| {
                    build_entry(mappings, element, |source| value_of(source, entry))
                        .map(ManifestValue::Table)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(ManifestValue::List(list)))
        }
    }

    // -------------------------------------------------------------------------
    // warnings
    // -------------------------------------------------------------------------

    fn mapped_sources(&self) -> Vec<FieldSource> {
        self.platform
            .manifest
            .fields
            .iter()
            .filter_map(|m| m.source.as_deref())
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    fn warnings(&self) -> Vec<String> {
        let mapped = self.mapped_sources();
        let has = |sources: &[FieldSource]| sources.iter().any(|s| mapped.contains(s));
        let key = &self.platform.key;
        let mut warnings = Vec::new();

        let commands = &self.descriptor.commands;
        if !commands.is_empty() && !has(&[FieldSource::Commands, FieldSource::CommandList]) {
            warnings.push(format!(
                "{key} manifest cannot declare commands; not emitted: {}",
                join_names(commands.iter().map(|c: &CommandSpec| c.name.as_str()))
            ));
        }

        let permissions = &self.descriptor.permissions;
        if !permissions.is_empty()
            && !has(&[FieldSource::Permissions, FieldSource::PermissionList])
        {
            warnings.push(format!(
                "{key} manifest cannot declare permissions; not emitted: {}",
                join_names(permissions.iter().map(|p: &PermissionSpec| p.node.as_str()))
            ));
        }

        let required = self.dependencies.iter().filter(|d| d.required);
        let optional = self.dependencies.iter().filter(|d| !d.required);
        let required_sources = [
            FieldSource::Depend,
            FieldSource::Dependencies,
            FieldSource::RequiredVersions,
        ];
        let optional_sources = [
            FieldSource::Softdepend,
            FieldSource::Dependencies,
            FieldSource::OptionalVersions,
        ];
        if required.clone().next().is_some() && !has(&required_sources) {
            warnings.push(format!(
                "{key} manifest cannot declare required dependencies; not emitted: {}",
                join_names(required.map(|d| d.id.as_str()))
            ));
        }
        if optional.clone().next().is_some() && !has(&optional_sources) {
            warnings.push(format!(
                "{key} manifest cannot declare optional dependencies; not emitted: {}",
                join_names(optional.map(|d| d.id.as_str()))
            ));
        }

        warnings
    }

    // -------------------------------------------------------------------------
    // constraints
    // -------------------------------------------------------------------------

    fn check_api_range(&self) -> Option<ContractError> {
        let raw = self.platform.api.as_ref()?.range.as_deref()?;
        VersionRange::parse(raw)
            .err()
            .map(|reason| self.contract("api.range", format!("`{raw}`: {reason}")))
    }

    /// Values of a constrained field as seen by this platform
    fn constrained_values(&self, field: &str) -> Option<Vec<String>> {
        let desc = self.descriptor;
        Some(match field {
            "id" => vec![desc.id.clone()],
            "name" => vec![desc.display_name().to_string()],
            "version" => vec![desc.version.to_string()],
            "main" => vec![self.main.clone()],
            "command" => desc.commands.iter().map(|c| c.name.clone()).collect(),
            "alias" => desc
                .commands
                .iter()
                .flat_map(|c| c.aliases.iter().cloned())
                .collect(),
            "permission" => desc.permissions.iter().map(|p| p.node.clone()).collect(),
            "dependency_id" => self.dependencies.iter().map(|d| d.id.clone()).collect(),
            "dependency_version" => self
                .dependencies
                .iter()
                .map(|d| d.version.clone().unwrap_or_default())
                .collect(),
            "author" => desc.authors.iter().cloned().collect(),
            _ => return None,
        })
    }

    fn check_constraints(&self) -> (Vec<ConstraintError>, Vec<ContractError>) {
        let mut violations = Vec::new();
        let mut contract_errors = Vec::new();

        for (index, constraint) in self.platform.constraints.iter().enumerate() {
            let element = format!("constraints[{index}] ({})", constraint.field);
            let Some(values) = self.constrained_values(&constraint.field) else {
                contract_errors.push(self.contract(element, "unknown constrained field"));
                continue;
            };

            let pattern = match constraint.pattern.as_deref() {
                Some(raw) => match Regex::new(&format!("^(?:{raw})$")) {
                    Ok(re) => Some((raw, re)),
                    Err(e) => {
                        contract_errors.push(self.contract(element, format!("bad pattern: {e}")));
                        continue;
                    }
                },
                None => None,
            };

            for value in values {
                let violation = |rule| ConstraintError {
                    platform: self.platform.key.clone(),
                    field: constraint.field.clone(),
                    value: value.clone(),
                    rule,
                };
                let length = value.chars().count();
                if let Some(max) = constraint.max_length.filter(|&max| length > max) {
                    violations.push(violation(ConstraintRule::MaxLength(max)));
                }
                if let Some(min) = constraint.min_length.filter(|&min| length < min) {
                    violations.push(violation(ConstraintRule::MinLength(min)));
                }
                if let Some((raw, re)) = &pattern {
                    if !re.is_match(&value) {
                        violations.push(violation(ConstraintRule::Pattern((*raw).to_string())));
                    }
                }
                for prefix in &constraint.forbidden_prefixes {
                    if value.starts_with(prefix.as_str()) {
                        violations.push(violation(ConstraintRule::ForbiddenPrefix(prefix.clone())));
                    }
                }
            }
        }

        (violations, contract_errors)
    }
}

fn join_names<'n>(names: impl Iterator<Item = &'n str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Resolve one mapping: a literal `value`, or a `source` with optional `default`
fn resolve_mapping(
    mapping: &FieldMapping,
    resolve: impl Fn(&str) -> Result<Option<ManifestValue>, String>,
) -> Result<Option<ManifestValue>, String> {
    let value = match (&mapping.source, &mapping.value) {
        (Some(_), Some(_)) => return Err("has both `source` and `value`".to_string()),
        (None, None) => return Err("needs a `source` or a `value`".to_string()),
        (None, Some(literal)) => Some(ManifestValue::from_toml(literal)?),
        (Some(source), None) => match resolve(source)?.filter(|v| !v.is_empty()) {
            Some(value) => Some(value),
            None => mapping
                .default
                .as_ref()
                .map(ManifestValue::from_toml)
                .transpose()?,
        },
    };
    Ok(value.filter(|v| !v.is_empty()))
}

fn entry_mappings(declared: &[FieldMapping], defaults: &[(&str, &str)]) -> Vec<FieldMapping> {
    if !declared.is_empty() {
        return declared.to_vec();
    }
    defaults
        .iter()
        .map(|(key, source)| FieldMapping {
            key: (*key).to_string(),
            source: Some((*source).to_string()),
            ..FieldMapping::default()
        })
        .collect()
}

fn build_entry(
    mappings: &[FieldMapping],
    element: &str,
    resolve: impl Fn(&str) -> Result<Option<ManifestValue>, String>,
) -> Result<ManifestTable, String> {
    let mut table = ManifestTable::new();
    for mapping in mappings {
        let value = resolve_mapping(mapping, &resolve)
            .map_err(|reason| format!("{element} ({}): {reason}", mapping.key))?;
        if let Some(value) = value {
            table.insert_path(&mapping.key, value)?;
        }
    }
    Ok(table)
}

fn dependency_value(source: &str, dep: &ResolvedDependency) -> Result<Option<ManifestValue>, String> {
    Ok(match source {
        "id" => Some(dep.id.as_str().into()),
        "id_lower" => Some(dep.id.to_lowercase().into()),
        "version" => dep.version.clone().map(ManifestValue::String),
        "optional" => Some((!dep.required).into()),
        "required" => Some(dep.required.into()),
        other => return Err(format!("unknown dependency source `{other}`")),
    })
}

fn command_value(source: &str, cmd: &CommandSpec) -> Result<Option<ManifestValue>, String> {
    Ok(match source {
        "name" => Some(cmd.name.as_str().into()),
        "aliases" => Some(ManifestValue::string_list(cmd.aliases.iter().cloned())),
        "permission" => cmd.permission.clone().map(ManifestValue::String),
        "usage" => cmd.usage.clone().map(ManifestValue::String),
        "description" => cmd.description.clone().map(ManifestValue::String),
        other => return Err(format!("unknown command source `{other}`")),
    })
}

fn permission_value(source: &str, perm: &PermissionSpec) -> Result<Option<ManifestValue>, String> {
    Ok(match source {
        "node" => Some(perm.node.as_str().into()),
        "default" => Some(match perm.default {
            PermissionDefault::True => ManifestValue::Bool(true),
            PermissionDefault::False => ManifestValue::Bool(false),
            other => other.as_str().into(),
        }),
        "description" => perm.description.clone().map(ManifestValue::String),
        other => return Err(format!("unknown permission source `{other}`")),
    })
}

fn serialize(table: &ManifestTable, format: ManifestFormat) -> Result<String, String> {
    let mut content = match format {
        ManifestFormat::StructuredMarkup => serde_yaml::to_string(table).map_err(|e| e.to_string())?,
        ManifestFormat::StructuredData => {
            serde_json::to_string_pretty(table).map_err(|e| e.to_string())?
        }
        ManifestFormat::KeyValue => {
            toml::to_string(&tables_last(table)).map_err(|e| e.to_string())?
        }
    };
    if !content.ends_with('\n') {
        content.push('\n');
    }
    Ok(content)
}

/// TOML needs plain values before sub-tables at every level
fn tables_last(table: &ManifestTable) -> ManifestTable {
    let is_table_like = |value: &ManifestValue| match value {
        ManifestValue::Table(_) => true,
        ManifestValue::List(items) => {
            !items.is_empty() && items.iter().all(|i| matches!(i, ManifestValue::Table(_)))
        }
        _ => false,
    };
    let reorder = |value: &ManifestValue| match value {
        ManifestValue::Table(inner) => ManifestValue::Table(tables_last(inner)),
        ManifestValue::List(items) => ManifestValue::List(
            items
                .iter()
                .map(|item| match item {
                    ManifestValue::Table(inner) => ManifestValue::Table(tables_last(inner)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    };

    let mut ordered = ManifestTable::new();
    for (key, value) in table.iter().filter(|(_, v)| !is_table_like(v)) {
        ordered.insert(key, reorder(value));
    }
    for (key, value) in table.iter().filter(|(_, v)| is_table_like(v)) {
        ordered.insert(key, reorder(value));
    }
    ordered
}
