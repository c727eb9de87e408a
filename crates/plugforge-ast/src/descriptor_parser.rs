//! Descriptor construction from annotated types
//!
//! The parser is a pure function of the scanned types and the set of
//! registered platform keys. Every problem is collected before returning, so
//! one run reports all of them; a descriptor is only returned when there are
//! none.

use ahash::AHashMap;
use once_cell::sync::Lazy;
use plugforge_manifest::errors::{DescriptorError, ParseError, SourceLocation, ValidationError};
use plugforge_manifest::semver::Version;
use plugforge_manifest::types::{
    CommandSpec, DependencySpec, EntryPoint, GeneratorOptions, PermissionDefault, PermissionSpec,
    PluginDescriptor, VersionRange,
};
use regex::Regex;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use tracing::debug;

use crate::annotations::{AnnotatedType, Annotation, AnnotationValue, TypeKind};

pub const PLUGIN: &str = "Plugin";
pub const DEPENDENCY: &str = "Dependency";
pub const COMMAND: &str = "Command";
pub const PERMISSION: &str = "Permission";
pub const BOOTSTRAP: &str = "Bootstrap";
pub const GENERATOR_OPTIONS: &str = "PluginGeneratorOptions";

static ID_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").ok());

pub struct DescriptorParser {
    known_platforms: BTreeSet<String>,
    generator_defaults: GeneratorOptions,
}

impl DescriptorParser {
    pub fn new<I, S>(known_platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_platforms: known_platforms.into_iter().map(Into::into).collect(),
            generator_defaults: GeneratorOptions::default(),
        }
    }

    /// Formats used where `@PluginGeneratorOptions` leaves an attribute unset
    pub fn with_generator_defaults(mut self, defaults: GeneratorOptions) -> Self {
        self.generator_defaults = defaults;
        self
    }

    /// Extract and validate the single plugin descriptor
    pub fn parse(&self, types: &[AnnotatedType]) -> Result<PluginDescriptor, Vec<DescriptorError>> {
        let descriptor = self
            .extract(types)
            .map_err(|errors| errors.into_iter().map(DescriptorError::from).collect::<Vec<_>>())?;

        let violations = self.validate(&descriptor);
        if violations.is_empty() {
            debug!(
                "Descriptor `{}` {} validated: {} dependencies, {} commands, {} permissions",
                descriptor.id,
                descriptor.version,
                descriptor.dependencies.len(),
                descriptor.commands.len(),
                descriptor.permissions.len()
            );
            Ok(descriptor)
        } else {
            Err(violations.into_iter().map(DescriptorError::from).collect())
        }
    }

    /// Build a descriptor from the annotations without cross-field checks
    pub fn extract(&self, types: &[AnnotatedType]) -> Result<PluginDescriptor, Vec<ParseError>> {
        let mut errors = Vec::new();

        let entries: Vec<(&AnnotatedType, &Annotation)> = types
            .iter()
            .flat_map(|t| t.annotations_named(PLUGIN).map(move |a| (t, a)))
            .collect();

        let (entry_type, plugin) = match entries.as_slice() {
            [] => return Err(vec![ParseError::MissingEntryPoint]),
            [single] => *single,
            many => {
                let candidates = many
                    .iter()
                    .map(|(t, a)| (t.qualified_name.clone(), t.location_of(a)))
                    .collect();
                return Err(vec![ParseError::AmbiguousEntryPoint { candidates }]);
            }
        };

        if let Some(reason) = entry_point_defect(entry_type) {
            errors.push(ParseError::InvalidEntryPoint {
                type_name: entry_type.qualified_name.clone(),
                location: entry_type.location(),
                reason,
            });
        }

        let mut reader = AttributeReader::new(plugin, entry_type.location_of(plugin));
        let id = reader.required_str(&["id"]);
        let version = reader.required_str(&["version"]);
        let name = reader.optional_str(&["name"]);
        let description = reader.optional_str(&["description"]);
        let url = reader.optional_str(&["url", "website"]);
        let license = reader.optional_str(&["license"]);
        let authors = reader.str_list(&["authors"]);
        let dependency_annotations = reader.annotations(&["dependencies"], DEPENDENCY);
        let command_annotations = reader.annotations(&["commands"], COMMAND);
        let permission_annotations = reader.annotations(&["permissions"], PERMISSION);
        let target_platforms = reader.platforms(&["platforms"]);
        errors.extend(reader.finish());

        let location = entry_type.location_of(plugin);
        if let Some(id) = &id {
            if !ID_RE.as_ref().is_some_and(|re| re.is_match(id)) {
                errors.push(ParseError::InvalidId {
                    value: id.clone(),
                    location: location.clone(),
                });
            }
        }
        let version = version.and_then(|raw| match Version::parse(raw.trim()) {
            Ok(version) => Some(version),
            Err(e) => {
                errors.push(ParseError::InvalidVersion {
                    value: raw,
                    reason: e.to_string(),
                    location: location.clone(),
                });
                None
            }
        });

        let dependencies: Vec<DependencySpec> = dependency_annotations
            .iter()
            .filter_map(|a| parse_dependency(a, entry_type.location_of(a), &mut errors))
            .collect();

        let mut commands: Vec<CommandSpec> = command_annotations
            .iter()
            .filter_map(|a| parse_command(a, entry_type.location_of(a), &mut errors))
            .collect();
        let mut permissions: Vec<PermissionSpec> = permission_annotations
            .iter()
            .filter_map(|a| parse_permission(a, entry_type.location_of(a), &mut errors))
            .collect();

        // Standalone declarations follow the nested ones, in scan order
        for t in types {
            for a in t.annotations_named(COMMAND) {
                commands.extend(parse_command(a, t.location_of(a), &mut errors));
            }
            for a in t.annotations_named(PERMISSION) {
                permissions.extend(parse_permission(a, t.location_of(a), &mut errors));
            }
        }

        let bootstrap = parse_bootstrap(types, &mut errors);
        let generator = self.parse_generator(types, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }
        let (Some(id), Some(version)) = (id, version) else {
            return Err(errors);
        };

        let mut descriptor = PluginDescriptor::new(
            id,
            version,
            EntryPoint::from_qualified(&entry_type.qualified_name),
        );
        descriptor.name = name;
        descriptor.description = description;
        descriptor.url = url;
        descriptor.license = license;
        descriptor.authors = SmallVec::from_vec(authors);
        descriptor.bootstrap = bootstrap;
        descriptor.generator = generator;
        descriptor.dependencies = dependencies;
        descriptor.commands = commands;
        descriptor.permissions = permissions;
        descriptor.target_platforms = target_platforms;
        Ok(descriptor)
    }

    /// Cross-field checks on an extracted descriptor
    pub fn validate(&self, descriptor: &PluginDescriptor) -> Vec<ValidationError> {
        let mut violations = Vec::new();

        // Command names and aliases share one case-insensitive namespace
        let mut owners: AHashMap<String, &str> = AHashMap::new();
        for command in &descriptor.commands {
            let key = command.name.to_lowercase();
            if owners.contains_key(&key) {
                violations.push(ValidationError::DuplicateCommand {
                    name: command.name.clone(),
                });
            } else {
                owners.insert(key, &command.name);
            }
        }
        for command in &descriptor.commands {
            for alias in &command.aliases {
                let key = alias.to_lowercase();
                match owners.get(&key) {
                    Some(other) if !other.eq_ignore_ascii_case(&command.name) => {
                        violations.push(ValidationError::AliasCollision {
                            alias: alias.clone(),
                            command: command.name.clone(),
                            other: (*other).to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(key, &command.name);
                    }
                }
            }
        }

        let mut nodes = BTreeSet::new();
        for permission in &descriptor.permissions {
            if !nodes.insert(permission.node.to_lowercase()) {
                violations.push(ValidationError::DuplicatePermission {
                    node: permission.node.clone(),
                });
            }
        }

        // One declaration per dependency id on any platform
        let dependencies = &descriptor.dependencies;
        for (index, dependency) in dependencies.iter().enumerate() {
            let earlier = dependencies[..index]
                .iter()
                .find(|other| other.id.eq_ignore_ascii_case(&dependency.id) && overlap(other, dependency));
            if let Some(other) = earlier {
                violations.push(ValidationError::DuplicateDependency {
                    id: dependency.id.clone(),
                    platforms: shared_platforms(other, dependency),
                });
            }
        }

        for dependency in &descriptor.dependencies {
            for platform in &dependency.platforms {
                if !self.known_platforms.contains(platform) {
                    violations.push(ValidationError::UnknownDependencyPlatform {
                        dependency: dependency.id.clone(),
                        platform: platform.clone(),
                    });
                }
            }
        }

        for platform in &descriptor.target_platforms {
            if !self.known_platforms.contains(platform) {
                violations.push(ValidationError::UnknownTargetPlatform {
                    platform: platform.clone(),
                });
            }
        }

        violations
    }

    fn parse_generator(&self, types: &[AnnotatedType], errors: &mut Vec<ParseError>) -> GeneratorOptions {
        let mut options = self.generator_defaults.clone();
        let Some((t, annotation)) = types
            .iter()
            .find_map(|t| t.annotations_named(GENERATOR_OPTIONS).next().map(|a| (t, a)))
        else {
            return options;
        };

        let mut reader = AttributeReader::new(annotation, t.location_of(annotation));
        if let Some(class_name) = reader.optional_str(&["generatedClassName", "className"]) {
            options.class_name = class_name;
        }
        if let Some(package_name) = reader.optional_str(&["generatedPackageName", "packageName"]) {
            options.package_name = package_name;
        }
        errors.extend(reader.finish());
        options
    }
}

fn entry_point_defect(entry: &AnnotatedType) -> Option<String> {
    if entry.kind != TypeKind::Class {
        Some(format!("must be a class, found {}", entry.kind))
    } else if entry.is_abstract {
        Some("must not be abstract".to_string())
    } else {
        None
    }
}

fn parse_bootstrap(types: &[AnnotatedType], errors: &mut Vec<ParseError>) -> Option<String> {
    let marked: Vec<(&AnnotatedType, &Annotation)> = types
        .iter()
        .flat_map(|t| t.annotations_named(BOOTSTRAP).map(move |a| (t, a)))
        .collect();

    match marked.as_slice() {
        [] => None,
        [(t, a)] => {
            errors.extend(AttributeReader::new(a, t.location_of(a)).finish());
            Some(t.qualified_name.clone())
        }
        many => {
            errors.push(ParseError::AmbiguousBootstrap {
                candidates: many
                    .iter()
                    .map(|(t, a)| (t.qualified_name.clone(), t.location_of(a)))
                    .collect(),
            });
            None
        }
    }
}

fn parse_dependency(
    annotation: &Annotation,
    location: SourceLocation,
    errors: &mut Vec<ParseError>,
) -> Option<DependencySpec> {
    let mut reader = AttributeReader::new(annotation, location.clone());
    let id = reader.required_str(&["id", "name", "value"]);
    let version = reader.optional_str(&["version"]);
    let optional = reader.bool(&["optional", "soft"]).unwrap_or(false);
    let platforms = reader.platforms(&["platforms"]);
    errors.extend(reader.finish());

    let id = id?;
    let version_range = match version.filter(|v| !v.trim().is_empty()) {
        None => None,
        Some(raw) => match VersionRange::parse(&raw) {
            Ok(range) => Some(range),
            Err(reason) => {
                errors.push(ParseError::InvalidVersionRange {
                    dependency: id,
                    value: raw,
                    reason,
                    location,
                });
                return None;
            }
        },
    };

    Some(DependencySpec {
        id,
        version_range,
        required: !optional,
        platforms: SmallVec::from_vec(platforms),
    })
}

fn parse_command(
    annotation: &Annotation,
    location: SourceLocation,
    errors: &mut Vec<ParseError>,
) -> Option<CommandSpec> {
    let mut reader = AttributeReader::new(annotation, location);
    let name = reader.required_str(&["name", "value"]);
    let aliases = reader.str_list(&["aliases"]);
    let permission = reader.optional_str(&["permission"]);
    let usage = reader.optional_str(&["usage"]);
    let description = reader.optional_str(&["description"]);
    errors.extend(reader.finish());

    let mut command = CommandSpec::new(name?);
    command.aliases = SmallVec::from_vec(aliases);
    command.permission = permission;
    command.usage = usage;
    command.description = description;
    Some(command)
}

fn parse_permission(
    annotation: &Annotation,
    location: SourceLocation,
    errors: &mut Vec<ParseError>,
) -> Option<PermissionSpec> {
    let mut reader = AttributeReader::new(annotation, location.clone());
    let node = reader.required_str(&["node", "value"]);
    let default = reader.take(&["defaultGrant", "default"]).map(|(_, v)| v);
    let description = reader.optional_str(&["description"]);
    errors.extend(reader.finish());

    let default = match default {
        None => PermissionDefault::default(),
        Some(value) => {
            let raw = match value {
                AnnotationValue::Bool(b) => b.to_string(),
                AnnotationValue::Str(s) => s.clone(),
                AnnotationValue::Symbol(_) => value.symbol_name().unwrap_or_default().to_string(),
                other => other.to_string(),
            };
            if let Some(default) = PermissionDefault::parse(&raw) {
                default
            } else {
                errors.push(ParseError::InvalidPermissionDefault {
                    value: raw,
                    location,
                });
                return None;
            }
        }
    };

    let mut permission = PermissionSpec::new(node?);
    permission.default = default;
    permission.description = description;
    Some(permission)
}

// =============================================================================
// ATTRIBUTE READER
// =============================================================================

/// Typed access to one annotation's arguments.
///
/// Every key that is looked up is marked as known; arguments never looked up
/// are reported as unknown by [`AttributeReader::finish`].
struct AttributeReader<'a> {
    annotation: &'a Annotation,
    location: SourceLocation,
    known: Vec<&'static str>,
    errors: Vec<ParseError>,
}

impl<'a> AttributeReader<'a> {
    fn new(annotation: &'a Annotation, location: SourceLocation) -> Self {
        Self {
            annotation,
            location,
            known: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// First present argument among `keys`
    fn take(&mut self, keys: &[&'static str]) -> Option<(&'static str, &'a AnnotationValue)> {
        self.known.extend_from_slice(keys);
        keys.iter()
            .find_map(|key| self.annotation.get(key).map(|value| (*key, value)))
    }

    fn wrong_type(&mut self, attribute: &str, expected: &'static str, found: &AnnotationValue) {
        self.errors.push(ParseError::WrongAttributeType {
            annotation: self.annotation.name.clone(),
            attribute: attribute.to_string(),
            expected,
            found: found.to_string(),
            location: self.location.clone(),
        });
    }

    fn required_str(&mut self, keys: &[&'static str]) -> Option<String> {
        if self.take(keys).is_none() {
            self.errors.push(ParseError::MissingAttribute {
                annotation: self.annotation.name.clone(),
                attribute: keys.first().copied().unwrap_or_default().to_string(),
                location: self.location.clone(),
            });
            return None;
        }
        self.optional_str(keys)
    }

    fn optional_str(&mut self, keys: &[&'static str]) -> Option<String> {
        match self.take(keys)? {
            (_, AnnotationValue::Str(s)) => Some(s.clone()),
            (key, other) => {
                self.wrong_type(key, "a string", other);
                None
            }
        }
    }

    fn bool(&mut self, keys: &[&'static str]) -> Option<bool> {
        match self.take(keys)? {
            (_, AnnotationValue::Bool(b)) => Some(*b),
            (key, other) => {
                self.wrong_type(key, "a boolean", other);
                None
            }
        }
    }

    /// A string or an array of strings
    fn str_list(&mut self, keys: &[&'static str]) -> Vec<String> {
        let Some((key, value)) = self.take(keys) else {
            return Vec::new();
        };
        let items = match value {
            AnnotationValue::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                AnnotationValue::Str(s) => out.push(s.clone()),
                other => self.wrong_type(key, "a string array", other),
            }
        }
        out
    }

    /// Platform constants (`Platform.BUKKIT`) or plain keys, as lowercase keys
    fn platforms(&mut self, keys: &[&'static str]) -> Vec<String> {
        let Some((key, value)) = self.take(keys) else {
            return Vec::new();
        };
        let items = match value {
            AnnotationValue::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        let mut out: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let platform = match item {
                AnnotationValue::Symbol(_) => item.symbol_name().map(str::to_lowercase),
                AnnotationValue::Str(s) => Some(s.trim().to_lowercase()),
                _ => None,
            };
            match platform {
                Some(platform) if !out.contains(&platform) => out.push(platform),
                Some(_) => {}
                None => self.wrong_type(key, "a platform array", item),
            }
        }
        out
    }

    /// Nested annotations named `expected`, alone or in an array
    fn annotations(&mut self, keys: &[&'static str], expected: &str) -> Vec<&'a Annotation> {
        let Some((key, value)) = self.take(keys) else {
            return Vec::new();
        };
        let items = match value {
            AnnotationValue::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                AnnotationValue::Annotation(nested) if nested.name == expected => out.push(nested),
                other => {
                    let expected = match expected {
                        DEPENDENCY => "an array of @Dependency",
                        COMMAND => "an array of @Command",
                        PERMISSION => "an array of @Permission",
                        _ => "an annotation array",
                    };
                    self.wrong_type(key, expected, other);
                }
            }
        }
        out
    }

    fn finish(mut self) -> Vec<ParseError> {
        for (key, _) in &self.annotation.arguments {
            if !self.known.contains(&key.as_str()) {
                self.errors.push(ParseError::UnknownAttribute {
                    annotation: self.annotation.name.clone(),
                    attribute: key.clone(),
                    location: self.location.clone(),
                });
            }
        }
        self.errors
    }
}

fn overlap(a: &DependencySpec, b: &DependencySpec) -> bool {
    a.platforms.is_empty() || b.platforms.is_empty() || a.platforms.iter().any(|p| b.platforms.contains(p))
}

fn shared_platforms(a: &DependencySpec, b: &DependencySpec) -> String {
    match (a.platforms.is_empty(), b.platforms.is_empty()) {
        (true, true) => "all".to_string(),
        (true, false) => b.platforms.join(", "),
        (false, true) => a.platforms.join(", "),
        (false, false) => a
            .platforms
            .iter()
            .filter(|p| b.platforms.contains(p))
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation_scanner::AnnotationScanner;
    use plugforge_manifest::types::RangeSyntax;
    use std::path::Path;

    const PLATFORMS: [&str; 4] = ["bukkit", "bungeecord", "sponge", "velocity"];

    fn parser() -> DescriptorParser {
        DescriptorParser::new(PLATFORMS)
    }

    fn scan(files: &[(&str, &str)]) -> Vec<AnnotatedType> {
        files
            .iter()
            .flat_map(|(path, content)| AnnotationScanner::scan_source(Path::new(path), content))
            .collect()
    }

    fn parse_errors(files: &[(&str, &str)]) -> Vec<DescriptorError> {
        match parser().parse(&scan(files)) {
            Ok(descriptor) => panic!("expected errors, got descriptor `{}`", descriptor.id),
            Err(errors) => errors,
        }
    }

    const DEMO: &str = r#"package com.example.demo;

@Plugin(
    id = "demo-plugin",
    name = "Demo",
    version = "1.2.0",
    authors = {"Ada"},
    dependencies = {
        @Dependency(name = "Vault", version = "[1.7,2.0)"),
        @Dependency(id = "luckperms", version = ">=5.4", soft = true, platforms = Platform.VELOCITY)
    },
    commands = {
        @Command(name = "demo", aliases = {"dm"}, permission = "demo.use", usage = "/demo")
    },
    permissions = @Permission(node = "demo.use", defaultGrant = PermissionDefault.OP)
)
public class DemoPlugin {
}
"#;

    const EXTRA: &str = r#"package com.example.demo.cmd;

@Command(name = "reload", description = "Reload the config")
@Permission(node = "demo.reload", default = "not-op")
public class ReloadCommand {}
"#;

    #[test]
    fn test_parse_full_descriptor() {
        let types = scan(&[("DemoPlugin.java", DEMO), ("ReloadCommand.java", EXTRA)]);
        let descriptor = match parser().parse(&types) {
            Ok(d) => d,
            Err(errors) => panic!("unexpected errors: {errors:?}"),
        };

        assert_eq!(descriptor.id, "demo-plugin");
        assert_eq!(descriptor.display_name(), "Demo");
        assert_eq!(descriptor.version, Version::new(1, 2, 0));
        assert_eq!(descriptor.entry_point.qualified_name, "com.example.demo.DemoPlugin");
        assert_eq!(descriptor.entry_point.package, "com.example.demo");
        assert_eq!(descriptor.authors.as_slice(), ["Ada".to_string()]);

        assert_eq!(descriptor.dependencies.len(), 2);
        assert!(descriptor.dependencies[0].required);
        assert_eq!(
            descriptor.dependencies[0].version_range.as_ref().map(|r| r.syntax),
            Some(RangeSyntax::Interval)
        );
        assert!(!descriptor.dependencies[1].required);
        assert_eq!(descriptor.dependencies[1].platforms.as_slice(), ["velocity".to_string()]);

        let commands: Vec<_> = descriptor.commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(commands, vec!["demo", "reload"]);
        assert_eq!(descriptor.permissions[0].default, PermissionDefault::Op);
        assert_eq!(descriptor.permissions[1].default, PermissionDefault::NotOp);
        assert!(descriptor.target_platforms.is_empty());
    }

    #[test]
    fn test_ambiguous_entry_point() {
        let other = "package com.example.other;\n@Plugin(id = \"other\", version = \"1.0.0\")\npublic class Other {}\n";
        let errors = parse_errors(&[("DemoPlugin.java", DEMO), ("Other.java", other)]);
        assert_eq!(errors.len(), 1);
        let DescriptorError::Parse(ParseError::AmbiguousEntryPoint { candidates }) = &errors[0] else {
            panic!("expected an ambiguity error, got {errors:?}");
        };
        let names: Vec<_> = candidates.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["com.example.demo.DemoPlugin", "com.example.other.Other"]);
    }

    #[test]
    fn test_missing_entry_point() {
        let errors = parse_errors(&[("ReloadCommand.java", EXTRA)]);
        assert_eq!(errors, vec![DescriptorError::Parse(ParseError::MissingEntryPoint)]);
    }

    #[test]
    fn test_abstract_entry_point_rejected() {
        let source = "@Plugin(id = \"demo\", version = \"1.0.0\")\npublic abstract class Demo {}\n";
        let errors = parse_errors(&[("Demo.java", source)]);
        assert!(matches!(
            &errors[..],
            [DescriptorError::Parse(ParseError::InvalidEntryPoint { reason, .. })] if reason.contains("abstract")
        ));
    }

    #[test]
    fn test_errors_are_collected() {
        let source = r#"
@Plugin(id = "Bad_Id", version = "1.0", colour = "red", commands = @Command(aliases = {"x"}))
public class Demo {}
"#;
        let errors = parse_errors(&[("Demo.java", source)]);
        assert!(errors.iter().any(|e| matches!(e, DescriptorError::Parse(ParseError::InvalidId { value, .. }) if value == "Bad_Id")));
        assert!(errors.iter().any(|e| matches!(e, DescriptorError::Parse(ParseError::InvalidVersion { value, .. }) if value == "1.0")));
        assert!(errors.iter().any(|e| matches!(e, DescriptorError::Parse(ParseError::UnknownAttribute { attribute, .. }) if attribute == "colour")));
        assert!(errors.iter().any(|e| matches!(e, DescriptorError::Parse(ParseError::MissingAttribute { annotation, attribute, .. }) if annotation == "Command" && attribute == "name")));
    }

    #[test]
    fn test_wrong_attribute_type() {
        let source = "@Plugin(id = \"demo\", version = 1)\npublic class Demo {}\n";
        let errors = parse_errors(&[("Demo.java", source)]);
        assert!(matches!(
            &errors[..],
            [DescriptorError::Parse(ParseError::WrongAttributeType { attribute, expected: "a string", .. })] if attribute == "version"
        ));
    }

    #[test]
    fn test_bad_version_range() {
        let source = "@Plugin(id = \"demo\", version = \"1.0.0\", dependencies = @Dependency(name = \"Vault\", version = \"[1.0,2.0\"))\nclass Demo {}\n";
        let errors = parse_errors(&[("Demo.java", source)]);
        assert!(matches!(
            &errors[..],
            [DescriptorError::Parse(ParseError::InvalidVersionRange { dependency, .. })] if dependency == "Vault"
        ));
    }

    #[test]
    fn test_duplicate_commands_and_alias_collisions() {
        let source = r#"
@Plugin(id = "demo", version = "1.0.0", commands = {
    @Command(name = "home", aliases = {"h"}),
    @Command(name = "Home"),
    @Command(name = "help", aliases = {"H", "help"})
})
class Demo {}
"#;
        let errors = parse_errors(&[("Demo.java", source)]);
        assert_eq!(
            errors,
            vec![
                DescriptorError::Validation(ValidationError::DuplicateCommand {
                    name: "Home".to_string()
                }),
                DescriptorError::Validation(ValidationError::AliasCollision {
                    alias: "H".to_string(),
                    command: "help".to_string(),
                    other: "home".to_string(),
                }),
            ]
        );
    }

    #[test]
    fn test_duplicate_permission_and_unknown_platforms() {
        let source = r#"
@Plugin(id = "demo", version = "1.0.0",
    platforms = {Platform.BUKKIT, Platform.QUILT},
    dependencies = @Dependency(name = "geyser", platforms = "nukkit"),
    permissions = {@Permission(node = "demo.a"), @Permission("DEMO.A")})
class Demo {}
"#;
        let errors = parse_errors(&[("Demo.java", source)]);
        assert_eq!(
            errors,
            vec![
                DescriptorError::Validation(ValidationError::DuplicatePermission {
                    node: "DEMO.A".to_string()
                }),
                DescriptorError::Validation(ValidationError::UnknownDependencyPlatform {
                    dependency: "geyser".to_string(),
                    platform: "nukkit".to_string(),
                }),
                DescriptorError::Validation(ValidationError::UnknownTargetPlatform {
                    platform: "quilt".to_string()
                }),
            ]
        );
    }

    #[test]
    fn test_duplicate_dependency_on_shared_platform() {
        let source = r#"
@Plugin(id = "demo", version = "1.0.0",
    dependencies = {
        @Dependency(name = "Vault", platforms = Platform.BUKKIT),
        @Dependency(name = "vault", soft = true),
        @Dependency(name = "spark", platforms = Platform.BUKKIT),
        @Dependency(name = "spark", platforms = Platform.SPONGE)
    })
class Demo {}
"#;
        let errors = parse_errors(&[("Demo.java", source)]);
        assert_eq!(
            errors,
            vec![DescriptorError::Validation(ValidationError::DuplicateDependency {
                id: "vault".to_string(),
                platforms: "bukkit".to_string(),
            })]
        );
    }

    #[test]
    fn test_bootstrap_and_generator_options() {
        let source = r#"package com.example;

@Plugin(id = "demo", version = "1.0.0")
@PluginGeneratorOptions(generatedClassName = "{name}Boot{platform}")
public class Demo {}
"#;
        let boot = "package com.example.boot;\n@Bootstrap\npublic class Early {}\n";
        let defaults = GeneratorOptions {
            class_name: "ignored".to_string(),
            package_name: "gen.{platform}".to_string(),
        };
        let result = parser()
            .with_generator_defaults(defaults)
            .parse(&scan(&[("Demo.java", source), ("Early.java", boot)]));
        let Ok(descriptor) = result else {
            panic!("descriptor should parse");
        };
        assert_eq!(descriptor.bootstrap.as_deref(), Some("com.example.boot.Early"));
        assert_eq!(descriptor.generator.class_name, "{name}Boot{platform}");
        assert_eq!(descriptor.generator.package_name, "gen.{platform}");

        let second = "@Bootstrap\nclass Late {}\n";
        let errors = parse_errors(&[("Demo.java", source), ("Early.java", boot), ("Late.java", second)]);
        assert!(matches!(
            &errors[..],
            [DescriptorError::Parse(ParseError::AmbiguousBootstrap { candidates })] if candidates.len() == 2
        ));
    }
}
