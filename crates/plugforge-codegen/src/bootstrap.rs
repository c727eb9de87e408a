//! Bootstrap class generation
//!
//! Every platform is rendered through the same skeleton. The platform's
//! entry-point contract supplies the superclass, injected fields, the native
//! lifecycle methods and the expressions used to build the unified plugin
//! context; the skeleton routes those methods into the user plugin's
//! `onLoad`/`onEnable`/`onDisable`.

use plugforge_config::Layout;
use plugforge_manifest::errors::{ConstraintError, ConstraintRule, ContractError, PlatformError};
use plugforge_manifest::naming;
use plugforge_manifest::platform::{LifecycleHook, MethodSpec, PlatformSpec};
use plugforge_manifest::registry::RuntimeSpec;
use plugforge_manifest::types::{ArtifactKind, GeneratedArtifact, PluginDescriptor};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

use crate::template::{render_str, TemplateVars};

pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

const SKELETON: &str = "\
// Generated by plugforge {{generator_version}} for platform '{{platform}}'. Do not edit.
{{package_block}}
{{class_annotations}}public final class {{class_name}}{{extends_clause}}{{implements_clause}} {

    private {{context_class}} context;
    private {{entry_point}} plugin;
{{fields}}
{{constructor}}{{methods}}    private void bootstrap() {
        if (this.plugin != null) {
            return;
        }
        this.context = {{context_class}}.builder(\"{{plugin_id}}\", \"{{plugin_version}}\", \"{{platform}}\")
{{context_calls}}                .build();
{{bootstrap_call}}        this.plugin = new {{entry_point}}(this.context);
    }
}
";

const INDENT: &str = "    ";

/// How a contract method is filled in
#[derive(Debug, Clone, Copy)]
enum MethodBody<'a> {
    Hook(LifecycleHook),
    Literal(&'a [String]),
}

#[derive(Debug)]
struct PlannedMethod<'a> {
    spec: &'a MethodSpec,
    signature: &'a str,
    body: MethodBody<'a>,
}

/// A contract that passed structural checks
#[derive(Debug)]
struct ContractPlan<'a> {
    methods: Vec<PlannedMethod<'a>>,
    logger: &'a str,
}

pub struct CodeEmitter<'a> {
    runtime: &'a RuntimeSpec,
    layout: Layout,
}

impl<'a> CodeEmitter<'a> {
    pub fn new(runtime: &'a RuntimeSpec, layout: Layout) -> Self {
        Self { runtime, layout }
    }

    /// Path of the generated unit relative to the output root
    pub fn output_path(&self, descriptor: &PluginDescriptor, platform: &PlatformSpec) -> PathBuf {
        let ext = platform.file_extension();
        let base = PathBuf::from(&platform.key);
        match self.layout {
            Layout::Flat => base.join(format!("{}_{}.{}", descriptor.id, platform.key, ext)),
            Layout::Package => {
                let package = descriptor.generated_package(platform);
                let mut path = base.join("src");
                if !package.is_empty() {
                    path = path.join(naming::package_path(&package));
                }
                path.join(format!(
                    "{}.{}",
                    descriptor.generated_class_name(platform),
                    ext
                ))
            }
        }
    }

    pub fn emit(
        &self,
        descriptor: &PluginDescriptor,
        platform: &PlatformSpec,
    ) -> Result<GeneratedArtifact, Vec<PlatformError>> {
        let plan = validate_contract(platform)
            .map_err(|errors| errors.into_iter().map(PlatformError::from).collect::<Vec<_>>())?;

        let class_name = descriptor.generated_class_name(platform);
        let package = descriptor.generated_package(platform);
        check_names(&platform.key, &class_name, &package)?;

        let vars = TemplateVars::new()
            .with("class_name", class_name.as_str())
            .with("package", package.as_str())
            .with("plugin_id", descriptor.id.as_str())
            .with("plugin_version", descriptor.version.to_string())
            .with("entry_point", descriptor.entry_point.qualified_name.as_str())
            .with("platform", platform.key.as_str());

        let mut renderer = Renderer {
            vars: &vars,
            platform: &platform.key,
            errors: Vec::new(),
        };
        let content = self.assemble(descriptor, platform, &plan, &class_name, &package, &mut renderer);
        if !renderer.errors.is_empty() {
            return Err(renderer.errors.into_iter().map(PlatformError::from).collect());
        }

        debug!(
            "Generated {} for '{}' ({} methods)",
            class_name,
            platform.key,
            plan.methods.len()
        );
        Ok(GeneratedArtifact {
            platform: platform.key.clone(),
            kind: ArtifactKind::Code,
            content,
            output_path: self.output_path(descriptor, platform),
        })
    }

    fn assemble(
        &self,
        descriptor: &PluginDescriptor,
        platform: &PlatformSpec,
        plan: &ContractPlan<'_>,
        class_name: &str,
        package: &str,
        renderer: &mut Renderer<'_>,
    ) -> String {
        let contract = &platform.entry_point;

        let package_block = if package.is_empty() {
            String::new()
        } else {
            format!("package {package};\n")
        };

        let class_annotations: String = renderer
            .lines("entry_point.class_annotations", &contract.class_annotations)
            .into_iter()
            .map(|a| format!("{a}\n"))
            .collect();

        let extends_clause = contract
            .extends
            .as_deref()
            .map(|e| format!(" extends {}", renderer.text("entry_point.extends", e)))
            .unwrap_or_default();
        let implements = renderer.lines("entry_point.implements", &contract.implements);
        let implements_clause = if implements.is_empty() {
            String::new()
        } else {
            format!(" implements {}", implements.join(", "))
        };

        let fields: String = renderer
            .lines("entry_point.fields", &contract.fields)
            .into_iter()
            .map(|f| format!("{INDENT}{f}\n"))
            .collect();

        let constructor = match &contract.constructor {
            Some(ctor) => {
                let mut out = String::new();
                for annotation in renderer.lines("entry_point.constructor.annotations", &ctor.annotations) {
                    out.push_str(&format!("{INDENT}{annotation}\n"));
                }
                let params = renderer.lines("entry_point.constructor.params", &ctor.params);
                out.push_str(&format!("{INDENT}public {class_name}({}) {{\n", params.join(", ")));
                for line in renderer.lines("entry_point.constructor.body", &ctor.body) {
                    out.push_str(&format!("{INDENT}{INDENT}{line}\n"));
                }
                out.push_str(&format!("{INDENT}}}\n\n"));
                out
            }
            None => String::new(),
        };

        let mut methods = String::new();
        for (index, method) in plan.methods.iter().enumerate() {
            let element = format!("entry_point.methods[{index}]");
            for annotation in renderer.lines(&format!("{element}.annotations"), &method.spec.annotations) {
                methods.push_str(&format!("{INDENT}{annotation}\n"));
            }
            let signature = renderer.text(&format!("{element}.signature"), method.signature);
            methods.push_str(&format!("{INDENT}{signature} {{\n"));
            let body = match method.body {
                MethodBody::Hook(hook) => {
                    let mut lines = renderer.lines(&format!("{element}.prelude"), &method.spec.prelude);
                    lines.extend(hook_body(hook));
                    lines
                }
                MethodBody::Literal(lines) => renderer.lines(&format!("{element}.body"), lines),
            };
            for line in body {
                methods.push_str(&format!("{INDENT}{INDENT}{line}\n"));
            }
            methods.push_str(&format!("{INDENT}}}\n\n"));
        }

        let context = &contract.context;
        let mut context_calls = String::new();
        let calls = [
            ("logger", Some(plan.logger)),
            ("scheduler", context.scheduler.as_deref()),
            ("dataDirectory", context.data_directory.as_deref()),
        ];
        for (setter, expression) in calls {
            if let Some(expression) = expression {
                let rendered = renderer.text(&format!("entry_point.context.{setter}"), expression);
                context_calls.push_str(&format!("{INDENT}{INDENT}{INDENT}{INDENT}.{setter}({rendered})\n"));
            }
        }

        let bootstrap_call = descriptor
            .bootstrap
            .as_deref()
            .map(|class| format!("{INDENT}{INDENT}new {class}().bootstrap(this.context);\n"))
            .unwrap_or_default();

        let skeleton_vars = renderer
            .vars
            .clone()
            .with("generator_version", GENERATOR_VERSION)
            .with("package_block", package_block)
            .with("class_annotations", class_annotations)
            .with("extends_clause", extends_clause)
            .with("implements_clause", implements_clause)
            .with("context_class", self.runtime.context_class.as_str())
            .with("fields", fields)
            .with("constructor", constructor)
            .with("methods", methods)
            .with("context_calls", context_calls)
            .with("bootstrap_call", bootstrap_call);

        match render_str(SKELETON, &skeleton_vars) {
            Ok(content) => content,
            Err(e) => {
                renderer
                    .errors
                    .push(ContractError::new(renderer.platform, "skeleton", e.to_string()));
                String::new()
            }
        }
    }
}

/// Renders contract strings, collecting template problems as contract errors
struct Renderer<'v> {
    vars: &'v TemplateVars,
    platform: &'v str,
    errors: Vec<ContractError>,
}

impl Renderer<'_> {
    fn text(&mut self, element: &str, source: &str) -> String {
        match render_str(source, self.vars) {
            Ok(rendered) => rendered,
            Err(e) => {
                self.errors
                    .push(ContractError::new(self.platform, element, e.to_string()));
                String::new()
            }
        }
    }

    fn lines(&mut self, element: &str, sources: &[String]) -> Vec<String> {
        sources
            .iter()
            .enumerate()
            .map(|(i, source)| self.text(&format!("{element}[{i}]"), source))
            .collect()
    }
}

fn hook_body(hook: LifecycleHook) -> Vec<String> {
    let call = format!("this.plugin.{}();", hook.plugin_method());
    match hook {
        LifecycleHook::Load | LifecycleHook::Enable => vec!["this.bootstrap();".to_string(), call],
        // The host may disable a plugin that never finished enabling
        LifecycleHook::Disable => vec![
            "if (this.plugin != null) {".to_string(),
            format!("{INDENT}{call}"),
            "}".to_string(),
        ],
    }
}

fn check_names(platform: &str, class_name: &str, package: &str) -> Result<(), Vec<PlatformError>> {
    let mut errors = Vec::new();
    if !naming::is_java_identifier(class_name) {
        errors.push(PlatformError::from(ConstraintError {
            platform: platform.to_string(),
            field: "class_name".to_string(),
            value: class_name.to_string(),
            rule: ConstraintRule::Pattern("a Java identifier".to_string()),
        }));
    }
    if !package.is_empty() && !naming::is_java_package(package) {
        errors.push(PlatformError::from(ConstraintError {
            platform: platform.to_string(),
            field: "package".to_string(),
            value: package.to_string(),
            rule: ConstraintRule::Pattern("a dotted Java package name".to_string()),
        }));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Structural checks on a platform's entry-point contract
fn validate_contract(platform: &PlatformSpec) -> Result<ContractPlan<'_>, Vec<ContractError>> {
    let key = platform.key.as_str();
    let contract = &platform.entry_point;
    let mut errors = Vec::new();
    let mut methods = Vec::new();
    let mut names = BTreeSet::new();
    let mut hooks: BTreeMap<LifecycleHook, usize> = BTreeMap::new();

    if contract.methods.is_empty() {
        errors.push(ContractError::new(key, "entry_point.methods", "no methods declared"));
    }

    for (index, spec) in contract.methods.iter().enumerate() {
        let element = format!("entry_point.methods[{index}]");
        let name = spec.name.as_deref().filter(|n| !n.trim().is_empty());
        let signature = spec.signature.as_deref().filter(|s| !s.trim().is_empty());

        let (Some(name), Some(signature)) = (name, signature) else {
            errors.push(ContractError::new(key, element, "needs both `name` and `signature`"));
            continue;
        };
        if !signature.contains(&format!("{name}(")) {
            errors.push(ContractError::new(
                key,
                format!("{element}.signature"),
                format!("does not declare method `{name}`"),
            ));
        }
        if !names.insert(name) {
            errors.push(ContractError::new(key, element.as_str(), format!("duplicate method `{name}`")));
        }

        let body = match (&spec.hook, &spec.body) {
            (Some(_), Some(_)) => {
                errors.push(ContractError::new(key, element, "has both `hook` and `body`"));
                continue;
            }
            (None, None) => {
                errors.push(ContractError::new(key, element, "needs a `hook` or a `body`"));
                continue;
            }
            (None, Some(lines)) => {
                if !spec.prelude.is_empty() {
                    errors.push(ContractError::new(
                        key,
                        format!("{element}.prelude"),
                        "only allowed on hook methods",
                    ));
                }
                MethodBody::Literal(lines)
            }
            (Some(raw), None) => match raw.parse::<LifecycleHook>() {
                Ok(hook) => {
                    *hooks.entry(hook).or_default() += 1;
                    MethodBody::Hook(hook)
                }
                Err(reason) => {
                    errors.push(ContractError::new(key, format!("{element}.hook"), reason));
                    continue;
                }
            },
        };

        methods.push(PlannedMethod {
            spec,
            signature,
            body,
        });
    }

    for hook in LifecycleHook::ALL {
        let count = hooks.get(&hook).copied().unwrap_or(0);
        let required = hook != LifecycleHook::Load;
        if count == 0 && required && !contract.methods.is_empty() {
            errors.push(ContractError::new(
                key,
                "entry_point.methods",
                format!("no method routes the `{hook}` hook"),
            ));
        }
        if count > 1 {
            errors.push(ContractError::new(
                key,
                "entry_point.methods",
                format!("`{hook}` hook is routed by {count} methods"),
            ));
        }
    }

    let logger = contract.context.logger.as_deref().filter(|l| !l.trim().is_empty());
    if logger.is_none() {
        errors.push(ContractError::new(key, "entry_point.context.logger", "missing"));
    }

    let ext = platform.file_extension();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(ContractError::new(
            key,
            "entry_point.file_extension",
            format!("`{ext}` is not a file extension"),
        ));
    }

    match logger {
        Some(logger) if errors.is_empty() => Ok(ContractPlan { methods, logger }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugforge_manifest::platform::ContextSpec;
    use plugforge_manifest::registry::PlatformRegistry;
    use plugforge_manifest::semver::Version;
    use plugforge_manifest::types::EntryPoint;
    use std::path::Path;

    fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new(
            "demo",
            Version::new(1, 2, 3),
            EntryPoint::from_qualified("com.example.demo.Demo"),
        )
    }

    fn registry() -> PlatformRegistry {
        PlatformRegistry::builtin().unwrap_or_else(|_| PlatformRegistry::empty())
    }

    fn hook_method(name: &str, hook: &str) -> MethodSpec {
        MethodSpec {
            name: Some(name.to_string()),
            signature: Some(format!("public void {name}()")),
            hook: Some(hook.to_string()),
            ..MethodSpec::default()
        }
    }

    fn minimal_platform() -> PlatformSpec {
        let mut spec = PlatformSpec::named("host");
        spec.entry_point.methods = vec![hook_method("start", "enable"), hook_method("stop", "disable")];
        spec.entry_point.context = ContextSpec {
            logger: Some("java.util.logging.Logger.getLogger(\"{{plugin_id}}\")".to_string()),
            scheduler: None,
            data_directory: None,
        };
        spec
    }

    fn contract_elements(errors: &[PlatformError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                PlatformError::Contract(c) => Some(c.element.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_bukkit_bootstrap() {
        let registry = registry();
        let Some(bukkit) = registry.lookup("bukkit") else {
            panic!("bukkit is built in");
        };
        let emitter = CodeEmitter::new(registry.runtime(), Layout::Flat);
        let Ok(artifact) = emitter.emit(&descriptor(), bukkit) else {
            panic!("bukkit emission should succeed");
        };

        let code = &artifact.content;
        assert!(code.starts_with("// Generated by plugforge"));
        assert!(code.contains("package com.example.demo.platform.bukkit;"));
        assert!(code.contains(
            "public final class DemoBukkit extends org.bukkit.plugin.java.JavaPlugin {"
        ));
        assert!(code.contains("    @Override\n    public void onEnable() {\n        this.bootstrap();\n        this.plugin.onEnable();\n    }"));
        assert!(code.contains("if (this.plugin != null) {\n            this.plugin.onDisable();"));
        assert!(code.contains(".builder(\"demo\", \"1.2.3\", \"bukkit\")"));
        assert!(code.contains(".logger(this.getLogger())"));
        assert!(code.contains("this.plugin = new com.example.demo.Demo(this.context);"));
        assert_eq!(artifact.output_path, Path::new("bukkit").join("demo_bukkit.java"));
        assert_eq!(artifact.kind, ArtifactKind::Code);
    }

    #[test]
    fn test_velocity_constructor_injection() {
        let registry = registry();
        let Some(velocity) = registry.lookup("velocity") else {
            panic!("velocity is built in");
        };
        let emitter = CodeEmitter::new(registry.runtime(), Layout::Flat);
        let Ok(artifact) = emitter.emit(&descriptor(), velocity) else {
            panic!("velocity emission should succeed");
        };
        let code = &artifact.content;
        assert!(code.contains("    @com.google.inject.Inject\n    public DemoVelocity("));
        assert!(code.contains("this.dataDirectory = dataDirectory;"));
        assert!(code.contains("@com.velocitypowered.api.event.Subscribe"));
        assert!(!code.contains(" extends "));
    }

    #[test]
    fn test_sponge_class_annotation_uses_plugin_id() {
        let registry = registry();
        let Some(sponge) = registry.lookup("sponge") else {
            panic!("sponge is built in");
        };
        let emitter = CodeEmitter::new(registry.runtime(), Layout::Flat);
        let result = emitter.emit(&descriptor(), sponge);
        assert!(result.is_ok_and(|a| a
            .content
            .contains("@org.spongepowered.plugin.builtin.jvm.Plugin(\"demo\")\npublic final class DemoSponge")));
    }

    #[test]
    fn test_package_layout_path() {
        let runtime = RuntimeSpec::default();
        let emitter = CodeEmitter::new(&runtime, Layout::Package);
        let path = emitter.output_path(&descriptor(), &minimal_platform());
        assert_eq!(
            path,
            Path::new("host/src/com/example/demo/platform/host/DemoHost.java")
        );
    }

    #[test]
    fn test_bootstrap_class_is_invoked() {
        let runtime = RuntimeSpec::default();
        let emitter = CodeEmitter::new(&runtime, Layout::Flat);
        let mut desc = descriptor();
        desc.bootstrap = Some("com.example.demo.DemoBootstrap".to_string());
        let result = emitter.emit(&desc, &minimal_platform());
        assert!(result.is_ok_and(|a| a
            .content
            .contains("new com.example.demo.DemoBootstrap().bootstrap(this.context);")));
    }

    #[test]
    fn test_missing_enable_hook() {
        let runtime = RuntimeSpec::default();
        let emitter = CodeEmitter::new(&runtime, Layout::Flat);
        let mut spec = minimal_platform();
        spec.entry_point.methods.remove(0);

        let Err(errors) = emitter.emit(&descriptor(), &spec) else {
            panic!("contract without enable should fail");
        };
        assert_eq!(contract_elements(&errors), vec!["entry_point.methods"]);
        assert!(errors[0].to_string().contains("enable"));
    }

    #[test]
    fn test_contract_errors_collected() {
        let runtime = RuntimeSpec::default();
        let emitter = CodeEmitter::new(&runtime, Layout::Flat);
        let mut spec = minimal_platform();
        spec.entry_point.context.logger = None;
        spec.entry_point.methods.push(MethodSpec {
            name: Some("tick".to_string()),
            signature: Some("public void update()".to_string()),
            body: Some(vec!["return;".to_string()]),
            ..MethodSpec::default()
        });
        spec.entry_point.methods.push(hook_method("start", "enable"));

        let Err(errors) = emitter.emit(&descriptor(), &spec) else {
            panic!("broken contract should fail");
        };
        let elements = contract_elements(&errors);
        assert!(elements.contains(&"entry_point.methods[2].signature".to_string()));
        assert!(elements.contains(&"entry_point.methods[3]".to_string()));
        assert!(elements.contains(&"entry_point.context.logger".to_string()));
        assert!(elements.contains(&"entry_point.methods".to_string()));
    }

    #[test]
    fn test_unknown_placeholder_is_contract_error() {
        let runtime = RuntimeSpec::default();
        let emitter = CodeEmitter::new(&runtime, Layout::Flat);
        let mut spec = minimal_platform();
        spec.entry_point.fields = vec!["private int {{counter}};".to_string()];
        let Err(errors) = emitter.emit(&descriptor(), &spec) else {
            panic!("unknown placeholder should fail");
        };
        assert_eq!(contract_elements(&errors), vec!["entry_point.fields[0]"]);
    }

    #[test]
    fn test_invalid_generated_class_name() {
        let runtime = RuntimeSpec::default();
        let emitter = CodeEmitter::new(&runtime, Layout::Flat);
        let mut desc = descriptor();
        desc.generator.class_name = "{name}-{platform}".to_string();
        let Err(errors) = emitter.emit(&desc, &minimal_platform()) else {
            panic!("invalid class name should fail");
        };
        assert!(matches!(
            &errors[0],
            PlatformError::Constraint(c) if c.field == "class_name" && c.value == "Demo-Host"
        ));
    }

    #[test]
    fn test_output_is_deterministic() {
        let registry = registry();
        let emitter = CodeEmitter::new(registry.runtime(), Layout::Flat);
        for spec in registry.list() {
            let first = emitter.emit(&descriptor(), spec).map(|a| a.content);
            let second = emitter.emit(&descriptor(), spec).map(|a| a.content);
            assert!(first.is_ok(), "{} should emit", spec.key);
            assert_eq!(first.ok(), second.ok());
        }
    }
}
