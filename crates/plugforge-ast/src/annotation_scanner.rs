use ast_grep_core::{AstGrep, Doc, Node};
use ast_grep_language::Java;
use plugforge_manifest::errors::ScanError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::annotations::{decode_annotation, line_of, AnnotatedType, TypeKind};

/// Scanner for annotated type declarations in a Java source tree
pub struct AnnotationScanner {
    /// Source root; reported paths are relative to it
    source_root: PathBuf,
}

impl AnnotationScanner {
    pub fn new(source_root: PathBuf) -> Self {
        debug!("Initializing annotation scanner for: {:?}", source_root);
        AnnotationScanner { source_root }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Scan every `.java` file under the root, in sorted path order
    pub fn scan(&self) -> Result<Vec<AnnotatedType>, ScanError> {
        if !self.source_root.is_dir() {
            return Err(ScanError::MissingRoot(self.source_root.clone()));
        }

        let mut types = Vec::new();
        let mut files_scanned = 0;

        let walker = WalkDir::new(&self.source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| ScanError::Walk {
                path: e
                    .path()
                    .map_or_else(|| self.source_root.clone(), Path::to_path_buf),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|s| s.to_str()) != Some("java") {
                continue;
            }

            files_scanned += 1;
            let content = fs::read_to_string(path).map_err(|source| ScanError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let relative = path.strip_prefix(&self.source_root).unwrap_or(path);
            let mut found = Self::scan_source(relative, &content);
            debug!("Scanned {:?}: {} annotated type(s)", relative, found.len());
            types.append(&mut found);
        }

        info!(
            "Scanned {} Java files, found {} annotated types",
            files_scanned,
            types.len()
        );
        Ok(types)
    }

    /// Collect annotated type declarations from one compilation unit
    pub fn scan_source(source_file: &Path, content: &str) -> Vec<AnnotatedType> {
        let sg = AstGrep::new(content, Java);
        let root = sg.root();

        let package = root
            .children()
            .find(|child| child.kind() == "package_declaration")
            .and_then(|decl| {
                decl.children()
                    .find(|c| c.kind() == "scoped_identifier" || c.kind() == "identifier")
                    .map(|name| name.text().to_string())
            })
            .unwrap_or_default();

        let mut visitor = TypeVisitor {
            source_file,
            content,
            enclosing: Vec::new(),
            found: Vec::new(),
        };
        if package.is_empty() {
            visitor.visit(&root);
        } else {
            visitor.enclosing.push(package);
            visitor.visit(&root);
        }
        visitor.found
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

struct TypeVisitor<'s> {
    source_file: &'s Path,
    content: &'s str,
    /// Package and enclosing type names
    enclosing: Vec<String>,
    found: Vec<AnnotatedType>,
}

impl TypeVisitor<'_> {
    fn visit<D: Doc>(&mut self, node: &Node<'_, D>) {
        for child in node.children() {
            match TypeKind::from_node_kind(&child.kind()) {
                Some(kind) => self.visit_type(&child, kind),
                None => self.visit(&child),
            }
        }
    }

    fn visit_type<D: Doc>(&mut self, node: &Node<'_, D>, kind: TypeKind) {
        let Some(name) = node.field("name").map(|n| n.text().to_string()) else {
            return;
        };

        let mut annotations = Vec::new();
        let mut is_abstract = false;
        if let Some(modifiers) = node.children().find(|c| c.kind() == "modifiers") {
            for modifier in modifiers.children() {
                match &*modifier.kind() {
                    "annotation" | "marker_annotation" => {
                        annotations.extend(decode_annotation(&modifier, self.content));
                    }
                    "abstract" => is_abstract = true,
                    _ => {}
                }
            }
        }

        let qualified_name = self
            .enclosing
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name.as_str()))
            .collect::<Vec<_>>()
            .join(".");

        if !annotations.is_empty() {
            self.found.push(AnnotatedType {
                qualified_name,
                kind,
                is_abstract: is_abstract || kind == TypeKind::Interface,
                source_file: self.source_file.to_path_buf(),
                line: line_of(self.content, node.range().start),
                annotations,
            });
        }

        if let Some(body) = node.field("body") {
            self.enclosing.push(name);
            self.visit(&body);
            self.enclosing.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::AnnotationValue;
    use tempfile::TempDir;

    const DEMO: &str = r#"package com.example.demo;

import dev.plugforge.annotations.*;

@Plugin(
    id = "demo",
    name = "Demo",
    version = "1.0.0",
    authors = {"Ada", "Linus"},
    dependencies = {
        @Dependency(name = "Vault", version = "[1.7,2.0)"),
        @Dependency(name = "LuckPerms", soft = true, platforms = {Platform.VELOCITY})
    },
    commands = @Command(name = "greet", aliases = {"hi"}, description = "Say " + "hello")
)
public final class Demo {
    public Demo(PluginContext context) {}

    @Command(name = "inner")
    public static class Nested {}
}
"#;

    #[test]
    fn test_scan_source_decodes_plugin() {
        let types = AnnotationScanner::scan_source(Path::new("Demo.java"), DEMO);
        assert_eq!(types.len(), 2);

        let demo = &types[0];
        assert_eq!(demo.qualified_name, "com.example.demo.Demo");
        assert_eq!(demo.kind, TypeKind::Class);
        assert!(!demo.is_abstract);
        assert_eq!(demo.line, 5);

        let Some(plugin) = demo.annotations_named("Plugin").next() else {
            panic!("@Plugin should be decoded");
        };
        assert_eq!(plugin.get("id"), Some(&AnnotationValue::Str("demo".to_string())));
        assert_eq!(
            plugin.get("authors"),
            Some(&AnnotationValue::Array(vec![
                AnnotationValue::Str("Ada".to_string()),
                AnnotationValue::Str("Linus".to_string()),
            ]))
        );

        let Some(AnnotationValue::Array(deps)) = plugin.get("dependencies") else {
            panic!("dependencies should be an array");
        };
        assert_eq!(deps.len(), 2);
        let AnnotationValue::Annotation(soft) = &deps[1] else {
            panic!("dependency entries are annotations");
        };
        assert_eq!(soft.get("soft"), Some(&AnnotationValue::Bool(true)));
        assert_eq!(
            soft.get("platforms"),
            Some(&AnnotationValue::Array(vec![AnnotationValue::Symbol(
                "Platform.VELOCITY".to_string()
            )]))
        );

        let Some(AnnotationValue::Annotation(command)) = plugin.get("commands") else {
            panic!("single command should decode as an annotation");
        };
        assert_eq!(
            command.get("description"),
            Some(&AnnotationValue::Str("Say hello".to_string()))
        );

        assert_eq!(types[1].qualified_name, "com.example.demo.Demo.Nested");
    }

    #[test]
    fn test_abstract_and_interface_flags() {
        let source = r#"
@Plugin(id = "a", version = "1.0.0")
public abstract class Base {}

@Bootstrap
interface Hooks {}

class Plain {}
"#;
        let types = AnnotationScanner::scan_source(Path::new("Base.java"), source);
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].qualified_name, "Base");
        assert!(types[0].is_abstract);
        assert_eq!(types[1].kind, TypeKind::Interface);
        assert!(types[1].is_abstract);
        assert!(types[1].has_annotation("Bootstrap"));
    }

    #[test]
    fn test_scan_walks_sorted_and_skips_hidden() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path();
        let pkg = root.join("com/example");
        assert!(fs::create_dir_all(&pkg).is_ok());
        assert!(fs::create_dir_all(root.join(".cache")).is_ok());
        assert!(fs::write(pkg.join("B.java"), "package com.example;\n@Command(name = \"b\")\nclass B {}\n").is_ok());
        assert!(fs::write(pkg.join("A.java"), "package com.example;\n@Command(name = \"a\")\nclass A {}\n").is_ok());
        assert!(fs::write(root.join(".cache/C.java"), "@Command(name = \"c\")\nclass C {}\n").is_ok());
        assert!(fs::write(pkg.join("notes.txt"), "@Command").is_ok());

        let result = AnnotationScanner::new(root.to_path_buf()).scan();
        let Ok(types) = result else {
            panic!("scan should succeed");
        };
        let names: Vec<_> = types.iter().map(|t| t.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["com.example.A", "com.example.B"]);
        assert_eq!(types[0].source_file, Path::new("com/example/A.java"));
    }

    #[test]
    fn test_missing_root() {
        let scanner = AnnotationScanner::new(PathBuf::from("/tmp/plugforge_no_such_root_12345"));
        assert!(matches!(scanner.scan(), Err(ScanError::MissingRoot(_))));
    }
}
