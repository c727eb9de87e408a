//! Annotation-based descriptor discovery using ast-grep
//!
//! Discovery runs in two phases:
//! 1. The scanner parses every Java file under the source root with ast-grep
//!    and records the annotated type declarations (I/O, may fail with a
//!    [`ScanError`]).
//! 2. The descriptor parser turns those types into one validated
//!    [`PluginDescriptor`] (pure, collects every [`DescriptorError`]).
pub mod annotation_scanner;
pub mod annotations;
pub mod descriptor_parser;

pub use annotation_scanner::AnnotationScanner;
pub use annotations::{AnnotatedType, Annotation, AnnotationValue, TypeKind};
pub use descriptor_parser::DescriptorParser;

use plugforge_manifest::errors::{DescriptorError, ScanError};
use plugforge_manifest::types::PluginDescriptor;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("descriptor has {} error(s)", .0.len())]
    Descriptor(Vec<DescriptorError>),
}

/// Scan-then-parse orchestrator
pub struct DescriptorDiscovery;

impl DescriptorDiscovery {
    /// Discover the plugin descriptor declared under `source_root`
    pub fn discover(
        source_root: &Path,
        parser: &DescriptorParser,
    ) -> Result<PluginDescriptor, DiscoveryError> {
        let start_time = std::time::Instant::now();
        let types = AnnotationScanner::new(source_root.to_path_buf()).scan()?;
        let descriptor = parser.parse(&types).map_err(DiscoveryError::Descriptor)?;
        info!(
            "Discovered plugin `{}` {} in {:.2?}",
            descriptor.id,
            descriptor.version,
            start_time.elapsed()
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_from_tree() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let pkg = temp_dir.path().join("src/main/java/com/example");
        assert!(fs::create_dir_all(&pkg).is_ok());
        assert!(fs::write(
            pkg.join("Demo.java"),
            "package com.example;\n\n@Plugin(id = \"demo\", version = \"0.3.1\")\npublic class Demo {}\n",
        )
        .is_ok());

        let parser = DescriptorParser::new(["bukkit"]);
        let Ok(descriptor) = DescriptorDiscovery::discover(temp_dir.path(), &parser) else {
            panic!("discovery should succeed");
        };
        assert_eq!(descriptor.entry_point.qualified_name, "com.example.Demo");
    }

    #[test]
    fn test_discover_reports_descriptor_errors() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let parser = DescriptorParser::new(["bukkit"]);
        let result = DescriptorDiscovery::discover(temp_dir.path(), &parser);
        assert!(matches!(result, Err(DiscoveryError::Descriptor(errors)) if errors.len() == 1));
    }
}
