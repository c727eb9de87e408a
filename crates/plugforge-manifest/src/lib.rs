//! Plugforge descriptor model and manifest emission
//!
//! This crate holds everything the per-platform emitters share: the plugin
//! descriptor, the error taxonomy, the platform registry (loaded from TOML),
//! the manifest emitter and the atomic artifact writer.

pub mod errors;
pub mod manifest;
pub mod manifest_writer;
pub mod naming;
pub mod platform;
pub mod registry;
pub mod types;
pub mod value;

pub use errors::{
    ArtifactIoError, ConstraintError, ConstraintRule, ContractError, DescriptorError,
    ParseError, PlatformError, RegistryError, ScanError, SourceLocation, ValidationError,
};
pub use manifest::{EmittedManifest, ManifestEmitter};
pub use manifest_writer::{OutputDir, WriteSummary};
pub use platform::{LifecycleHook, ManifestFormat, PlatformSpec};
pub use registry::{PlatformRegistry, RuntimeSpec};
pub use types::{
    ArtifactKind, CommandSpec, DependencySpec, EntryPoint, GeneratedArtifact, GeneratorOptions,
    PermissionDefault, PermissionSpec, PluginDescriptor, VersionRange,
};
pub use value::{ManifestTable, ManifestValue};

// Re-exported so downstream crates agree on the version type
pub use semver;
