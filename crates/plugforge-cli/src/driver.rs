//! Compilation driver
//!
//! One compilation moves through `Parsed -> Validated -> PerPlatformEmission
//! -> Aggregated`. Any descriptor problem stops it before a platform is
//! touched. After that, every requested platform runs as an independent unit
//! on the rayon pool; a unit only reads the descriptor and the registry and
//! returns its own outcome, so one failing platform never affects another.

use plugforge_ast::{AnnotatedType, AnnotationScanner, DescriptorParser};
use plugforge_codegen::CodeEmitter;
use plugforge_config::Layout;
use plugforge_manifest::errors::{DescriptorError, PlatformError};
use plugforge_manifest::{
    GeneratedArtifact, GeneratorOptions, ManifestEmitter, OutputDir, PlatformRegistry,
    PluginDescriptor, WriteSummary,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::CliError;
use crate::report::{CompilationReport, PlatformOutcome};

/// How successful platforms are written when others fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionMode {
    /// Write every platform that succeeded
    #[default]
    Partial,
    /// Write nothing unless every platform succeeded
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsed,
    Validated,
    PerPlatformEmission,
    Aggregated,
}

/// Shared cancellation flag, checked before each platform unit starts
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    /// Platforms selected on the command line
    pub cli_platforms: Vec<String>,
    /// Platforms selected in `plugforge.toml`
    pub config_platforms: Vec<String>,
    pub layout: Layout,
    pub mode: EmissionMode,
    pub dry_run: bool,
    /// Formats used where `@PluginGeneratorOptions` sets none
    pub generator: GeneratorOptions,
}

impl CompileOptions {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            cli_platforms: Vec::new(),
            config_platforms: Vec::new(),
            layout: Layout::default(),
            mode: EmissionMode::default(),
            dry_run: false,
            generator: GeneratorOptions::default(),
        }
    }
}

/// Result of one platform unit
struct Unit {
    outcome: PlatformOutcome,
    /// Emitted artifacts not yet committed
    staged: Vec<GeneratedArtifact>,
    writes: WriteSummary,
}

impl Unit {
    fn failed(errors: Vec<PlatformError>) -> Self {
        Self {
            outcome: PlatformOutcome::Failure { errors },
            staged: Vec::new(),
            writes: WriteSummary::default(),
        }
    }

    fn cancelled() -> Self {
        Self {
            outcome: PlatformOutcome::Cancelled,
            staged: Vec::new(),
            writes: WriteSummary::default(),
        }
    }
}

pub struct CompilationDriver<'r> {
    registry: &'r PlatformRegistry,
    options: CompileOptions,
    cancel: CancellationToken,
    stage: Option<Stage>,
}

impl<'r> CompilationDriver<'r> {
    pub fn new(registry: &'r PlatformRegistry, options: CompileOptions) -> Self {
        Self {
            registry,
            options,
            cancel: CancellationToken::new(),
            stage: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Last stage reached
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Scan the source root, then parse and compile
    pub fn run(&mut self) -> Result<CompilationReport, CliError> {
        let types = AnnotationScanner::new(self.options.source_root.clone()).scan()?;
        let descriptor = self.parse(&types)?;
        self.compile(&descriptor)
    }

    /// Build and validate the descriptor; every problem is returned at once
    pub fn parse(&mut self, types: &[AnnotatedType]) -> Result<PluginDescriptor, CliError> {
        let parser = DescriptorParser::new(self.registry.keys())
            .with_generator_defaults(self.options.generator.clone());

        let descriptor = parser.extract(types).map_err(|errors| {
            CliError::Descriptor(errors.into_iter().map(DescriptorError::from).collect())
        })?;
        self.stage = Some(Stage::Parsed);

        let violations = parser.validate(&descriptor);
        if !violations.is_empty() {
            return Err(CliError::Descriptor(
                violations.into_iter().map(DescriptorError::from).collect(),
            ));
        }
        self.stage = Some(Stage::Validated);
        Ok(descriptor)
    }

    /// Command line, then config, then descriptor, then every registered platform
    pub fn requested_platforms(&self, descriptor: &PluginDescriptor) -> Vec<String> {
        let selection = [
            &self.options.cli_platforms,
            &self.options.config_platforms,
            &descriptor.target_platforms,
        ]
        .into_iter()
        .find(|selection| !selection.is_empty());

        let keys: BTreeSet<String> = match selection {
            Some(selection) => selection
                .iter()
                .map(|key| key.trim().to_lowercase())
                .filter(|key| !key.is_empty())
                .collect(),
            None => self.registry.keys().map(str::to_string).collect(),
        };
        keys.into_iter().collect()
    }

    /// Emit every requested platform for a validated descriptor
    pub fn compile(&mut self, descriptor: &PluginDescriptor) -> Result<CompilationReport, CliError> {
        let requested = self.requested_platforms(descriptor);
        info!(
            "Compiling `{}` {} for {} platform(s): {}",
            descriptor.id,
            descriptor.version,
            requested.len(),
            requested.join(", ")
        );

        let output = if self.options.dry_run {
            None
        } else {
            Some(OutputDir::acquire(&self.options.output_root)?)
        };
        let commit_in_unit = match self.options.mode {
            EmissionMode::Partial => output.as_ref(),
            EmissionMode::Strict => None,
        };

        self.stage = Some(Stage::PerPlatformEmission);
        let this = &*self;
        let mut units: BTreeMap<String, Unit> = requested
            .par_iter()
            .map(|key| (key.clone(), this.run_unit(descriptor, key, commit_in_unit)))
            .collect();

        if self.options.mode == EmissionMode::Strict {
            match &output {
                Some(output) if units.values().all(|u| u.outcome.is_success()) => {
                    commit_staged(&mut units, output);
                }
                Some(_) => {
                    warn!("Strict mode: not writing any platform because at least one failed");
                }
                None => {}
            }
        }
        drop(output);

        self.stage = Some(Stage::Aggregated);
        Ok(self.aggregate(descriptor, units))
    }

    fn run_unit(
        &self,
        descriptor: &PluginDescriptor,
        key: &str,
        output: Option<&OutputDir>,
    ) -> Unit {
        if self.cancel.is_cancelled() {
            debug!("Skipping '{}': compilation cancelled", key);
            return Unit::cancelled();
        }
        let Some(platform) = self.registry.lookup(key) else {
            return Unit::failed(vec![PlatformError::UnknownPlatform(key.to_string())]);
        };

        let code = CodeEmitter::new(self.registry.runtime(), self.options.layout).emit(descriptor, platform);
        let manifest = ManifestEmitter::emit(descriptor, platform);
        let (code, manifest) = match (code, manifest) {
            (Ok(code), Ok(manifest)) => (code, manifest),
            (code, manifest) => {
                let errors: Vec<PlatformError> = code
                    .err()
                    .into_iter()
                    .flatten()
                    .chain(manifest.err().into_iter().flatten())
                    .collect();
                debug!("Platform '{}' failed with {} error(s)", key, errors.len());
                return Unit::failed(errors);
            }
        };

        let mut writes = WriteSummary::default();
        let mut staged = Vec::new();
        match output {
            Some(output) => match output.commit(&[&code, &manifest.artifact]) {
                Ok(summary) => writes = summary,
                Err(source) => {
                    return Unit::failed(vec![PlatformError::Io {
                        platform: key.to_string(),
                        source,
                    }]);
                }
            },
            None => {
                staged.push(code.clone());
                staged.push(manifest.artifact.clone());
            }
        }

        Unit {
            outcome: PlatformOutcome::Success {
                code: code.output_path,
                manifest: manifest.artifact.output_path,
                warnings: manifest.warnings,
            },
            staged,
            writes,
        }
    }

    fn aggregate(&self, descriptor: &PluginDescriptor, units: BTreeMap<String, Unit>) -> CompilationReport {
        let mut report = CompilationReport {
            plugin_id: descriptor.id.clone(),
            plugin_version: descriptor.version.to_string(),
            output_root: self.options.output_root.clone(),
            mode: self.options.mode,
            dry_run: self.options.dry_run,
            outcomes: BTreeMap::new(),
            written: Vec::new(),
            unchanged: Vec::new(),
        };
        for (key, unit) in units {
            report.written.extend(unit.writes.written);
            report.unchanged.extend(unit.writes.unchanged);
            report.outcomes.insert(key, unit.outcome);
        }
        info!(
            "Compilation finished: {} succeeded, {} failed",
            report.outcomes.len() - report.failure_count(),
            report.failure_count()
        );
        report
    }
}

/// Write every staged pair; a platform whose write fails turns into a failure
fn commit_staged(units: &mut BTreeMap<String, Unit>, output: &OutputDir) {
    for (key, unit) in units.iter_mut() {
        let staged: Vec<&GeneratedArtifact> = unit.staged.iter().collect();
        match output.commit(&staged) {
            Ok(summary) => unit.writes = summary,
            Err(source) => {
                unit.outcome = PlatformOutcome::Failure {
                    errors: vec![PlatformError::Io {
                        platform: key.clone(),
                        source,
                    }],
                };
            }
        }
        unit.staged.clear();
    }
}
