//! Compilation report and exit-code policy
//!
//! The report is keyed by platform, so its content does not depend on the
//! order in which platform units finished.

use plugforge_manifest::errors::PlatformError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::driver::EmissionMode;

pub const EXIT_SUCCESS: i32 = 0;
/// Failed-platform counts above this are clamped
pub const MAX_FAILURE_EXIT: i32 = 99;
pub const EXIT_DESCRIPTOR_ERROR: i32 = 100;
pub const EXIT_SETUP_ERROR: i32 = 101;

#[derive(Debug)]
pub enum PlatformOutcome {
    /// Paths are relative to the output root
    Success {
        code: PathBuf,
        manifest: PathBuf,
        warnings: Vec<String>,
    },
    Failure {
        errors: Vec<PlatformError>,
    },
    /// Not started before cancellation was requested
    Cancelled,
}

impl PlatformOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PlatformOutcome::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            PlatformOutcome::Success { .. } => "success",
            PlatformOutcome::Failure { .. } => "failure",
            PlatformOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
pub struct CompilationReport {
    pub plugin_id: String,
    pub plugin_version: String,
    pub output_root: PathBuf,
    pub mode: EmissionMode,
    pub dry_run: bool,
    /// One entry per requested platform, in registry order
    pub outcomes: BTreeMap<String, PlatformOutcome>,
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

impl CompilationReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(PlatformOutcome::is_success)
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.values().filter(|o| !o.is_success()).count()
    }

    /// Bit `i` is set when the `i`-th requested platform did not succeed.
    /// Platforms past the 64th are not represented.
    pub fn failure_mask(&self) -> u64 {
        self.outcomes
            .values()
            .enumerate()
            .filter(|(index, outcome)| *index < 64 && !outcome.is_success())
            .fold(0, |mask, (index, _)| mask | (1 << index))
    }

    pub fn exit_code(&self) -> i32 {
        let failed = i32::try_from(self.failure_count()).unwrap_or(MAX_FAILURE_EXIT);
        failed.min(MAX_FAILURE_EXIT)
    }

    /// Whether artifacts reached the output root for every successful platform
    pub fn committed(&self) -> bool {
        !self.dry_run && (self.mode == EmissionMode::Partial || self.is_success())
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            generated_at: chrono::Local::now().to_rfc3339(),
            plugin: PluginSummary {
                id: self.plugin_id.clone(),
                version: self.plugin_version.clone(),
            },
            output: self.output_root.clone(),
            mode: self.mode,
            dry_run: self.dry_run,
            committed: self.committed(),
            success: self.is_success(),
            failed: self.failure_count(),
            failure_mask: self.failure_mask(),
            written: self.written.len(),
            unchanged: self.unchanged.len(),
            platforms: self
                .outcomes
                .iter()
                .map(|(key, outcome)| self.platform_summary(key, outcome))
                .collect(),
        }
    }

    fn platform_summary(&self, key: &str, outcome: &PlatformOutcome) -> PlatformSummary {
        let mut summary = PlatformSummary {
            platform: key.to_string(),
            status: outcome.status(),
            code: None,
            manifest: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        };
        match outcome {
            PlatformOutcome::Success {
                code,
                manifest,
                warnings,
            } => {
                summary.code = Some(self.output_root.join(code));
                summary.manifest = Some(self.output_root.join(manifest));
                summary.warnings.clone_from(warnings);
            }
            PlatformOutcome::Failure { errors } => {
                summary.errors = errors
                    .iter()
                    .map(|e| ErrorSummary {
                        kind: e.kind(),
                        message: e.to_string(),
                    })
                    .collect();
            }
            PlatformOutcome::Cancelled => {}
        }
        summary
    }
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub generated_at: String,
    pub plugin: PluginSummary,
    pub output: PathBuf,
    pub mode: EmissionMode,
    pub dry_run: bool,
    pub committed: bool,
    pub success: bool,
    pub failed: usize,
    pub failure_mask: u64,
    pub written: usize,
    pub unchanged: usize,
    pub platforms: Vec<PlatformSummary>,
}

#[derive(Debug, Serialize)]
pub struct PluginSummary {
    pub id: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PlatformSummary {
    pub platform: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorSummary>,
}

#[derive(Debug, Serialize)]
pub struct ErrorSummary {
    pub kind: &'static str,
    pub message: String,
}

/// Write the JSON summary of `report` to `path`
pub fn write_report(path: &Path, report: &CompilationReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&report.summary())
        .context("failed to serialize compilation report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugforge_manifest::errors::{ConstraintError, ConstraintRule};
    use tempfile::TempDir;

    fn success(key: &str) -> PlatformOutcome {
        PlatformOutcome::Success {
            code: PathBuf::from(format!("{key}/demo_{key}.java")),
            manifest: PathBuf::from(format!("{key}/plugin.yml")),
            warnings: Vec::new(),
        }
    }

    fn report(outcomes: Vec<(&str, PlatformOutcome)>) -> CompilationReport {
        CompilationReport {
            plugin_id: "demo".to_string(),
            plugin_version: "1.0.0".to_string(),
            output_root: PathBuf::from("out"),
            mode: EmissionMode::Partial,
            dry_run: false,
            outcomes: outcomes
                .into_iter()
                .map(|(key, outcome)| (key.to_string(), outcome))
                .collect(),
            written: Vec::new(),
            unchanged: Vec::new(),
        }
    }

    #[test]
    fn test_mask_follows_registry_order() {
        let report = report(vec![
            ("velocity", PlatformOutcome::Cancelled),
            ("bukkit", success("bukkit")),
            (
                "sponge",
                PlatformOutcome::Failure {
                    errors: vec![PlatformError::UnknownPlatform("sponge".to_string())],
                },
            ),
            ("nukkit", success("nukkit")),
        ]);
        // bukkit, nukkit, sponge, velocity
        assert_eq!(report.failure_mask(), 0b1100);
        assert_eq!(report.failure_count(), 2);
        assert_eq!(report.exit_code(), 2);
        assert!(!report.is_success());
    }

    #[test]
    fn test_exit_code_is_clamped() {
        let outcomes: Vec<(String, PlatformOutcome)> = (0..120)
            .map(|i| (format!("p{i:03}"), PlatformOutcome::Cancelled))
            .collect();
        let mut report = report(Vec::new());
        report.outcomes = outcomes.into_iter().collect();
        assert_eq!(report.exit_code(), MAX_FAILURE_EXIT);
        assert_eq!(report.failure_mask(), u64::MAX);
    }

    #[test]
    fn test_all_success_exits_zero() {
        let report = report(vec![("bukkit", success("bukkit"))]);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert!(report.committed());
    }

    #[test]
    fn test_summary_json() {
        let report = report(vec![
            ("bukkit", success("bukkit")),
            (
                "velocity",
                PlatformOutcome::Failure {
                    errors: vec![PlatformError::Constraint(ConstraintError {
                        platform: "velocity".to_string(),
                        field: "id".to_string(),
                        value: "Demo".to_string(),
                        rule: ConstraintRule::Pattern("[a-z]+".to_string()),
                    })],
                },
            ),
        ]);
        let Ok(json) = serde_json::to_value(report.summary()) else {
            panic!("summary should serialize");
        };
        assert_eq!(json["failed"], 1);
        assert_eq!(json["failure_mask"], 2);
        assert_eq!(json["mode"], "partial");
        assert_eq!(json["platforms"][0]["status"], "success");
        assert_eq!(json["platforms"][0]["manifest"], "out/bukkit/plugin.yml");
        assert_eq!(json["platforms"][1]["errors"][0]["kind"], "constraint");
        assert!(json["platforms"][1].get("code").is_none());
    }

    #[test]
    fn test_write_report_creates_parent() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join("reports/compile.json");
        let report = report(vec![("bukkit", success("bukkit"))]);
        assert!(write_report(&path, &report).is_ok());
        let Ok(content) = fs::read_to_string(&path) else {
            panic!("report should exist");
        };
        assert!(content.contains("\"success\": true"));
    }
}
