use clap::{Args, ValueEnum};
use colored::Colorize;
use plugforge_config::{Layout, ProjectConfig, DEFAULT_OUTPUT_DIR};
use std::path::PathBuf;

use crate::common::{load_project_config, load_registry};
use crate::driver::{CancellationToken, CompilationDriver, CompileOptions, EmissionMode};
use crate::errors::CliError;
use crate::logger;
use crate::report::{write_report, CompilationReport, PlatformOutcome};
use crate::GlobalOpts;

use super::generator_defaults;

#[derive(Args, Debug, Clone)]
pub struct CompileCommand {
    /// Root of the plugin's Java sources
    #[arg(default_value = ".")]
    pub source: PathBuf,

    /// Output root (default: `output` from plugforge.toml, else ./plugforge-out)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Platform to compile for; repeat for several (default: all)
    #[arg(short = 'p', long = "platform", value_name = "KEY")]
    pub platforms: Vec<String>,

    /// Extra platform registry layered over the built-in one
    #[arg(long, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// Project config file (default: nearest plugforge.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where generated sources go under each platform directory
    #[arg(long, value_enum)]
    pub layout: Option<LayoutArg>,

    /// Write nothing unless every platform succeeds
    #[arg(long)]
    pub strict: bool,

    /// Write a JSON summary of the compilation
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Emit and validate without writing any artifact
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutArg {
    Flat,
    Package,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Flat => Layout::Flat,
            LayoutArg::Package => Layout::Package,
        }
    }
}

impl CompileCommand {
    /// Command-line flags over `plugforge.toml` over defaults
    pub fn options(&self, config: Option<&ProjectConfig>) -> CompileOptions {
        let output = self
            .output
            .clone()
            .or_else(|| config.and_then(ProjectConfig::output_dir))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mut options = CompileOptions::new(&self.source, output);
        options.cli_platforms.clone_from(&self.platforms);
        options.config_platforms = config.map(|c| c.platforms.clone()).unwrap_or_default();
        options.layout = self
            .layout
            .map(Layout::from)
            .or_else(|| config.and_then(|c| c.layout))
            .unwrap_or_default();
        let strict = self.strict || config.and_then(|c| c.strict).unwrap_or(false);
        options.mode = if strict {
            EmissionMode::Strict
        } else {
            EmissionMode::Partial
        };
        options.dry_run = self.dry_run;
        options.generator = generator_defaults(config);
        options
    }
}

/// Compile the plugin under `cmd.source`; returns the process exit code
pub fn handle_compile(cmd: CompileCommand, _opts: &GlobalOpts) -> Result<i32, CliError> {
    let config = load_project_config(cmd.config.as_deref(), &cmd.source)?;
    let registry = load_registry(cmd.registry.as_deref(), config.as_ref())?;
    let options = cmd.options(config.as_ref());
    let layout = options.layout;
    logger::debug(&format!(
        "Compiling {} into {} ({} layout, {:?} mode)",
        options.source_root.display(),
        options.output_root.display(),
        options.layout,
        options.mode
    ));

    logger::spinner_start("Compiling plugin descriptor...");
    let mut driver = CompilationDriver::new(&registry, options);
    if let Err(e) = ctrlc::set_handler(on_interrupt(driver.cancellation_token())) {
        logger::debug(&format!("Interrupt handler not installed: {e}"));
    }
    let report = match driver.run() {
        Ok(report) => report,
        Err(e) => {
            logger::spinner_error("Compilation aborted");
            return Err(e);
        }
    };
    logger::spinner_stop();

    print_report(&report);
    if let Some(note) = layout_note(layout, &report) {
        logger::info(note);
    }
    if let Some(path) = &cmd.report {
        write_report(path, &report)?;
        logger::info(&format!("Report written to {}", path.display()));
    }
    Ok(report.exit_code())
}

/// Ctrl-C lets running platform units finish and cancels the rest
fn on_interrupt(token: CancellationToken) -> impl FnMut() + Send + 'static {
    move || {
        if !token.is_cancelled() {
            logger::warn("Interrupted, cancelling remaining platforms...");
        }
        token.cancel();
    }
}

/// Flat file names do not match the public class inside, so javac rejects them
fn layout_note(layout: Layout, report: &CompilationReport) -> Option<&'static str> {
    let wrote_code = report.committed() && report.outcomes.values().any(PlatformOutcome::is_success);
    (layout == Layout::Flat && wrote_code)
        .then_some("Flat layout output is for inspection; use --layout package for sources javac accepts")
}

fn print_report(report: &CompilationReport) {
    for (key, outcome) in &report.outcomes {
        match outcome {
            PlatformOutcome::Success {
                code,
                manifest,
                warnings,
            } => {
                logger::success(&format!(
                    "{:<12} {}, {}",
                    key,
                    code.display(),
                    manifest.display()
                ));
                for warning in warnings {
                    logger::warn(&format!("[{key}] {warning}"));
                }
            }
            PlatformOutcome::Failure { errors } => {
                for error in errors {
                    logger::error(&error.to_string());
                }
            }
            PlatformOutcome::Cancelled => logger::warn(&format!("[{key}] cancelled")),
        }
    }

    let total = report.outcomes.len();
    let succeeded = total - report.failure_count();
    let verb = if report.dry_run { "Checked" } else { "Compiled" };
    let headline = format!(
        "{verb} {} {}: {succeeded}/{total} platform(s) succeeded",
        report.plugin_id, report.plugin_version
    );
    if report.is_success() {
        println!("{}", headline.bold().green());
    } else {
        println!("{}", headline.bold().red());
        println!(
            "  failed: {} (mask {:#b})",
            report
                .outcomes
                .iter()
                .filter(|(_, o)| !o.is_success())
                .map(|(key, _)| key.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            report.failure_mask()
        );
    }
    if !report.committed() && !report.dry_run {
        println!("  {}", "strict mode: nothing was written".yellow());
    } else if !report.dry_run {
        println!(
            "  output: {} ({} written, {} unchanged)",
            report.output_root.display(),
            report.written.len(),
            report.unchanged.len()
        );
    }
}
