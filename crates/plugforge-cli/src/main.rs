use clap::{Parser, Subcommand};
use plugforge::{
    commands::{
        check::{self, CheckCommand},
        compile::{self, CompileCommand},
        platforms::{self, PlatformsCommand},
    },
    errors::CliError,
    logger, GlobalOpts,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "plugforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Plugin descriptor compiler",
    long_about = "plugforge reads the @Plugin annotations of a plugin's Java sources and emits a bootstrap class and a manifest for every supported server platform."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bootstrap classes and manifests
    Compile(CompileCommand),
    /// Scan, parse and validate the plugin descriptor
    Check(CheckCommand),
    /// List registered platforms
    Platforms(PlatformsCommand),
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| logger::verbosity_to_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn report_error(error: &CliError) -> i32 {
    logger::spinner_stop();
    match error {
        CliError::Descriptor(_) => {
            for line in error.diagnostics() {
                logger::error(&line);
            }
            logger::error(&error.to_string());
        }
        _ => logger::error(&error.to_string()),
    }
    if logger::get_verbosity() > 0 {
        logger::show_log_path();
    }
    error.exit_code()
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(
        cli.global.verbosity_level(),
        cli.global.quiet,
        !cli.global.no_log_file,
    ) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing();

    let result = match cli.command {
        Commands::Compile(cmd) => compile::handle_compile(cmd, &cli.global),
        Commands::Check(cmd) => check::handle_check(cmd, &cli.global),
        Commands::Platforms(cmd) => platforms::handle_platforms(cmd, &cli.global),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => report_error(&e),
    };
    std::process::exit(code);
}
