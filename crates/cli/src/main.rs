//! `tailor` command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod commands;
mod options;
mod prompt;
mod render;
mod tailorfile;

use options::{Cli, Commands, CompareArgs, Options};
use tailorfile::{Tailorfile, DEFAULT_FILE};

/// `--debug` and `--verbose` take precedence over `TAILOR_LOG`. Logs go to
/// stderr so stdout can be piped.
fn init_tracing(verbose: bool, debug: bool) {
    let env = if debug {
        "debug".to_string()
    } else if verbose {
        "info".to_string()
    } else {
        std::env::var("TAILOR_LOG").unwrap_or_else(|_| "warn".to_string())
    };
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let explicit = cli.global.file.is_some();
    let path = cli.global.file.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_FILE));
    let tailorfile = Tailorfile::load(&path, explicit)?;

    let (compare, verify) = match &cli.command {
        Commands::Status(compare) => (compare.clone(), false),
        Commands::Apply { compare, verify } => (compare.clone(), *verify),
        Commands::Export { resource, .. } => (CompareArgs { resource: resource.clone(), ..Default::default() }, false),
        Commands::Version | Commands::Secrets(_) => (CompareArgs::default(), false),
    };
    let mut opts = Options::merge(&cli.global, &compare, verify, &tailorfile)?;
    init_tracing(opts.verbose, opts.debug);
    debug!(tailorfile = %path.display(), namespace = %opts.namespace, "options resolved");

    match cli.command {
        Commands::Version => commands::version(&opts).await,
        Commands::Status(_) => commands::status(&mut opts).await,
        Commands::Apply { .. } => commands::apply(&mut opts).await,
        Commands::Export { template_name, .. } => commands::export(&mut opts, &template_name).await,
        Commands::Secrets(command) => commands::secrets(&opts, command),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
