//! # strand-cli
//!
//! Entry point for data-app binaries:
//!
//! ```ignore
//! fn main() {
//!     strand_cli::start(MyApp);
//! }
//! ```
//!
//! The same binary runs the app locally, plans or deploys it, and serves its
//! functions once deployed.

pub mod cli;
pub mod commands;
pub mod observability;

use anyhow::Result;
use clap::Parser;

use strand_core::config::loader::load_process_config;
use strand_core::{ErrorCategory, StrandError};
use strand_runtime::App;

use cli::{Cli, Commands};

/// Exit status for configuration problems (bad app config, missing settings or secrets).
///
/// Distinct from 2, which clap uses for command-line usage errors.
pub const EXIT_CONFIGURATION: i32 = 78;
/// Exit status for unrecoverable runtime failures.
pub const EXIT_FATAL: i32 = 3;

/// Parses the command line, runs the requested command and exits the process.
pub fn start<A: App>(app: A) -> ! {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is fine
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let code = match runtime.block_on(run(&app, cli)) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    };
    drop(runtime);
    std::process::exit(code);
}

/// Runs one parsed command against `app`.
pub async fn run(app: &dyn App, cli: Cli) -> Result<()> {
    observability::init_tracing();

    let process = load_process_config(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&process.log_level);
    observability::apply_logging_level(level);

    match &cli.command {
        Commands::Local => commands::local(app, &cli.app_config).await,
        Commands::Plan(args) => commands::plan(app, &cli.app_config, args).await,
        Commands::Deploy(args) => commands::deploy(app, &cli.app_config, &process, args).await,
        Commands::Serve(args) => {
            commands::serve(app, &cli.app_config, &process, &args.function).await
        }
        Commands::Functions => commands::functions(app, &cli.app_config).await,
        Commands::Resources => commands::resources(app, &cli.app_config).await,
    }
}

/// Maps a failed command to the process exit status.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<StrandError>().map(StrandError::category) {
        Some(ErrorCategory::Configuration) => EXIT_CONFIGURATION,
        Some(ErrorCategory::Fatal) => EXIT_FATAL,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_error_category() {
        let config = anyhow::Error::new(StrandError::configuration("missing STRAND_API_URL"));
        assert_eq!(exit_code(&config), EXIT_CONFIGURATION);

        let fatal = anyhow::Error::new(StrandError::fatal("unable to create function"))
            .context("deploy failed");
        assert_eq!(exit_code(&fatal), EXIT_FATAL);

        let not_found = anyhow::Error::new(StrandError::not_found("resource", "pg"));
        assert_eq!(exit_code(&not_found), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("bind failed")), 1);
    }

    #[test]
    fn test_exit_codes_differ_from_usage_errors() {
        let usage = Cli::try_parse_from(["strand-demo", "deploy"])
            .err()
            .expect("--image-name is required");
        assert_eq!(usage.exit_code(), 2);
        assert_ne!(EXIT_CONFIGURATION, usage.exit_code());
        assert_ne!(EXIT_FATAL, usage.exit_code());
    }
}
