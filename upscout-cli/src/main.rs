//! Upscout CLI - find better copies of low-quality library movies

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use upscout_core::UpscoutConfig;
use upscout_core::tracing_setup::{CliLogLevel, init_tracing};
use upscout_search::SearchError;

use crate::commands::CommandStatus;

/// Exit status after Ctrl-C, as shells report SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "upscout")]
#[command(about = "Match a movie library against a release index and suggest upgrades")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Log debug details to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Console log level, overrides --verbose
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Directory for the full trace log of the last run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = UpscoutConfig::from_env();

    let level = CliLogLevel::resolve(cli.log_level, cli.verbose || config.verbose);
    if let Err(error) = init_tracing(level.as_tracing_level(), cli.logs_dir.as_deref()) {
        eprintln!("Warning: could not set up logging: {error}");
    }

    match commands::handle_command(cli.command, config).await {
        Ok(CommandStatus::Completed) => ExitCode::SUCCESS,
        Ok(CommandStatus::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(error) => {
            tracing::debug!("Command failed: {:#}", error);
            match error.downcast_ref::<SearchError>() {
                Some(search_error) => eprintln!("Error: {}", search_error.user_message()),
                None => eprintln!("Error: {error:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
