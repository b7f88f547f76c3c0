//! Tracing setup for Upscout
//!
//! Console output follows the level the user picked; the full trace of the
//! last run is written to disk so a failed enrichment can be inspected after
//! the fact.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Name of the per-run debug log inside the logs directory.
pub const LAST_RUN_LOG: &str = "upscout-last-run.log";

/// Crates whose events follow the console level; everything else stays at warn or quieter.
const UPSCOUT_TARGETS: &[&str] = &["upscout", "upscout_core", "upscout_search"];

/// Installs a console layer at `console_level` and a full-trace file layer.
///
/// `RUST_LOG`, when set, replaces the console filter. The file is recreated
/// on every run under `logs_dir` (default `./logs`).
///
/// # Errors
///
/// - `std::io::Error` - If the logs directory or log file cannot be created
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> std::io::Result<()> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LAST_RUN_LOG);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directives(console_level)));

    // Row diagnostics read as plain messages; no targets or source locations
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(file_directives()));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::debug!(
        "Tracing initialized: console={}, debug_file={}",
        console_level,
        log_file_path.display()
    );

    Ok(())
}

/// Console filter: our crates at `level`, dependencies never chattier than warn.
fn console_directives(level: Level) -> String {
    let dependency_level = level.min(Level::WARN);
    let mut directives = vec![dependency_level.to_string().to_lowercase()];
    directives.extend(
        UPSCOUT_TARGETS
            .iter()
            .map(|target| format!("{target}={}", level.to_string().to_lowercase())),
    );
    directives.join(",")
}

/// File filter: everything from our crates, HTTP internals only at debug.
fn file_directives() -> String {
    let mut directives = vec!["debug".to_string()];
    directives.extend(UPSCOUT_TARGETS.iter().map(|target| format!("{target}=trace")));
    directives.join(",")
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including request traces
    Trace,
}

impl CliLogLevel {
    /// Resolves the console level from the explicit flag and verbosity.
    ///
    /// An explicit level wins; otherwise verbose runs log at debug and quiet
    /// runs only report errors.
    pub fn resolve(explicit: Option<CliLogLevel>, verbose: bool) -> CliLogLevel {
        match (explicit, verbose) {
            (Some(level), _) => level,
            (None, true) => CliLogLevel::Debug,
            (None, false) => CliLogLevel::Error,
        }
    }

    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use upscout_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}
