//! CLI command implementations

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use upscout_core::library::SyncedFile;
use upscout_core::{EnrichedWriter, IndexConfig, LibraryReader, UpscoutConfig};
use upscout_search::{
    CandidateRecord, EnrichmentOrchestrator, RunOptions, SearchClient, SearchError,
};

/// Output file name used when `--output` is not given.
const DEFAULT_OUTPUT_NAME: &str = "upgrades.csv";

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Enrich a library CSV with matches and upgrade suggestions
    Enrich {
        /// Library CSV exported from the media server
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the enriched CSV (default: upgrades.csv next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Look up rows that already carry enrichment
        #[arg(long)]
        refresh: bool,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Look up the release index directly
    Search {
        /// IMDb id (tt...) or index movie id
        #[arg(long, required_unless_present = "key", conflicts_with = "key")]
        id: Option<String>,
        /// Title to search for
        #[arg(long)]
        key: Option<String>,
        /// Release year to narrow a title search
        #[arg(long, requires = "key")]
        year: Option<u16>,
        /// Print results as JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        request: RequestArgs,
    },
}

/// Request tuning shared by every command that talks to the index.
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Retries per request across all mirrors
    #[arg(long)]
    retries: Option<u32>,
    /// Warn about responses slower than this many seconds
    #[arg(long)]
    slow_after: Option<u64>,
}

impl RequestArgs {
    /// Applies the flags over the environment-derived settings.
    fn apply(&self, index: &mut IndexConfig) {
        if let Some(seconds) = self.timeout {
            index.set_timeout(Duration::from_secs(seconds));
        }
        if let Some(retries) = self.retries {
            index.max_retries = retries;
        }
        if let Some(seconds) = self.slow_after {
            index.slow_threshold = Duration::from_secs(seconds);
        }
    }
}

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Completed,
    Interrupted,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands, mut config: UpscoutConfig) -> anyhow::Result<CommandStatus> {
    match command {
        Commands::Enrich {
            input,
            output,
            refresh,
            request,
        } => {
            request.apply(&mut config.index);
            let output = output.unwrap_or_else(|| default_output_path(&input));
            enrich_library(&input, &output, refresh, &config).await
        }
        Commands::Search {
            id,
            key,
            year,
            json,
            request,
        } => {
            request.apply(&mut config.index);
            match (id, key) {
                (Some(id), _) => show_details(&id, json, &config).await?,
                (None, Some(key)) => search_titles(&key, year, json, &config).await?,
                (None, None) => bail!("either --id or --key is required"),
            }
            Ok(CommandStatus::Completed)
        }
    }
}

/// `upgrades.csv` in the input's directory.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_file_name(DEFAULT_OUTPUT_NAME)
}

/// Enrich a library CSV into a new CSV
///
/// # Errors
/// - `UpscoutError::Io` - Input cannot be opened or output cannot be created
/// - `UpscoutError::Decode` - Input has no title column
/// - `SearchError::Library` - Writing a row failed
async fn enrich_library(
    input: &Path,
    output: &Path,
    refresh: bool,
    config: &UpscoutConfig,
) -> anyhow::Result<CommandStatus> {
    if input == output {
        bail!("output {} would overwrite the input", output.display());
    }

    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let reader = LibraryReader::new(BufReader::new(file)).map_err(SearchError::from)?;

    let out_file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer =
        EnrichedWriter::new(SyncedFile::new(out_file), reader.header()).map_err(SearchError::from)?;

    let mut orchestrator = EnrichmentOrchestrator::from_config(config)?;
    let options = RunOptions {
        refresh,
        ..RunOptions::from_config(config)
    };

    let summary = orchestrator.run(reader, &mut writer, options, ctrl_c()).await?;
    writer.into_inner().map_err(SearchError::from)?;

    println!("Wrote {}", output.display());
    println!("{summary}");

    if summary.interrupted {
        eprintln!("Interrupted, rows processed so far were kept");
        return Ok(CommandStatus::Interrupted);
    }
    Ok(CommandStatus::Completed)
}

/// Completes on Ctrl-C, or never if the signal cannot be watched.
async fn ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", error);
        std::future::pending::<()>().await;
    }
}

/// Print candidates for a title search
///
/// # Errors
/// - `SearchError::Request` - The index could not be queried
async fn search_titles(
    key: &str,
    year: Option<u16>,
    json: bool,
    config: &UpscoutConfig,
) -> anyhow::Result<()> {
    let mut client = SearchClient::new(&config.index)?;
    let candidates = client
        .search_by_title_year(key, year)
        .await
        .map_err(SearchError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }
    if candidates.is_empty() {
        println!("No results for '{key}'");
        return Ok(());
    }
    println!("{}", candidate_table(&candidates));
    Ok(())
}

/// Print one movie with its releases
///
/// # Errors
/// - `SearchError::Request` - The index could not be queried
async fn show_details(id: &str, json: bool, config: &UpscoutConfig) -> anyhow::Result<()> {
    let mut client = SearchClient::new(&config.index)?;
    let details = client.movie_details(id).await.map_err(SearchError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }
    let Some(movie) = details else {
        println!("No movie found for '{id}'");
        return Ok(());
    };

    println!("{}", candidate_table(std::slice::from_ref(&movie)));
    if movie.torrents.is_empty() {
        println!("No releases listed");
    } else {
        println!();
        println!("{}", torrent_table(&movie));
    }
    Ok(())
}

fn candidate_table(candidates: &[CandidateRecord]) -> String {
    let rows: Vec<Vec<String>> = candidates
        .iter()
        .map(|c| {
            vec![
                c.title.clone(),
                c.year.map(|y| y.to_string()).unwrap_or_default(),
                c.rating.map(|r| format!("{r:.1}")).unwrap_or_default(),
                c.index_id.map(|id| id.to_string()).unwrap_or_default(),
                c.imdb_code.clone().unwrap_or_default(),
                c.url.clone(),
            ]
        })
        .collect();
    render_table(&["Title", "Year", "Rating", "ID", "IMDb", "URL"], &rows)
}

fn torrent_table(movie: &CandidateRecord) -> String {
    let rows: Vec<Vec<String>> = movie
        .torrents
        .iter()
        .map(|t| {
            vec![
                t.quality.clone(),
                t.kind.clone(),
                t.size.clone().unwrap_or_default(),
                t.seeds.map(|s| s.to_string()).unwrap_or_default(),
                t.peers.map(|p| p.to_string()).unwrap_or_default(),
                t.hash.clone(),
            ]
        })
        .collect();
    render_table(&["Quality", "Type", "Size", "Seeds", "Peers", "Hash"], &rows)
}

/// Left-aligned plain text table with a dashed rule under the header.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}
