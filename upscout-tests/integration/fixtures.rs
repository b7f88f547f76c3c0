//! Shared builders for scripted index responses and temporary libraries.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use upscout_core::library::SyncedFile;
use upscout_core::{EnrichedWriter, IndexConfig, LibraryReader};
use upscout_search::transport::{ScriptedReply, ScriptedTransport};
use upscout_search::{
    EnrichmentOrchestrator, Matcher, QualityEvaluator, RunOptions, RunSummary, SearchClient,
};

pub const MIRROR_A: &str = "https://mirror-a.example/api/v2";
pub const MIRROR_B: &str = "https://mirror-b.example/api/v2";

/// One torrent entry as the index lists it.
pub fn torrent(quality: &str, kind: &str, hash: &str) -> Value {
    json!({"quality": quality, "type": kind, "hash": hash, "seeds": 12, "peers": 3})
}

/// One movie entry as the index lists it.
pub fn movie(title: &str, year: u16, imdb_code: &str, torrents: Vec<Value>) -> Value {
    let slug = title.to_lowercase().replace(' ', "-");
    json!({
        "id": year as u64 * 10,
        "title": title,
        "year": year,
        "url": format!("https://index.example/movies/{slug}-{year}"),
        "imdb_code": imdb_code,
        "rating": 7.5,
        "torrents": torrents,
    })
}

/// `list_movies` reply carrying the given movies.
pub fn listing(movies: Vec<Value>) -> ScriptedReply {
    let body = json!({
        "status": "ok",
        "data": {"movie_count": movies.len(), "limit": 10, "movies": movies},
    });
    ScriptedReply::json(body.to_string())
}

pub fn empty_listing() -> ScriptedReply {
    ScriptedReply::json(r#"{"status":"ok","data":{"movie_count":0}}"#)
}

pub fn matrix() -> Value {
    movie(
        "The Matrix",
        1999,
        "tt0133093",
        vec![
            torrent("720p", "bluray", "MATRIX720"),
            torrent("1080p", "bluray", "MATRIX1080"),
            torrent("2160p", "web", "MATRIX2160"),
        ],
    )
}

pub fn index_config(mirrors: &[&str]) -> IndexConfig {
    IndexConfig {
        mirrors: mirrors.iter().map(|m| m.to_string()).collect(),
        backoff_base: Duration::from_millis(1),
        backoff_cap: Duration::from_millis(2),
        ..IndexConfig::default()
    }
}

pub fn orchestrator(transport: &ScriptedTransport, mirrors: &[&str]) -> EnrichmentOrchestrator {
    EnrichmentOrchestrator::new(
        SearchClient::with_transport(&index_config(mirrors), Box::new(transport.clone())),
        Matcher::default(),
        QualityEvaluator::new(),
    )
}

pub fn options(refresh: bool) -> RunOptions {
    RunOptions {
        refresh,
        low_quality_cutoff: 720,
    }
}

/// Temporary directory holding one library file.
pub struct Library {
    pub dir: TempDir,
    pub input: PathBuf,
}

impl Library {
    pub fn new(contents: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("library.csv");
        fs::write(&input, contents).unwrap();
        Self { dir, input }
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Runs the orchestrator from `input` into `output` through real files.
pub async fn run_files<F>(
    orchestrator: &mut EnrichmentOrchestrator,
    input: &Path,
    output: &Path,
    options: RunOptions,
    shutdown: F,
) -> RunSummary
where
    F: Future<Output = ()>,
{
    let reader = LibraryReader::new(BufReader::new(File::open(input).unwrap())).unwrap();
    let file = SyncedFile::new(File::create(output).unwrap());
    let mut writer = EnrichedWriter::new(file, reader.header()).unwrap();

    let summary = orchestrator
        .run(reader, &mut writer, options, shutdown)
        .await
        .unwrap();
    writer.into_inner().unwrap();
    summary
}

/// Data rows of a CSV file as cells, header first.
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let text = fs::read_to_string(path).unwrap();
    let reader = LibraryReader::new(text.as_bytes()).unwrap();
    let header = reader.header().to_vec();
    let mut rows = vec![header];
    rows.extend(reader.map(|row| row.unwrap().cells));
    rows
}

/// Value of `column` in a data row.
pub fn cell<'a>(rows: &'a [Vec<String>], row: usize, column: &str) -> &'a str {
    let index = rows[0]
        .iter()
        .position(|name| name == column)
        .unwrap_or_else(|| panic!("no column {column}"));
    &rows[row][index]
}
