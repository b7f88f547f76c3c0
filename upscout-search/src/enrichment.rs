//! Per-record enrichment pipeline and the library run loop.

use std::fmt;
use std::future::Future;
use std::io::{Read, Write};

use tracing::{debug, info, warn};
use upscout_core::{
    EnrichedRecord, EnrichedWriter, Enrichment, LibraryReader, MovieRecord, UpscoutConfig,
};

use crate::Result;
use crate::client::{SearchClient, usable_identifier};
use crate::errors::RequestFailure;
use crate::matcher::Matcher;
use crate::quality::{QualityEvaluator, serialize_qualities};
use crate::types::{CandidateSet, MatchResult, Upgrade};

/// How a single record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Upgraded,
    /// Matched, but nothing better is available
    Matched,
    NoMatch,
    /// The index could not be queried for this record
    Failed,
}

/// Options for a library run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Look up rows that already carry enrichment
    pub refresh: bool,
    /// Heights at or above this are not searched
    pub low_quality_cutoff: u32,
}

impl RunOptions {
    pub fn from_config(config: &UpscoutConfig) -> Self {
        Self {
            refresh: false,
            low_quality_cutoff: config.library.low_quality_cutoff,
        }
    }
}

/// Counters for a library run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows_read: u64,
    pub rows_written: u64,
    pub decode_skipped: u64,
    pub passed_through: u64,
    /// Rows with no title to search by, written through as they are
    pub untitled: u64,
    pub already_enriched: u64,
    pub matched: u64,
    pub upgraded: u64,
    pub no_match: u64,
    pub failed: u64,
    pub interrupted: bool,
}

impl RunSummary {
    fn count(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Upgraded => {
                self.matched += 1;
                self.upgraded += 1;
            }
            RecordOutcome::Matched => self.matched += 1,
            RecordOutcome::NoMatch => self.no_match += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows read, {} written, {} skipped as malformed, {} already good quality, \
             {} without a title, {} already enriched, {} matched, {} with upgrades, \
             {} unmatched, {} failed",
            self.rows_read,
            self.rows_written,
            self.decode_skipped,
            self.passed_through,
            self.untitled,
            self.already_enriched,
            self.matched,
            self.upgraded,
            self.no_match,
            self.failed
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}

/// Drives search, matching and quality evaluation for library records.
///
/// Records are processed strictly one at a time; the mirror pool inside the
/// client is shared state that must not be touched concurrently.
#[derive(Debug)]
pub struct EnrichmentOrchestrator {
    client: SearchClient,
    matcher: Matcher,
    evaluator: QualityEvaluator,
}

impl EnrichmentOrchestrator {
    pub fn new(client: SearchClient, matcher: Matcher, evaluator: QualityEvaluator) -> Self {
        Self {
            client,
            matcher,
            evaluator,
        }
    }

    /// Orchestrator backed by real mirrors.
    ///
    /// # Errors
    ///
    /// - `SearchError::HttpClient` - If the HTTP client cannot be built
    pub fn from_config(config: &UpscoutConfig) -> Result<Self> {
        Ok(Self::new(
            SearchClient::new(&config.index)?,
            Matcher::from_config(&config.matching),
            QualityEvaluator::new(),
        ))
    }

    pub fn client(&self) -> &SearchClient {
        &self.client
    }

    /// Enriches one record. Lookup failures yield empty enrichment.
    pub async fn enrich(&mut self, movie: &MovieRecord) -> EnrichedRecord {
        self.enrich_with_outcome(movie).await.0
    }

    async fn enrich_with_outcome(&mut self, movie: &MovieRecord) -> (EnrichedRecord, RecordOutcome) {
        let (matched, upgrade) = match self.resolve(movie).await {
            Ok(resolved) => resolved,
            Err(failure) => {
                warn!(
                    "Lookup failed for '{}' ({}): {}",
                    movie.title,
                    year_label(movie.year),
                    failure
                );
                return (EnrichedRecord::unenriched(movie.clone()), RecordOutcome::Failed);
            }
        };

        let Some(candidate) = matched.candidate() else {
            debug!("No match for '{}' ({})", movie.title, year_label(movie.year));
            return (EnrichedRecord::unenriched(movie.clone()), RecordOutcome::NoMatch);
        };

        let outcome = if upgrade.is_available() {
            RecordOutcome::Upgraded
        } else {
            RecordOutcome::Matched
        };
        let enrichment = Enrichment {
            matched_title: candidate.title.clone(),
            matched_year: candidate.year.map(|y| y.to_string()).unwrap_or_default(),
            matched_url: candidate.url.clone(),
            qualities_available: serialize_qualities(candidate),
            next_quality: upgrade.next_quality.unwrap_or_default(),
            magnet: upgrade.magnet.unwrap_or_default(),
        };

        (
            EnrichedRecord {
                movie: movie.clone(),
                enrichment,
            },
            outcome,
        )
    }

    /// Identifier lookups first, title and year when they find nothing.
    async fn resolve(
        &mut self,
        movie: &MovieRecord,
    ) -> std::result::Result<(MatchResult, Upgrade), RequestFailure> {
        let identifiers = [&movie.external_id_primary, &movie.external_id_secondary]
            .into_iter()
            .flatten()
            .filter_map(|raw| usable_identifier(raw));

        for identifier in identifiers {
            let candidates = self.client.search_by_identifier(&identifier).await?;
            if candidates.is_empty() {
                debug!("Identifier {} found nothing for '{}'", identifier, movie.title);
                continue;
            }
            let matched = self
                .matcher
                .match_candidates(movie, &CandidateSet::by_identifier(identifier, candidates));
            let upgrade = self.evaluator.evaluate(movie, &matched);
            return Ok((matched, upgrade));
        }

        let candidates = self
            .client
            .search_by_title_year(&movie.title, movie.year)
            .await?;
        let matched = self
            .matcher
            .match_candidates(movie, &CandidateSet::by_title_year(candidates));
        let upgrade = self.evaluator.evaluate(movie, &matched);
        Ok((matched, upgrade))
    }

    /// Enriches every row of a library, writing one output row per input row.
    ///
    /// `shutdown` is raced against each lookup. When it completes, the rows
    /// written so far stay flushed and the run stops early.
    ///
    /// # Errors
    ///
    /// - `SearchError::Library` - If the output cannot be written
    pub async fn run<R, W, F>(
        &mut self,
        mut reader: LibraryReader<R>,
        writer: &mut EnrichedWriter<W>,
        options: RunOptions,
        shutdown: F,
    ) -> Result<RunSummary>
    where
        R: Read,
        W: Write,
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut summary = RunSummary::default();

        while let Some(next) = reader.next_row() {
            let row = match next {
                Ok(row) => row,
                Err(error) => {
                    warn!("Skipping row: {}", error);
                    summary.decode_skipped += 1;
                    continue;
                }
            };
            summary.rows_read += 1;

            let enrichment = if !options.refresh && row.prior.is_resolved() {
                summary.already_enriched += 1;
                row.prior.clone()
            } else if !row.movie.has_title() {
                debug!("Row at line {} has no title, writing it through", row.line);
                summary.untitled += 1;
                Enrichment::default()
            } else if !row.movie.is_low_quality(options.low_quality_cutoff) {
                summary.passed_through += 1;
                Enrichment::default()
            } else {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        summary.interrupted = true;
                        break;
                    }
                    (record, outcome) = self.enrich_with_outcome(&row.movie) => {
                        summary.count(outcome);
                        record.enrichment
                    }
                }
            };

            writer.write_row(&row, &enrichment)?;
            summary.rows_written += 1;
        }

        info!("Run finished: {}", summary);
        Ok(summary)
    }
}

fn year_label(year: Option<u16>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "year unknown".to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use upscout_core::IndexConfig;

    use super::*;
    use crate::transport::{ScriptedReply, ScriptedTransport};

    const MIRROR: &str = "https://a.example/api/v2";

    const MATRIX_BY_ID: &str = r#"{"status":"ok","data":{"movies":[{
        "id": 1, "title": "The Matrix", "year": 1999, "url": "https://index/the-matrix-1999",
        "imdb_code": "tt0133093",
        "torrents": [
            {"hash": "H720", "quality": "720p", "type": "bluray"},
            {"hash": "H1080", "quality": "1080p", "type": "bluray"}
        ]}]}}"#;

    fn orchestrator(transport: &ScriptedTransport) -> EnrichmentOrchestrator {
        let config = IndexConfig {
            mirrors: vec![MIRROR.to_string()],
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(2),
            ..IndexConfig::default()
        };
        EnrichmentOrchestrator::new(
            SearchClient::with_transport(&config, Box::new(transport.clone())),
            Matcher::default(),
            QualityEvaluator::new(),
        )
    }

    #[tokio::test]
    async fn test_identifier_path_finds_upgrade() {
        let transport = ScriptedTransport::new();
        transport.always(MIRROR, ScriptedReply::json(MATRIX_BY_ID));
        let mut orchestrator = orchestrator(&transport);

        let movie = MovieRecord::new("Matrix", Some(1999))
            .with_height(480)
            .with_primary_id("tt0133093");
        let record = orchestrator.enrich(&movie).await;

        assert_eq!(record.movie, movie);
        assert_eq!(record.enrichment.matched_title, "The Matrix");
        assert_eq!(record.enrichment.matched_year, "1999");
        assert_eq!(record.enrichment.qualities_available, "720p|1080p");
        assert_eq!(record.enrichment.next_quality, "720p");
        assert!(record.enrichment.magnet.contains("H720"));
        assert_eq!(transport.requests()[0].param("query_term"), Some("tt0133093"));
    }

    #[tokio::test]
    async fn test_empty_identifier_result_falls_back_to_title() {
        let transport = ScriptedTransport::new();
        transport
            .push(MIRROR, ScriptedReply::json(r#"{"status":"ok","data":{"movie_count":0}}"#))
            .push(MIRROR, ScriptedReply::json(MATRIX_BY_ID));
        let mut orchestrator = orchestrator(&transport);

        let movie = MovieRecord::new("The Matrix", Some(1999))
            .with_height(480)
            .with_primary_id("tt0133093");
        let record = orchestrator.enrich(&movie).await;

        assert_eq!(record.enrichment.matched_title, "The Matrix");
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].param("query_term"), Some("the matrix 1999"));
    }

    #[tokio::test]
    async fn test_unusable_identifier_goes_straight_to_title() {
        let transport = ScriptedTransport::new();
        transport.always(MIRROR, ScriptedReply::json(MATRIX_BY_ID));
        let mut orchestrator = orchestrator(&transport);

        let movie = MovieRecord::new("The Matrix", Some(1999)).with_secondary_id("603");
        orchestrator.enrich(&movie).await;
        assert_eq!(transport.requests()[0].param("query_term"), Some("the matrix 1999"));
    }

    #[tokio::test]
    async fn test_only_low_tiers_gives_empty_upgrade() {
        let transport = ScriptedTransport::new();
        transport.always(
            MIRROR,
            ScriptedReply::json(
                r#"{"status":"ok","data":{"movies":[{"title":"Old Film","year":1950,
                "torrents":[{"hash":"H","quality":"480p","type":"web"}]}]}}"#,
            ),
        );
        let mut orchestrator = orchestrator(&transport);

        let movie = MovieRecord::new("Old Film", Some(1950)).with_height(480);
        let record = orchestrator.enrich(&movie).await;
        assert_eq!(record.enrichment.matched_title, "Old Film");
        assert_eq!(record.enrichment.qualities_available, "480p");
        assert!(record.enrichment.next_quality.is_empty());
        assert!(record.enrichment.magnet.is_empty());
    }

    #[tokio::test]
    async fn test_failure_yields_empty_enrichment() {
        let transport = ScriptedTransport::new();
        let mut orchestrator = orchestrator(&transport);

        let movie = MovieRecord::new("Heat", Some(1995)).with_height(480);
        let (record, outcome) = orchestrator.enrich_with_outcome(&movie).await;
        assert_eq!(outcome, RecordOutcome::Failed);
        assert!(record.enrichment.is_empty());
        assert_eq!(record.movie, movie);
    }

    #[tokio::test]
    async fn test_run_skips_enriched_and_passes_through_good_rows() {
        let transport = ScriptedTransport::new();
        transport.always(MIRROR, ScriptedReply::json(MATRIX_BY_ID));
        let mut orchestrator = orchestrator(&transport);

        let input = "title,year,max_height,imdb_id,magnet\n\
                     Matrix,1999,480,tt0133093,\n\
                     Heat,1995,1080,,\n\
                     Alien,1979,480,,magnet:?xt=urn:btih:OLD\n";
        let reader = LibraryReader::new(input.as_bytes()).unwrap();
        let mut writer = EnrichedWriter::new(Vec::new(), reader.header()).unwrap();

        let summary = orchestrator
            .run(reader, &mut writer, RunOptions { refresh: false, low_quality_cutoff: 720 }, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.upgraded, 1);
        assert_eq!(summary.passed_through, 1);
        assert_eq!(summary.already_enriched, 1);
        assert!(!summary.interrupted);
        assert_eq!(transport.requests().len(), 1);

        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("Matrix,1999,480,tt0133093,magnet:?xt=urn:btih:H720"));
        assert_eq!(lines[2], "Heat,1995,1080,,,,,,,");
        assert!(lines[3].starts_with("Alien,1979,480,,magnet:?xt=urn:btih:OLD"));
    }

    #[tokio::test]
    async fn test_run_writes_untitled_rows_through() {
        let transport = ScriptedTransport::new();
        transport.always(MIRROR, ScriptedReply::json(r#"{"status":"ok","data":{"movie_count":0}}"#));
        let mut orchestrator = orchestrator(&transport);

        let input = "title,year,max_height,notes\n\
                     Heat,1995,480,a\n\
                     ,2001,480,user note\n\
                     Alien,1979,480,c\n";
        let reader = LibraryReader::new(input.as_bytes()).unwrap();
        let mut writer = EnrichedWriter::new(Vec::new(), reader.header()).unwrap();

        let summary = orchestrator
            .run(reader, &mut writer, RunOptions { refresh: false, low_quality_cutoff: 720 }, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.rows_read, 3);
        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.untitled, 1);
        assert_eq!(summary.decode_skipped, 0);
        assert_eq!(transport.requests().len(), 2);

        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], ",2001,480,user note,,,,,,");
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_fires() {
        let transport = ScriptedTransport::new();
        transport.always(MIRROR, ScriptedReply::json(MATRIX_BY_ID));
        let mut orchestrator = orchestrator(&transport);

        let input = "title,year,max_height\nMatrix,1999,480\nHeat,1995,480\n";
        let reader = LibraryReader::new(input.as_bytes()).unwrap();
        let mut writer = EnrichedWriter::new(Vec::new(), reader.header()).unwrap();

        let summary = orchestrator
            .run(reader, &mut writer, RunOptions { refresh: false, low_quality_cutoff: 720 }, std::future::ready(()))
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.rows_written, 0);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            rows_read: 2,
            failed: 1,
            interrupted: true,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.starts_with("2 rows read"));
        assert!(text.contains("1 failed"));
        assert!(text.ends_with("(interrupted)"));
    }
}
