//! Release index search operations.

use tracing::debug;
use upscout_core::IndexConfig;

use crate::errors::{RequestFailure, SearchError};
use crate::executor::{RequestExecutor, RequestSpec};
use crate::matcher::fold_title;
use crate::mirror_pool::MirrorPool;
use crate::payload::{parse_movie_details, parse_movie_list};
use crate::transport::{HttpTransport, Transport};
use crate::types::{CandidateRecord, ReleaseTorrent};

const LIST_ENDPOINT: &str = "list_movies.json";
const DETAILS_ENDPOINT: &str = "movie_details.json";

/// Minimum digits after the `tt` prefix for an identifier to be searchable.
const MIN_IDENTIFIER_DIGITS: usize = 5;

/// Normalized identifier, or `None` when it cannot key an exact lookup.
///
/// Only IMDb-style identifiers (`tt` followed by digits) are searchable.
pub fn usable_identifier(raw: &str) -> Option<String> {
    let id = raw.trim().to_ascii_lowercase();
    let digits = id.strip_prefix("tt")?;
    (digits.len() >= MIN_IDENTIFIER_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()))
        .then_some(id)
}

/// Free-text query for a title and optional year.
pub fn title_query(title: &str, year: Option<u16>) -> String {
    let title = fold_title(title);
    match year {
        Some(year) if !title.is_empty() => format!("{title} {year}"),
        Some(year) => year.to_string(),
        None => title,
    }
}

/// Magnet URI for a release, named after the movie and release.
pub fn magnet_uri(title: &str, torrent: &ReleaseTorrent) -> String {
    let name = format!("{}.{}.{}", title, torrent.quality, torrent.kind);
    format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        torrent.hash.trim(),
        urlencoding::encode(&name)
    )
}

/// Searches the release index through the resilient executor.
#[derive(Debug)]
pub struct SearchClient {
    executor: RequestExecutor,
    result_limit: u32,
}

impl SearchClient {
    /// Creates a client talking to real mirrors.
    ///
    /// # Errors
    ///
    /// - `SearchError::HttpClient` - If the HTTP client cannot be built
    pub fn new(config: &IndexConfig) -> Result<Self, SearchError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    pub fn with_transport(config: &IndexConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            executor: RequestExecutor::new(transport, config),
            result_limit: config.result_limit.max(1),
        }
    }

    pub fn mirror_pool(&self) -> &MirrorPool {
        self.executor.mirror_pool()
    }

    /// Candidates listed for an exact external identifier.
    ///
    /// # Errors
    ///
    /// - `RequestFailure` - If no mirror produced a usable answer
    pub async fn search_by_identifier(
        &mut self,
        identifier: &str,
    ) -> Result<Vec<CandidateRecord>, RequestFailure> {
        self.list(identifier.trim()).await
    }

    /// Candidates for a free-text title and optional year.
    ///
    /// # Errors
    ///
    /// - `RequestFailure` - If no mirror produced a usable answer
    pub async fn search_by_title_year(
        &mut self,
        title: &str,
        year: Option<u16>,
    ) -> Result<Vec<CandidateRecord>, RequestFailure> {
        let query = title_query(title, year);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.list(&query).await
    }

    /// Full record for one movie, by IMDb identifier or index id.
    ///
    /// # Errors
    ///
    /// - `RequestFailure` - If no mirror produced a usable answer
    pub async fn movie_details(
        &mut self,
        identifier: &str,
    ) -> Result<Option<CandidateRecord>, RequestFailure> {
        let identifier = identifier.trim();
        let request = match usable_identifier(identifier) {
            Some(imdb_id) => RequestSpec::new(DETAILS_ENDPOINT).param("imdb_id", imdb_id),
            None => RequestSpec::new(DETAILS_ENDPOINT).param("movie_id", identifier),
        };

        let response = self.executor.execute(&request).await?;
        Ok(parse_movie_details(&response.body))
    }

    async fn list(&mut self, query_term: &str) -> Result<Vec<CandidateRecord>, RequestFailure> {
        let request = RequestSpec::new(LIST_ENDPOINT)
            .param("query_term", query_term)
            .param("limit", self.result_limit)
            .param("sort_by", "year")
            .param("order_by", "desc");

        let response = self.executor.execute(&request).await?;
        let candidates = parse_movie_list(&response.body);
        debug!(
            "Query '{}' returned {} candidates from {}",
            query_term,
            candidates.len(),
            response.mirror
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::{ScriptedReply, ScriptedTransport};

    const MIRROR: &str = "https://a.example/api/v2";

    fn client(transport: &ScriptedTransport) -> SearchClient {
        let config = IndexConfig {
            mirrors: vec![MIRROR.to_string()],
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(2),
            ..IndexConfig::default()
        };
        SearchClient::with_transport(&config, Box::new(transport.clone()))
    }

    #[test]
    fn test_usable_identifier() {
        assert_eq!(usable_identifier("tt0133093"), Some("tt0133093".to_string()));
        assert_eq!(usable_identifier(" TT12345 "), Some("tt12345".to_string()));
        assert_eq!(usable_identifier("tt1234"), None);
        assert_eq!(usable_identifier("603"), None);
        assert_eq!(usable_identifier("tt01x3093"), None);
        assert_eq!(usable_identifier(""), None);
    }

    #[test]
    fn test_title_query() {
        assert_eq!(title_query("The.Matrix (1999)", Some(1999)), "the matrix 1999");
        assert_eq!(title_query("Heat", None), "heat");
        assert_eq!(title_query("!!!", None), "");
    }

    #[test]
    fn test_magnet_uri() {
        let torrent = ReleaseTorrent {
            quality: "720p".to_string(),
            kind: "bluray".to_string(),
            hash: "ABCDEF".to_string(),
            size: None,
            seeds: None,
            peers: None,
        };
        assert_eq!(
            magnet_uri("The Matrix", &torrent),
            "magnet:?xt=urn:btih:ABCDEF&dn=The%20Matrix.720p.bluray"
        );
    }

    #[tokio::test]
    async fn test_title_search_sends_list_query() {
        let transport = ScriptedTransport::new();
        transport.always(
            MIRROR,
            ScriptedReply::json(r#"{"status":"ok","data":{"movies":[{"title":"Heat","year":1995}]}}"#),
        );
        let mut client = client(&transport);

        let candidates = client.search_by_title_year("Heat", Some(1995)).await.unwrap();
        assert_eq!(candidates.len(), 1);

        let request = &transport.requests()[0];
        assert_eq!(request.url, format!("{MIRROR}/list_movies.json"));
        assert_eq!(request.param("query_term"), Some("heat 1995"));
        assert_eq!(request.param("limit"), Some("10"));
        assert_eq!(request.param("sort_by"), Some("year"));
        assert_eq!(request.param("order_by"), Some("desc"));
    }

    #[tokio::test]
    async fn test_blank_title_skips_request() {
        let transport = ScriptedTransport::new();
        let mut client = client(&transport);
        assert!(client.search_by_title_year("...", None).await.unwrap().is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_movie_details_picks_parameter() {
        let transport = ScriptedTransport::new();
        transport.always(
            MIRROR,
            ScriptedReply::json(r#"{"status":"ok","data":{"movie":{"id":3,"title":"Heat"}}}"#),
        );
        let mut client = client(&transport);

        let found = client.movie_details("tt0113277").await.unwrap();
        assert_eq!(found.unwrap().title, "Heat");
        client.movie_details("3").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].param("imdb_id"), Some("tt0113277"));
        assert_eq!(requests[1].param("movie_id"), Some("3"));
        assert!(requests[1].url.ends_with("movie_details.json"));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let transport = ScriptedTransport::new();
        let mut client = client(&transport);
        assert!(client.search_by_identifier("tt0133093").await.is_err());
    }
}
