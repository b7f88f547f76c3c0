//! Tolerant decoding of index JSON payloads into candidates.
//!
//! Mirrors return loosely typed JSON. Missing fields become absent values and
//! entries that cannot be decoded at all are skipped.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{CandidateRecord, ReleaseTorrent};

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<String>,
    status_message: Option<String>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiMovie {
    id: Option<u64>,
    title: Option<String>,
    title_english: Option<String>,
    year: Option<u16>,
    url: Option<String>,
    imdb_code: Option<String>,
    rating: Option<f32>,
    torrents: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiTorrent {
    hash: Option<String>,
    quality: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    size: Option<String>,
    seeds: Option<u32>,
    peers: Option<u32>,
}

/// Returns the `data` object, or `None` when the index reported an error.
fn data_of(body: &Value) -> Option<Value> {
    let envelope = match Envelope::deserialize(body) {
        Ok(envelope) => envelope,
        Err(error) => {
            debug!("Unexpected payload shape: {}", error);
            return None;
        }
    };

    if let Some(status) = envelope.status.as_deref()
        && !status.eq_ignore_ascii_case("ok")
    {
        debug!(
            "Index reported status '{}': {}",
            status,
            envelope.status_message.as_deref().unwrap_or("no message")
        );
        return None;
    }
    envelope.data
}

/// Candidates from a `list_movies` payload, in listed order.
pub fn parse_movie_list(body: &Value) -> Vec<CandidateRecord> {
    let Some(data) = data_of(body) else {
        return Vec::new();
    };
    let Some(movies) = data.get("movies").and_then(Value::as_array) else {
        return Vec::new();
    };

    movies.iter().filter_map(parse_movie).collect()
}

/// Candidate from a `movie_details` payload.
pub fn parse_movie_details(body: &Value) -> Option<CandidateRecord> {
    let data = data_of(body)?;
    let movie = data.get("movie")?;
    parse_movie(movie)
}

fn parse_movie(entry: &Value) -> Option<CandidateRecord> {
    let movie = match ApiMovie::deserialize(entry) {
        Ok(movie) => movie,
        Err(error) => {
            debug!("Skipping undecodable movie entry: {}", error);
            return None;
        }
    };

    let title = movie
        .title
        .or(movie.title_english)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    let mut candidate = CandidateRecord::new(title, movie.year.filter(|y| *y > 0), movie.url.unwrap_or_default());
    candidate.index_id = movie.id;
    candidate.imdb_code = movie.imdb_code.filter(|code| !code.trim().is_empty());
    candidate.rating = movie.rating;

    for entry in movie.torrents.unwrap_or_default() {
        match ApiTorrent::deserialize(&entry) {
            Ok(torrent) => candidate.push_torrent(ReleaseTorrent {
                quality: torrent.quality.unwrap_or_default(),
                kind: torrent.kind.unwrap_or_default(),
                hash: torrent.hash.unwrap_or_default(),
                size: torrent.size,
                seeds: torrent.seeds,
                peers: torrent.peers,
            }),
            Err(error) => debug!("Skipping undecodable torrent entry: {}", error),
        }
    }

    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_movie_list_is_parsed_in_order() {
        let body = json!({
            "status": "ok",
            "data": {
                "movie_count": 2,
                "movies": [
                    {
                        "id": 10,
                        "title": "The Matrix",
                        "year": 1999,
                        "url": "https://yts.mx/movies/the-matrix-1999",
                        "imdb_code": "tt0133093",
                        "rating": 8.7,
                        "torrents": [
                            {"hash": "AAA", "quality": "720p", "type": "bluray", "seeds": 10},
                            {"hash": "BBB", "quality": "1080p", "type": "web", "size": "1.8 GB"}
                        ]
                    },
                    {"title": "The Matrix Reloaded", "year": 2003}
                ]
            }
        });

        let candidates = parse_movie_list(&body);
        assert_eq!(candidates.len(), 2);

        let matrix = &candidates[0];
        assert_eq!(matrix.index_id, Some(10));
        assert_eq!(matrix.imdb_code.as_deref(), Some("tt0133093"));
        assert_eq!(matrix.torrent_hashes["720p"], "AAA");
        assert_eq!(matrix.torrents[1].size.as_deref(), Some("1.8 GB"));
        assert_eq!(matrix.torrents[0].seeds, Some(10));

        let reloaded = &candidates[1];
        assert_eq!(reloaded.year, Some(2003));
        assert!(reloaded.url.is_empty());
        assert!(reloaded.available_qualities.is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let body = json!({
            "status": "ok",
            "data": {
                "movies": [
                    {"title": "Broken", "year": "nineteen"},
                    "not an object",
                    {"title": "Heat", "year": 1995, "torrents": [{"quality": 720}, {"quality": "1080p", "hash": "H"}]}
                ]
            }
        });

        let candidates = parse_movie_list(&body);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Heat");
        assert_eq!(candidates[0].torrents.len(), 1);
    }

    #[test]
    fn test_empty_or_error_payloads_yield_nothing() {
        assert!(parse_movie_list(&json!({"status": "ok", "data": {"movie_count": 0}})).is_empty());
        assert!(parse_movie_list(&json!({"status": "error", "status_message": "bad query"})).is_empty());
        assert!(parse_movie_list(&json!([1, 2, 3])).is_empty());
        assert!(parse_movie_list(&json!({"data": {"movies": null}})).is_empty());
    }

    #[test]
    fn test_movie_details() {
        let body = json!({
            "status": "ok",
            "data": {"movie": {"id": 7, "title": "Heat", "year": 1995, "imdb_code": "tt0113277"}}
        });
        let candidate = parse_movie_details(&body).unwrap();
        assert_eq!(candidate.title, "Heat");
        assert_eq!(candidate.index_id, Some(7));

        assert!(parse_movie_details(&json!({"status": "ok", "data": {}})).is_none());
    }
}
