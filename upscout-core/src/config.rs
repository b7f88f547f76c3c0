//! Centralized configuration for Upscout.
//!
//! All tunable parameters are defined here so the search engine, the library
//! codec and the CLI agree on defaults. Environment variables override the
//! defaults; CLI flags override the environment.

use std::time::Duration;

use url::Url;

/// Mirrors of the release index API, tried in this order after any
/// configured ones.
pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://www.yts-official.to/api/v2",
    "https://yts.rs/api/v2",
    "https://yts.lt/api/v2",
    "https://yts.mx/api/v2",
    "https://yts.pm/api/v2",
    "https://yts.ag/api/v2",
    "https://yts.am/api/v2",
];

const API_SUFFIX: &str = "/api/v2";

/// Central configuration for all Upscout components.
#[derive(Debug, Clone, Default)]
pub struct UpscoutConfig {
    pub index: IndexConfig,
    pub matching: MatchingConfig,
    pub library: LibraryConfig,
    /// Verbose diagnostics requested through the environment
    pub verbose: bool,
}

/// Release index communication settings.
///
/// Controls the mirror list, request timeouts and the retry budget the
/// request executor works within.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Ordered API roots, never empty
    pub mirrors: Vec<String>,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Successful calls slower than this are logged
    pub slow_threshold: Duration,
    /// Retries allowed per logical request, across all mirrors
    pub max_retries: u32,
    /// Attempts on one mirror for timeouts and transient server errors
    pub mirror_attempts: u32,
    /// First backoff delay; doubles on every same-mirror retry
    pub backoff_base: Duration,
    /// Upper bound for a single backoff delay
    pub backoff_cap: Duration,
    /// Number of results requested per search
    pub result_limit: u32,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(12),
            slow_threshold: Duration::from_secs(9),
            max_retries: 6,
            mirror_attempts: 3,
            backoff_base: Duration::from_millis(750),
            backoff_cap: Duration::from_secs(8),
            result_limit: 10,
            user_agent: concat!("upscout/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Shortest per-request timeout accepted from the environment or the CLI.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

impl IndexConfig {
    /// Sets the per-request timeout, raised to `MIN_TIMEOUT` if shorter.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout.max(MIN_TIMEOUT);
    }

    /// Builds the mirror list from a comma-separated override.
    ///
    /// Entries may be site roots or API roots. Configured mirrors come first,
    /// followed by the defaults, with duplicates removed in order. Entries
    /// that do not parse as URLs are dropped with a warning.
    pub fn mirrors_from_list(list: &str) -> Vec<String> {
        let configured = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match normalize_mirror(entry) {
                Some(mirror) => Some(mirror),
                None => {
                    tracing::warn!("Ignoring invalid mirror '{}'", entry);
                    None
                }
            });

        let mut mirrors: Vec<String> = Vec::new();
        for mirror in configured.chain(DEFAULT_MIRRORS.iter().map(|m| m.to_string())) {
            if !mirrors.contains(&mirror) {
                mirrors.push(mirror);
            }
        }
        mirrors
    }
}

/// Normalizes a mirror entry to an API root ending in `/api/v2`.
fn normalize_mirror(entry: &str) -> Option<String> {
    let trimmed = entry.trim_end_matches('/');
    let api_root = if trimmed.ends_with(API_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{API_SUFFIX}")
    };

    match Url::parse(&api_root) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            Some(api_root)
        }
        _ => None,
    }
}

/// Fuzzy title matching settings.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Minimum similarity (0.0-1.0) a title match must reach
    pub similarity_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
        }
    }
}

/// Library input settings.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Vertical resolution at or above which a title is not low quality
    pub low_quality_cutoff: u32,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            low_quality_cutoff: 720,
        }
    }
}

impl UpscoutConfig {
    /// Creates configuration with environment variable overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(list) = lookup("YTS_API_BASE")
            && !list.trim().is_empty()
        {
            config.index.mirrors = IndexConfig::mirrors_from_list(&list);
        }

        if let Some(seconds) = parse_seconds(&lookup, "UPSCOUT_TIMEOUT_SECS") {
            config.index.set_timeout(seconds);
        }

        if let Some(seconds) = parse_seconds(&lookup, "UPSCOUT_SLOW_AFTER_SECS") {
            config.index.slow_threshold = seconds;
        }

        if let Some(retries) = parse_var::<u32>(&lookup, "UPSCOUT_MAX_RETRIES") {
            config.index.max_retries = retries;
        }

        if let Some(attempts) = parse_var::<u32>(&lookup, "UPSCOUT_MIRROR_ATTEMPTS") {
            config.index.mirror_attempts = attempts.max(1);
        }

        if let Some(cutoff) = parse_var::<u32>(&lookup, "UPSCOUT_LOW_QUALITY_CUTOFF") {
            config.library.low_quality_cutoff = cutoff;
        }

        if let Some(threshold) = parse_var::<f64>(&lookup, "UPSCOUT_MATCH_THRESHOLD")
            .filter(|threshold| threshold.is_finite())
        {
            config.matching.similarity_threshold = threshold.clamp(0.0, 1.0);
        }

        if let Some(flag) = lookup("UPSCOUT_VERBOSE") {
            config.verbose = is_truthy(&flag);
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}='{}'", key, raw);
            None
        }
    }
}

/// Longest duration accepted from the environment.
const MAX_ENV_SECONDS: f64 = 86_400.0;

fn parse_seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    parse_var::<f64>(lookup, key)
        .filter(|seconds| seconds.is_finite())
        .map(|seconds| Duration::from_secs_f64(seconds.clamp(0.0, MAX_ENV_SECONDS)))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = UpscoutConfig::default();
        assert_eq!(config.index.timeout, Duration::from_secs(12));
        assert_eq!(config.index.slow_threshold, Duration::from_secs(9));
        assert_eq!(config.index.mirrors.len(), DEFAULT_MIRRORS.len());
        assert_eq!(config.library.low_quality_cutoff, 720);
        assert_eq!(config.matching.similarity_threshold, 0.6);
        assert!(!config.verbose);
    }

    #[test]
    fn test_mirror_list_normalization() {
        let mirrors = IndexConfig::mirrors_from_list(
            " https://mirror.example/ , https://other.example/api/v2/,,",
        );
        assert_eq!(mirrors[0], "https://mirror.example/api/v2");
        assert_eq!(mirrors[1], "https://other.example/api/v2");
        assert_eq!(mirrors.len(), 2 + DEFAULT_MIRRORS.len());
    }

    #[test]
    fn test_mirror_list_deduplicates_defaults() {
        let mirrors = IndexConfig::mirrors_from_list("https://yts.mx");
        assert_eq!(mirrors[0], "https://yts.mx/api/v2");
        assert_eq!(mirrors.len(), DEFAULT_MIRRORS.len());
        assert_eq!(
            mirrors.iter().filter(|m| *m == "https://yts.mx/api/v2").count(),
            1
        );
    }

    #[test]
    fn test_invalid_mirror_is_dropped() {
        let mirrors = IndexConfig::mirrors_from_list("not a url, ftp://files.example");
        assert_eq!(mirrors.len(), DEFAULT_MIRRORS.len());
    }

    #[test]
    fn test_env_overrides() {
        let config = UpscoutConfig::from_lookup(lookup_from(&[
            ("YTS_API_BASE", "https://a.example"),
            ("UPSCOUT_TIMEOUT_SECS", "3.5"),
            ("UPSCOUT_MAX_RETRIES", "2"),
            ("UPSCOUT_MIRROR_ATTEMPTS", "0"),
            ("UPSCOUT_MATCH_THRESHOLD", "1.7"),
            ("UPSCOUT_VERBOSE", "Yes"),
        ]));

        assert_eq!(config.index.mirrors[0], "https://a.example/api/v2");
        assert_eq!(config.index.timeout, Duration::from_millis(3500));
        assert_eq!(config.index.max_retries, 2);
        assert_eq!(config.index.mirror_attempts, 1);
        assert_eq!(config.matching.similarity_threshold, 1.0);
        assert!(config.verbose);
    }

    #[test]
    fn test_unparseable_override_keeps_default() {
        let config = UpscoutConfig::from_lookup(lookup_from(&[("UPSCOUT_MAX_RETRIES", "lots")]));
        assert_eq!(config.index.max_retries, 6);

        let config = UpscoutConfig::from_lookup(lookup_from(&[("UPSCOUT_TIMEOUT_SECS", "inf")]));
        assert_eq!(config.index.timeout, Duration::from_secs(12));

        let config = UpscoutConfig::from_lookup(lookup_from(&[("UPSCOUT_MATCH_THRESHOLD", "NaN")]));
        assert_eq!(config.matching.similarity_threshold, 0.6);
    }

    #[test]
    fn test_timeout_has_a_floor() {
        let config = UpscoutConfig::from_lookup(lookup_from(&[("UPSCOUT_TIMEOUT_SECS", "0")]));
        assert_eq!(config.index.timeout, MIN_TIMEOUT);

        let mut index = IndexConfig::default();
        index.set_timeout(Duration::ZERO);
        assert_eq!(index.timeout, MIN_TIMEOUT);
        index.set_timeout(Duration::from_secs(30));
        assert_eq!(index.timeout, Duration::from_secs(30));
    }
}
