//! Error types for release index lookups.

use std::fmt;

use thiserror::Error;
use upscout_core::UpscoutError;

/// Why a logical request gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Every reachable mirror refused the connection or could not be resolved
    MirrorsExhausted,
    /// Requests kept timing out or hitting transient server errors
    Timeout,
    /// Mirrors answered with something other than the expected data
    Unparseable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MirrorsExhausted => write!(f, "mirrors exhausted"),
            FailureReason::Timeout => write!(f, "timed out"),
            FailureReason::Unparseable => write!(f, "unparseable response"),
        }
    }
}

/// Terminal failure of one logical request, after retries and rotation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Request failed ({reason}) after {attempts} attempts, last mirror {last_mirror}")]
pub struct RequestFailure {
    pub reason: FailureReason,
    pub attempts: u32,
    pub last_mirror: String,
}

/// Errors that can occur while searching and enriching.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A lookup against the release index failed terminally.
    #[error(transparent)]
    Request(#[from] RequestFailure),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Reading the library or writing results failed.
    #[error(transparent)]
    Library(#[from] UpscoutError),
}

impl SearchError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Request(failure) => match failure.reason {
                FailureReason::MirrorsExhausted => {
                    "No release index mirror could be reached. Check your connection or set YTS_API_BASE.".to_string()
                }
                FailureReason::Timeout => {
                    "The release index is not responding. Try again later or raise --timeout.".to_string()
                }
                FailureReason::Unparseable => {
                    "The release index returned data that could not be read.".to_string()
                }
            },
            SearchError::HttpClient(_) => "Could not initialize the HTTP client".to_string(),
            SearchError::Library(e) => e.user_message(),
        }
    }
}
