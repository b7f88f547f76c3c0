//! HTTP transport abstraction for index requests.
//!
//! The executor only needs "GET this URL with this query". Keeping that behind
//! a trait lets tests script mirror behavior without a network.

pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod simulated;

use async_trait::async_trait;
pub use http::HttpTransport;
#[cfg(any(test, feature = "test-utils"))]
pub use simulated::{ScriptedReply, ScriptedTransport};
use thiserror::Error;

/// Response as received, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    /// Successful JSON response.
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    /// Whether the body claims or looks like JSON.
    ///
    /// Some mirrors send JSON with a text content type, so a body starting
    /// with `{` is accepted too.
    pub fn looks_like_json(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
        declared || self.body.trim_start().starts_with('{')
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Host could not be resolved or reached
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    /// Connection dropped or the body could not be read
    #[error("request failed: {0}")]
    Request(String),
}

/// Sends GET requests to index mirrors.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Performs one GET request, with no retries of its own.
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<RawResponse, TransportError>;
}
