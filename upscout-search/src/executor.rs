//! Resilient request execution across the mirror pool.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};
use upscout_core::IndexConfig;

use crate::errors::RequestFailure;
use crate::mirror_pool::MirrorPool;
use crate::retry::{AttemptOutcome, RetryMachine, RetryPolicy, RetryStep};
use crate::transport::{RawResponse, Transport, TransportError};

/// Longest body excerpt kept in a protocol failure message.
const SNIPPET_LEN: usize = 120;

/// Endpoint plus query parameters, independent of which mirror serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub endpoint: String,
    pub query: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }
}

/// Parsed JSON from the mirror that answered.
#[derive(Debug, Clone)]
pub struct ExecutedResponse {
    pub body: Value,
    pub mirror: String,
    pub attempts: u32,
}

/// Sends logical requests, retrying and rotating mirrors as needed.
///
/// The active mirror is remembered between requests.
#[derive(Debug)]
pub struct RequestExecutor {
    transport: Box<dyn Transport>,
    pool: MirrorPool,
    policy: RetryPolicy,
    slow_threshold: Duration,
}

impl RequestExecutor {
    pub fn new(transport: Box<dyn Transport>, config: &IndexConfig) -> Self {
        Self {
            transport,
            pool: MirrorPool::new(config.mirrors.clone()),
            policy: RetryPolicy::from_config(config),
            slow_threshold: config.slow_threshold,
        }
    }

    pub fn mirror_pool(&self) -> &MirrorPool {
        &self.pool
    }

    /// Executes a request until one mirror returns usable JSON.
    ///
    /// # Errors
    ///
    /// - `RequestFailure` - If the retry budget or the mirror list ran out
    pub async fn execute(&mut self, request: &RequestSpec) -> Result<ExecutedResponse, RequestFailure> {
        let mut machine = RetryMachine::new(self.policy, self.pool.len());

        loop {
            let mirror = self.pool.current().to_string();
            let url = format!("{mirror}/{}", request.endpoint.trim_start_matches('/'));
            debug!(
                "GET {} attempt {} (mirror {}/{})",
                url,
                machine.attempts() + 1,
                self.pool.active_index() + 1,
                self.pool.len()
            );

            let started = Instant::now();
            let reply = self.transport.get(&url, &request.query).await;
            let elapsed = started.elapsed();

            let (outcome, body) = interpret(reply);
            if is_slow_success(&outcome, elapsed, self.slow_threshold) {
                warn!("Slow response from {} ({:.1}s)", mirror, elapsed.as_secs_f64());
            }
            match machine.record(&outcome) {
                RetryStep::Succeeded => {
                    return Ok(ExecutedResponse {
                        // Success always carries a body
                        body: body.unwrap_or(Value::Null),
                        mirror,
                        attempts: machine.attempts(),
                    });
                }
                RetryStep::Backoff(delay) => {
                    debug!(
                        "{} on {}, retrying in {}ms",
                        describe(&outcome),
                        mirror,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryStep::Rotate => {
                    debug!("{} on {}, switching mirror", describe(&outcome), mirror);
                    self.pool.advance();
                }
                RetryStep::Exhausted(reason) => {
                    // Start the next request on a different mirror
                    self.pool.advance();
                    debug!("Giving up on {} after {} attempts: {}", url, machine.attempts(), reason);
                    return Err(RequestFailure {
                        reason,
                        attempts: machine.attempts(),
                        last_mirror: mirror,
                    });
                }
            }
        }
    }
}

/// Maps a transport result to an attempt outcome, parsing JSON on success.
fn interpret(reply: Result<RawResponse, TransportError>) -> (AttemptOutcome, Option<Value>) {
    let response = match reply {
        Ok(response) => response,
        Err(TransportError::Timeout) => return (AttemptOutcome::TimeoutFailure, None),
        Err(TransportError::Connect(detail) | TransportError::Request(detail)) => {
            return (AttemptOutcome::NetworkFailure(detail), None);
        }
    };

    match response.status {
        429 | 500..=599 => return (AttemptOutcome::ServerFailure(response.status), None),
        200..=299 => {}
        status => {
            return (
                AttemptOutcome::ProtocolFailure(format!("HTTP {status}")),
                None,
            );
        }
    }

    if !response.looks_like_json() {
        let snippet: String = response.body.trim().chars().take(SNIPPET_LEN).collect();
        return (
            AttemptOutcome::ProtocolFailure(format!(
                "expected JSON, got {} ({snippet})",
                response.content_type.as_deref().unwrap_or("no content type")
            )),
            None,
        );
    }

    match serde_json::from_str::<Value>(&response.body) {
        Ok(body) => (AttemptOutcome::Success, Some(body)),
        Err(error) => (
            AttemptOutcome::ProtocolFailure(format!("invalid JSON: {error}")),
            None,
        ),
    }
}

/// Only answers that arrived count as slow; failures are reported on their own.
fn is_slow_success(outcome: &AttemptOutcome, elapsed: Duration, threshold: Duration) -> bool {
    matches!(outcome, AttemptOutcome::Success) && elapsed >= threshold
}

fn describe(outcome: &AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Success => "success".to_string(),
        AttemptOutcome::NetworkFailure(detail) => format!("network failure ({detail})"),
        AttemptOutcome::TimeoutFailure => "timeout".to_string(),
        AttemptOutcome::ServerFailure(status) => format!("HTTP {status}"),
        AttemptOutcome::ProtocolFailure(detail) => format!("bad response ({detail})"),
    }
}
