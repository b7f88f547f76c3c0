//! Scripted transport for deterministic tests.
//!
//! Each mirror gets a queue of replies. A mirror with an empty queue keeps
//! repeating its fallback reply, which defaults to a connection failure.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{RawResponse, Transport, TransportError};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(RawResponse),
    Fail(TransportError),
}

impl ScriptedReply {
    pub fn json(body: impl Into<String>) -> Self {
        ScriptedReply::Respond(RawResponse::json(body))
    }

    pub fn status(status: u16) -> Self {
        ScriptedReply::Respond(RawResponse {
            status,
            content_type: Some("text/html".to_string()),
            body: format!("<html>{status}</html>"),
        })
    }

    pub fn html(body: impl Into<String>) -> Self {
        ScriptedReply::Respond(RawResponse {
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.into(),
        })
    }

    pub fn unreachable() -> Self {
        ScriptedReply::Fail(TransportError::Connect("name resolution failed".to_string()))
    }

    pub fn timeout() -> Self {
        ScriptedReply::Fail(TransportError::Timeout)
    }
}

/// A request as seen by the scripted transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
struct Script {
    queues: HashMap<String, VecDeque<ScriptedReply>>,
    fallbacks: HashMap<String, ScriptedReply>,
    requests: Vec<RecordedRequest>,
}

/// Transport answering from per-mirror scripts. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for requests under `mirror`.
    pub fn push(&self, mirror: &str, reply: ScriptedReply) -> &Self {
        let mut script = self.script.lock().unwrap();
        script
            .queues
            .entry(mirror.trim_end_matches('/').to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for `mirror` once its queue is drained.
    pub fn always(&self, mirror: &str, reply: ScriptedReply) -> &Self {
        let mut script = self.script.lock().unwrap();
        script
            .fallbacks
            .insert(mirror.trim_end_matches('/').to_string(), reply);
        self
    }

    /// Every request made so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    /// Number of requests sent to `mirror`.
    pub fn request_count(&self, mirror: &str) -> usize {
        let mirror = mirror.trim_end_matches('/');
        self.script
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|request| request.url.starts_with(mirror))
            .count()
    }

    fn next_reply(&self, url: &str, query: &[(String, String)]) -> ScriptedReply {
        let mut script = self.script.lock().unwrap();
        script.requests.push(RecordedRequest {
            url: url.to_string(),
            query: query.to_vec(),
        });

        // Longest matching prefix wins so nested mirror paths stay distinct
        let mirror = script
            .queues
            .keys()
            .chain(script.fallbacks.keys())
            .filter(|mirror| url.starts_with(mirror.as_str()))
            .max_by_key(|mirror| mirror.len())
            .cloned();

        let Some(mirror) = mirror else {
            return ScriptedReply::unreachable();
        };

        if let Some(reply) = script.queues.get_mut(&mirror).and_then(VecDeque::pop_front) {
            return reply;
        }
        script
            .fallbacks
            .get(&mirror)
            .cloned()
            .unwrap_or_else(ScriptedReply::unreachable)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<RawResponse, TransportError> {
        match self.next_reply(url, query) {
            ScriptedReply::Respond(response) => Ok(response),
            ScriptedReply::Fail(error) => Err(error),
        }
    }
}
