//! Ordered set of interchangeable index mirrors with a sticky active entry.

use upscout_core::config::DEFAULT_MIRRORS;

/// Mirrors in priority order plus the one currently in use.
///
/// The active mirror survives across requests so a dead mirror is not
/// retried first for every record.
#[derive(Debug, Clone)]
pub struct MirrorPool {
    mirrors: Vec<String>,
    active: usize,
}

impl MirrorPool {
    /// Creates a pool starting at the first mirror.
    ///
    /// An empty list falls back to the built-in mirrors so the pool is never
    /// empty.
    pub fn new(mirrors: Vec<String>) -> Self {
        let mirrors: Vec<String> = mirrors
            .into_iter()
            .map(|mirror| mirror.trim_end_matches('/').to_string())
            .filter(|mirror| !mirror.is_empty())
            .collect();

        let mirrors = if mirrors.is_empty() {
            DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect()
        } else {
            mirrors
        };

        Self { mirrors, active: 0 }
    }

    /// Base URL of the active mirror.
    pub fn current(&self) -> &str {
        &self.mirrors[self.active]
    }

    /// Moves to the next mirror.
    ///
    /// Returns `false` when this wrapped around to the first mirror.
    pub fn advance(&mut self) -> bool {
        self.active = (self.active + 1) % self.mirrors.len();
        self.active != 0
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }
}
