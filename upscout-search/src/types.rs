//! Data types for release index results and match decisions.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Ordered resolution ladder used for upgrade decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum QualityTier {
    /// Anything below 720 lines
    Sd,
    Hd720,
    FullHd1080,
    Qhd1440,
    Uhd2160,
}

impl QualityTier {
    /// Tier implied by a vertical resolution.
    pub fn from_height(height: u32) -> Self {
        match height {
            h if h >= 2160 => QualityTier::Uhd2160,
            h if h >= 1440 => QualityTier::Qhd1440,
            h if h >= 1080 => QualityTier::FullHd1080,
            h if h >= 720 => QualityTier::Hd720,
            _ => QualityTier::Sd,
        }
    }

    /// Tier named by an index quality label such as `1080p` or `4K`.
    ///
    /// Labels that are not resolutions (`3D`) have no tier.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "4k" | "uhd" => return Some(QualityTier::Uhd2160),
            "sd" => return Some(QualityTier::Sd),
            _ => {}
        }
        label
            .strip_suffix('p')
            .and_then(|lines| lines.parse::<u32>().ok())
            .map(Self::from_height)
    }
}

/// Single downloadable release listed for a candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseTorrent {
    pub quality: String,
    /// Release type, e.g. `bluray` or `web`
    pub kind: String,
    pub hash: String,
    pub size: Option<String>,
    pub seeds: Option<u32>,
    pub peers: Option<u32>,
}

impl ReleaseTorrent {
    fn is_bluray(&self) -> bool {
        self.kind.eq_ignore_ascii_case("bluray")
    }
}

/// One movie as listed by the release index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    /// Index-internal movie id
    pub index_id: Option<u64>,
    pub title: String,
    pub year: Option<u16>,
    pub url: String,
    pub imdb_code: Option<String>,
    pub rating: Option<f32>,
    pub available_qualities: BTreeSet<String>,
    /// Preferred release hash per quality label
    pub torrent_hashes: BTreeMap<String, String>,
    pub torrents: Vec<ReleaseTorrent>,
}

impl CandidateRecord {
    pub fn new(title: impl Into<String>, year: Option<u16>, url: impl Into<String>) -> Self {
        Self {
            index_id: None,
            title: title.into(),
            year,
            url: url.into(),
            imdb_code: None,
            rating: None,
            available_qualities: BTreeSet::new(),
            torrent_hashes: BTreeMap::new(),
            torrents: Vec::new(),
        }
    }

    pub fn with_imdb_code(mut self, imdb_code: impl Into<String>) -> Self {
        self.imdb_code = Some(imdb_code.into());
        self
    }

    /// Adds a release and refreshes the per-quality hash selection.
    pub fn with_torrent(
        mut self,
        quality: impl Into<String>,
        kind: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        self.push_torrent(ReleaseTorrent {
            quality: quality.into(),
            kind: kind.into(),
            hash: hash.into(),
            size: None,
            seeds: None,
            peers: None,
        });
        self
    }

    /// Adds a release. Blu-ray releases win the hash slot for their quality.
    pub fn push_torrent(&mut self, torrent: ReleaseTorrent) {
        let quality = torrent.quality.trim().to_string();
        if quality.is_empty() {
            return;
        }
        self.available_qualities.insert(quality.clone());

        if !torrent.hash.trim().is_empty() {
            let replace = match self.preferred_torrent(&quality) {
                Some(current) => torrent.is_bluray() && !current.is_bluray(),
                None => true,
            };
            if replace {
                self.torrent_hashes
                    .insert(quality, torrent.hash.trim().to_string());
            }
        }
        self.torrents.push(torrent);
    }

    /// Release whose hash is selected for a quality label.
    pub fn preferred_torrent(&self, quality: &str) -> Option<&ReleaseTorrent> {
        let hash = self.torrent_hashes.get(quality)?;
        self.torrents
            .iter()
            .find(|torrent| torrent.quality.trim() == quality && torrent.hash.trim() == hash)
    }

    /// Distinct quality labels in ladder order, unknown labels last.
    pub fn qualities_by_tier(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.available_qualities.iter().map(String::as_str).collect();
        labels.sort_by_key(|label| (QualityTier::from_label(label).is_none(), QualityTier::from_label(label)));
        labels
    }
}

/// How a set of candidates was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Exact lookup by an external identifier
    Identifier(String),
    /// Free-text lookup by title and optional year
    TitleYear,
}

/// Candidates together with the lookup that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    pub lookup: Lookup,
    pub candidates: Vec<CandidateRecord>,
}

impl CandidateSet {
    pub fn by_identifier(identifier: impl Into<String>, candidates: Vec<CandidateRecord>) -> Self {
        Self {
            lookup: Lookup::Identifier(identifier.into()),
            candidates,
        }
    }

    pub fn by_title_year(candidates: Vec<CandidateRecord>) -> Self {
        Self {
            lookup: Lookup::TitleYear,
            candidates,
        }
    }
}

/// Basis on which a candidate was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchBasis {
    IdentifierExact,
    FuzzyTitleYear,
}

/// Outcome of matching a library record against candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    NoMatch,
    Matched {
        candidate: CandidateRecord,
        match_basis: MatchBasis,
        /// Similarity score, only meaningful for fuzzy matches
        score: f64,
    },
}

impl MatchResult {
    pub fn candidate(&self) -> Option<&CandidateRecord> {
        match self {
            MatchResult::NoMatch => None,
            MatchResult::Matched { candidate, .. } => Some(candidate),
        }
    }
}

/// Suggested replacement for a low-quality library title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upgrade {
    pub next_quality: Option<String>,
    pub magnet: Option<String>,
}

impl Upgrade {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.next_quality.is_some()
    }
}
