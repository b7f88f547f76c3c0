//! Library records and their CSV representation.
//!
//! The library export is the source of truth: a `MovieRecord` is read once and
//! never modified. Enrichment travels next to it and is written back as a
//! fixed set of additive columns.

pub mod reader;
pub mod writer;

pub use reader::{LibraryReader, LibraryRow, SanitizedRead};
pub use writer::{EnrichedWriter, SyncedFile};

/// Enrichment columns appended to the library header, in output order.
pub const ENRICHMENT_COLUMNS: [&str; 6] = [
    "matched_title",
    "matched_year",
    "matched_url",
    "qualities_available",
    "next_quality",
    "magnet",
];

/// One title from the media library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub title: String,
    pub year: Option<u16>,
    /// Vertical resolution of the best local file, 0 when unknown
    pub current_max_height: u32,
    /// IMDb-style identifier
    pub external_id_primary: Option<String>,
    pub external_id_secondary: Option<String>,
}

impl MovieRecord {
    /// Creates a record with only title and year known.
    pub fn new(title: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            title: title.into(),
            year,
            current_max_height: 0,
            external_id_primary: None,
            external_id_secondary: None,
        }
    }

    /// Sets the current vertical resolution.
    pub fn with_height(mut self, height: u32) -> Self {
        self.current_max_height = height;
        self
    }

    /// Sets the primary external identifier.
    pub fn with_primary_id(mut self, id: impl Into<String>) -> Self {
        self.external_id_primary = Some(id.into());
        self
    }

    /// Sets the secondary external identifier.
    pub fn with_secondary_id(mut self, id: impl Into<String>) -> Self {
        self.external_id_secondary = Some(id.into());
        self
    }

    /// Returns false for rows that carry nothing to search by title.
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Returns true when the record is strictly below the quality cutoff.
    ///
    /// Unknown resolution counts as low quality.
    pub fn is_low_quality(&self, cutoff: u32) -> bool {
        self.current_max_height < cutoff
    }
}

/// Enrichment fields in their serialized column form.
///
/// Empty strings mean "absent": no match, no upgrade, or a failed lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub matched_title: String,
    pub matched_year: String,
    pub matched_url: String,
    pub qualities_available: String,
    pub next_quality: String,
    pub magnet: String,
}

impl Enrichment {
    /// Returns true when no enrichment column carries a value.
    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|value| value.is_empty())
    }

    /// Returns true when a previous run already resolved this row.
    pub fn is_resolved(&self) -> bool {
        !self.matched_title.is_empty() || !self.next_quality.is_empty() || !self.magnet.is_empty()
    }

    /// Column values in `ENRICHMENT_COLUMNS` order.
    pub fn values(&self) -> [&str; 6] {
        [
            self.matched_title.as_str(),
            self.matched_year.as_str(),
            self.matched_url.as_str(),
            self.qualities_available.as_str(),
            self.next_quality.as_str(),
            self.magnet.as_str(),
        ]
    }

    /// Value of a single enrichment column by position.
    pub(crate) fn value_at(&self, index: usize) -> &str {
        self.values()[index]
    }

    pub(crate) fn set_at(&mut self, index: usize, value: String) {
        match index {
            0 => self.matched_title = value,
            1 => self.matched_year = value,
            2 => self.matched_url = value,
            3 => self.qualities_available = value,
            4 => self.next_quality = value,
            _ => self.magnet = value,
        }
    }
}

/// A library record together with the enrichment produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub movie: MovieRecord,
    pub enrichment: Enrichment,
}

impl EnrichedRecord {
    /// Record with every enrichment field left empty.
    pub fn unenriched(movie: MovieRecord) -> Self {
        Self {
            movie,
            enrichment: Enrichment::default(),
        }
    }
}

/// Per-row failures while decoding the library export.
///
/// These never abort a run: the row is skipped and logged.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed row at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("Missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Read failed at line {line}: {reason}")]
    Read { line: u64, reason: String },
}
