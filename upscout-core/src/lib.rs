//! Upscout Core - configuration, logging and library records
//!
//! Shared foundation for the enrichment engine and the CLI: the tunable
//! settings, tracing setup, and the library CSV codec that feeds records in
//! and writes enriched rows back out.

pub mod config;
pub mod library;
pub mod tracing_setup;

pub use config::{IndexConfig, LibraryConfig, MatchingConfig, UpscoutConfig};
pub use library::{
    DecodeError, ENRICHMENT_COLUMNS, EnrichedRecord, EnrichedWriter, Enrichment, LibraryReader,
    LibraryRow, MovieRecord,
};

/// Core errors that can bubble up from configuration or library I/O.
#[derive(Debug, thiserror::Error)]
pub enum UpscoutError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Library decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl UpscoutError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            UpscoutError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            UpscoutError::Io(e) => format!("File system error: {e}"),
            UpscoutError::Csv(_) => "Could not read or write CSV data".to_string(),
            UpscoutError::Decode(e) => format!("Library file is not usable: {e}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, UpscoutError>;
