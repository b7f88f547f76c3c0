//! Upscout Search - release index lookups and upgrade decisions
//!
//! Queries a mirrored movie release index, decides which listing is the same
//! movie as a library record, and works out the next quality step worth
//! fetching. Requests go through a retrying executor that rotates across
//! mirrors when one stops answering.

pub mod client;
pub mod enrichment;
pub mod errors;
pub mod executor;
pub mod matcher;
pub mod mirror_pool;
pub mod payload;
pub mod quality;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::{SearchClient, magnet_uri, title_query, usable_identifier};
pub use enrichment::{EnrichmentOrchestrator, RecordOutcome, RunOptions, RunSummary};
pub use errors::{FailureReason, RequestFailure, SearchError};
pub use executor::{ExecutedResponse, RequestExecutor, RequestSpec};
pub use matcher::{Matcher, fold_title, title_similarity};
pub use mirror_pool::MirrorPool;
pub use quality::{QualityEvaluator, serialize_qualities};
pub use retry::{AttemptOutcome, Backoff, RetryMachine, RetryPolicy, RetryState, RetryStep};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};
pub use types::{
    CandidateRecord, CandidateSet, Lookup, MatchBasis, MatchResult, QualityTier, ReleaseTorrent,
    Upgrade,
};

pub type Result<T> = std::result::Result<T, SearchError>;
