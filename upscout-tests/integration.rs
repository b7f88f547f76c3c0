//! Integration tests for Upscout
//!
//! Exercise the library reader, the enrichment engine and the writer together,
//! with index mirrors scripted in memory and files in temporary directories.

#[path = "integration/fixtures.rs"]
mod fixtures;

#[path = "integration/enrichment_pipeline.rs"]
mod enrichment_pipeline;
#[path = "integration/mirror_failover.rs"]
mod mirror_failover;
#[path = "integration/row_invariants.rs"]
mod row_invariants;
