//! Mirror rotation as seen from whole enrichment runs.

use upscout_core::MovieRecord;
use upscout_search::transport::{ScriptedReply, ScriptedTransport};
use upscout_search::{FailureReason, SearchClient};

use crate::fixtures::*;

#[tokio::test]
async fn test_dead_first_mirror_is_left_behind() {
    let transport = ScriptedTransport::new();
    transport.always(MIRROR_A, ScriptedReply::unreachable());
    transport.always(MIRROR_B, listing(vec![matrix()]));
    let mut orchestrator = orchestrator(&transport, &[MIRROR_A, MIRROR_B]);

    let matrix = MovieRecord::new("The Matrix", Some(1999)).with_height(480);
    for _ in 0..3 {
        let record = orchestrator.enrich(&matrix).await;
        assert_eq!(record.enrichment.next_quality, "720p");
    }

    // Only the very first request paid for the dead mirror
    assert_eq!(transport.request_count(MIRROR_A), 1);
    assert_eq!(transport.request_count(MIRROR_B), 3);
    assert_eq!(orchestrator.client().mirror_pool().current(), MIRROR_B);
}

#[tokio::test]
async fn test_block_page_rotates_to_working_mirror() {
    let transport = ScriptedTransport::new();
    transport.always(MIRROR_A, ScriptedReply::html("<!DOCTYPE html><title>Just a moment...</title>"));
    transport.always(MIRROR_B, listing(vec![matrix()]));
    let mut client = SearchClient::with_transport(
        &index_config(&[MIRROR_A, MIRROR_B]),
        Box::new(transport.clone()),
    );

    let candidates = client.search_by_identifier("tt0133093").await.unwrap();
    assert_eq!(candidates[0].title, "The Matrix");
}

#[tokio::test]
async fn test_transient_errors_recover_on_same_mirror() {
    let transport = ScriptedTransport::new();
    transport
        .push(MIRROR_A, ScriptedReply::status(502))
        .push(MIRROR_A, ScriptedReply::timeout())
        .always(MIRROR_A, listing(vec![matrix()]));
    transport.always(MIRROR_B, listing(vec![]));
    let mut client = SearchClient::with_transport(
        &index_config(&[MIRROR_A, MIRROR_B]),
        Box::new(transport.clone()),
    );

    let candidates = client.search_by_title_year("The Matrix", Some(1999)).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(transport.request_count(MIRROR_A), 3);
    assert_eq!(transport.request_count(MIRROR_B), 0);
}

#[tokio::test]
async fn test_all_mirrors_down_fails_the_request() {
    let transport = ScriptedTransport::new();
    let mut client = SearchClient::with_transport(
        &index_config(&[MIRROR_A, MIRROR_B]),
        Box::new(transport.clone()),
    );

    let failure = client.search_by_identifier("tt0133093").await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::MirrorsExhausted);
    assert_eq!(failure.attempts, 2);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_retry_budget_spans_mirrors() {
    let transport = ScriptedTransport::new();
    transport.always(MIRROR_A, ScriptedReply::timeout());
    transport.always(MIRROR_B, ScriptedReply::timeout());
    let mut config = index_config(&[MIRROR_A, MIRROR_B]);
    config.max_retries = 3;
    config.mirror_attempts = 2;
    let mut client = SearchClient::with_transport(&config, Box::new(transport.clone()));

    let failure = client.search_by_title_year("Heat", Some(1995)).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::Timeout);
    assert_eq!(failure.attempts, 4);
    assert_eq!(transport.request_count(MIRROR_A), 2);
    assert_eq!(transport.request_count(MIRROR_B), 2);
}
