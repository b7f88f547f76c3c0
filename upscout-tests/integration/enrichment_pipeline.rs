//! End-to-end enrichment runs over library files.

use std::fs;

use upscout_search::transport::{ScriptedReply, ScriptedTransport};

use crate::fixtures::*;

const LIBRARY: &str = "title,year,max_height,imdb_id,tmdb_id,notes\n\
                       Matrix,1999,480,tt0133093,603,keep\n\
                       Old Film,1950,480,,,\n\
                       Heat,1995,1080,tt0113277,,already fine\n\
                       ,2001,480,,,no title\n\
                       Paddington,2014,576,,,\n";

fn scripted_index() -> ScriptedTransport {
    let transport = ScriptedTransport::new();
    transport
        // Matrix by identifier
        .push(MIRROR_A, listing(vec![matrix()]))
        // Old Film by title, only a 480p release
        .push(
            MIRROR_A,
            listing(vec![movie("Old Film", 1950, "tt0040000", vec![torrent("480p", "web", "OLD480")])]),
        )
        // Paddington by title, no plausible candidate
        .push(MIRROR_A, listing(vec![movie("Gone Girl", 2014, "tt2267998", vec![])]));
    transport
}

#[tokio::test]
async fn test_library_is_enriched_row_by_row() {
    let library = Library::new(LIBRARY);
    let output = library.output("upgrades.csv");
    let transport = scripted_index();
    let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);

    let summary = run_files(
        &mut orchestrator,
        &library.input,
        &output,
        options(false),
        std::future::pending(),
    )
    .await;

    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.rows_written, 5);
    assert_eq!(summary.decode_skipped, 0);
    assert_eq!(summary.untitled, 1);
    assert_eq!(summary.passed_through, 1);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.upgraded, 1);
    assert_eq!(summary.no_match, 1);
    assert_eq!(summary.failed, 0);

    let rows = read_rows(&output);
    assert_eq!(
        rows[0],
        vec![
            "title", "year", "max_height", "imdb_id", "tmdb_id", "notes", "matched_title",
            "matched_year", "matched_url", "qualities_available", "next_quality", "magnet",
        ]
    );
    assert_eq!(rows.len(), 6);

    // Input columns pass through untouched
    assert_eq!(&rows[1][..6], &["Matrix", "1999", "480", "tt0133093", "603", "keep"]);
    assert_eq!(cell(&rows, 1, "matched_title"), "The Matrix");
    assert_eq!(cell(&rows, 1, "matched_year"), "1999");
    assert_eq!(cell(&rows, 1, "matched_url"), "https://index.example/movies/the-matrix-1999");
    assert_eq!(cell(&rows, 1, "qualities_available"), "720p|1080p|2160p");
    assert_eq!(cell(&rows, 1, "next_quality"), "720p");
    assert_eq!(
        cell(&rows, 1, "magnet"),
        "magnet:?xt=urn:btih:MATRIX720&dn=The%20Matrix.720p.bluray"
    );

    assert_eq!(cell(&rows, 2, "matched_title"), "Old Film");
    assert_eq!(cell(&rows, 2, "qualities_available"), "480p");
    assert_eq!(cell(&rows, 2, "next_quality"), "");
    assert_eq!(cell(&rows, 2, "magnet"), "");

    assert_eq!(cell(&rows, 3, "title"), "Heat");
    assert_eq!(cell(&rows, 3, "notes"), "already fine");
    assert_eq!(cell(&rows, 3, "matched_title"), "");

    // No title to search by, but the row and its notes survive
    assert_eq!(&rows[4][..6], &["", "2001", "480", "", "", "no title"]);
    assert!(rows[4][6..].iter().all(|value| value.is_empty()));

    assert_eq!(cell(&rows, 5, "title"), "Paddington");
    assert_eq!(cell(&rows, 5, "matched_title"), "");

    let queries: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.param("query_term").unwrap_or_default().to_string())
        .collect();
    assert_eq!(queries, vec!["tt0133093", "old film 1950", "paddington 2014"]);
}

#[tokio::test]
async fn test_rerun_is_deterministic() {
    let library = Library::new(LIBRARY);
    let first = library.output("first.csv");
    let second = library.output("second.csv");

    for output in [&first, &second] {
        let transport = scripted_index();
        let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);
        run_files(&mut orchestrator, &library.input, output, options(false), std::future::pending()).await;
    }

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[tokio::test]
async fn test_enriched_output_is_not_looked_up_again() {
    let library = Library::new(LIBRARY);
    let first = library.output("first.csv");
    let second = library.output("second.csv");

    let transport = scripted_index();
    let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);
    run_files(&mut orchestrator, &library.input, &first, options(false), std::future::pending()).await;
    let requests_after_first = transport.requests().len();

    // Feeding the output back in only looks up rows that were not resolved
    transport.always(MIRROR_A, empty_listing());
    let summary = run_files(&mut orchestrator, &first, &second, options(false), std::future::pending()).await;

    assert_eq!(summary.already_enriched, 2);
    assert_eq!(transport.requests().len(), requests_after_first + 1);
    assert_eq!(read_rows(&first), read_rows(&second));
}

#[tokio::test]
async fn test_refresh_looks_up_enriched_rows() {
    let library = Library::new(
        "title,year,max_height,imdb_id,matched_title,next_quality\n\
         Matrix,1999,480,tt0133093,Stale,480p\n",
    );
    let output = library.output("refreshed.csv");
    let transport = ScriptedTransport::new();
    transport.always(MIRROR_A, listing(vec![matrix()]));
    let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);

    let summary = run_files(&mut orchestrator, &library.input, &output, options(true), std::future::pending()).await;
    assert_eq!(summary.already_enriched, 0);
    assert_eq!(summary.upgraded, 1);

    let rows = read_rows(&output);
    assert_eq!(rows[0].len(), 10);
    assert_eq!(cell(&rows, 1, "matched_title"), "The Matrix");
    assert_eq!(cell(&rows, 1, "next_quality"), "720p");
}

#[tokio::test]
async fn test_failed_record_does_not_stop_the_run() {
    let library = Library::new("title,year,max_height\nHeat,1995,480\nThe Matrix,1999,480\n");
    let output = library.output("upgrades.csv");
    let transport = ScriptedTransport::new();
    transport
        .push(MIRROR_A, ScriptedReply::html("<html>Attention Required</html>"))
        .always(MIRROR_A, listing(vec![matrix()]));
    let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);

    let summary = run_files(&mut orchestrator, &library.input, &output, options(false), std::future::pending()).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.upgraded, 1);

    let rows = read_rows(&output);
    assert_eq!(rows.len(), 3);
    assert_eq!(cell(&rows, 1, "matched_title"), "");
    assert_eq!(cell(&rows, 2, "matched_title"), "The Matrix");
}

#[tokio::test]
async fn test_interrupt_keeps_finished_rows() {
    let library = Library::new("title,year,max_height\nThe Matrix,1999,480\nHeat,1995,480\nAlien,1979,480\n");
    let output = library.output("upgrades.csv");
    let transport = ScriptedTransport::new();
    transport.always(MIRROR_A, listing(vec![matrix()]));
    let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);

    // Fires once the first lookup has gone out
    let watcher = transport.clone();
    let shutdown = async move {
        while watcher.requests().is_empty() {
            tokio::task::yield_now().await;
        }
    };

    let summary = run_files(&mut orchestrator, &library.input, &output, options(false), shutdown).await;
    assert!(summary.interrupted);
    assert_eq!(summary.rows_written, 1);

    let rows = read_rows(&output);
    assert_eq!(rows.len(), 2);
    assert_eq!(cell(&rows, 1, "matched_title"), "The Matrix");
}

#[tokio::test]
async fn test_nul_bytes_in_library_are_ignored() {
    let library = Library::new("title,year,max_height\nThe Mat\0rix,1999,480\n");
    let output = library.output("upgrades.csv");
    let transport = ScriptedTransport::new();
    transport.always(MIRROR_A, listing(vec![matrix()]));
    let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);

    run_files(&mut orchestrator, &library.input, &output, options(false), std::future::pending()).await;
    let rows = read_rows(&output);
    assert_eq!(cell(&rows, 1, "title"), "The Matrix");
    assert_eq!(cell(&rows, 1, "next_quality"), "720p");
}
