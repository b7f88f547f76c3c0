//! Output rows always mirror input rows, whatever the index answers.

use proptest::prelude::*;
use upscout_core::{EnrichedWriter, LibraryReader};
use upscout_search::transport::{ScriptedReply, ScriptedTransport};

use crate::fixtures::*;

#[derive(Debug, Clone)]
struct Row {
    title: String,
    year: u16,
    height: u32,
}

fn row_strategy() -> impl Strategy<Value = Row> {
    (
        // Blank titles included: they are written through like any other row
        "([A-Za-z][A-Za-z0-9]{0,10}( [A-Za-z0-9]{1,8}){0,2})?",
        1920u16..2030,
        prop_oneof![Just(0u32), Just(480), Just(576), Just(720), Just(1080), Just(2160)],
    )
        .prop_map(|(title, year, height)| Row { title, year, height })
}

fn reply_strategy() -> impl Strategy<Value = ScriptedReply> {
    prop_oneof![
        Just(empty_listing()),
        Just(listing(vec![matrix()])),
        Just(ScriptedReply::html("<html></html>")),
        Just(ScriptedReply::timeout()),
        Just(ScriptedReply::unreachable()),
    ]
}

fn enrich_rows(rows: &[Row], replies: Vec<ScriptedReply>) -> Vec<Vec<String>> {
    let mut input = String::from("title,year,max_height\n");
    for row in rows {
        input.push_str(&format!("{},{},{}\n", row.title, row.year, row.height));
    }

    let transport = ScriptedTransport::new();
    for reply in replies {
        transport.push(MIRROR_A, reply);
    }
    transport.always(MIRROR_A, empty_listing());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let output = runtime.block_on(async {
        let mut orchestrator = orchestrator(&transport, &[MIRROR_A]);
        let reader = LibraryReader::new(input.as_bytes()).unwrap();
        let mut writer = EnrichedWriter::new(Vec::new(), reader.header()).unwrap();
        orchestrator
            .run(reader, &mut writer, options(false), std::future::pending())
            .await
            .unwrap();
        writer.into_inner().unwrap()
    });

    LibraryReader::new(output.as_slice())
        .unwrap()
        .map(|row| row.unwrap().cells)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_output_rows_match_input_rows(
        rows in proptest::collection::vec(row_strategy(), 0..12),
        replies in proptest::collection::vec(reply_strategy(), 0..8),
    ) {
        let output = enrich_rows(&rows, replies);

        prop_assert_eq!(output.len(), rows.len());
        for (written, original) in output.iter().zip(&rows) {
            prop_assert_eq!(&written[0], &original.title);
            prop_assert_eq!(&written[1], &original.year.to_string());
            prop_assert_eq!(&written[2], &original.height.to_string());
            prop_assert_eq!(written.len(), 9);

            // Rows already good enough, or without a title, are never enriched
            if original.height >= 720 || original.title.is_empty() {
                prop_assert!(written[3..].iter().all(|value| value.is_empty()));
            }
        }
    }
}
