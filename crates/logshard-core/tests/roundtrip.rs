//! Property-based round-trip/idempotence check (spec §8): for any payload
//! `p`, `InsertOne(p); Flush(); wait` followed by a search for `p`'s id
//! returns exactly one hit, and that hit decodes back to the same fields
//! `p` was inserted with.

use logshard_core::{Indexer, IndexerConfig, JsonCodec, SearchEvent};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn any_payload() -> impl Strategy<Value = (String, String)> {
    ("[a-zA-Z0-9]{4,10}", "[a-zA-Z ]{1,24}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn insert_flush_find_round_trips_through_the_codec((id, msg) in any_payload()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let config = IndexerConfig { sync_submit: true, ..IndexerConfig::default() };
            let mut indexer = Indexer::init(config, JsonCodec).unwrap();
            indexer.open().unwrap();

            let payload = serde_json::json!({"id": id, "msg": msg});
            indexer.insert_one(payload.clone()).await.unwrap();
            indexer.flush().await.unwrap();

            let mut rx = indexer.find_many(&id, 0, 10, CancellationToken::new()).unwrap();
            let mut hits = Vec::new();
            while let Some(event) = rx.recv().await {
                if let SearchEvent::Hit(value) = event {
                    hits.push(value);
                }
            }

            assert_eq!(hits.len(), 1, "expected exactly one hit for a freshly inserted, uniquely-keyed document");
            assert_eq!(hits[0]["id"].as_str(), Some(id.as_str()));
            assert_eq!(hits[0]["msg"].as_str(), Some(msg.as_str()));

            indexer.close().await.unwrap();
        });
    }
}
