//! End-to-end rotation scenarios (spec §8): the active shard rotates once
//! it outgrows its configured byte budget, and search keeps finding
//! documents from every shard afterward.

use logshard_core::{Indexer, IndexerConfig, JsonCodec, RotationSize, SearchEvent};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn active_shard_rotates_past_the_minimum_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexerConfig::new(
        dir.path().join("log"),
        "default",
        RotationSize::Bytes(logshard_core::config::MIN_ROTATION_SIZE),
    )
    .unwrap();
    let mut indexer = Indexer::init(config, JsonCodec).unwrap();
    indexer.open().unwrap();

    for i in 0..200 {
        let payload = serde_json::json!({
            "id": format!("evt-{i}"),
            "msg": "a".repeat(512),
        });
        indexer.insert_one(payload).await.unwrap();
        if i % 20 == 0 {
            indexer.flush().await.unwrap();
        }
    }
    indexer.flush().await.unwrap();

    let shard_count = logshard_core::shard_set::list_shards(&dir.path().join("log"), false)
        .unwrap()
        .len();
    assert!(shard_count > 1, "expected rotation to have produced more than one shard");

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn search_finds_documents_across_rotated_shards() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexerConfig::new(
        dir.path().join("log"),
        "default",
        RotationSize::Bytes(logshard_core::config::MIN_ROTATION_SIZE),
    )
    .unwrap();
    let mut indexer = Indexer::init(config, JsonCodec).unwrap();
    indexer.open().unwrap();

    for i in 0..200 {
        let payload = serde_json::json!({
            "id": format!("evt-{i}"),
            "msg": format!("entry {i} {}", "padding".repeat(64)),
        });
        indexer.insert_one(payload).await.unwrap();
        if i % 20 == 0 {
            indexer.flush().await.unwrap();
        }
    }
    indexer.flush().await.unwrap();

    let mut hits = indexer.find_many("entry", 0, 500, CancellationToken::new()).unwrap();
    let mut count = 0;
    while let Some(event) = hits.recv().await {
        if matches!(event, SearchEvent::Hit(_)) {
            count += 1;
        }
    }
    assert_eq!(count, 200, "every inserted document should be found across all shards");

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn disabled_rotation_keeps_a_single_shard() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexerConfig::new(dir.path().join("log"), "default", RotationSize::Disabled).unwrap();
    let mut indexer = Indexer::init(config, JsonCodec).unwrap();
    indexer.open().unwrap();

    for i in 0..200 {
        let payload = serde_json::json!({"id": format!("evt-{i}"), "msg": "a".repeat(512)});
        indexer.insert_one(payload).await.unwrap();
    }
    indexer.flush().await.unwrap();

    let shard_count = logshard_core::shard_set::list_shards(&dir.path().join("log"), false)
        .unwrap()
        .len();
    assert_eq!(shard_count, 1);

    indexer.close().await.unwrap();
}
