//! End-to-end `Truncate` scenarios (spec §8, §4.8): old shards are dropped
//! once the retained set would exceed the byte budget, the newest shard is
//! always kept even alone over budget, and survivors renumber back to a
//! contiguous `0..n` sequence.

use logshard_core::{Indexer, IndexerConfig, JsonCodec, RotationSize};

async fn seed_multiple_shards(indexer: &mut Indexer<JsonCodec>, rounds: usize) {
    for round in 0..rounds {
        for i in 0..50 {
            let payload = serde_json::json!({
                "id": format!("evt-{round}-{i}"),
                "msg": "x".repeat(512),
            });
            indexer.insert_one(payload).await.unwrap();
        }
        indexer.flush().await.unwrap();
    }
}

#[tokio::test]
async fn truncate_drops_old_shards_beyond_the_budget() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("log");
    let config = IndexerConfig::new(
        &base_path,
        "default",
        RotationSize::Bytes(logshard_core::config::MIN_ROTATION_SIZE),
    )
    .unwrap();
    let mut indexer = Indexer::init(config, JsonCodec).unwrap();
    indexer.open().unwrap();
    seed_multiple_shards(&mut indexer, 6).await;

    let before = logshard_core::shard_set::list_shards(&base_path, false).unwrap().len();
    assert!(before > 1, "test setup should have produced multiple shards");

    indexer.truncate(logshard_core::config::MIN_ROTATION_SIZE).await.unwrap();

    let after = logshard_core::shard_set::list_shards(&base_path, false).unwrap();
    assert!(after.len() < before, "truncate should have dropped at least one shard");
    assert!(!after.is_empty(), "truncate must always retain at least the newest shard");

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn truncate_renumbers_survivors_to_a_contiguous_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("log");
    let config = IndexerConfig::new(
        &base_path,
        "default",
        RotationSize::Bytes(logshard_core::config::MIN_ROTATION_SIZE),
    )
    .unwrap();
    let mut indexer = Indexer::init(config, JsonCodec).unwrap();
    indexer.open().unwrap();
    seed_multiple_shards(&mut indexer, 6).await;

    indexer.truncate(logshard_core::config::MIN_ROTATION_SIZE).await.unwrap();

    let names = logshard_core::shard_set::list_shards(&base_path, false).unwrap();
    assert_eq!(names.first().map(String::as_str), Some("log"));
    for (ordinal, name) in names.iter().enumerate() {
        let expected = logshard_core::shard_set::shard_dir_name("log", ordinal as u32);
        assert_eq!(*name, expected);
    }

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn truncate_with_a_tiny_budget_still_keeps_the_newest_shard() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("log");
    let config = IndexerConfig::new(&base_path, "default", RotationSize::Disabled).unwrap();
    let mut indexer = Indexer::init(config, JsonCodec).unwrap();
    indexer.open().unwrap();
    indexer.insert_one(serde_json::json!({"id": "only", "msg": "keep me"})).await.unwrap();
    indexer.flush().await.unwrap();

    indexer.truncate(1).await.unwrap();

    let names = logshard_core::shard_set::list_shards(&base_path, false).unwrap();
    assert_eq!(names.len(), 1);

    indexer.close().await.unwrap();
}
