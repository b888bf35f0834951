use pricewatch_core::checkpoint::Checkpoint;
use pricewatch_core::config::CrawlConfig;
use pricewatch_core::models::{ResultSet, ResultStatus};
use pricewatch_core::traits::CheckpointStore;

use crate::integration::common::{result, setup_state_dir, tasks};

#[tokio::test]
async fn test_empty_store_loads_nothing() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.checkpoint_store().await.unwrap();

    let snapshot = store.load().await.unwrap();
    assert_eq!(snapshot, Checkpoint::new());
}

#[tokio::test]
async fn test_save_merges_keys() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.checkpoint_store().await.unwrap();

    store
        .save(Checkpoint::new().with_task_list(tasks(3)).with_current_index(1))
        .await
        .unwrap();
    store
        .save(Checkpoint::new().with_current_index(2).with_running(true))
        .await
        .unwrap();

    let snapshot = store.load().await.unwrap();
    assert_eq!(snapshot.task_list.as_ref().map(Vec::len), Some(3));
    assert_eq!(snapshot.current_index, Some(2));
    assert_eq!(snapshot.is_running, Some(true));
    assert_eq!(snapshot.result_list, None);
}

#[tokio::test]
async fn test_survives_reopen() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.checkpoint_store().await.unwrap();

    let results = ResultSet::from(vec![
        result("sku-0", ResultStatus::Sent),
        result("sku-1", ResultStatus::Completed),
    ]);
    store
        .save(
            Checkpoint::new()
                .with_result_list(results.clone())
                .with_refetched_at(1_700_000_000_000)
                .with_config(CrawlConfig::default()),
        )
        .await
        .unwrap();
    drop(store);

    let reopened = dir.checkpoint_store().await.unwrap();
    let snapshot = reopened.load().await.unwrap();
    assert_eq!(snapshot.result_list, Some(results));
    assert_eq!(snapshot.refetched_at, Some(1_700_000_000_000));
    assert_eq!(snapshot.config, Some(CrawlConfig::default()));
}

#[tokio::test]
async fn test_file_uses_camel_case_keys() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.checkpoint_store().await.unwrap();
    store
        .save(Checkpoint::new().with_current_index(4).with_retry_count(1))
        .await
        .unwrap();

    let raw = tokio::fs::read_to_string(dir.path().join("checkpoint.json"))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["currentIndex"], 4);
    assert_eq!(json["retryCount"], 1);
    assert!(json.get("taskList").is_none());
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() {
    let (dir, _tmp) = setup_state_dir().await;
    tokio::fs::write(dir.path().join("checkpoint.json"), b"{not json")
        .await
        .unwrap();

    let err = dir.checkpoint_store().await.err().unwrap();
    assert!(err.to_string().contains("Corrupt state file"));
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.checkpoint_store().await.unwrap();
    store
        .save(Checkpoint::new().with_current_index(3))
        .await
        .unwrap();

    store.clear().await.unwrap();

    assert_eq!(store.load().await.unwrap(), Checkpoint::new());
    assert!(!dir.path().join("checkpoint.json").exists());
}
