use pricewatch_core::bootstrap::restore;
use pricewatch_core::checkpoint::Checkpoint;
use pricewatch_core::config::CrawlConfig;
use pricewatch_core::models::{ResultSet, ResultStatus};
use pricewatch_core::schedule::{ScheduleEntry, ScheduleStore, TokioWakeScheduler, WakeKind, WakeName};
use pricewatch_core::session::SessionId;
use pricewatch_core::traits::CheckpointStore;

use crate::integration::common::{result, setup_state_dir, tasks};

#[tokio::test]
async fn test_restart_keeps_only_acknowledged_results() {
    let (dir, _tmp) = setup_state_dir().await;
    let previous = SessionId::from("1700000000000_zzzzzzz");
    {
        let store = dir.checkpoint_store().await.unwrap();
        store
            .save(
                Checkpoint::new()
                    .with_task_list(tasks(5))
                    .with_current_index(4)
                    .with_running(true)
                    .with_session_id(previous.clone())
                    .with_result_list(ResultSet::from(vec![
                        result("sku-0", ResultStatus::Sent),
                        result("sku-1", ResultStatus::Sent),
                        result("sku-2", ResultStatus::Completed),
                        result("sku-3", ResultStatus::Completed),
                    ])),
            )
            .await
            .unwrap();
        let schedules = dir.schedule_store().await.unwrap();
        schedules
            .put(ScheduleEntry {
                name: WakeName::new(&previous, WakeKind::Next).to_string(),
                fire_at: 0,
            })
            .await
            .unwrap();
    }

    let store = dir.checkpoint_store().await.unwrap();
    let (scheduler, _fired) = TokioWakeScheduler::new(dir.schedule_store().await.unwrap());
    let restored = restore(&store, &scheduler, CrawlConfig::default()).await.unwrap();

    assert!(restored.is_new_session);
    assert_ne!(restored.session, previous);
    assert_eq!(restored.current_index, 2);
    assert_eq!(restored.results.len(), 2);
    assert_eq!(restored.tasks.len(), 5);
    assert_eq!(restored.stale_wakeups, 1);

    let reopened = dir.checkpoint_store().await.unwrap();
    let snapshot = reopened.load().await.unwrap();
    assert_eq!(snapshot.current_index, Some(2));
    assert_eq!(snapshot.is_running, Some(false));
    assert_eq!(snapshot.session_id, Some(restored.session));
}
