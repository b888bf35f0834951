use std::time::Duration;

use pricewatch_core::models::now_ms;
use pricewatch_core::schedule::{ScheduleEntry, ScheduleStore, TokioWakeScheduler, WakeKind, WakeName, WakeScheduler};
use pricewatch_core::session::SessionId;

use crate::integration::common::setup_state_dir;

#[tokio::test]
async fn test_put_replaces_same_name() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.schedule_store().await.unwrap();

    store
        .put(ScheduleEntry { name: "a:crawler:next".into(), fire_at: 10 })
        .await
        .unwrap();
    store
        .put(ScheduleEntry { name: "a:crawler:next".into(), fire_at: 20 })
        .await
        .unwrap();
    store
        .put(ScheduleEntry { name: "a:crawler:retry".into(), fire_at: 30 })
        .await
        .unwrap();

    let entries = store.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.contains(&ScheduleEntry { name: "a:crawler:next".into(), fire_at: 20 }));
}

#[tokio::test]
async fn test_remove_and_clear_persist() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.schedule_store().await.unwrap();
    for name in ["a:crawler:next", "a:crawler:retry", "b:crawler:next"] {
        store
            .put(ScheduleEntry { name: name.into(), fire_at: 1 })
            .await
            .unwrap();
    }

    store.remove("a:crawler:retry").await.unwrap();
    store.remove("missing").await.unwrap();
    let reopened = dir.schedule_store().await.unwrap();
    let names: Vec<String> = reopened.entries().await.unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a:crawler:next", "b:crawler:next"]);

    reopened.clear().await.unwrap();
    let again = dir.schedule_store().await.unwrap();
    assert!(again.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fired_wakeup_leaves_the_file() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.schedule_store().await.unwrap();
    let (scheduler, mut fired) = TokioWakeScheduler::new(store.clone());

    let session = SessionId::generate();
    let name = WakeName::new(&session, WakeKind::Next).to_string();
    scheduler.schedule(&name, now_ms() + 20).await.unwrap();
    assert_eq!(store.entries().await.unwrap().len(), 1);

    let got = tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .unwrap();
    assert_eq!(got.as_deref(), Some(name.as_str()));

    let reopened = dir.schedule_store().await.unwrap();
    assert!(reopened.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconcile_drops_other_sessions() {
    let (dir, _tmp) = setup_state_dir().await;
    let store = dir.schedule_store().await.unwrap();
    let old = SessionId::from("1700000000000_abcdefg");
    store
        .put(ScheduleEntry {
            name: WakeName::new(&old, WakeKind::Retry).to_string(),
            fire_at: now_ms() + 60_000,
        })
        .await
        .unwrap();
    store
        .put(ScheduleEntry { name: "garbage".into(), fire_at: 0 })
        .await
        .unwrap();

    let (scheduler, _fired) = TokioWakeScheduler::new(dir.schedule_store().await.unwrap());
    let dropped = scheduler.reconcile(&SessionId::generate()).await.unwrap();

    assert_eq!(dropped, 2);
    let reopened = dir.schedule_store().await.unwrap();
    assert!(reopened.entries().await.unwrap().is_empty());
}
