use std::time::Duration;

use aquawatch_lib::{
    db::{Database, LAST_SAVED_MARKER},
    history::load_history,
    live::{LiveController, ManualSave},
    metrics::IngestionMetrics,
    settings::LiveSettings,
};
use serde_json::json;
use tempfile::TempDir;

fn open_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("aquawatch.sqlite3")).unwrap();
    (dir, db)
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held");
}

#[tokio::test]
async fn published_readings_reach_window_and_history() {
    let (_dir, db) = open_database();
    let settings = LiveSettings {
        window_capacity: 3,
        save_interval_secs: 3600,
    };

    let mut controller = LiveController::new();
    let buffer = controller
        .start(db.clone(), &settings, IngestionMetrics::new())
        .await
        .unwrap();

    for salinity in [0.1, 0.2, 0.3, 0.4] {
        db.publish_live(json!({ "temperature": 28.5, "turbidity": 4.1, "salinity": salinity }))
            .await
            .unwrap();
    }
    db.publish_live(serde_json::Value::Null).await.unwrap();

    wait_until(|| {
        let buffer = buffer.clone();
        async move { buffer.metrics().get_snapshot().await.received_count == 4 }
    })
    .await;

    let window = buffer.snapshot().await;
    assert_eq!(window.len(), 3);
    assert_eq!(window.last().unwrap().salinity, 0.4);

    // Only the first reading passes the one-hour gate.
    wait_until(|| {
        let db = db.clone();
        async move { db.count_history().await.unwrap() == 1 }
    })
    .await;

    assert!(matches!(
        buffer.manual_save().await.unwrap(),
        ManualSave::Saved(_)
    ));
    controller.stop().await.unwrap();

    let history = load_history(&db, 10).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].salinity, 0.1);
    assert_eq!(history[1].salinity, 0.4);
    assert!(db.get_marker(LAST_SAVED_MARKER).await.unwrap().is_some());
}

#[tokio::test]
async fn restart_respects_stored_marker() {
    let (dir, db) = open_database();
    let settings = LiveSettings {
        window_capacity: 20,
        save_interval_secs: 3600,
    };

    let mut controller = LiveController::new();
    let buffer = controller
        .start(db.clone(), &settings, IngestionMetrics::new())
        .await
        .unwrap();
    db.publish_live(json!({ "temperature": 28.0 })).await.unwrap();
    wait_until(|| {
        let db = db.clone();
        async move { db.count_history().await.unwrap() == 1 }
    })
    .await;
    wait_until(|| {
        let db = db.clone();
        async move { db.get_marker(LAST_SAVED_MARKER).await.unwrap().is_some() }
    })
    .await;
    controller.stop().await.unwrap();
    drop(buffer);
    drop(db);

    let db = Database::new(dir.path().join("aquawatch.sqlite3")).unwrap();
    let metrics = IngestionMetrics::new();
    let mut controller = LiveController::new();
    controller
        .start(db.clone(), &settings, metrics.clone())
        .await
        .unwrap();

    // The stored live value is replayed on mount, then a fresh reading arrives.
    db.publish_live(json!({ "temperature": 29.0 })).await.unwrap();
    wait_until(|| {
        let metrics = metrics.clone();
        async move { metrics.get_snapshot().await.received_count == 2 }
    })
    .await;
    controller.stop().await.unwrap();

    assert_eq!(db.count_history().await.unwrap(), 1);
    assert_eq!(metrics.get_snapshot().await.throttled_count, 2);
}
