//! End-to-end pipeline behavior over the in-memory store

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use vigil::config::AlertPolicy;
use vigil::evaluate::AlertKind;
use vigil::store::{AlertFilter, Store};
use vigil::store::memory::MemoryStore;

use super::helpers::*;

fn recent_filter() -> AlertFilter {
    let now = Utc::now();
    AlertFilter {
        acknowledged: None,
        since: now - Duration::from_secs(3600),
        until: now + Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn test_hot_cpu_twice_within_window_records_once() {
    let store = Arc::new(MemoryStore::new());
    let (channel, delivered) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(store.clone(), vec![Arc::new(channel)], fast_config());

    store
        .set_policy(
            "web-1",
            &AlertPolicy {
                cpu_threshold: 80.0,
                ..AlertPolicy::default()
            },
        )
        .await
        .unwrap();

    pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();
    pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();

    let alerts = store.list_alerts(&recent_filter()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::CpuHigh);
    assert_eq!(delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeat_after_window_expiry_records_again() {
    let store = Arc::new(MemoryStore::new());
    let (channel, _) = ScriptedChannel::sending("webhook");
    // fast_config suppresses for one second
    let pipeline = build_pipeline(store.clone(), vec![Arc::new(channel)], fast_config());

    pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();
    pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let report = pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();
    assert_eq!(report.recorded(), 1);

    let alerts = store.list_alerts(&recent_filter()).await.unwrap();
    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn test_only_the_full_disk_alerts() {
    let store = Arc::new(MemoryStore::new());
    let (channel, _) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(store.clone(), vec![Arc::new(channel)], fast_config());

    let snapshot = snapshot_with_disks("web-1", &[("/data", 95.0), ("/backup", 40.0)]);
    let report = pipeline.submit(&snapshot).await.unwrap();

    assert_eq!(report.recorded(), 1);
    let alerts = store.list_alerts(&recent_filter()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::DiskHigh);
    assert!(alerts[0].message.contains("/data"));
}

#[tokio::test]
async fn test_distinct_disks_do_not_suppress_each_other() {
    let store = Arc::new(MemoryStore::new());
    let (channel, _) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(store.clone(), vec![Arc::new(channel)], fast_config());

    pipeline
        .submit(&snapshot_with_disks("web-1", &[("/data", 95.0)]))
        .await
        .unwrap();
    let report = pipeline
        .submit(&snapshot_with_disks("web-1", &[("/data", 95.0), ("/var", 93.0)]))
        .await
        .unwrap();

    // /data suppressed, /var fresh
    assert_eq!(report.recorded(), 1);
    assert_eq!(report.suppressed(), 1);

    let alerts = store.list_alerts(&recent_filter()).await.unwrap();
    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn test_acknowledged_alert_filtered_out() {
    let store = Arc::new(MemoryStore::new());
    let (channel, _) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(store.clone(), vec![Arc::new(channel)], fast_config());

    pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();

    let alerts = store.list_alerts(&recent_filter()).await.unwrap();
    assert!(store.acknowledge_alert(alerts[0].id).await.unwrap());

    let open = store
        .list_alerts(&AlertFilter {
            acknowledged: Some(false),
            ..recent_filter()
        })
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn test_history_records_every_submission() {
    let store = Arc::new(MemoryStore::new());
    let (channel, _) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(store.clone(), vec![Arc::new(channel)], fast_config());

    pipeline.submit(&snapshot_with_cpu("web-1", 10.0)).await.unwrap();
    pipeline.submit(&snapshot_with_cpu("web-1", 20.0)).await.unwrap();

    let now = Utc::now();
    let history = store
        .list_history(
            "web-1",
            now - Duration::from_secs(3600),
            now + Duration::from_secs(3600),
        )
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
}
