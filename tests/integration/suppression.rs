//! Suppression behavior under concurrent submission

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use vigil::config::EngineConfig;
use vigil::ingest::IngestHandle;
use vigil::store::{AlertFilter, Store};
use vigil::store::memory::MemoryStore;

use super::helpers::*;

#[tokio::test]
async fn test_concurrent_identical_conditions_record_once() {
    init_tracing();

    let store = Arc::new(MemoryStore::new());
    let (channel, delivered) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(
        store.clone(),
        vec![Arc::new(channel)],
        EngineConfig::default(),
    );
    let handle = IngestHandle::spawn(pipeline);

    // a burst of identical hot-CPU reports racing through the pool
    let mut tasks = vec![];
    for _ in 0..16 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle.submit(snapshot_with_cpu("web-1", 92.0)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // let the pool drain
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.shutdown().await;

    let now = Utc::now();
    let alerts = store
        .list_alerts(&AlertFilter {
            acknowledged: None,
            since: now - Duration::from_secs(60),
            until: now + Duration::from_secs(60),
        })
        .await
        .unwrap();

    assert_eq!(alerts.len(), 1, "dedup gate must admit exactly one firing");
    assert_eq!(delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_different_sources_not_cross_suppressed() {
    let store = Arc::new(MemoryStore::new());
    let (channel, _) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(
        store.clone(),
        vec![Arc::new(channel)],
        EngineConfig::default(),
    );

    pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();
    pipeline.submit(&snapshot_with_cpu("web-2", 92.0)).await.unwrap();

    let now = Utc::now();
    let alerts = store
        .list_alerts(&AlertFilter {
            acknowledged: None,
            since: now - Duration::from_secs(60),
            until: now + Duration::from_secs(60),
        })
        .await
        .unwrap();

    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn test_distinct_kinds_on_same_source_fire_independently() {
    let store = Arc::new(MemoryStore::new());
    let (channel, _) = ScriptedChannel::sending("webhook");
    let pipeline = build_pipeline(
        store.clone(),
        vec![Arc::new(channel)],
        EngineConfig::default(),
    );

    let mut snapshot = snapshot_with_cpu("web-1", 92.0);
    snapshot.ram_pct = Some(97.0);

    let report = pipeline.submit(&snapshot).await.unwrap();
    assert_eq!(report.recorded(), 2);

    // the repeat suppresses both, independently
    let mut snapshot = snapshot_with_cpu("web-1", 93.0);
    snapshot.ram_pct = Some(98.0);
    let report = pipeline.submit(&snapshot).await.unwrap();
    assert_eq!(report.recorded(), 0);
    assert_eq!(report.suppressed(), 2);
}
