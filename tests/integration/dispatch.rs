//! Multi-channel dispatch behavior

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use vigil::config::WebhookConfig;
use vigil::notify::{ChannelOutcome, NotificationChannel, WebhookChannel};
use vigil::pipeline::Disposition;
use vigil::store::{AlertFilter, Store};
use vigil::store::memory::MemoryStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::*;

#[tokio::test]
async fn test_one_timeout_does_not_block_other_channels() {
    let store = Arc::new(MemoryStore::new());
    let (fast, delivered) = ScriptedChannel::sending("fast");

    let channels: Vec<Arc<dyn NotificationChannel>> = vec![
        Arc::new(fast),
        // stalls far beyond the 1s dispatch timeout from fast_config
        Arc::new(ScriptedChannel::stalled("stalled", Duration::from_secs(30))),
        Arc::new(ScriptedChannel::failing("broken", "connection refused")),
        Arc::new(ScriptedChannel::disabled("muted")),
    ];

    let pipeline = build_pipeline(store, channels, fast_config());

    let started = std::time::Instant::now();
    let report = pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));

    assert_eq!(report.outcomes.len(), 1);
    let Disposition::Recorded { channels, .. } = &report.outcomes[0].disposition else {
        panic!("candidate should have been recorded");
    };

    assert_eq!(channels.len(), 4);
    assert_eq!(channels["fast"], ChannelOutcome::Sent);
    assert_matches!(&channels["stalled"], ChannelOutcome::Failed(reason) if reason.contains("timed out"));
    assert_matches!(&channels["broken"], ChannelOutcome::Failed(reason) if reason.contains("connection refused"));
    assert_eq!(channels["muted"], ChannelOutcome::Disabled);

    assert_eq!(delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_survives_total_channel_failure() {
    let store = Arc::new(MemoryStore::new());
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![
        Arc::new(ScriptedChannel::failing("webhook", "503")),
        Arc::new(ScriptedChannel::failing("chat", "401")),
    ];
    let pipeline = build_pipeline(store.clone(), channels, fast_config());

    let report = pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();
    assert_eq!(report.recorded(), 1);

    // the audit trail exists even though every channel is down
    let now = Utc::now();
    let alerts = store
        .list_alerts(&AlertFilter {
            acknowledged: None,
            since: now - Duration::from_secs(60),
            until: now + Duration::from_secs(60),
        })
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn test_real_webhook_channel_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let webhook = WebhookChannel::new(WebhookConfig {
        enabled: true,
        url: format!("{}/alerts", server.uri()),
    });
    let pipeline = build_pipeline(store, vec![Arc::new(webhook)], fast_config());

    let report = pipeline.submit(&snapshot_with_cpu("web-1", 92.0)).await.unwrap();

    let Disposition::Recorded { channels, .. } = &report.outcomes[0].disposition else {
        panic!("candidate should have been recorded");
    };
    assert_eq!(channels["webhook"], ChannelOutcome::Sent);
}
