//! End-to-end tests of the decode-and-fan-out path, driving
//! `handle_publish` directly with raw topic/payload pairs the way the
//! broker event loop does.

use std::sync::Arc;
use tagtrack_common::{AssetStore, InMemoryAssetStore};
use tagtrack_core::ingest::{handle_publish, IngestContext};
use tagtrack_core::{DeviceRegistry, EventBus, TelemetryStore};
use tagtrack_models::{DeviceStatus, EventCategory, TrackEvent};

fn context() -> (IngestContext, Arc<InMemoryAssetStore>) {
    let assets = Arc::new(InMemoryAssetStore::new());
    let ctx = IngestContext {
        registry: Arc::new(DeviceRegistry::new()),
        store: Arc::new(TelemetryStore::new()),
        bus: Arc::new(EventBus::new(256)),
        assets: assets.clone(),
    };
    (ctx, assets)
}

#[tokio::test]
async fn telemetry_updates_registry_store_and_bus() {
    let (ctx, _) = context();
    let mut rx = ctx.bus.subscribe(EventCategory::Telemetry);

    handle_publish(
        &ctx,
        "ns",
        "ns/dev1/telemetry",
        br#"{"temperature":21.5,"battery":77}"#,
    )
    .await
    .unwrap();

    let device = ctx.registry.get("dev1").await.unwrap();
    assert_eq!(device.battery, Some(77));

    let history = ctx.store.history("dev1", None).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].payload["temperature"], 21.5);

    let event = rx.recv().await.unwrap();
    match event.as_ref() {
        TrackEvent::Telemetry { device_id, payload, .. } => {
            assert_eq!(device_id, "dev1");
            assert_eq!(payload["battery"], 77);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn malformed_payload_is_contained() {
    let (ctx, _) = context();

    // Garbage body: adapter must survive and must not create the device
    let err = handle_publish(&ctx, "ns", "ns/dev1/telemetry", b"{{{nonsense").await;
    assert!(err.is_err());
    assert!(ctx.registry.get("dev1").await.is_none());
    assert!(ctx.store.history("dev1", None).await.is_empty());

    // The next well-formed message for the same device still lands
    handle_publish(&ctx, "ns", "ns/dev1/telemetry", br#"{"seq":1}"#)
        .await
        .unwrap();
    assert!(ctx.registry.get("dev1").await.is_some());
    assert_eq!(ctx.store.history("dev1", None).await.len(), 1);
}

#[tokio::test]
async fn foreign_topics_are_ignored_silently() {
    let (ctx, _) = context();
    handle_publish(&ctx, "ns", "elsewhere/dev1/telemetry", br#"{"seq":1}"#)
        .await
        .unwrap();
    handle_publish(&ctx, "ns", "ns/dev1/firmware", br#"{"seq":1}"#)
        .await
        .unwrap();
    assert!(ctx.registry.list().await.is_empty());
}

#[tokio::test]
async fn status_messages_drive_connectivity() {
    let (ctx, _) = context();
    let mut rx = ctx.bus.subscribe(EventCategory::Status);

    handle_publish(&ctx, "ns", "ns/dev1/status", br#"{"status":"online","signal":64}"#)
        .await
        .unwrap();
    assert_eq!(
        ctx.registry.get("dev1").await.unwrap().status,
        DeviceStatus::Online
    );

    let event = rx.recv().await.unwrap();
    match event.as_ref() {
        TrackEvent::Status { status, .. } => assert_eq!(*status, DeviceStatus::Online),
        other => panic!("unexpected event {other:?}"),
    }

    handle_publish(&ctx, "ns", "ns/dev1/status", br#"{"status":"offline"}"#)
        .await
        .unwrap();
    assert_eq!(
        ctx.registry.get("dev1").await.unwrap().status,
        DeviceStatus::Offline
    );
    // Signal from the earlier message survives the partial update
    assert_eq!(ctx.registry.get("dev1").await.unwrap().signal, Some(64));

    // Status messages never touch telemetry history
    assert!(ctx.store.history("dev1", None).await.is_empty());
}

#[tokio::test]
async fn scan_events_record_sightings_and_fan_out() {
    let (ctx, assets) = context();
    let mut rx = ctx.bus.subscribe(EventCategory::NfcScan);

    handle_publish(
        &ctx,
        "ns",
        "ns/reader-7/nfc",
        br#"{"tagId":"04:A2:C9:11","rssi":-48}"#,
    )
    .await
    .unwrap();

    // The reader registers as a device like any other traffic source
    assert!(ctx.registry.get("reader-7").await.is_some());

    let record = assets.find("04:A2:C9:11").await.unwrap();
    assert_eq!(record.last_reader, "reader-7");
    assert_eq!(record.sighting_count, 1);

    let event = rx.recv().await.unwrap();
    match event.as_ref() {
        TrackEvent::NfcScan { reader_id, payload, .. } => {
            assert_eq!(reader_id, "reader-7");
            assert_eq!(payload["rssi"], -48);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn per_device_order_is_preserved_through_eviction() {
    let (ctx, _) = context();

    for seq in 0..230u64 {
        let body = format!(r#"{{"seq":{seq}}}"#);
        handle_publish(&ctx, "ns", "ns/dev1/telemetry", body.as_bytes())
            .await
            .unwrap();
    }

    let history = ctx.store.history("dev1", Some(200)).await;
    assert_eq!(history.len(), 200);
    let seqs: Vec<u64> = history
        .iter()
        .map(|s| s.payload["seq"].as_u64().unwrap())
        .collect();
    let expected: Vec<u64> = (30..230).collect();
    assert_eq!(seqs, expected);
}
