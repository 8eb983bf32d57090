//! Integration tests for sync engine and server.

use async_trait::async_trait;
use pushreg_core::{ClientState, PreferenceKind, PreferenceValue, RequestContext, SyncStatus};
use pushreg_protocol::{ClientMessage, ServerAck};
use pushreg_sync_engine::{
    EventKind, EventTracker, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer, ObserverRegistry,
    RegistrationEvent, RetryConfig, SyncConfig, SyncEngine, SyncResult, TrackerConfig, Transport,
};
use pushreg_sync_server::{DeviceRecord, RegistrationServer, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

/// A transport that calls an in-process server directly.
struct InMemoryTransport {
    server: Arc<RegistrationServer>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, message: &ClientMessage) -> SyncResult<ServerAck> {
        Ok(self.server.handle_message(message.clone()))
    }
}

/// Exposes the server's HTTP surface to a loopback client.
struct Loopback(Arc<RegistrationServer>);

impl LoopbackServer for Loopback {
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpResponse {
        let (status, body) = self.0.handle_http(path, body);
        HttpResponse { status, body }
    }
}

fn context(api_key: &str) -> RequestContext {
    RequestContext {
        api_key: api_key.into(),
        time_zone: Some("Europe/Berlin".into()),
        sdk_version: "test".into(),
    }
}

fn sync_config() -> SyncConfig {
    SyncConfig::default().with_retry(RetryConfig::default().with_jitter(false))
}

struct Client {
    state: Arc<ClientState>,
    observers: Arc<ObserverRegistry>,
    engine: SyncEngine,
}

fn client(api_key: &str, transport: Arc<dyn Transport>) -> Client {
    let state = Arc::new(ClientState::in_memory());
    let observers = Arc::new(ObserverRegistry::new());
    let engine = SyncEngine::spawn(
        sync_config(),
        context(api_key),
        Arc::clone(&state),
        transport,
        Arc::clone(&observers),
    );
    Client {
        state,
        observers,
        engine,
    }
}

fn categories(record: &DeviceRecord) -> Vec<&str> {
    record.categories.iter().map(String::as_str).collect()
}

fn in_memory(server: &Arc<RegistrationServer>) -> Arc<dyn Transport> {
    Arc::new(InMemoryTransport {
        server: Arc::clone(server),
    })
}

#[tokio::test(start_paused = true)]
async fn client_server_registration() {
    let server = Arc::new(RegistrationServer::new(ServerConfig::default()));
    let c = client("key", in_memory(&server));

    c.state
        .mutate_registration(|r| {
            r.set_device_token(vec![0x01, 0x02, 0xff])?;
            r.set_user_id("alice")?;
            r.add_categories(["sports", "news"])
        })
        .unwrap();
    let report = c.engine.sync_now().await.unwrap();
    assert_eq!(report.status, SyncStatus::Synced);

    let device_id = c.state.device_id().to_string();
    let record = server.registry().get(&device_id).unwrap();
    assert_eq!(record.device_token.as_deref(), Some("0102ff"));
    assert_eq!(record.user_id.as_deref(), Some("alice"));
    assert_eq!(categories(&record), vec!["news", "sports"]);
    assert_eq!(record.time_zone.as_deref(), Some("Europe/Berlin"));
    assert_eq!(server.registry().devices_in_category("news"), vec![device_id]);
    assert_eq!(
        c.state.registration().last_synced_hash(),
        Some(c.state.registration().fingerprint().unwrap())
    );
}

#[tokio::test(start_paused = true)]
async fn preferences_are_sent_while_dirty() {
    let server = Arc::new(RegistrationServer::new(ServerConfig::default()));
    let c = client("key", in_memory(&server));
    c.state
        .mutate_registration(|r| r.set_device_token(vec![0xaa]))
        .unwrap();
    c.state
        .mutate_preferences(|p| {
            p.declare("alerts", "Alerts", PreferenceKind::Boolean)?;
            p.set_value("alerts", PreferenceValue::Bool(true))
        })
        .unwrap();

    c.engine.sync_now().await.unwrap();
    let device_id = c.state.device_id().to_string();
    assert_eq!(server.registry().get(&device_id).unwrap().preferences.len(), 1);
    assert!(!c.state.preferences().is_dirty());

    // A preference-only change still produces a request.
    c.state
        .mutate_preferences(|p| p.set_value("alerts", PreferenceValue::Bool(false)))
        .unwrap();
    let report = c.engine.sync_now().await.unwrap();
    assert_eq!(report.requests_sent, 1);
    assert_eq!(server.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn server_failures_are_retried() {
    let server = Arc::new(RegistrationServer::new(
        ServerConfig::default().with_failures(503, 2),
    ));
    let c = client("key", in_memory(&server));
    let mut events = c.observers.listen();
    c.state
        .mutate_registration(|r| r.set_device_token(vec![0x10]))
        .unwrap();

    let report = c.engine.sync_now().await.unwrap();
    assert!(report.retry_scheduled);
    assert!(server.registry().is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(server.request_count(), 3);
    assert_eq!(server.registry().len(), 1);
    assert_eq!(c.state.status(), SyncStatus::Synced);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::RegistrationFailed,
            EventKind::RegistrationFailed,
            EventKind::RegistrationSucceeded,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_api_key_is_final() {
    let server = Arc::new(RegistrationServer::new(
        ServerConfig::new().with_api_key("good"),
    ));
    let c = client("bad", in_memory(&server));
    let mut events = c.observers.listen();
    c.state
        .mutate_registration(|r| r.set_device_token(vec![0x10]))
        .unwrap();

    let report = c.engine.sync_now().await.unwrap();
    assert!(!report.retry_scheduled);
    assert_eq!(report.status, SyncStatus::Failed);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(server.request_count(), 1);
    match events.try_recv().unwrap() {
        RegistrationEvent::RegistrationFailed { status_code, error } => {
            assert_eq!(status_code, 401);
            assert!(!error.retryable);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unregister_deletes_device() {
    let server = Arc::new(RegistrationServer::new(ServerConfig::default()));
    let c = client("key", in_memory(&server));
    c.state
        .mutate_registration(|r| {
            r.set_device_token(vec![0x10])?;
            r.add_categories(["news"])
        })
        .unwrap();
    c.engine.sync_now().await.unwrap();
    assert_eq!(server.registry().len(), 1);

    c.state
        .mutate_registration(|r| {
            r.unregister();
            Ok(())
        })
        .unwrap();
    c.engine.sync_now().await.unwrap();
    assert!(server.registry().is_empty());
    assert_eq!(c.state.status(), SyncStatus::Unregistered);
}

#[tokio::test(start_paused = true)]
async fn http_transport_over_loopback() {
    let server = Arc::new(RegistrationServer::new(ServerConfig::default()));
    let transport = HttpTransport::new(
        "https://push.example.com",
        LoopbackClient::new(Loopback(Arc::clone(&server))),
    );
    let c = client("key", Arc::new(transport));
    c.state
        .mutate_registration(|r| {
            r.set_device_token(vec![0xde, 0xad])?;
            r.add_categories(["weather"])
        })
        .unwrap();

    let report = c.engine.sync_now().await.unwrap();
    assert_eq!(report.status, SyncStatus::Synced);
    let record = server
        .registry()
        .get(&c.state.device_id().to_string())
        .unwrap();
    assert_eq!(categories(&record), vec!["weather"]);
}

#[tokio::test(start_paused = true)]
async fn http_errors_carry_status() {
    let server = Arc::new(RegistrationServer::new(
        ServerConfig::default().with_failures(429, 1),
    ));
    let transport = HttpTransport::new(
        "https://push.example.com",
        LoopbackClient::new(Loopback(Arc::clone(&server))),
    );
    let c = client("key", Arc::new(transport));
    c.state
        .mutate_registration(|r| r.set_device_token(vec![0x01]))
        .unwrap();

    let report = c.engine.sync_now().await.unwrap();
    assert_eq!(report.error.and_then(|e| e.status_code), Some(429));
    assert!(report.retry_scheduled);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(c.state.status(), SyncStatus::Synced);
}

#[tokio::test(start_paused = true)]
async fn tracker_delivers_to_server() {
    let server = Arc::new(RegistrationServer::new(ServerConfig::default()));
    let tracker = EventTracker::spawn(
        TrackerConfig::default(),
        "key",
        "device-1",
        in_memory(&server),
    );

    let payload = serde_json::json!({ "aps": { "alert": "hi" }, "ei": "eng-7" });
    let meta = pushreg_core::LastPushMeta::from_payload(&payload).unwrap();
    tracker.record_push(meta, true);
    tracker.track_event("checkout");

    assert_eq!(tracker.flush().await.unwrap(), 2);
    let engagements = server.registry().engagements();
    assert_eq!(engagements.len(), 1);
    assert_eq!(engagements[0].1.engagement_id.as_deref(), Some("eng-7"));
    let events = server.registry().events();
    assert_eq!(events[0].1.event_type, "checkout");
    tracker.shutdown().await;
}
