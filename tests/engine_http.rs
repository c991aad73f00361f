//! End-to-end engine runs over real HTTP against a local mock server

use network_speed_tester::{
    client::{HttpClient, NetworkClient},
    EngineEvent, PhaseStateMachine, ServerEndpoint, TestConfig, TestPhase,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn quick_config() -> TestConfig {
    TestConfig {
        duration_ms: 600,
        stream_count: 2,
        warm_up_ms: 100,
        sample_interval_ms: 50,
        probe_count: 3,
        probe_delay_ms: 10,
        probe_timeout_ms: 1000,
        transition_ms: 50,
        upload_payload_bytes: 16 * 1024,
        ..TestConfig::default()
    }
}

fn endpoint(base: &str) -> ServerEndpoint {
    ServerEndpoint::new(
        "local",
        "Local mock",
        format!("{}/__down", base),
        format!("{}/__up", base),
        format!("{}/cdn-cgi/trace", base),
    )
}

async fn speed_server(download_status: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/__down"))
        .respond_with(ResponseTemplate::new(download_status).set_body_bytes(vec![0u8; 256 * 1024]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/__up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn-cgi/trace"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fl=1\nh=localhost\n"))
        .mount(&server)
        .await;

    server
}

fn engine() -> Arc<PhaseStateMachine> {
    let client: Arc<dyn HttpClient> = Arc::new(NetworkClient::new(Duration::from_secs(2)).unwrap());
    Arc::new(PhaseStateMachine::new(client, quick_config()))
}

#[tokio::test]
async fn test_full_run_over_http() {
    let server = speed_server(200).await;
    let engine = engine();
    let mut events = engine.subscribe();

    let result = engine.start(endpoint(&server.uri())).unwrap().await.unwrap().unwrap();

    assert_eq!(engine.current_phase(), TestPhase::Complete);
    assert_eq!(result.server_id(), "local");
    assert!(result.download_mbps() > 0.0);
    assert!(result.upload_mbps() > 0.0);
    assert!(result.latency_ms() < 999);

    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Completed(reported) = event {
            assert_eq!(reported, result);
            completed = true;
        }
    }
    assert!(completed);

    let requests = server.received_requests().await.unwrap();
    let downloads: Vec<_> = requests.iter().filter(|r| r.url.path() == "/__down").collect();
    assert!(downloads.len() >= 2);
    assert!(downloads
        .iter()
        .all(|r| r.url.query_pairs().any(|(key, _)| key == "nocache")));
    assert!(requests
        .iter()
        .any(|r| r.url.path() == "/__up" && r.body.len() == 16 * 1024));
}

#[tokio::test]
async fn test_failing_download_still_measures_upload() {
    let server = speed_server(503).await;
    let engine = engine();
    let mut events = engine.subscribe();

    let result = engine.start(endpoint(&server.uri())).unwrap().await.unwrap().unwrap();

    assert_eq!(result.download_mbps(), 0.0);
    assert!(result.upload_mbps() > 0.0);

    let mut saw_transition = false;
    while let Ok(event) = events.try_recv() {
        if event == EngineEvent::PhaseChanged(TestPhase::Transition) {
            saw_transition = true;
        }
    }
    assert!(saw_transition);
}

#[tokio::test]
async fn test_unreachable_server_completes_with_penalty() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let engine = engine();
    let result = engine.start(endpoint(&base)).unwrap().await.unwrap().unwrap();

    assert_eq!(result.latency_ms(), 999);
    assert_eq!(result.jitter_ms(), 0);
    assert_eq!(result.download_mbps(), 0.0);
    assert_eq!(result.upload_mbps(), 0.0);
}

#[tokio::test]
async fn test_cancel_returns_to_idle() {
    let server = speed_server(200).await;
    let client: Arc<dyn HttpClient> = Arc::new(NetworkClient::new(Duration::from_secs(2)).unwrap());
    let engine = Arc::new(PhaseStateMachine::new(
        client,
        TestConfig {
            duration_ms: 10_000,
            ..quick_config()
        },
    ));

    let handle = engine.start(endpoint(&server.uri())).unwrap();
    let mut phases = engine.watch_phase();
    phases
        .wait_for(|phase| *phase == TestPhase::Download)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(engine.cancel());
    let error = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run did not stop after cancel")
        .unwrap()
        .unwrap_err();

    assert!(error.is_cancelled());
    assert_eq!(engine.current_phase(), TestPhase::Idle);
    assert!(engine.start(endpoint(&server.uri())).is_some());
    engine.cancel();
}
