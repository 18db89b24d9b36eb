//! Socket handshake tests against a real TCP listener
//!
//! The listener accepts connections and never answers the upgrade request, so the
//! WebSocket handshake can only end by timing out.

use libdiscord::testing::{CapturedLogs, RecordingHandler};
use libdiscord::{ClientSettings, Context, ContextInfo, GatewayState};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Accept every connection and keep it open without writing a byte
async fn silent_gateway() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let task = tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            sockets.push(socket);
        }
    });
    (url, task)
}

async fn context_for(gateway: &str, handshake_timeout: Duration) -> (MockServer, Context) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gateway"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(gateway)))
        .mount(&server)
        .await;

    let mut settings = ClientSettings::with_api_base_url(server.uri());
    settings.handshake_timeout = handshake_timeout;
    let info = ContextInfo::new("test-token", RecordingHandler::new()).with_settings(settings);
    let ctx = Context::new(info).unwrap();
    (server, ctx)
}

#[tokio::test]
async fn test_unanswered_upgrade_does_not_block_service() {
    let (gateway, listener) = silent_gateway().await;
    let (_server, mut ctx) = context_for(&gateway, Duration::from_secs(30)).await;
    ctx.connect().await.unwrap();

    for _ in 0..3 {
        let started = Instant::now();
        let tick = ctx.service(Duration::from_millis(50));
        let finished = tokio::time::timeout(Duration::from_secs(3), tick).await;

        assert!(finished.is_ok(), "service outlived its budget");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(ctx.gateway_connection_state(), GatewayState::Connecting);
    }

    ctx.destroy().await;
    listener.abort();
}

#[tokio::test]
async fn test_unanswered_upgrade_times_out_to_disconnected() {
    let (gateway, listener) = silent_gateway().await;
    let (_server, mut ctx) = context_for(&gateway, Duration::from_millis(200)).await;
    ctx.connect().await.unwrap();

    let logs = CapturedLogs::new();
    let _guard = logs.install();

    let started = Instant::now();
    while ctx.gateway_connection_state() != GatewayState::Disconnected
        && started.elapsed() < Duration::from_secs(3)
    {
        ctx.service(Duration::from_millis(50)).await;
    }

    assert_eq!(ctx.gateway_connection_state(), GatewayState::Disconnected);
    assert_eq!(ctx.stats().disconnects, 1);
    let errors = logs.errors();
    assert!(
        errors.iter().any(|line| line.contains("did not finish within")),
        "{errors:?}"
    );

    listener.abort();
}
