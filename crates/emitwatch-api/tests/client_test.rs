#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use emitwatch_api::{ApiClient, Error, FrameDecoder, SessionEvent, SessionSignal};

const COORDS: &str = "/api/v1/emitter/simulator/monitoring/coords";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(token: Option<&str>) -> (MockServer, ApiClient, SessionSignal) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let session = SessionSignal::new();
    let client = ApiClient::from_reqwest(
        reqwest::Client::new(),
        base_url,
        token.map(|t| SecretString::from(t.to_string())),
    )
    .with_session(session.clone());
    (server, client, session)
}

/// Open the coords stream, returning channels for chunks and the terminal error.
fn open(
    client: &ApiClient,
) -> (
    emitwatch_api::StreamHandle,
    mpsc::UnboundedReceiver<String>,
    oneshot::Receiver<Error>,
) {
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
    let (err_tx, err_rx) = oneshot::channel();
    let handle = client
        .open_coords_stream(
            move |text| {
                let _ = chunk_tx.send(text.to_owned());
            },
            move |err| {
                let _ = err_tx.send(err);
            },
        )
        .unwrap();
    (handle, chunk_rx, err_rx)
}

async fn collect(mut rx: mpsc::UnboundedReceiver<String>) -> String {
    let mut all = String::new();
    while let Ok(Some(chunk)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        all.push_str(&chunk);
    }
    all
}

/// Serve one chunked `200` stream carrying `chunk`, then drop the socket
/// once `close` fires. Returns the base URL.
async fn serve_then_drop(chunk: &'static str, close: oneshot::Receiver<()>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = "HTTP/1.1 200 OK\r\n\
                    content-type: text/event-stream\r\n\
                    transfer-encoding: chunked\r\n\r\n";
        let body = format!("{:x}\r\n{chunk}\r\n", chunk.len());
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        let _ = close.await;
        drop(socket);
    });

    Url::parse(&format!("http://{addr}")).unwrap()
}

// ── Stream tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_sends_auth_and_accept_headers() {
    let (server, client, _) = setup(Some("tok-123")).await;

    let body = "data: {\"status\":\"connected\"}\n\ndata: [{\"uuid\":\"a1\",\"lat\":1,\"lon\":2}]\n\n";
    Mock::given(method("GET"))
        .and(path(COORDS))
        .and(header("authorization", "Bearer tok-123"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (handle, chunks, err_rx) = open(&client);
    let text = collect(chunks).await;

    assert_eq!(text, body);
    let mut decoder = FrameDecoder::new();
    assert_eq!(decoder.feed(&text).len(), 2);

    // Natural end of stream is silent.
    assert!(err_rx.await.is_err(), "no error expected on clean end");
    for _ in 0..50 {
        if handle.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(handle.is_finished());
}

#[tokio::test]
async fn test_stream_non_success_status_is_reported() {
    let (server, client, session) = setup(Some("tok")).await;
    let mut events = session.subscribe();

    Mock::given(method("GET"))
        .and(path(COORDS))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let (_handle, _chunks, err_rx) = open(&client);
    let err = tokio::time::timeout(Duration::from_secs(5), err_rx)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(err, Error::HttpStatus { status: 503 }), "got: {err:?}");
    assert_eq!(err.to_string(), "HTTP error! status: 503");
    assert!(events.try_recv().is_err(), "503 must not expire the session");
}

#[tokio::test]
async fn test_stream_401_raises_session_signal() {
    let (server, client, session) = setup(None).await;
    let mut events = session.subscribe();

    Mock::given(method("GET"))
        .and(path(COORDS))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (_handle, _chunks, err_rx) = open(&client);
    let err = tokio::time::timeout(Duration::from_secs(5), err_rx)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
}

#[tokio::test]
async fn test_cancelled_stream_reports_nothing() {
    let (server, client, _) = setup(Some("tok")).await;

    Mock::given(method("GET"))
        .and(path(COORDS))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let (handle, _chunks, err_rx) = open(&client);
    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());

    let outcome = tokio::time::timeout(Duration::from_secs(5), err_rx)
        .await
        .unwrap();
    assert!(outcome.is_err(), "error callback must not run after cancel");
}

#[tokio::test]
async fn test_dropping_handle_cancels_stream() {
    let (server, client, _) = setup(Some("tok")).await;

    Mock::given(method("GET"))
        .and(path(COORDS))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let (handle, _chunks, err_rx) = open(&client);
    drop(handle);

    let outcome = tokio::time::timeout(Duration::from_secs(5), err_rx)
        .await
        .unwrap();
    assert!(outcome.is_err());
}

#[tokio::test]
async fn test_stream_dropped_mid_body_reports_one_error() {
    let (close_tx, close_rx) = oneshot::channel();
    let base_url = serve_then_drop("data: {\"a\":1}\n\n", close_rx).await;
    let client = ApiClient::from_reqwest(reqwest::Client::new(), base_url, None);

    let errors = Arc::new(AtomicUsize::new(0));
    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
    let (err_tx, err_rx) = oneshot::channel();
    let seen = Arc::clone(&errors);
    let handle = client
        .open_coords_stream(
            move |text| {
                let _ = chunk_tx.send(text.to_owned());
            },
            move |err| {
                seen.fetch_add(1, Ordering::SeqCst);
                let _ = err_tx.send(err);
            },
        )
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), chunk_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "data: {\"a\":1}\n\n");

    close_tx.send(()).unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), err_rx)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(err, Error::StreamRead(_)), "got: {err:?}");
    assert!(!err.is_auth_expired());

    for _ in 0..50 {
        if handle.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(handle.is_finished());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stream_cancelled_before_drop_reports_nothing() {
    let (close_tx, close_rx) = oneshot::channel();
    let base_url = serve_then_drop("data: {\"a\":1}\n\n", close_rx).await;
    let client = ApiClient::from_reqwest(reqwest::Client::new(), base_url, None);

    let (handle, mut chunks, err_rx) = open(&client);
    tokio::time::timeout(Duration::from_secs(5), chunks.recv())
        .await
        .unwrap()
        .unwrap();

    handle.cancel();
    close_tx.send(()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), err_rx)
        .await
        .unwrap();
    assert!(outcome.is_err(), "error callback must not run after cancel");
}

// ── Stop tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_simulator_success() {
    let (server, client, _) = setup(Some("tok")).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/emitter/simulator/a1b2c3d4-0000"))
        .and(header("authorization", "Bearer tok"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    client.stop_simulator("a1b2c3d4-0000").await.unwrap();
}

#[tokio::test]
async fn test_stop_simulator_failure_carries_server_message() {
    let (server, client, _) = setup(Some("tok")).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/emitter/simulator/gone"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"code": "S404", "message": "simulation not found"})),
        )
        .mount(&server)
        .await;

    let err = client.stop_simulator("gone").await.unwrap_err();

    assert_eq!(err.server_message(), Some("simulation not found"));
    assert_eq!(err.api_error_code(), Some("S404"));
    assert!(!err.is_auth_expired());
}

#[tokio::test]
async fn test_stop_simulator_without_body_message() {
    let (server, client, _) = setup(Some("tok")).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/emitter/simulator/x"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.stop_simulator("x").await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }), "got: {err:?}");
    assert!(err.server_message().is_none());
}

#[tokio::test]
async fn test_stop_simulator_jwt_expired() {
    let (server, client, session) = setup(Some("stale")).await;
    let mut events = session.subscribe();

    Mock::given(method("DELETE"))
        .and(path("/api/v1/emitter/simulator/a1"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"code": "J403", "message": "expired"})),
        )
        .mount(&server)
        .await;

    let err = client.stop_simulator("a1").await.unwrap_err();

    assert!(matches!(err, Error::SessionExpired), "got: {err:?}");
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
}

#[tokio::test]
async fn test_stop_simulator_401() {
    let (server, client, session) = setup(Some("stale")).await;
    let mut events = session.subscribe();

    Mock::given(method("DELETE"))
        .and(path("/api/v1/emitter/simulator/a1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.stop_simulator("a1").await.unwrap_err();

    assert!(err.is_auth_expired());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
}
