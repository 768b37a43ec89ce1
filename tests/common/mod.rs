//! Shared backends for integration tests.
//!
//! Each server runs on its own thread with its own runtime so tests can drive
//! the synchronous connector API from plain `#[test]` functions.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use courier::config::{ConnectorConfig, ConnectorKind, TimeoutConfig};
use courier::connector::{self, Connector};
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

/// Number of chunks served by `/chunks`.
pub const CHUNK_COUNT: usize = 100;

/// Delay between two `/chunks` chunks.
pub const CHUNK_INTERVAL: Duration = Duration::from_millis(100);

/// A test backend listening on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
}

impl TestServer {
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }
}

/// Start the axum backend.
///
/// Routes:
/// - `/echo`: any method, echoes the entity and its content type; the
///   `x-echo-method`, `x-echo-framing` and `x-echo-accept` headers report what
///   arrived
/// - `/redirect`: `302 Found` pointing at `/text`
/// - `/text`: `0123456789` as `text/plain`
/// - `/bytes`: eight bytes as `application/octet-stream`
/// - `/chunks`: [`CHUNK_COUNT`] ten-byte chunks, one per [`CHUNK_INTERVAL`]
/// - `/slow`: answers after two seconds
pub fn start_backend() -> TestServer {
    let app = Router::new()
        .route("/echo", any(echo))
        .route("/redirect", get(redirect))
        .route("/text", get(text))
        .route("/bytes", get(binary))
        .route("/chunks", get(chunks))
        .route("/slow", get(slow));

    spawn_runtime(|addr_tx| async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        addr_tx.send(listener.local_addr().unwrap()).unwrap();
        axum::serve(listener, app).await.unwrap();
    })
}

/// Start a TCP backend that accepts connections and never answers.
pub fn start_stalled_backend() -> TestServer {
    spawn_runtime(|addr_tx| async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        addr_tx.send(listener.local_addr().unwrap()).unwrap();
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    })
}

/// An address nothing listens on.
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn spawn_runtime<F, Fut>(serve: F) -> TestServer
where
    F: FnOnce(mpsc::Sender<SocketAddr>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()>,
{
    let (addr_tx, addr_rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(serve(addr_tx));
    });
    let addr = addr_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    TestServer { addr }
}

/// Network connector of `kind` with the given read timeout.
pub fn network_connector(kind: ConnectorKind, read: Duration) -> Arc<dyn Connector> {
    let config = ConnectorConfig {
        kind,
        chunk_size: 4,
        ..ConnectorConfig::default()
    };
    let timeouts = TimeoutConfig {
        connect_ms: 2_000,
        read_ms: read.as_millis() as u64,
    };
    connector::from_config(&config, &timeouts).unwrap()
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Response {
    let framing = if headers
        .get(header::TRANSFER_ENCODING)
        .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"chunked"))
    {
        "chunked"
    } else if headers.contains_key(header::CONTENT_LENGTH) {
        "length"
    } else {
        "none"
    };

    let mut response = (StatusCode::OK, body).into_response();
    let out = response.headers_mut();
    out.remove(header::CONTENT_TYPE);
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        out.insert(header::CONTENT_TYPE, content_type.clone());
    }
    out.insert("x-echo-method", HeaderValue::from_str(method.as_str()).unwrap());
    out.insert("x-echo-framing", HeaderValue::from_static(framing));
    if let Some(accept) = headers.get(header::ACCEPT) {
        out.insert("x-echo-accept", accept.clone());
    }
    response
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/text")], "moved")
}

async fn text() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "0123456789")
}

async fn binary() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        vec![0u8, 1, 2, 3, 0xfc, 0xfd, 0xfe, 0xff],
    )
}

async fn chunks() -> impl IntoResponse {
    let stream = futures_util::stream::unfold(0usize, |n| async move {
        if n == CHUNK_COUNT {
            return None;
        }
        if n > 0 {
            tokio::time::sleep(CHUNK_INTERVAL).await;
        }
        let chunk = Bytes::from(format!("chunk {:03}\n", n));
        Some((Ok::<_, Infallible>(chunk), n + 1))
    });
    (
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(stream),
    )
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "late"
}
