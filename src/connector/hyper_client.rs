//! Event-loop connector on top of the `hyper` client.
//!
//! # Responsibilities
//! - Own a tokio runtime that drives every exchange of this connector
//! - Stream `CHUNKED` entities as `Transfer-Encoding: chunked` frames
//! - Bridge the async response body to a blocking [`EntityStream`]
//!
//! # Data Flow
//! ```text
//! execute_async
//!     → runtime task: build body → client.request (read timeout, cancel race)
//!     → spawn_blocking: callback(Response)
//! response entity read
//!     → Handle::block_on(next frame | read timeout | cancel)
//! ```
//!
//! # Design Decisions
//! - The runtime is shared by the connector, its in-flight exchanges and every
//!   response entity it handed out; it is shut down in the background once the
//!   last of them is dropped, so a response outlives its connector and any
//!   thread may release the final reference
//! - `Accept: */*` is sent when the caller sets no `Accept`, matching the
//!   blocking connector's wire headers
//! - Blocking entry points (`execute`, entity reads) must not be called from
//!   inside an async context

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, ACCEPT};
use http::{Method, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Body, Frame, Incoming};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;

use crate::config::{ConnectorConfig, TimeoutConfig};
use crate::connector::error::{error_chain, io_error_kind};
use crate::connector::pipe::{spawn_entity_writer, truncated_error, Chunk, PIPE_DEPTH};
use crate::connector::{
    Capabilities, ChunkedSupport, Connector, ConnectorError, ConnectorResult, ResponseCallback,
};
use crate::http::entity::cancelled_io_error;
use crate::http::response::response_has_entity;
use crate::http::{Entity, EntityStream, Invocation, Response, StreamingMode};
use crate::lifecycle::CancellationToken;

type RequestBody = UnsyncBoxBody<Bytes, io::Error>;
type HttpClient = Client<HttpConnector, RequestBody>;

/// Runtime kept alive by every holder of an `Arc<SharedRuntime>`.
struct SharedRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl SharedRuntime {
    fn new(runtime: Runtime) -> Arc<Self> {
        Arc::new(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }
}

impl Drop for SharedRuntime {
    fn drop(&mut self) {
        // The last reference may be released on one of the runtime's own threads.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            tracing::debug!("Hyper connector runtime released");
        }
    }
}

/// Connector backed by `hyper_util`'s pooled client on an owned runtime.
pub struct HyperConnector {
    runtime: Arc<SharedRuntime>,
    client: HttpClient,
    chunk_size: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl HyperConnector {
    pub const NAME: &'static str = "hyper";

    pub fn new(config: &ConnectorConfig, timeouts: &TimeoutConfig) -> ConnectorResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name_fn(|| {
                static WORKER: AtomicUsize = AtomicUsize::new(1);
                format!("courier-hyper-{}", WORKER.fetch_add(1, Ordering::Relaxed))
            })
            .enable_all()
            .build()?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);

        let client = {
            let _guard = runtime.enter();
            Client::builder(TokioExecutor::new()).build(connector)
        };

        tracing::debug!(
            worker_threads = config.worker_threads,
            connect_timeout = ?timeouts.connect(),
            read_timeout = ?timeouts.read(),
            "Hyper connector created"
        );

        Ok(Self {
            runtime: SharedRuntime::new(runtime),
            client,
            chunk_size: config.chunk_size,
            connect_timeout: timeouts.connect(),
            read_timeout: timeouts.read(),
        })
    }

    fn exchange_context(&self) -> Exchange {
        Exchange {
            client: self.client.clone(),
            runtime: Arc::clone(&self.runtime),
            chunk_size: self.chunk_size,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
        }
    }
}

impl Connector for HyperConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            chunked: ChunkedSupport::Native,
        }
    }

    fn execute(&self, invocation: Invocation) -> ConnectorResult<Response> {
        let exchange = self.exchange_context();
        let (method, response) = self.runtime.handle.block_on(exchange.send(invocation))?;
        Ok(exchange.into_response(response, &method, None))
    }

    fn execute_async(
        &self,
        invocation: Invocation,
        cancel: CancellationToken,
        callback: ResponseCallback,
    ) {
        let exchange = self.exchange_context();
        self.runtime.handle.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ConnectorError::Cancelled),
                sent = exchange.send(invocation) => sent,
            };
            let result = outcome
                .map(|(method, response)| exchange.into_response(response, &method, Some(cancel)));

            // The callback may block on the entity.
            tokio::task::spawn_blocking(move || callback(result));
        });
    }
}

/// Everything one exchange needs, detached from the connector.
struct Exchange {
    client: HttpClient,
    runtime: Arc<SharedRuntime>,
    chunk_size: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Exchange {
    async fn send(
        &self,
        invocation: Invocation,
    ) -> ConnectorResult<(Method, http::Response<Incoming>)> {
        let (method, url, headers, entity, mode) = invocation.into_parts();
        let capabilities = Capabilities {
            chunked: ChunkedSupport::Native,
        };
        let mode = capabilities.effective_mode(HyperConnector::NAME, mode)?;

        tracing::debug!(
            connector = HyperConnector::NAME,
            method = %method,
            url = %url,
            mode = %mode,
            "Executing invocation"
        );

        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| ConnectorError::InvalidRequest(format!("{}: {}", url, e)))?;

        let body: RequestBody = match entity {
            None => Empty::<Bytes>::new()
                .map_err(|never| -> io::Error { match never {} })
                .boxed_unsync(),
            Some(entity) => match mode {
                StreamingMode::Buffered => {
                    let bytes = materialize(entity).await?;
                    Full::new(bytes)
                        .map_err(|never| -> io::Error { match never {} })
                        .boxed_unsync()
                }
                StreamingMode::Chunked => channel_body(entity, self.chunk_size)?.boxed_unsync(),
            },
        };

        let mut request = http::Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(body)
            .map_err(|e| ConnectorError::InvalidRequest(e.to_string()))?;
        *request.headers_mut() = headers;
        request
            .headers_mut()
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static("*/*"));

        match tokio::time::timeout(self.read_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    connector = HyperConnector::NAME,
                    status = %response.status(),
                    "Response received"
                );
                Ok((method, response))
            }
            Ok(Err(e)) => Err(self.map_error(e)),
            Err(_) => Err(ConnectorError::Timeout(self.read_timeout)),
        }
    }

    fn map_error(&self, e: hyper_util::client::legacy::Error) -> ConnectorError {
        let kind = io_error_kind(&e);
        if e.is_connect() {
            if kind == Some(io::ErrorKind::TimedOut) {
                ConnectorError::Timeout(self.connect_timeout)
            } else {
                ConnectorError::Connect(error_chain(&e))
            }
        } else if let Some(kind) = kind {
            ConnectorError::Io(io::Error::new(kind, error_chain(&e)))
        } else {
            ConnectorError::Transport(error_chain(&e))
        }
    }

    fn into_response(
        &self,
        response: http::Response<Incoming>,
        method: &Method,
        cancel: Option<CancellationToken>,
    ) -> Response {
        let (parts, body) = response.into_parts();
        let entity = if response_has_entity(method, parts.status, &parts.headers)
            && !body.is_end_stream()
        {
            let reader = IncomingReader {
                body: Some(body),
                current: Bytes::new(),
                runtime: Arc::clone(&self.runtime),
                read_timeout: self.read_timeout,
                cancel: cancel.clone(),
            };
            let stream = EntityStream::new(reader);
            Some(match cancel {
                Some(token) => stream.with_cancellation(token),
                None => stream,
            })
        } else {
            None
        };
        Response::new(parts.status, parts.headers, entity)
    }
}

/// Run a producer entity to completion off the async workers.
async fn materialize(entity: Entity) -> ConnectorResult<Bytes> {
    match entity {
        Entity::Bytes(bytes) => Ok(bytes),
        stream => tokio::task::spawn_blocking(move || stream.into_bytes())
            .await
            .map_err(|e| ConnectorError::Transport(format!("entity producer panicked: {}", e)))?
            .map_err(ConnectorError::from),
    }
}

/// Request body fed by the entity writer thread.
struct ChannelBody {
    rx: mpsc::Receiver<Chunk>,
    done: bool,
}

fn channel_body(entity: Entity, chunk_size: usize) -> io::Result<ChannelBody> {
    let (tx, rx) = mpsc::channel(PIPE_DEPTH);
    spawn_entity_writer(entity, chunk_size, move |chunk| tx.blocking_send(chunk).is_ok())?;
    Ok(ChannelBody { rx, done: false })
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        if self.done {
            return Poll::Ready(None);
        }
        let next = ready!(self.rx.poll_recv(cx));
        Poll::Ready(match next {
            Some(Chunk::Data(bytes)) => Some(Ok(Frame::data(bytes))),
            Some(Chunk::End) => {
                self.done = true;
                None
            }
            Some(Chunk::Failed(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                Some(Err(truncated_error()))
            }
        })
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }
}

/// Blocking view of a response body.
struct IncomingReader {
    body: Option<Incoming>,
    current: Bytes,
    runtime: Arc<SharedRuntime>,
    read_timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl IncomingReader {
    fn next_frame(&mut self) -> io::Result<Option<Bytes>> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };
        let read_timeout = self.read_timeout;
        let cancel = self.cancel.clone();

        let next = self.runtime.handle.block_on(async move {
            let frame = tokio::time::timeout(read_timeout, body.frame());
            let frame = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled_io_error()),
                    frame = frame => frame,
                },
                None => frame.await,
            };
            match frame {
                Ok(Some(Ok(frame))) => Ok(Some(frame)),
                Ok(Some(Err(e))) => Err(io::Error::new(io::ErrorKind::Other, e)),
                Ok(None) => Ok(None),
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no response data within {:?}", read_timeout),
                )),
            }
        });

        match next {
            // Trailers carry no entity bytes.
            Ok(Some(frame)) => Ok(Some(frame.into_data().unwrap_or_default())),
            Ok(None) => {
                self.body = None;
                Ok(None)
            }
            Err(e) => {
                self.body = None;
                Err(e)
            }
        }
    }
}

impl Read for IncomingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            match self.next_frame()? {
                Some(data) => self.current = data,
                None => return Ok(0),
            }
        }
        let n = self.current.len().min(buf.len());
        buf[..n].copy_from_slice(&self.current.split_to(n));
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_body_reports_dead_producer() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let entity = Entity::from_writer(|out| {
            out.write_all(b"half")?;
            Err(io::Error::new(io::ErrorKind::Other, "producer failed"))
        });
        let body = channel_body(entity, 2).unwrap();
        let err = runtime
            .block_on(body.collect())
            .map(|c| c.to_bytes())
            .unwrap_err();
        assert_eq!(err.to_string(), "producer failed");
    }

    #[test]
    fn channel_body_streams_all_chunks() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let entity = Entity::from_writer(|out| out.write_all(b"0123456789"));
        let body = channel_body(entity, 3).unwrap();
        let bytes = runtime.block_on(body.collect()).unwrap().to_bytes();
        assert_eq!(&bytes[..], b"0123456789");
    }
}
