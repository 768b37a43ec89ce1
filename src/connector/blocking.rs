//! Blocking connector on top of the `reqwest` blocking client.
//!
//! # Responsibilities
//! - Execute invocations on the calling thread
//! - Run asynchronous invocations on a named worker thread each
//! - Stream `CHUNKED` entities through the entity pipe
//!
//! # Design Decisions
//! - Connect and read timeouts come from [`TimeoutConfig`]
//! - Redirects are returned to the caller as-is, like every other connector
//! - Cancellation is observed before sending and at every entity read; a read
//!   already blocked on the socket returns at the next chunk or read timeout
//! - Must not be constructed, used or dropped inside an async context (the
//!   `reqwest` blocking client owns its own runtime)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{ConnectorConfig, TimeoutConfig};
use crate::connector::error::error_chain;
use crate::connector::pipe::blocking_pipe;
use crate::connector::{
    Capabilities, ChunkedSupport, Connector, ConnectorError, ConnectorResult, ResponseCallback,
};
use crate::http::response::response_has_entity;
use crate::http::{EntityStream, Invocation, Response, StreamingMode};
use crate::lifecycle::CancellationToken;

/// Connector backed by `reqwest::blocking::Client`.
#[derive(Clone)]
pub struct BlockingConnector {
    client: reqwest::blocking::Client,
    chunk_size: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
    workers: Arc<AtomicU64>,
}

impl BlockingConnector {
    pub const NAME: &'static str = "blocking";

    pub fn new(config: &ConnectorConfig, timeouts: &TimeoutConfig) -> ConnectorResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.read())
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| ConnectorError::Transport(error_chain(&e)))?;

        tracing::debug!(
            connect_timeout = ?timeouts.connect(),
            read_timeout = ?timeouts.read(),
            chunk_size = config.chunk_size,
            "Blocking connector created"
        );

        Ok(Self {
            client,
            chunk_size: config.chunk_size,
            connect_timeout: timeouts.connect(),
            read_timeout: timeouts.read(),
            workers: Arc::new(AtomicU64::new(1)),
        })
    }

    fn send(
        &self,
        invocation: Invocation,
        cancel: Option<&CancellationToken>,
    ) -> ConnectorResult<Response> {
        let (method, url, headers, entity, mode) = invocation.into_parts();
        let mode = self.capabilities().effective_mode(Self::NAME, mode)?;

        tracing::debug!(
            connector = Self::NAME,
            method = %method,
            url = %url,
            mode = %mode,
            "Executing invocation"
        );

        let mut request = self.client.request(method.clone(), url).headers(headers);
        if let Some(entity) = entity {
            request = match mode {
                StreamingMode::Buffered => request.body(entity.into_bytes()?.to_vec()),
                StreamingMode::Chunked => request.body(reqwest::blocking::Body::new(
                    blocking_pipe(entity, self.chunk_size)?,
                )),
            };
        }

        if cancel.is_some_and(|t| t.is_cancelled()) {
            return Err(ConnectorError::Cancelled);
        }

        let response = request.send().map_err(|e| self.map_error(e))?;

        if cancel.is_some_and(|t| t.is_cancelled()) {
            return Err(ConnectorError::Cancelled);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let entity = if response_has_entity(&method, status, &headers) {
            let stream = EntityStream::new(response);
            Some(match cancel {
                Some(token) => stream.with_cancellation(token.clone()),
                None => stream,
            })
        } else {
            None
        };

        tracing::debug!(connector = Self::NAME, status = %status, "Response received");
        Ok(Response::new(status, headers, entity))
    }

    fn map_error(&self, e: reqwest::Error) -> ConnectorError {
        if e.is_timeout() {
            let timeout = if e.is_connect() {
                self.connect_timeout
            } else {
                self.read_timeout
            };
            ConnectorError::Timeout(timeout)
        } else if e.is_connect() {
            ConnectorError::Connect(error_chain(&e))
        } else if e.is_builder() {
            ConnectorError::InvalidRequest(error_chain(&e))
        } else {
            ConnectorError::Transport(error_chain(&e))
        }
    }
}

impl Connector for BlockingConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            chunked: ChunkedSupport::Native,
        }
    }

    fn execute(&self, invocation: Invocation) -> ConnectorResult<Response> {
        self.send(invocation, None)
    }

    fn execute_async(
        &self,
        invocation: Invocation,
        cancel: CancellationToken,
        callback: ResponseCallback,
    ) {
        let connector = self.clone();
        let worker = self.workers.fetch_add(1, Ordering::Relaxed);
        let spawned = thread::Builder::new()
            .name(format!("courier-blocking-{}", worker))
            .spawn(move || {
                let result = if cancel.is_cancelled() {
                    Err(ConnectorError::Cancelled)
                } else {
                    connector.send(invocation, Some(&cancel))
                };
                callback(result);
            });

        if let Err(e) = spawned {
            // The callback went down with the closure; its handle reports the abandonment.
            tracing::error!(error = %e, "Failed to spawn blocking connector worker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_native_chunking() {
        let connector =
            BlockingConnector::new(&ConnectorConfig::default(), &TimeoutConfig::default()).unwrap();
        assert_eq!(connector.name(), "blocking");
        assert!(connector.capabilities().supports(StreamingMode::Chunked));
    }
}
