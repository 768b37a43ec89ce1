//! In-process connector.
//!
//! # Responsibilities
//! - Hand invocations to a handler function without touching the network
//! - Optionally run the server logging filter around the handler
//!
//! # Design Decisions
//! - Entities are materialized on both sides; `CHUNKED` invocations are
//!   buffered, or rejected when the connector is built [`strict`]
//! - Asynchronous invocations run on a named thread each
//!
//! [`strict`]: InMemoryConnector::strict

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use http::header::{HeaderValue, CONTENT_LENGTH};

use crate::connector::{
    Capabilities, ChunkedSupport, Connector, ConnectorError, ConnectorResult, ResponseCallback,
};
use crate::http::response::response_has_entity;
use crate::http::{Entity, EntityStream, InboundRequest, Invocation, OutboundResponse, Response};
use crate::lifecycle::CancellationToken;
use crate::logging::ServerLoggingFilter;

/// Request handler served by an [`InMemoryConnector`].
pub type Handler = Arc<dyn Fn(InboundRequest) -> OutboundResponse + Send + Sync>;

/// Connector that serves invocations from an in-process handler.
#[derive(Clone)]
pub struct InMemoryConnector {
    handler: Handler,
    logging: Option<ServerLoggingFilter>,
    chunked: ChunkedSupport,
    workers: Arc<AtomicU64>,
}

impl InMemoryConnector {
    pub const NAME: &'static str = "in-memory";

    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(InboundRequest) -> OutboundResponse + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            logging: None,
            chunked: ChunkedSupport::Buffered,
            workers: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Reject `CHUNKED` invocations instead of buffering them.
    pub fn strict(mut self) -> Self {
        self.chunked = ChunkedSupport::Unsupported;
        self
    }

    /// Log each exchange as the receiving server would.
    pub fn with_server_logging(mut self, filter: ServerLoggingFilter) -> Self {
        self.logging = Some(filter);
        self
    }

    fn dispatch(
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
            "Dispatching invocation"
        );

        let body = entity.map(Entity::into_bytes).transpose()?;
        let mut request = InboundRequest::new(
            method.clone(),
            url,
            headers,
            body.map(EntityStream::from_bytes),
        );

        if let Some(logging) = &self.logging {
            logging.filter_request(&mut request)?;
        }
        let context = request.context;

        if cancel.is_some_and(|t| t.is_cancelled()) {
            return Err(ConnectorError::Cancelled);
        }

        let mut response = (self.handler)(request);
        if let Some(logging) = &self.logging {
            logging.filter_response(context, &mut response);
        }

        let OutboundResponse {
            status,
            mut headers,
            entity,
        } = response;
        // Writing the entity completes any deferred server record.
        let body = entity.map(Entity::into_bytes).transpose()?;
        if let Some(body) = &body {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let entity = body
            .filter(|_| response_has_entity(&method, status, &headers))
            .map(|bytes| {
                let stream = EntityStream::from_bytes(bytes);
                match cancel {
                    Some(token) => stream.with_cancellation(token.clone()),
                    None => stream,
                }
            });

        Ok(Response::new(status, headers, entity))
    }
}

impl Connector for InMemoryConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            chunked: self.chunked,
        }
    }

    fn execute(&self, invocation: Invocation) -> ConnectorResult<Response> {
        self.dispatch(invocation, None)
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
            .name(format!("courier-in-memory-{}", worker))
            .spawn(move || {
                let result = if cancel.is_cancelled() {
                    Err(ConnectorError::Cancelled)
                } else {
                    connector.dispatch(invocation, Some(&cancel))
                };
                callback(result);
            });

        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to spawn in-memory connector worker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StreamingMode;
    use http::{Method, StatusCode};
    use url::Url;

    fn echo() -> InMemoryConnector {
        InMemoryConnector::new(|mut request| {
            let body = request.read_string().unwrap_or_default();
            OutboundResponse::new(StatusCode::OK).entity(body)
        })
    }

    fn patch(mode: StreamingMode) -> Invocation {
        Invocation::builder(Method::PATCH, Url::parse("http://in-memory/echo").unwrap())
            .entity(Entity::from_writer(|out| out.write_all(b"patch")))
            .mode(mode)
            .build()
            .unwrap()
    }

    #[test]
    fn echoes_entities() {
        let mut response = echo().execute(patch(StreamingMode::Buffered)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "5");
        assert_eq!(response.read_string().unwrap(), "patch");
    }

    #[test]
    fn buffers_chunked_unless_strict() {
        let mut response = echo().execute(patch(StreamingMode::Chunked)).unwrap();
        assert_eq!(response.read_string().unwrap(), "patch");

        let err = echo().strict().execute(patch(StreamingMode::Chunked)).unwrap_err();
        assert!(matches!(err, ConnectorError::Unsupported { connector: "in-memory", .. }));
    }

    #[test]
    fn head_responses_carry_no_entity() {
        let connector = InMemoryConnector::new(|_| OutboundResponse::new(StatusCode::OK).entity("ignored"));
        let invocation = Invocation::builder(Method::HEAD, Url::parse("http://in-memory/").unwrap())
            .build()
            .unwrap();
        let response = connector.execute(invocation).unwrap();
        assert!(!response.has_entity());
    }
}
