//! Pluggable transports.
//!
//! # Data Flow
//! ```text
//! Invocation
//!     → Capabilities::effective_mode (fail fast or degrade before any byte)
//!     → BUFFERED: entity materialized, Content-Length sent
//!       CHUNKED:  pipe.rs streams the producer from a writer thread
//!     → backend (blocking.rs | hyper_client.rs | in_memory.rs)
//!     → Response (entity stream checks the cancellation token per read)
//! ```
//!
//! # Design Decisions
//! - Everything above this trait is connector-agnostic
//! - A connector that cannot stream either buffers (documented in its
//!   capabilities) or rejects the invocation; it never truncates
//! - Transport failures are returned, never retried here

pub mod blocking;
pub mod error;
pub mod hyper_client;
pub mod in_memory;
pub mod pipe;

use std::sync::Arc;

pub use blocking::BlockingConnector;
pub use error::{ConnectorError, ConnectorResult};
pub use hyper_client::HyperConnector;
pub use in_memory::InMemoryConnector;

use crate::config::{ConnectorConfig, ConnectorKind, TimeoutConfig};
use crate::http::{Invocation, Response, StreamingMode};
use crate::lifecycle::CancellationToken;

/// Receives the outcome of an asynchronous execution on a connector worker.
///
/// The callback may block (for example to read the entity); connectors run it
/// on a thread where blocking is allowed.
pub type ResponseCallback = Box<dyn FnOnce(ConnectorResult<Response>) + Send + 'static>;

/// How a connector handles `CHUNKED` request entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkedSupport {
    /// Streams the entity without materializing it.
    Native,
    /// Materializes the entity and sends it with a `Content-Length`.
    Buffered,
    /// Rejects chunked invocations.
    Unsupported,
}

/// Capability description of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub chunked: ChunkedSupport,
}

impl Capabilities {
    pub fn supports(&self, mode: StreamingMode) -> bool {
        match mode {
            StreamingMode::Buffered => true,
            StreamingMode::Chunked => self.chunked != ChunkedSupport::Unsupported,
        }
    }

    /// The framing actually used for `mode`, or the capability error.
    pub fn effective_mode(
        &self,
        connector: &'static str,
        mode: StreamingMode,
    ) -> ConnectorResult<StreamingMode> {
        match (mode, self.chunked) {
            (StreamingMode::Buffered, _) => Ok(StreamingMode::Buffered),
            (StreamingMode::Chunked, ChunkedSupport::Native) => Ok(StreamingMode::Chunked),
            (StreamingMode::Chunked, ChunkedSupport::Buffered) => {
                tracing::debug!(connector, "Buffering chunked entity");
                Ok(StreamingMode::Buffered)
            }
            (StreamingMode::Chunked, ChunkedSupport::Unsupported) => {
                Err(ConnectorError::Unsupported { connector, mode })
            }
        }
    }
}

/// A transport that executes invocations.
pub trait Connector: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Execute on the calling thread and return once the response head is in.
    fn execute(&self, invocation: Invocation) -> ConnectorResult<Response>;

    /// Start executing and return immediately.
    ///
    /// The outcome is passed to `callback` on a connector-owned thread. Entity
    /// streams of the response stop delivering bytes once `cancel` fires.
    fn execute_async(
        &self,
        invocation: Invocation,
        cancel: CancellationToken,
        callback: ResponseCallback,
    );
}

/// Build the network connector selected by `config`.
pub fn from_config(
    config: &ConnectorConfig,
    timeouts: &TimeoutConfig,
) -> ConnectorResult<Arc<dyn Connector>> {
    let connector: Arc<dyn Connector> = match config.kind {
        ConnectorKind::Blocking => Arc::new(BlockingConnector::new(config, timeouts)?),
        ConnectorKind::Hyper => Arc::new(HyperConnector::new(config, timeouts)?),
    };
    tracing::info!(connector = connector.name(), "Connector initialized");
    Ok(connector)
}
