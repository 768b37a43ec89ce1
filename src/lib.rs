//! HTTP client connector core with bounded entity logging.

pub mod client;
pub mod config;
pub mod connector;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod observability;

pub use client::Client;
pub use config::CourierConfig;
pub use connector::{Connector, ConnectorError, ConnectorResult};
pub use lifecycle::{AsyncInvocation, CancellationToken};
pub use logging::{LoggingFeature, Verbosity};
