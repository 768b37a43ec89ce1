//! Request/response logging with bounded entity capture.
//!
//! # Data Flow
//! ```text
//! LoggingFeature (explicit > role > common > default)
//!     → LoggingInterceptor (settings, sink, id counter)
//!     → ClientLoggingFilter: request record (deferred past the entity write)
//!                            response record (entity head prefetched)
//!     → ServerLoggingFilter: the same, mirrored
//!     → LogSink (tracing by default)
//! ```
//!
//! Every line of a record starts with the record id and a direction marker
//! (`> ` request, `< ` response, `* ` notification), so interleaved records of
//! concurrent exchanges can be told apart.
//!
//! # Design Decisions
//! - Logging never fails an exchange; only transport errors met while
//!   prefetching an inbound entity propagate
//! - Buffers are per message and never reused

pub mod buffer;
pub mod client;
pub mod feature;
pub mod interceptor;
pub mod record;
pub mod server;
pub mod sink;
pub mod verbosity;

pub use buffer::{BoundedEntityBuffer, LoggingStream, TRUNCATION_MARKER};
pub use client::ClientLoggingFilter;
pub use feature::{LoggingFeature, LoggingFeatureBuilder};
pub use interceptor::{LoggingInterceptor, LoggingSettings};
pub use record::{LogRecordId, LogRecordIds};
pub use server::ServerLoggingFilter;
pub use sink::{parse_level, LogRecord, LogSink, RecordingSink, TracingSink};
pub use verbosity::Verbosity;
