//! HTTP message model.
//!
//! # Data Flow
//! ```text
//! caller
//!     → request.rs (Invocation: method, URI, headers, entity, framing)
//!     → [client logging filter may wrap the entity]
//!     → connector puts it on the wire
//!     → response.rs (Response: status, headers, media type, entity stream)
//!     → [client logging filter may prefetch the entity head]
//!     → caller
//! ```
//!
//! `server.rs` holds the mirror-image types used on the receiving side.

pub mod entity;
pub mod media;
pub mod request;
pub mod response;
pub mod server;

pub use entity::{Entity, EntityStream, StreamingMode, WriteEntity};
pub use media::MediaType;
pub use request::{ExchangeContext, Invocation, InvocationBuilder};
pub use response::Response;
pub use server::{InboundRequest, OutboundResponse};
