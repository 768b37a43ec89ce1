//! Invocation lifecycle: cancellation and asynchronous handles.
//!
//! # Data Flow
//! ```text
//! Client::submit
//!     → handle.rs (AsyncInvocation + Completer, state Pending)
//!     → cancel.rs (CancellationToken shared with the connector)
//!     → connector worker runs the exchange, checks the token at every read
//!     → Completer::complete  ─┐
//!     → AsyncInvocation::cancel ─┴─ exactly one terminal transition wins
//! ```
//!
//! # Design Decisions
//! - Cancellation is an explicit token, not a thread interrupt
//! - Cancelling interrupts transport reads, it does not merely mute callbacks
//! - A losing completion is dropped, which closes its response stream

pub mod cancel;
pub mod handle;

pub use cancel::CancellationToken;
pub use handle::{AsyncInvocation, Completer, InvocationState};
