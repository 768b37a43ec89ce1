//! Log record identifiers.
//!
//! # Responsibilities
//! - Correlate the request and response records of one exchange
//! - Hand out distinct ids to concurrent exchanges
//!
//! # Design Decisions
//! - The counter is owned by a logging configuration, not a process global;
//!   filters share one only when built with the same `Arc<LogRecordIds>`
//! - Relaxed ordering is sufficient since only uniqueness is required

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier shared by the records of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogRecordId(u64);

impl LogRecordId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Atomic source of [`LogRecordId`]s. The first id handed out is 1.
#[derive(Debug, Default)]
pub struct LogRecordIds {
    last: AtomicU64,
}

impl LogRecordIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id with a single atomic increment.
    pub fn next(&self) -> LogRecordId {
        LogRecordId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
