//! Shared machinery of the client and server logging filters.
//!
//! # Responsibilities
//! - Compose the request/status line and sorted header block of a record
//! - Defer outbound records until the entity has actually been written
//! - Prefetch the head of inbound entities and push it back unconsumed
//!
//! # Data Flow
//! ```text
//! outbound: head lines → LoggedEntity wraps the entity
//!           → connector writes through LoggingStream → record logged
//! inbound:  head lines → read up to max + 1 bytes → render → unread → record logged
//! ```
//!
//! # Design Decisions
//! - A disabled logger/level pair costs one `enabled` call: no id, no buffer
//! - Each record is logged whole in one sink call, or not at all

use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;

use http::HeaderMap;
use tracing::Level;
use url::Url;

use crate::http::{Entity, EntityStream, MediaType, WriteEntity};
use crate::logging::buffer::{BoundedEntityBuffer, LoggingStream};
use crate::logging::record::{LogRecordId, LogRecordIds};
use crate::logging::sink::LogSink;
use crate::logging::verbosity::Verbosity;

/// Marks lines of an outgoing request.
pub const REQUEST_PREFIX: &str = "> ";
/// Marks lines of a response.
pub const RESPONSE_PREFIX: &str = "< ";
/// Marks the informational first line of a record.
pub const NOTIFICATION_PREFIX: &str = "* ";

pub const DEFAULT_LOGGER_NAME: &str = "courier::logging";
pub const DEFAULT_LEVEL: Level = Level::DEBUG;
pub const DEFAULT_MAX_ENTITY_SIZE: i64 = 8 * 1024;
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Fully resolved settings of one filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Reported as the `logger` field of each record. Records are emitted
    /// under the `courier::logging` target, so subscribers filter on that
    /// target and on the `logger` field; [`TracingSink`] does not use the name
    /// to decide whether a level is enabled.
    ///
    /// [`TracingSink`]: crate::logging::TracingSink
    pub logger_name: String,
    pub level: Level,
    pub verbosity: Verbosity,
    /// Negative values are treated as zero.
    pub max_entity_size: i64,
    pub separator: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            logger_name: DEFAULT_LOGGER_NAME.to_string(),
            level: DEFAULT_LEVEL,
            verbosity: Verbosity::default(),
            max_entity_size: DEFAULT_MAX_ENTITY_SIZE,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Record composition shared by [`ClientLoggingFilter`] and
/// [`ServerLoggingFilter`].
///
/// [`ClientLoggingFilter`]: crate::logging::ClientLoggingFilter
/// [`ServerLoggingFilter`]: crate::logging::ServerLoggingFilter
pub struct LoggingInterceptor {
    logger_name: String,
    level: Level,
    verbosity: Verbosity,
    max_entity_size: usize,
    separator: String,
    sink: Arc<dyn LogSink>,
    ids: Arc<LogRecordIds>,
}

impl LoggingInterceptor {
    pub fn new(settings: LoggingSettings, sink: Arc<dyn LogSink>, ids: Arc<LogRecordIds>) -> Self {
        if settings.max_entity_size < 0 {
            tracing::warn!(
                max_entity_size = settings.max_entity_size,
                "Negative max entity size, logging headers only"
            );
        }
        let max_entity_size = usize::try_from(settings.max_entity_size.max(0)).unwrap_or(usize::MAX);

        Self {
            logger_name: settings.logger_name,
            level: settings.level,
            verbosity: settings.verbosity,
            max_entity_size,
            separator: settings.separator,
            sink,
            ids,
        }
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Effective limit after clamping.
    pub fn max_entity_size(&self) -> usize {
        self.max_entity_size
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn ids(&self) -> &Arc<LogRecordIds> {
        &self.ids
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.sink.enabled(&self.logger_name, self.level)
    }

    pub(crate) fn next_id(&self) -> LogRecordId {
        self.ids.next()
    }

    pub(crate) fn prints_entity(&self, media_type: Option<&MediaType>) -> bool {
        self.verbosity.prints_entity(media_type)
    }

    pub(crate) fn log(&self, message: &str) {
        if self.is_enabled() {
            self.sink.log(&self.logger_name, self.level, message);
        }
    }

    fn notification(&self, b: &mut String, id: LogRecordId, note: &str) {
        let current = thread::current();
        let _ = match current.name() {
            Some(name) => write!(b, "{} {}{} on thread {}", id, NOTIFICATION_PREFIX, note, name),
            None => write!(
                b,
                "{} {}{} on thread {:?}",
                id,
                NOTIFICATION_PREFIX,
                note,
                current.id()
            ),
        };
        b.push_str(&self.separator);
    }

    pub(crate) fn request_line(
        &self,
        b: &mut String,
        note: &str,
        id: LogRecordId,
        method: &http::Method,
        url: &Url,
    ) {
        self.notification(b, id, note);
        let _ = write!(b, "{} {}{} {}", id, REQUEST_PREFIX, method, url.as_str());
        b.push_str(&self.separator);
    }

    pub(crate) fn response_line(
        &self,
        b: &mut String,
        note: &str,
        id: LogRecordId,
        status: http::StatusCode,
    ) {
        self.notification(b, id, note);
        let _ = write!(b, "{} {}{}", id, RESPONSE_PREFIX, status.as_u16());
        b.push_str(&self.separator);
    }

    /// One line per header name, sorted case-insensitively, values joined by `,`.
    pub(crate) fn prefixed_headers(
        &self,
        b: &mut String,
        id: LogRecordId,
        prefix: &str,
        headers: &HeaderMap,
    ) {
        let mut names: Vec<_> = headers.keys().collect();
        names.sort_by_key(|name| name.as_str().to_ascii_lowercase());

        for name in names {
            let values: Vec<_> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()))
                .collect();
            let _ = write!(b, "{} {}{}: {}", id, prefix, name, values.join(","));
            b.push_str(&self.separator);
        }
    }

    /// Log `head` now, or wrap `entity` so the record is logged once the
    /// entity has been written.
    pub(crate) fn log_outbound(
        self: &Arc<Self>,
        head: String,
        entity: Option<Entity>,
        media_type: Option<&MediaType>,
    ) -> Option<Entity> {
        match entity {
            Some(entity) if self.prints_entity(media_type) => {
                Some(Entity::Stream(Box::new(LoggedEntity {
                    inner: entity,
                    head,
                    charset: media_type.and_then(|m| m.charset().map(str::to_string)),
                    interceptor: Arc::clone(self),
                })))
            }
            entity => {
                self.log(&head);
                entity
            }
        }
    }

    /// Append the head of `stream` to `b` and return a stream that still
    /// yields every byte.
    pub(crate) fn log_inbound_entity(
        &self,
        b: &mut String,
        mut stream: EntityStream,
        media_type: Option<&MediaType>,
    ) -> io::Result<EntityStream> {
        let limit = u64::try_from(self.max_entity_size)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut head = Vec::new();
        (&mut stream).take(limit).read_to_end(&mut head)?;

        let mut buffer = BoundedEntityBuffer::new(self.max_entity_size);
        buffer.record(&head);
        buffer.render_into(b, media_type.and_then(MediaType::charset), &self.separator);

        Ok(stream.unread(head))
    }
}

impl std::fmt::Debug for LoggingInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingInterceptor")
            .field("logger_name", &self.logger_name)
            .field("level", &self.level)
            .field("verbosity", &self.verbosity)
            .field("max_entity_size", &self.max_entity_size)
            .field("separator", &self.separator)
            .finish_non_exhaustive()
    }
}

/// Outgoing entity that logs its record after being written.
struct LoggedEntity {
    inner: Entity,
    head: String,
    charset: Option<String>,
    interceptor: Arc<LoggingInterceptor>,
}

impl WriteEntity for LoggedEntity {
    fn write_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<()> {
        let LoggedEntity {
            inner,
            mut head,
            charset,
            interceptor,
        } = *self;

        let mut stream = LoggingStream::new(out, interceptor.max_entity_size);
        inner.write_to(&mut stream)?;
        stream.flush()?;

        let (_, buffer) = stream.into_parts();
        buffer.render_into(&mut head, charset.as_deref(), &interceptor.separator);
        interceptor.log(&head);
        Ok(())
    }
}
