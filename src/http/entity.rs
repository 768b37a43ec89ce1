//! Request/response entities.
//!
//! An outgoing entity is either materialized bytes or a producer that writes
//! itself into a sink. Connectors decide how the producer is driven: into a
//! buffer (to compute `Content-Length`) or through a pipe (chunked).
//!
//! An incoming entity is an [`EntityStream`]: a `Read` that refuses to deliver
//! more bytes once its invocation has been cancelled.

use std::fmt;
use std::io::{self, Cursor, Read, Write};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::lifecycle::CancellationToken;

/// How a request entity is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamingMode {
    /// Materialize the entity and send a `Content-Length`.
    #[default]
    Buffered,
    /// Stream the entity with chunked transfer coding.
    Chunked,
}

impl fmt::Display for StreamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamingMode::Buffered => f.write_str("BUFFERED"),
            StreamingMode::Chunked => f.write_str("CHUNKED"),
        }
    }
}

/// A producer of entity bytes, consumed exactly once.
pub trait WriteEntity: Send + 'static {
    fn write_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<()>;
}

struct FnEntity<F>(F);

impl<F> WriteEntity for FnEntity<F>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
{
    fn write_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<()> {
        let FnEntity(f) = *self;
        f(out)
    }
}

struct ReaderEntity<R>(R);

impl<R: Read + Send + 'static> WriteEntity for ReaderEntity<R> {
    fn write_to(mut self: Box<Self>, out: &mut dyn Write) -> io::Result<()> {
        io::copy(&mut self.0, out).map(|_| ())
    }
}

/// An outgoing request or response body.
pub enum Entity {
    Bytes(Bytes),
    Stream(Box<dyn WriteEntity>),
}

impl Entity {
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Entity::Bytes(bytes.into())
    }

    /// Entity produced by a closure writing into the transport sink.
    pub fn from_writer<F>(f: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        Entity::Stream(Box::new(FnEntity(f)))
    }

    /// Entity copied out of a reader when the connector writes it.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Entity::Stream(Box::new(ReaderEntity(reader)))
    }

    /// Length when known without running the producer.
    pub fn known_length(&self) -> Option<u64> {
        match self {
            Entity::Bytes(b) => Some(b.len() as u64),
            Entity::Stream(_) => None,
        }
    }

    pub fn write_to(self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            Entity::Bytes(b) => out.write_all(&b),
            Entity::Stream(producer) => producer.write_to(out),
        }
    }

    /// Run the producer to completion and return the bytes it wrote.
    pub fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            Entity::Bytes(b) => Ok(b),
            Entity::Stream(producer) => {
                let mut buf = Vec::new();
                producer.write_to(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Entity::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Entity {
    fn from(b: Bytes) -> Self {
        Entity::Bytes(b)
    }
}

impl From<Vec<u8>> for Entity {
    fn from(v: Vec<u8>) -> Self {
        Entity::Bytes(Bytes::from(v))
    }
}

impl From<String> for Entity {
    fn from(s: String) -> Self {
        Entity::Bytes(Bytes::from(s))
    }
}

impl From<&'static str> for Entity {
    fn from(s: &'static str) -> Self {
        Entity::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

/// Incoming entity bytes.
pub struct EntityStream {
    inner: Box<dyn Read + Send>,
    cancel: Option<CancellationToken>,
}

impl EntityStream {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(reader),
            cancel: None,
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(Cursor::new(bytes.into()))
    }

    /// Stop delivering bytes once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Push already-consumed bytes back in front of the remaining stream.
    pub fn unread(self, prefix: Vec<u8>) -> Self {
        if prefix.is_empty() {
            return self;
        }
        Self {
            inner: Box::new(Cursor::new(prefix).chain(self.inner)),
            cancel: self.cancel,
        }
    }

    pub fn read_to_bytes(&mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Read the rest of the stream as UTF-8, replacing invalid sequences.
    pub fn read_to_string_lossy(&mut self) -> io::Result<String> {
        let bytes = self.read_to_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Read for EntityStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(cancelled_io_error());
        }
        self.inner.read(buf)
    }
}

impl fmt::Debug for EntityStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStream")
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// The error an entity read reports after cancellation.
pub(crate) fn cancelled_io_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "invocation cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_materializes() {
        let entity = Entity::from_writer(|out| {
            out.write_all(b"hello ")?;
            out.write_all(b"world")
        });
        assert_eq!(entity.known_length(), None);
        assert_eq!(entity.into_bytes().unwrap(), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn reader_entity_copies() {
        let entity = Entity::from_reader(Cursor::new(b"abc".to_vec()));
        let mut out = Vec::new();
        entity.write_to(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn unread_restores_prefix() {
        let mut stream = EntityStream::from_bytes("0123456789");
        let mut head = [0u8; 4];
        stream.read_exact(&mut head).unwrap();
        let mut stream = stream.unread(head.to_vec());
        assert_eq!(stream.read_to_string_lossy().unwrap(), "0123456789");
    }

    #[test]
    fn cancelled_stream_stops_reading() {
        let token = CancellationToken::new();
        let mut stream = EntityStream::from_bytes("abcdef").with_cancellation(token.clone());
        let mut first = [0u8; 2];
        stream.read_exact(&mut first).unwrap();
        token.cancel();
        let err = stream.read(&mut first).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn streaming_mode_serde_names() {
        let mode: StreamingMode = serde_json::from_str("\"CHUNKED\"").unwrap();
        assert_eq!(mode, StreamingMode::Chunked);
        assert_eq!(StreamingMode::Buffered.to_string(), "BUFFERED");
    }
}
