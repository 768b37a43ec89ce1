//! Streaming a request entity producer into a transport body.
//!
//! The producer writes into a [`ChunkWriter`] on a dedicated thread. Chunks of
//! `chunk_size` bytes travel through a bounded channel to the transport, which
//! pulls them as it sends. The channel bound gives backpressure, so a large
//! entity is never fully materialized.
//!
//! Every stream ends with [`Chunk::End`] or [`Chunk::Failed`]; a channel that
//! closes without either means the producer died, and readers report that as
//! an error instead of a short body.

use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::thread;

use bytes::{Bytes, BytesMut};

use crate::http::Entity;

/// Chunks buffered between the writer thread and the transport.
pub(crate) const PIPE_DEPTH: usize = 4;

/// One message on the entity pipe.
#[derive(Debug)]
pub(crate) enum Chunk {
    Data(Bytes),
    Failed(io::Error),
    End,
}

pub(crate) fn truncated_error() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "entity writer terminated before finishing the entity",
    )
}

/// `Write` adapter that emits fixed-size chunks through `send`.
///
/// `send` returns `false` once the receiving side is gone.
pub(crate) struct ChunkWriter<S> {
    buf: BytesMut,
    chunk_size: usize,
    send: S,
}

impl<S: FnMut(Chunk) -> bool> ChunkWriter<S> {
    pub(crate) fn new(chunk_size: usize, send: S) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
            send,
        }
    }

    fn emit(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = self.buf.split().freeze();
        if (self.send)(Chunk::Data(chunk)) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "transport stopped reading the entity",
            ))
        }
    }

    /// Flush the tail and signal the end of the entity.
    fn finish(mut self) -> io::Result<()> {
        self.emit()?;
        (self.send)(Chunk::End);
        Ok(())
    }

    fn fail(mut self, error: io::Error) {
        (self.send)(Chunk::Failed(error));
    }
}

impl<S: FnMut(Chunk) -> bool> Write for ChunkWriter<S> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self.chunk_size - self.buf.len();
        let n = room.min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() >= self.chunk_size {
            self.emit()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit()
    }
}

/// Run `entity` on a named writer thread, streaming it through `send`.
pub(crate) fn spawn_entity_writer<S>(entity: Entity, chunk_size: usize, send: S) -> io::Result<()>
where
    S: FnMut(Chunk) -> bool + Send + 'static,
{
    thread::Builder::new()
        .name("courier-entity-writer".to_string())
        .spawn(move || {
            let mut writer = ChunkWriter::new(chunk_size, send);
            match entity.write_to(&mut writer) {
                Ok(()) => {
                    if let Err(e) = writer.finish() {
                        tracing::debug!(error = %e, "Entity stream abandoned by transport");
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Entity producer failed");
                    writer.fail(e);
                }
            }
        })
        .map(|_| ())
}

/// Blocking reader end of an entity pipe, used as a `reqwest` body.
pub(crate) struct PipeReader {
    rx: mpsc::Receiver<Chunk>,
    current: Bytes,
    done: bool,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Chunk::Data(bytes)) => self.current = bytes,
                Ok(Chunk::End) => self.done = true,
                Ok(Chunk::Failed(e)) => return Err(e),
                Err(mpsc::RecvError) => return Err(truncated_error()),
            }
        }
        let n = self.current.len().min(buf.len());
        buf[..n].copy_from_slice(&self.current.split_to(n));
        Ok(n)
    }
}

/// Start streaming `entity` and return the reading end.
pub(crate) fn blocking_pipe(entity: Entity, chunk_size: usize) -> io::Result<PipeReader> {
    let (tx, rx) = mpsc::sync_channel(PIPE_DEPTH);
    spawn_entity_writer(entity, chunk_size, move |chunk| tx.send(chunk).is_ok())?;
    Ok(PipeReader {
        rx,
        current: Bytes::new(),
        done: false,
    })
}
