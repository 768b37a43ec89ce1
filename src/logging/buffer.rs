//! Bounded capture of entity bytes.
//!
//! # Responsibilities
//! - Keep the head of an entity for the log record without holding the rest
//! - Tap an outgoing entity without changing a single forwarded byte
//!
//! # Design Decisions
//! - One extra byte beyond the limit is retained so truncation is known
//!   without a separate flag
//! - Decoding is best-effort and never fails: unknown charsets and malformed
//!   sequences fall back to lossy UTF-8

use std::io::{self, Write};

/// Appended to a rendered entity that exceeded the limit.
pub const TRUNCATION_MARKER: &str = "...more...";

/// Capacity-limited sink for entity bytes.
#[derive(Debug)]
pub struct BoundedEntityBuffer {
    max: usize,
    retained: Vec<u8>,
    total: u64,
}

impl BoundedEntityBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            retained: Vec::with_capacity(max.saturating_add(1).min(64 * 1024)),
            total: 0,
        }
    }

    /// Record bytes seen on the wire; only the first `max + 1` are kept.
    pub fn record(&mut self, bytes: &[u8]) {
        self.total += bytes.len() as u64;
        let room = self.max.saturating_add(1).saturating_sub(self.retained.len());
        let keep = room.min(bytes.len());
        self.retained.extend_from_slice(&bytes[..keep]);
    }

    /// Every byte recorded, retained or not.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_truncated(&self) -> bool {
        self.retained.len() > self.max
    }

    /// Append at most `max` decoded bytes, the marker when truncated, and
    /// `separator`.
    pub fn render_into(&self, out: &mut String, charset: Option<&str>, separator: &str) {
        let shown = &self.retained[..self.retained.len().min(self.max)];
        decode_into(out, shown, charset);
        if self.is_truncated() {
            out.push_str(TRUNCATION_MARKER);
        }
        out.push_str(separator);
    }
}

fn decode_into(out: &mut String, bytes: &[u8], charset: Option<&str>) {
    let charset = charset.map(|c| c.trim().to_ascii_lowercase());
    match charset.as_deref() {
        Some("iso-8859-1" | "latin1" | "latin-1" | "iso_8859_1") => {
            out.extend(bytes.iter().map(|&b| char::from(b)));
        }
        Some("us-ascii" | "ascii") => {
            out.extend(bytes.iter().map(|&b| {
                if b.is_ascii() {
                    char::from(b)
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            }));
        }
        _ => out.push_str(&String::from_utf8_lossy(bytes)),
    }
}

/// `Write` decorator that tees into a [`BoundedEntityBuffer`].
pub struct LoggingStream<W> {
    inner: W,
    buffer: BoundedEntityBuffer,
}

impl<W: Write> LoggingStream<W> {
    pub fn new(inner: W, max: usize) -> Self {
        Self {
            inner,
            buffer: BoundedEntityBuffer::new(max),
        }
    }

    pub fn buffer(&self) -> &BoundedEntityBuffer {
        &self.buffer
    }

    pub fn into_parts(self) -> (W, BoundedEntityBuffer) {
        (self.inner, self.buffer)
    }
}

impl<W: Write> Write for LoggingStream<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(data)?;
        // Only what the sink accepted was sent.
        self.buffer.record(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(max: usize, input: &[u8]) -> String {
        let mut buffer = BoundedEntityBuffer::new(max);
        buffer.record(input);
        let mut out = String::new();
        buffer.render_into(&mut out, None, "\n");
        out
    }

    #[test]
    fn truncates_with_marker() {
        assert_eq!(rendered(8, b"0123456789"), "01234567...more...\n");
        assert_eq!(rendered(10, b"0123456789"), "0123456789\n");
        assert_eq!(rendered(0, b"0123456789"), "...more...\n");
        assert_eq!(rendered(0, b""), "\n");
    }

    #[test]
    fn rendered_length_matches_limit_for_all_sizes() {
        let input: Vec<u8> = (0..64u8).map(|i| b'a' + i % 26).collect();
        for len in [0usize, 1, 7, 8, 9, 63, 64] {
            for max in [0usize, 1, 8, 32, 64, 100] {
                let out = rendered(max, &input[..len]);
                let body = out.strip_suffix('\n').unwrap();
                let truncated = len > max;
                assert_eq!(body.ends_with(TRUNCATION_MARKER), truncated, "len {len} max {max}");
                let text = body.strip_suffix(TRUNCATION_MARKER).unwrap_or(body);
                assert_eq!(text.len(), len.min(max), "len {len} max {max}");
            }
        }
    }

    #[test]
    fn retains_at_most_one_extra_byte_across_writes() {
        let mut buffer = BoundedEntityBuffer::new(4);
        for chunk in [b"01".as_slice(), b"23", b"45", b"67"] {
            buffer.record(chunk);
        }
        assert_eq!(buffer.total(), 8);
        assert_eq!(buffer.retained.len(), 5);
        assert!(buffer.is_truncated());
    }

    #[test]
    fn decodes_latin1_and_ascii() {
        let mut buffer = BoundedEntityBuffer::new(16);
        buffer.record(&[0x63, 0x61, 0x66, 0xE9]);

        let mut latin1 = String::new();
        buffer.render_into(&mut latin1, Some("ISO-8859-1"), "");
        assert_eq!(latin1, "café");

        let mut ascii = String::new();
        buffer.render_into(&mut ascii, Some("US-ASCII"), "");
        assert_eq!(ascii, "caf\u{FFFD}");

        let mut unknown = String::new();
        buffer.render_into(&mut unknown, Some("x-unknown"), "");
        assert_eq!(unknown, "caf\u{FFFD}");
    }

    #[test]
    fn stream_forwards_every_byte() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut stream = LoggingStream::new(Vec::new(), 16);
        for chunk in payload.chunks(333) {
            stream.write_all(chunk).unwrap();
        }
        let (forwarded, buffer) = stream.into_parts();
        assert_eq!(forwarded, payload);
        assert_eq!(buffer.total(), 10_000);
        assert!(buffer.is_truncated());
    }

    /// Accepts at most three bytes per call.
    struct Trickle(Vec<u8>);

    impl Write for Trickle {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            let n = data.len().min(3);
            self.0.extend_from_slice(&data[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stream_records_only_accepted_bytes() {
        let mut stream = LoggingStream::new(Trickle(Vec::new()), 100);
        assert_eq!(stream.write(b"abcdef").unwrap(), 3);
        assert_eq!(stream.buffer().total(), 3);
        stream.write_all(b"def").unwrap();
        let (sink, buffer) = stream.into_parts();
        assert_eq!(sink.0, b"abcdef");

        let mut out = String::new();
        buffer.render_into(&mut out, None, "|");
        assert_eq!(out, "abcdef|");
    }
}
