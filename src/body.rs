//! Body replayer: drains a request body once, then hands out a fresh reader
//! over the same bytes for every attempt.
//!
//! Buffering once up front guarantees every attempt declares the same
//! content length, every attempt sends bit-identical bytes, and a drain
//! failure is surfaced before any attempt is issued.

use bytes::Bytes;

/// A request body, drained into memory exactly once.
#[derive(Clone, Debug)]
pub struct ReplayBody {
    bytes: Bytes,
}

impl ReplayBody {
    /// Drains `source` into an in-memory buffer. A non-seekable stream that
    /// fails mid-read surfaces as a [`std::io::Error`] here, before any
    /// attempt has been made.
    pub fn drain<R: std::io::Read>(mut source: R) -> std::io::Result<Self> {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        Ok(Self { bytes: buf.into() })
    }

    /// Wraps an already-buffered body (the common case: the caller passed
    /// `Bytes`/`Vec<u8>`/`String` directly rather than a stream).
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn empty() -> Self {
        Self {
            bytes: Bytes::new(),
        }
    }

    /// The declared content length for every attempt: the buffer's length,
    /// never negative/unknown. An empty buffer declares length 0, not -1.
    pub fn content_length(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// A fresh, independent view over the same underlying bytes. Cheap: a
    /// `Bytes` clone is a refcount bump, not a copy, so replaying a large
    /// body across many attempts doesn't reallocate.
    pub fn reader(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_body_declares_zero_length() {
        let body = ReplayBody::empty();
        assert_eq!(body.content_length(), 0);
        assert!(body.is_empty());
    }

    #[test]
    fn drain_preserves_bytes_across_replays() {
        let payload = vec![7u8; 79_449];
        let body = ReplayBody::drain(Cursor::new(payload.clone())).unwrap();

        for _ in 0..3 {
            let replay = body.reader();
            assert_eq!(replay.len() as u64, body.content_length());
            assert_eq!(replay.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn drain_failure_surfaces_before_any_attempt() {
        struct FailingReader;
        impl std::io::Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            }
        }

        let result = ReplayBody::drain(FailingReader);
        assert!(result.is_err());
    }

    #[test]
    fn content_length_matches_buffer_across_many_replays() {
        let body = ReplayBody::from_bytes(Bytes::from_static(b""));
        assert_eq!(body.content_length(), 0);
        for _ in 0..5 {
            assert_eq!(body.reader().len(), 0);
        }
    }
}
