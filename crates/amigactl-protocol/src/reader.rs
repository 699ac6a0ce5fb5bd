//! Buffered, byte-precise line reader

use std::io::{self, Read};

use bytes::{Bytes, BytesMut};

use crate::encoding::Encoding;
use crate::error::{ProtocolError, ProtocolResult};

/// Maximum length of a single line (1MB)
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Maximum size of a single `DATA` chunk (16MB)
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

const READ_SIZE: usize = 4096;

/// Reads `\n`-terminated lines and exact-size binary chunks from a stream.
///
/// Bytes past the current line stay buffered, so line and chunk reads can
/// be freely interleaved. This is the only place that reads from the
/// socket.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buffer: BytesMut,
    encoding: Encoding,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R, encoding: Encoding) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(READ_SIZE),
            encoding,
        }
    }

    /// Number of bytes read from the stream but not consumed yet.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The underlying stream, for socket options such as timeouts.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Read one line and decode it. One trailing `\r` is stripped.
    pub fn read_line(&mut self) -> ProtocolResult<String> {
        let raw = self.read_line_bytes()?;
        Ok(self.encoding.decode(&raw))
    }

    /// Read one line without decoding it.
    pub fn read_line_bytes(&mut self) -> ProtocolResult<Bytes> {
        let mut scanned = 0;

        loop {
            if let Some(pos) = self.buffer[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + pos;
                let mut line = self.buffer.split_to(end + 1);
                line.truncate(end);
                if line.last() == Some(&b'\r') {
                    line.truncate(end - 1);
                }
                return Ok(line.freeze());
            }

            scanned = self.buffer.len();
            if scanned > MAX_LINE_LENGTH {
                return Err(ProtocolError::LineTooLong {
                    size: scanned,
                    max: MAX_LINE_LENGTH,
                });
            }

            if self.fill()? == 0 {
                if self.buffer.is_empty() {
                    return Err(ProtocolError::ConnectionClosed);
                }
                let partial = self.encoding.decode(&self.buffer);
                self.buffer.clear();
                return Err(ProtocolError::ClosedMidLine { partial });
            }
        }
    }

    /// Read exactly `len` raw bytes, looping over short reads.
    pub fn read_exact_bytes(&mut self, len: usize) -> ProtocolResult<Bytes> {
        if len > MAX_CHUNK_SIZE {
            return Err(ProtocolError::ChunkTooLarge {
                size: len,
                max: MAX_CHUNK_SIZE,
            });
        }

        while self.buffer.len() < len {
            if self.fill()? == 0 {
                let received = self.buffer.len();
                self.buffer.clear();
                return Err(ProtocolError::ClosedMidChunk {
                    expected: len,
                    received,
                });
            }
        }

        Ok(self.buffer.split_to(len).freeze())
    }

    fn fill(&mut self) -> ProtocolResult<usize> {
        let mut chunk = [0u8; READ_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
