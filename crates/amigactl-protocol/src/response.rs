//! amigactl response types

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::encoding::Encoding;
use crate::error::{DaemonError, ProtocolResult};
use crate::stuffing::stuff;

/// Chunk size used when encoding binary payloads
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Verb of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Ok,
    Err,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Err => "ERR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body. Which one applies is decided by the command family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text lines, already dot-unstuffed, in arrival order
    Lines(Vec<String>),
    /// `DATA` chunks reassembled into one buffer
    Binary(Bytes),
}

/// One complete response, sentinel included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub info: String,
    pub payload: Payload,
}

impl Response {
    pub fn ok(info: impl Into<String>, lines: Vec<String>) -> Self {
        Response {
            status: Status::Ok,
            info: info.into(),
            payload: Payload::Lines(lines),
        }
    }

    pub fn ok_binary(info: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Response {
            status: Status::Ok,
            info: info.into(),
            payload: Payload::Binary(data.into()),
        }
    }

    pub fn error(code: u32, message: &str) -> Self {
        Response {
            status: Status::Err,
            info: format!("{} {}", code, message),
            payload: Payload::Lines(Vec::new()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Payload lines; empty for a binary payload.
    pub fn lines(&self) -> &[String] {
        match &self.payload {
            Payload::Lines(lines) => lines,
            Payload::Binary(_) => &[],
        }
    }

    /// Binary payload; empty for a line payload.
    pub fn data(&self) -> &[u8] {
        match &self.payload {
            Payload::Binary(data) => data,
            Payload::Lines(_) => &[],
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        match self.payload {
            Payload::Lines(lines) => lines,
            Payload::Binary(_) => Vec::new(),
        }
    }

    pub fn into_data(self) -> Bytes {
        match self.payload {
            Payload::Binary(data) => data,
            Payload::Lines(_) => Bytes::new(),
        }
    }

    /// The mapped error of an `ERR` response.
    pub fn error_condition(&self) -> Option<DaemonError> {
        match self.status {
            Status::Ok => None,
            Status::Err => Some(DaemonError::from_info(&self.info)),
        }
    }

    pub fn into_result(self) -> Result<Self, DaemonError> {
        match self.error_condition() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Encode the response to bytes, as the daemon would send it.
    pub fn encode(&self, encoding: Encoding) -> ProtocolResult<BytesMut> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf, encoding, DEFAULT_CHUNK_SIZE)?;
        Ok(buf)
    }

    /// Encode into an existing buffer, splitting binary payloads into
    /// `chunk_size` byte `DATA` chunks.
    pub fn encode_into(
        &self,
        buf: &mut BytesMut,
        encoding: Encoding,
        chunk_size: usize,
    ) -> ProtocolResult<()> {
        buf.put_slice(self.status.as_str().as_bytes());
        if !self.info.is_empty() {
            buf.put_u8(b' ');
            buf.put_slice(&encoding.encode(&self.info)?);
        }
        buf.put_u8(b'\n');

        match (&self.status, &self.payload) {
            (_, Payload::Lines(lines)) => {
                for line in lines {
                    buf.put_slice(&encoding.encode(&stuff(line))?);
                    buf.put_u8(b'\n');
                }
            }
            (Status::Ok, Payload::Binary(data)) => put_chunks(buf, data, chunk_size),
            (Status::Err, Payload::Binary(_)) => {}
        }

        buf.put_slice(b".\n");
        Ok(())
    }
}

/// Write `data` as `DATA <len>` chunks followed by `END`.
///
/// Empty data produces only the `END` line.
pub fn put_chunks(buf: &mut BytesMut, data: &[u8], chunk_size: usize) {
    let chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
    for chunk in data.chunks(chunk_size) {
        buf.put_slice(b"DATA ");
        buf.put_slice(chunk.len().to_string().as_bytes());
        buf.put_u8(b'\n');
        buf.put_slice(chunk);
    }
    buf.put_slice(b"END\n");
}
