//! Protocol error types

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Framing and transport failures.
///
/// Every variant is fatal to the connection it occurred on: the byte stream
/// can no longer be trusted to be aligned on a response boundary.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Connection closed mid-line (partial: {partial:?})")]
    ClosedMidLine { partial: String },

    #[error("Connection closed mid-chunk: expected {expected} bytes, received {received}")]
    ClosedMidChunk { expected: usize, received: usize },

    #[error("Timed out waiting for server")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("Expected OK or ERR, got {0:?}")]
    UnexpectedStatus(String),

    #[error("Malformed chunk header: {0:?}")]
    MalformedChunkHeader(String),

    #[error("Unexpected line in response: {0:?}")]
    UnexpectedLine(String),

    #[error("Invalid banner: {0:?}")]
    InvalidBanner(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Character {0:?} cannot be encoded")]
    Unencodable(char),

    #[error("Line too long: {size} > {max}")]
    LineTooLong { size: usize, max: usize },

    #[error("Chunk too large: {size} > {max}")]
    ChunkTooLarge { size: usize, max: usize },
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            // std reports an expired SO_RCVTIMEO as WouldBlock on Unix and TimedOut on Windows
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ProtocolError::Timeout,
            io::ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed,
            _ => ProtocolError::Io(err),
        }
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Error classes the daemon reports in `ERR <code> <message>` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// 100: malformed or unknown command, line too long
    CommandSyntax,
    /// 200: path, ARexx port or resource not found
    NotFound,
    /// 201: operation not permitted
    PermissionDenied,
    /// 202: target already exists
    AlreadyExists,
    /// 300: filesystem I/O failure
    RemoteIo,
    /// 400: remote operation timed out
    RemoteTimeout,
    /// 500: unexpected daemon-side failure
    Internal,
    /// Any code outside the table, including an unparseable one (code 0).
    Unknown,
}

impl ErrorKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            100 => ErrorKind::CommandSyntax,
            200 => ErrorKind::NotFound,
            201 => ErrorKind::PermissionDenied,
            202 => ErrorKind::AlreadyExists,
            300 => ErrorKind::RemoteIo,
            400 => ErrorKind::RemoteTimeout,
            500 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        }
    }

    /// The wire code for this kind, `None` for [`ErrorKind::Unknown`].
    pub fn code(self) -> Option<u32> {
        match self {
            ErrorKind::CommandSyntax => Some(100),
            ErrorKind::NotFound => Some(200),
            ErrorKind::PermissionDenied => Some(201),
            ErrorKind::AlreadyExists => Some(202),
            ErrorKind::RemoteIo => Some(300),
            ErrorKind::RemoteTimeout => Some(400),
            ErrorKind::Internal => Some(500),
            ErrorKind::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CommandSyntax => "command syntax",
            ErrorKind::NotFound => "not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::RemoteIo => "remote I/O",
            ErrorKind::RemoteTimeout => "remote timeout",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A correctly framed `ERR` response. The connection stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind} error {code}: {message}")]
pub struct DaemonError {
    pub kind: ErrorKind,
    pub code: u32,
    pub message: String,
}

impl DaemonError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_code(code),
            code,
            message: message.into(),
        }
    }

    /// Map the info part of an `ERR` status line (`"<code> <message>"`).
    ///
    /// A leading token that is not a number yields code 0 and keeps the
    /// whole info text as the message.
    pub fn from_info(info: &str) -> Self {
        let (token, message) = match info.split_once(' ') {
            Some((token, message)) => (token, message),
            None => (info, ""),
        };

        match token.parse::<u32>() {
            Ok(code) => Self::new(code, message),
            Err(_) => Self::new(0, info),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        let table = [
            (100, ErrorKind::CommandSyntax),
            (200, ErrorKind::NotFound),
            (201, ErrorKind::PermissionDenied),
            (202, ErrorKind::AlreadyExists),
            (300, ErrorKind::RemoteIo),
            (400, ErrorKind::RemoteTimeout),
            (500, ErrorKind::Internal),
        ];
        for (code, kind) in table {
            assert_eq!(ErrorKind::from_code(code), kind);
            assert_eq!(kind.code(), Some(code));
        }
    }

    #[test]
    fn test_from_info() {
        let err = DaemonError::from_info("100 Unknown command");
        assert_eq!(err.kind, ErrorKind::CommandSyntax);
        assert_eq!(err.code, 100);
        assert_eq!(err.message, "Unknown command");
    }

    #[test]
    fn test_unknown_code_keeps_raw_values() {
        let err = DaemonError::from_info("999 Something new");
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.code, 999);
        assert_eq!(err.message, "Something new");
    }

    #[test]
    fn test_non_numeric_code() {
        let err = DaemonError::from_info("oops it broke");
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "oops it broke");

        let err = DaemonError::from_info("");
        assert_eq!(err.code, 0);
        assert_eq!(err.message, "");
    }

    #[test]
    fn test_code_without_message() {
        let err = DaemonError::from_info("202");
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
        assert_eq!(err.message, "");
    }

    #[test]
    fn test_io_error_mapping() {
        let timeout: ProtocolError = io::Error::from(io::ErrorKind::WouldBlock).into();
        assert!(matches!(timeout, ProtocolError::Timeout));

        let timeout: ProtocolError = io::Error::from(io::ErrorKind::TimedOut).into();
        assert!(matches!(timeout, ProtocolError::Timeout));

        let reset: ProtocolError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(matches!(reset, ProtocolError::Io(_)));
    }

    #[test]
    fn test_display() {
        let err = DaemonError::new(300, "File no longer accessible");
        assert_eq!(err.to_string(), "remote I/O error 300: File no longer accessible");
    }
}
