//! Client error types

use std::io;

use amigactl_protocol::{DaemonError, ProtocolError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// The connection was closed or broke earlier; reconnect to continue.
    #[error("Connection is closed")]
    Closed,

    /// A well-framed reply the typed operation could not interpret.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Whether the connection that produced this error is now unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Daemon(_)
                | Error::UnexpectedResponse(_)
                // rejected before anything was written
                | Error::Protocol(ProtocolError::InvalidArgument(_) | ProtocolError::Unencodable(_))
        )
    }

    pub fn daemon(&self) -> Option<&DaemonError> {
        match self {
            Error::Daemon(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
