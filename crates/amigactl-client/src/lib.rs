//! amigactl client
//!
//! Blocking client for the amigactld remote-control daemon:
//! - Connection: banner check, typed commands, file transfer
//! - Session: TAIL and TRACE event streams with cross-thread STOP
//!
//! # Example
//!
//! ```no_run
//! use amigactl_client::{ClientConfig, Connection};
//!
//! let mut conn = Connection::connect(&ClientConfig::new("amiga.local", 6800))?;
//! for entry in conn.dir("SYS:")? {
//!     println!("{} {}", entry.name, entry.size);
//! }
//! conn.close();
//! # Ok::<(), amigactl_client::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod session;
pub mod types;

pub use amigactl_protocol::{
    DaemonError, Encoding, ErrorKind, Notice, ProtocolError, Response, StreamEvent,
};
pub use config::ClientConfig;
pub use connection::Connection;
pub use error::{Error, Result};
pub use session::{Session, SessionState, StopHandle};
pub use types::{ArexxReply, DirEntry, EntryKind, ExecOutput, StatInfo, TraceStatus};
