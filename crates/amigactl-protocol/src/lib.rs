//! amigactl wire protocol
//!
//! A line-based protocol with embedded binary chunks, spoken by the
//! amigactld daemon over TCP.
//!
//! ## Command Format
//! ```text
//! VERB [ARGS]\n
//! ```
//!
//! ## Response Format
//! ```text
//! OK [info]               # Success
//! ERR <code> <message>    # Error
//! <line>                  # Payload line (dot-stuffed)
//! DATA <length>\n<bytes>  # Binary chunk
//! END                     # End of chunks
//! .                       # Sentinel, ends every response
//! ```

pub mod banner;
pub mod command;
pub mod encoding;
pub mod error;
pub mod event;
pub mod parser;
pub mod reader;
pub mod response;
pub mod stuffing;

pub use banner::{parse_banner, ProtocolVersion};
pub use command::{send_command, Command, Framing};
pub use encoding::Encoding;
pub use error::{DaemonError, ErrorKind, ProtocolError, ProtocolResult};
pub use event::{Notice, StreamEvent};
pub use parser::{read_chunk, read_chunked_response, read_response, Chunk};
pub use reader::LineReader;
pub use response::{Payload, Response, Status};
pub use stuffing::{stuff, unstuff};
