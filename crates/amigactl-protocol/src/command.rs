//! amigactl command types

use std::io::Write;

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::encoding::Encoding;
use crate::error::{ProtocolError, ProtocolResult};

/// How the response to a command is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Status line, text lines, sentinel
    Lines,
    /// Status line, `DATA` chunks, `END`, sentinel
    Chunked,
    /// Status line, then `DATA` chunks until `END` or `ERR`
    Stream,
}

/// All commands the client knows how to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// VERSION
    Version,

    /// PING
    Ping,

    /// QUIT
    Quit,

    /// SHUTDOWN CONFIRM
    Shutdown,

    /// DIR <path>
    Dir { path: String },

    /// STAT <path>
    Stat { path: String },

    /// READ <path>
    Read { path: String },

    /// WRITE <path> <size>
    Write { path: String, size: u64 },

    /// EXEC <command>
    Exec { command: String },

    /// EXEC ASYNC <command>
    ExecAsync { command: String },

    /// AREXX <port> <command>
    Arexx { port: String, command: String },

    /// RENAME, then the old and new path on lines of their own
    Rename { from: String, to: String },

    /// TAIL <path>
    Tail { path: String },

    /// STOP
    Stop,

    /// TRACE START [filters]
    TraceStart { filters: Vec<String> },

    /// TRACE RUN [filters] -- <command>
    TraceRun { filters: Vec<String>, command: String },

    /// TRACE STOP
    TraceStop,

    /// TRACE STATUS
    TraceStatus,

    /// TRACE ENABLE [names]
    TraceEnable { names: Vec<String> },

    /// TRACE DISABLE [names]
    TraceDisable { names: Vec<String> },

    /// Any other single line, sent verbatim
    Raw(String),
}

impl Command {
    /// Verb used for logging.
    pub fn verb(&self) -> &str {
        match self {
            Command::Version => "VERSION",
            Command::Ping => "PING",
            Command::Quit => "QUIT",
            Command::Shutdown => "SHUTDOWN",
            Command::Dir { .. } => "DIR",
            Command::Stat { .. } => "STAT",
            Command::Read { .. } => "READ",
            Command::Write { .. } => "WRITE",
            Command::Exec { .. } => "EXEC",
            Command::ExecAsync { .. } => "EXEC ASYNC",
            Command::Arexx { .. } => "AREXX",
            Command::Rename { .. } => "RENAME",
            Command::Tail { .. } => "TAIL",
            Command::Stop => "STOP",
            Command::TraceStart { .. } => "TRACE START",
            Command::TraceRun { .. } => "TRACE RUN",
            Command::TraceStop => "TRACE STOP",
            Command::TraceStatus => "TRACE STATUS",
            Command::TraceEnable { .. } => "TRACE ENABLE",
            Command::TraceDisable { .. } => "TRACE DISABLE",
            Command::Raw(line) => line.split_whitespace().next().unwrap_or(""),
        }
    }

    pub fn framing(&self) -> Framing {
        match self {
            Command::Read { .. } | Command::Exec { .. } | Command::Arexx { .. } => Framing::Chunked,
            Command::Tail { .. } | Command::TraceStart { .. } | Command::TraceRun { .. } => {
                Framing::Stream
            }
            _ => Framing::Lines,
        }
    }

    /// The wire lines of this command, without terminators.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Command::Version => vec!["VERSION".into()],
            Command::Ping => vec!["PING".into()],
            Command::Quit => vec!["QUIT".into()],
            Command::Shutdown => vec!["SHUTDOWN CONFIRM".into()],
            Command::Dir { path } => vec![join("DIR", &[path])],
            Command::Stat { path } => vec![join("STAT", &[path])],
            Command::Read { path } => vec![join("READ", &[path])],
            Command::Write { path, size } => vec![join("WRITE", &[path, &size.to_string()])],
            Command::Exec { command } => vec![join("EXEC", &[command])],
            Command::ExecAsync { command } => vec![join("EXEC ASYNC", &[command])],
            Command::Arexx { port, command } => vec![join("AREXX", &[port, command])],
            Command::Rename { from, to } => vec!["RENAME".into(), from.clone(), to.clone()],
            Command::Tail { path } => vec![join("TAIL", &[path])],
            Command::Stop => vec!["STOP".into()],
            Command::TraceStart { filters } => vec![join_all("TRACE START", filters)],
            Command::TraceRun { filters, command } => {
                let mut line = join_all("TRACE RUN", filters);
                line.push_str(" -- ");
                line.push_str(command);
                vec![line]
            }
            Command::TraceStop => vec!["TRACE STOP".into()],
            Command::TraceStatus => vec!["TRACE STATUS".into()],
            Command::TraceEnable { names } => vec![join_all("TRACE ENABLE", names)],
            Command::TraceDisable { names } => vec![join_all("TRACE DISABLE", names)],
            Command::Raw(line) => vec![line.clone()],
        }
    }

    /// Encode all lines, each terminated by `\n`, into one buffer.
    ///
    /// Fails without producing output if any line contains a line break
    /// or a character the encoding cannot represent.
    pub fn encode(&self, encoding: Encoding) -> ProtocolResult<BytesMut> {
        let mut buf = BytesMut::new();
        for line in self.lines() {
            if line.contains(&['\r', '\n'][..]) {
                return Err(ProtocolError::InvalidArgument(format!(
                    "line break in {} argument",
                    self.verb()
                )));
            }
            buf.put_slice(&encoding.encode(&line)?);
            buf.put_u8(b'\n');
        }
        Ok(buf)
    }
}

fn join(verb: &str, args: &[&String]) -> String {
    let mut line = verb.to_string();
    for arg in args.iter().filter(|a| !a.is_empty()) {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn join_all(verb: &str, args: &[String]) -> String {
    let refs: Vec<&String> = args.iter().collect();
    join(verb, &refs)
}

/// Write a command in a single `write_all` and flush.
pub fn send_command<W: Write>(
    writer: &mut W,
    command: &Command,
    encoding: Encoding,
) -> ProtocolResult<()> {
    let buf = command.encode(encoding)?;
    debug!(command = %command.verb(), bytes = buf.len(), "Sending command");
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}
