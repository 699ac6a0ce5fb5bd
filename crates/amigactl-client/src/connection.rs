//! Blocking TCP connection to amigactld

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use amigactl_protocol::event::parse_rc;
use amigactl_protocol::parser::{expect_sentinel, parse_status_line};
use amigactl_protocol::response::{put_chunks, DEFAULT_CHUNK_SIZE};
use amigactl_protocol::{
    parse_banner, read_chunked_response, read_response, send_command, Command, DaemonError, Framing,
    LineReader, ProtocolError, ProtocolResult, ProtocolVersion, Response, Status,
};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::{ArexxReply, DirEntry, ExecOutput, StatInfo, TraceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Health {
    Ready,
    Broken,
    Closed,
}

/// One client connection.
///
/// Commands are strictly sequential: each call sends one command and
/// consumes its whole response before returning. A protocol error leaves
/// the connection unusable; a daemon `ERR` does not.
///
/// Dropping the connection sends a best-effort `QUIT` and closes the socket.
#[derive(Debug)]
pub struct Connection {
    pub(crate) reader: LineReader<TcpStream>,
    /// Write half, shared with the stop handles of streaming sessions
    pub(crate) writer: Arc<Mutex<TcpStream>>,
    pub(crate) config: ClientConfig,
    pub(crate) health: Health,
    peer: SocketAddr,
    banner: String,
    version: ProtocolVersion,
}

impl Connection {
    /// Open a connection and validate the daemon's banner.
    ///
    /// A daemon with no free client slot closes the socket without a
    /// banner, which surfaces as [`ProtocolError::ConnectionClosed`].
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let addr = config.addr();
        let connect_err = |source| Error::Connect {
            addr: addr.clone(),
            source,
        };

        let stream = open(&addr, config.timeout()).map_err(connect_err)?;
        stream.set_read_timeout(config.timeout()).map_err(connect_err)?;
        stream.set_write_timeout(config.timeout()).map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        let peer = stream.peer_addr().map_err(connect_err)?;
        let writer = stream.try_clone().map_err(connect_err)?;

        let mut reader = LineReader::new(stream, config.encoding);
        let banner = reader.read_line()?;
        let version = parse_banner(&banner)?;

        info!(addr = %peer, version = %version, "Connected to amigactld");

        Ok(Self {
            reader,
            writer: Arc::new(Mutex::new(writer)),
            config: config.clone(),
            health: Health::Ready,
            peer,
            banner,
            version,
        })
    }

    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Protocol version announced in the banner.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    /// False once the connection was closed or a protocol error broke it.
    pub fn is_usable(&self) -> bool {
        self.health == Health::Ready
    }

    /// Send a command and read its response according to its framing.
    ///
    /// `ERR` responses are returned as-is; see [`Response::into_result`].
    pub fn execute(&mut self, command: &Command) -> Result<Response> {
        let framing = command.framing();
        if framing == Framing::Stream {
            return Err(ProtocolError::InvalidArgument(format!(
                "{} opens a stream and needs a session",
                command.verb()
            ))
            .into());
        }

        self.send(command)?;
        let response = match framing {
            Framing::Chunked => read_chunked_response(&mut self.reader),
            _ => read_response(&mut self.reader),
        };
        self.guard(response)
    }

    /// Send a raw command line whose response carries text lines.
    pub fn command(&mut self, line: &str) -> Result<Response> {
        self.request(&Command::Raw(line.to_string()))
    }

    /// Send a raw command line whose response carries `DATA` chunks.
    pub fn chunked_command(&mut self, line: &str) -> Result<Response> {
        self.send(&Command::Raw(line.to_string()))?;
        let response = read_chunked_response(&mut self.reader);
        Ok(self.guard(response)?.into_result()?)
    }

    /// The daemon's version string.
    pub fn version(&mut self) -> Result<String> {
        self.request(&Command::Version)?
            .into_lines()
            .into_iter()
            .next()
            .ok_or_else(|| Error::UnexpectedResponse("empty VERSION reply".into()))
    }

    pub fn ping(&mut self) -> Result<()> {
        self.request(&Command::Ping).map(drop)
    }

    /// Ask the daemon to exit. The connection is closed afterwards.
    pub fn shutdown(&mut self) -> Result<()> {
        self.request(&Command::Shutdown)?;
        info!(addr = %self.peer, "Daemon acknowledged shutdown");
        self.close_socket();
        Ok(())
    }

    pub fn dir(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        let response = self.request(&Command::Dir { path: path.into() })?;
        response.lines().iter().map(|line| DirEntry::parse(line)).collect()
    }

    pub fn stat(&mut self, path: &str) -> Result<StatInfo> {
        let response = self.request(&Command::Stat { path: path.into() })?;
        StatInfo::parse(response.lines())
    }

    /// Download a file.
    pub fn read(&mut self, path: &str) -> Result<Bytes> {
        let response = self.request(&Command::Read { path: path.into() })?;
        let declared = response.info.trim().parse::<usize>().ok();
        let data = response.into_data();

        match declared {
            Some(size) if size != data.len() => Err(Error::UnexpectedResponse(format!(
                "READ announced {} bytes but sent {}",
                size,
                data.len()
            ))),
            _ => Ok(data),
        }
    }

    /// Upload a file, returning the byte count the daemon reports.
    ///
    /// The daemon answers `WRITE` with `READY` before the data is sent, or
    /// with `ERR` when the destination cannot be created.
    pub fn write(&mut self, path: &str, data: &[u8]) -> Result<u64> {
        self.send(&Command::Write {
            path: path.into(),
            size: data.len() as u64,
        })?;

        let line = self.read_line()?;
        if line != "READY" {
            return match parse_status_line(&line) {
                Ok((Status::Err, info)) => {
                    let sentinel = expect_sentinel(&mut self.reader);
                    self.guard(sentinel)?;
                    Err(DaemonError::from_info(&info).into())
                }
                _ => Err(self.broken(ProtocolError::UnexpectedLine(line))),
            };
        }

        let mut buf = BytesMut::with_capacity(data.len() + 64);
        put_chunks(&mut buf, data, DEFAULT_CHUNK_SIZE);
        debug!(bytes = data.len(), "Uploading");
        self.write_bytes(&buf)?;

        let response = read_response(&mut self.reader);
        let response = self.guard(response)?.into_result()?;
        if response.info.is_empty() {
            return Ok(data.len() as u64);
        }
        response
            .info
            .trim()
            .parse()
            .map_err(|_| {
                Error::UnexpectedResponse(format!("WRITE acknowledged with {:?}", response.info))
            })
    }

    /// Run a command and wait for it, collecting its output.
    pub fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let response = self.request(&Command::Exec {
            command: command.into(),
        })?;
        let rc = require_rc(&response.info)?;
        Ok(ExecOutput {
            rc,
            output: response.into_data(),
        })
    }

    /// Start a command in the background, returning its process id.
    pub fn exec_async(&mut self, command: &str) -> Result<u32> {
        let response = self.request(&Command::ExecAsync {
            command: command.into(),
        })?;
        parse_id(&response.info)
            .ok_or_else(|| {
                Error::UnexpectedResponse(format!("EXEC ASYNC returned {:?}", response.info))
            })
    }

    /// Send an ARexx command to a named port.
    pub fn arexx(&mut self, port: &str, command: &str) -> Result<ArexxReply> {
        let response = self.request(&Command::Arexx {
            port: port.into(),
            command: command.into(),
        })?;
        let rc = require_rc(&response.info)?;
        let result = self.config.encoding.decode(response.data());
        Ok(ArexxReply {
            rc,
            result: result.trim_end_matches(&['\r', '\n'][..]).to_string(),
        })
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.request(&Command::Rename {
            from: from.into(),
            to: to.into(),
        })
        .map(drop)
    }

    /// Follow a file. [`Session::info`] holds its size when tailing began.
    pub fn tail(&mut self, path: &str) -> Result<Session<'_>> {
        Session::open(self, Command::Tail { path: path.into() }, false)
    }

    /// Stream trace events. Comment chunks are reported as
    /// [`amigactl_protocol::StreamEvent::Comment`].
    pub fn trace_start(&mut self, filters: &[String]) -> Result<Session<'_>> {
        Session::open(
            self,
            Command::TraceStart {
                filters: filters.to_vec(),
            },
            true,
        )
    }

    /// Launch a program and stream its trace events. [`Session::info`]
    /// holds the process id.
    pub fn trace_run(&mut self, filters: &[String], command: &str) -> Result<Session<'_>> {
        Session::open(
            self,
            Command::TraceRun {
                filters: filters.to_vec(),
                command: command.into(),
            },
            true,
        )
    }

    pub fn trace_stop(&mut self) -> Result<()> {
        self.request(&Command::TraceStop).map(drop)
    }

    pub fn trace_status(&mut self) -> Result<TraceStatus> {
        let response = self.request(&Command::TraceStatus)?;
        TraceStatus::parse(response.lines())
    }

    pub fn trace_enable(&mut self, names: &[String]) -> Result<()> {
        self.request(&Command::TraceEnable { names: names.to_vec() }).map(drop)
    }

    pub fn trace_disable(&mut self, names: &[String]) -> Result<()> {
        self.request(&Command::TraceDisable { names: names.to_vec() }).map(drop)
    }

    /// Say goodbye and close the socket. Failures are logged, not returned.
    pub fn close(mut self) {
        self.release();
    }

    fn request(&mut self, command: &Command) -> Result<Response> {
        Ok(self.execute(command)?.into_result()?)
    }

    pub(crate) fn send(&mut self, command: &Command) -> Result<()> {
        if self.health != Health::Ready {
            return Err(Error::Closed);
        }
        let sent = send_command(&mut *self.writer.lock(), command, self.config.encoding);
        self.guard(sent)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let result = {
            let mut stream = self.writer.lock();
            stream.write_all(buf).and_then(|_| stream.flush())
        };
        self.guard(result.map_err(ProtocolError::from))
    }

    pub(crate) fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let set = self.reader.get_ref().set_read_timeout(timeout);
        self.guard(set.map_err(ProtocolError::from))
    }

    fn read_line(&mut self) -> Result<String> {
        let line = self.reader.read_line();
        self.guard(line)
    }

    /// Protocol errors poison the connection, except arguments rejected
    /// before anything was written.
    pub(crate) fn guard<T>(&mut self, result: ProtocolResult<T>) -> Result<T> {
        result.map_err(|err| match err {
            ProtocolError::InvalidArgument(_) | ProtocolError::Unencodable(_) => err.into(),
            err => self.broken(err),
        })
    }

    pub(crate) fn broken(&mut self, err: ProtocolError) -> Error {
        if self.health == Health::Ready {
            warn!(addr = %self.peer, error = %err, "Connection broken");
        }
        self.health = Health::Broken;
        Error::Protocol(err)
    }

    fn close_socket(&mut self) {
        if self.health == Health::Closed {
            return;
        }
        if let Err(e) = self.writer.lock().shutdown(Shutdown::Both) {
            debug!(error = %e, "Socket shutdown failed");
        }
        self.health = Health::Closed;
        info!(addr = %self.peer, "Connection closed");
    }

    fn release(&mut self) {
        if self.health == Health::Ready {
            if let Err(e) = self.request(&Command::Quit) {
                warn!(addr = %self.peer, error = %e, "QUIT failed during close");
            }
        }
        self.close_socket();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release();
    }
}

fn open(addr: &str, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let mut last_err = None;
    for sock in addr.to_socket_addrs()? {
        let attempt = match timeout {
            Some(t) => TcpStream::connect_timeout(&sock, t),
            None => TcpStream::connect(sock),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    }))
}

fn require_rc(info: &str) -> Result<i32> {
    parse_rc(info).ok_or_else(|| Error::UnexpectedResponse(format!("missing rc in {:?}", info)))
}

/// First token of the info field, accepting both `42` and `pid=42`.
fn parse_id(info: &str) -> Option<u32> {
    let token = info.split_whitespace().next()?;
    token.rsplit('=').next()?.parse().ok()
}
