//! Streaming sessions (TAIL, TRACE START, TRACE RUN)
//!
//! A session borrows its connection for as long as the stream runs. Events
//! are read one at a time: nothing is read ahead of the consumer, so a slow
//! consumer slows the daemon down through TCP flow control.
//!
//! The protocol has no control channel. Stopping a stream means sending
//! `STOP` on the same socket and reading on until `END`. A [`StopHandle`]
//! can do that from another thread while the session blocks in a read.
//!
//! While streaming, the socket's read timeout is the configured stream
//! timeout (none by default). The command timeout is restored once the
//! stream ends, and as soon as `STOP` is written.

use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use amigactl_protocol::parser::{expect_sentinel, read_status};
use amigactl_protocol::{
    read_chunk, read_response, send_command, Chunk, Command, DaemonError, Encoding, Notice,
    ProtocolResult, Status, StreamEvent,
};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::connection::{Connection, Health};
use crate::error::Result;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Events are still arriving
    Streaming,
    /// `END` received; the connection is ready for other commands
    Stopped,
    /// The daemon aborted the stream with `ERR`; the connection is still usable
    Failed,
    /// The transport failed; the connection is unusable
    Broken,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self != SessionState::Streaming
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopPhase {
    Armed,
    Sent,
    Disarmed,
}

#[derive(Debug)]
struct StopState {
    writer: Arc<Mutex<TcpStream>>,
    encoding: Encoding,
    command_timeout: Option<Duration>,
    phase: Mutex<StopPhase>,
}

/// Cloneable, thread-safe way to stop a running session.
///
/// Sends `STOP` at most once, and never after the stream has ended, so a
/// late call cannot inject a stray command into the connection.
#[derive(Debug, Clone)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

impl StopHandle {
    fn new(
        writer: Arc<Mutex<TcpStream>>,
        encoding: Encoding,
        command_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(StopState {
                writer,
                encoding,
                command_timeout,
                phase: Mutex::new(StopPhase::Armed),
            }),
        }
    }

    /// Request the stream to stop. Returns once `STOP` is written; the
    /// session then sees `END` after the daemon's next poll.
    pub fn stop(&self) -> Result<()> {
        self.send_stop()?;
        Ok(())
    }

    /// Whether `STOP` has been sent.
    pub fn is_requested(&self) -> bool {
        *self.inner.phase.lock() == StopPhase::Sent
    }

    fn send_stop(&self) -> ProtocolResult<()> {
        let mut phase = self.inner.phase.lock();
        if *phase != StopPhase::Armed {
            return Ok(());
        }

        let mut writer = self.inner.writer.lock();
        send_command(&mut *writer, &Command::Stop, self.inner.encoding)?;
        *phase = StopPhase::Sent;
        // both halves share one socket, so this also bounds the wait for END
        writer.set_read_timeout(self.inner.command_timeout)?;
        Ok(())
    }

    fn disarm(&self) -> StopPhase {
        let mut phase = self.inner.phase.lock();
        std::mem::replace(&mut *phase, StopPhase::Disarmed)
    }
}

/// A running stream.
///
/// Iterating yields events until a terminal one ([`StreamEvent::End`] or
/// [`StreamEvent::Error`]), after which the iterator is exhausted. A
/// transport failure is yielded once as `Err` and also ends iteration.
///
/// Dropping a session that is still streaming stops it and discards the
/// remaining events, so the connection can be reused.
#[derive(Debug)]
pub struct Session<'c> {
    conn: &'c mut Connection,
    state: SessionState,
    info: String,
    comments: bool,
    /// TRACE RUN: the stream also ends when the traced process exits
    ends_on_exit: bool,
    /// A STOP went out after the daemon had already ended the stream
    crossed_stop: bool,
    stop: StopHandle,
    failure: Option<DaemonError>,
}

impl<'c> Session<'c> {
    /// Send a streaming command and read its status line.
    ///
    /// An `ERR` status means the stream never started; it is returned as
    /// [`crate::Error::Daemon`] and no session exists.
    pub(crate) fn open(conn: &'c mut Connection, command: Command, comments: bool) -> Result<Self> {
        conn.send(&command)?;
        let status = read_status(&mut conn.reader);
        let (status, info) = conn.guard(status)?;

        if status == Status::Err {
            let sentinel = expect_sentinel(&mut conn.reader);
            conn.guard(sentinel)?;
            let err = DaemonError::from_info(&info);
            debug!(command = %command.verb(), code = err.code, "Stream refused");
            return Err(err.into());
        }

        info!(command = %command.verb(), info = %info, "Stream started");
        let stream_timeout = conn.config.stream_timeout();
        conn.set_read_timeout(stream_timeout)?;
        let stop = StopHandle::new(
            conn.writer.clone(),
            conn.config.encoding,
            conn.config.timeout(),
        );

        Ok(Session {
            conn,
            state: SessionState::Streaming,
            info,
            comments,
            ends_on_exit: matches!(command, Command::TraceRun { .. }),
            crossed_stop: false,
            stop,
            failure: None,
        })
    }

    /// Info field of the `OK` line that started the stream.
    pub fn info(&self) -> &str {
        &self.info
    }

    /// The info field as a number: file size for TAIL, process id for
    /// TRACE RUN.
    pub fn info_number(&self) -> Option<u64> {
        self.info.split_whitespace().next()?.rsplit('=').next()?.parse().ok()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The daemon's error if the stream ended in [`SessionState::Failed`].
    pub fn failure(&self) -> Option<&DaemonError> {
        self.failure.as_ref()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Send `STOP` from the consuming thread. Keep reading events to
    /// observe the final `END`.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != SessionState::Streaming {
            return Ok(());
        }
        let sent = self.stop.send_stop();
        if sent.is_err() {
            self.state = SessionState::Broken;
        }
        self.conn.guard(sent)
    }

    /// Block until the next event. `Ok(None)` once the stream has ended.
    pub fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        if self.state.is_terminal() {
            return Ok(None);
        }

        let chunk = read_chunk(&mut self.conn.reader);
        let chunk = match self.conn.guard(chunk) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.state = SessionState::Broken;
                self.stop.disarm();
                return Err(err);
            }
        };

        let event = match chunk {
            Chunk::Data(bytes) => {
                trace!(len = bytes.len(), "Stream chunk");
                let encoding = self.conn.config.encoding;
                let event = StreamEvent::from_chunk(bytes, self.comments, encoding);
                if self.ends_on_exit {
                    self.watch_exit(&event);
                }
                event
            }
            Chunk::End => {
                self.state = SessionState::Stopped;
                // without an exit notice, a STOP we sent is answered by this END
                self.stop.disarm();
                info!("Stream ended");
                self.finish()?;
                StreamEvent::End
            }
            Chunk::Error(err) => {
                self.state = SessionState::Failed;
                self.failure = Some(err.clone());
                info!(code = err.code, message = %err.message, "Stream aborted by server");
                if self.stop.disarm() == StopPhase::Sent {
                    self.crossed_stop = true;
                }
                self.finish()?;
                StreamEvent::Error(err)
            }
        };

        Ok(Some(event))
    }

    /// `# PROCESS EXITED` is always followed by END, so no STOP may be
    /// written after it. One already written reaches the daemon after END.
    fn watch_exit(&mut self, event: &StreamEvent) {
        let StreamEvent::Comment(text) = event else {
            return;
        };
        if let Notice::ProcessExited { rc } = Notice::parse(text) {
            debug!(rc, "Traced process exited");
            if self.stop.disarm() == StopPhase::Sent {
                self.crossed_stop = true;
            }
        }
    }

    /// Back to command mode: restore the command timeout and read the
    /// separate reply to a STOP that crossed the end of the stream.
    fn finish(&mut self) -> Result<()> {
        let timeout = self.conn.config.timeout();
        let mut result = self.conn.set_read_timeout(timeout);
        if result.is_ok() && self.crossed_stop {
            debug!("Discarding reply to a STOP sent after the stream ended");
            let reply = read_response(&mut self.conn.reader);
            result = self.conn.guard(reply).map(drop);
        }
        if result.is_err() {
            self.state = SessionState::Broken;
        }
        result
    }

    /// Stop the stream and discard events until it terminates.
    pub fn cancel(&mut self) -> Result<SessionState> {
        self.stop()?;
        while self.next_event()?.is_some() {}
        Ok(self.state)
    }
}

impl Iterator for Session<'_> {
    type Item = Result<StreamEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.state != SessionState::Streaming || self.conn.health != Health::Ready {
            return;
        }
        debug!("Session dropped while streaming");
        if let Err(err) = self.cancel() {
            warn!(error = %err, "Failed to stop stream");
        }
    }
}
