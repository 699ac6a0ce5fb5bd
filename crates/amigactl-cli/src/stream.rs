//! Streaming commands (tail, trace start, trace run) with Ctrl-C handling

use amigactl_client::{Connection, Session, SessionState, StopHandle};
use anyhow::{bail, Context, Result};
use colored::*;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::output::Output;

#[derive(Debug, Clone)]
pub enum StreamRequest {
    Tail { path: String },
    TraceStart { filters: Vec<String> },
    TraceRun { filters: Vec<String>, command: String },
}

impl StreamRequest {
    fn open(self, conn: &mut Connection) -> amigactl_client::Result<Session<'_>> {
        match self {
            StreamRequest::Tail { path } => conn.tail(&path),
            StreamRequest::TraceStart { filters } => conn.trace_start(&filters),
            StreamRequest::TraceRun { filters, command } => conn.trace_run(&filters, &command),
        }
    }
}

/// Run the session on a blocking thread until it ends. The first Ctrl-C
/// sends STOP; a second one exits immediately.
pub async fn run(conn: Connection, request: StreamRequest, out: Output) -> Result<()> {
    let (handle_tx, mut handle_rx) = oneshot::channel::<StopHandle>();

    let mut task = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = conn;
        let mut session = request.open(&mut conn)?;
        if let Some(number) = session.info_number() {
            debug!(info = number, "Stream opened");
        }
        // the receiver is gone only when main already gave up
        let _ = handle_tx.send(session.stop_handle());

        for event in &mut session {
            out.event(&event?)?;
        }

        let state = session.state();
        let failure = session.failure().cloned();
        drop(session);
        conn.close();

        match (state, failure) {
            (SessionState::Failed, Some(err)) => Err(err).context("Stream aborted by server"),
            _ => Ok(()),
        }
    });

    let mut stop: Option<StopHandle> = None;
    let mut waiting_for_handle = true;

    loop {
        tokio::select! {
            result = &mut task => {
                return result.context("Stream thread panicked")?;
            }
            handle = &mut handle_rx, if waiting_for_handle => {
                waiting_for_handle = false;
                stop = handle.ok();
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                match stop.take() {
                    Some(handle) => {
                        if !out.json {
                            eprintln!("{}", "Stopping...".yellow());
                        }
                        if let Err(e) = handle.stop() {
                            warn!(error = %e, "Failed to send STOP");
                        }
                    }
                    None if waiting_for_handle => bail!("Interrupted before the stream started"),
                    None => {
                        eprintln!("{}", "Interrupted.".red());
                        std::process::exit(130);
                    }
                }
            }
        }
    }
}
