//! amigactl CLI
//!
//! Command-line client for amigactld.
//!
//! # Usage
//!
//! ```bash
//! # List a directory
//! amigactl --host amiga.local ls SYS:
//!
//! # Copy files in both directions
//! amigactl get DH0:Docs/readme.txt
//! amigactl put build/game DH0:Games/game
//!
//! # Run a command and ARexx
//! amigactl exec -- list RAM: ALL
//! amigactl arexx REXX "return 6*7"
//!
//! # Follow a file or trace library calls until Ctrl-C
//! amigactl tail RAM:log.txt
//! amigactl trace run --filter lib=dos -- C:List RAM:
//!
//! # Settings from a file, flags win
//! AMIGACTL_CONFIG=~/.config/amigactl.toml amigactl --json stat SYS:
//! ```

mod config;
mod output;
mod stream;

use std::path::PathBuf;
use std::process::ExitCode;

use amigactl_client::{Connection, Encoding};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{FileConfig, Overrides};
use crate::output::Output;
use crate::stream::StreamRequest;

/// amigactl - remote control for an Amiga running amigactld
#[derive(Parser, Debug)]
#[command(name = "amigactl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Daemon hostname
    #[arg(short = 'H', long, env = "AMIGACTL_HOST", global = true)]
    host: Option<String>,

    /// Daemon port [default: 6800]
    #[arg(short, long, env = "AMIGACTL_PORT", global = true)]
    port: Option<u16>,

    /// Socket timeout in seconds, 0 waits forever [default: 30]
    #[arg(short, long, env = "AMIGACTL_TIMEOUT", global = true)]
    timeout: Option<u64>,

    /// Wait between stream events in seconds, 0 waits forever [default: 0]
    #[arg(long, env = "AMIGACTL_STREAM_TIMEOUT", global = true)]
    stream_timeout: Option<u64>,

    /// Text encoding (iso-8859-1, utf-8) [default: iso-8859-1]
    #[arg(long, env = "AMIGACTL_ENCODING", global = true)]
    encoding: Option<Encoding>,

    /// Configuration file path
    #[arg(short, long, env = "AMIGACTL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error, or a tracing directive)
    #[arg(long, env = "AMIGACTL_LOG", default_value = "warn", global = true)]
    log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the daemon version
    Version,
    /// Check that the daemon answers
    Ping,
    /// List a directory
    Ls { path: String },
    /// Show information about a file or directory
    Stat { path: String },
    /// Print a remote file to stdout
    Cat { path: String },
    /// Download a file
    Get {
        remote: String,
        /// Local destination [default: remote file name]
        local: Option<PathBuf>,
    },
    /// Upload a file
    Put { local: PathBuf, remote: String },
    /// Run a command on the Amiga
    Exec {
        /// Start in the background and print the process id
        #[arg(long = "async")]
        detach: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Send a command to an ARexx port
    Arexx {
        port: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Rename or move a file
    Mv { from: String, to: String },
    /// Follow a file until Ctrl-C
    Tail { path: String },
    /// Library call tracing
    Trace {
        #[command(subcommand)]
        action: TraceAction,
    },
    /// Stop the daemon
    Shutdown {
        /// Required; the daemon exits and all clients are disconnected
        #[arg(long)]
        confirm: bool,
    },
    /// Send a command line verbatim
    Raw {
        /// The response carries DATA chunks
        #[arg(long)]
        chunked: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        line: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum TraceAction {
    /// Stream events from all processes until Ctrl-C
    Start {
        /// Filters such as lib=dos, func=Open, proc=Shell
        filters: Vec<String>,
    },
    /// Launch a program and stream its events until it exits
    Run {
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Stop another client's trace stream
    Stop,
    /// Show tracer state
    Status,
    /// Enable tracing, optionally for named functions only
    Enable { names: Vec<String> },
    /// Disable tracing, optionally for named functions only
    Disable { names: Vec<String> },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let file = args.config.as_deref().map(FileConfig::load).transpose()?;
    let config = config::resolve(
        Overrides {
            host: args.host,
            port: args.port,
            timeout: args.timeout,
            stream_timeout: args.stream_timeout,
            encoding: args.encoding,
        },
        file,
    );
    debug!(addr = %config.addr(), encoding = %config.encoding, "Resolved configuration");

    let out = Output {
        json: args.json,
        encoding: config.encoding,
    };

    if let Commands::Shutdown { confirm: false } = args.command {
        bail!("Refusing to stop the daemon without --confirm");
    }

    let mut conn = Connection::connect(&config)
        .with_context(|| format!("Cannot talk to amigactld at {}", config.addr()))?;

    let request = match args.command {
        Commands::Tail { path } => StreamRequest::Tail { path },
        Commands::Trace {
            action: TraceAction::Start { filters },
        } => StreamRequest::TraceStart { filters },
        Commands::Trace {
            action: TraceAction::Run { filters, command },
        } => StreamRequest::TraceRun {
            filters,
            command: command.join(" "),
        },
        command => {
            let code = execute(&mut conn, command, out)?;
            conn.close();
            return Ok(code);
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let result = runtime.block_on(stream::run(conn, request, out));
    // don't wait for a stream thread still blocked in a read
    runtime.shutdown_background();
    result.map(|_| ExitCode::SUCCESS)
}

/// Run one request/response command.
fn execute(conn: &mut Connection, command: Commands, out: Output) -> Result<ExitCode> {
    match command {
        Commands::Version => {
            let version = conn.version()?;
            out.emit(&json!({ "version": version, "protocol": conn.protocol_version() }), || {
                println!("{}", version)
            })?;
        }
        Commands::Ping => {
            conn.ping()?;
            out.ok("ping")?;
        }
        Commands::Ls { path } => out.dir(&conn.dir(&path)?)?,
        Commands::Stat { path } => out.stat(&conn.stat(&path)?)?,
        Commands::Cat { path } => {
            let data = conn.read(&path)?;
            out.bytes(&data, json!({ "path": path, "size": data.len() }))?;
        }
        Commands::Get { remote, local } => {
            let local = local.unwrap_or_else(|| PathBuf::from(remote_file_name(&remote)));
            let data = conn.read(&remote)?;
            std::fs::write(&local, &data)
                .with_context(|| format!("Failed to write {}", local.display()))?;
            out.emit(&json!({ "remote": remote, "local": local, "bytes": data.len() }), || {
                println!("{} bytes -> {}", data.len(), local.display())
            })?;
        }
        Commands::Put { local, remote } => {
            let data = std::fs::read(&local)
                .with_context(|| format!("Failed to read {}", local.display()))?;
            let written = conn.write(&remote, &data)?;
            out.emit(&json!({ "local": local, "remote": remote, "bytes": written }), || {
                println!("{} bytes -> {}", written, remote)
            })?;
        }
        Commands::Exec { detach: true, command } => {
            let pid = conn.exec_async(&command.join(" "))?;
            out.emit(&json!({ "pid": pid }), || println!("Started process {}", pid))?;
        }
        Commands::Exec { detach: false, command } => {
            let result = conn.exec(&command.join(" "))?;
            out.bytes(&result.output, json!({ "rc": result.rc }))?;
            return Ok(exit_code(result.rc));
        }
        Commands::Arexx { port, command } => {
            let reply = conn.arexx(&port, &command.join(" "))?;
            out.emit(&reply, || {
                if !reply.result.is_empty() {
                    println!("{}", reply.result);
                }
                if reply.rc != 0 {
                    eprintln!("{} {}", "rc".yellow(), reply.rc);
                }
            })?;
            return Ok(exit_code(reply.rc));
        }
        Commands::Mv { from, to } => {
            conn.rename(&from, &to)?;
            out.ok("rename")?;
        }
        Commands::Trace { action } => trace(conn, action, out)?,
        Commands::Shutdown { .. } => {
            conn.shutdown()?;
            out.ok("shutdown")?;
        }
        Commands::Raw { chunked: true, line } => {
            let response = conn.chunked_command(&line.join(" "))?;
            let info = response.info.clone();
            out.bytes(response.data(), json!({ "info": info }))?;
        }
        Commands::Raw { chunked: false, line } => {
            let response = conn.command(&line.join(" "))?;
            out.emit(&json!({ "info": response.info, "lines": response.lines() }), || {
                if !response.info.is_empty() {
                    println!("{} {}", "OK".green(), response.info);
                }
                for line in response.lines() {
                    println!("{}", line);
                }
            })?;
        }
        Commands::Tail { .. } => bail!("tail needs a streaming session"),
    }
    Ok(ExitCode::SUCCESS)
}

fn trace(conn: &mut Connection, action: TraceAction, out: Output) -> Result<()> {
    match action {
        TraceAction::Stop => {
            conn.trace_stop()?;
            out.ok("trace stop")
        }
        TraceAction::Status => out.trace_status(&conn.trace_status()?),
        TraceAction::Enable { names } => {
            conn.trace_enable(&names)?;
            out.ok("trace enable")
        }
        TraceAction::Disable { names } => {
            conn.trace_disable(&names)?;
            out.ok("trace disable")
        }
        TraceAction::Start { .. } | TraceAction::Run { .. } => {
            bail!("trace streams need a streaming session")
        }
    }
}

/// Last component of an Amiga path (`DH0:Docs/readme.txt` -> `readme.txt`).
fn remote_file_name(remote: &str) -> &str {
    let name = remote.rsplit(|c| c == '/' || c == ':').next().unwrap_or(remote);
    if name.is_empty() {
        remote
    } else {
        name
    }
}

/// AmigaDOS return codes (0, 5, 10, 20) map onto the process exit status.
fn exit_code(rc: i32) -> ExitCode {
    match rc {
        0 => ExitCode::SUCCESS,
        rc => ExitCode::from(rc.clamp(1, 255) as u8),
    }
}
