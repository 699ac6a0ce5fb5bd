//! Human and JSON rendering of command results

use std::io::{self, Write};

use amigactl_client::{DirEntry, Notice, StatInfo, StreamEvent, TraceStatus};
use amigactl_protocol::Encoding;
use anyhow::Result;
use colored::*;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub encoding: Encoding,
}

impl Output {
    /// Print `value` as one JSON document, or `human` otherwise.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }

    pub fn ok(&self, what: &str) -> Result<()> {
        self.emit(&json!({ "status": "ok", "operation": what }), || println!("{}", "OK".green()))
    }

    pub fn dir(&self, entries: &[DirEntry]) -> Result<()> {
        self.emit(&entries, || {
            for entry in entries {
                let name = if entry.is_dir() {
                    entry.name.as_str().blue().bold()
                } else {
                    entry.name.as_str().normal()
                };
                let size = if entry.is_dir() {
                    "(dir)".dimmed().to_string()
                } else {
                    entry.size.to_string()
                };
                println!("{:>10}  {}  {}  {}", size, entry.protection, entry.datestamp, name);
            }
        })
    }

    pub fn stat(&self, info: &StatInfo) -> Result<()> {
        self.emit(info, || {
            println!("{:<12}{}", "name".cyan(), info.name);
            println!("{:<12}{:?}", "type".cyan(), info.kind);
            println!("{:<12}{}", "size".cyan(), info.size);
            for (key, value) in [
                ("protection", &info.protection),
                ("datestamp", &info.datestamp),
                ("comment", &info.comment),
            ] {
                if let Some(value) = value {
                    println!("{:<12}{}", key.cyan(), value);
                }
            }
            for (key, value) in &info.extra {
                println!("{:<12}{}", key.cyan(), value);
            }
        })
    }

    pub fn trace_status(&self, status: &TraceStatus) -> Result<()> {
        self.emit(&status.fields, || {
            let state = match (status.loaded(), status.enabled()) {
                (false, _) => "not loaded".red(),
                (true, false) => "disabled".yellow(),
                (true, true) => "enabled".green(),
            };
            println!("{:<18}{}", "tracing".cyan(), state);
            for (key, value) in &status.fields {
                if key != "loaded" && key != "enabled" {
                    println!("{:<18}{}", key.cyan(), value);
                }
            }
        })
    }

    /// Payload bytes go to stdout untouched, unless JSON was requested.
    pub fn bytes(&self, data: &[u8], extra: serde_json::Value) -> Result<()> {
        if self.json {
            let mut value = json!({ "data": self.encoding.decode(data) });
            if let (Some(map), serde_json::Value::Object(extra)) = (value.as_object_mut(), extra) {
                map.extend(extra);
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
        Ok(())
    }

    /// One streaming event. Notices go to stderr so stdout stays data only.
    pub fn event(&self, event: &StreamEvent) -> Result<()> {
        if self.json {
            let value = match event {
                StreamEvent::Data(bytes) => {
                    json!({ "event": "data", "text": self.encoding.decode(bytes) })
                }
                StreamEvent::Comment(text) => json!({
                    "event": "comment",
                    "text": text,
                    "notice": notice_json(text),
                }),
                StreamEvent::End => json!({ "event": "end" }),
                StreamEvent::Error(err) => json!({ "event": "error", "error": err }),
            };
            println!("{}", value);
            return Ok(());
        }

        match event {
            StreamEvent::Data(bytes) => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.flush()?;
            }
            StreamEvent::Comment(text) => match Notice::parse(text) {
                Notice::ProcessExited { rc } => {
                    let rc = if rc == 0 { rc.to_string().green() } else { rc.to_string().red() };
                    eprintln!("{} {}", "Process exited, rc".yellow(), rc);
                }
                Notice::Overflow { dropped } => {
                    let message = format!("Trace buffer overflow, {} events dropped", dropped);
                    eprintln!("{}", message.red());
                }
                Notice::Other(text) => eprintln!("{}", text.dimmed()),
            },
            StreamEvent::End => eprintln!("{}", "Stream ended.".dimmed()),
            StreamEvent::Error(_) => {}
        }
        Ok(())
    }
}

fn notice_json(text: &str) -> serde_json::Value {
    match Notice::parse(text) {
        Notice::ProcessExited { rc } => json!({ "kind": "process_exited", "rc": rc }),
        Notice::Overflow { dropped } => json!({ "kind": "overflow", "dropped": dropped }),
        Notice::Other(_) => serde_json::Value::Null,
    }
}
