//! Typed results of daemon commands

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;

use crate::error::{Error, Result};

/// Kind of a filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FILE" => Some(EntryKind::File),
            "DIR" => Some(EntryKind::Dir),
            _ => None,
        }
    }
}

/// One line of a `DIR` listing: `type\tname\tsize\tprotection\tdatestamp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub kind: EntryKind,
    pub name: String,
    pub size: u64,
    pub protection: String,
    pub datestamp: String,
}

impl DirEntry {
    pub fn parse(line: &str) -> Result<Self> {
        let bad = || Error::UnexpectedResponse(format!("malformed DIR entry: {:?}", line));
        let mut fields = line.split('\t');

        let kind = fields.next().and_then(EntryKind::parse).ok_or_else(bad)?;
        let name = fields.next().filter(|n| !n.is_empty()).ok_or_else(bad)?;
        let size = fields.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;

        Ok(DirEntry {
            kind,
            name: name.to_string(),
            size,
            protection: fields.next().unwrap_or_default().to_string(),
            datestamp: fields.next().unwrap_or_default().to_string(),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Split `key=value` payload lines. Lines without `=` are rejected.
fn parse_fields(lines: &[String]) -> Result<BTreeMap<String, String>> {
    lines
        .iter()
        .map(|line| {
            line.split_once('=')
                .map(|(k, v)| (k.trim().to_lowercase(), v.to_string()))
                .ok_or_else(|| {
                    Error::UnexpectedResponse(format!("expected key=value, got {:?}", line))
                })
        })
        .collect()
}

/// Result of `STAT`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatInfo {
    pub kind: EntryKind,
    pub name: String,
    pub size: u64,
    pub protection: Option<String>,
    pub datestamp: Option<String>,
    pub comment: Option<String>,
    /// Fields this client does not know about
    pub extra: BTreeMap<String, String>,
}

impl StatInfo {
    pub fn parse(lines: &[String]) -> Result<Self> {
        let mut fields = parse_fields(lines)?;
        let mut required = |key: &str| {
            fields
                .remove(key)
                .ok_or_else(|| Error::UnexpectedResponse(format!("STAT reply lacks {:?}", key)))
        };

        let kind_field = required("type")?;
        let kind = EntryKind::parse(&kind_field).ok_or_else(|| {
            Error::UnexpectedResponse(format!("unknown object type {:?}", kind_field))
        })?;
        let name = required("name")?;
        let size_field = required("size")?;
        let size = size_field
            .parse()
            .map_err(|_| Error::UnexpectedResponse(format!("invalid size {:?}", size_field)))?;

        Ok(StatInfo {
            kind,
            name,
            size,
            protection: fields.remove("protection"),
            datestamp: fields.remove("datestamp"),
            comment: fields.remove("comment").filter(|c| !c.is_empty()),
            extra: fields,
        })
    }
}

/// Result of `TRACE STATUS`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceStatus {
    pub fields: BTreeMap<String, String>,
}

impl TraceStatus {
    pub fn parse(lines: &[String]) -> Result<Self> {
        Ok(TraceStatus {
            fields: parse_fields(lines)?,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Whether the kernel tracing module is loaded.
    pub fn loaded(&self) -> bool {
        self.flag("loaded")
    }

    /// Whether tracing is globally enabled.
    pub fn enabled(&self) -> bool {
        self.flag("enabled")
    }

    fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.to_lowercase()).as_deref(),
            Some("1" | "yes" | "true" | "on")
        )
    }
}

/// Output of a synchronous `EXEC`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub rc: i32,
    pub output: Bytes,
}

/// Reply to an `AREXX` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArexxReply {
    pub rc: i32,
    pub result: String,
}
