//! Events produced by streaming commands (TAIL, TRACE)

use bytes::Bytes;

use crate::encoding::Encoding;
use crate::error::DaemonError;

/// One item of a streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Raw bytes of one `DATA` chunk
    Data(Bytes),
    /// Out-of-band text from the daemon, recognized by a leading `#`
    Comment(String),
    /// The stream ended normally (`END`)
    End,
    /// The daemon aborted the stream (`ERR`)
    Error(DaemonError),
}

impl StreamEvent {
    /// Classify a chunk. Only chunks starting with `#` become comments,
    /// and only when the consumer asked for comment detection.
    pub fn from_chunk(chunk: Bytes, comments: bool, encoding: Encoding) -> Self {
        if comments && chunk.first() == Some(&b'#') {
            let text = encoding.decode(&chunk);
            StreamEvent::Comment(text.trim_end_matches(&['\r', '\n'][..]).to_string())
        } else {
            StreamEvent::Data(chunk)
        }
    }
}

/// Status notices carried in trace comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// `# PROCESS EXITED rc=<N>`
    ProcessExited { rc: i32 },
    /// `# OVERFLOW <N> events dropped`
    Overflow { dropped: u64 },
    /// Any other comment, without the leading `#`
    Other(String),
}

impl Notice {
    pub fn parse(comment: &str) -> Notice {
        let body = comment.strip_prefix('#').unwrap_or(comment).trim();

        if let Some(rest) = body.strip_prefix("PROCESS EXITED") {
            if let Some(rc) = parse_rc(rest) {
                return Notice::ProcessExited { rc };
            }
        }

        if let Some(rest) = body.strip_prefix("OVERFLOW") {
            if let Some(dropped) = rest.split_whitespace().next().and_then(|n| n.parse().ok()) {
                return Notice::Overflow { dropped };
            }
        }

        Notice::Other(body.to_string())
    }
}

/// Find an `rc=<N>` token in free text.
pub fn parse_rc(text: &str) -> Option<i32> {
    text.split_whitespace()
        .find_map(|token| token.strip_prefix("rc="))
        .and_then(|rc| rc.parse().ok())
}
