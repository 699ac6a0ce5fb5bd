//! Text encoding used on the wire

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Character set for command and payload text.
///
/// The daemon speaks ISO-8859-1. Latin-1 decodes every byte to the code
/// point of the same value, so decoding never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "iso-8859-1", alias = "latin1", alias = "latin-1")]
    Latin1,

    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

impl Encoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn encode(self, text: &str) -> ProtocolResult<Vec<u8>> {
        match self {
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| ProtocolError::Unencodable(c)))
                .collect(),
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Latin1 => "iso-8859-1",
            Encoding::Utf8 => "utf-8",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iso-8859-1" | "latin1" | "latin-1" => Ok(Encoding::Latin1),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            _ => Err(ProtocolError::InvalidArgument(format!("Unknown encoding: {}", s))),
        }
    }
}
