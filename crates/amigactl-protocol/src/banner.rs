//! Connection banner

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ProtocolError, ProtocolResult};

/// Prefix of the line the daemon sends on connect
pub const BANNER_PREFIX: &str = "AMIGACTL ";

/// Protocol version announced in the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidBanner(s.to_string());
        let mut parts = s.split('.');
        let mut next = || -> ProtocolResult<u32> {
            parts.next().and_then(|p| p.parse().ok()).ok_or_else(|| invalid())
        };
        let version = ProtocolVersion::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

/// Validate a banner line (`AMIGACTL <major>.<minor>.<patch>`).
pub fn parse_banner(line: &str) -> ProtocolResult<ProtocolVersion> {
    line.strip_prefix(BANNER_PREFIX)
        .ok_or_else(|| ProtocolError::InvalidBanner(line.to_string()))?
        .parse()
        .map_err(|_| ProtocolError::InvalidBanner(line.to_string()))
}
