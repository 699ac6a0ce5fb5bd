//! Client configuration

use std::time::Duration;

use amigactl_protocol::Encoding;
use serde::{Deserialize, Serialize};

/// Port amigactld listens on by default
pub const DEFAULT_PORT: u16 = 6800;

/// Read/write timeout applied when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Socket read/write timeout in seconds, 0 to wait forever
    pub timeout_secs: u64,
    /// Read timeout between events of a TAIL or TRACE stream, 0 to wait
    /// forever. A followed file can stay quiet for hours.
    pub stream_timeout_secs: u64,
    pub encoding: Encoding,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_stream_timeout(mut self, secs: u64) -> Self {
        self.stream_timeout_secs = secs;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `None` means no timeout.
    pub fn timeout(&self) -> Option<Duration> {
        seconds(self.timeout_secs)
    }

    pub fn stream_timeout(&self) -> Option<Duration> {
        seconds(self.stream_timeout_secs)
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    match secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            stream_timeout_secs: 0,
            encoding: Encoding::Latin1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:6800");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.stream_timeout(), None);
        assert_eq!(config.encoding, Encoding::Latin1);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = ClientConfig::new("amiga.local", 7000).with_timeout(0);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.addr(), "amiga.local:7000");
    }

    #[test]
    fn test_partial_deserialize() {
        let json = r#"{"host": "10.0.0.5", "encoding": "utf-8", "stream_timeout_secs": 600}"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.stream_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.encoding, Encoding::Utf8);
    }
}
