//! Configuration layering: flags and environment over a TOML file over defaults

use std::path::Path;

use amigactl_client::{ClientConfig, Encoding};
use anyhow::{Context, Result};
use serde::Deserialize;

/// Contents of an `amigactl.toml` file. Every key is optional.
///
/// ```toml
/// host = "amiga.local"
/// port = 6800
/// timeout = 30
/// stream_timeout = 0
/// encoding = "iso-8859-1"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<u64>,
    pub stream_timeout: Option<u64>,
    pub encoding: Option<Encoding>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Values given on the command line or through `AMIGACTL_*` variables.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<u64>,
    pub stream_timeout: Option<u64>,
    pub encoding: Option<Encoding>,
}

pub fn resolve(overrides: Overrides, file: Option<FileConfig>) -> ClientConfig {
    let file = file.unwrap_or_default();
    let defaults = ClientConfig::default();

    ClientConfig {
        host: overrides.host.or(file.host).unwrap_or(defaults.host),
        port: overrides.port.or(file.port).unwrap_or(defaults.port),
        timeout_secs: overrides.timeout.or(file.timeout).unwrap_or(defaults.timeout_secs),
        stream_timeout_secs: overrides
            .stream_timeout
            .or(file.stream_timeout)
            .unwrap_or(defaults.stream_timeout_secs),
        encoding: overrides.encoding.or(file.encoding).unwrap_or(defaults.encoding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(Overrides::default(), None);
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"amiga.local\"\nport = 7000\nencoding = \"utf-8\"").unwrap();
        writeln!(file, "stream_timeout = 3600").unwrap();

        let loaded = FileConfig::load(file.path()).unwrap();
        assert_eq!(loaded.host.as_deref(), Some("amiga.local"));

        let overrides = Overrides {
            port: Some(6900),
            ..Overrides::default()
        };
        let config = resolve(overrides, Some(loaded));
        assert_eq!(config.host, "amiga.local");
        assert_eq!(config.port, 6900);
        assert_eq!(config.encoding, Encoding::Utf8);
        assert_eq!(config.timeout_secs, ClientConfig::default().timeout_secs);
        assert_eq!(config.stream_timeout_secs, 3600);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amigactl.toml");
        std::fs::write(&path, "hostname = \"typo\"\n").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid config file"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileConfig::load(&dir.path().join("absent.toml")).is_err());
    }
}
