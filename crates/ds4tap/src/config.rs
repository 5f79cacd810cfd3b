use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ds4tap_device::{TargetDevice, DEFAULT_READ_TIMEOUT};
use ds4tap_report::{FULL_REPORT_LEN, MIN_REPORT_LEN};
use serde::Deserialize;

use crate::error::ConfigError;

/// Looked up in the working directory when no `--config` is given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "ds4tap.yaml";

/// Where devices are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum BackendKind {
    /// Direct HID enumeration. No hot-plug.
    Hid,
    /// Linux input subsystem with hot-plug events.
    Udev,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(all(feature = "udev-backend", target_os = "linux")) {
            BackendKind::Udev
        } else {
            BackendKind::Hid
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hid" | "hidapi" => Ok(BackendKind::Hid),
            "udev" => Ok(BackendKind::Udev),
            _ => Err(ConfigError::InvalidValue {
                field: "backend",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Hid => f.write_str("hid"),
            BackendKind::Udev => f.write_str("udev"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReaderSettings {
    pub read_timeout: Duration,
    pub min_report_len: usize,
    pub buffer_len: usize,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            min_report_len: MIN_REPORT_LEN,
            buffer_len: FULL_REPORT_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordSettings {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("."),
        }
    }
}

/// Resolved session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub backend: BackendKind,
    pub target: TargetDevice,
    pub reader: ReaderSettings,
    pub record: RecordSettings,
    /// Fail at startup when no matching controller is attached.
    pub require_device: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            target: TargetDevice::default(),
            reader: ReaderSettings::default(),
            record: RecordSettings::default(),
            require_device: true,
        }
    }
}

impl Config {
    /// Loads `path`, or the default file when it exists, or the defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Config::default());
                }
                fallback
            }
        };
        let input = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        parse_config(&input)
    }
}

/// Parse yaml config.
pub(crate) fn parse_config(input: &str) -> Result<Config, ConfigError> {
    let version = parse_version(input)?;
    match version {
        1 => {
            let raw: ConfigV1 = serde_yaml::from_str(input)?;
            raw.to_config()
        }
        _ => Err(ConfigError::UnsupportedVersion(version)),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct VersionedConfig {
    version: u8,
}

fn parse_version(input: &str) -> Result<u8, ConfigError> {
    let raw: VersionedConfig = serde_yaml::from_str(input)?;
    Ok(raw.version)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigV1 {
    #[allow(dead_code)]
    version: u8,
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    device: ConfigV1Device,
    #[serde(default)]
    reader: ConfigV1Reader,
    #[serde(default)]
    record: ConfigV1Record,
    #[serde(default)]
    require_device: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigV1Device {
    #[serde(default)]
    vendor_id: Option<RawId>,
    #[serde(default)]
    product_id: Option<RawId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigV1Reader {
    #[serde(default)]
    read_timeout_ms: Option<u64>,
    #[serde(default)]
    min_report_len: Option<usize>,
    #[serde(default)]
    buffer_len: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigV1Record {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    dir: Option<PathBuf>,
}

/// USB id written either as an integer or as a hex string (`"054c"`,
/// `"0x054c"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u16),
    Text(String),
}

impl RawId {
    fn resolve(&self, field: &'static str) -> Result<u16, ConfigError> {
        match self {
            RawId::Number(id) => Ok(*id),
            RawId::Text(text) => {
                let trimmed = text.trim();
                let digits = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .unwrap_or(trimmed);
                u16::from_str_radix(digits, 16).map_err(|_| ConfigError::InvalidValue {
                    field,
                    value: text.clone(),
                })
            }
        }
    }
}

impl ConfigV1 {
    fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(backend) = &self.backend {
            config.backend = backend.parse()?;
        }
        if let Some(id) = &self.device.vendor_id {
            config.target.vendor_id = id.resolve("device.vendor_id")?;
        }
        if let Some(id) = &self.device.product_id {
            config.target.product_id = id.resolve("device.product_id")?;
        }

        if let Some(ms) = self.reader.read_timeout_ms {
            if ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "reader.read_timeout_ms",
                    value: ms.to_string(),
                });
            }
            config.reader.read_timeout = Duration::from_millis(ms);
        }
        if let Some(len) = self.reader.min_report_len {
            // Shorter reports do not reach the battery byte.
            config.reader.min_report_len = len.max(MIN_REPORT_LEN);
        }
        if let Some(len) = self.reader.buffer_len {
            config.reader.buffer_len = len;
        }
        config.reader.buffer_len = config.reader.buffer_len.max(config.reader.min_report_len);

        if let Some(enabled) = self.record.enabled {
            config.record.enabled = enabled;
        }
        if let Some(dir) = &self.record.dir {
            config.record.dir.clone_from(dir);
        }
        if let Some(require) = self.require_device {
            config.require_device = require;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config("version: 1\n").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.target.vendor_id, 0x054c);
        assert_eq!(config.target.product_id, 0x09cc);
        assert!(config.require_device);
    }

    #[test]
    fn ids_accept_hex_strings_and_integers() {
        let yaml = r#"
version: 1
device:
  vendor_id: "0x054C"
  product_id: 1476
"#;
        let config = parse_config(yaml).expect("parse");
        assert_eq!(config.target.vendor_id, 0x054c);
        assert_eq!(config.target.product_id, 1476);

        let yaml = "version: 1\ndevice:\n  product_id: \"05c4\"\n";
        let config = parse_config(yaml).expect("parse");
        assert_eq!(config.target.product_id, 0x05c4);
    }

    #[test]
    fn invalid_hex_id_is_rejected() {
        let yaml = "version: 1\ndevice:\n  vendor_id: \"sony\"\n";
        assert!(matches!(
            parse_config(yaml),
            Err(ConfigError::InvalidValue {
                field: "device.vendor_id",
                ..
            })
        ));
    }

    #[test]
    fn full_config() {
        let yaml = r"
version: 1
backend: hid
reader:
  read_timeout_ms: 250
  min_report_len: 43
  buffer_len: 16
record:
  enabled: true
  dir: /tmp/ds4
require_device: false
";
        let config = parse_config(yaml).expect("parse");
        assert_eq!(config.backend, BackendKind::Hid);
        assert_eq!(config.reader.read_timeout, Duration::from_millis(250));
        assert_eq!(config.reader.min_report_len, 43);
        assert_eq!(config.reader.buffer_len, 43);
        assert!(config.record.enabled);
        assert_eq!(config.record.dir, PathBuf::from("/tmp/ds4"));
        assert!(!config.require_device);
    }

    #[test]
    fn short_min_report_len_is_raised() {
        let yaml = "version: 1\nreader:\n  min_report_len: 12\n";
        let config = parse_config(yaml).expect("parse");
        assert_eq!(config.reader.min_report_len, MIN_REPORT_LEN);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let yaml = "version: 1\nreader:\n  read_timeout_ms: 0\n";
        assert!(matches!(
            parse_config(yaml),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unknown_fields_and_versions_are_rejected() {
        assert!(matches!(
            parse_config("version: 1\nlatency: 3\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            parse_config("version: 2\n"),
            Err(ConfigError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            parse_config("backend: hid\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(matches!(
            parse_config("version: 1\nbackend: bluetooth\n"),
            Err(ConfigError::InvalidValue {
                field: "backend",
                ..
            })
        ));
    }
}
