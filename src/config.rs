//! Emulator configuration, stored as TOML.
//!
//! A missing file is not an error: every field has a default and the
//! emulator starts with those. A file that exists but does not parse is.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const CONFIG_DIR: &str = ".config/procon-gadget";
const CONFIG_FILE: &str = "config.toml";

/// How much protocol traffic is traced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verbosity {
    #[default]
    Silent,
    /// Every frame read and every reply written (periodic input reports excluded).
    Frames,
    /// Frames plus protocol decisions: flash hits and misses, unknown codes.
    Protocol,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Frames,
            _ => Verbosity::Protocol,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EmulatorConfig {
    /// HID gadget character device.
    pub device_path: PathBuf,
    /// configfs gadget to bind on connect. Empty disables gadget management.
    pub gadget_name: String,
    /// 0 silent, 1 frame tracing, 2 and up protocol tracing.
    pub log_level: u8,
    /// Fail `connect` when the gadget cannot be bound instead of logging it.
    pub strict_activation: bool,
    pub counter_period_ms: u64,
    pub report_period_ms: u64,
    pub configfs_root: PathBuf,
    pub udc_class_root: PathBuf,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/hidg0"),
            gadget_name: "procon".to_string(),
            log_level: 0,
            strict_activation: false,
            counter_period_ms: 5,
            report_period_ms: 30,
            configfs_root: PathBuf::from("/sys/kernel/config/usb_gadget"),
            udc_class_root: PathBuf::from("/sys/class/udc"),
        }
    }
}

impl EmulatorConfig {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_level(self.log_level)
    }

    /// `~/.config/procon-gadget/config.toml`, or relative to the working
    /// directory when there is no home.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml(&content, path)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = EmulatorConfig::from_toml(
            "device_path = \"/dev/hidg1\"\nlog_level = 2\n",
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.device_path, PathBuf::from("/dev/hidg1"));
        assert_eq!(config.verbosity(), Verbosity::Protocol);
        assert_eq!(config.gadget_name, "procon");
        assert_eq!(config.report_period_ms, 30);
        assert!(!config.strict_activation);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let err = EmulatorConfig::from_toml("log_level = \"loud\"", Path::new("bad.toml"));
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn levels_map_onto_verbosity() {
        assert_eq!(Verbosity::from_level(0), Verbosity::Silent);
        assert_eq!(Verbosity::from_level(1), Verbosity::Frames);
        assert_eq!(Verbosity::from_level(9), Verbosity::Protocol);
        assert!(Verbosity::Protocol > Verbosity::Frames);
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmulatorConfig::load_or_default(&dir.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(config, EmulatorConfig::default());
    }

    #[tokio::test]
    async fn existing_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "gadget_name = \"\"\nstrict_activation = true\n")
            .await
            .unwrap();

        let config = EmulatorConfig::load_or_default(&path).await.unwrap();
        assert!(config.gadget_name.is_empty());
        assert!(config.strict_activation);
    }
}
