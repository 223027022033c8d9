//! Array configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::raid::stripe_lock::DEFAULT_STRIPE_LOCKS;
use crate::raid::Scheme;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    pub scheme: Scheme,
    /// Number of member devices.
    pub devices: usize,
    /// Size of every device, in blocks.
    pub device_blocks: u64,
    /// Directory holding the `device{i}.img` files.
    pub data_dir: PathBuf,
    /// Lock shards guarding parity groups.
    pub stripe_locks: usize,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::RotatingParity,
            devices: 5,
            device_blocks: 16384,
            data_dir: PathBuf::from("disks"),
            stripe_locks: DEFAULT_STRIPE_LOCKS,
        }
    }
}

impl ArrayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices < self.scheme.min_devices() {
            return Err(ConfigError::Invalid(format!(
                "{} needs at least {} devices, got {}",
                self.scheme,
                self.scheme.min_devices(),
                self.devices
            )));
        }
        if self.device_blocks == 0 {
            return Err(ConfigError::Invalid("device_blocks must be positive".into()));
        }
        if self.stripe_locks == 0 {
            return Err(ConfigError::Invalid("stripe_locks must be positive".into()));
        }
        Ok(())
    }

    /// Logical blocks the configured array exposes.
    pub fn capacity_blocks(&self) -> u64 {
        self.scheme.capacity(self.devices, self.device_blocks)
    }
}

impl std::str::FromStr for ArrayConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: ArrayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
