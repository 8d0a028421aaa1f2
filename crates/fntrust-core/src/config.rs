//! Configuration types for the integrity service.

use crate::error::{IntegrityError, Result};
use fntrust_anchor::{DEFAULT_REGISTER_INDEX, DEFAULT_TPM_DEVICE, REGISTER_COUNT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Overrides `storage.path`.
pub const ENV_DB_PATH: &str = "FNTRUST_DB_PATH";
/// Overrides `anchor.backend`.
pub const ENV_ANCHOR_BACKEND: &str = "FNTRUST_ANCHOR_BACKEND";
/// Overrides `anchor.device_path`.
pub const ENV_TPM_DEVICE: &str = "FNTRUST_TPM_DEVICE";
/// Overrides `anchor.register_index`.
pub const ENV_PCR_INDEX: &str = "FNTRUST_PCR_INDEX";
/// Overrides `logging.level`.
pub const ENV_LOG: &str = "FNTRUST_LOG";

/// Configuration for the integrity service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Durable accumulator state.
    pub storage: StorageConfig,

    /// Trust anchor device.
    pub anchor: AnchorConfig,

    /// Log filter used by the binary.
    pub logging: LoggingConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the Sled database.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./fntrust.db"),
        }
    }
}

/// Which register bank backs the trust anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorBackend {
    /// In-memory registers. State is lost with the process.
    #[default]
    Simulator,
    /// TPM 2.0 character device.
    Device,
}

impl FromStr for AnchorBackend {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulator" => Ok(AnchorBackend::Simulator),
            "device" | "tpm" => Ok(AnchorBackend::Device),
            other => Err(IntegrityError::Config(format!(
                "unknown anchor backend {:?}",
                other
            ))),
        }
    }
}

/// Trust anchor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Which register bank to drive.
    pub backend: AnchorBackend,

    /// TPM device, used when `backend = "device"`.
    pub device_path: PathBuf,

    /// Register the root is sealed into.
    pub register_index: u32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            backend: AnchorBackend::Simulator,
            device_path: PathBuf::from(DEFAULT_TPM_DEVICE),
            register_index: DEFAULT_REGISTER_INDEX,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive, e.g. `info` or `fntrust_core=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Reads a TOML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| IntegrityError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| IntegrityError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Applies `FNTRUST_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(backend) = lookup(ENV_ANCHOR_BACKEND) {
            self.anchor.backend = backend.parse()?;
        }
        if let Some(device) = lookup(ENV_TPM_DEVICE) {
            self.anchor.device_path = PathBuf::from(device);
        }
        if let Some(index) = lookup(ENV_PCR_INDEX) {
            self.anchor.register_index = index.trim().parse().map_err(|_| {
                IntegrityError::Config(format!("{} is not a register index: {:?}", ENV_PCR_INDEX, index))
            })?;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Rejects settings no service can start with.
    pub fn validate(&self) -> Result<()> {
        if self.anchor.register_index >= REGISTER_COUNT {
            return Err(IntegrityError::Config(format!(
                "register index {} is out of range (0..{})",
                self.anchor.register_index, REGISTER_COUNT
            )));
        }
        Ok(())
    }
}
