//! Configuration for flashstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::flash::HEADER_SIZE;

/// Main configuration for a flashstore instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Region Geometry
    // -------------------------------------------------------------------------
    /// Total region size in bytes (header + payload)
    pub region_size: usize,

    /// Erase unit of the medium; region_size must be a multiple of it
    pub sector_size: usize,

    /// Native program granularity in bytes (1, 2 or 4); must divide region_size
    pub write_size: usize,

    // -------------------------------------------------------------------------
    // Store Limits
    // -------------------------------------------------------------------------
    /// Longest accepted key, in bytes
    pub max_key_len: usize,

    /// Longest accepted value, in bytes
    pub max_value_len: usize,

    /// Compact automatically instead of returning SweepRequired
    pub auto_sweep: bool,

    /// Erase a region that fails integrity checks instead of refusing to open
    pub reset_on_corruption: bool,

    // -------------------------------------------------------------------------
    // Backend Selection
    // -------------------------------------------------------------------------
    /// Which storage backend to open
    pub backend: BackendKind,

    /// Image file used by `BackendKind::File`
    pub image_path: PathBuf,
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Simulated flash held in RAM (lost on drop)
    Memory,

    /// Flash image persisted to `image_path`
    File,

    /// Target has no persistent storage; every operation is a no-op
    Unsupported,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region_size: 80 * 1024, // 80 KB
            sector_size: 16 * 1024,
            write_size: 1,
            max_key_len: 64,
            max_value_len: 1024,
            auto_sweep: false,
            reset_on_corruption: false,
            backend: BackendKind::File,
            image_path: PathBuf::from("./flashstore.img"),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Usable payload bytes of the region
    pub fn capacity(&self) -> usize {
        self.region_size.saturating_sub(HEADER_SIZE)
    }

    /// Check that the geometry describes a region the driver can manage
    pub fn validate(&self) -> Result<()> {
        if self.region_size <= HEADER_SIZE {
            return Err(StoreError::Config(format!(
                "region_size {} leaves no room after the {}-byte header",
                self.region_size, HEADER_SIZE
            )));
        }
        // Size word must stay distinguishable from the erased sentinel
        if self.capacity() >= u32::MAX as usize {
            return Err(StoreError::Config(format!(
                "region_size {} does not fit the 32-bit size field",
                self.region_size
            )));
        }
        if self.sector_size == 0 || self.region_size % self.sector_size != 0 {
            return Err(StoreError::Config(format!(
                "region_size {} is not a multiple of sector_size {}",
                self.region_size, self.sector_size
            )));
        }
        if !matches!(self.write_size, 1 | 2 | 4) {
            return Err(StoreError::Config(format!(
                "write_size {} unsupported (expected 1, 2 or 4)",
                self.write_size
            )));
        }
        if self.region_size % self.write_size != 0 {
            return Err(StoreError::Config(format!(
                "region_size {} is not a multiple of write_size {}",
                self.region_size, self.write_size
            )));
        }
        if self.max_key_len == 0 || self.max_value_len == 0 {
            return Err(StoreError::Config(
                "item length limits must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the total region size (in bytes, header included)
    pub fn region_size(mut self, size: usize) -> Self {
        self.config.region_size = size;
        self
    }

    /// Set the erase sector size (in bytes)
    pub fn sector_size(mut self, size: usize) -> Self {
        self.config.sector_size = size;
        self
    }

    /// Set the native program granularity (in bytes)
    pub fn write_size(mut self, size: usize) -> Self {
        self.config.write_size = size;
        self
    }

    /// Set the maximum key length (in bytes)
    pub fn max_key_len(mut self, len: usize) -> Self {
        self.config.max_key_len = len;
        self
    }

    /// Set the maximum value length (in bytes)
    pub fn max_value_len(mut self, len: usize) -> Self {
        self.config.max_value_len = len;
        self
    }

    /// Compact automatically when a write hits fragmentation
    pub fn auto_sweep(mut self, enabled: bool) -> Self {
        self.config.auto_sweep = enabled;
        self
    }

    /// Discard a damaged region on open instead of failing
    pub fn reset_on_corruption(mut self, enabled: bool) -> Self {
        self.config.reset_on_corruption = enabled;
        self
    }

    /// Set the storage backend
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.config.backend = kind;
        self
    }

    /// Set the flash image file (file backend only)
    pub fn image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.image_path = path.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
