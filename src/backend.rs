//! Backend selection
//!
//! Lets callers use one `KvStore` regardless of whether the target has
//! persistent storage.

use tracing::info;

use crate::config::{BackendKind, Config};
use crate::error::{Result, StoreError};
use crate::flash::{FileFlash, FlashDevice, RamFlash, RegionDriver};
use crate::store::{FlashStore, KvStore};

/// Type-erased flash device used by `Backend`
pub type DynFlash = Box<dyn FlashDevice>;

/// Storage backend chosen for the current target
pub enum Backend {
    /// Log-structured store on a flash region
    Flash(FlashStore<DynFlash>),

    /// Target without persistent storage
    Unsupported(NullStore),
}

impl Backend {
    /// Open the backend described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let device: DynFlash = match config.backend {
            BackendKind::Unsupported => {
                info!("persistent storage unsupported, using no-op backend");
                return Ok(Backend::Unsupported(NullStore));
            }
            BackendKind::Memory => Box::new(RamFlash::new(
                config.region_size,
                config.sector_size,
                config.write_size,
            )),
            BackendKind::File => Box::new(FileFlash::open(
                &config.image_path,
                config.region_size,
                config.sector_size,
                config.write_size,
            )?),
        };

        info!(backend = ?config.backend, region_size = config.region_size, "opening flash backend");
        Self::with_device(device, config)
    }

    /// Open a flash backend on a caller-supplied device
    pub fn with_device(device: DynFlash, config: &Config) -> Result<Self> {
        let driver = RegionDriver::new(device)?;
        let store = if config.reset_on_corruption {
            FlashStore::open_or_reset(driver, config)?
        } else {
            FlashStore::open(driver, config)?
        };
        Ok(Backend::Flash(store))
    }

    /// Whether writes survive a restart
    pub fn is_persistent(&self) -> bool {
        matches!(self, Backend::Flash(_))
    }

    /// The flash store, when there is one
    pub fn flash(&self) -> Option<&FlashStore<DynFlash>> {
        match self {
            Backend::Flash(store) => Some(store),
            Backend::Unsupported(_) => None,
        }
    }

    fn inner(&self) -> &dyn KvStore {
        match self {
            Backend::Flash(store) => store,
            Backend::Unsupported(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn KvStore {
        match self {
            Backend::Flash(store) => store,
            Backend::Unsupported(store) => store,
        }
    }
}

impl KvStore for Backend {
    fn clear(&mut self) -> Result<()> {
        self.inner_mut().clear()
    }

    fn length(&self) -> Result<usize> {
        self.inner().length()
    }

    fn get_item(&self, key: &str) -> Result<Vec<u8>> {
        self.inner().get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.inner_mut().set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.inner_mut().remove_item(key)
    }

    fn key_at(&self, index: usize) -> Result<String> {
        self.inner().key_at(index)
    }

    fn sweep(&mut self) -> Result<()> {
        self.inner_mut().sweep()
    }
}

// =============================================================================
// No-op Backend
// =============================================================================

/// Deterministic backend for targets without persistent storage
///
/// Always empty: lookups report `NotFound`, writes and clears succeed and
/// are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl KvStore for NullStore {
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn length(&self) -> Result<usize> {
        Ok(0)
    }

    fn get_item(&self, _key: &str) -> Result<Vec<u8>> {
        Err(StoreError::NotFound)
    }

    fn set_item(&mut self, _key: &str, _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn remove_item(&mut self, _key: &str) -> Result<()> {
        Err(StoreError::NotFound)
    }

    fn key_at(&self, _index: usize) -> Result<String> {
        Err(StoreError::NotFound)
    }

    fn sweep(&mut self) -> Result<()> {
        Ok(())
    }
}
