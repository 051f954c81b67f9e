//! Flash-backed key-value store
//!
//! Keeps the record log in RAM and persists it to the region one session per
//! mutation.
//!
//! ## Space Accounting
//! - **live**: the latest `Put` record of every key still present
//! - **dead**: everything else in the log (superseded puts, tombstones)
//!
//! A mutation first tries to append one record. When the append does not fit
//! but the data would fit once dead records are dropped, the caller gets
//! `SweepRequired` (or, with `auto_sweep`, the store compacts in the same
//! session). Once the log holds no dead records, an operation that still does
//! not fit as an append is written as a compacted log directly, so a retry
//! after `sweep()` always makes progress.

use std::collections::BTreeMap;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::flash::{FlashDevice, RegionDriver};

use super::record::Record;
use super::KvStore;

/// Log-structured store on top of a `RegionDriver`
pub struct FlashStore<D: FlashDevice> {
    driver: RegionDriver<D>,

    /// Committed log, byte-identical to the region payload
    log: BytesMut,

    /// Live entries in key order
    index: BTreeMap<String, Vec<u8>>,

    max_key_len: usize,
    max_value_len: usize,
    auto_sweep: bool,
}

impl<D: FlashDevice> FlashStore<D> {
    /// Load the store from a region
    ///
    /// An erased region opens empty. A region that fails checksum or record
    /// validation is reported as `Integrity` and left untouched.
    pub fn open(driver: RegionDriver<D>, config: &Config) -> Result<Self> {
        let mut log = BytesMut::new();
        let mut index = BTreeMap::new();

        if let Some(payload) = driver.image()? {
            for record in Record::decode_all(payload)? {
                match record.value {
                    Some(value) => index.insert(record.key, value),
                    None => index.remove(&record.key),
                };
            }
            log.extend_from_slice(payload);
        }

        info!(entries = index.len(), log_bytes = log.len(), "flash store opened");

        Ok(Self {
            driver,
            log,
            index,
            max_key_len: config.max_key_len,
            max_value_len: config.max_value_len,
            auto_sweep: config.auto_sweep,
        })
    }

    /// Like `open`, but erases a damaged region instead of failing
    pub fn open_or_reset(mut driver: RegionDriver<D>, config: &Config) -> Result<Self> {
        let damage = match driver.image() {
            Ok(Some(payload)) => Record::decode_all(payload).err(),
            Ok(None) => None,
            Err(e @ StoreError::Integrity(_)) => Some(e),
            Err(e) => return Err(e),
        };
        if let Some(e) = damage {
            warn!(error = %e, "discarding damaged store region");
            driver.clear()?;
        }
        Self::open(driver, config)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Payload capacity of the underlying region
    pub fn capacity(&self) -> usize {
        self.driver.capacity()
    }

    /// Bytes currently used by the log
    pub fn log_size(&self) -> usize {
        self.log.len()
    }

    /// Bytes the log would shrink to after a sweep
    pub fn live_size(&self) -> Result<usize> {
        self.index
            .iter()
            .map(|(k, v)| Record::put(k, v).encoded_len())
            .sum()
    }

    /// Bytes a sweep would reclaim
    pub fn dead_size(&self) -> Result<usize> {
        Ok(self.log.len().saturating_sub(self.live_size()?))
    }

    /// Borrow the region driver (e.g. to inspect the header)
    pub fn driver(&self) -> &RegionDriver<D> {
        &self.driver
    }

    /// Release the region driver
    pub fn into_driver(self) -> RegionDriver<D> {
        self.driver
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn check_key(&self, key: &str) -> Result<()> {
        if key.len() > self.max_key_len {
            return Err(StoreError::OverLength {
                what: "key",
                len: key.len(),
                limit: self.max_key_len,
            });
        }
        Ok(())
    }

    /// Write `log` as the new region image in one session
    fn commit(&mut self, log: BytesMut) -> Result<()> {
        self.driver.begin_program()?;
        self.driver.program(&log)?;
        self.driver.end_program()?;
        debug!(log_bytes = log.len(), "store log committed");
        self.log = log;
        Ok(())
    }

    /// Serialize `index` as a log with no dead records
    fn compacted(index: &BTreeMap<String, Vec<u8>>) -> Result<BytesMut> {
        let mut log = BytesMut::new();
        for (key, value) in index {
            Record::put(key, value).encode(&mut log)?;
        }
        Ok(log)
    }

    /// Append `record` if it fits, otherwise fall back to a compacted write
    ///
    /// `next` is the index as it will be after the mutation.
    fn apply(&mut self, record: Record, next: BTreeMap<String, Vec<u8>>) -> Result<()> {
        let capacity = self.capacity();
        let record_len = record.encoded_len()?;

        if self.log.len() + record_len <= capacity {
            let mut log = self.log.clone();
            record.encode(&mut log)?;
            self.commit(log)?;
            self.index = next;
            return Ok(());
        }

        let compacted = Self::compacted(&next)?;
        if compacted.len() > capacity {
            return Err(StoreError::Full {
                needed: compacted.len(),
                available: capacity,
            });
        }

        let dead = self.dead_size()?;
        if dead > 0 && !self.auto_sweep {
            debug!(dead, "write needs a sweep");
            return Err(StoreError::SweepRequired { dead });
        }

        info!(reclaimed = dead, "compacting store log");
        self.commit(compacted)?;
        self.index = next;
        Ok(())
    }
}

impl<D: FlashDevice> KvStore for FlashStore<D> {
    fn clear(&mut self) -> Result<()> {
        self.driver.clear()?;
        self.log.clear();
        self.index.clear();
        Ok(())
    }

    fn length(&self) -> Result<usize> {
        Ok(self.index.len())
    }

    fn get_item(&self, key: &str) -> Result<Vec<u8>> {
        self.index.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn set_item(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        if value.len() > self.max_value_len {
            return Err(StoreError::OverLength {
                what: "value",
                len: value.len(),
                limit: self.max_value_len,
            });
        }

        let mut next = self.index.clone();
        next.insert(key.to_string(), value.to_vec());
        self.apply(Record::put(key, value), next)
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        if !self.index.contains_key(key) {
            return Err(StoreError::NotFound);
        }

        let mut next = self.index.clone();
        next.remove(key);
        self.apply(Record::tombstone(key), next)
    }

    fn key_at(&self, index: usize) -> Result<String> {
        self.index
            .keys()
            .nth(index)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn sweep(&mut self) -> Result<()> {
        let dead = self.dead_size()?;
        if dead == 0 {
            debug!("sweep skipped, no dead records");
            return Ok(());
        }

        let log = Self::compacted(&self.index)?;
        self.commit(log)?;
        info!(reclaimed = dead, "store log swept");
        Ok(())
    }
}
