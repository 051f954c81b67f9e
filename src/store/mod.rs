//! Store Module
//!
//! Key-value contract used by the runtime, plus its flash-backed
//! implementation.
//!
//! ## Responsibilities
//! - Uniform get/set/remove/enumerate API across backends
//! - Per-item length limits
//! - Log-structured persistence with explicit compaction (sweep)
//!
//! ## Log Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (2) │ CRC (4) │ Body (bincode)  │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```

mod record;
mod status;
mod flash_store;

pub use record::{Record, RECORD_HEADER_SIZE};
pub use status::Status;
pub use flash_store::FlashStore;

use crate::error::Result;

/// Key-value storage contract
///
/// Entries enumerate in key order; `key_at(i)` stays stable until the next
/// mutation.
pub trait KvStore {
    /// Remove every entry
    fn clear(&mut self) -> Result<()>;

    /// Number of stored entries
    fn length(&self) -> Result<usize>;

    /// Value stored under `key`, or `NotFound`
    fn get_item(&self, key: &str) -> Result<Vec<u8>>;

    /// Insert or overwrite `key`
    fn set_item(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete `key`, or `NotFound` if absent
    fn remove_item(&mut self, key: &str) -> Result<()>;

    /// Key at position `index`, or `NotFound` when out of range
    fn key_at(&self, index: usize) -> Result<String>;

    /// Reclaim space held by overwritten and removed entries
    fn sweep(&mut self) -> Result<()>;
}
