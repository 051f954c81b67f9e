//! Flash Module
//!
//! Raw access to a single block-erasable region.
//!
//! ## Responsibilities
//! - Abstract the medium behind `FlashDevice` (erase / program / mapped read)
//! - Enforce the begin → program* → end session discipline
//! - Finalize each session with a size word and an additive checksum
//!
//! ## Region Layout
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────────┐
//! │ Size (4)     │ Checksum (4) │ Payload (capacity bytes)     │
//! └──────────────┴──────────────┴──────────────────────────────┘
//! ```
//! Both header words use the target's native byte order. A size word of
//! `0xFFFF_FFFF` means the region is erased.

mod device;
mod ram;
mod file;
mod region;

pub use device::{Barrier, FlashDevice, ERASED_BYTE};
pub use ram::RamFlash;
pub use file::FileFlash;
pub use region::{RegionDriver, SessionState, ERASED_WORD, HEADER_SIZE};
