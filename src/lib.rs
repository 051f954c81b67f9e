//! # flashstore
//!
//! Persistent storage for a resource-constrained runtime:
//! - A checksummed flash region driver with strict erase/program sessions
//! - A log-structured key-value store layered on top of the region
//! - An "unsupported" backend for targets without persistent storage
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Runtime / CLI                            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  KvStore
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Backend                                 │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │   FlashStore    │                │    NullStore    │
//!   │ (record log)    │                │    (no-op)      │
//!   └────────┬────────┘                └─────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐     ┌─────────────────┐
//!   │  RegionDriver   │────▶│    Checksum     │
//!   │ (session state) │     │   (additive)    │
//!   └────────┬────────┘     └─────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │   FlashDevice   │
//!   │ (RAM / file)    │
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod checksum;
pub mod flash;
pub mod store;
pub mod backend;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::Config;
pub use backend::Backend;
pub use store::{KvStore, Status};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of flashstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
