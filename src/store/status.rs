//! Status codes
//!
//! Integer codes reported across the runtime boundary.

use crate::error::Result;

/// Storage status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    Error = -1,
    SweepRequired = -2,
    Full = -3,
    OverLength = -4,
    Fatal = -10,
}

impl Status {
    /// Status of an operation result
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        }
    }

    /// Raw integer code
    pub fn code(self) -> i32 {
        self as i32
    }
}
