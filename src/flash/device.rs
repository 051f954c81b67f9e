//! Flash device abstraction
//!
//! The seam between the region driver and a concrete medium.

use crate::error::{Result, StoreError};

/// Value of every byte after an erase
pub const ERASED_BYTE: u8 = 0xFF;

/// Cache maintenance points around an erase or program sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    /// Disable and flush any cache aliasing the region
    Invalidate,

    /// Re-enable caches once the medium is stable again
    Restore,
}

/// A memory-mapped, block-erasable storage medium
///
/// Offsets are relative to the start of the device. `program` may only
/// target erased bytes, and both its offset and length must be multiples of
/// `write_size()`.
pub trait FlashDevice {
    /// Total size in bytes
    fn size(&self) -> usize;

    /// Erase unit in bytes
    fn sector_size(&self) -> usize;

    /// Program unit in bytes
    fn write_size(&self) -> usize;

    /// Mapped, read-only view of the whole device
    fn contents(&self) -> &[u8];

    /// Erase the sector starting at `offset` back to `ERASED_BYTE`
    fn erase_sector(&mut self, offset: usize) -> Result<()>;

    /// Program `data` at `offset`
    fn program(&mut self, offset: usize, data: &[u8]) -> Result<()>;

    /// Cache maintenance hook; media without caches ignore it
    fn barrier(&mut self, _phase: Barrier) {}

    /// Make completed operations durable
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: FlashDevice + ?Sized> FlashDevice for Box<T> {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn sector_size(&self) -> usize {
        (**self).sector_size()
    }

    fn write_size(&self) -> usize {
        (**self).write_size()
    }

    fn contents(&self) -> &[u8] {
        (**self).contents()
    }

    fn erase_sector(&mut self, offset: usize) -> Result<()> {
        (**self).erase_sector(offset)
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        (**self).program(offset, data)
    }

    fn barrier(&mut self, phase: Barrier) {
        (**self).barrier(phase)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Controller-side validation of a program request, shared by the devices
pub(crate) fn check_program(
    contents: &[u8],
    write_size: usize,
    offset: usize,
    data: &[u8],
) -> Result<()> {
    if offset % write_size != 0 || data.len() % write_size != 0 {
        return Err(StoreError::HardwareFatal(format!(
            "unaligned program at {:#x} (+{}), write size {}",
            offset,
            data.len(),
            write_size
        )));
    }
    let end = offset
        .checked_add(data.len())
        .filter(|&end| end <= contents.len())
        .ok_or_else(|| {
            StoreError::HardwareFatal(format!(
                "program at {:#x} (+{}) outside device",
                offset,
                data.len()
            ))
        })?;
    if let Some(pos) = contents[offset..end].iter().position(|&b| b != ERASED_BYTE) {
        return Err(StoreError::HardwareFatal(format!(
            "program over non-erased byte at {:#x}",
            offset + pos
        )));
    }
    Ok(())
}

/// Controller-side validation of a sector erase request
pub(crate) fn check_erase(size: usize, sector_size: usize, offset: usize) -> Result<()> {
    if offset % sector_size != 0 || offset >= size {
        return Err(StoreError::HardwareFatal(format!(
            "invalid sector offset {:#x}",
            offset
        )));
    }
    Ok(())
}
