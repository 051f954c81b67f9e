//! RAM-backed flash simulation
//!
//! Behaves like NOR flash: erase sets whole sectors to 0xFF, and program
//! rejects any byte that is not erased. Faults can be injected to exercise
//! the abandoned-session paths.

use crate::error::{Result, StoreError};

use super::device::{check_erase, check_program, Barrier, FlashDevice, ERASED_BYTE};

/// Simulated flash held in memory
#[derive(Debug, Clone)]
pub struct RamFlash {
    /// Device contents
    data: Vec<u8>,
    sector_size: usize,
    write_size: usize,

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------
    /// Program calls still allowed before the controller rejects one
    program_budget: Option<usize>,
    fail_erase: bool,

    // -------------------------------------------------------------------------
    // Counters
    // -------------------------------------------------------------------------
    erase_count: usize,
    program_count: usize,
    barriers: Vec<Barrier>,
}

impl RamFlash {
    /// Create an erased device
    pub fn new(size: usize, sector_size: usize, write_size: usize) -> Self {
        Self {
            data: vec![ERASED_BYTE; size],
            sector_size,
            write_size,
            program_budget: None,
            fail_erase: false,
            erase_count: 0,
            program_count: 0,
            barriers: Vec::new(),
        }
    }

    /// Wrap an existing image (e.g. loaded from disk)
    pub fn from_image(data: Vec<u8>, sector_size: usize, write_size: usize) -> Self {
        let mut flash = Self::new(0, sector_size, write_size);
        flash.data = data;
        flash
    }

    /// Reject every program call after the next `count` succeed
    pub fn fail_after_programs(&mut self, count: usize) {
        self.program_budget = Some(count);
    }

    /// Reject every sector erase while set
    pub fn set_fail_erase(&mut self, fail: bool) {
        self.fail_erase = fail;
    }

    /// Clear all injected faults
    pub fn heal(&mut self) {
        self.program_budget = None;
        self.fail_erase = false;
    }

    /// Overwrite a byte directly, bypassing NOR rules (bit-rot simulation)
    pub fn poke(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Sector erases performed so far
    pub fn erase_count(&self) -> usize {
        self.erase_count
    }

    /// Successful program calls so far
    pub fn program_count(&self) -> usize {
        self.program_count
    }

    /// Every barrier issued, in order
    pub fn barriers(&self) -> &[Barrier] {
        &self.barriers
    }

    /// Consume the device, returning its raw image
    pub fn into_image(self) -> Vec<u8> {
        self.data
    }
}

impl FlashDevice for RamFlash {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn write_size(&self) -> usize {
        self.write_size
    }

    fn contents(&self) -> &[u8] {
        &self.data
    }

    fn erase_sector(&mut self, offset: usize) -> Result<()> {
        check_erase(self.data.len(), self.sector_size, offset)?;
        if self.fail_erase {
            return Err(StoreError::HardwareFatal(format!(
                "erase rejected at {:#x}",
                offset
            )));
        }
        let end = (offset + self.sector_size).min(self.data.len());
        self.data[offset..end].fill(ERASED_BYTE);
        self.erase_count += 1;
        Ok(())
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        match self.program_budget {
            Some(0) => {
                return Err(StoreError::HardwareFatal(format!(
                    "program rejected at {:#x}",
                    offset
                )))
            }
            Some(n) => self.program_budget = Some(n - 1),
            None => {}
        }
        check_program(&self.data, self.write_size, offset, data)?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        self.program_count += 1;
        Ok(())
    }

    fn barrier(&mut self, phase: Barrier) {
        self.barriers.push(phase);
    }
}
