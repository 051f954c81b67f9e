//! Region Driver
//!
//! Owns one flash region and its write session.
//!
//! ## Session State Machine
//! ```text
//!   Idle ──begin_program──▶ Erasing ──▶ Programming(cursor) ──end_program──▶ Finalizing ──▶ Idle
//!                                            │
//!                                            └── hardware fault ──▶ Idle (session abandoned)
//! ```
//!
//! ## Power Loss
//! - Between erase and `end_program` the size word still reads erased, so an
//!   interrupted session looks like an empty region.
//! - The size word is written before the checksum word. A crash between the
//!   two leaves a header whose checksum reads erased; `verify()` reports it
//!   as an integrity failure rather than hiding it.

use tracing::{debug, info, warn};

use crate::checksum::{self, Checksum};
use crate::error::{Result, StoreError};

use super::device::{Barrier, FlashDevice, ERASED_BYTE};

/// Header size: Size (4) + Checksum (4) = 8 bytes
pub const HEADER_SIZE: usize = 8;

/// Header word value of an erased region
pub const ERASED_WORD: u32 = u32::MAX;

const SIZE_OFFSET: usize = 0;
const CHECKSUM_OFFSET: usize = 4;

/// Where the driver is in its write session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Erasing,
    Programming { cursor: usize },
    Finalizing,
}

/// Driver for a single checksummed flash region
///
/// The region spans the whole device. Exactly one session can be open at a
/// time; payload views borrow the driver, so they cannot outlive the next
/// `clear` or `begin_program`.
pub struct RegionDriver<D: FlashDevice> {
    device: D,
    state: SessionState,
    /// Bytes waiting for a full program word
    pending: Vec<u8>,
    /// Running checksum of the bytes handed to `program`
    running: Checksum,
}

impl<D: FlashDevice> RegionDriver<D> {
    /// Take ownership of a device and validate its geometry
    pub fn new(device: D) -> Result<Self> {
        let size = device.size();
        let sector = device.sector_size();
        let word = device.write_size();

        if size <= HEADER_SIZE {
            return Err(StoreError::Config(format!(
                "device of {} bytes cannot hold the region header",
                size
            )));
        }
        if size - HEADER_SIZE >= ERASED_WORD as usize {
            return Err(StoreError::Config(format!(
                "device of {} bytes overflows the 32-bit size word",
                size
            )));
        }
        if sector == 0 || size % sector != 0 {
            return Err(StoreError::Config(format!(
                "device size {} is not a multiple of sector size {}",
                size, sector
            )));
        }
        if !matches!(word, 1 | 2 | 4) {
            return Err(StoreError::Config(format!(
                "write size {} unsupported (expected 1, 2 or 4)",
                word
            )));
        }
        // A padded tail word must still land inside the device
        if size % word != 0 {
            return Err(StoreError::Config(format!(
                "device size {} is not a multiple of write size {}",
                size, word
            )));
        }

        Ok(Self {
            device,
            state: SessionState::Idle,
            pending: Vec::with_capacity(word),
            running: Checksum::new(),
        })
    }

    // =========================================================================
    // Erase
    // =========================================================================

    /// Erase the whole region
    ///
    /// Rejected while a session is open; use `begin_program` to restart one.
    pub fn clear(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(StoreError::Session(format!(
                "clear during active session ({:?})",
                self.state
            )));
        }
        self.erase_region()
    }

    fn erase_region(&mut self) -> Result<()> {
        let sector = self.device.sector_size();
        let sectors = self.device.size() / sector;

        self.device.barrier(Barrier::Invalidate);
        let mut result = Ok(());
        for i in 0..sectors {
            if let Err(e) = self.device.erase_sector(i * sector) {
                result = Err(fatal(e));
                break;
            }
        }
        self.device.barrier(Barrier::Restore);
        result?;

        self.device.flush().map_err(fatal)?;
        info!(sectors, "flash region erased");
        Ok(())
    }

    // =========================================================================
    // Program Session
    // =========================================================================

    /// Open a session: erase the region and reset the cursor to 0
    pub fn begin_program(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(StoreError::Session(format!(
                "begin_program during active session ({:?})",
                self.state
            )));
        }

        self.state = SessionState::Erasing;
        if let Err(e) = self.erase_region() {
            self.abandon("erase failed");
            return Err(e);
        }

        self.pending.clear();
        self.running = Checksum::new();
        self.state = SessionState::Programming { cursor: 0 };
        debug!("program session started");
        Ok(())
    }

    /// Append `buf` at the cursor
    ///
    /// Fails with `Full` (session left open, nothing written) when the
    /// payload would exceed capacity. A rejected hardware write abandons the
    /// session; bytes already programmed stay on the medium.
    pub fn program(&mut self, buf: &[u8]) -> Result<()> {
        let cursor = match self.state {
            SessionState::Programming { cursor } => cursor,
            other => {
                return Err(StoreError::Session(format!(
                    "program outside a session ({:?})",
                    other
                )))
            }
        };

        let capacity = self.capacity();
        if cursor + buf.len() > capacity {
            return Err(StoreError::Full {
                needed: cursor + buf.len(),
                available: capacity,
            });
        }

        self.device.barrier(Barrier::Invalidate);
        let result = self.write_words(cursor, buf);
        self.device.barrier(Barrier::Restore);

        if let Err(e) = result {
            self.abandon("program rejected");
            return Err(fatal(e));
        }

        self.running.update(buf);
        self.state = SessionState::Programming {
            cursor: cursor + buf.len(),
        };
        Ok(())
    }

    /// Program `buf` in whole device words, carrying any tail in `pending`
    fn write_words(&mut self, cursor: usize, buf: &[u8]) -> Result<()> {
        let word = self.device.write_size();
        // Payload offset of the first pending byte, always word aligned
        let mut offset = HEADER_SIZE + cursor - self.pending.len();
        let mut rest = buf;

        if !self.pending.is_empty() {
            let take = (word - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() < word {
                return Ok(());
            }
            self.device.program(offset, &self.pending)?;
            self.pending.clear();
            offset += word;
        }

        let aligned = rest.len() - rest.len() % word;
        if aligned > 0 {
            self.device.program(offset, &rest[..aligned])?;
        }
        self.pending.extend_from_slice(&rest[aligned..]);
        Ok(())
    }

    /// Close the session: write the size word, then the checksum word
    pub fn end_program(&mut self) -> Result<()> {
        let cursor = match self.state {
            SessionState::Programming { cursor } => cursor,
            other => {
                return Err(StoreError::Session(format!(
                    "end_program outside a session ({:?})",
                    other
                )))
            }
        };
        self.state = SessionState::Finalizing;

        self.device.barrier(Barrier::Invalidate);
        let result = self.finalize(cursor);
        self.device.barrier(Barrier::Restore);

        match result.and_then(|sum| self.device.flush().map(|_| sum)) {
            Ok(sum) => {
                self.state = SessionState::Idle;
                debug!(size = cursor, checksum = sum, "program session finalized");
                Ok(())
            }
            Err(e) => {
                self.abandon("finalize failed");
                Err(fatal(e))
            }
        }
    }

    fn finalize(&mut self, cursor: usize) -> Result<u32> {
        let word = self.device.write_size();

        if !self.pending.is_empty() {
            let offset = HEADER_SIZE + cursor - self.pending.len();
            self.pending.resize(word, ERASED_BYTE);
            self.device.program(offset, &self.pending)?;
            self.pending.clear();
        }

        // Read back what actually landed before committing the header
        let sum = self.running.finalize();
        let written = &self.device.contents()[HEADER_SIZE..HEADER_SIZE + cursor];
        if checksum::compute(written) != sum {
            return Err(StoreError::HardwareFatal(
                "payload read-back does not match programmed data".to_string(),
            ));
        }

        self.device
            .program(SIZE_OFFSET, &(cursor as u32).to_ne_bytes())?;
        self.device
            .program(CHECKSUM_OFFSET, &sum.to_ne_bytes())?;
        Ok(sum)
    }

    fn abandon(&mut self, reason: &str) {
        warn!(state = ?self.state, reason, "program session abandoned");
        self.state = SessionState::Idle;
        self.pending.clear();
    }

    // =========================================================================
    // Read Accessors
    // =========================================================================

    /// Usable payload bytes
    pub fn capacity(&self) -> usize {
        self.device.size() - HEADER_SIZE
    }

    /// Finalized payload size; 0 when erased or out of range
    pub fn data_size(&self) -> usize {
        let size = self.read_word(SIZE_OFFSET);
        if size == ERASED_WORD || size as usize > self.capacity() {
            0
        } else {
            size as usize
        }
    }

    /// Read-only view of the finalized payload
    pub fn data(&self) -> &[u8] {
        let size = self.data_size();
        &self.device.contents()[HEADER_SIZE..HEADER_SIZE + size]
    }

    /// Stored checksum word, verbatim
    pub fn checksum(&self) -> u32 {
        self.read_word(CHECKSUM_OFFSET)
    }

    /// Whether the size word still reads as erased
    pub fn is_erased(&self) -> bool {
        self.read_word(SIZE_OFFSET) == ERASED_WORD
    }

    /// Check the stored payload against the stored checksum
    pub fn verify(&self) -> Result<()> {
        let size = self.read_word(SIZE_OFFSET);
        if size == ERASED_WORD {
            return Err(StoreError::Integrity("region is erased".to_string()));
        }
        if size as usize > self.capacity() {
            warn!(size, capacity = self.capacity(), "size word out of range");
            return Err(StoreError::Integrity(format!(
                "size word {} exceeds capacity {}",
                size,
                self.capacity()
            )));
        }
        let stored = self.checksum();
        if !checksum::verify(self.data(), stored) {
            warn!(size, stored, "payload checksum mismatch");
            return Err(StoreError::Integrity(format!(
                "checksum mismatch over {} bytes",
                size
            )));
        }
        Ok(())
    }

    /// Startup loader: `None` when erased, the verified payload otherwise
    pub fn image(&self) -> Result<Option<&[u8]>> {
        if self.is_erased() {
            return Ok(None);
        }
        self.verify()?;
        Ok(Some(self.data()))
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Cursor of the open session, if any
    pub fn cursor(&self) -> Option<usize> {
        match self.state {
            SessionState::Programming { cursor } => Some(cursor),
            _ => None,
        }
    }

    /// Borrow the underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Release the device (the region keeps whatever was last written)
    pub fn into_device(self) -> D {
        self.device
    }

    fn read_word(&self, offset: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.device.contents()[offset..offset + 4]);
        u32::from_ne_bytes(word)
    }
}

/// Every device failure inside a session is treated as a hardware fault
fn fatal(e: StoreError) -> StoreError {
    match e {
        StoreError::HardwareFatal(_) => e,
        other => StoreError::HardwareFatal(other.to_string()),
    }
}
