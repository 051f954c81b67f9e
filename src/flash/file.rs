//! File-backed flash image
//!
//! Keeps a mapped copy of the image in memory and writes every erase and
//! program through to a host file, so a region survives process restarts.
//! The file is written before the mapped view, so after an I/O fault the
//! view never shows bytes the file does not hold.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StoreError};

use super::device::{check_erase, check_program, Barrier, FlashDevice, ERASED_BYTE};
use super::ram::RamFlash;

/// Flash image persisted to a host file
pub struct FileFlash {
    path: PathBuf,
    file: File,
    /// Mapped view; also applies the NOR rules
    mem: RamFlash,
}

impl FileFlash {
    /// Open an existing image, or create an erased one of `size` bytes
    pub fn open(path: &Path, size: usize, sector_size: usize, write_size: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len() as usize;
        let mem = if len == 0 {
            debug!(path = %path.display(), size, "creating erased flash image");
            let image = vec![ERASED_BYTE; size];
            file.write_all(&image)?;
            file.sync_all()?;
            RamFlash::from_image(image, sector_size, write_size)
        } else if len == size {
            let mut image = Vec::with_capacity(size);
            file.read_to_end(&mut image)?;
            RamFlash::from_image(image, sector_size, write_size)
        } else {
            return Err(StoreError::Config(format!(
                "image {} is {} bytes, expected {}",
                path.display(),
                len,
                size
            )));
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mem,
        })
    }

    /// Path of the backing image
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(bytes)?;
        Ok(())
    }
}

impl FlashDevice for FileFlash {
    fn size(&self) -> usize {
        self.mem.size()
    }

    fn sector_size(&self) -> usize {
        self.mem.sector_size()
    }

    fn write_size(&self) -> usize {
        self.mem.write_size()
    }

    fn contents(&self) -> &[u8] {
        self.mem.contents()
    }

    fn erase_sector(&mut self, offset: usize) -> Result<()> {
        check_erase(self.mem.size(), self.mem.sector_size(), offset)?;
        let len = self.mem.sector_size().min(self.mem.size() - offset);
        self.write_at(offset, &vec![ERASED_BYTE; len])?;
        self.mem.erase_sector(offset)
    }

    fn program(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_program(self.mem.contents(), self.mem.write_size(), offset, data)?;
        self.write_at(offset, data)?;
        self.mem.program(offset, data)
    }

    fn barrier(&mut self, phase: Barrier) {
        self.mem.barrier(phase);
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
