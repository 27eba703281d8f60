//! `embedded-storage` NOR flash traits for [`OspiFlash`]
//!
//! Lets file systems and key-value stores written against
//! `embedded_storage::nor_flash` sit directly on top of the engine. Reads go
//! through the bulk read path, writes through [`OspiFlash::program`] and
//! erases through [`OspiFlash::erase`], which are already exact on
//! sector-aligned ranges.

use crate::command_set::MX25UM_SECTOR_SIZE;
use crate::error::Error;
use crate::flash::OspiFlash;
use crate::observer::FlashObserver;
use crate::transport::Transport;
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, MultiwriteNorFlash, NorFlash,
    NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

/// Error reported through the storage traits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Offset or length not aligned to the operation's unit
    NotAligned,
    /// Range outside the device
    OutOfBounds,
    /// The engine failed
    Flash(Error),
}

impl From<NorFlashErrorKind> for StorageError {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => Self::NotAligned,
            NorFlashErrorKind::OutOfBounds => Self::OutOfBounds,
            _ => Self::Flash(Error::Assertion),
        }
    }
}

impl From<Error> for StorageError {
    fn from(e: Error) -> Self {
        Self::Flash(e)
    }
}

impl NorFlashError for StorageError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Self::NotAligned => NorFlashErrorKind::NotAligned,
            Self::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Self::Flash(_) => NorFlashErrorKind::Other,
        }
    }
}

impl<T: Transport, O: FlashObserver> ErrorType for OspiFlash<T, O> {
    type Error = StorageError;
}

impl<T: Transport, O: FlashObserver> ReadNorFlash for OspiFlash<T, O> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        Ok(OspiFlash::read(self, offset, bytes)?)
    }

    fn capacity(&self) -> usize {
        self.config().geometry.total_size as usize
    }
}

impl<T: Transport, O: FlashObserver> NorFlash for OspiFlash<T, O> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = MX25UM_SECTOR_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        if from == to {
            return Ok(());
        }
        Ok(OspiFlash::erase(self, from, to - from)?)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        Ok(OspiFlash::program(self, offset, bytes)?)
    }
}

// Program pads partial blocks with 0xFF, so rewriting only clears more bits
impl<T: Transport, O: FlashObserver> MultiwriteNorFlash for OspiFlash<T, O> {}
