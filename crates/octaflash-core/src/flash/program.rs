//! Block program
//!
//! Data is written in program blocks aligned to the geometry's
//! `program_block_size`. Partial blocks at either end are padded with the
//! erased value so the surrounding bytes are left untouched.

use super::{OspiFlash, ERASED_VALUE};
use crate::config::MAX_PROGRAM_BLOCK;
use crate::error::Result;
use crate::observer::{FlashObserver, WaitKind};
use crate::transport::{TransferBuffer, Transport};
use log::debug;

impl<T: Transport, O: FlashObserver> OspiFlash<T, O> {
    /// Program `data` at `address`
    ///
    /// Fails with `Assertion` for an empty or out-of-range request and with
    /// `DeviceBusy` if a previous write or erase is still running. Every
    /// block is preceded by a confirmed write enable and followed by a
    /// completion wait; the first failure aborts the rest.
    pub fn program(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.ensure_range(address, data.len())?;
        self.ensure_idle()?;

        let block = self.config.geometry.program_block_size;
        let end = address + data.len() as u32;
        let mut cursor = address - address % block;
        debug!(
            "Programming {} bytes at 0x{:08X} in {}-byte blocks",
            data.len(),
            address,
            block
        );

        let mut scratch = [ERASED_VALUE; MAX_PROGRAM_BLOCK];
        while cursor < end {
            let lo = cursor.max(address);
            let hi = (cursor + block).min(end);
            let buf = &mut scratch[..block as usize];
            buf.fill(ERASED_VALUE);
            buf[(lo - cursor) as usize..(hi - cursor) as usize]
                .copy_from_slice(&data[(lo - address) as usize..(hi - address) as usize]);

            self.write_enable_confirmed()?;
            self.bulk_transfer(cursor, TransferBuffer::Source(buf))?;
            self.wait_write_complete(WaitKind::Program, self.config.timeouts.program_us)?;
            self.observer.program_block(cursor, block);
            cursor += block;
        }
        Ok(())
    }
}
