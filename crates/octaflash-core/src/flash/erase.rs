//! Erase planning and erase
//!
//! A request is first widened to the smallest erase unit, then covered
//! greedily: at each position the largest erase command that fits in what
//! is left and lines up with the widened start wins. Chip erase is only
//! chosen when the widened range is the whole device.

use super::OspiFlash;
use crate::command_set::{EraseCommand, EraseSize};
use crate::error::{Error, Result};
use crate::observer::{FlashObserver, WaitKind};
use crate::spi::Transaction;
use crate::transport::Transport;
use core::ops::Range;
use log::{debug, trace};

/// One erase command of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseStep {
    /// Opcode to issue
    pub opcode: u16,
    /// Start of the erased span
    pub address: u32,
    /// Erase size as listed in the command set
    pub size: EraseSize,
    /// Bytes covered
    pub bytes: u32,
}

/// Sequence of erase commands covering a request
#[derive(Debug, Clone)]
pub struct ErasePlan {
    commands: &'static [EraseCommand],
    total_size: u32,
    start: u32,
    cursor: u32,
    end: u32,
}

impl ErasePlan {
    /// Plan an erase of `[address, address + len)` on a device of
    /// `total_size` bytes
    ///
    /// Fails with `Assertion` for an empty or out-of-range request, or when
    /// `commands` has no sized erase.
    pub fn new(
        commands: &'static [EraseCommand],
        total_size: u32,
        address: u32,
        len: u32,
    ) -> Result<Self> {
        if len == 0 || u64::from(address) + u64::from(len) > u64::from(total_size) {
            return Err(Error::Assertion);
        }
        let granule = commands
            .iter()
            .filter_map(|cmd| match cmd.size {
                EraseSize::Bytes(size) if size > 0 => Some(size),
                _ => None,
            })
            .min()
            .ok_or(Error::Assertion)?;

        let start = address - address % granule;
        let end = (u64::from(address) + u64::from(len)).div_ceil(u64::from(granule))
            * u64::from(granule);
        let end = end.min(u64::from(total_size)) as u32;

        Ok(Self {
            commands,
            total_size,
            start,
            cursor: start,
            end,
        })
    }

    /// Range actually erased, after widening to the smallest erase unit
    pub fn aligned_range(&self) -> Range<u32> {
        self.start..self.end
    }
}

impl Iterator for ErasePlan {
    type Item = EraseStep;

    fn next(&mut self) -> Option<EraseStep> {
        if self.cursor >= self.end {
            return None;
        }
        let remaining = self.end - self.cursor;
        let cursor = self.cursor;
        let offset = cursor - self.start;
        let total = self.total_size;

        // Alignment is measured from the widened start of the range
        let fits = |cmd: &&EraseCommand| {
            let span = cmd.size.span(total);
            span > 0 && span <= remaining && offset % span == 0
        };
        let cmd = self
            .commands
            .iter()
            .filter(fits)
            .max_by_key(|cmd| cmd.size.span(total))?;

        let bytes = cmd.size.span(total);
        self.cursor += bytes;
        Some(EraseStep {
            opcode: cmd.opcode,
            address: cursor,
            size: cmd.size,
            bytes,
        })
    }
}

impl<T: Transport, O: FlashObserver> OspiFlash<T, O> {
    /// Plan an erase with the bound command set without touching the device
    pub fn plan_erase(&self, address: u32, len: u32) -> Result<ErasePlan> {
        ErasePlan::new(
            self.state.command_set().erase_commands,
            self.config.geometry.total_size,
            address,
            len,
        )
    }

    /// Erase at least `[address, address + len)`
    ///
    /// The range is widened to the smallest erase unit, so bytes outside the
    /// request but inside the same sector are erased too. Fails with
    /// `Assertion` for an empty or out-of-range request and with
    /// `DeviceBusy` if a previous write or erase is still running.
    pub fn erase(&mut self, address: u32, len: u32) -> Result<()> {
        self.ensure_open()?;
        let plan = self.plan_erase(address, len)?;
        self.ensure_idle()?;

        let set = self.state.command_set();
        let range = plan.aligned_range();
        debug!(
            "Erasing 0x{:08X}..0x{:08X} for request 0x{:08X}+0x{:X}",
            range.start, range.end, address, len
        );

        for step in plan {
            trace!(
                "Erase op=0x{:04X} at 0x{:08X} ({} bytes)",
                step.opcode,
                step.address,
                step.bytes
            );
            self.write_enable_confirmed()?;

            let mut txn = Transaction::command(step.opcode, set.opcode_width);
            let budget = match step.size {
                EraseSize::Chip => self.config.timeouts.chip_erase_us,
                EraseSize::Bytes(_) => {
                    txn = txn.with_address(step.address, set.address_width);
                    self.config.timeouts.erase_us
                }
            };
            self.execute(&mut txn)?;
            self.wait_write_complete(WaitKind::Erase, budget)?;
            self.observer.erase_span(step.address, step.size, step.bytes);
        }

        if self.config.prefetch {
            self.transport.invalidate_prefetch(self.config.channel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_set::{MX25UM_BLOCK_SIZE, MX25UM_SECTOR_SIZE};
    use crate::spi::opcodes;

    const TOTAL: u32 = 32 * 1024 * 1024;

    static COMMANDS: [EraseCommand; 3] = [
        EraseCommand::sized(opcodes::SE4B, MX25UM_SECTOR_SIZE),
        EraseCommand::sized(opcodes::BE4B, MX25UM_BLOCK_SIZE),
        EraseCommand::chip(opcodes::CE),
    ];

    static SECTORS_ONLY: [EraseCommand; 1] = [EraseCommand::sized(opcodes::SE4B, 4096)];

    fn steps(address: u32, len: u32) -> ([Option<(u16, u32, u32)>; 4], usize) {
        let mut out = [None; 4];
        let mut count = 0;
        for step in ErasePlan::new(&COMMANDS, TOTAL, address, len).unwrap() {
            if count < out.len() {
                out[count] = Some((step.opcode, step.address, step.bytes));
            }
            count += 1;
        }
        (out, count)
    }

    #[test]
    fn test_widens_to_sector() {
        let plan = ErasePlan::new(&COMMANDS, TOTAL, 0x1800, 70 * 1024).unwrap();
        assert_eq!(plan.aligned_range(), 0x1000..0x13000);
    }

    #[test]
    fn test_block_then_sectors() {
        let (out, count) = steps(0x1800, 70 * 1024);
        assert_eq!(count, 3);
        assert_eq!(out[0], Some((opcodes::BE4B, 0x1000, 0x10000)));
        assert_eq!(out[1], Some((opcodes::SE4B, 0x11000, 4096)));
        assert_eq!(out[2], Some((opcodes::SE4B, 0x12000, 4096)));
    }

    #[test]
    fn test_mixed_sizes() {
        let plan = ErasePlan::new(&COMMANDS, TOTAL, 0x1800, 130 * 1024).unwrap();
        assert_eq!(plan.aligned_range(), 0x1000..0x22000);

        let mut blocks = plan
            .clone()
            .filter(|s| s.opcode == opcodes::BE4B)
            .map(|s| s.address);
        assert_eq!(blocks.next(), Some(0x1000));
        assert_eq!(blocks.next(), Some(0x11000));
        assert_eq!(blocks.next(), None);
        assert_eq!(plan.clone().count(), 2 + 1);
        let covered: u32 = plan.map(|s| s.bytes).sum();
        assert_eq!(covered, 0x21000);
    }

    #[test]
    fn test_short_range_uses_sectors() {
        let (out, count) = steps(0x1800, 0x3000);
        assert_eq!(count, 4);
        assert_eq!(out[0], Some((opcodes::SE4B, 0x1000, 4096)));
        assert_eq!(out[3], Some((opcodes::SE4B, 0x4000, 4096)));
    }

    #[test]
    fn test_block_aligned_request_uses_blocks() {
        let (out, count) = steps(0x10000, 0x20000);
        assert_eq!(count, 2);
        assert_eq!(out[0], Some((opcodes::BE4B, 0x10000, 0x10000)));
        assert_eq!(out[1], Some((opcodes::BE4B, 0x20000, 0x10000)));
    }

    #[test]
    fn test_whole_device_uses_chip_erase() {
        let (out, count) = steps(0, TOTAL);
        assert_eq!(count, 1);
        assert_eq!(out[0], Some((opcodes::CE, 0, TOTAL)));

        // One byte short still widens to the whole device
        let (out, count) = steps(1, TOTAL - 1);
        assert_eq!(count, 1);
        assert_eq!(out[0], Some((opcodes::CE, 0, TOTAL)));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let a = ErasePlan::new(&COMMANDS, TOTAL, 0x3456, 0x23456).unwrap();
        let b = a.clone();
        assert!(a.eq(b));
    }

    #[test]
    fn test_steps_are_aligned_and_contiguous() {
        let plan = ErasePlan::new(&COMMANDS, TOTAL, 0xF00, 0x31234).unwrap();
        let range = plan.aligned_range();
        let mut expected = range.start;
        for step in plan {
            assert_eq!(step.address, expected);
            assert_eq!((step.address - range.start) % step.bytes, 0);
            expected += step.bytes;
        }
        assert_eq!(expected, range.end);
    }

    #[test]
    fn test_rejects_bad_requests() {
        assert!(matches!(
            ErasePlan::new(&COMMANDS, TOTAL, 0, 0),
            Err(Error::Assertion)
        ));
        assert!(matches!(
            ErasePlan::new(&COMMANDS, TOTAL, TOTAL - 4096, 4097),
            Err(Error::Assertion)
        ));
        static CHIP_ONLY: [EraseCommand; 1] = [EraseCommand::chip(opcodes::CE)];
        assert!(matches!(
            ErasePlan::new(&CHIP_ONLY, TOTAL, 0, 4096),
            Err(Error::Assertion)
        ));
    }

    #[test]
    fn test_sector_only_set() {
        let plan = ErasePlan::new(&SECTORS_ONLY, 0x10000, 0, 0x10000).unwrap();
        assert_eq!(plan.count(), 16);
    }
}
