//! Engine instrumentation
//!
//! An [`OspiFlash`](crate::OspiFlash) reports what it does to a
//! [`FlashObserver`]. The default [`NoopObserver`] compiles away;
//! [`FlashStats`] collects counters for diagnostics.

use crate::command_set::EraseSize;
use crate::spi::{Protocol, Transaction};

/// What a blocking wait was waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitKind {
    /// Write enable latch
    WriteEnable,
    /// Program block completion
    Program,
    /// Erase completion
    Erase,
    /// Bulk DMA transfer
    Transfer,
}

/// Callbacks invoked by the engine; every method defaults to doing nothing
pub trait FlashObserver {
    /// A direct transaction was executed
    fn transaction(&mut self, _txn: &Transaction) {}

    /// A program block finished
    fn program_block(&mut self, _address: u32, _len: u32) {}

    /// An erase span finished
    fn erase_span(&mut self, _address: u32, _size: EraseSize, _bytes: u32) {}

    /// A wait finished, successfully or not
    fn waited(&mut self, _kind: WaitKind, _elapsed_us: u64, _ok: bool) {}

    /// A protocol was bound
    fn protocol_bound(&mut self, _protocol: Protocol) {}
}

/// No-op observer
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FlashObserver for NoopObserver {}

impl<O: FlashObserver + ?Sized> FlashObserver for &mut O {
    fn transaction(&mut self, txn: &Transaction) {
        (**self).transaction(txn)
    }

    fn program_block(&mut self, address: u32, len: u32) {
        (**self).program_block(address, len)
    }

    fn erase_span(&mut self, address: u32, size: EraseSize, bytes: u32) {
        (**self).erase_span(address, size, bytes)
    }

    fn waited(&mut self, kind: WaitKind, elapsed_us: u64, ok: bool) {
        (**self).waited(kind, elapsed_us, ok)
    }

    fn protocol_bound(&mut self, protocol: Protocol) {
        (**self).protocol_bound(protocol)
    }
}

/// Counters collected from engine callbacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashStats {
    /// Direct transactions executed
    pub transactions: u32,
    /// Program blocks written
    pub program_blocks: u32,
    /// Bytes covered by program blocks
    pub bytes_programmed: u64,
    /// Sector and block erases issued
    pub span_erases: u32,
    /// Chip erases issued
    pub chip_erases: u32,
    /// Bytes erased
    pub bytes_erased: u64,
    /// Waits that ran out of budget
    pub timeouts: u32,
    /// Total time spent waiting
    pub wait_us_total: u64,
    /// Longest single wait
    pub wait_us_max: u64,
    /// Protocol binds
    pub protocol_binds: u32,
}

impl FlashObserver for FlashStats {
    fn transaction(&mut self, _txn: &Transaction) {
        self.transactions += 1;
    }

    fn program_block(&mut self, _address: u32, len: u32) {
        self.program_blocks += 1;
        self.bytes_programmed += u64::from(len);
    }

    fn erase_span(&mut self, _address: u32, size: EraseSize, bytes: u32) {
        match size {
            EraseSize::Chip => self.chip_erases += 1,
            EraseSize::Bytes(_) => self.span_erases += 1,
        }
        self.bytes_erased += u64::from(bytes);
    }

    fn waited(&mut self, _kind: WaitKind, elapsed_us: u64, ok: bool) {
        if !ok {
            self.timeouts += 1;
        }
        self.wait_us_total += elapsed_us;
        self.wait_us_max = self.wait_us_max.max(elapsed_us);
    }

    fn protocol_bound(&mut self, _protocol: Protocol) {
        self.protocol_binds += 1;
    }
}
