//! Status reads and blocking waits
//!
//! Write enable is always confirmed with a handful of direct status reads.
//! Program and erase completion is awaited with the configured
//! [`WaitStrategy`]: either the controller's periodic status poll, which
//! raises the poll signal on a match, or plain software polling. The
//! wall-clock budget is authoritative in both cases; when the hardware poll
//! gives up early the wait continues with software polling until the budget
//! is spent.

use super::OspiFlash;
use crate::completion::{Completion, CompletionSignal};
use crate::config::WaitStrategy;
use crate::error::{Error, Result};
use crate::observer::{FlashObserver, WaitKind};
use crate::spi::{StatusFlags, Transaction};
use crate::transport::{PeriodicPollRequest, Transport};
use log::{debug, warn};

/// Status reads spent confirming the write enable latch
pub const MAX_WRITE_ENABLE_POLLS: u32 = 5;

/// Which completion signal to wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalKind {
    Dma,
    Poll,
}

impl<T: Transport, O: FlashObserver> OspiFlash<T, O> {
    /// Status register read in the bound protocol
    fn status_transaction(&self) -> Result<Transaction> {
        let set = self.state.command_set();
        Ok(Transaction::read(set.status_opcode, set.opcode_width, 1)?
            .with_address(set.status_address, set.status_address_width())
            .with_dummy_cycles(set.status_dummy_cycles))
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<StatusFlags> {
        let mut txn = self.status_transaction()?;
        self.execute(&mut txn)?;
        Ok(StatusFlags::from_bits_retain(txn.data[0]))
    }

    /// Fail with `DeviceBusy` if a write or erase is still running
    pub(crate) fn ensure_idle(&mut self) -> Result<()> {
        if self.read_status()?.contains(StatusFlags::WIP) {
            warn!("Device busy on {:?}", self.config.channel);
            return Err(Error::DeviceBusy);
        }
        Ok(())
    }

    fn signal(&self, kind: SignalKind) -> &CompletionSignal {
        match kind {
            SignalKind::Dma => self.transport.dma_signal(),
            SignalKind::Poll => self.transport.poll_signal(),
        }
    }

    /// Clear a signal before starting the operation it reports on
    pub(crate) fn arm(&self, kind: SignalKind) {
        if let Some(stale) = self.signal(kind).clear() {
            warn!("Discarded stale {:?} completion ({:?})", kind, stale);
        }
    }

    /// Wait for a signal until `budget_us` has passed since `start`
    pub(crate) fn wait_signal(
        &mut self,
        kind: SignalKind,
        start: u64,
        budget_us: u32,
    ) -> Result<Completion> {
        let step = self.config.timeouts.poll_step_us;
        loop {
            if let Some(completion) = self.signal(kind).take() {
                return Ok(completion);
            }
            if self.transport.now_us() - start >= u64::from(budget_us) {
                return Err(Error::Timeout);
            }
            self.transport.delay_us(step);
        }
    }

    /// Poll status in software until `(status & mask) == want`
    ///
    /// Gives up after `max_polls` reads or once `budget_us` has passed since
    /// `start`, whichever comes first.
    fn wait_direct(
        &mut self,
        want: StatusFlags,
        mask: StatusFlags,
        start: u64,
        budget_us: u32,
        max_polls: u32,
    ) -> Result<()> {
        let step = self.config.timeouts.poll_step_us;
        let mut polls = 0;
        loop {
            let status = self.read_status()?;
            polls += 1;
            if status & mask == want {
                return Ok(());
            }
            if polls >= max_polls || self.transport.now_us() - start >= u64::from(budget_us) {
                return Err(Error::Timeout);
            }
            self.transport.delay_us(step);
        }
    }

    /// Let the controller poll status, falling back to software polling
    fn wait_periodic(
        &mut self,
        want: StatusFlags,
        mask: StatusFlags,
        start: u64,
        budget_us: u32,
    ) -> Result<()> {
        let txn = self.status_transaction()?;
        let request = PeriodicPollRequest {
            descriptor: txn.descriptor()?,
            address: txn.address,
            expected: want.bits(),
            ignore_mask: !mask.bits(),
            interval_us: self.config.periodic_poll.interval_us,
            max_count: self.config.periodic_poll.max_count,
        };

        self.arm(SignalKind::Poll);
        self.transport
            .start_periodic_poll(self.config.channel, &request)?;

        match self.wait_signal(SignalKind::Poll, start, budget_us) {
            Ok(Completion::Complete) => Ok(()),
            Ok(Completion::Failed) => {
                debug!("Periodic poll gave up, continuing with status reads");
                self.wait_direct(want, mask, start, budget_us, u32::MAX)
            }
            Err(e) => {
                self.transport.stop_periodic_poll();
                Err(e)
            }
        }
    }

    /// Issue write enable and wait for the latch to be set
    ///
    /// Returns `WriteFailed` if the latch is still clear after
    /// [`MAX_WRITE_ENABLE_POLLS`] reads or once the write-enable budget runs
    /// out.
    pub fn write_enable_confirmed(&mut self) -> Result<()> {
        let set = self.state.command_set();
        let mut txn = Transaction::command(set.write_enable_opcode, set.opcode_width);
        self.execute(&mut txn)?;

        let start = self.transport.now_us();
        let result = self.wait_direct(
            StatusFlags::WEL,
            StatusFlags::WEL,
            start,
            self.config.timeouts.write_enable_us,
            MAX_WRITE_ENABLE_POLLS,
        )
        .map_err(|e| match e {
            Error::Timeout => Error::WriteFailed,
            e => e,
        });
        self.finish_wait(WaitKind::WriteEnable, start, result)
    }

    /// Wait for the write-in-progress bit to clear
    pub fn wait_write_complete(&mut self, kind: WaitKind, budget_us: u32) -> Result<()> {
        let start = self.transport.now_us();
        let result = match self.config.wait_strategy {
            WaitStrategy::Periodic => {
                self.wait_periodic(StatusFlags::empty(), StatusFlags::WIP, start, budget_us)
            }
            WaitStrategy::Direct => self.wait_direct(
                StatusFlags::empty(),
                StatusFlags::WIP,
                start,
                budget_us,
                u32::MAX,
            ),
        };
        self.finish_wait(kind, start, result)
    }

    fn finish_wait(&mut self, kind: WaitKind, start: u64, result: Result<()>) -> Result<()> {
        let elapsed = self.transport.now_us() - start;
        if let Err(e) = result {
            warn!("{:?} wait failed after {} us: {}", kind, elapsed, e);
        }
        self.observer.waited(kind, elapsed, result.is_ok());
        result
    }
}
