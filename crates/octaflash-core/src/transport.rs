//! Controller and DMA transport trait
//!
//! [`Transport`] is everything the engine needs from the OSPI controller and
//! its DMA channel: register-level direct commands, per-line protocol
//! configuration, bulk transfers through the memory-mapped window, periodic
//! status polling and the reset line. Interrupt handlers report completion
//! through the two [`CompletionSignal`]s the transport owns.

use crate::completion::CompletionSignal;
use crate::config::{Channel, TimingSettings};
use crate::controller::ConfigRegisterImage;
use crate::error::Result;
use crate::spi::{CommandDescriptor, Direction};

/// DMA element size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransferUnit {
    /// Byte transfers
    #[default]
    Byte,
    /// Halfword transfers
    Halfword,
    /// Word transfers
    Word,
}

/// DMA start mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StartMode {
    /// Transfer one element per trigger
    Single,
    /// Transfer the whole block on one trigger
    #[default]
    Repeat,
}

/// Bulk transfer setup between memory and the device's mapped window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    /// Target line
    pub channel: Channel,
    /// Read from or write to the device
    pub direction: Direction,
    /// Chip-relative device address
    pub address: u32,
    /// Bytes to move
    pub length: u32,
    /// DMA element size
    pub unit: TransferUnit,
}

/// Memory side of a bulk transfer
#[derive(Debug)]
pub enum TransferBuffer<'a> {
    /// Data to write to the device
    Source(&'a [u8]),
    /// Buffer receiving device data
    Destination(&'a mut [u8]),
}

impl TransferBuffer<'_> {
    /// Buffer length
    pub fn len(&self) -> usize {
        match self {
            Self::Source(buf) => buf.len(),
            Self::Destination(buf) => buf.len(),
        }
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transfer progress reported by the DMA channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferInfo {
    /// Bytes not yet transferred
    pub remaining: u32,
}

/// Automatic status polling request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicPollRequest {
    /// Status read descriptor
    pub descriptor: CommandDescriptor,
    /// Address sent with the status read
    pub address: u32,
    /// Value the unmasked bits must match
    pub expected: u8,
    /// Bits excluded from the comparison
    pub ignore_mask: u8,
    /// Interval between reads
    pub interval_us: u32,
    /// Reads before the controller reports failure
    pub max_count: u32,
}

impl PeriodicPollRequest {
    /// Whether `status` satisfies the request
    pub fn matches(&self, status: u8) -> bool {
        (status & !self.ignore_mask) == (self.expected & !self.ignore_mask)
    }
}

/// OSPI controller with its DMA channel
pub trait Transport {
    /// Bring up controller `unit` with the given bus timing
    ///
    /// May fail with `CalibrateFailed` if the controller cannot find a
    /// working sampling point.
    fn open(&mut self, unit: u8, timing: &TimingSettings) -> Result<()>;

    /// Shut the controller down
    fn close(&mut self) -> Result<()>;

    /// Program the protocol registers of one line
    fn write_config(&mut self, channel: Channel, image: &ConfigRegisterImage) -> Result<()>;

    /// Run one manual command and spin until the controller reports it done
    ///
    /// `data` holds the write payload; the return value holds read data.
    fn execute_direct(
        &mut self,
        channel: Channel,
        descriptor: CommandDescriptor,
        address: u32,
        data: u64,
    ) -> Result<u64>;

    /// Clear pending transaction-complete interrupt flags
    fn clear_interrupts(&mut self);

    /// Set up the next bulk transfer
    fn reconfigure(&mut self, transfer: &TransferDescriptor) -> Result<()>;

    /// Start the configured bulk transfer
    ///
    /// Completion is reported through [`Transport::dma_signal`].
    fn start(&mut self, mode: StartMode, buffer: TransferBuffer<'_>) -> Result<()>;

    /// Progress of the last bulk transfer
    fn info_get(&self) -> Result<TransferInfo>;

    /// Signal raised when a bulk transfer completes
    fn dma_signal(&self) -> &CompletionSignal;

    /// Start automatic status polling on a line
    ///
    /// Completion is reported through [`Transport::poll_signal`].
    fn start_periodic_poll(&mut self, channel: Channel, request: &PeriodicPollRequest)
        -> Result<()>;

    /// Stop automatic status polling
    fn stop_periodic_poll(&mut self);

    /// Signal raised when automatic polling matches or gives up
    fn poll_signal(&self) -> &CompletionSignal;

    /// Pulse the device's reset line
    fn hardware_reset(&mut self, channel: Channel) -> Result<()>;

    /// Drop prefetched data for a line
    fn invalidate_prefetch(&mut self, channel: Channel);

    /// Monotonic time in microseconds
    fn now_us(&self) -> u64;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}
