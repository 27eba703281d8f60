//! The flash device handle and its operations
//!
//! [`OspiFlash`] owns a [`Transport`], the device configuration and the
//! bound protocol state. All operations are synchronous and stop at the
//! first error; nothing is retried or rolled back.
//!
//! - direct transactions and chunked direct reads/writes (this module)
//! - status and completion waits ([`wait`])
//! - block program ([`program`])
//! - erase planning and erase ([`erase`])
//! - protocol switching ([`switch`])

pub mod erase;
mod program;
mod switch;
mod wait;

pub use erase::{ErasePlan, EraseStep};
pub use switch::LEGACY_PROTOCOL;
pub use wait::MAX_WRITE_ENABLE_POLLS;

use crate::command_set::{CommandSet, CommandSetTable};
use crate::completion::Completion;
use crate::config::DeviceConfig;
use crate::controller::ProtocolState;
use crate::error::{Error, Result};
use crate::observer::{FlashObserver, NoopObserver, WaitKind};
use crate::registry::{ChannelId, ChannelRegistry};
use crate::spi::{Direction, Protocol, StatusFlags, Transaction, MAX_DIRECT_PAYLOAD};
use crate::transport::{StartMode, TransferBuffer, TransferDescriptor, TransferUnit, Transport};
use log::{debug, info, trace, warn};

/// Value of an erased flash byte
pub const ERASED_VALUE: u8 = 0xFF;

/// An open flash device
pub struct OspiFlash<T: Transport, O: FlashObserver = NoopObserver> {
    transport: T,
    config: DeviceConfig,
    state: ProtocolState,
    open: bool,
    observer: O,
}

impl<T: Transport> OspiFlash<T> {
    /// Open a device with the MX25UM25645G command sets and no observer
    pub fn open<const N: usize>(
        transport: T,
        config: DeviceConfig,
        registry: &mut ChannelRegistry<N>,
    ) -> Result<Self> {
        Self::open_with(
            transport,
            config,
            CommandSetTable::default(),
            NoopObserver,
            registry,
        )
    }
}

impl<T: Transport, O: FlashObserver> OspiFlash<T, O> {
    /// Open a device
    ///
    /// Claims the (unit, channel) pair in `registry`, brings up the
    /// controller and binds `config.protocol`. Fails with `AlreadyOpen` if
    /// the line is taken and with `InvalidMode` if `table` has no command
    /// set for the configured protocol.
    pub fn open_with<const N: usize>(
        mut transport: T,
        config: DeviceConfig,
        table: CommandSetTable,
        observer: O,
        registry: &mut ChannelRegistry<N>,
    ) -> Result<Self> {
        config.validate()?;
        let mut state = ProtocolState::new(table, config.protocol)?;
        let id = ChannelId::new(config.unit, config.channel);
        registry.claim(id)?;

        if let Err(e) = transport.open(config.unit, &config.timing) {
            registry.release(id).ok();
            return Err(e);
        }
        if let Err(e) = state.bind(&mut transport, config.channel, config.protocol) {
            transport.close().ok();
            registry.release(id).ok();
            return Err(e);
        }

        info!(
            "Opened unit {} {:?} in {} ({} bytes)",
            config.unit, config.channel, config.protocol, config.geometry.total_size
        );

        let mut flash = Self {
            transport,
            config,
            state,
            open: true,
            observer,
        };
        flash.observer.protocol_bound(config.protocol);
        Ok(flash)
    }

    /// Close the device and release its line
    pub fn close<const N: usize>(&mut self, registry: &mut ChannelRegistry<N>) -> Result<()> {
        self.ensure_open()?;
        self.open = false;
        registry.release(self.channel_id())?;
        debug!("Closing unit {} {:?}", self.config.unit, self.config.channel);
        self.transport.close()
    }

    /// Whether the handle is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Device configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Line this handle drives
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.config.unit, self.config.channel)
    }

    /// Active protocol
    pub fn protocol(&self) -> Protocol {
        self.state.protocol()
    }

    /// Active command set
    pub fn command_set(&self) -> &'static CommandSet {
        self.state.command_set()
    }

    /// Active protocol and command set
    pub fn current(&self) -> (Protocol, &'static CommandSet) {
        self.state.current()
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The observer
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// The observer, mutably
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Give back the transport and observer
    pub fn into_parts(self) -> (T, O) {
        (self.transport, self.observer)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }

    fn ensure_range(&self, address: u32, len: usize) -> Result<()> {
        if len == 0 || !self.config.geometry.contains(address, len) {
            return Err(Error::Assertion);
        }
        Ok(())
    }

    /// Bind a protocol and notify the observer
    fn bind_protocol(&mut self, protocol: Protocol) -> Result<()> {
        self.state
            .bind(&mut self.transport, self.config.channel, protocol)?;
        self.observer.protocol_bound(protocol);
        Ok(())
    }

    /// Change the controller's protocol binding without touching the device
    ///
    /// Returns `InvalidMode` and keeps the previous binding if no command
    /// set exists for `protocol`. Use [`OspiFlash::switch_safe`] to move the
    /// device as well.
    pub fn protocol_set(&mut self, protocol: Protocol) -> Result<()> {
        self.ensure_open()?;
        self.bind_protocol(protocol)
    }

    /// Execute one direct transaction
    ///
    /// The payload is limited to [`MAX_DIRECT_PAYLOAD`] bytes. For reads the
    /// payload is replaced with the returned data. Pending interrupt flags
    /// are cleared before returning, whether or not the transport failed.
    pub fn execute(&mut self, txn: &mut Transaction) -> Result<()> {
        self.ensure_open()?;
        let descriptor = txn.descriptor()?;
        trace!(
            "{:?} op=0x{:04X} addr=0x{:08X}/{} dummy={} len={}",
            txn.direction,
            txn.opcode,
            txn.address,
            txn.address_width.bytes(),
            txn.dummy_cycles,
            txn.data_len
        );

        let result = self.transport.execute_direct(
            self.config.channel,
            descriptor,
            txn.address,
            txn.data_word(),
        );
        self.transport.clear_interrupts();
        let word = result?;

        if txn.direction == Direction::Read {
            txn.set_data_word(word);
        }
        self.observer.transaction(txn);
        Ok(())
    }

    /// Read with direct transactions using the bound read command
    ///
    /// Split into transactions of at most [`MAX_DIRECT_PAYLOAD`] bytes.
    pub fn direct_read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        self.ensure_range(address, buf.len())?;
        let set = self.state.command_set();

        let mut offset = address;
        for chunk in buf.chunks_mut(MAX_DIRECT_PAYLOAD) {
            let mut txn = Transaction::read(set.read_opcode, set.opcode_width, chunk.len())?
                .with_address(offset, set.address_width)
                .with_dummy_cycles(set.read_dummy_cycles);
            self.execute(&mut txn)?;
            chunk.copy_from_slice(txn.payload());
            offset += chunk.len() as u32;
        }
        Ok(())
    }

    /// Program with direct transactions using the bound program command
    ///
    /// Split into transactions of at most [`MAX_DIRECT_PAYLOAD`] bytes that
    /// never cross a page boundary. Each transaction is preceded by write
    /// enable and followed by a completion wait.
    pub fn direct_write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.ensure_range(address, data.len())?;
        self.ensure_idle()?;
        let set = self.state.command_set();
        let page = self.config.geometry.page_size;

        let mut written = 0usize;
        while written < data.len() {
            let offset = address + written as u32;
            let page_left = (page - offset % page) as usize;
            let len = MAX_DIRECT_PAYLOAD.min(page_left).min(data.len() - written);

            self.write_enable_confirmed()?;
            let mut txn = Transaction::write(
                set.program_opcode,
                set.opcode_width,
                &data[written..written + len],
            )?
            .with_address(offset, set.address_width)
            .with_dummy_cycles(set.program_dummy_cycles);
            self.execute(&mut txn)?;
            self.wait_write_complete(WaitKind::Program, self.config.timeouts.program_us)?;
            written += len;
        }
        Ok(())
    }

    /// Whether the device reports write or erase in progress
    pub fn status_get(&mut self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.read_status()?.contains(StatusFlags::WIP))
    }

    /// Read the JEDEC identification bytes into `buf` (1 to 8 bytes)
    pub fn read_id(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Err(Error::Assertion);
        }
        let set = self.state.command_set();
        let mut txn = Transaction::read(set.read_id_opcode, set.opcode_width, buf.len())?
            .with_dummy_cycles(set.read_id_dummy_cycles);
        if set.read_id_needs_address {
            txn = txn.with_address(0, set.address_width);
        }
        self.execute(&mut txn)?;
        buf.copy_from_slice(txn.payload());
        Ok(())
    }

    /// Pulse the device's reset line
    ///
    /// The device returns to legacy SPI mode but the controller binding is
    /// left alone; follow with [`OspiFlash::switch_safe`] or
    /// [`OspiFlash::protocol_set`] to bring them back in line.
    pub fn hardware_reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        debug!("Hardware reset on {:?}", self.config.channel);
        self.transport.hardware_reset(self.config.channel)
    }

    /// Read through the memory-mapped window with a bulk transfer
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        self.ensure_range(address, buf.len())?;
        self.bulk_transfer(address, TransferBuffer::Destination(buf))
    }

    /// Move a buffer to or from the device and wait for the DMA to finish
    fn bulk_transfer(&mut self, address: u32, buffer: TransferBuffer<'_>) -> Result<()> {
        let direction = match buffer {
            TransferBuffer::Source(_) => Direction::Write,
            TransferBuffer::Destination(_) => Direction::Read,
        };
        let descriptor = TransferDescriptor {
            channel: self.config.channel,
            direction,
            address,
            length: buffer.len() as u32,
            unit: TransferUnit::Byte,
        };
        trace!(
            "Bulk {:?} of {} bytes at 0x{:08X}",
            direction,
            descriptor.length,
            address
        );

        self.arm(wait::SignalKind::Dma);
        self.transport.reconfigure(&descriptor)?;
        self.transport.start(StartMode::Repeat, buffer)?;
        let start = self.transport.now_us();
        let outcome = self.wait_signal(
            wait::SignalKind::Dma,
            start,
            self.config.timeouts.transfer_us,
        );
        self.observer.waited(
            WaitKind::Transfer,
            self.transport.now_us() - start,
            outcome.is_ok(),
        );
        if outcome? == Completion::Failed {
            return Err(Error::TransferAborted);
        }

        let info = self.transport.info_get()?;
        if info.remaining != 0 {
            warn!(
                "Bulk transfer at 0x{:08X} stopped with {} bytes remaining",
                address,
                info.remaining
            );
            return Err(Error::TransferAborted);
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::completion::{Completion, CompletionSignal};
    use crate::config::{Channel, TimingSettings};
    use crate::controller::ConfigRegisterImage;
    use crate::spi::{opcodes, CommandDescriptor, OpcodeWidth};
    use crate::transport::{PeriodicPollRequest, TransferInfo};
    use std::vec::Vec;

    /// A mock controller that records every manual command
    ///
    /// Status reads always return an idle device with the write enable
    /// latch set; every other read returns zeros.
    #[derive(Default)]
    struct MockTransport {
        commands: Vec<(CommandDescriptor, u32, u64)>,
        configs: Vec<(Channel, ConfigRegisterImage)>,
        opened: bool,
        dma: CompletionSignal,
        poll: CompletionSignal,
        now: u64,
    }

    impl MockTransport {
        fn opcodes(&self) -> Vec<u16> {
            self.commands.iter().map(|(d, _, _)| d.opcode()).collect()
        }
    }

    impl Transport for MockTransport {
        fn open(&mut self, _unit: u8, _timing: &TimingSettings) -> Result<()> {
            self.opened = true;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.opened = false;
            Ok(())
        }

        fn write_config(&mut self, channel: Channel, image: &ConfigRegisterImage) -> Result<()> {
            self.configs.push((channel, *image));
            Ok(())
        }

        fn execute_direct(
            &mut self,
            _channel: Channel,
            descriptor: CommandDescriptor,
            address: u32,
            data: u64,
        ) -> Result<u64> {
            self.commands.push((descriptor, address, data));
            match descriptor.opcode() {
                opcodes::RDSR | opcodes::OPI_RDSR => Ok(0x02),
                _ => Ok(0),
            }
        }

        fn clear_interrupts(&mut self) {}

        fn reconfigure(&mut self, _transfer: &TransferDescriptor) -> Result<()> {
            Ok(())
        }

        fn start(&mut self, _mode: StartMode, _buffer: TransferBuffer<'_>) -> Result<()> {
            self.dma.signal(Completion::Complete);
            Ok(())
        }

        fn info_get(&self) -> Result<TransferInfo> {
            Ok(TransferInfo::default())
        }

        fn dma_signal(&self) -> &CompletionSignal {
            &self.dma
        }

        fn start_periodic_poll(
            &mut self,
            _channel: Channel,
            _request: &PeriodicPollRequest,
        ) -> Result<()> {
            self.poll.signal(Completion::Complete);
            Ok(())
        }

        fn stop_periodic_poll(&mut self) {}

        fn poll_signal(&self) -> &CompletionSignal {
            &self.poll
        }

        fn hardware_reset(&mut self, _channel: Channel) -> Result<()> {
            Ok(())
        }

        fn invalidate_prefetch(&mut self, _channel: Channel) {}

        fn now_us(&self) -> u64 {
            self.now
        }

        fn delay_us(&mut self, us: u32) {
            self.now += u64::from(us);
        }
    }

    fn open_mock() -> (OspiFlash<MockTransport>, ChannelRegistry) {
        let mut registry = ChannelRegistry::new();
        let flash =
            OspiFlash::open(MockTransport::default(), DeviceConfig::default(), &mut registry)
                .unwrap();
        (flash, registry)
    }

    #[test]
    fn test_open_binds_initial_protocol() {
        let (flash, registry) = open_mock();
        assert!(flash.transport().opened);
        assert_eq!(flash.protocol(), Protocol::Spi);
        assert_eq!(flash.transport().configs.len(), 1);
        assert!(registry.is_open(flash.channel_id()));
    }

    #[test]
    fn test_second_open_on_same_line_fails() {
        let (_flash, mut registry) = open_mock();
        let second = OspiFlash::open(MockTransport::default(), DeviceConfig::default(), &mut registry);
        assert!(matches!(second, Err(Error::AlreadyOpen)));
    }

    #[test]
    fn test_payload_boundary() {
        let (mut flash, _registry) = open_mock();

        let mut txn = Transaction::write(opcodes::PP4B, OpcodeWidth::One, &[0xA5; 8]).unwrap();
        assert!(flash.execute(&mut txn).is_ok());

        txn.data_len = 9;
        assert_eq!(flash.execute(&mut txn), Err(Error::Assertion));
        assert_eq!(flash.transport().commands.len(), 1);
    }

    #[test]
    fn test_direct_read_chunks_of_eight() {
        let (mut flash, _registry) = open_mock();
        let mut buf = [0u8; 17];
        flash.direct_read(0x100, &mut buf).unwrap();

        let commands = &flash.transport().commands;
        let lens: Vec<usize> = commands.iter().map(|(d, _, _)| d.data_len()).collect();
        let addrs: Vec<u32> = commands.iter().map(|(_, a, _)| *a).collect();
        assert_eq!(lens, [8, 8, 1]);
        assert_eq!(addrs, [0x100, 0x108, 0x110]);
        assert!(commands
            .iter()
            .all(|(d, _, _)| d.opcode() == opcodes::FAST_READ4B && d.dummy_cycles() == 8));
    }

    #[test]
    fn test_direct_write_chunks_of_eight() {
        let (mut flash, _registry) = open_mock();
        flash.direct_write(0x200, &[0x5A; 17]).unwrap();

        let programs: Vec<(usize, u32)> = flash
            .transport()
            .commands
            .iter()
            .filter(|(d, _, _)| d.opcode() == opcodes::PP4B)
            .map(|(d, a, _)| (d.data_len(), *a))
            .collect();
        assert_eq!(programs, [(8, 0x200), (8, 0x208), (1, 0x210)]);
    }

    #[test]
    fn test_unknown_protocol_keeps_binding() {
        let (mut flash, _registry) = open_mock();
        assert_eq!(flash.protocol_set(Protocol::OctalStr), Err(Error::InvalidMode));
        assert_eq!(flash.protocol(), Protocol::Spi);
        assert_eq!(flash.command_set().protocol, Protocol::Spi);
        assert_eq!(flash.transport().configs.len(), 1);
    }

    #[test]
    fn test_closed_handle_rejects_operations() {
        let (mut flash, mut registry) = open_mock();
        flash.close(&mut registry).unwrap();
        assert!(registry.is_empty());
        assert_eq!(flash.status_get(), Err(Error::NotOpen));
        let mut txn = Transaction::command(opcodes::WREN, OpcodeWidth::One);
        assert_eq!(flash.execute(&mut txn), Err(Error::NotOpen));
        assert_eq!(flash.close(&mut registry), Err(Error::NotOpen));
    }

    #[test]
    fn test_read_id_in_spi() {
        let (mut flash, _registry) = open_mock();
        let mut id = [0u8; 3];
        flash.read_id(&mut id).unwrap();
        assert_eq!(flash.transport().opcodes(), [opcodes::RDID]);
    }
}
