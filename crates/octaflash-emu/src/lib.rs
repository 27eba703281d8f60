//! octaflash-emu - In-memory OSPI controller and octal NOR flash emulator
//!
//! [`EmulatedFlash`] implements [`Transport`] on top of an emulated
//! MX25UM25645G-class chip. It models what the engine relies on: the bus
//! protocol the device currently listens in (selected through configuration
//! register 2), the write enable latch, program and erase busy time on a
//! virtual microsecond clock, the DMA channel and the controller's periodic
//! status poll. Commands sent in a protocol or encoding the device is not
//! listening for are ignored, exactly like the real part.
//!
//! [`Faults`] lets tests break individual pieces of that behavior.

use log::{debug, trace};
use octaflash_core::completion::{Completion, CompletionSignal};
use octaflash_core::config::{Channel, TimingSettings};
use octaflash_core::controller::ConfigRegisterImage;
use octaflash_core::spi::opcodes::{self, CR2_MODE_ADDR, CR2_MODE_MASK};
use octaflash_core::spi::{
    AddressWidth, CommandDescriptor, Direction, OpcodeWidth, Protocol, StatusFlags,
    MAX_DIRECT_PAYLOAD,
};
use octaflash_core::transport::{
    PeriodicPollRequest, StartMode, TransferBuffer, TransferDescriptor, TransferInfo, Transport,
};
use octaflash_core::{Error, Result};

#[cfg(test)]
mod scenarios;

/// Configuration for the emulated chip
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Sector size for smallest erase
    pub sector_size: usize,
    /// Block size for large erase
    pub block_size: usize,
    /// Busy time of one page program
    pub program_time_us: u64,
    /// Busy time of one sector erase
    pub sector_erase_time_us: u64,
    /// Busy time of one block erase
    pub block_erase_time_us: u64,
    /// Busy time of a chip erase
    pub chip_erase_time_us: u64,
    /// Bus time of one manual command
    pub command_time_us: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: opcodes::MACRONIX_ID,
            device_id: opcodes::MX25UM25645G_ID,
            size: 32 * 1024 * 1024,
            page_size: 256,
            sector_size: 4096,
            block_size: 64 * 1024,
            program_time_us: 150,
            sector_erase_time_us: 30_000,
            block_erase_time_us: 250_000,
            chip_erase_time_us: 2_000_000,
            command_time_us: 1,
        }
    }
}

/// Injected misbehavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Program and erase never finish
    pub stuck_busy: bool,
    /// The DMA channel never raises its completion signal
    pub drop_dma_completion: bool,
    /// Bytes left untransferred by every bulk transfer
    pub short_transfer: u32,
    /// Write enable never sets the latch
    pub ignore_write_enable: bool,
    /// Writes to configuration register 2 are dropped
    pub ignore_config_write: bool,
    /// The controller fails to open
    pub fail_calibration: bool,
}

/// A manual command as seen on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord {
    /// Line the command went to
    pub channel: Channel,
    /// Descriptor register image
    pub descriptor: CommandDescriptor,
    /// Address phase value
    pub address: u32,
    /// Protocol the device was listening in
    pub device_protocol: Protocol,
    /// Decoded single-byte opcode, `None` if the device ignored the command
    pub decoded: Option<u8>,
}

#[derive(Debug, Clone, Copy)]
struct ActivePoll {
    channel: Channel,
    request: PeriodicPollRequest,
    next_at: u64,
    count: u32,
}

/// Emulated OSPI controller with an MX25UM25645G-class chip on every line
pub struct EmulatedFlash {
    config: EmulatorConfig,
    faults: Faults,
    data: Vec<u8>,
    now: u64,
    unit: Option<u8>,
    timing: Option<TimingSettings>,
    images: [Option<ConfigRegisterImage>; 2],
    device_mode: Protocol,
    cr2: u8,
    write_enabled: bool,
    reset_enabled: bool,
    busy_until: u64,
    pending: Option<TransferDescriptor>,
    remaining: u32,
    dma: CompletionSignal,
    poll: CompletionSignal,
    active_poll: Option<ActivePoll>,
    commands: Vec<CommandRecord>,
    transfers: Vec<TransferDescriptor>,
    resets: u32,
    prefetch_invalidations: u32,
    interrupt_clears: u32,
}

impl EmulatedFlash {
    /// Create an erased chip
    pub fn new(config: EmulatorConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            faults: Faults::default(),
            data,
            now: 0,
            unit: None,
            timing: None,
            images: [None; 2],
            device_mode: Protocol::Spi,
            cr2: 0,
            write_enabled: false,
            reset_enabled: false,
            busy_until: 0,
            pending: None,
            remaining: 0,
            dma: CompletionSignal::new(),
            poll: CompletionSignal::new(),
            active_poll: None,
            commands: Vec::new(),
            transfers: Vec::new(),
            resets: 0,
            prefetch_invalidations: 0,
            interrupt_clears: 0,
        }
    }

    /// Create an erased MX25UM25645G
    pub fn new_default() -> Self {
        Self::new(EmulatorConfig::default())
    }

    /// Create a chip with pre-filled contents
    pub fn with_data(config: EmulatorConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = initial_data.len().min(flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Chip contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Chip contents, mutably
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Emulator configuration
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Injected faults
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// Injected faults, mutably
    pub fn faults_mut(&mut self) -> &mut Faults {
        &mut self.faults
    }

    /// Protocol the device is listening in
    pub fn device_protocol(&self) -> Protocol {
        self.device_mode
    }

    /// Configuration register 2 mode byte
    pub fn config_register2(&self) -> u8 {
        self.cr2
    }

    /// Register image last written for a line
    pub fn config_image(&self, channel: Channel) -> Option<&ConfigRegisterImage> {
        self.images[channel.index()].as_ref()
    }

    /// Bus timing passed to `open`
    pub fn timing(&self) -> Option<&TimingSettings> {
        self.timing.as_ref()
    }

    /// Whether the controller is open
    pub fn is_open(&self) -> bool {
        self.unit.is_some()
    }

    /// Manual commands issued so far
    pub fn commands(&self) -> &[CommandRecord] {
        &self.commands
    }

    /// Decoded opcodes of the commands the device accepted
    pub fn accepted_opcodes(&self) -> Vec<u8> {
        self.commands.iter().filter_map(|c| c.decoded).collect()
    }

    /// Bulk transfers started so far
    pub fn transfers(&self) -> &[TransferDescriptor] {
        &self.transfers
    }

    /// Forget recorded commands and transfers
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.transfers.clear();
    }

    /// Hardware resets seen
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Prefetch invalidations seen
    pub fn prefetch_invalidations(&self) -> u32 {
        self.prefetch_invalidations
    }

    /// Interrupt flag clears seen
    pub fn interrupt_clears(&self) -> u32 {
        self.interrupt_clears
    }

    /// Keep the device busy for `us` from now, as if an operation started
    /// elsewhere were still running
    pub fn busy_for(&mut self, us: u64) {
        self.busy_until = self.now + us;
    }

    /// Put the device straight into `protocol`, as after a warm restart
    pub fn force_protocol(&mut self, protocol: Protocol) {
        self.device_mode = protocol;
        self.cr2 = protocol.cr2_mode();
    }

    fn is_busy(&self) -> bool {
        self.now < self.busy_until
    }

    fn status(&self) -> u8 {
        let mut status = StatusFlags::empty();
        if self.is_busy() {
            status |= StatusFlags::WIP;
        }
        if self.write_enabled {
            status |= StatusFlags::WEL;
        }
        status.bits()
    }

    fn start_busy(&mut self, duration_us: u64) {
        self.busy_until = if self.faults.stuck_busy {
            u64::MAX
        } else {
            self.now + duration_us
        };
    }

    fn device_reset(&mut self) {
        self.device_mode = Protocol::Spi;
        self.cr2 = 0;
        self.write_enabled = false;
        self.reset_enabled = false;
        self.busy_until = self.now;
    }

    fn advance(&mut self, us: u64) {
        self.now += us;
        self.service_poll();
    }

    /// Protocol a line is configured for
    fn line_protocol(&self, channel: Channel) -> Result<Protocol> {
        let image = self.images[channel.index()].ok_or(Error::Assertion)?;
        image.protocol().ok_or(Error::Assertion)
    }

    /// Turn a command into the single-byte opcode the device understands
    ///
    /// Returns `None` when the device would not recognise the command in its
    /// current mode.
    fn decode(&self, line: Protocol, width: Option<OpcodeWidth>, opcode: u16) -> Option<u8> {
        if line != self.device_mode {
            return None;
        }
        match (self.device_mode, width?) {
            (Protocol::Spi, OpcodeWidth::One) => Some(opcode as u8),
            (Protocol::OctalStr | Protocol::OctalDtr, OpcodeWidth::Two) => {
                let hi = (opcode >> 8) as u8;
                let lo = opcode as u8;
                if lo == !hi {
                    Some(hi)
                } else if lo == hi {
                    Some(!hi)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Whether a command carries the address phase the device expects
    fn address_ok(&self, op: u8, width: Option<AddressWidth>) -> bool {
        let width = width.unwrap_or(AddressWidth::None);
        let octal = !self.device_mode.is_legacy();
        match op {
            0x06 | 0x04 | 0x66 | 0x99 | 0x60 | 0xC7 => width == AddressWidth::None,
            0x05 | 0x9F => {
                if octal {
                    width == AddressWidth::FourByte
                } else {
                    width == AddressWidth::None
                }
            }
            _ => width == AddressWidth::FourByte,
        }
    }

    fn in_range(&self, address: u32, len: usize) -> bool {
        (address as usize).saturating_add(len) <= self.data.len()
    }

    fn handle_program(&mut self, address: u32, payload: &[u8]) {
        if !self.write_enabled || !self.in_range(address, payload.len()) {
            return;
        }
        let page = self.config.page_size;
        let start = address as usize;
        let page_base = start - start % page;
        // Bytes past the page end wrap to its start
        for (i, &byte) in payload.iter().enumerate() {
            let offset = page_base + (start - page_base + i) % page;
            self.data[offset] &= byte;
        }
        self.write_enabled = false;
        self.start_busy(self.config.program_time_us);
    }

    fn handle_erase(&mut self, address: u32, size: usize, duration_us: u64) {
        if !self.write_enabled {
            return;
        }
        // The controller addresses the span it wants erased
        let start = address as usize;
        if start + size > self.data.len() {
            return;
        }
        trace!("Emulated erase of {} bytes at 0x{:08X}", size, start);
        self.data[start..start + size].fill(0xFF);
        self.write_enabled = false;
        self.start_busy(duration_us);
    }

    fn run_command(&mut self, op: u8, address: u32, len: usize, data: u64) -> [u8; 8] {
        let mut out = [0xFFu8; MAX_DIRECT_PAYLOAD];
        let payload = data.to_le_bytes();

        if op != 0x99 {
            self.reset_enabled = op == 0x66;
        }
        // A busy device only answers status reads
        if self.is_busy() && op != 0x05 {
            return out;
        }

        match op {
            0x05 => out.fill(self.status()),
            0x06 => {
                if !self.faults.ignore_write_enable {
                    self.write_enabled = true;
                }
            }
            0x04 => self.write_enabled = false,
            0x9F => {
                out = [0; MAX_DIRECT_PAYLOAD];
                out[0] = self.config.manufacturer_id;
                out[1] = (self.config.device_id >> 8) as u8;
                out[2] = self.config.device_id as u8;
            }
            0x71 => {
                if address == CR2_MODE_ADDR {
                    out.fill(self.cr2);
                }
            }
            0x72 => {
                if self.write_enabled && address == CR2_MODE_ADDR && len > 0 {
                    if !self.faults.ignore_config_write {
                        let value = payload[0] & CR2_MODE_MASK;
                        if let Some(protocol) = Protocol::from_cr2_mode(value) {
                            debug!("Emulated device entering {}", protocol);
                            self.cr2 = value;
                            self.device_mode = protocol;
                        }
                    }
                    self.write_enabled = false;
                }
            }
            0x0C | 0x13 | 0xEC | 0xEE => {
                if self.in_range(address, len) {
                    let start = address as usize;
                    out[..len].copy_from_slice(&self.data[start..start + len]);
                }
            }
            0x12 => self.handle_program(address, &payload[..len]),
            0x21 => self.handle_erase(
                address,
                self.config.sector_size,
                self.config.sector_erase_time_us,
            ),
            0xDC => self.handle_erase(
                address,
                self.config.block_size,
                self.config.block_erase_time_us,
            ),
            0x60 | 0xC7 => {
                if self.write_enabled {
                    self.data.fill(0xFF);
                    self.write_enabled = false;
                    self.start_busy(self.config.chip_erase_time_us);
                }
            }
            0x66 => {}
            0x99 => {
                if self.reset_enabled {
                    debug!("Emulated software reset");
                    self.device_reset();
                }
            }
            _ => trace!("Emulated device ignoring opcode 0x{:02X}", op),
        }
        out
    }

    /// Run the controller's periodic status poll up to the current time
    fn service_poll(&mut self) {
        while let Some(mut active) = self.active_poll {
            if self.now < active.next_at {
                return;
            }
            active.count += 1;
            let status = match self.line_protocol(active.channel) {
                Ok(line) => {
                    let desc = active.request.descriptor;
                    match self.decode(line, desc.opcode_width(), desc.opcode()) {
                        Some(0x05) if self.address_ok(0x05, desc.address_width()) => {
                            self.status()
                        }
                        _ => 0xFF,
                    }
                }
                Err(_) => 0xFF,
            };
            if active.request.matches(status) {
                trace!("Periodic poll matched after {} reads", active.count);
                self.active_poll = None;
                self.poll.signal(Completion::Complete);
            } else if active.count >= active.request.max_count {
                trace!("Periodic poll budget exhausted");
                self.active_poll = None;
                self.poll.signal(Completion::Failed);
            } else {
                active.next_at += u64::from(active.request.interval_us.max(1));
                self.active_poll = Some(active);
            }
        }
    }

    /// Whether a bulk transfer would be understood by the device
    fn bulk_opcode_ok(&self, channel: Channel, direction: Direction) -> bool {
        let Ok(line) = self.line_protocol(channel) else {
            return false;
        };
        let Some(image) = self.images[channel.index()] else {
            return false;
        };
        let (command, writes) = match direction {
            Direction::Read => (image.read_command(), false),
            Direction::Write => (image.write_command(), true),
        };
        let width = if line.is_legacy() {
            OpcodeWidth::One
        } else {
            OpcodeWidth::Two
        };
        // Single-byte commands sit in the upper byte of the command field
        let opcode = match width {
            OpcodeWidth::One => command >> 8,
            OpcodeWidth::Two => command,
        };
        match self.decode(line, Some(width), opcode) {
            Some(0x12) => writes,
            Some(0x0C | 0x13 | 0xEC | 0xEE) => !writes,
            _ => false,
        }
    }
}

impl Transport for EmulatedFlash {
    fn open(&mut self, unit: u8, timing: &TimingSettings) -> Result<()> {
        if self.faults.fail_calibration {
            return Err(Error::CalibrateFailed);
        }
        debug!("Emulated controller unit {} opened", unit);
        self.unit = Some(unit);
        self.timing = Some(*timing);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.unit.take().ok_or(Error::NotOpen)?;
        self.active_poll = None;
        Ok(())
    }

    fn write_config(&mut self, channel: Channel, image: &ConfigRegisterImage) -> Result<()> {
        if self.unit.is_none() {
            return Err(Error::NotOpen);
        }
        self.images[channel.index()] = Some(*image);
        Ok(())
    }

    fn execute_direct(
        &mut self,
        channel: Channel,
        descriptor: CommandDescriptor,
        address: u32,
        data: u64,
    ) -> Result<u64> {
        if self.unit.is_none() {
            return Err(Error::NotOpen);
        }
        let line = self.line_protocol(channel)?;
        self.advance(self.config.command_time_us);

        let len = descriptor.data_len();
        if len > MAX_DIRECT_PAYLOAD {
            return Err(Error::Assertion);
        }
        let decoded = self
            .decode(line, descriptor.opcode_width(), descriptor.opcode())
            .filter(|&op| self.address_ok(op, descriptor.address_width()));
        self.commands.push(CommandRecord {
            channel,
            descriptor,
            address,
            device_protocol: self.device_mode,
            decoded,
        });

        let out = match decoded {
            Some(op) => self.run_command(op, address, len, data),
            None => [0xFF; MAX_DIRECT_PAYLOAD],
        };
        Ok(match descriptor.direction() {
            Direction::Read => u64::from_le_bytes(out),
            Direction::Write => 0,
        })
    }

    fn clear_interrupts(&mut self) {
        self.interrupt_clears += 1;
    }

    fn reconfigure(&mut self, transfer: &TransferDescriptor) -> Result<()> {
        if self.unit.is_none() {
            return Err(Error::NotOpen);
        }
        self.pending = Some(*transfer);
        Ok(())
    }

    fn start(&mut self, _mode: StartMode, buffer: TransferBuffer<'_>) -> Result<()> {
        let transfer = self.pending.take().ok_or(Error::Assertion)?;
        if buffer.len() != transfer.length as usize {
            return Err(Error::Assertion);
        }
        self.transfers.push(transfer);

        let remaining = self.faults.short_transfer.min(transfer.length);
        let moved = (transfer.length - remaining) as usize;
        let understood = !self.is_busy() && self.bulk_opcode_ok(transfer.channel, transfer.direction);
        let in_range = self.in_range(transfer.address, moved);

        match buffer {
            TransferBuffer::Destination(buf) => {
                if understood && in_range {
                    let start = transfer.address as usize;
                    buf[..moved].copy_from_slice(&self.data[start..start + moved]);
                } else {
                    buf[..moved].fill(0xFF);
                }
            }
            TransferBuffer::Source(buf) => {
                if understood && in_range && moved > 0 {
                    self.handle_program(transfer.address, &buf[..moved]);
                }
            }
        }
        self.remaining = remaining;
        self.advance(self.config.command_time_us + moved as u64 / 64);

        if !self.faults.drop_dma_completion {
            self.dma.signal(Completion::Complete);
        }
        Ok(())
    }

    fn info_get(&self) -> Result<TransferInfo> {
        Ok(TransferInfo {
            remaining: self.remaining,
        })
    }

    fn dma_signal(&self) -> &CompletionSignal {
        &self.dma
    }

    fn start_periodic_poll(
        &mut self,
        channel: Channel,
        request: &PeriodicPollRequest,
    ) -> Result<()> {
        self.line_protocol(channel)?;
        if self.active_poll.is_some() {
            return Err(Error::DeviceBusy);
        }
        self.active_poll = Some(ActivePoll {
            channel,
            request: *request,
            next_at: self.now + u64::from(request.interval_us.max(1)),
            count: 0,
        });
        Ok(())
    }

    fn stop_periodic_poll(&mut self) {
        self.active_poll = None;
    }

    fn poll_signal(&self) -> &CompletionSignal {
        &self.poll
    }

    fn hardware_reset(&mut self, _channel: Channel) -> Result<()> {
        self.resets += 1;
        self.device_reset();
        self.advance(self.config.command_time_us);
        Ok(())
    }

    fn invalidate_prefetch(&mut self, _channel: Channel) {
        self.prefetch_invalidations += 1;
    }

    fn now_us(&self) -> u64 {
        self.now
    }

    fn delay_us(&mut self, us: u32) {
        self.advance(u64::from(us));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octaflash_core::command_set::{MX25UM_OCTAL_DTR, MX25UM_SPI};
    use octaflash_core::controller::encode_config;
    use octaflash_core::spi::Transaction;

    fn opened() -> EmulatedFlash {
        let mut emu = EmulatedFlash::new_default();
        emu.open(0, &TimingSettings::default()).unwrap();
        emu.write_config(Channel::Cs1, &encode_config(&MX25UM_SPI, Protocol::Spi))
            .unwrap();
        emu
    }

    fn run(emu: &mut EmulatedFlash, txn: &Transaction) -> u64 {
        emu.execute_direct(Channel::Cs1, txn.descriptor().unwrap(), txn.address, txn.data_word())
            .unwrap()
    }

    #[test]
    fn test_read_jedec_id() {
        let mut emu = opened();
        let txn = Transaction::read(opcodes::RDID, OpcodeWidth::One, 3).unwrap();
        let id = run(&mut emu, &txn).to_le_bytes();
        assert_eq!(&id[..3], &[0xC2, 0x80, 0x39]);
    }

    #[test]
    fn test_program_needs_write_enable() {
        let mut emu = opened();
        let program = Transaction::write(opcodes::PP4B, OpcodeWidth::One, &[0x00; 4])
            .unwrap()
            .with_address(0x100, AddressWidth::FourByte);
        run(&mut emu, &program);
        assert!(emu.data()[0x100..0x104].iter().all(|&b| b == 0xFF));

        run(&mut emu, &Transaction::command(opcodes::WREN, OpcodeWidth::One));
        run(&mut emu, &program);
        assert!(emu.data()[0x100..0x104].iter().all(|&b| b == 0x00));
        assert_eq!(emu.status() & 0x01, 0x01);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut emu = opened();
        emu.data_mut()[0x10] = 0xF0;
        run(&mut emu, &Transaction::command(opcodes::WREN, OpcodeWidth::One));
        let program = Transaction::write(opcodes::PP4B, OpcodeWidth::One, &[0x3C])
            .unwrap()
            .with_address(0x10, AddressWidth::FourByte);
        run(&mut emu, &program);
        assert_eq!(emu.data()[0x10], 0x30);
    }

    #[test]
    fn test_octal_commands_ignored_in_spi() {
        let mut emu = opened();
        emu.write_config(
            Channel::Cs1,
            &encode_config(&MX25UM_OCTAL_DTR, Protocol::OctalDtr),
        )
        .unwrap();
        let status = Transaction::read(opcodes::OPI_RDSR, OpcodeWidth::Two, 1)
            .unwrap()
            .with_address(0, AddressWidth::FourByte)
            .with_dummy_cycles(4);
        assert_eq!(run(&mut emu, &status) & 0xFF, 0xFF);
        assert_eq!(emu.commands()[0].decoded, None);
    }

    #[test]
    fn test_cr2_write_switches_device() {
        let mut emu = opened();
        run(&mut emu, &Transaction::command(opcodes::WREN, OpcodeWidth::One));
        let wrcr2 = Transaction::write(opcodes::WRCR2, OpcodeWidth::One, &[0x02])
            .unwrap()
            .with_address(0, AddressWidth::FourByte);
        run(&mut emu, &wrcr2);
        assert_eq!(emu.device_protocol(), Protocol::OctalDtr);

        // The DTR form of RDSR decodes to the same command
        emu.write_config(
            Channel::Cs1,
            &encode_config(&MX25UM_OCTAL_DTR, Protocol::OctalDtr),
        )
        .unwrap();
        let status = Transaction::read(opcodes::OPI_RDSR_DTR, OpcodeWidth::Two, 1)
            .unwrap()
            .with_address(0, AddressWidth::FourByte);
        assert_eq!(run(&mut emu, &status) & 0xFF, 0x00);

        emu.hardware_reset(Channel::Cs1).unwrap();
        assert_eq!(emu.device_protocol(), Protocol::Spi);
        assert_eq!(emu.config_register2(), 0);
    }

    #[test]
    fn test_periodic_poll_signals_on_match() {
        let mut emu = opened();
        emu.busy_for(500);
        let status = Transaction::read(opcodes::RDSR, OpcodeWidth::One, 1).unwrap();
        let request = PeriodicPollRequest {
            descriptor: status.descriptor().unwrap(),
            address: 0,
            expected: 0,
            ignore_mask: !0x01,
            interval_us: 100,
            max_count: 100,
        };
        emu.start_periodic_poll(Channel::Cs1, &request).unwrap();
        emu.delay_us(300);
        assert!(!emu.poll_signal().is_pending());
        emu.delay_us(300);
        assert_eq!(emu.poll_signal().take(), Some(Completion::Complete));
    }

    #[test]
    fn test_periodic_poll_gives_up() {
        let mut emu = opened();
        emu.busy_for(10_000);
        let status = Transaction::read(opcodes::RDSR, OpcodeWidth::One, 1).unwrap();
        let request = PeriodicPollRequest {
            descriptor: status.descriptor().unwrap(),
            address: 0,
            expected: 0,
            ignore_mask: !0x01,
            interval_us: 100,
            max_count: 3,
        };
        emu.start_periodic_poll(Channel::Cs1, &request).unwrap();
        emu.delay_us(1_000);
        assert_eq!(emu.poll_signal().take(), Some(Completion::Failed));
    }
}
