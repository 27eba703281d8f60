//! Protocol switching
//!
//! The device's bus mode lives in configuration register 2. A switch always
//! starts from a known state: the device is reset into legacy SPI, the new
//! mode is written in SPI, the controller is rebound, and the register is
//! read back in the new encoding to prove both sides agree.

use super::OspiFlash;
use crate::error::{Error, Result};
use crate::observer::FlashObserver;
use crate::spi::opcodes::{CR2_MODE_ADDR, CR2_MODE_MASK};
use crate::spi::{Protocol, Transaction};
use crate::transport::Transport;
use log::{debug, info, warn};

/// Protocol the device wakes up in after any reset
pub const LEGACY_PROTOCOL: Protocol = Protocol::Spi;

/// Recovery time after a software reset
const RESET_RECOVERY_US: u32 = 40;

impl<T: Transport, O: FlashObserver> OspiFlash<T, O> {
    /// Move the device and the controller to `target`
    ///
    /// Does nothing if `target` is already bound. Fails with `InvalidMode`
    /// before touching the device if no command set exists for `target`.
    /// If the mode register does not read back as written, the device is
    /// reset and `WriteFailed` is returned. On any failure the controller is
    /// left bound to legacy SPI.
    pub fn switch_safe(&mut self, target: Protocol) -> Result<()> {
        self.ensure_open()?;
        let from = self.state.protocol();
        if from == target {
            debug!("Already in {}", target);
            return Ok(());
        }
        self.state.table().lookup(target)?;
        self.state.table().lookup(LEGACY_PROTOCOL)?;

        info!("Switching {} -> {}", from, target);
        self.transport.hardware_reset(self.config.channel)?;
        self.bind_protocol(LEGACY_PROTOCOL)?;
        if target == LEGACY_PROTOCOL {
            return Ok(());
        }

        let result = self.enter_protocol(target);
        if result.is_err() {
            warn!("Switch to {} failed, returning to {}", target, LEGACY_PROTOCOL);
            self.transport.hardware_reset(self.config.channel).ok();
            self.bind_protocol(LEGACY_PROTOCOL).ok();
        }
        result
    }

    /// Write the mode register from legacy SPI, rebind and verify
    fn enter_protocol(&mut self, target: Protocol) -> Result<()> {
        let mode = target.cr2_mode();
        self.write_enable_confirmed()?;
        self.write_config_register2(mode)?;
        self.bind_protocol(target)?;

        let readback = self.read_config_register2()?;
        if readback & CR2_MODE_MASK != mode {
            warn!(
                "CR2 reads 0x{:02X} after writing 0x{:02X} for {}",
                readback, mode, target
            );
            return Err(Error::WriteFailed);
        }
        Ok(())
    }

    /// Read the mode byte of configuration register 2 in the bound protocol
    pub fn read_config_register2(&mut self) -> Result<u8> {
        self.ensure_open()?;
        let set = self.state.command_set();
        let mut txn = Transaction::read(set.config_read_opcode, set.opcode_width, 1)?
            .with_address(CR2_MODE_ADDR, set.address_width)
            .with_dummy_cycles(set.config_read_dummy_cycles);
        self.execute(&mut txn)?;
        Ok(txn.data[0])
    }

    fn write_config_register2(&mut self, value: u8) -> Result<()> {
        let set = self.state.command_set();
        let mut txn = Transaction::write(set.config_write_opcode, set.opcode_width, &[value])?
            .with_address(CR2_MODE_ADDR, set.address_width);
        self.execute(&mut txn)
    }

    /// Reset the device with the reset-enable/reset command pair
    ///
    /// The device comes back in legacy SPI, so the controller is rebound to
    /// it afterwards.
    pub fn software_reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        let set = self.state.command_set();
        debug!("Software reset from {}", self.state.protocol());
        let mut enable = Transaction::command(set.reset_enable_opcode, set.opcode_width);
        self.execute(&mut enable)?;
        let mut reset = Transaction::command(set.reset_opcode, set.opcode_width);
        self.execute(&mut reset)?;
        self.transport.delay_us(RESET_RECOVERY_US);
        self.bind_protocol(LEGACY_PROTOCOL)
    }
}
