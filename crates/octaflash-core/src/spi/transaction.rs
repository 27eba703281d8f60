//! Direct transactions and their command-descriptor encoding

use super::{AddressWidth, OpcodeWidth};
use crate::error::{Error, Result};

/// Largest payload a direct transaction can carry (two 32-bit data words)
pub const MAX_DIRECT_PAYLOAD: usize = 8;

/// Transfer direction, as seen from the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to controller
    Read,
    /// Controller to device (also used for commands without data)
    #[default]
    Write,
}

/// A single short bus command
///
/// Lives on the stack for one call. The payload is sent for writes and
/// filled in for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// Opcode; single-byte opcodes occupy the low byte
    pub opcode: u16,
    /// Number of opcode bytes on the wire
    pub opcode_width: OpcodeWidth,
    /// Address sent after the opcode
    pub address: u32,
    /// Address width (`None` for no address phase)
    pub address_width: AddressWidth,
    /// Dummy cycles between address and data
    pub dummy_cycles: u8,
    /// Transfer direction
    pub direction: Direction,
    /// Payload buffer
    pub data: [u8; MAX_DIRECT_PAYLOAD],
    /// Number of valid payload bytes
    pub data_len: usize,
}

impl Transaction {
    /// Create a command with no address or data (e.g. WREN, RSTEN)
    pub fn command(opcode: u16, opcode_width: OpcodeWidth) -> Self {
        Self {
            opcode,
            opcode_width,
            address: 0,
            address_width: AddressWidth::None,
            dummy_cycles: 0,
            direction: Direction::Write,
            data: [0; MAX_DIRECT_PAYLOAD],
            data_len: 0,
        }
    }

    /// Create a read of `len` bytes (e.g. RDSR, RDID)
    pub fn read(opcode: u16, opcode_width: OpcodeWidth, len: usize) -> Result<Self> {
        if len > MAX_DIRECT_PAYLOAD {
            return Err(Error::Assertion);
        }
        Ok(Self {
            direction: Direction::Read,
            data_len: len,
            ..Self::command(opcode, opcode_width)
        })
    }

    /// Create a write carrying `payload` (e.g. WRCR2)
    pub fn write(opcode: u16, opcode_width: OpcodeWidth, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_DIRECT_PAYLOAD {
            return Err(Error::Assertion);
        }
        let mut txn = Self::command(opcode, opcode_width);
        txn.data[..payload.len()].copy_from_slice(payload);
        txn.data_len = payload.len();
        Ok(txn)
    }

    /// Set the address phase
    pub fn with_address(mut self, address: u32, width: AddressWidth) -> Self {
        self.address = address;
        self.address_width = width;
        self
    }

    /// Set the number of dummy cycles
    pub fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Valid payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.data_len.min(MAX_DIRECT_PAYLOAD)]
    }

    /// Check the transaction against the command buffer limits
    pub fn validate(&self) -> Result<()> {
        if self.data_len > MAX_DIRECT_PAYLOAD
            || !self.opcode_width.fits(self.opcode)
            || !self.address_width.fits(self.address)
            || self.dummy_cycles > CommandDescriptor::MAX_DUMMY_CYCLES
        {
            return Err(Error::Assertion);
        }
        Ok(())
    }

    /// Encode into the controller's command descriptor
    pub fn descriptor(&self) -> Result<CommandDescriptor> {
        self.validate()?;
        Ok(CommandDescriptor::encode(self))
    }

    /// Payload as the little-endian data word pair written to the
    /// controller's data registers
    pub fn data_word(&self) -> u64 {
        u64::from_le_bytes(self.data)
    }

    /// Store a data word read back from the controller
    pub fn set_data_word(&mut self, word: u64) {
        let bytes = word.to_le_bytes();
        let len = self.data_len.min(MAX_DIRECT_PAYLOAD);
        self.data = [0; MAX_DIRECT_PAYLOAD];
        self.data[..len].copy_from_slice(&bytes[..len]);
    }
}

/// Manual-command descriptor register image
///
/// Layout: command size in bits 0-1, address size in bits 2-4, data size in
/// bits 5-8, latency in bits 9-13, transfer type in bit 15 (1 = write) and
/// the command in bits 16-31. Single-byte commands sit in the upper byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandDescriptor(u32);

impl CommandDescriptor {
    const CMDSIZE_POS: u32 = 0;
    const CMDSIZE_MASK: u32 = 0x3;
    const ADDSIZE_POS: u32 = 2;
    const ADDSIZE_MASK: u32 = 0x7;
    const DATASIZE_POS: u32 = 5;
    const DATASIZE_MASK: u32 = 0xF;
    const LATE_POS: u32 = 9;
    const LATE_MASK: u32 = 0x1F;
    const TRTYPE_POS: u32 = 15;
    const CMD_POS: u32 = 16;

    /// Largest latency the descriptor can hold
    pub const MAX_DUMMY_CYCLES: u8 = 31;

    fn encode(txn: &Transaction) -> Self {
        let cmd = match txn.opcode_width {
            OpcodeWidth::One => (u32::from(txn.opcode) & 0xFF) << 24,
            OpcodeWidth::Two => u32::from(txn.opcode) << Self::CMD_POS,
        };
        let trtype = match txn.direction {
            Direction::Read => 0,
            Direction::Write => 1,
        };
        Self(
            ((u32::from(txn.opcode_width.bytes()) & Self::CMDSIZE_MASK) << Self::CMDSIZE_POS)
                | ((u32::from(txn.address_width.bytes()) & Self::ADDSIZE_MASK)
                    << Self::ADDSIZE_POS)
                | ((txn.data_len as u32 & Self::DATASIZE_MASK) << Self::DATASIZE_POS)
                | ((u32::from(txn.dummy_cycles) & Self::LATE_MASK) << Self::LATE_POS)
                | (trtype << Self::TRTYPE_POS)
                | cmd,
        )
    }

    /// Wrap a raw register value
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw register value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Opcode width, `None` for a zero or reserved command size
    pub fn opcode_width(&self) -> Option<OpcodeWidth> {
        match (self.0 >> Self::CMDSIZE_POS) & Self::CMDSIZE_MASK {
            1 => Some(OpcodeWidth::One),
            2 => Some(OpcodeWidth::Two),
            _ => None,
        }
    }

    /// Opcode, with single-byte opcodes moved back to the low byte
    pub fn opcode(&self) -> u16 {
        match self.opcode_width() {
            Some(OpcodeWidth::One) => (self.0 >> 24) as u16,
            _ => (self.0 >> Self::CMD_POS) as u16,
        }
    }

    /// Address width
    pub fn address_width(&self) -> Option<AddressWidth> {
        AddressWidth::from_bytes(((self.0 >> Self::ADDSIZE_POS) & Self::ADDSIZE_MASK) as u8)
    }

    /// Payload length
    pub fn data_len(&self) -> usize {
        ((self.0 >> Self::DATASIZE_POS) & Self::DATASIZE_MASK) as usize
    }

    /// Dummy cycles
    pub fn dummy_cycles(&self) -> u8 {
        ((self.0 >> Self::LATE_POS) & Self::LATE_MASK) as u8
    }

    /// Transfer direction
    pub fn direction(&self) -> Direction {
        if (self.0 >> Self::TRTYPE_POS) & 1 == 1 {
            Direction::Write
        } else {
            Direction::Read
        }
    }
}
