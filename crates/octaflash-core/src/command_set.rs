//! Per-protocol command sets
//!
//! A [`CommandSet`] lists the opcodes, widths and dummy-cycle counts that are
//! valid in one bus protocol. The [`CommandSetTable`] maps protocols to
//! command sets and is read-only once built.

use crate::error::{Error, Result};
use crate::spi::{opcodes, AddressWidth, OpcodeWidth, Protocol};

/// Span covered by one erase command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EraseSize {
    /// Erases this many bytes at an aligned address
    Bytes(u32),
    /// Erases the whole device; sent without an address
    Chip,
}

impl EraseSize {
    /// Bytes erased, with chip erase resolved against `total_size`
    pub const fn span(&self, total_size: u32) -> u32 {
        match self {
            Self::Bytes(size) => *size,
            Self::Chip => total_size,
        }
    }
}

/// One erase operation a command set supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EraseCommand {
    /// Opcode
    pub opcode: u16,
    /// Span
    pub size: EraseSize,
}

impl EraseCommand {
    /// Create a sized erase command
    pub const fn sized(opcode: u16, size: u32) -> Self {
        Self {
            opcode,
            size: EraseSize::Bytes(size),
        }
    }

    /// Create a chip erase command
    pub const fn chip(opcode: u16) -> Self {
        Self {
            opcode,
            size: EraseSize::Chip,
        }
    }
}

/// Latency (dummy cycle) handling on the controller side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LatencyMode {
    /// Dummy cycles are always inserted
    #[default]
    Fixed,
    /// Device signals extra latency on the data strobe
    Variable,
}

/// Opcodes and phase widths valid in one protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSet {
    /// Protocol this set belongs to
    pub protocol: Protocol,
    /// Opcode width for every command in the set
    pub opcode_width: OpcodeWidth,
    /// Address width for array commands
    pub address_width: AddressWidth,
    /// Controller latency mode
    pub latency_mode: LatencyMode,

    /// Array read opcode
    pub read_opcode: u16,
    /// Dummy cycles for array reads
    pub read_dummy_cycles: u8,
    /// Page program opcode
    pub program_opcode: u16,
    /// Dummy cycles for page program
    pub program_dummy_cycles: u8,
    /// Write enable opcode
    pub write_enable_opcode: u16,

    /// Status register read opcode
    pub status_opcode: u16,
    /// Dummy cycles for status reads
    pub status_dummy_cycles: u8,
    /// Whether status reads carry an address phase
    pub status_needs_address: bool,
    /// Address sent with status reads
    pub status_address: u32,

    /// Read identification opcode
    pub read_id_opcode: u16,
    /// Dummy cycles for read identification
    pub read_id_dummy_cycles: u8,
    /// Whether read identification carries an address phase
    pub read_id_needs_address: bool,

    /// Configuration register 2 read opcode
    pub config_read_opcode: u16,
    /// Dummy cycles for configuration register 2 reads
    pub config_read_dummy_cycles: u8,
    /// Configuration register 2 write opcode
    pub config_write_opcode: u16,

    /// Reset enable opcode
    pub reset_enable_opcode: u16,
    /// Reset opcode
    pub reset_opcode: u16,

    /// Supported erase operations
    pub erase_commands: &'static [EraseCommand],
}

impl CommandSet {
    /// Smallest erase span, if any sized erase exists
    pub fn min_erase_size(&self) -> Option<u32> {
        self.erase_commands
            .iter()
            .filter_map(|cmd| match cmd.size {
                EraseSize::Bytes(size) => Some(size),
                EraseSize::Chip => None,
            })
            .min()
    }

    /// Chip erase opcode, if the set has one
    pub fn chip_erase_opcode(&self) -> Option<u16> {
        self.erase_commands
            .iter()
            .find(|cmd| cmd.size == EraseSize::Chip)
            .map(|cmd| cmd.opcode)
    }

    /// Address width used by status reads
    pub fn status_address_width(&self) -> AddressWidth {
        if self.status_needs_address {
            self.address_width
        } else {
            AddressWidth::None
        }
    }
}

// ============================================================================
// MX25UM25645G
// ============================================================================

/// 4 KiB sector
pub const MX25UM_SECTOR_SIZE: u32 = 4 * 1024;
/// 64 KiB block
pub const MX25UM_BLOCK_SIZE: u32 = 64 * 1024;

const MX25UM_SPI_ERASES: [EraseCommand; 3] = [
    EraseCommand::sized(opcodes::SE4B, MX25UM_SECTOR_SIZE),
    EraseCommand::sized(opcodes::BE4B, MX25UM_BLOCK_SIZE),
    EraseCommand::chip(opcodes::CE),
];

const MX25UM_OPI_ERASES: [EraseCommand; 3] = [
    EraseCommand::sized(opcodes::OPI_SE4B, MX25UM_SECTOR_SIZE),
    EraseCommand::sized(opcodes::OPI_BE4B, MX25UM_BLOCK_SIZE),
    EraseCommand::chip(opcodes::OPI_CE),
];

/// MX25UM25645G in 1S-1S-1S mode
pub const MX25UM_SPI: CommandSet = CommandSet {
    protocol: Protocol::Spi,
    opcode_width: OpcodeWidth::One,
    address_width: AddressWidth::FourByte,
    latency_mode: LatencyMode::Fixed,
    read_opcode: opcodes::FAST_READ4B,
    read_dummy_cycles: 8,
    program_opcode: opcodes::PP4B,
    program_dummy_cycles: 0,
    write_enable_opcode: opcodes::WREN,
    status_opcode: opcodes::RDSR,
    status_dummy_cycles: 0,
    status_needs_address: false,
    status_address: 0,
    read_id_opcode: opcodes::RDID,
    read_id_dummy_cycles: 0,
    read_id_needs_address: false,
    config_read_opcode: opcodes::RDCR2,
    config_read_dummy_cycles: 0,
    config_write_opcode: opcodes::WRCR2,
    reset_enable_opcode: opcodes::RSTEN,
    reset_opcode: opcodes::RST,
    erase_commands: &MX25UM_SPI_ERASES,
};

/// MX25UM25645G in 8D-8D-8D mode
pub const MX25UM_OCTAL_DTR: CommandSet = CommandSet {
    protocol: Protocol::OctalDtr,
    opcode_width: OpcodeWidth::Two,
    address_width: AddressWidth::FourByte,
    latency_mode: LatencyMode::Fixed,
    read_opcode: opcodes::OPI_8READ_DTR,
    read_dummy_cycles: 20,
    program_opcode: opcodes::OPI_PP4B,
    program_dummy_cycles: 0,
    write_enable_opcode: opcodes::OPI_WREN,
    status_opcode: opcodes::OPI_RDSR,
    status_dummy_cycles: 4,
    status_needs_address: true,
    status_address: opcodes::STATUS_ADDR,
    read_id_opcode: opcodes::OPI_RDID,
    read_id_dummy_cycles: 4,
    read_id_needs_address: true,
    config_read_opcode: opcodes::OPI_RDCR2,
    config_read_dummy_cycles: 4,
    config_write_opcode: opcodes::OPI_WRCR2,
    reset_enable_opcode: opcodes::OPI_RSTEN,
    reset_opcode: opcodes::OPI_RST,
    erase_commands: &MX25UM_OPI_ERASES,
};

const MX25UM_SETS: [CommandSet; 2] = [MX25UM_SPI, MX25UM_OCTAL_DTR];

/// Protocol to command set mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSetTable {
    sets: &'static [CommandSet],
}

impl CommandSetTable {
    /// Default table for the MX25UM25645G: legacy SPI and octal DTR
    pub const MX25UM25645G: CommandSetTable = CommandSetTable { sets: &MX25UM_SETS };

    /// Build a table from a static list of command sets
    ///
    /// Returns `Assertion` if two sets claim the same protocol.
    pub fn new(sets: &'static [CommandSet]) -> Result<Self> {
        for (i, set) in sets.iter().enumerate() {
            if sets[..i].iter().any(|other| other.protocol == set.protocol) {
                return Err(Error::Assertion);
            }
        }
        Ok(Self { sets })
    }

    /// Find the command set for `protocol`
    pub fn lookup(&self, protocol: Protocol) -> Result<&'static CommandSet> {
        self.sets
            .iter()
            .find(|set| set.protocol == protocol)
            .ok_or(Error::InvalidMode)
    }

    /// Whether a command set exists for `protocol`
    pub fn supports(&self, protocol: Protocol) -> bool {
        self.lookup(protocol).is_ok()
    }

    /// All registered command sets
    pub fn sets(&self) -> &'static [CommandSet] {
        self.sets
    }
}

impl Default for CommandSetTable {
    fn default() -> Self {
        Self::MX25UM25645G
    }
}
