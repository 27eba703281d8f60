//! Controller register images and the bound protocol state
//!
//! [`encode_config`] turns a command set into the per-line register values
//! the controller needs (protocol mode, address size, memory-mapped read and
//! write commands). It is pure so it can be checked without hardware.
//! [`ProtocolState`] keeps track of which protocol and command set are
//! currently bound and pushes new images through the transport.

use crate::command_set::{CommandSet, CommandSetTable, LatencyMode};
use crate::config::Channel;
use crate::error::Result;
use crate::spi::{AddressWidth, OpcodeWidth, Protocol};
use crate::transport::Transport;
use log::debug;

// LIOCFGCS: line I/O configuration
const LIOCFG_PRTMD_MASK: u32 = 0x3FF;
const LIOCFG_LATEMD_POS: u32 = 10;

// CMCFG0: address size and address replacement
const CMCFG0_ADDSIZE_POS: u32 = 2;
const CMCFG0_ADDRPEN_POS: u32 = 16;
/// Upper address nybble carrying the memory-mapped window offset
const ADDRESS_MSB_MASK: u32 = 0xF0;

// CMCFG1/CMCFG2: memory-mapped read and write command
const CMCFG_CMD_MASK: u32 = 0xFFFF;
const CMCFG_LATE_POS: u32 = 16;
const CMCFG_LATE_MASK: u32 = 0x1F;

/// Register values for one chip-select line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConfigRegisterImage {
    /// Protocol mode and latency mode
    pub liocfg: u32,
    /// Address size and address replacement
    pub cmcfg0: u32,
    /// Memory-mapped read command and its dummy cycles
    pub cmcfg1: u32,
    /// Memory-mapped write command and its dummy cycles
    pub cmcfg2: u32,
}

impl ConfigRegisterImage {
    /// Protocol selected by the protocol-mode field
    pub fn protocol(&self) -> Option<Protocol> {
        Protocol::from_mode_bits(self.liocfg & LIOCFG_PRTMD_MASK)
    }

    /// Memory-mapped read command, as it appears on the wire
    pub fn read_command(&self) -> u16 {
        (self.cmcfg1 & CMCFG_CMD_MASK) as u16
    }

    /// Memory-mapped write command, as it appears on the wire
    pub fn write_command(&self) -> u16 {
        (self.cmcfg2 & CMCFG_CMD_MASK) as u16
    }

    /// Dummy cycles for memory-mapped reads
    pub fn read_dummy_cycles(&self) -> u8 {
        ((self.cmcfg1 >> CMCFG_LATE_POS) & CMCFG_LATE_MASK) as u8
    }
}

/// Place an opcode in a 16-bit command field; single-byte opcodes go to the
/// upper byte
fn command_field(opcode: u16, width: OpcodeWidth) -> u32 {
    match width {
        OpcodeWidth::One => (u32::from(opcode) & 0xFF) << 8,
        OpcodeWidth::Two => u32::from(opcode),
    }
}

/// Address size field: byte count minus one, zero when there is no address
fn address_size_field(width: AddressWidth) -> u32 {
    u32::from(width.bytes().saturating_sub(1))
}

/// Compute the controller register image for `set` in `protocol`
pub fn encode_config(set: &CommandSet, protocol: Protocol) -> ConfigRegisterImage {
    let latency = match set.latency_mode {
        LatencyMode::Fixed => 0,
        LatencyMode::Variable => 1,
    };
    let liocfg = (protocol.mode_bits() & LIOCFG_PRTMD_MASK) | (latency << LIOCFG_LATEMD_POS);

    let mut cmcfg0 = address_size_field(set.address_width) << CMCFG0_ADDSIZE_POS;
    // Mask off the window offset so only chip-relative addresses go out
    if set.address_width == AddressWidth::FourByte {
        cmcfg0 |= ADDRESS_MSB_MASK << CMCFG0_ADDRPEN_POS;
    }

    let cmcfg1 = command_field(set.read_opcode, set.opcode_width)
        | ((u32::from(set.read_dummy_cycles) & CMCFG_LATE_MASK) << CMCFG_LATE_POS);
    let cmcfg2 = command_field(set.program_opcode, set.opcode_width)
        | ((u32::from(set.program_dummy_cycles) & CMCFG_LATE_MASK) << CMCFG_LATE_POS);

    ConfigRegisterImage {
        liocfg,
        cmcfg0,
        cmcfg1,
        cmcfg2,
    }
}

/// Active protocol and its command set
#[derive(Debug, Clone, Copy)]
pub struct ProtocolState {
    table: CommandSetTable,
    protocol: Protocol,
    command_set: &'static CommandSet,
}

impl ProtocolState {
    /// Create state for `protocol` without touching hardware
    ///
    /// Fails with `InvalidMode` if the table has no set for `protocol`.
    pub fn new(table: CommandSetTable, protocol: Protocol) -> Result<Self> {
        let command_set = table.lookup(protocol)?;
        Ok(Self {
            table,
            protocol,
            command_set,
        })
    }

    /// Bind `protocol`: program the controller and remember the command set
    ///
    /// On any failure the previous binding stays in place.
    pub fn bind<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        channel: Channel,
        protocol: Protocol,
    ) -> Result<()> {
        let command_set = self.table.lookup(protocol)?;
        let image = encode_config(command_set, protocol);
        debug!(
            "Binding {} on {:?}: liocfg=0x{:08X} cmcfg0=0x{:08X} cmcfg1=0x{:08X} cmcfg2=0x{:08X}",
            protocol, channel, image.liocfg, image.cmcfg0, image.cmcfg1, image.cmcfg2
        );
        transport.write_config(channel, &image)?;
        self.protocol = protocol;
        self.command_set = command_set;
        Ok(())
    }

    /// Active protocol and command set
    pub fn current(&self) -> (Protocol, &'static CommandSet) {
        (self.protocol, self.command_set)
    }

    /// Active protocol
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Active command set
    pub fn command_set(&self) -> &'static CommandSet {
        self.command_set
    }

    /// Table used for lookups
    pub fn table(&self) -> &CommandSetTable {
        &self.table
    }
}
