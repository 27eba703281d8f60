//! Bus protocols and status register bits

use bitflags::bitflags;
use core::fmt;
use core::str::FromStr;

/// Bus protocol (command-address-data line usage and transfer rate)
///
/// The mode bits follow the controller's protocol-mode field layout:
/// command width in bits 0-1, address width in bits 2-3, data width in
/// bits 4-5 (0 = 1 line, 3 = 8 lines), DDR flags for command, address and
/// data in bits 6-8 and data strobe usage in bit 9.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Protocol {
    /// 1S-1S-1S legacy single-wire SPI
    #[default]
    Spi,
    /// 8S-8S-8S octal, single transfer rate
    OctalStr,
    /// 8D-8D-8D octal, double transfer rate with data strobe
    OctalDtr,
}

impl Protocol {
    /// All protocols, legacy first
    pub const ALL: [Protocol; 3] = [Protocol::Spi, Protocol::OctalStr, Protocol::OctalDtr];

    /// Controller protocol-mode field value
    pub const fn mode_bits(&self) -> u32 {
        match self {
            Self::Spi => 0x000,
            Self::OctalStr => 0x03F,
            Self::OctalDtr => 0x3FF,
        }
    }

    /// Reverse of [`Protocol::mode_bits`]
    pub const fn from_mode_bits(bits: u32) -> Option<Self> {
        match bits {
            0x000 => Some(Self::Spi),
            0x03F => Some(Self::OctalStr),
            0x3FF => Some(Self::OctalDtr),
            _ => None,
        }
    }

    /// The protocol the device falls back to after a hardware reset
    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::Spi)
    }

    /// Whether the protocol uses double transfer rate
    pub const fn is_dtr(&self) -> bool {
        matches!(self, Self::OctalDtr)
    }

    /// Whether reads are latched on the device's data strobe
    pub const fn uses_data_strobe(&self) -> bool {
        self.mode_bits() & 0x200 != 0
    }

    /// Value of the device's configuration register 2 mode field that
    /// selects this protocol
    pub const fn cr2_mode(&self) -> u8 {
        match self {
            Self::Spi => 0x00,
            Self::OctalStr => 0x01,
            Self::OctalDtr => 0x02,
        }
    }

    /// Reverse of [`Protocol::cr2_mode`]; reserved encodings map to `None`
    pub const fn from_cr2_mode(value: u8) -> Option<Self> {
        match value & 0x03 {
            0x00 => Some(Self::Spi),
            0x01 => Some(Self::OctalStr),
            0x02 => Some(Self::OctalDtr),
            _ => None,
        }
    }

    /// Short label, e.g. "8D-8D-8D"
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Spi => "1S-1S-1S",
            Self::OctalStr => "8S-8S-8S",
            Self::OctalDtr => "8D-8D-8D",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Protocol {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("spi") || s.eq_ignore_ascii_case("1s-1s-1s") {
            Ok(Self::Spi)
        } else if s.eq_ignore_ascii_case("octal-str") || s.eq_ignore_ascii_case("8s-8s-8s") {
            Ok(Self::OctalStr)
        } else if s.eq_ignore_ascii_case("octal-dtr")
            || s.eq_ignore_ascii_case("opi")
            || s.eq_ignore_ascii_case("8d-8d-8d")
        {
            Ok(Self::OctalDtr)
        } else {
            Err(crate::Error::InvalidMode)
        }
    }
}

/// Opcode width of a command set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OpcodeWidth {
    /// Single opcode byte (legacy SPI)
    #[default]
    One,
    /// Opcode followed by its extension byte (octal modes)
    Two,
}

impl OpcodeWidth {
    /// Number of opcode bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Whether `opcode` can be sent with this width
    pub const fn fits(&self, opcode: u16) -> bool {
        match self {
            Self::One => opcode <= 0xFF,
            Self::Two => true,
        }
    }
}

bitflags! {
    /// Status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// Write or erase in progress
        const WIP = 1 << 0;
        /// Write enable latch set
        const WEL = 1 << 1;
        /// Block protect bits
        const BP = 0b0011_1100;
    }
}
