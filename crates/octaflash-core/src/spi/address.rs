//! Address width types

/// Address width for flash commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
    /// 4-byte (32-bit) address - supports up to 4 GiB
    FourByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Parse a byte count back into a width
    pub const fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            0 => Some(Self::None),
            3 => Some(Self::ThreeByte),
            4 => Some(Self::FourByte),
            _ => None,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 16 * 1024 * 1024, // 16 MiB
            Self::FourByte => 1 << 32,
        }
    }

    /// Whether `address` can be sent with this width
    pub const fn fits(&self, address: u32) -> bool {
        match self {
            Self::None => address == 0,
            Self::ThreeByte => address <= 0x00FF_FFFF,
            Self::FourByte => true,
        }
    }
}
