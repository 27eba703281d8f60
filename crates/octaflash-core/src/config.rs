//! Device configuration
//!
//! Geometry, timing and wait budgets for one flash device. Defaults describe
//! an MX25UM25645G on chip-select 1 starting in legacy SPI mode. With the
//! `std` feature every type can be (de)serialized and a whole
//! [`DeviceConfig`] can be loaded from TOML:
//!
//! ```toml
//! unit = 0
//! channel = "cs1"
//! protocol = "spi"
//! prefetch = true
//! wait_strategy = "periodic"
//!
//! [geometry]
//! total_size = 33554432
//! page_size = 256
//! program_block_size = 64
//! sector_size = 4096
//! block_size = 65536
//!
//! [timeouts]
//! erase_us = 5000000
//! ```

use crate::command_set::{MX25UM_BLOCK_SIZE, MX25UM_SECTOR_SIZE};
use crate::error::{Error, Result};
use crate::spi::Protocol;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest supported program block
pub const MAX_PROGRAM_BLOCK: usize = 256;

/// Chip-select line on a controller unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Channel {
    /// Chip select 0
    Cs0,
    /// Chip select 1
    #[default]
    Cs1,
}

impl Channel {
    /// Line index
    pub const fn index(&self) -> usize {
        match self {
            Self::Cs0 => 0,
            Self::Cs1 => 1,
        }
    }
}

/// Flash array geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlashGeometry {
    /// Device size in bytes
    pub total_size: u32,
    /// Page program size
    pub page_size: u32,
    /// Unit moved by one bulk program transfer
    pub program_block_size: u32,
    /// Smallest erase unit
    pub sector_size: u32,
    /// Large erase unit
    pub block_size: u32,
}

impl FlashGeometry {
    /// MX25UM25645G: 32 MiB, 256-byte pages, 4 KiB sectors, 64 KiB blocks
    pub const MX25UM25645G: FlashGeometry = FlashGeometry {
        total_size: 32 * 1024 * 1024,
        page_size: 256,
        program_block_size: 64,
        sector_size: MX25UM_SECTOR_SIZE,
        block_size: MX25UM_BLOCK_SIZE,
    };

    /// Whether `[address, address + len)` lies inside the device
    pub fn contains(&self, address: u32, len: usize) -> bool {
        (address as u64) + (len as u64) <= self.total_size as u64
    }

    fn validate(&self) -> Result<()> {
        let sizes = [
            self.total_size,
            self.page_size,
            self.program_block_size,
            self.sector_size,
            self.block_size,
        ];
        if sizes.iter().any(|size| !size.is_power_of_two())
            || self.program_block_size > self.page_size
            || self.program_block_size as usize > MAX_PROGRAM_BLOCK
            || self.sector_size > self.block_size
            || self.block_size > self.total_size
        {
            return Err(Error::Assertion);
        }
        Ok(())
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self::MX25UM25645G
    }
}

/// Time budgets for the blocking waits, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Timeouts {
    /// Waiting for the write enable latch
    pub write_enable_us: u32,
    /// Waiting for one program block to finish
    pub program_us: u32,
    /// Waiting for one sector or block erase to finish
    pub erase_us: u32,
    /// Waiting for a chip erase to finish
    pub chip_erase_us: u32,
    /// Waiting for a bulk DMA transfer to signal completion
    pub transfer_us: u32,
    /// Delay between software status polls
    pub poll_step_us: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write_enable_us: 10_000,
            program_us: 1_000_000,
            erase_us: 5_000_000,
            chip_erase_us: 300_000_000,
            transfer_us: 100_000,
            poll_step_us: 100,
        }
    }
}

/// Hardware periodic status polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PeriodicPoll {
    /// Interval between automatic status reads
    pub interval_us: u32,
    /// Automatic status reads before the controller gives up
    pub max_count: u32,
}

impl Default for PeriodicPoll {
    fn default() -> Self {
        Self {
            interval_us: 1_000,
            max_count: 4_096,
        }
    }
}

/// How the engine waits for write-enable and write/erase completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WaitStrategy {
    /// Let the controller poll status and raise a completion signal, with
    /// software polling as fallback
    #[default]
    Periodic,
    /// Software status polling only
    Direct,
}

/// Per-line bus timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingSettings {
    /// Minimum clocks between two commands
    pub command_interval: u8,
    /// Extra clocks before chip select is asserted
    pub cs_pulldown_lead: bool,
    /// Extra clocks after chip select is released
    pub cs_pullup_lag: bool,
    /// SDR output drive timing (false = falling edge)
    pub sdr_drive_rising: bool,
    /// SDR input sampling edge
    pub sdr_sampling_rising: bool,
    /// SDR input sampling delay in clocks
    pub sdr_sampling_delay: u8,
    /// DDR sampling window extension in clocks
    pub ddr_sampling_extension: u8,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            command_interval: 2,
            cs_pulldown_lead: false,
            cs_pullup_lag: false,
            sdr_drive_rising: false,
            sdr_sampling_rising: false,
            sdr_sampling_delay: 0,
            ddr_sampling_extension: 0,
        }
    }
}

/// Everything needed to open a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Controller unit
    pub unit: u8,
    /// Chip-select channel
    pub channel: Channel,
    /// Protocol bound at open
    pub protocol: Protocol,
    /// Array geometry
    pub geometry: FlashGeometry,
    /// Wait budgets
    pub timeouts: Timeouts,
    /// Hardware polling parameters
    pub periodic_poll: PeriodicPoll,
    /// Bus timing
    pub timing: TimingSettings,
    /// Whether the memory-mapped read prefetch buffer is enabled
    pub prefetch: bool,
    /// Wait strategy
    pub wait_strategy: WaitStrategy,
}

impl DeviceConfig {
    /// MX25UM25645G defaults
    pub fn mx25um25645g() -> Self {
        Self {
            unit: 0,
            channel: Channel::Cs1,
            protocol: Protocol::Spi,
            geometry: FlashGeometry::MX25UM25645G,
            timeouts: Timeouts::default(),
            periodic_poll: PeriodicPoll::default(),
            timing: TimingSettings::default(),
            prefetch: true,
            wait_strategy: WaitStrategy::Periodic,
        }
    }

    /// Check that the geometry is self-consistent
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        if self.timeouts.poll_step_us == 0 {
            return Err(Error::Assertion);
        }
        Ok(())
    }

    /// Parse a TOML document; missing fields take their defaults
    #[cfg(feature = "std")]
    pub fn from_toml_str(s: &str) -> core::result::Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::mx25um25645g()
    }
}
