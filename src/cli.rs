//! CLI argument parsing

use clap::{Parser, Subcommand};
use octaflash_core::Protocol;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "octaflash")]
#[command(author, version, about = "OSPI octal NOR flash console", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device options shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Flash image backing the emulated chip (created on first write)
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    /// Device configuration file (TOML format)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Protocol the device is in when opened [spi, octal-str, octal-dtr]
    #[arg(long, global = true)]
    pub protocol: Option<Protocol>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the JEDEC identification
    Id,

    /// Show the status and mode registers
    Status,

    /// Read flash contents to a file, or hex dump them
    Read {
        /// Start address
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,

        /// Output file path (hex dump to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use 8-byte direct transactions instead of DMA
        #[arg(long)]
        direct: bool,
    },

    /// Write a file to flash
    Write {
        /// Start address
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Erase the covered sectors first
        #[arg(long)]
        erase: bool,

        /// Skip read-back verification
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase a range (widened to whole sectors)
    Erase {
        /// Start address
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes (whole device if omitted)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Show the erase commands a range decomposes into
    Plan {
        /// Start address
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,
    },

    /// Switch the device and controller to another bus protocol
    Switch {
        /// Target protocol [spi, octal-str, octal-dtr]
        protocol: Protocol,
    },

    /// Reset the device back into legacy SPI
    Reset {
        /// Use the reset-enable/reset command pair instead of the reset line
        #[arg(long)]
        software: bool,
    },
}

impl Commands {
    /// Whether the command changes flash contents
    pub fn modifies_flash(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Erase { .. })
    }
}
