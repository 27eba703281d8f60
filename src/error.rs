//! CLI error type

use thiserror::Error;

/// Errors raised while setting up or running a command
#[derive(Debug, Error)]
pub enum CliError {
    /// The flash engine failed
    #[error("flash error: {0}")]
    Flash(#[from] octaflash_core::Error),

    /// Image or data file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device configuration file is malformed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Read-back differs from what was written
    #[error("verification failed at 0x{address:08X}: expected 0x{expected:02X}, found 0x{found:02X}")]
    Verify {
        /// First differing address
        address: u32,
        /// Byte written
        expected: u8,
        /// Byte read back
        found: u8,
    },

    /// A progress bar template did not parse
    #[error("progress template: {0}")]
    Template(#[from] indicatif::style::TemplateError),

    /// Arguments do not fit the device
    #[error("{0}")]
    Usage(String),
}
