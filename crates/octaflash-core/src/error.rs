//! Error types for octaflash-core
//!
//! This module provides a no_std compatible error type shared by the engine,
//! the transports and the block-device shim.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    // Contract errors
    /// A parameter violated the operation's contract (zero length, payload
    /// too large, address outside the device, opcode wider than its width)
    Assertion,

    // Lifecycle errors
    /// The device handle is not open
    NotOpen,
    /// The (unit, channel) pair is already claimed by another handle
    AlreadyOpen,

    // Configuration errors
    /// No command set is registered for the requested protocol
    InvalidMode,

    // Device errors
    /// The device reported write-in-progress before the operation started
    DeviceBusy,
    /// A wait exceeded its time budget
    Timeout,
    /// The device did not accept a write (configuration readback mismatch)
    WriteFailed,
    /// A bulk transfer finished with bytes still outstanding
    TransferAborted,
    /// Bus timing calibration failed
    CalibrateFailed,
}

impl Error {
    /// Whether a caller may reasonably retry the same request
    ///
    /// Only a busy device is transient; everything else is either a contract
    /// violation or a hard I/O failure for that request.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DeviceBusy)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assertion => write!(f, "invalid argument"),
            Self::NotOpen => write!(f, "device is not open"),
            Self::AlreadyOpen => write!(f, "channel is already open"),
            Self::InvalidMode => write!(f, "no command set for protocol"),
            Self::DeviceBusy => write!(f, "device is busy"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::TransferAborted => write!(f, "transfer aborted with bytes remaining"),
            Self::CalibrateFailed => write!(f, "bus calibration failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
