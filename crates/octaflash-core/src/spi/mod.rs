//! SPI/OSPI types and command structures
//!
//! This module provides the bus protocol identifiers, address widths,
//! MX25UM opcodes and the direct transaction type.

mod address;
pub mod opcodes;
mod protocol;
mod transaction;

pub use address::AddressWidth;
pub use protocol::{OpcodeWidth, Protocol, StatusFlags};
pub use transaction::{CommandDescriptor, Direction, Transaction, MAX_DIRECT_PAYLOAD};
