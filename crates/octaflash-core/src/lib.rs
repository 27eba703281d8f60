//! octaflash-core - OSPI NOR flash protocol and transaction engine
//!
//! This crate drives an octal-capable NOR flash chip (MX25UM25645G class)
//! through an xSPI/OSPI controller. It knows which command encodings are
//! valid in each bus protocol, executes short direct transactions, splits
//! program and erase requests into hardware-aligned chunks and switches the
//! device between legacy SPI and octal DDR mode.
//!
//! The controller and its DMA channel are reached through the [`Transport`]
//! trait, so the engine itself is `no_std` and has no hardware dependencies.
//!
//! # Features
//!
//! - `std` - Enable standard library support (serde and TOML configuration
//!   loading, `std::error::Error` for the error type)
//!
//! # Example
//!
//! ```ignore
//! use octaflash_core::{ChannelRegistry, DeviceConfig, OspiFlash, Protocol};
//!
//! fn bring_up<T: octaflash_core::Transport>(transport: T) -> octaflash_core::Result<()> {
//!     let mut registry: ChannelRegistry = ChannelRegistry::new();
//!     let mut flash = OspiFlash::open(transport, DeviceConfig::default(), &mut registry)?;
//!     flash.switch_safe(Protocol::OctalDtr)?;
//!     flash.erase(0x1000, 4096)?;
//!     flash.program(0x1000, b"hello")?;
//!     flash.close(&mut registry)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod block_device;
pub mod command_set;
pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod flash;
pub mod observer;
pub mod registry;
pub mod spi;
pub mod transport;

pub use command_set::{CommandSet, CommandSetTable, EraseCommand, EraseSize};
pub use config::DeviceConfig;
pub use error::{Error, Result};
pub use flash::OspiFlash;
pub use observer::{FlashObserver, FlashStats, NoopObserver};
pub use registry::ChannelRegistry;
pub use spi::Protocol;
pub use transport::Transport;
