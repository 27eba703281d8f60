//! Registry of open (unit, channel) pairs
//!
//! Only one device handle may drive a physical chip-select line at a time.
//! The registry is owned by whoever composes device handles and is passed to
//! [`OspiFlash::open`](crate::OspiFlash::open) and
//! [`OspiFlash::close`](crate::OspiFlash::close).

use crate::config::Channel;
use crate::error::{Error, Result};
use heapless::Vec;
use log::debug;

/// Physical line identifier: controller unit plus chip-select channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    /// Controller unit
    pub unit: u8,
    /// Chip-select channel on that unit
    pub channel: Channel,
}

impl ChannelId {
    /// Create a channel identifier
    pub const fn new(unit: u8, channel: Channel) -> Self {
        Self { unit, channel }
    }
}

/// Set of currently claimed lines
///
/// `N` bounds the number of simultaneously open handles.
#[derive(Debug, Default)]
pub struct ChannelRegistry<const N: usize = 4> {
    open: Vec<ChannelId, N>,
}

impl<const N: usize> ChannelRegistry<N> {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self { open: Vec::new() }
    }

    /// Claim a line
    ///
    /// Returns `AlreadyOpen` if the line is taken, `Assertion` if the registry
    /// is full.
    pub fn claim(&mut self, id: ChannelId) -> Result<()> {
        if self.is_open(id) {
            return Err(Error::AlreadyOpen);
        }
        self.open.push(id).map_err(|_| Error::Assertion)?;
        debug!("Claimed unit {} {:?}", id.unit, id.channel);
        Ok(())
    }

    /// Release a line; returns `NotOpen` if it was not claimed
    pub fn release(&mut self, id: ChannelId) -> Result<()> {
        let pos = self
            .open
            .iter()
            .position(|&open| open == id)
            .ok_or(Error::NotOpen)?;
        self.open.swap_remove(pos);
        debug!("Released unit {} {:?}", id.unit, id.channel);
        Ok(())
    }

    /// Whether a line is claimed
    pub fn is_open(&self, id: ChannelId) -> bool {
        self.open.contains(&id)
    }

    /// Number of claimed lines
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether no line is claimed
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
