//! Device session over the emulated controller
//!
//! Builds the device configuration (defaults, optional TOML file, command
//! line overrides), backs the emulated chip with an optional image file and
//! opens the flash handle.

use crate::cli::DeviceArgs;
use crate::error::CliError;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use octaflash_core::observer::WaitKind;
use octaflash_core::spi::Transaction;
use octaflash_core::{
    ChannelRegistry, CommandSetTable, DeviceConfig, EraseSize, FlashObserver, FlashStats,
    OspiFlash, Protocol,
};
use octaflash_emu::{EmulatedFlash, EmulatorConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Flash handle used by the commands
pub type Flash = OspiFlash<EmulatedFlash, ProgressObserver>;

/// Collects statistics and drives an optional progress bar
#[derive(Default)]
pub struct ProgressObserver {
    stats: FlashStats,
    bar: Option<ProgressBar>,
}

impl ProgressObserver {
    /// Advance `bar` as program blocks and erase spans complete
    pub fn attach(&mut self, bar: ProgressBar) {
        self.bar = Some(bar);
    }

    /// Detach the progress bar
    pub fn detach(&mut self) -> Option<ProgressBar> {
        self.bar.take()
    }

    /// Counters collected so far
    pub fn stats(&self) -> &FlashStats {
        &self.stats
    }

    fn advance(&self, bytes: u32) {
        if let Some(bar) = &self.bar {
            bar.inc(u64::from(bytes));
        }
    }
}

impl FlashObserver for ProgressObserver {
    fn transaction(&mut self, txn: &Transaction) {
        self.stats.transaction(txn);
    }

    fn program_block(&mut self, address: u32, len: u32) {
        self.stats.program_block(address, len);
        self.advance(len);
    }

    fn erase_span(&mut self, address: u32, size: EraseSize, bytes: u32) {
        self.stats.erase_span(address, size, bytes);
        self.advance(bytes);
    }

    fn waited(&mut self, kind: WaitKind, elapsed_us: u64, ok: bool) {
        self.stats.waited(kind, elapsed_us, ok);
    }

    fn protocol_bound(&mut self, protocol: Protocol) {
        debug!("Controller bound to {}", protocol);
        self.stats.protocol_bound(protocol);
    }
}

/// Load the device configuration
fn load_config(args: &DeviceArgs) -> Result<DeviceConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let config = DeviceConfig::from_toml_str(&text)?;
            info!("Loaded device configuration from {:?}", path);
            config
        }
        None => DeviceConfig::mx25um25645g(),
    };
    if let Some(protocol) = args.protocol {
        config.protocol = protocol;
    }
    config.validate()?;
    Ok(config)
}

/// Build the emulated chip, pre-filled from `image` if it exists
fn load_emulator(config: &DeviceConfig, image: Option<&Path>) -> Result<EmulatedFlash, CliError> {
    let geometry = &config.geometry;
    let emu_config = EmulatorConfig {
        size: geometry.total_size as usize,
        page_size: geometry.page_size as usize,
        sector_size: geometry.sector_size as usize,
        block_size: geometry.block_size as usize,
        ..EmulatorConfig::default()
    };

    let mut emu = match image {
        Some(path) if path.exists() => {
            let data = fs::read(path)?;
            if data.len() != emu_config.size {
                warn!(
                    "Image {:?} is {} bytes, device is {} bytes",
                    path,
                    data.len(),
                    emu_config.size
                );
            }
            EmulatedFlash::with_data(emu_config, &data)
        }
        _ => EmulatedFlash::new(emu_config),
    };
    // The chip is assumed to already be in the protocol it is opened in
    emu.force_protocol(config.protocol);
    Ok(emu)
}

/// An open device plus the bookkeeping needed to close it
pub struct Session {
    /// The flash handle
    pub flash: Flash,
    registry: ChannelRegistry,
    image: Option<PathBuf>,
}

impl Session {
    /// Open the device described by `args`
    pub fn open(args: &DeviceArgs) -> Result<Self, CliError> {
        let config = load_config(args)?;
        let emu = load_emulator(&config, args.image.as_deref())?;
        let mut registry = ChannelRegistry::new();
        let flash = OspiFlash::open_with(
            emu,
            config,
            CommandSetTable::default(),
            ProgressObserver::default(),
            &mut registry,
        )?;
        Ok(Self {
            flash,
            registry,
            image: args.image.clone(),
        })
    }

    /// Close the device, saving the image if `persist` is set
    pub fn close(mut self, persist: bool) -> Result<FlashStats, CliError> {
        let stats = *self.flash.observer().stats();
        self.flash.close(&mut self.registry)?;
        if persist {
            if let Some(path) = &self.image {
                fs::write(path, self.flash.transport().data())?;
                info!("Saved image to {:?}", path);
            }
        }
        Ok(stats)
    }
}
