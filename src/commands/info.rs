//! Identification and status

use crate::device::Flash;
use crate::error::CliError;
use octaflash_core::spi::opcodes::CR2_MODE_MASK;
use octaflash_core::spi::StatusFlags;
use octaflash_core::Protocol;

/// Print the JEDEC identification
pub fn run_id(flash: &mut Flash) -> Result<(), CliError> {
    let mut id = [0u8; 3];
    flash.read_id(&mut id)?;
    println!(
        "JEDEC ID: {:02X} {:02X} {:02X} (in {})",
        id[0],
        id[1],
        id[2],
        flash.protocol()
    );
    let geometry = &flash.config().geometry;
    println!(
        "Flash size: {} bytes ({} KiB)",
        geometry.total_size,
        geometry.total_size / 1024
    );
    Ok(())
}

/// Print the status register and the protocol configuration register
pub fn run_status(flash: &mut Flash) -> Result<(), CliError> {
    let status = flash.read_status()?;
    let cr2 = flash.read_config_register2()?;

    println!("Status register: 0x{:02X}", status.bits());
    println!(
        "  WIP: {}",
        if status.contains(StatusFlags::WIP) { "busy" } else { "idle" }
    );
    println!("  WEL: {}", status.contains(StatusFlags::WEL));
    println!("  BP:  0x{:X}", (status & StatusFlags::BP).bits() >> 2);

    let mode = cr2 & CR2_MODE_MASK;
    match Protocol::from_cr2_mode(mode) {
        Some(protocol) => println!("CR2 mode: 0x{:02X} ({})", mode, protocol),
        None => println!("CR2 mode: 0x{:02X} (reserved)", mode),
    }
    println!("Controller protocol: {}", flash.protocol());
    Ok(())
}
