//! Protocol switching and reset

use crate::device::Flash;
use crate::error::CliError;
use octaflash_core::flash::LEGACY_PROTOCOL;
use octaflash_core::Protocol;

/// Move the device and controller to `target`
pub fn run_switch(flash: &mut Flash, target: Protocol) -> Result<(), CliError> {
    let from = flash.protocol();
    flash.switch_safe(target)?;
    println!("Switched {} -> {}", from, flash.protocol());
    Ok(())
}

/// Reset the device into legacy SPI and rebind the controller
pub fn run_reset(flash: &mut Flash, software: bool) -> Result<(), CliError> {
    if software {
        flash.software_reset()?;
    } else {
        flash.hardware_reset()?;
        flash.protocol_set(LEGACY_PROTOCOL)?;
    }
    println!(
        "{} reset, controller in {}",
        if software { "Software" } else { "Hardware" },
        flash.protocol()
    );
    Ok(())
}
