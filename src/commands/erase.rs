//! Erase and erase planning commands

use super::{check_range, progress_bar};
use crate::device::Flash;
use crate::error::CliError;
use octaflash_core::EraseSize;

/// Erase `length` bytes at `address`, or the whole device
pub fn run_erase(flash: &mut Flash, address: u32, length: Option<u32>) -> Result<(), CliError> {
    let total = flash.config().geometry.total_size;
    let length = length.unwrap_or_else(|| total.saturating_sub(address));
    check_range(total, address, length)?;

    let range = flash.plan_erase(address, length)?.aligned_range();
    let pb = progress_bar(u64::from(range.end - range.start), "Erasing")?;
    flash.observer_mut().attach(pb);
    let result = flash.erase(address, length);
    if let Some(pb) = flash.observer_mut().detach() {
        pb.finish_and_clear();
    }
    result?;

    println!(
        "Erased 0x{:08X} - 0x{:08X} ({} bytes)",
        range.start,
        range.end - 1,
        range.end - range.start
    );
    Ok(())
}

/// Print the erase commands `[address, address + length)` decomposes into
pub fn run_plan(flash: &Flash, address: u32, length: u32) -> Result<(), CliError> {
    check_range(flash.config().geometry.total_size, address, length)?;
    let plan = flash.plan_erase(address, length)?;
    let range = plan.aligned_range();
    println!(
        "Request 0x{:08X}+0x{:X} widens to 0x{:08X} - 0x{:08X} in {}",
        address,
        length,
        range.start,
        range.end - 1,
        flash.protocol()
    );

    let mut count = 0;
    for step in plan {
        let kind = match step.size {
            EraseSize::Chip => "chip".to_string(),
            EraseSize::Bytes(size) => format!("{} KiB", size / 1024),
        };
        println!(
            "  op 0x{:04X} at 0x{:08X} ({})",
            step.opcode, step.address, kind
        );
        count += 1;
    }
    println!("{} erase command(s)", count);
    Ok(())
}
