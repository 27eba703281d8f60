//! Write command

use super::{check_range, progress_bar};
use crate::device::Flash;
use crate::error::CliError;
use log::info;
use std::fs;
use std::path::Path;

/// Program the contents of `input` at `address`
///
/// With `erase`, the covered sectors are erased first. Unless `verify` is
/// cleared the range is read back and compared.
pub fn run_write(
    flash: &mut Flash,
    address: u32,
    input: &Path,
    erase: bool,
    verify: bool,
) -> Result<(), CliError> {
    let data = fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);
    let len = u32::try_from(data.len())
        .map_err(|_| CliError::Usage(format!("{:?} is larger than the flash", input)))?;
    check_range(flash.config().geometry.total_size, address, len)?;

    if erase {
        let range = flash.plan_erase(address, len)?.aligned_range();
        let pb = progress_bar(u64::from(range.end - range.start), "Erasing")?;
        flash.observer_mut().attach(pb);
        let result = flash.erase(address, len);
        finish(flash);
        result?;
    }

    let pb = progress_bar(u64::from(len), "Writing")?;
    flash.observer_mut().attach(pb);
    let result = flash.program(address, &data);
    finish(flash);
    result?;

    if verify {
        let mut readback = vec![0u8; data.len()];
        flash.read(address, &mut readback)?;
        check_readback(address, &data, &readback)?;
        info!("Verified {} bytes", data.len());
    }
    println!("Wrote {} bytes at 0x{:08X}", data.len(), address);
    Ok(())
}

fn finish(flash: &mut Flash) {
    if let Some(pb) = flash.observer_mut().detach() {
        pb.finish_and_clear();
    }
}

/// Compare what was written with what was read back
fn check_readback(address: u32, expected: &[u8], found: &[u8]) -> Result<(), CliError> {
    match expected.iter().zip(found).position(|(a, b)| a != b) {
        Some(i) => Err(CliError::Verify {
            address: address + i as u32,
            expected: expected[i],
            found: found[i],
        }),
        None => Ok(()),
    }
}
