//! Command implementations

pub mod erase;
pub mod info;
pub mod read;
pub mod switch;
pub mod write;

use crate::error::CliError;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a byte progress bar labelled with `phase`
pub(crate) fn progress_bar(total: u64, phase: &str) -> Result<ProgressBar, CliError> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Reject a range that does not fit the device
pub(crate) fn check_range(total_size: u32, address: u32, len: u32) -> Result<(), CliError> {
    if len == 0 {
        return Err(CliError::Usage("length must not be zero".into()));
    }
    if u64::from(address) + u64::from(len) > u64::from(total_size) {
        return Err(CliError::Usage(format!(
            "range 0x{:08X}+0x{:X} exceeds flash size 0x{:X}",
            address, len, total_size
        )));
    }
    Ok(())
}
