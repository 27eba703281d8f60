//! Read command

use super::{check_range, progress_bar};
use crate::device::Flash;
use crate::error::CliError;
use std::fs;
use std::path::Path;

/// Bytes per bulk transfer, so the progress bar moves
const READ_CHUNK: usize = 64 * 1024;

/// Read `length` bytes at `address`
///
/// Writes them to `output`, or prints a hex dump if no output is given.
/// `direct` uses 8-byte controller transactions instead of DMA.
pub fn run_read(
    flash: &mut Flash,
    address: u32,
    length: u32,
    output: Option<&Path>,
    direct: bool,
) -> Result<(), CliError> {
    check_range(flash.config().geometry.total_size, address, length)?;
    let mut data = vec![0u8; length as usize];

    if direct {
        flash.direct_read(address, &mut data)?;
    } else {
        let pb = progress_bar(u64::from(length), "Reading")?;
        let mut cursor = address;
        for chunk in data.chunks_mut(READ_CHUNK) {
            flash.read(cursor, chunk)?;
            cursor += chunk.len() as u32;
            pb.inc(chunk.len() as u64);
        }
        pb.finish_and_clear();
    }

    match output {
        Some(path) => {
            fs::write(path, &data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => print!("{}", hexdump(address, &data)),
    }
    Ok(())
}

/// Format `data` as 16-byte lines prefixed by their address
fn hexdump(address: u32, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:08X}  {:<47}  |{}|\n",
            address as usize + i * 16,
            hex.join(" "),
            ascii
        ));
    }
    out
}
