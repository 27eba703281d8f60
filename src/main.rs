//! octaflash - console for an octal NOR flash behind an OSPI controller
//!
//! Drives an MX25UM25645G through the `octaflash-core` engine. The chip and
//! controller are emulated in memory by `octaflash-emu`, optionally backed
//! by an image file so contents persist between runs.

mod cli;
mod commands;
mod device;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use device::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let persist = cli.command.modifies_flash();
    let mut session = Session::open(&cli.device)?;
    let flash = &mut session.flash;

    let result = match cli.command {
        Commands::Id => commands::info::run_id(flash),
        Commands::Status => commands::info::run_status(flash),
        Commands::Read {
            address,
            length,
            output,
            direct,
        } => commands::read::run_read(flash, address, length, output.as_deref(), direct),
        Commands::Write {
            address,
            input,
            erase,
            no_verify,
        } => commands::write::run_write(flash, address, &input, erase, !no_verify),
        Commands::Erase { address, length } => commands::erase::run_erase(flash, address, length),
        Commands::Plan { address, length } => commands::erase::run_plan(flash, address, length),
        Commands::Switch { protocol } => commands::switch::run_switch(flash, protocol),
        Commands::Reset { software } => commands::switch::run_reset(flash, software),
    };

    // Save whatever was programmed, even if a later step failed
    let stats = session.close(persist)?;
    log::debug!(
        "{} transactions, {} program blocks, {} erases, {} us waiting ({} timeouts)",
        stats.transactions,
        stats.program_blocks,
        stats.span_erases + stats.chip_erases,
        stats.wait_us_total,
        stats.timeouts
    );

    result?;
    Ok(())
}
