//! End-to-end engine scenarios against the emulated chip

use super::*;
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use octaflash_core::block_device::StorageError;
use octaflash_core::config::{DeviceConfig, WaitStrategy};
use octaflash_core::flash::MAX_WRITE_ENABLE_POLLS;
use octaflash_core::{ChannelRegistry, CommandSetTable, FlashStats, OspiFlash};

const SIZE: u32 = 1024 * 1024;

fn emulator() -> EmulatedFlash {
    EmulatedFlash::new(EmulatorConfig {
        size: SIZE as usize,
        ..EmulatorConfig::default()
    })
}

fn device_config() -> DeviceConfig {
    let mut config = DeviceConfig::default();
    config.geometry.total_size = SIZE;
    config
}

fn open_with(emu: EmulatedFlash, config: DeviceConfig) -> (OspiFlash<EmulatedFlash>, ChannelRegistry) {
    let mut registry = ChannelRegistry::new();
    let flash = OspiFlash::open(emu, config, &mut registry).unwrap();
    (flash, registry)
}

fn open() -> (OspiFlash<EmulatedFlash>, ChannelRegistry) {
    open_with(emulator(), device_config())
}

fn count(flash: &OspiFlash<EmulatedFlash>, op: u8) -> usize {
    flash
        .transport()
        .accepted_opcodes()
        .iter()
        .filter(|&&o| o == op)
        .count()
}

#[test]
fn test_read_id() {
    let (mut flash, _registry) = open();
    let mut id = [0u8; 3];
    flash.read_id(&mut id).unwrap();
    assert_eq!(id, [0xC2, 0x80, 0x39]);
}

#[test]
fn test_program_leaves_neighbours_erased() {
    let (mut flash, _registry) = open();
    flash.erase(0, 0x1000).unwrap();

    let payload = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77];
    flash.program(0x105, &payload).unwrap();
    assert_eq!(flash.transport().transfers().len(), 1);
    assert_eq!(flash.transport().transfers()[0].address, 0x100);
    assert_eq!(flash.transport().transfers()[0].length, 64);

    let mut buf = [0u8; 0x40];
    flash.read(0x100, &mut buf).unwrap();
    assert!(buf[..5].iter().all(|&b| b == 0xFF));
    assert_eq!(&buf[5..12], &payload);
    assert!(buf[12..].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_program_keeps_data_in_shared_block() {
    let mut emu = emulator();
    emu.data_mut()[0x200..0x210].fill(0xA5);
    let (mut flash, _registry) = open_with(emu, device_config());

    flash.program(0x210, &[0x00; 0x10]).unwrap();
    let data = flash.transport().data();
    assert!(data[0x200..0x210].iter().all(|&b| b == 0xA5));
    assert!(data[0x210..0x220].iter().all(|&b| b == 0x00));
    assert!(data[0x220..0x240].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_program_spanning_blocks() {
    let (mut flash, _registry) = open();
    flash.program(0x13C, &[0x5A; 8]).unwrap();

    let addresses: Vec<u32> = flash.transport().transfers().iter().map(|t| t.address).collect();
    assert_eq!(addresses, [0x100, 0x140]);
    assert!(flash.transport().data()[0x13C..0x144].iter().all(|&b| b == 0x5A));
    assert_eq!(flash.transport().data()[0x13B], 0xFF);
    assert_eq!(flash.transport().data()[0x144], 0xFF);
}

#[test]
fn test_unaligned_programs_touch_only_their_range() {
    let (mut flash, _registry) = open();
    let ranges: [(u32, usize); 7] = [
        (0x1001, 1),
        (0x1083, 62),
        (0x113F, 2),
        (0x1205, 200),
        (0x1400, 64),
        (0x14FF, 129),
        (0x17C1, 63),
    ];

    let mut expected = vec![0xFFu8; 0x1000];
    for &(start, len) in &ranges {
        let payload: Vec<u8> = (0..len).map(|i| (i % 0x7F) as u8).collect();
        flash.program(start, &payload).unwrap();

        let offset = start as usize - 0x1000;
        expected[offset..offset + len].copy_from_slice(&payload);
        let data = flash.transport().data();
        assert_eq!(data[start as usize - 1], 0xFF, "byte before 0x{:X}", start);
        assert_eq!(data[start as usize + len], 0xFF, "byte after 0x{:X}+{}", start, len);
    }
    assert_eq!(&flash.transport().data()[0x1000..0x2000], &expected[..]);
}

#[test]
fn test_erase_covers_aligned_range() {
    let mut emu = emulator();
    emu.data_mut().fill(0x00);
    let (mut flash, _registry) = open_with(emu, device_config());

    flash.erase(0x1800, 70 * 1024).unwrap();
    let data = flash.transport().data();
    assert!(data[0x1000..0x13000].iter().all(|&b| b == 0xFF));
    assert_eq!(data[0x0FFF], 0x00);
    assert_eq!(data[0x13000], 0x00);
    assert_eq!(count(&flash, 0xDC), 1);
    assert_eq!(count(&flash, 0x21), 2);
    assert_eq!(flash.transport().prefetch_invalidations(), 1);

    let erases: Vec<(u8, u32)> = flash
        .transport()
        .commands()
        .iter()
        .filter_map(|c| match c.decoded {
            Some(op @ (0x21 | 0xDC)) => Some((op, c.address)),
            _ => None,
        })
        .collect();
    assert_eq!(erases, [(0xDC, 0x1000), (0x21, 0x11000), (0x21, 0x12000)]);
}

#[test]
fn test_erase_uses_blocks_when_aligned() {
    let (mut flash, _registry) = open();
    flash.erase(0x10000, 0x20000).unwrap();
    assert_eq!(count(&flash, 0xDC), 2);
    assert_eq!(count(&flash, 0x21), 0);
}

#[test]
fn test_whole_device_erase() {
    let mut emu = emulator();
    emu.data_mut().fill(0x00);
    let (mut flash, _registry) = open_with(emu, device_config());

    flash.erase(0, SIZE).unwrap();
    assert_eq!(count(&flash, 0x60), 1);
    assert!(flash.transport().data().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_rejects_out_of_range() {
    let (mut flash, _registry) = open();
    assert_eq!(flash.program(SIZE - 1, &[0, 0]), Err(Error::Assertion));
    assert_eq!(flash.program(0, &[]), Err(Error::Assertion));
    assert_eq!(flash.erase(0, 0), Err(Error::Assertion));
    assert_eq!(flash.erase(SIZE, 1), Err(Error::Assertion));
    assert!(flash.transport().transfers().is_empty());
}

#[test]
fn test_switch_round_trip() {
    let (mut flash, _registry) = open();
    flash.program(0x40, b"legacy").unwrap();

    flash.switch_safe(Protocol::OctalDtr).unwrap();
    assert_eq!(flash.protocol(), Protocol::OctalDtr);
    assert_eq!(flash.transport().device_protocol(), Protocol::OctalDtr);
    assert_eq!(flash.transport().config_register2(), 0x02);
    assert_eq!(
        flash
            .transport()
            .config_image(Channel::Cs1)
            .and_then(|image| image.protocol()),
        Some(Protocol::OctalDtr)
    );

    let mut id = [0u8; 3];
    flash.read_id(&mut id).unwrap();
    assert_eq!(id, [0xC2, 0x80, 0x39]);

    flash.erase(0x2000, 0x1000).unwrap();
    flash.program(0x2000, b"octal").unwrap();
    let mut buf = [0u8; 6];
    flash.read(0x40, &mut buf).unwrap();
    assert_eq!(&buf, b"legacy");

    flash.switch_safe(Protocol::Spi).unwrap();
    assert_eq!(flash.transport().device_protocol(), Protocol::Spi);
    let mut buf = [0u8; 5];
    flash.direct_read(0x2000, &mut buf).unwrap();
    assert_eq!(&buf, b"octal");
    assert_eq!(flash.transport().resets(), 2);
}

#[test]
fn test_switch_to_bound_protocol_is_noop() {
    let (mut flash, _registry) = open();
    flash.switch_safe(Protocol::Spi).unwrap();
    assert_eq!(flash.transport().resets(), 0);
    assert!(flash.transport().commands().is_empty());
}

#[test]
fn test_switch_to_unsupported_protocol() {
    let (mut flash, _registry) = open();
    assert_eq!(flash.switch_safe(Protocol::OctalStr), Err(Error::InvalidMode));
    assert_eq!(flash.protocol(), Protocol::Spi);
    assert_eq!(flash.transport().resets(), 0);
}

#[test]
fn test_switch_verification_failure() {
    let mut emu = emulator();
    emu.faults_mut().ignore_config_write = true;
    let (mut flash, _registry) = open_with(emu, device_config());

    assert_eq!(flash.switch_safe(Protocol::OctalDtr), Err(Error::WriteFailed));
    assert_eq!(flash.protocol(), Protocol::Spi);
    assert_eq!(flash.transport().device_protocol(), Protocol::Spi);
    assert_eq!(flash.transport().resets(), 2);
    assert!(!flash.status_get().unwrap());
}

#[test]
fn test_hardware_reset_leaves_binding() {
    let (mut flash, _registry) = open();
    flash.switch_safe(Protocol::OctalDtr).unwrap();
    flash.hardware_reset().unwrap();
    assert_eq!(flash.protocol(), Protocol::OctalDtr);
    assert_eq!(flash.transport().device_protocol(), Protocol::Spi);

    // The device no longer understands octal status reads
    assert!(flash.status_get().unwrap());

    flash.switch_safe(Protocol::Spi).unwrap();
    assert!(!flash.status_get().unwrap());
}

#[test]
fn test_software_reset() {
    let (mut flash, _registry) = open();
    flash.switch_safe(Protocol::OctalDtr).unwrap();
    flash.software_reset().unwrap();
    assert_eq!(flash.protocol(), Protocol::Spi);
    assert_eq!(flash.transport().device_protocol(), Protocol::Spi);
    assert_eq!(flash.read_config_register2().unwrap(), 0x00);
}

#[test]
fn test_erase_times_out_within_budget() {
    let mut config = device_config();
    config.timeouts.erase_us = 200_000;
    let mut emu = emulator();
    emu.faults_mut().stuck_busy = true;
    let (mut flash, _registry) = open_with(emu, config);

    let start = flash.transport().now_us();
    assert_eq!(flash.erase(0, 0x1000), Err(Error::Timeout));
    let elapsed = flash.transport().now_us() - start;
    assert!(elapsed >= 200_000);
    assert!(elapsed < 201_000);
}

#[test]
fn test_program_times_out_with_direct_polling() {
    let mut config = device_config();
    config.wait_strategy = WaitStrategy::Direct;
    config.timeouts.program_us = 50_000;
    let mut emu = emulator();
    emu.faults_mut().stuck_busy = true;
    let (mut flash, _registry) = open_with(emu, config);

    let start = flash.transport().now_us();
    assert_eq!(flash.program(0, &[0x00; 4]), Err(Error::Timeout));
    let elapsed = flash.transport().now_us() - start;
    assert!((50_000..51_000).contains(&elapsed));
}

#[test]
fn test_poll_budget_exhausted_falls_back() {
    let mut config = device_config();
    config.periodic_poll.interval_us = 10;
    config.periodic_poll.max_count = 2;
    let (mut flash, _registry) = open_with(emulator(), config);

    flash.program(0x80, &[0x12; 64]).unwrap();
    assert!(flash.transport().data()[0x80..0xC0].iter().all(|&b| b == 0x12));
}

#[test]
fn test_direct_wait_strategy() {
    let mut config = device_config();
    config.wait_strategy = WaitStrategy::Direct;
    let (mut flash, _registry) = open_with(emulator(), config);

    flash.erase(0x4000, 0x1000).unwrap();
    flash.program(0x4000, &[0x42; 100]).unwrap();
    let mut buf = [0u8; 100];
    flash.read(0x4000, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0x42));
}

#[test]
fn test_short_transfer_is_aborted() {
    let mut emu = emulator();
    emu.faults_mut().short_transfer = 16;
    let (mut flash, _registry) = open_with(emu, device_config());

    let mut buf = [0u8; 64];
    assert_eq!(flash.read(0, &mut buf), Err(Error::TransferAborted));
    assert_eq!(flash.program(0, &[0x00; 64]), Err(Error::TransferAborted));
}

#[test]
fn test_lost_dma_completion_times_out() {
    let mut emu = emulator();
    emu.faults_mut().drop_dma_completion = true;
    let (mut flash, _registry) = open_with(emu, device_config());

    let start = flash.transport().now_us();
    let mut buf = [0u8; 16];
    assert_eq!(flash.read(0, &mut buf), Err(Error::Timeout));
    assert!(flash.transport().now_us() - start >= 100_000);
}

#[test]
fn test_stale_completion_is_discarded() {
    let mut emu = emulator();
    emu.faults_mut().drop_dma_completion = true;
    emu.dma_signal().signal(Completion::Complete);
    let (mut flash, _registry) = open_with(emu, device_config());

    let mut buf = [0u8; 16];
    assert_eq!(flash.read(0, &mut buf), Err(Error::Timeout));
}

#[test]
fn test_busy_device_rejected() {
    let (mut flash, _registry) = open();
    flash.transport_mut().busy_for(10_000);

    assert_eq!(flash.program(0, &[0x00]), Err(Error::DeviceBusy));
    assert_eq!(flash.erase(0, 0x1000), Err(Error::DeviceBusy));
    assert_eq!(flash.direct_write(0, &[0x00]), Err(Error::DeviceBusy));
    assert_eq!(count(&flash, 0x06), 0);
    assert!(flash.status_get().unwrap());
}

#[test]
fn test_write_enable_never_confirmed() {
    let mut emu = emulator();
    emu.faults_mut().ignore_write_enable = true;
    let (mut flash, _registry) = open_with(emu, device_config());

    assert_eq!(flash.program(0, &[0x00; 4]), Err(Error::WriteFailed));
    assert!(flash.transport().transfers().is_empty());
    // One busy precheck, then the bounded write enable confirmation
    assert_eq!(count(&flash, 0x05), 1 + MAX_WRITE_ENABLE_POLLS as usize);
    assert!(flash.transport().data()[..4].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_direct_write_and_read() {
    let (mut flash, _registry) = open();
    let payload: Vec<u8> = (0u8..17).collect();
    flash.direct_write(0x3F8, &payload).unwrap();
    assert_eq!(count(&flash, 0x12), 3);

    let mut buf = [0u8; 17];
    flash.direct_read(0x3F8, &mut buf).unwrap();
    assert_eq!(&buf[..], &payload[..]);
}

#[test]
fn test_interrupts_cleared_after_every_command() {
    let (mut flash, _registry) = open();
    flash.erase(0, 0x1000).unwrap();
    flash.direct_write(0, &[1, 2, 3]).unwrap();
    let emu = flash.transport();
    assert_eq!(emu.interrupt_clears() as usize, emu.commands().len());
}

#[test]
fn test_duplicate_open_rejected() {
    let mut registry: ChannelRegistry = ChannelRegistry::new();
    let mut first = OspiFlash::open(emulator(), device_config(), &mut registry).unwrap();
    assert!(matches!(
        OspiFlash::open(emulator(), device_config(), &mut registry),
        Err(Error::AlreadyOpen)
    ));

    let mut other_line = device_config();
    other_line.channel = Channel::Cs0;
    let second = OspiFlash::open(emulator(), other_line, &mut registry).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(second.channel_id().channel, Channel::Cs0);

    first.close(&mut registry).unwrap();
    assert!(!first.transport().is_open());
    let mut buf = [0u8; 4];
    assert_eq!(first.read(0, &mut buf), Err(Error::NotOpen));
    OspiFlash::open(emulator(), device_config(), &mut registry).unwrap();
}

#[test]
fn test_calibration_failure_releases_line() {
    let mut emu = emulator();
    emu.faults_mut().fail_calibration = true;
    let mut registry: ChannelRegistry = ChannelRegistry::new();
    assert!(matches!(
        OspiFlash::open(emu, device_config(), &mut registry),
        Err(Error::CalibrateFailed)
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_open_in_unsupported_protocol() {
    let mut config = device_config();
    config.protocol = Protocol::OctalStr;
    let mut registry: ChannelRegistry = ChannelRegistry::new();
    assert!(matches!(
        OspiFlash::open(emulator(), config, &mut registry),
        Err(Error::InvalidMode)
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_stats_observer() {
    let mut registry: ChannelRegistry = ChannelRegistry::new();
    let mut flash = OspiFlash::open_with(
        emulator(),
        device_config(),
        CommandSetTable::default(),
        FlashStats::default(),
        &mut registry,
    )
    .unwrap();

    flash.erase(0, 0x1000).unwrap();
    flash.program(0x20, &[0x00; 100]).unwrap();

    let stats = *flash.observer();
    assert_eq!(stats.protocol_binds, 1);
    assert_eq!(stats.span_erases, 1);
    assert_eq!(stats.bytes_erased, 0x1000);
    assert_eq!(stats.program_blocks, 3);
    assert_eq!(stats.bytes_programmed, 192);
    assert_eq!(stats.timeouts, 0);
    assert!(stats.transactions > 0);
}

#[test]
fn test_block_device() {
    let (mut flash, _registry) = open();
    assert_eq!(ReadNorFlash::capacity(&flash), SIZE as usize);

    NorFlash::erase(&mut flash, 0, 4096).unwrap();
    NorFlash::write(&mut flash, 3, b"abc").unwrap();
    let mut buf = [0u8; 8];
    ReadNorFlash::read(&mut flash, 0, &mut buf).unwrap();
    assert_eq!(buf, [0xFF, 0xFF, 0xFF, b'a', b'b', b'c', 0xFF, 0xFF]);

    assert_eq!(
        NorFlash::erase(&mut flash, 1, 4096),
        Err(StorageError::NotAligned)
    );
    assert_eq!(
        ReadNorFlash::read(&mut flash, SIZE, &mut buf),
        Err(StorageError::OutOfBounds)
    );
    assert_eq!(NorFlash::write(&mut flash, 0, &[]), Ok(()));
}
