//! MX25UM25645G opcodes
//!
//! Legacy SPI opcodes are single bytes. In octal mode every command is sent
//! as two bytes: the STR form is the opcode followed by its inverse, the DTR
//! form is usually the inverted opcode twice.

// ============================================================================
// Legacy SPI (1S-1S-1S) - write control and status
// ============================================================================

/// Write Enable
pub const WREN: u16 = 0x06;
/// Write Disable
pub const WRDI: u16 = 0x04;
/// Read Status Register
pub const RDSR: u16 = 0x05;
/// Read Identification (manufacturer + 2-byte device ID)
pub const RDID: u16 = 0x9F;
/// Read Configuration Register 2 (4-byte address, 1 data byte)
pub const RDCR2: u16 = 0x71;
/// Write Configuration Register 2 (4-byte address, 1 data byte)
pub const WRCR2: u16 = 0x72;
/// Reset Enable
pub const RSTEN: u16 = 0x66;
/// Reset Memory
pub const RST: u16 = 0x99;

// ============================================================================
// Legacy SPI (1S-1S-1S) - array access, 4-byte address
// ============================================================================

/// Normal Read
pub const READ4B: u16 = 0x13;
/// Fast Read (8 dummy cycles)
pub const FAST_READ4B: u16 = 0x0C;
/// Page Program
pub const PP4B: u16 = 0x12;
/// Sector Erase 4 KiB
pub const SE4B: u16 = 0x21;
/// Block Erase 64 KiB
pub const BE4B: u16 = 0xDC;
/// Chip Erase
pub const CE: u16 = 0x60;
/// Chip Erase (alternate opcode)
pub const CE_ALT: u16 = 0xC7;

// ============================================================================
// Octal (8S/8D) - STR forms
// ============================================================================

/// Write Enable
pub const OPI_WREN: u16 = 0x06F9;
/// Read Status Register (4-byte address, 4 dummy cycles)
pub const OPI_RDSR: u16 = 0x05FA;
/// Read Identification (4-byte address, 4 dummy cycles)
pub const OPI_RDID: u16 = 0x9F60;
/// Read Configuration Register 2 (4-byte address, 4 dummy cycles)
pub const OPI_RDCR2: u16 = 0x718E;
/// Write Configuration Register 2
pub const OPI_WRCR2: u16 = 0x728D;
/// Reset Enable
pub const OPI_RSTEN: u16 = 0x6699;
/// Reset Memory
pub const OPI_RST: u16 = 0x9966;
/// Octal Read, STR
pub const OPI_8READ: u16 = 0xEC13;
/// Page Program
pub const OPI_PP4B: u16 = 0x12ED;
/// Sector Erase 4 KiB
pub const OPI_SE4B: u16 = 0x21DE;
/// Block Erase 64 KiB
pub const OPI_BE4B: u16 = 0xDC23;
/// Chip Erase
pub const OPI_CE: u16 = 0x609F;

// ============================================================================
// Octal (8D) - DTR forms
// ============================================================================

/// Octal Read, DTR (6-20 dummy cycles depending on clock)
pub const OPI_8READ_DTR: u16 = 0xEE11;
/// Write Enable
pub const OPI_WREN_DTR: u16 = 0xF9F9;
/// Read Status Register
pub const OPI_RDSR_DTR: u16 = 0xFAFA;
/// Page Program
pub const OPI_PP4B_DTR: u16 = 0xEDED;
/// Sector Erase 4 KiB
pub const OPI_SE4B_DTR: u16 = 0xDEDE;
/// Block Erase 64 KiB
pub const OPI_BE4B_DTR: u16 = 0x2323;
/// Chip Erase
pub const OPI_CE_DTR: u16 = 0xC738;

// ============================================================================
// Register values
// ============================================================================

/// Configuration register 2 address holding the bus mode field
pub const CR2_MODE_ADDR: u32 = 0x0000_0000;
/// Mask of the bus mode field in configuration register 2
pub const CR2_MODE_MASK: u8 = 0x03;
/// Address sent with status reads in octal mode
pub const STATUS_ADDR: u32 = 0x0000_0000;

/// JEDEC manufacturer ID for Macronix
pub const MACRONIX_ID: u8 = 0xC2;
/// MX25UM25645G device ID
pub const MX25UM25645G_ID: u16 = 0x8039;
