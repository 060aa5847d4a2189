//! VMU special function register map.
//!
//! Core registers (ACC, PSW, SP, ...) come from the CPU crate; the rest are
//! the on-chip peripherals as wired in the VMU.

pub use sanyo_lc86k::registers::{
    ACC, B, C, EXT, FPR, IE, IP, OCR, PCON, PSW, SP, TRH, TRL,
};

/// Start of the SFR segment.
pub const SFR_BASE: u16 = 0x100;
/// Start of the XRAM segment.
pub const XRAM_BASE: u16 = 0x180;
/// Last valid internal address.
pub const DATA_END: u16 = 0x1FF;

// Timer 0
pub const T0CON: u16 = 0x110;
pub const T0PRR: u16 = 0x111;
pub const T0L: u16 = 0x112;
pub const T0LR: u16 = 0x113;
pub const T0H: u16 = 0x114;
pub const T0HR: u16 = 0x115;

// Timer 1
pub const T1CNT: u16 = 0x118;
pub const T1LC: u16 = 0x11A;
/// Read: T1L counter. Write: T1LR reload.
pub const T1L: u16 = 0x11B;
pub const T1HC: u16 = 0x11C;
/// Read: T1H counter. Write: T1HR reload.
pub const T1H: u16 = 0x11D;

// LCD
pub const MCR: u16 = 0x120;
pub const STAD: u16 = 0x122;
pub const CNR: u16 = 0x123;
pub const TDR: u16 = 0x124;
pub const XBNK: u16 = 0x125;
pub const VCCR: u16 = 0x127;

// Serial
pub const SCON0: u16 = 0x130;
pub const SBUF0: u16 = 0x131;
pub const SBR: u16 = 0x132;
pub const SCON1: u16 = 0x134;
pub const SBUF1: u16 = 0x135;

// Ports
pub const P1: u16 = 0x144;
pub const P1DDR: u16 = 0x145;
pub const P1FCR: u16 = 0x146;
pub const P3: u16 = 0x14C;
pub const P3DDR: u16 = 0x14D;
pub const P3INT: u16 = 0x14E;
pub const P7: u16 = 0x15C;

// External interrupts
pub const I01CR: u16 = 0x15D;
pub const I23CR: u16 = 0x15E;
pub const ISL: u16 = 0x15F;

// Work RAM
pub const VSEL: u16 = 0x163;
pub const VRMAD1: u16 = 0x164;
pub const VRMAD2: u16 = 0x165;
pub const VTRBF: u16 = 0x166;
pub const VLREG: u16 = 0x167;

// Base timer
pub const BTCR: u16 = 0x17F;

/// Registers that cannot be read back. Reads return 0xFF.
pub const WRITE_ONLY: [u16; 5] = [P1DDR, P1FCR, P3DDR, MCR, VCCR];

/// VCCR bit 7: LCD on.
pub const VCCR_LCD_ON: u8 = 0b1000_0000;

/// VSEL bit 4: auto-increment VRMAD after each VTRBF access.
pub const VSEL_INCE: u8 = 0b0001_0000;

/// P3INT bit 0: interrupt enable.
pub const P3INT_ENABLE: u8 = 0b0000_0001;
/// P3INT bit 1: interrupt source flag.
pub const P3INT_SOURCE: u8 = 0b0000_0010;

/// I01CR bit 0: INT0 enable.
pub const I01CR_INT0_ENABLE: u8 = 0b0000_0001;
/// I01CR bit 1: INT0 source flag.
pub const I01CR_INT0_SOURCE: u8 = 0b0000_0010;
/// I01CR bit 4: INT1 enable.
pub const I01CR_INT1_ENABLE: u8 = 0b0001_0000;
/// I01CR bit 5: INT1 source flag.
pub const I01CR_INT1_SOURCE: u8 = 0b0010_0000;

/// P7 bit 0: Dreamcast controller connection.
pub const P7_DREAMCAST: u8 = 0b0000_0001;
/// P7 bit 1: low battery detect.
pub const P7_LOW_BATTERY: u8 = 0b0000_0010;

/// Offset of an SFR address inside the SFR segment.
#[must_use]
pub const fn index(address: u16) -> usize {
    (address & 0x7F) as usize
}
