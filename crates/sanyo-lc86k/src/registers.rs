//! Core special function registers and PSW bits.
//!
//! The LC86K keeps its architectural registers in the SFR segment of the
//! internal address space rather than inside the core, so every access
//! goes through the bus and its side effects.

/// Accumulator.
pub const ACC: u16 = 0x100;
/// Program status word.
pub const PSW: u16 = 0x101;
/// B register (multiply/divide operand).
pub const B: u16 = 0x102;
/// C register (multiply/divide operand).
pub const C: u16 = 0x103;
/// Table reference low byte.
pub const TRL: u16 = 0x104;
/// Table reference high byte.
pub const TRH: u16 = 0x105;
/// Stack pointer (offset into RAM bank 0).
pub const SP: u16 = 0x106;
/// Power control.
pub const PCON: u16 = 0x107;
/// Interrupt enable.
pub const IE: u16 = 0x108;
/// Interrupt priority.
pub const IP: u16 = 0x109;
/// External memory control. Bit 0 selects the program source.
pub const EXT: u16 = 0x10D;
/// Oscillator control.
pub const OCR: u16 = 0x10E;
/// Flash program register.
pub const FPR: u16 = 0x154;

/// Carry flag (bit 7).
pub const CY: u8 = 0b1000_0000;

/// Auxiliary carry flag (bit 6) - carry out of bit 3.
pub const AC: u8 = 0b0100_0000;

/// Indirect register bank select, high bit (bit 4).
pub const IRBK1: u8 = 0b0001_0000;

/// Indirect register bank select, low bit (bit 3).
pub const IRBK0: u8 = 0b0000_1000;

/// Overflow flag (bit 2).
pub const OV: u8 = 0b0000_0100;

/// RAM bank select (bit 1) - 0 = bank 0, 1 = bank 1.
pub const RAMBK0: u8 = 0b0000_0010;

/// Parity flag (bit 0) - read-only, odd parity of ACC.
pub const P: u8 = 0b0000_0001;

/// PCON halt bit.
pub const PCON_HALT: u8 = 0b0000_0001;

/// PCON hold bit.
pub const PCON_HOLD: u8 = 0b0000_0010;

/// EXT bit 0: set = flash, clear = mask ROM.
pub const EXT_FLASH: u8 = 0b0000_0001;

/// FPR bit 0: flash address bit 16 for `LDF`/`STF`.
pub const FPR_ADDRESS_BANK: u8 = 0b0000_0001;

/// FPR bit 1: flash unlock sequence in progress.
pub const FPR_UNLOCK: u8 = 0b0000_0010;

/// Stack pointer after reset.
pub const SP_RESET: u8 = 0x7F;

/// Stack pointer value at which the next push overflows.
pub const STACK_END: u8 = 0xFF;

/// Stack pointer value at or below which a pop underflows.
pub const STACK_BASE: u8 = 0x7F;

/// Parity bit for a value written to ACC.
///
/// Set when the value has an odd number of 1 bits.
#[must_use]
pub const fn parity(value: u8) -> u8 {
    (value.count_ones() & 1) as u8
}

/// Register address used by indirect mode `mode` (0-3) under `psw`.
///
/// IRBK1:IRBK0 select one of four groups of four pointer registers at
/// 0x00-0x0F of the current RAM bank.
#[must_use]
pub const fn indirect_register(psw: u8, mode: u8) -> u16 {
    (((psw & (IRBK1 | IRBK0)) >> 1) | (mode & 0x03)) as u16
}

/// Effective 9-bit address for indirect mode `mode` given the pointer
/// register's contents.
///
/// Modes 0 and 1 address 0x000-0x0FF, modes 2 and 3 address the SFR and
/// XRAM half at 0x100-0x1FF.
#[must_use]
pub const fn indirect_target(pointer: u8, mode: u8) -> u16 {
    pointer as u16 | (((mode & 0x02) as u16) << 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_is_odd_bit_count() {
        assert_eq!(parity(0x00), 0);
        assert_eq!(parity(0x01), 1);
        assert_eq!(parity(0x03), 0);
        assert_eq!(parity(0xFE), 1);
        assert_eq!(parity(0xFF), 0);
    }

    #[test]
    fn indirect_register_golden_vectors() {
        // (irbk bits, mode) -> register address
        let cases = [
            (0, 0, 0x00),
            (0, 3, 0x03),
            (IRBK0, 0, 0x04),
            (IRBK0, 2, 0x06),
            (IRBK1, 1, 0x09),
            (IRBK1 | IRBK0, 0, 0x0C),
            (IRBK1 | IRBK0, 3, 0x0F),
        ];
        for (psw, mode, expected) in cases {
            assert_eq!(indirect_register(psw, mode), expected, "psw={psw:#04X} mode={mode}");
        }
    }

    #[test]
    fn indirect_register_ignores_other_psw_bits() {
        assert_eq!(indirect_register(CY | AC | OV | RAMBK0 | P, 2), 0x02);
    }

    #[test]
    fn indirect_target_high_half_for_modes_2_and_3() {
        assert_eq!(indirect_target(0x34, 0), 0x034);
        assert_eq!(indirect_target(0x34, 1), 0x034);
        assert_eq!(indirect_target(0x34, 2), 0x134);
        assert_eq!(indirect_target(0xFF, 3), 0x1FF);
    }
}
