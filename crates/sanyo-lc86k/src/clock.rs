//! Oscillator selection from the OCR register.

use emu_core::Oscillator;

/// Quartz (watch crystal) frequency in Hz.
pub const QUARTZ_HZ: u32 = 32_768;
/// Ceramic resonator frequency in Hz.
pub const CERAMIC_HZ: u32 = 6_000_000;
/// Internal RC oscillator frequency in Hz.
pub const RC_HZ: u32 = 879_236;

/// OCR bit 7: divide by 6 instead of 12.
pub const OCR_DIV6: u8 = 0b1000_0000;
/// OCR bit 5: run from the quartz oscillator.
pub const OCR_QUARTZ: u8 = 0b0010_0000;
/// OCR bit 4: run from the ceramic oscillator.
pub const OCR_CERAMIC: u8 = 0b0001_0000;

/// Oscillator driving the core for a given OCR value.
///
/// Quartz wins over ceramic when both bits are set; with neither set the
/// internal RC oscillator runs.
#[must_use]
pub fn oscillator(ocr: u8) -> Oscillator {
    let frequency = if ocr & OCR_QUARTZ != 0 {
        QUARTZ_HZ
    } else if ocr & OCR_CERAMIC != 0 {
        CERAMIC_HZ
    } else {
        RC_HZ
    };
    let divider = if ocr & OCR_DIV6 != 0 { 6 } else { 12 };
    Oscillator::new(frequency, divider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_value_selects_rc_divide_by_12() {
        assert_eq!(oscillator(0x00), Oscillator::new(RC_HZ, 12));
    }

    #[test]
    fn quartz_divide_by_six() {
        assert_eq!(oscillator(OCR_QUARTZ | OCR_DIV6), Oscillator::new(QUARTZ_HZ, 6));
    }

    #[test]
    fn quartz_takes_precedence_over_ceramic() {
        assert_eq!(oscillator(OCR_QUARTZ | OCR_CERAMIC).frequency_hz, QUARTZ_HZ);
        assert_eq!(oscillator(OCR_CERAMIC).frequency_hz, CERAMIC_HZ);
    }
}
