//! 48x32 monochrome LCD.
//!
//! XRAM banks 0 and 1 hold the top and bottom 16 rows. Each pair of rows
//! takes 16 bytes: six bytes for the even row, six for the odd row and
//! four unused. Bit 7 of each byte is the leftmost pixel. Bank 2 holds the
//! status icons.

use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::peripherals::Sink;
use crate::pic::Pic;
use crate::sfr::{MCR, STAD, VCCR, VCCR_LCD_ON};

pub const WIDTH: usize = 48;
pub const HEIGHT: usize = 32;

/// Rows stored per XRAM bank.
const ROWS_PER_BANK: usize = 16;

/// Icon bank.
const ICON_BANK: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Display {
    enabled: bool,
    dirty: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: false,
            dirty: true,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// LCD power changed through VCCR. A change forces a redraw.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.dirty = true;
        }
    }

    /// Something visible changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a redraw is due, clearing the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Pixel at (`x`, `y`), `true` for dark. Off-screen and blanked
    /// pixels are light.
    #[must_use]
    pub fn pixel(&self, memory: &Memory, x: usize, y: usize) -> bool {
        if !self.enabled || x >= WIDTH || y >= HEIGHT {
            return false;
        }
        let bank = y / ROWS_PER_BANK;
        let row = y % ROWS_PER_BANK;
        let offset = (row / 2) * 16 + (row % 2) * 6 + x / 8;
        memory.xram(bank)[offset] & (0x80 >> (x % 8)) != 0
    }

    /// The whole screen, row-major.
    #[must_use]
    pub fn frame(&self, memory: &Memory) -> Vec<bool> {
        (0..HEIGHT)
            .flat_map(|y| (0..WIDTH).map(move |x| (x, y)))
            .map(|(x, y)| self.pixel(memory, x, y))
            .collect()
    }

    /// Raw icon byte `index` from XRAM bank 2.
    #[must_use]
    pub fn icon_byte(&self, memory: &Memory, index: usize) -> u8 {
        memory.xram(ICON_BANK).get(index).copied().unwrap_or(0)
    }
}

impl Sink for Display {
    fn watches(&self, address: u16) -> bool {
        matches!(address, MCR | STAD | VCCR)
    }

    fn on_write(&mut self, address: u16, value: u8, _memory: &mut Memory, _pic: &mut Pic) {
        if address == VCCR {
            self.set_enabled(value & VCCR_LCD_ON != 0);
        } else {
            self.mark_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(memory: &mut Memory, bank: u8, offset: u16, value: u8) {
        memory.select_xram_bank(bank).unwrap();
        memory.poke(0x180 + offset, value).unwrap();
    }

    #[test]
    fn pixel_layout() {
        let mut memory = Memory::new();
        let mut display = Display::new();
        display.set_enabled(true);

        // Row 0, x 0.
        lit(&mut memory, 0, 0, 0x80);
        // Row 1, x 9: second byte of the odd half.
        lit(&mut memory, 0, 6 + 1, 0x40);
        // Row 18 (bank 1, row 2), x 47.
        lit(&mut memory, 1, 16 + 5, 0x01);

        assert!(display.pixel(&memory, 0, 0));
        assert!(!display.pixel(&memory, 1, 0));
        assert!(display.pixel(&memory, 9, 1));
        assert!(display.pixel(&memory, 47, 18));
        assert_eq!(display.frame(&memory).iter().filter(|&&p| p).count(), 3);
    }

    #[test]
    fn blank_when_disabled() {
        let mut memory = Memory::new();
        let display = Display::new();
        lit(&mut memory, 0, 0, 0xFF);
        assert!(!display.pixel(&memory, 0, 0));
    }

    #[test]
    fn icons_live_in_bank_two() {
        let mut memory = Memory::new();
        let display = Display::new();
        lit(&mut memory, 2, 1, 0x40);
        assert_eq!(display.icon_byte(&memory, 1), 0x40);
        assert_eq!(display.icon_byte(&memory, 0x200), 0);
    }

    #[test]
    fn vccr_toggle_forces_redraw() {
        let mut memory = Memory::new();
        let mut pic = Pic::new();
        let mut display = Display::new();
        display.take_dirty();
        display.on_write(VCCR, VCCR_LCD_ON, &mut memory, &mut pic);
        assert!(display.enabled());
        assert!(display.take_dirty());
        display.on_write(VCCR, VCCR_LCD_ON, &mut memory, &mut pic);
        assert!(!display.take_dirty());
    }
}
