//! Buttons on port 3.
//!
//! Pins read low while a button is held. With P3INT enabled a press
//! latches the P3INT source flag and requests the P3 interrupt.

use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::peripherals::Sink;
use crate::pic::{Irq, Pic};
use crate::sfr::{P3INT, P3INT_ENABLE, P3INT_SOURCE};

/// VMU buttons, by P3 bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Mode,
    Sleep,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Mode,
        Button::Sleep,
    ];

    #[must_use]
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gamepad {
    /// Held buttons, bit set = held.
    held: u8,
}

impl Gamepad {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_held(&self, button: Button) -> bool {
        self.held & button.mask() != 0
    }

    /// P3 pin levels (active low).
    #[must_use]
    pub fn pins(&self) -> u8 {
        !self.held
    }

    /// Press or release `button`.
    pub fn set_button(&mut self, button: Button, pressed: bool, memory: &mut Memory, pic: &mut Pic) {
        let was = self.is_held(button);
        if pressed {
            self.held |= button.mask();
        } else {
            self.held &= !button.mask();
        }
        if pressed && !was {
            Self::request(memory, pic);
        }
    }

    fn request(memory: &mut Memory, pic: &mut Pic) {
        let p3int = memory.sfr(P3INT);
        if p3int & P3INT_ENABLE != 0 {
            memory.set_sfr(P3INT, p3int | P3INT_SOURCE);
            pic.raise(Irq::P3);
        }
    }
}

impl Sink for Gamepad {
    fn watches(&self, address: u16) -> bool {
        address == P3INT
    }

    /// Enabling the interrupt, or acknowledging it, while a button is still
    /// held requests it again.
    fn on_write(&mut self, _address: u16, value: u8, memory: &mut Memory, pic: &mut Pic) {
        if self.held != 0 && value & (P3INT_ENABLE | P3INT_SOURCE) == P3INT_ENABLE {
            Self::request(memory, pic);
        }
    }
}
