//! Memory-mapped peripherals.
//!
//! The set is fixed: the bus owns one of each and offers every data write
//! to those that watch the address, after the byte has been stored. Sinks
//! get the raw memory and the interrupt controller, never the bus, so they
//! cannot re-enter the write pipeline.

use serde::{Deserialize, Serialize};

use crate::buzzer::Buzzer;
use crate::display::Display;
use crate::gamepad::Gamepad;
use crate::memory::Memory;
use crate::pic::Pic;
use crate::serial::Serial;

/// A peripheral driven by data writes.
pub trait Sink {
    /// Whether writes to `address` concern this peripheral.
    fn watches(&self, address: u16) -> bool;

    /// React to a stored write. May update other SFRs directly through
    /// `memory` and raise interrupts.
    fn on_write(&mut self, address: u16, value: u8, memory: &mut Memory, pic: &mut Pic);
}

/// Every VMU peripheral.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Peripherals {
    pub buzzer: Buzzer,
    pub display: Display,
    pub gamepad: Gamepad,
    pub serial: Serial,
}

impl Peripherals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a write to every interested sink, buzzer first.
    pub fn dispatch(&mut self, address: u16, value: u8, memory: &mut Memory, pic: &mut Pic) {
        fn offer(sink: &mut impl Sink, address: u16, value: u8, memory: &mut Memory, pic: &mut Pic) {
            if sink.watches(address) {
                sink.on_write(address, value, memory, pic);
            }
        }
        offer(&mut self.buzzer, address, value, memory, pic);
        offer(&mut self.display, address, value, memory, pic);
        offer(&mut self.gamepad, address, value, memory, pic);
        offer(&mut self.serial, address, value, memory, pic);
    }
}
