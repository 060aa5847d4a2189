//! Serial interfaces SIO0 and SIO1.
//!
//! Transfers complete instantly: setting the start bit in SCONn hands SBUFn
//! to the host queue, sets the end flag and, if enabled, requests the
//! channel's interrupt.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::peripherals::Sink;
use crate::pic::{Irq, Pic};
use crate::sfr::{SBUF0, SBUF1, SCON0, SCON1};

/// SCONn bit 0: transfer-end interrupt enable.
pub const SCON_IE: u8 = 0b0000_0001;
/// SCONn bit 1: transfer-end flag.
pub const SCON_END: u8 = 0b0000_0010;
/// SCONn bit 3: start transfer.
pub const SCON_START: u8 = 0b0000_1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Sio0,
    Sio1,
}

impl Channel {
    const fn registers(self) -> (u16, u16) {
        match self {
            Channel::Sio0 => (SCON0, SBUF0),
            Channel::Sio1 => (SCON1, SBUF1),
        }
    }

    const fn irq(self) -> Irq {
        match self {
            Channel::Sio0 => Irq::Sio0,
            Channel::Sio1 => Irq::Sio1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Serial {
    transmitted: VecDeque<(Channel, u8)>,
}

impl Serial {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain bytes the guest sent.
    pub fn take_transmitted(&mut self) -> Vec<(Channel, u8)> {
        self.transmitted.drain(..).collect()
    }

    /// Deliver a byte from the host into SBUFn.
    pub fn receive(&mut self, channel: Channel, byte: u8, memory: &mut Memory, pic: &mut Pic) {
        let (scon, sbuf) = channel.registers();
        memory.set_sfr(sbuf, byte);
        Self::finish(channel, scon, memory, pic);
    }

    fn finish(channel: Channel, scon: u16, memory: &mut Memory, pic: &mut Pic) {
        let control = (memory.sfr(scon) & !SCON_START) | SCON_END;
        memory.set_sfr(scon, control);
        if control & SCON_IE != 0 {
            pic.raise(channel.irq());
        }
    }
}

impl Sink for Serial {
    fn watches(&self, address: u16) -> bool {
        matches!(address, SCON0 | SCON1)
    }

    fn on_write(&mut self, address: u16, value: u8, memory: &mut Memory, pic: &mut Pic) {
        if value & SCON_START == 0 {
            return;
        }
        let channel = if address == SCON0 { Channel::Sio0 } else { Channel::Sio1 };
        let (scon, sbuf) = channel.registers();
        let byte = memory.sfr(sbuf);
        log::trace!("{channel:?} sends {byte:02X}");
        self.transmitted.push_back((channel, byte));
        Self::finish(channel, scon, memory, pic);
    }
}
