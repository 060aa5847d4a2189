//! Timer 0, Timer 1 and the base timer.
//!
//! All three are clocked by retired instruction cycles, so they follow the
//! oscillator selection automatically. Control registers stay in the SFR
//! array; the live counters and reload values live here and are what the
//! bus returns for counter reads.
//!
//! T0CON and T1CNT share a layout:
//!
//! | Bit | Name | Meaning                              |
//! |-----|------|--------------------------------------|
//! | 7   | HRUN | high half (or 16-bit counter) runs   |
//! | 6   | LRUN | low half runs                        |
//! | 5   | LONG | chain both halves into 16 bits       |
//! | 4   | LEXT | low half clocked externally (T0)     |
//! | 3   | HOVF | high / 16-bit overflow flag          |
//! | 2   | HIE  | high / 16-bit overflow interrupt     |
//! | 1   | LOVF | low overflow flag                    |
//! | 0   | LIE  | low overflow interrupt               |

use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::pic::{Irq, Pic};
use crate::sfr::{BTCR, T0CON, T0H, T0HR, T0L, T0LR, T0PRR, T1CNT, T1H, T1L};

pub const HRUN: u8 = 0b1000_0000;
pub const LRUN: u8 = 0b0100_0000;
pub const LONG: u8 = 0b0010_0000;
pub const LEXT: u8 = 0b0001_0000;
pub const HOVF: u8 = 0b0000_1000;
pub const HIE: u8 = 0b0000_0100;
pub const LOVF: u8 = 0b0000_0010;
pub const LIE: u8 = 0b0000_0001;

/// BTCR bit 6: base timer runs.
pub const BTCR_RUN: u8 = 0b0100_0000;
/// BTCR bit 0: half-second interrupt enable.
pub const BTCR_HALF_ENABLE: u8 = 0b0000_0001;
/// BTCR bit 1: half-second flag.
pub const BTCR_HALF_FLAG: u8 = 0b0000_0010;
/// BTCR bit 2: tenth-second interrupt enable.
pub const BTCR_TENTH_ENABLE: u8 = 0b0000_0100;
/// BTCR bit 3: tenth-second flag.
pub const BTCR_TENTH_FLAG: u8 = 0b0000_1000;

const HALF_SECOND: f64 = 0.5;
const TENTH_SECOND: f64 = 0.1;

/// Count an 8-bit up-counter forward by `ticks`, reloading on each
/// overflow. Returns the number of overflows.
///
/// A reload close to 0xFF can overflow again within the same batch; each
/// one is counted.
pub fn advance8(counter: &mut u8, reload: u8, ticks: u32) -> u32 {
    let mut remaining = ticks;
    let mut overflows = 0;
    loop {
        let to_wrap = 0x100 - u32::from(*counter);
        if remaining < to_wrap {
            *counter += remaining as u8;
            return overflows;
        }
        remaining -= to_wrap;
        overflows += 1;
        *counter = reload;
    }
}

/// 16-bit version of [`advance8`].
pub fn advance16(counter: &mut u16, reload: u16, ticks: u32) -> u32 {
    let mut remaining = ticks;
    let mut overflows = 0;
    loop {
        let to_wrap = 0x1_0000 - u32::from(*counter);
        if remaining < to_wrap {
            *counter += remaining as u16;
            return overflows;
        }
        remaining -= to_wrap;
        overflows += 1;
        *counter = reload;
    }
}

/// One 8/16-bit timer pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerPair {
    pub low: u8,
    pub high: u8,
    pub low_reload: u8,
    pub high_reload: u8,
}

impl TimerPair {
    fn counter16(&self) -> u16 {
        u16::from_be_bytes([self.high, self.low])
    }

    fn reload16(&self) -> u16 {
        u16::from_be_bytes([self.high_reload, self.low_reload])
    }

    /// Run the pair for `ticks`, returning the updated control byte and the
    /// sources to raise.
    fn advance(&mut self, control: u8, ticks: u32, low_ticks: u32) -> (u8, bool, bool) {
        let mut control = control;
        let mut raise_low = false;
        let mut raise_high = false;

        if control & LONG != 0 {
            if control & HRUN != 0 {
                let mut counter = self.counter16();
                if advance16(&mut counter, self.reload16(), ticks) > 0 {
                    control |= HOVF;
                    raise_high = control & HIE != 0;
                }
                [self.high, self.low] = counter.to_be_bytes();
            }
            return (control, raise_low, raise_high);
        }

        if control & LRUN != 0 && advance8(&mut self.low, self.low_reload, low_ticks) > 0 {
            control |= LOVF;
            raise_low = control & LIE != 0;
        }
        if control & HRUN != 0 && advance8(&mut self.high, self.high_reload, ticks) > 0 {
            control |= HOVF;
            raise_high = control & HIE != 0;
        }
        (control, raise_low, raise_high)
    }

    /// Control register write: a rising run bit loads the counter.
    fn control_written(&mut self, old: u8, new: u8) {
        let started = new & !old;
        if started & LRUN != 0 {
            self.low = self.low_reload;
        }
        if started & HRUN != 0 {
            self.high = self.high_reload;
            if new & LONG != 0 {
                self.low = self.low_reload;
            }
        }
    }
}

/// All VMU timers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timers {
    pub t0: TimerPair,
    pub t1: TimerPair,
    /// Timer 0 prescaler counter.
    pub prescale: u8,
    /// Timer 0 prescaler reload (T0PRR).
    pub prescale_reload: u8,
    /// Base timer accumulators: half second, tenth second.
    pub base_half: f64,
    pub base_tenth: f64,
}

impl Timers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Live value for a counter register read, if `address` is one.
    #[must_use]
    pub fn read(&self, address: u16) -> Option<u8> {
        match address {
            T0L => Some(self.t0.low),
            T0H => Some(self.t0.high),
            T1L => Some(self.t1.low),
            T1H => Some(self.t1.high),
            _ => None,
        }
    }

    /// Reload value a write to a timer register programs, for latch reads.
    #[must_use]
    pub fn latch(&self, address: u16) -> Option<u8> {
        match address {
            T1L => Some(self.t1.low_reload),
            T1H => Some(self.t1.high_reload),
            _ => None,
        }
    }

    /// Apply a timer register write. `old` is the stored byte before the
    /// write. Returns `true` if `address` belongs to a timer.
    pub fn write(&mut self, address: u16, old: u8, value: u8, memory: &Memory) -> bool {
        match address {
            T0PRR => {
                self.prescale_reload = value;
                self.prescale = value;
            }
            T0CON => self.t0.control_written(old, value),
            T0L => self.t0.low = value,
            T0H => self.t0.high = value,
            T0LR => {
                self.t0.low_reload = value;
                if memory.sfr(T0CON) & LRUN == 0 {
                    self.t0.low = value;
                }
            }
            T0HR => {
                self.t0.high_reload = value;
                if memory.sfr(T0CON) & HRUN == 0 {
                    self.t0.high = value;
                }
            }
            T1CNT => self.t1.control_written(old, value),
            T1L => {
                self.t1.low_reload = value;
                if memory.sfr(T1CNT) & LRUN == 0 {
                    self.t1.low = value;
                }
            }
            T1H => {
                self.t1.high_reload = value;
                if memory.sfr(T1CNT) & HRUN == 0 {
                    self.t1.high = value;
                }
            }
            _ => return false,
        }
        true
    }

    /// Advance every timer by one instruction's worth of `cycles`, which
    /// lasted `secs` of wall-clock time.
    pub fn update(&mut self, memory: &mut Memory, pic: &mut Pic, cycles: u32, secs: f64) {
        self.update_timer0(memory, pic, cycles);
        self.update_timer1(memory, pic, cycles);
        self.update_base(memory, pic, secs);
    }

    fn update_timer0(&mut self, memory: &mut Memory, pic: &mut Pic, cycles: u32) {
        let control = memory.sfr(T0CON);
        if control & (LRUN | HRUN) == 0 {
            return;
        }
        let ticks = advance8(&mut self.prescale, self.prescale_reload, cycles);
        // An externally clocked low half only counts pin edges.
        let low_ticks = if control & LEXT != 0 { 0 } else { ticks };

        let (control, raise_low, raise_high) = self.t0.advance(control, ticks, low_ticks);
        memory.set_sfr(T0CON, control);
        if raise_low {
            pic.raise(Irq::ExtInt2T0L);
        }
        if raise_high {
            pic.raise(Irq::T0H);
        }
    }

    fn update_timer1(&mut self, memory: &mut Memory, pic: &mut Pic, cycles: u32) {
        let control = memory.sfr(T1CNT);
        if control & (LRUN | HRUN) == 0 {
            return;
        }
        let (control, raise_low, raise_high) = self.t1.advance(control, cycles, cycles);
        memory.set_sfr(T1CNT, control);
        if raise_low || raise_high {
            pic.raise(Irq::T1);
        }
    }

    fn update_base(&mut self, memory: &mut Memory, pic: &mut Pic, secs: f64) {
        let mut btcr = memory.sfr(BTCR);
        if btcr & BTCR_RUN == 0 {
            return;
        }
        self.base_half += secs;
        self.base_tenth += secs;

        let mut raise = false;
        while self.base_half >= HALF_SECOND {
            self.base_half -= HALF_SECOND;
            if btcr & BTCR_HALF_ENABLE != 0 {
                btcr |= BTCR_HALF_FLAG;
                raise = true;
            }
        }
        while self.base_tenth >= TENTH_SECOND {
            self.base_tenth -= TENTH_SECOND;
            if btcr & BTCR_TENTH_ENABLE != 0 {
                btcr |= BTCR_TENTH_FLAG;
                raise = true;
            }
        }
        memory.set_sfr(BTCR, btcr);
        if raise {
            pic.raise(Irq::ExtInt3TBase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance8_without_overflow() {
        let mut counter = 0x10;
        assert_eq!(advance8(&mut counter, 0, 5), 0);
        assert_eq!(counter, 0x15);
    }

    #[test]
    fn advance8_reloads_on_overflow() {
        let mut counter = 0xFE;
        assert_eq!(advance8(&mut counter, 0x80, 3), 1);
        assert_eq!(counter, 0x81);
    }

    #[test]
    fn advance8_cascades_with_high_reload() {
        // Reload 0xFF overflows on every tick.
        let mut counter = 0xFF;
        assert_eq!(advance8(&mut counter, 0xFF, 4), 4);
        assert_eq!(counter, 0xFF);
    }

    #[test]
    fn advance16_overflow() {
        let mut counter = 0xFFFE;
        assert_eq!(advance16(&mut counter, 0x1000, 2), 1);
        assert_eq!(counter, 0x1000);
    }

    fn setup() -> (Timers, Memory, Pic) {
        (Timers::new(), Memory::new(), Pic::new())
    }

    fn write(timers: &mut Timers, memory: &mut Memory, address: u16, value: u8) {
        let old = memory.sfr(address);
        timers.write(address, old, value, memory);
        memory.set_sfr(address, value);
    }

    #[test]
    fn timer0_low_overflow_raises_int2() {
        let (mut timers, mut memory, mut pic) = setup();
        write(&mut timers, &mut memory, T0PRR, 0xFF);
        write(&mut timers, &mut memory, T0LR, 0xFE);
        write(&mut timers, &mut memory, T0CON, LRUN | LIE);
        assert_eq!(timers.t0.low, 0xFE);

        timers.update(&mut memory, &mut pic, 1, 0.0);
        assert_eq!(timers.read(T0L), Some(0xFF));
        assert!(!pic.is_pending(Irq::ExtInt2T0L));

        timers.update(&mut memory, &mut pic, 1, 0.0);
        assert_eq!(timers.read(T0L), Some(0xFE));
        assert_ne!(memory.sfr(T0CON) & LOVF, 0);
        assert!(pic.is_pending(Irq::ExtInt2T0L));
    }

    #[test]
    fn timer0_prescaler_divides() {
        let (mut timers, mut memory, mut pic) = setup();
        // Prescaler overflows every 16 cycles.
        write(&mut timers, &mut memory, T0PRR, 0xF0);
        write(&mut timers, &mut memory, T0CON, LRUN);
        timers.update(&mut memory, &mut pic, 15, 0.0);
        assert_eq!(timers.t0.low, 0);
        timers.update(&mut memory, &mut pic, 1, 0.0);
        assert_eq!(timers.t0.low, 1);
        timers.update(&mut memory, &mut pic, 32, 0.0);
        assert_eq!(timers.t0.low, 3);
    }

    #[test]
    fn timer0_long_mode_raises_t0h() {
        let (mut timers, mut memory, mut pic) = setup();
        write(&mut timers, &mut memory, T0PRR, 0xFF);
        write(&mut timers, &mut memory, T0LR, 0xFF);
        write(&mut timers, &mut memory, T0HR, 0xFF);
        write(&mut timers, &mut memory, T0CON, HRUN | LONG | HIE);
        timers.update(&mut memory, &mut pic, 1, 0.0);
        assert!(pic.is_pending(Irq::T0H));
        assert!(!pic.is_pending(Irq::ExtInt2T0L));
        assert_ne!(memory.sfr(T0CON) & HOVF, 0);
        assert_eq!((timers.t0.high, timers.t0.low), (0xFF, 0xFF));
    }

    #[test]
    fn timer0_external_low_clock_does_not_count() {
        let (mut timers, mut memory, mut pic) = setup();
        write(&mut timers, &mut memory, T0PRR, 0xFF);
        write(&mut timers, &mut memory, T0CON, LRUN | LEXT);
        timers.update(&mut memory, &mut pic, 10, 0.0);
        assert_eq!(timers.t0.low, 0);
    }

    #[test]
    fn timer1_reload_write_and_latch() {
        let (mut timers, mut memory, mut pic) = setup();
        write(&mut timers, &mut memory, T1L, 0xF0);
        assert_eq!(timers.read(T1L), Some(0xF0));
        assert_eq!(timers.latch(T1L), Some(0xF0));

        write(&mut timers, &mut memory, T1CNT, LRUN | LIE);
        timers.update(&mut memory, &mut pic, 0x10, 0.0);
        assert_eq!(timers.read(T1L), Some(0xF0));
        assert!(pic.is_pending(Irq::T1));

        // Reload change while running leaves the counter alone.
        write(&mut timers, &mut memory, T1L, 0x00);
        assert_eq!(timers.read(T1L), Some(0xF0));
        assert_eq!(timers.latch(T1L), Some(0x00));
    }

    #[test]
    fn stopped_timers_do_not_count() {
        let (mut timers, mut memory, mut pic) = setup();
        timers.update(&mut memory, &mut pic, 1000, 0.0);
        assert_eq!(timers.read(T0L), Some(0));
        assert_eq!(timers.read(T1H), Some(0));
        assert_eq!(pic.pending(), 0);
    }

    #[test]
    fn base_timer_fires_on_half_and_tenth_seconds() {
        let (mut timers, mut memory, mut pic) = setup();
        memory.set_sfr(BTCR, BTCR_RUN | BTCR_TENTH_ENABLE);
        timers.update(&mut memory, &mut pic, 0, 0.05);
        assert!(!pic.is_pending(Irq::ExtInt3TBase));
        timers.update(&mut memory, &mut pic, 0, 0.06);
        assert!(pic.is_pending(Irq::ExtInt3TBase));
        assert_ne!(memory.sfr(BTCR) & BTCR_TENTH_FLAG, 0);
        assert_eq!(memory.sfr(BTCR) & BTCR_HALF_FLAG, 0);

        pic.clear(Irq::ExtInt3TBase);
        memory.set_sfr(BTCR, BTCR_RUN | BTCR_HALF_ENABLE);
        timers.update(&mut memory, &mut pic, 0, 0.4);
        assert!(pic.is_pending(Irq::ExtInt3TBase));
        assert_ne!(memory.sfr(BTCR) & BTCR_HALF_FLAG, 0);
    }

    #[test]
    fn base_timer_idle_without_run_bit() {
        let (mut timers, mut memory, mut pic) = setup();
        memory.set_sfr(BTCR, BTCR_HALF_ENABLE | BTCR_TENTH_ENABLE);
        timers.update(&mut memory, &mut pic, 0, 10.0);
        assert!(!pic.is_pending(Irq::ExtInt3TBase));
    }
}
