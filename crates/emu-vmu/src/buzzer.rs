//! Piezo buzzer.
//!
//! The buzzer hangs off P1 bit 7, driven by Timer 1's low half in PWM
//! mode: the reload sets the period and the compare register the pulse
//! width, both counted up towards 256.

use emu_core::Oscillator;
use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::peripherals::Sink;
use crate::pic::Pic;
use crate::sfr::{P1, P1DDR, P1FCR, T1CNT, T1L, T1LC};
use crate::timers::LRUN;

/// P1 bit 7: PWM output pin.
const PWM_PIN: u8 = 0b1000_0000;

/// A square wave, in Timer 1 cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tone {
    pub period: u16,
    pub pulse_width: u16,
}

impl Tone {
    /// Pitch under the given CPU clock.
    #[must_use]
    pub fn frequency_hz(&self, oscillator: &Oscillator) -> f64 {
        oscillator.cycles_per_second() / f64::from(self.period)
    }

    /// High fraction of each period.
    #[must_use]
    pub fn duty(&self) -> f64 {
        f64::from(self.pulse_width) / f64::from(self.period)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Buzzer {
    tone: Option<Tone>,
    changed: bool,
}

impl Buzzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The tone currently sounding.
    #[must_use]
    pub fn tone(&self) -> Option<Tone> {
        self.tone
    }

    /// Whether the tone changed since the last call.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Start a tone directly, bypassing Timer 1 (host-side sound commands).
    /// A zero or full-period pulse is silence.
    pub fn play_tone(&mut self, period: u16, pulse_width: u16) {
        let tone = (period > 0 && pulse_width > 0 && pulse_width < period).then_some(Tone {
            period,
            pulse_width,
        });
        self.set_tone(tone);
    }

    pub fn stop(&mut self) {
        self.set_tone(None);
    }

    fn set_tone(&mut self, tone: Option<Tone>) {
        if self.tone != tone {
            log::debug!("buzzer {tone:?}");
            self.tone = tone;
            self.changed = true;
        }
    }
}

impl Sink for Buzzer {
    fn watches(&self, address: u16) -> bool {
        matches!(address, T1CNT | T1L | T1LC | P1 | P1DDR | P1FCR)
    }

    fn on_write(&mut self, _address: u16, _value: u8, memory: &mut Memory, _pic: &mut Pic) {
        let running = memory.sfr(T1CNT) & LRUN != 0;
        let pwm_out = memory.sfr(P1FCR) & PWM_PIN != 0 && memory.sfr(P1DDR) & PWM_PIN != 0;
        if !(running && pwm_out) {
            self.stop();
            return;
        }
        let period = 0x100 - u16::from(memory.sfr(T1L));
        let pulse_width = 0x100 - u16::from(memory.sfr(T1LC));
        self.play_tone(period, pulse_width);
    }
}
