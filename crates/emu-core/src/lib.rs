//! Core traits and types for cycle-accurate emulation.
//!
//! Every component counts time in CPU cycles. Wall-clock time is derived
//! from the cycle count through the currently selected oscillator, never
//! the other way round.

mod clock;
mod cpu;
mod observable;
mod ticks;

pub use clock::Oscillator;
pub use cpu::Cpu;
pub use observable::{Observable, Value, parse_address};
pub use ticks::Ticks;
