//! CPU core trait.

use crate::Ticks;

/// A CPU core.
///
/// The CPU does not own its bus. The bus is passed into every step so the
/// machine can keep peripherals, interrupt logic and memory together and
/// lend them to the CPU for the duration of one instruction.
///
/// Instruction-stepped cores return the cost of the instruction they just
/// retired so the caller can feed timers with the same cycle count.
pub trait Cpu<B: ?Sized> {
    /// Error raised when an instruction cannot complete.
    type Error;

    /// Fetch, decode and execute one instruction.
    fn step(&mut self, bus: &mut B) -> Result<Ticks, Self::Error>;

    /// Returns the current program counter.
    ///
    /// Returns `u32` to support all CPU address widths. Narrower CPUs
    /// zero-extend.
    fn pc(&self) -> u32;

    /// Reset the CPU to its initial state.
    fn reset(&mut self);
}
