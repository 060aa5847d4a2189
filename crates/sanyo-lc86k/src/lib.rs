//! Cycle-accurate Sanyo LC86K-series 8-bit CPU emulator.
//!
//! Each call to `run_next()` retires exactly one instruction and reports
//! it, including its fixed cycle cost, so the caller can clock timers by
//! the same amount.

pub mod alu;
mod bus;
pub mod clock;
mod cpu;
mod decode;
mod error;
mod flash;
pub mod opcodes;
pub mod registers;

pub use bus::{
    Bus, BusError, SimpleBus, Space, StackFault, follow_source_switch, pop_wrapped, push_wrapped,
};
pub use cpu::{Lc86k, PcListener};
pub use decode::{EncodedInstruction, Instruction, Operands, decode};
pub use error::CpuError;
pub use flash::{FlashError, FlashProgrammer, FlashState, PAGE_SIZE};
pub use opcodes::{Layout, Mnemonic, OPCODES, OpcodeInfo};
