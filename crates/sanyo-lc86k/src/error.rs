//! CPU error type.

use thiserror::Error;

use crate::bus::BusError;

/// An instruction that could not complete.
///
/// The program counter is left at the faulting instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("at PC {pc:#06X}: {source}")]
    Bus {
        pc: u16,
        #[source]
        source: BusError,
    },
    #[error("invalid opcode {opcode:#04X} at PC {pc:#06X}")]
    InvalidOpcode { pc: u16, opcode: u8 },
}

impl CpuError {
    /// Address of the instruction that failed.
    #[must_use]
    pub fn pc(&self) -> u16 {
        match self {
            CpuError::Bus { pc, .. } | CpuError::InvalidOpcode { pc, .. } => *pc,
        }
    }
}
