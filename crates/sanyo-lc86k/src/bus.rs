//! Bus interface between the LC86K core and the rest of the chip.
//!
//! The core sees three spaces: the 9-bit internal data space (RAM, SFRs,
//! XRAM), the 16-bit program space (mask ROM or flash, selected by EXT)
//! and the 17-bit flash space used by `LDF`/`STF`.

use thiserror::Error;

use crate::opcodes::far_jump_target;
use crate::registers::{self, ACC, EXT, EXT_FLASH, PSW, SP, STACK_BASE, STACK_END};

/// Fatal addressing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusError {
    #[error("{space} address {address:#06X} out of range")]
    OutOfRange { space: Space, address: u32 },
    #[error("XRAM bank {0} does not exist")]
    InvalidBankSelect(u8),
}

/// Address space named in a [`BusError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Space {
    Data,
    Program,
    Flash,
    WorkRam,
}

impl std::fmt::Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Space::Data => "data",
            Space::Program => "program",
            Space::Flash => "flash",
            Space::WorkRam => "work RAM",
        })
    }
}

/// Stack pointer left its window in RAM bank 0.
///
/// The access itself has already happened with the pointer wrapped, as the
/// hardware does; this only reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackFault {
    #[error("stack overflow (SP was {sp:#04X})")]
    Overflow { sp: u8 },
    #[error("stack underflow (SP was {sp:#04X})")]
    Underflow { sp: u8 },
}

/// Push with the pointer wrapped inside bank 0, reporting overflow.
///
/// `ram0` is the 256-byte RAM bank 0 and `sp` the stack pointer register.
pub fn push_wrapped(ram0: &mut [u8], sp: &mut u8, value: u8) -> Result<(), StackFault> {
    let before = *sp;
    *sp = sp.wrapping_add(1);
    ram0[usize::from(*sp)] = value;
    if before >= STACK_END {
        return Err(StackFault::Overflow { sp: before });
    }
    Ok(())
}

/// Pop with the pointer wrapped inside bank 0, reporting underflow.
pub fn pop_wrapped(ram0: &[u8], sp: &mut u8) -> (u8, Option<StackFault>) {
    let before = *sp;
    let value = ram0[usize::from(before)];
    *sp = before.wrapping_sub(1);
    let fault = (before <= STACK_BASE).then_some(StackFault::Underflow { sp: before });
    (value, fault)
}

/// Decode the instruction at `pc` through `read` after a program source
/// switch. Returns the far jump target, or `None` (with a warning) when
/// the switch is not followed by `JMPF`.
pub fn follow_source_switch(
    pc: u16,
    mut read: impl FnMut(u16) -> Result<u8, BusError>,
) -> Result<Option<u16>, BusError> {
    let bytes = [read(pc)?, read(pc.wrapping_add(1))?, read(pc.wrapping_add(2))?];
    let target = far_jump_target(bytes);
    if target.is_none() {
        log::warn!("program source switched at {pc:04X} without a following JMPF");
    }
    Ok(target)
}

/// Everything the CPU touches while executing.
///
/// `read_latch` must be used by read-modify-write instructions so that
/// port and timer registers return the value the CPU last wrote instead of
/// the live pin or counter state.
pub trait Bus {
    /// Read the internal data space.
    fn read(&mut self, address: u16) -> Result<u8, BusError>;

    /// Read for read-modify-write: latches instead of pins.
    fn read_latch(&mut self, address: u16) -> Result<u8, BusError> {
        self.read(address)
    }

    /// Write the internal data space, firing register side effects.
    fn write(&mut self, address: u16, value: u8) -> Result<(), BusError>;

    /// Read the currently selected program source.
    fn read_program(&mut self, address: u16) -> Result<u8, BusError>;

    /// Read the flash array (17-bit address).
    fn read_flash(&mut self, address: u32) -> Result<u8, BusError>;

    /// Program one flash byte. The CPU has already validated the
    /// unlock sequence.
    fn write_flash(&mut self, address: u32, value: u8) -> Result<(), BusError>;

    /// Push onto the bank 0 stack.
    fn push(&mut self, value: u8) -> Result<(), BusError>;

    /// Pop from the bank 0 stack.
    fn pop(&mut self) -> Result<u8, BusError>;

    /// `RETI`: pop the return address and release the innermost
    /// interrupt level.
    fn return_from_interrupt(&mut self) -> Result<u16, BusError> {
        let hi = self.pop()?;
        let lo = self.pop()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Firmware entry point hook, consulted after each instruction while
    /// EXT selects mask ROM. Returns the address to resume at in flash when
    /// the bus serviced a call at `pc` in software.
    fn firmware_call(&mut self, _pc: u16) -> Result<Option<u16>, BusError> {
        Ok(None)
    }

    /// Collect the far jump owed by a data write that switched the program
    /// source. `pc` is the address of the instruction after the write; it
    /// is decoded from the source that was selected before the switch.
    fn take_far_jump(&mut self, _pc: u16) -> Result<Option<u16>, BusError> {
        Ok(None)
    }

    /// Store `ext` in EXT and select the program source it names, dropping
    /// any pending far jump. For firmware returns and for rewinding a
    /// failed instruction, neither of which is followed by `JMPF`.
    fn set_program_source(&mut self, ext: u8);

    /// Effective address of indirect mode `mode` under the current PSW.
    fn indirect_address(&mut self, mode: u8) -> Result<u16, BusError> {
        let psw = self.read(PSW)?;
        let pointer = self.read(registers::indirect_register(psw, mode))?;
        Ok(registers::indirect_target(pointer, mode))
    }
}

/// Flat bus for testing: 512 bytes of data space, 64 KB of program space,
/// 128 KB of flash.
///
/// Only ACC parity is modelled. Data addresses 0x000-0x0FF double as
/// RAM bank 0 for the stack; bank switching and peripherals belong to the
/// machine.
pub struct SimpleBus {
    pub data: [u8; 0x200],
    pub program: Vec<u8>,
    pub flash: Vec<u8>,
    /// EXT bit 0 changed since the last far jump was collected.
    source_switched: bool,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        let mut data = [0; 0x200];
        data[usize::from(SP)] = registers::SP_RESET;
        data[usize::from(EXT)] = registers::EXT_FLASH;
        Self {
            data,
            program: vec![0; 0x1_0000],
            flash: vec![0; 0x2_0000],
            source_switched: false,
        }
    }

    /// A bus with `code` placed at address 0 of the program space.
    #[must_use]
    pub fn with_program(code: &[u8]) -> Self {
        let mut bus = Self::new();
        bus.load(0, code);
        bus
    }

    /// Copy bytes into program space.
    pub fn load(&mut self, address: u16, bytes: &[u8]) {
        let start = usize::from(address);
        self.program[start..start + bytes.len()].copy_from_slice(bytes);
    }

    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.data[usize::from(address) & 0x1FF]
    }

    pub fn poke(&mut self, address: u16, value: u8) {
        // Route through write so ACC parity holds.
        let stored = self.write(address, value);
        debug_assert!(stored.is_ok(), "poke {address:#05X} outside data space");
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> Result<u8, BusError> {
        self.data
            .get(usize::from(address))
            .copied()
            .ok_or(BusError::OutOfRange {
                space: Space::Data,
                address: u32::from(address),
            })
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), BusError> {
        let index = usize::from(address);
        if index >= self.data.len() {
            return Err(BusError::OutOfRange {
                space: Space::Data,
                address: u32::from(address),
            });
        }
        if address == EXT && (self.data[index] ^ value) & EXT_FLASH != 0 {
            self.source_switched = true;
        }
        self.data[index] = value;
        let psw = usize::from(PSW);
        if address == ACC {
            self.data[psw] = (self.data[psw] & !registers::P) | registers::parity(value);
        } else if address == PSW {
            let acc = self.data[usize::from(ACC)];
            self.data[psw] = (value & !registers::P) | registers::parity(acc);
        }
        Ok(())
    }

    fn read_program(&mut self, address: u16) -> Result<u8, BusError> {
        Ok(self.program[usize::from(address)])
    }

    fn take_far_jump(&mut self, pc: u16) -> Result<Option<u16>, BusError> {
        if !std::mem::take(&mut self.source_switched) {
            return Ok(None);
        }
        // One program array: both sources read the same bytes.
        follow_source_switch(pc, |address| Ok(self.program[usize::from(address)]))
    }

    fn set_program_source(&mut self, ext: u8) {
        self.data[usize::from(EXT)] = ext;
        self.source_switched = false;
    }

    fn read_flash(&mut self, address: u32) -> Result<u8, BusError> {
        self.flash
            .get(address as usize)
            .copied()
            .ok_or(BusError::OutOfRange {
                space: Space::Flash,
                address,
            })
    }

    fn write_flash(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        let cell = self
            .flash
            .get_mut(address as usize)
            .ok_or(BusError::OutOfRange {
                space: Space::Flash,
                address,
            })?;
        *cell = value;
        Ok(())
    }

    fn push(&mut self, value: u8) -> Result<(), BusError> {
        let mut sp = self.data[usize::from(SP)];
        let result = push_wrapped(&mut self.data[..0x100], &mut sp, value);
        self.data[usize::from(SP)] = sp;
        if let Err(fault) = result {
            log::warn!("{fault}");
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<u8, BusError> {
        let mut sp = self.data[usize::from(SP)];
        let (value, fault) = pop_wrapped(&self.data[..0x100], &mut sp);
        self.data[usize::from(SP)] = sp;
        if let Some(fault) = fault {
            log::warn!("{fault}");
        }
        Ok(value)
    }
}
