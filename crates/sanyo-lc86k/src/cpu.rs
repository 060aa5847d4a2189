//! LC86K CPU core.

mod execute;

use emu_core::{Cpu, Observable, Oscillator, Ticks, Value};

use crate::bus::{Bus, BusError};
use crate::decode::{EncodedInstruction, Instruction, decode};
use crate::error::CpuError;
use crate::flash::FlashProgrammer;
use crate::opcodes;
use crate::registers::{EXT, EXT_FLASH};

/// Callback fired when the program counter is set from outside the
/// instruction stream.
pub type PcListener = Box<dyn FnMut(u16)>;

/// Sanyo LC86K-series CPU.
///
/// The CPU does not own the bus. Architectural registers other than PC
/// (ACC, PSW, B, C, SP, ...) are SFRs and live on the bus, so the core
/// itself only holds the program counter, the flash programming state and
/// bookkeeping about the last instruction.
pub struct Lc86k {
    pc: u16,
    /// Most recently retired instruction.
    last: Option<Instruction>,
    /// `STF` unlock handshake.
    flash: FlashProgrammer,
    /// Cycles retired since reset.
    cycles: Ticks,
    on_pc_change: Option<PcListener>,
}

impl Lc86k {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pc: 0,
            last: None,
            flash: FlashProgrammer::new(),
            cycles: Ticks::ZERO,
            on_pc_change: None,
        }
    }

    /// Current program counter.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Redirect execution. Fires the PC-changed listener.
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
        if let Some(listener) = self.on_pc_change.as_mut() {
            listener(pc);
        }
    }

    /// Install a listener for external PC changes (debugger, interrupt
    /// dispatch, firmware calls).
    pub fn set_pc_listener(&mut self, listener: Option<PcListener>) {
        self.on_pc_change = listener;
    }

    /// Set the program counter without notifying the listener.
    ///
    /// Only available in test builds.
    #[cfg(feature = "test-utils")]
    pub fn set_pc_silent(&mut self, pc: u16) {
        self.pc = pc;
    }

    /// Run one instruction starting at `pc`.
    ///
    /// Only available in test builds.
    #[cfg(feature = "test-utils")]
    pub fn step_at<B: Bus>(&mut self, bus: &mut B, pc: u16) -> Result<Instruction, CpuError> {
        self.pc = pc;
        self.run_next(bus)
    }

    /// The most recently retired instruction.
    #[must_use]
    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.last.as_ref()
    }

    /// Cycles retired since reset.
    #[must_use]
    pub fn cycles(&self) -> Ticks {
        self.cycles
    }

    #[must_use]
    pub fn flash_programmer(&self) -> &FlashProgrammer {
        &self.flash
    }

    /// Restore the flash handshake state (snapshots).
    pub fn set_flash_programmer(&mut self, flash: FlashProgrammer) {
        self.flash = flash;
    }

    /// Restore the retired cycle count (snapshots).
    pub fn set_cycles(&mut self, cycles: Ticks) {
        self.cycles = cycles;
    }

    /// Wall-clock duration of the last retired instruction.
    #[must_use]
    pub fn secs_per_instruction(&self, oscillator: &Oscillator) -> f64 {
        let cycles = self.last.map_or(0, |i| i.cycles());
        oscillator.seconds(Ticks::from(cycles))
    }

    /// Read the instruction at PC and advance PC past it.
    pub fn fetch<B: Bus>(&mut self, bus: &mut B) -> Result<EncodedInstruction, BusError> {
        let pc = self.pc;
        let opcode = bus.read_program(pc)?;
        let length = opcodes::info(opcode).length;
        let mut bytes = [opcode, 0, 0];
        for (i, byte) in bytes.iter_mut().enumerate().take(usize::from(length)).skip(1) {
            *byte = bus.read_program(pc.wrapping_add(i as u16))?;
        }
        self.pc = pc.wrapping_add(u16::from(length));
        Ok(EncodedInstruction { pc, bytes })
    }

    /// Fetch, decode and execute one instruction, then service a pending
    /// firmware call.
    ///
    /// On error PC is rewound to the faulting instruction and EXT to the
    /// program source it was fetched from, so a retry faults the same way.
    pub fn run_next<B: Bus>(&mut self, bus: &mut B) -> Result<Instruction, CpuError> {
        // A host write may have switched the source since the last step.
        self.follow_source_switch(bus)
            .map_err(|source| CpuError::Bus { pc: self.pc, source })?;

        let start = self.pc;
        let wrap = |source| CpuError::Bus { pc: start, source };
        let ext = bus.read(EXT).map_err(wrap)?;

        let encoded = self.fetch(bus).map_err(|e| {
            self.pc = start;
            wrap(e)
        })?;
        let instruction = decode(&encoded);
        log::trace!("{start:04X}  {instruction}");

        if let Err(e) = self
            .execute(bus, &instruction)
            .and_then(|()| self.follow_source_switch(bus))
            .and_then(|()| self.firmware_boundary(bus))
        {
            self.pc = start;
            bus.set_program_source(ext);
            return Err(wrap(e));
        }

        self.cycles += Ticks::from(instruction.cycles());
        self.last = Some(instruction);
        Ok(instruction)
    }

    /// While mask ROM is selected and the bus emulates the firmware, hand
    /// the PC to it and resume in flash.
    fn firmware_boundary<B: Bus>(&mut self, bus: &mut B) -> Result<(), BusError> {
        let ext = bus.read(EXT)?;
        if ext & EXT_FLASH != 0 {
            return Ok(());
        }
        if let Some(resume) = bus.firmware_call(self.pc)? {
            log::debug!("firmware call at {:04X}, resuming at {resume:04X}", self.pc);
            bus.set_program_source(ext | EXT_FLASH);
            self.set_pc(resume);
        }
        Ok(())
    }

    /// Host data write with the same effect as an instruction's, far jump
    /// included.
    pub fn write<B: Bus>(&mut self, bus: &mut B, address: u16, value: u8) -> Result<(), BusError> {
        bus.write(address, value)?;
        self.follow_source_switch(bus)
    }

    /// Take the far jump a program source switch requires.
    fn follow_source_switch<B: Bus>(&mut self, bus: &mut B) -> Result<(), BusError> {
        if let Some(target) = bus.take_far_jump(self.pc)? {
            log::debug!("program source switch, far jump {:04X} -> {target:04X}", self.pc);
            self.pc = target;
        }
        Ok(())
    }
}

impl Default for Lc86k {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Bus> Cpu<B> for Lc86k {
    type Error = CpuError;

    fn step(&mut self, bus: &mut B) -> Result<Ticks, CpuError> {
        self.run_next(bus).map(|i| Ticks::from(i.cycles()))
    }

    fn pc(&self) -> u32 {
        u32::from(self.pc)
    }

    fn reset(&mut self) {
        self.pc = 0;
        self.last = None;
        self.flash.reset();
        self.cycles = Ticks::ZERO;
    }
}

impl Observable for Lc86k {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.pc.into()),
            "cycles" => Some(self.cycles.get().into()),
            "last.pc" => self.last.map(|i| i.pc.into()),
            "last.opcode" => self.last.map(|i| i.opcode.into()),
            "last.text" => self.last.map(|i| Value::String(i.to_string())),
            "flash.state" => Some(Value::String(format!("{:?}", self.flash.state()))),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["pc", "cycles", "last.pc", "last.opcode", "last.text", "flash.state"]
    }
}
