//! VMU bus: memory map plus register side effects.
//!
//! Every data write, whether from an instruction or the host, goes through
//! the same pipeline:
//!
//! 1. register side effect (parity, bank repointing, work RAM, timers)
//! 2. bounds check
//! 3. XRAM dirty tracking
//! 4. store
//! 5. peripheral sinks
//! 6. memory-changed listener
//!
//! There is no back door that skips steps; a host poking T0CON reprograms
//! the live timer exactly as the guest would.

use sanyo_lc86k::registers::{EXT_FLASH, P, RAMBK0, parity};
use sanyo_lc86k::{Bus, BusError, Space, clock, follow_source_switch};

use emu_core::Oscillator;

use crate::firmware;
use crate::memory::{Memory, ProgramSource};
use crate::peripherals::Peripherals;
use crate::pic::{Irq, Pic};
use crate::sfr::{
    ACC, DATA_END, EXT, I01CR, I01CR_INT0_ENABLE, I01CR_INT0_SOURCE, I01CR_INT1_ENABLE,
    I01CR_INT1_SOURCE, OCR, P1, P1DDR, P3, P3DDR, P7, P7_DREAMCAST, P7_LOW_BATTERY, PSW, VCCR,
    VCCR_LCD_ON, VRMAD1, VRMAD2, VSEL, VSEL_INCE, VTRBF, WRITE_ONLY, XBNK, XRAM_BASE,
};
use crate::timers::Timers;

/// Value read back from write-only registers.
const WRITE_ONLY_READ: u8 = 0xFF;

/// Host callback for stored data writes: `(address, value)`.
pub type MemoryListener = Box<dyn FnMut(u16, u8)>;

pub struct VmuBus {
    pub memory: Memory,
    pub pic: Pic,
    pub timers: Timers,
    pub peripherals: Peripherals,
    /// Service ROM entry points in software (no BIOS image loaded).
    firmware_emulated: bool,
    /// Levels on the P7 input pins.
    external_pins: u8,
    /// Program source before an EXT write switched it, until the CPU
    /// collects the far jump that must follow.
    source_switch: Option<ProgramSource>,
    on_memory_change: Option<MemoryListener>,
}

impl VmuBus {
    #[must_use]
    pub fn new(memory: Memory, firmware_emulated: bool) -> Self {
        Self {
            memory,
            pic: Pic::new(),
            timers: Timers::new(),
            peripherals: Peripherals::new(),
            firmware_emulated,
            external_pins: 0,
            source_switch: None,
            on_memory_change: None,
        }
    }

    #[must_use]
    pub fn firmware_emulated(&self) -> bool {
        self.firmware_emulated
    }

    /// Install or clear the memory-changed listener.
    pub fn set_memory_listener(&mut self, listener: Option<MemoryListener>) {
        self.on_memory_change = listener;
    }

    /// CPU clock selected by OCR.
    #[must_use]
    pub fn oscillator(&self) -> Oscillator {
        clock::oscillator(self.memory.sfr(OCR))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Data read as the CPU sees it.
    pub fn read_data(&mut self, address: u16) -> Result<u8, BusError> {
        if address > DATA_END {
            return Err(out_of_range(address));
        }
        if WRITE_ONLY.contains(&address) {
            return Ok(WRITE_ONLY_READ);
        }
        if let Some(live) = self.timers.read(address) {
            return Ok(live);
        }
        if address == VTRBF {
            return self.transfer_buffer(None);
        }
        let m = &self.memory;
        Ok(match address {
            P1 => {
                // Nothing drives P1 inputs; they float high.
                let ddr = m.sfr(P1DDR);
                (m.sfr(P1) & ddr) | !ddr
            }
            P3 => {
                let ddr = m.sfr(P3DDR);
                (m.sfr(P3) & ddr) | (self.peripherals.gamepad.pins() & !ddr)
            }
            P7 => m.sfr(P7) | self.external_pins,
            _ => m.peek(address)?,
        })
    }

    /// Data read for read-modify-write: output latches and timer reloads
    /// instead of pins and live counters.
    pub fn read_data_latch(&mut self, address: u16) -> Result<u8, BusError> {
        if let Some(reload) = self.timers.latch(address) {
            return Ok(reload);
        }
        match address {
            P1 | P3 | P7 => Ok(self.memory.sfr(address)),
            _ => self.read_data(address),
        }
    }

    /// VTRBF access: read (`None`) or write work RAM at VRMAD, then step
    /// VRMAD if VSEL asks for it.
    fn transfer_buffer(&mut self, write: Option<u8>) -> Result<u8, BusError> {
        let lo = self.memory.sfr(VRMAD1);
        let hi = self.memory.sfr(VRMAD2) & 1;
        let index = usize::from(u16::from_be_bytes([hi, lo]));
        let cell = self
            .memory
            .wram_mut()
            .get_mut(index)
            .ok_or(BusError::OutOfRange {
                space: Space::WorkRam,
                address: index as u32,
            })?;
        if let Some(value) = write {
            *cell = value;
        }
        let value = *cell;

        if self.memory.sfr(VSEL) & VSEL_INCE != 0 {
            let next = lo.wrapping_add(1);
            self.memory.set_sfr(VRMAD1, next);
            if next == 0 {
                let vrmad2 = self.memory.sfr(VRMAD2);
                self.memory.set_sfr(VRMAD2, vrmad2 ^ 1);
            }
        }
        Ok(value)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Data write through the full side-effect pipeline.
    pub fn write_data(&mut self, address: u16, value: u8) -> Result<(), BusError> {
        let value = self.side_effect(address, value)?;

        let old = self.memory.peek(address)?;
        if address >= XRAM_BASE && old != value {
            self.peripherals.display.mark_dirty();
        }
        self.memory.poke(address, value)?;

        self.peripherals
            .dispatch(address, value, &mut self.memory, &mut self.pic);

        if let Some(listener) = self.on_memory_change.as_mut() {
            listener(address, value);
        }
        Ok(())
    }

    /// Register-specific behaviour ahead of the store. Returns the byte to
    /// store, which differs from `value` only for PSW's parity bit.
    fn side_effect(&mut self, address: u16, value: u8) -> Result<u8, BusError> {
        let old = self.memory.sfr(address);
        match address {
            ACC => {
                let psw = self.memory.sfr(PSW);
                self.memory.set_sfr(PSW, (psw & !P) | parity(value));
            }
            PSW => {
                let value = (value & !P) | parity(self.memory.sfr(ACC));
                if (old ^ value) & RAMBK0 != 0 {
                    self.memory.select_ram_bank(u8::from(value & RAMBK0 != 0));
                }
                return Ok(value);
            }
            VTRBF => {
                self.transfer_buffer(Some(value))?;
            }
            EXT => {
                let before = self.memory.program_source();
                let source = program_source(value);
                if source != before {
                    self.source_switch.get_or_insert(before);
                    self.memory.set_program_source(source);
                }
            }
            XBNK => {
                if value > 2 {
                    return Err(BusError::InvalidBankSelect(value));
                }
                if self.memory.sfr(VCCR) & VCCR_LCD_ON != 0 {
                    self.memory.select_xram_bank(value)?;
                }
            }
            VCCR => {
                if (old ^ value) & VCCR_LCD_ON != 0 && value & VCCR_LCD_ON != 0 {
                    self.memory.select_xram_bank(self.memory.sfr(XBNK))?;
                }
            }
            _ => {
                let memory = &self.memory;
                self.timers.write(address, old, value, memory);
            }
        }
        Ok(value)
    }

    // =========================================================================
    // External pins
    // =========================================================================

    #[must_use]
    pub fn external_pins(&self) -> u8 {
        self.external_pins
    }

    /// Set pin levels without raising interrupts (snapshots).
    pub(crate) fn restore_external_pins(&mut self, pins: u8) {
        self.external_pins = pins;
    }

    /// Drive a P7 input. Any level change requests INT0 (Dreamcast
    /// connection) or INT1 (low battery) when I01CR enables it.
    pub fn set_external_pin(&mut self, pin: u8, high: bool) {
        let old = self.external_pins;
        if high {
            self.external_pins |= pin;
        } else {
            self.external_pins &= !pin;
        }
        if old == self.external_pins {
            return;
        }
        let i01cr = self.memory.sfr(I01CR);
        let (enable, source, irq) = match pin {
            P7_DREAMCAST => (I01CR_INT0_ENABLE, I01CR_INT0_SOURCE, Irq::ExtInt0),
            P7_LOW_BATTERY => (I01CR_INT1_ENABLE, I01CR_INT1_SOURCE, Irq::ExtInt1),
            _ => return,
        };
        if i01cr & enable != 0 {
            self.memory.set_sfr(I01CR, i01cr | source);
            self.pic.raise(irq);
        }
    }
}

fn program_source(ext: u8) -> ProgramSource {
    if ext & EXT_FLASH != 0 {
        ProgramSource::Flash
    } else {
        ProgramSource::Rom
    }
}

fn out_of_range(address: u16) -> BusError {
    BusError::OutOfRange {
        space: Space::Data,
        address: u32::from(address),
    }
}

impl Bus for VmuBus {
    fn read(&mut self, address: u16) -> Result<u8, BusError> {
        self.read_data(address)
    }

    fn read_latch(&mut self, address: u16) -> Result<u8, BusError> {
        self.read_data_latch(address)
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), BusError> {
        self.write_data(address, value)
    }

    fn read_program(&mut self, address: u16) -> Result<u8, BusError> {
        self.memory.read_program(address)
    }

    fn read_flash(&mut self, address: u32) -> Result<u8, BusError> {
        self.memory.read_flash(address)
    }

    fn write_flash(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        self.memory.write_flash(address, value)
    }

    fn push(&mut self, value: u8) -> Result<(), BusError> {
        if let Err(fault) = self.memory.push_stack(value) {
            log::warn!("{fault}");
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<u8, BusError> {
        let (value, fault) = self.memory.pop_stack();
        if let Some(fault) = fault {
            log::warn!("{fault}");
        }
        Ok(value)
    }

    fn return_from_interrupt(&mut self) -> Result<u16, BusError> {
        Ok(self.pic.return_from_interrupt(&mut self.memory))
    }

    fn take_far_jump(&mut self, pc: u16) -> Result<Option<u16>, BusError> {
        let Some(before) = self.source_switch.take() else {
            return Ok(None);
        };
        let memory = &self.memory;
        follow_source_switch(pc, |address| memory.read_program_from(before, address))
    }

    fn set_program_source(&mut self, ext: u8) {
        self.memory.set_sfr(EXT, ext);
        self.memory.set_program_source(program_source(ext));
        self.source_switch = None;
    }

    fn firmware_call(&mut self, pc: u16) -> Result<Option<u16>, BusError> {
        if !self.firmware_emulated {
            return Ok(None);
        }
        firmware::call(&mut self.memory, pc)
    }
}
