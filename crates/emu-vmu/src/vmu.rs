//! Top-level VMU device.
//!
//! # Update loop
//!
//! `update()` adds wall-clock time to a budget and runs whole instruction
//! cycles until the budget is spent. One cycle is:
//!
//! 1. fetch, decode, execute (or idle one cycle while halted)
//! 2. advance the timers by the instruction's cycle count
//! 3. let the interrupt controller admit a request
//!
//! Time is derived from cycles through the oscillator OCR selects, so a
//! guest that switches to the 32 kHz quartz simply runs fewer
//! instructions per update.

use emu_core::{Cpu, Observable, Oscillator, Ticks, Value, parse_address};
use sanyo_lc86k::registers::{EXT_FLASH, PCON_HALT};
use sanyo_lc86k::{Bus, Lc86k};

use crate::bus::VmuBus;
use crate::buzzer::Tone;
use crate::config::VmuConfig;
use crate::error::{SnapshotError, VmuError};
use crate::gamepad::Button;
use crate::memory::Memory;
use crate::peripherals::Peripherals;
use crate::serial::Channel;
use crate::sfr::{
    ACC, B, C, EXT, IE, P3, P7_DREAMCAST, P7_LOW_BATTERY, PCON, PSW, SP, VCCR, VSEL, XBNK,
};
use crate::snapshot::{self, State};

/// SP after reset.
const SP_RESET: u8 = 0x7F;
/// IE after reset.
const IE_RESET: u8 = 0xFF;
/// VSEL after reset.
const VSEL_RESET: u8 = 0xFC;
/// VCCR after reset: LCD on.
const VCCR_RESET: u8 = 0x80;
/// P3 latch after reset.
const P3_RESET: u8 = 0xFF;

/// RAM bank 0 byte the BIOS checks to decide whether the clock is set.
const DATE_SET_FLAG: usize = 0x31;

/// Sega Dreamcast Visual Memory Unit.
pub struct Vmu {
    cpu: Lc86k,
    bus: VmuBus,
    skip_bios_setup: bool,
    /// Wall-clock seconds still to be emulated.
    budget: f64,
    /// Emulated seconds since reset.
    elapsed: f64,
}

impl Vmu {
    /// Build a VMU and reset it.
    pub fn new(config: &VmuConfig) -> Result<Self, VmuError> {
        config.validate()?;

        let mut memory = Memory::new();
        if let Some(bios) = &config.bios {
            memory.load_rom(bios);
        }
        if let Some(flash) = &config.flash {
            memory.load_flash(flash);
        }

        let mut vmu = Self {
            cpu: Lc86k::new(),
            bus: VmuBus::new(memory, config.bios.is_none()),
            skip_bios_setup: config.bios.is_some() && config.skip_bios_setup,
            budget: 0.0,
            elapsed: 0.0,
        };
        vmu.reset();
        Ok(vmu)
    }

    /// Power-on reset. ROM and flash contents survive.
    pub fn reset(&mut self) {
        let bus = &mut self.bus;
        bus.memory.clear();
        bus.pic.reset();
        bus.timers.reset();
        bus.peripherals = Peripherals::new();
        // Without a BIOS there is nothing in ROM to run.
        let ext = if bus.firmware_emulated() { EXT_FLASH } else { 0 };
        bus.set_program_source(ext);

        let memory = &mut bus.memory;
        memory.set_sfr(SP, SP_RESET);
        memory.set_sfr(IE, IE_RESET);
        memory.set_sfr(VSEL, VSEL_RESET);
        memory.set_sfr(VCCR, VCCR_RESET);
        memory.set_sfr(P3, P3_RESET);
        memory.set_sfr(XBNK, 0);
        memory.sync_segments();
        if self.skip_bios_setup {
            memory.ram_mut(0)[DATE_SET_FLAG] = 0xFF;
        }
        bus.peripherals.display.set_enabled(true);

        <Lc86k as Cpu<VmuBus>>::reset(&mut self.cpu);
        self.budget = 0.0;
        self.elapsed = 0.0;
    }

    /// Run one instruction cycle. Returns the CPU cycles consumed.
    ///
    /// On error the faulting instruction has not retired and PC still
    /// points at it.
    pub fn step(&mut self) -> Result<u32, VmuError> {
        self.step_timed().map(|(cycles, _)| cycles)
    }

    fn step_timed(&mut self) -> Result<(u32, f64), VmuError> {
        let cycles = if self.halted() {
            1
        } else {
            let instruction = self.cpu.run_next(&mut self.bus).inspect_err(|e| {
                log::warn!("{e} (PC {:04X})", e.pc());
            })?;
            self.bus.pic.instruction_complete();
            u32::from(instruction.cycles())
        };

        let secs = self.oscillator().seconds(Ticks::new(u64::from(cycles)));
        let bus = &mut self.bus;
        bus.timers.update(&mut bus.memory, &mut bus.pic, cycles, secs);

        if let Some(vector) = bus.pic.admit(&mut bus.memory, self.cpu.pc()) {
            self.cpu.set_pc(vector);
        }
        self.elapsed += secs;
        Ok((cycles, secs))
    }

    /// Emulate `delta_secs` of wall-clock time. Leftover time (or overrun)
    /// carries into the next call. Returns the cycles run.
    pub fn update(&mut self, delta_secs: f64) -> Result<u64, VmuError> {
        self.budget += delta_secs;
        let mut cycles = 0;
        while self.budget > 0.0 {
            let (spent, secs) = self.step_timed()?;
            cycles += u64::from(spent);
            self.budget -= secs;
        }
        Ok(cycles)
    }

    /// Whether PCON HALT is set.
    #[must_use]
    pub fn halted(&self) -> bool {
        self.bus.memory.sfr(PCON) & PCON_HALT != 0
    }

    /// CPU clock currently selected by OCR.
    #[must_use]
    pub fn oscillator(&self) -> Oscillator {
        self.bus.oscillator()
    }

    /// Emulated time since reset.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed
    }

    // =========================================================================
    // Host access
    // =========================================================================

    /// Host data write, with the same side effects as a guest `ST`,
    /// including the far jump that goes with a program source switch.
    pub fn write_data(&mut self, address: u16, value: u8) -> Result<(), VmuError> {
        self.cpu.write(&mut self.bus, address, value)?;
        Ok(())
    }

    /// Host data read. Reads have side effects too (VTRBF).
    pub fn read_data(&mut self, address: u16) -> Result<u8, VmuError> {
        Ok(self.bus.read_data(address)?)
    }

    /// Press or release a button.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        let bus = &mut self.bus;
        bus.peripherals
            .gamepad
            .set_button(button, pressed, &mut bus.memory, &mut bus.pic);
    }

    /// Plug into or pull out of a controller.
    pub fn set_dreamcast_connected(&mut self, connected: bool) {
        self.bus.set_external_pin(P7_DREAMCAST, connected);
    }

    pub fn set_low_battery(&mut self, low: bool) {
        self.bus.set_external_pin(P7_LOW_BATTERY, low);
    }

    /// Deliver a byte on a serial channel.
    pub fn serial_receive(&mut self, channel: Channel, byte: u8) {
        let bus = &mut self.bus;
        bus.peripherals
            .serial
            .receive(channel, byte, &mut bus.memory, &mut bus.pic);
    }

    /// Bytes the guest sent since the last call.
    pub fn take_serial_output(&mut self) -> Vec<(Channel, u8)> {
        self.bus.peripherals.serial.take_transmitted()
    }

    /// LCD pixel, `true` for dark.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.bus.peripherals.display.pixel(&self.bus.memory, x, y)
    }

    /// Whole LCD, row-major.
    #[must_use]
    pub fn frame(&self) -> Vec<bool> {
        self.bus.peripherals.display.frame(&self.bus.memory)
    }

    /// Status icon byte from XRAM bank 2.
    #[must_use]
    pub fn icon_byte(&self, index: usize) -> u8 {
        self.bus.peripherals.display.icon_byte(&self.bus.memory, index)
    }

    /// Whether the screen needs redrawing, clearing the flag.
    pub fn take_display_dirty(&mut self) -> bool {
        self.bus.peripherals.display.take_dirty()
    }

    #[must_use]
    pub fn tone(&self) -> Option<Tone> {
        self.bus.peripherals.buzzer.tone()
    }

    /// Sound a tone directly (host sound commands).
    pub fn play_tone(&mut self, period: u16, pulse_width: u16) {
        self.bus.peripherals.buzzer.play_tone(period, pulse_width);
    }

    #[must_use]
    pub fn cpu(&self) -> &Lc86k {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Lc86k {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &VmuBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut VmuBus {
        &mut self.bus
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn save_state(&self) -> Result<Vec<u8>, VmuError> {
        let state = State {
            pc: self.cpu.pc(),
            cycles: self.cpu.cycles(),
            flash_programmer: self.cpu.flash_programmer().clone(),
            memory: self.bus.memory.image(),
            pic: self.bus.pic.clone(),
            timers: self.bus.timers.clone(),
            peripherals: self.bus.peripherals.clone(),
            external_pins: self.bus.external_pins(),
            budget: self.budget,
            elapsed: self.elapsed,
        };
        Ok(snapshot::encode(&state)?)
    }

    /// Restore a snapshot from [`Vmu::save_state`]. On error the VMU is
    /// unchanged.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), VmuError> {
        let state = snapshot::decode(bytes)?;
        if !self.bus.memory.restore(&state.memory) {
            return Err(SnapshotError::Layout.into());
        }
        let ext = self.bus.memory.sfr(EXT);
        self.bus.set_program_source(ext);
        self.bus.pic = state.pic;
        self.bus.timers = state.timers;
        self.bus.peripherals = state.peripherals;
        self.bus.restore_external_pins(state.external_pins);
        self.cpu.set_pc(state.pc);
        self.cpu.set_cycles(state.cycles);
        self.cpu.set_flash_programmer(state.flash_programmer);
        self.budget = state.budget;
        self.elapsed = state.elapsed;
        Ok(())
    }
}

impl Observable for Vmu {
    fn query(&self, path: &str) -> Option<Value> {
        let memory = &self.bus.memory;
        if let Some(rest) = path.strip_prefix("cpu.") {
            let register = match rest {
                "acc" => ACC,
                "psw" => PSW,
                "b" => B,
                "c" => C,
                "sp" => SP,
                _ => return self.cpu.query(rest),
            };
            Some(memory.sfr(register).into())
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest)
                .and_then(|a| memory.peek(a).ok())
                .map(Value::U8)
        } else if let Some(rest) = path.strip_prefix("pic.") {
            let pic = &self.bus.pic;
            match rest {
                "pending" => Some(pic.pending().into()),
                "active" => Some(Value::String(format!("{:?}", pic.active_priority()))),
                "prev_priority" => Some(Value::String(format!("{:?}", pic.prev_priority()))),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("timers.") {
            let timers = &self.bus.timers;
            match rest {
                "t0l" => Some(timers.t0.low.into()),
                "t0h" => Some(timers.t0.high.into()),
                "t1l" => Some(timers.t1.low.into()),
                "t1h" => Some(timers.t1.high.into()),
                "prescale" => Some(timers.prescale.into()),
                _ => None,
            }
        } else {
            match path {
                "display.enabled" => Some(self.bus.peripherals.display.enabled().into()),
                "buzzer.tone" => Some(Value::String(format!("{:?}", self.tone()))),
                "halted" => Some(self.halted().into()),
                "elapsed" => Some(self.elapsed.into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.pc",
            "cpu.cycles",
            "cpu.last.pc",
            "cpu.last.opcode",
            "cpu.last.text",
            "cpu.flash.state",
            "cpu.acc",
            "cpu.psw",
            "cpu.b",
            "cpu.c",
            "cpu.sp",
            "memory.<address>",
            "pic.pending",
            "pic.active",
            "pic.prev_priority",
            "timers.t0l",
            "timers.t0h",
            "timers.t1l",
            "timers.t1h",
            "timers.prescale",
            "display.enabled",
            "buzzer.tone",
            "halted",
            "elapsed",
        ]
    }
}
