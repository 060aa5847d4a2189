//! VMU memory map.
//!
//! # Internal data space ($000-$1FF)
//!
//! | Range       | Segment | Backing                                  |
//! |-------------|---------|------------------------------------------|
//! | $000-$07F   | GP1     | RAM bank 0/1 (PSW RAMBK0), lower half    |
//! | $080-$0FF   | GP2     | RAM bank 0/1 (PSW RAMBK0), upper half    |
//! | $100-$17F   | SFR     | special function registers               |
//! | $180-$1FF   | XRAM    | video RAM bank 0/1/2 (XBNK)              |
//!
//! The stack always lives in RAM bank 0 regardless of RAMBK0.
//!
//! # Program space ($0000-$FFFF)
//!
//! Mask ROM (BIOS) or flash bank 0, selected by EXT bit 0. `LDF`/`STF`
//! see the full 128 KB of flash.

use sanyo_lc86k::registers::{EXT_FLASH, RAMBK0};
use serde::{Deserialize, Serialize};
use sanyo_lc86k::{BusError, Space, StackFault, pop_wrapped, push_wrapped};

use crate::sfr::{self, EXT, PSW, SP, VCCR, VCCR_LCD_ON, XBNK};

/// General purpose RAM bank size.
pub const RAM_BANK_SIZE: usize = 256;
/// XRAM bank size.
pub const XRAM_BANK_SIZE: usize = 128;
/// Number of XRAM banks (two LCD halves and the icon bank).
pub const XRAM_BANKS: usize = 3;
/// Work RAM size.
pub const WRAM_SIZE: usize = 512;
/// Mask ROM size.
pub const ROM_SIZE: usize = 0x1_0000;
/// Flash size (two 64 KB banks).
pub const FLASH_SIZE: usize = 0x2_0000;

/// Backing array behind one 128-byte segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Half of a RAM bank: `(bank, offset)`.
    Ram(u8, u8),
    Sfr,
    Xram(u8),
}

/// Active program space array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramSource {
    Rom,
    Flash,
}

/// All VMU storage plus the segment table.
///
/// Accesses here have no side effects; `VmuBus` layers register
/// behaviour on top.
pub struct Memory {
    ram: [[u8; RAM_BANK_SIZE]; 2],
    sfr: [u8; 128],
    xram: [[u8; XRAM_BANK_SIZE]; XRAM_BANKS],
    wram: [u8; WRAM_SIZE],
    rom: Vec<u8>,
    flash: Vec<u8>,
    segments: [Segment; 4],
    program: ProgramSource,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: [[0; RAM_BANK_SIZE]; 2],
            sfr: [0; 128],
            xram: [[0; XRAM_BANK_SIZE]; XRAM_BANKS],
            wram: [0; WRAM_SIZE],
            rom: vec![0; ROM_SIZE],
            flash: vec![0; FLASH_SIZE],
            segments: [Segment::Ram(0, 0), Segment::Ram(0, 0x80), Segment::Sfr, Segment::Xram(0)],
            program: ProgramSource::Rom,
        }
    }

    /// Clear RAM, SFRs, XRAM and work RAM. ROM and flash survive.
    pub fn clear(&mut self) {
        self.ram = [[0; RAM_BANK_SIZE]; 2];
        self.sfr = [0; 128];
        self.xram = [[0; XRAM_BANK_SIZE]; XRAM_BANKS];
        self.wram = [0; WRAM_SIZE];
        self.sync_segments();
    }

    /// Copy a BIOS image into mask ROM.
    pub fn load_rom(&mut self, image: &[u8]) {
        let len = image.len().min(ROM_SIZE);
        self.rom[..len].copy_from_slice(&image[..len]);
    }

    /// Copy an image into flash from address 0.
    pub fn load_flash(&mut self, image: &[u8]) {
        let len = image.len().min(FLASH_SIZE);
        self.flash[..len].copy_from_slice(&image[..len]);
    }

    // =========================================================================
    // Segments
    // =========================================================================

    fn resolve(&self, address: u16) -> Result<(Segment, usize), BusError> {
        if address > sfr::DATA_END {
            return Err(BusError::OutOfRange {
                space: Space::Data,
                address: u32::from(address),
            });
        }
        Ok((self.segments[usize::from(address >> 7)], usize::from(address & 0x7F)))
    }

    /// Read through the segment table.
    pub fn peek(&self, address: u16) -> Result<u8, BusError> {
        let (segment, offset) = self.resolve(address)?;
        Ok(match segment {
            Segment::Ram(bank, base) => self.ram[usize::from(bank)][usize::from(base) + offset],
            Segment::Sfr => self.sfr[offset],
            Segment::Xram(bank) => self.xram[usize::from(bank)][offset],
        })
    }

    /// Write through the segment table.
    pub fn poke(&mut self, address: u16, value: u8) -> Result<(), BusError> {
        let (segment, offset) = self.resolve(address)?;
        match segment {
            Segment::Ram(bank, base) => self.ram[usize::from(bank)][usize::from(base) + offset] = value,
            Segment::Sfr => self.sfr[offset] = value,
            Segment::Xram(bank) => self.xram[usize::from(bank)][offset] = value,
        }
        Ok(())
    }

    /// Raw SFR byte.
    #[must_use]
    pub fn sfr(&self, address: u16) -> u8 {
        self.sfr[sfr::index(address)]
    }

    /// Store a raw SFR byte.
    pub fn set_sfr(&mut self, address: u16, value: u8) {
        self.sfr[sfr::index(address)] = value;
    }

    #[must_use]
    pub fn segments(&self) -> [Segment; 4] {
        self.segments
    }

    /// Point GP1/GP2 at the RAM bank selected by PSW.
    pub fn select_ram_bank(&mut self, bank: u8) {
        self.segments[0] = Segment::Ram(bank & 1, 0);
        self.segments[1] = Segment::Ram(bank & 1, 0x80);
    }

    /// Point the XRAM segment at `bank`.
    pub fn select_xram_bank(&mut self, bank: u8) -> Result<(), BusError> {
        if usize::from(bank) >= XRAM_BANKS {
            return Err(BusError::InvalidBankSelect(bank));
        }
        self.segments[3] = Segment::Xram(bank);
        Ok(())
    }

    /// Recompute every selector from the stored SFRs (reset, snapshots).
    pub fn sync_segments(&mut self) {
        self.select_ram_bank(u8::from(self.sfr(PSW) & RAMBK0 != 0));
        let xbnk = self.sfr(XBNK);
        if self.sfr(VCCR) & VCCR_LCD_ON != 0 && usize::from(xbnk) < XRAM_BANKS {
            self.segments[3] = Segment::Xram(xbnk);
        }
        self.program = if self.sfr(EXT) & EXT_FLASH != 0 {
            ProgramSource::Flash
        } else {
            ProgramSource::Rom
        };
    }

    // =========================================================================
    // Banked arrays
    // =========================================================================

    #[must_use]
    pub fn ram(&self, bank: usize) -> &[u8; RAM_BANK_SIZE] {
        &self.ram[bank & 1]
    }

    pub fn ram_mut(&mut self, bank: usize) -> &mut [u8; RAM_BANK_SIZE] {
        &mut self.ram[bank & 1]
    }

    #[must_use]
    pub fn xram(&self, bank: usize) -> &[u8; XRAM_BANK_SIZE] {
        &self.xram[bank.min(XRAM_BANKS - 1)]
    }

    #[must_use]
    pub fn sfrs(&self) -> &[u8; 128] {
        &self.sfr
    }

    #[must_use]
    pub fn wram(&self) -> &[u8; WRAM_SIZE] {
        &self.wram
    }

    pub fn wram_mut(&mut self) -> &mut [u8; WRAM_SIZE] {
        &mut self.wram
    }

    // =========================================================================
    // Program space and flash
    // =========================================================================

    #[must_use]
    pub fn program_source(&self) -> ProgramSource {
        self.program
    }

    pub fn set_program_source(&mut self, source: ProgramSource) {
        self.program = source;
    }

    fn program_array(&self, source: ProgramSource) -> &[u8] {
        match source {
            ProgramSource::Rom => &self.rom,
            ProgramSource::Flash => &self.flash[..ROM_SIZE],
        }
    }

    pub fn read_program(&self, address: u16) -> Result<u8, BusError> {
        self.read_program_from(self.program, address)
    }

    /// Read program space as `source` maps it, whichever source is selected.
    pub fn read_program_from(&self, source: ProgramSource, address: u16) -> Result<u8, BusError> {
        self.program_array(source)
            .get(usize::from(address))
            .copied()
            .ok_or(BusError::OutOfRange {
                space: Space::Program,
                address: u32::from(address),
            })
    }

    pub fn write_program(&mut self, address: u16, value: u8) -> Result<(), BusError> {
        let array = match self.program {
            ProgramSource::Rom => &mut self.rom[..],
            ProgramSource::Flash => &mut self.flash[..ROM_SIZE],
        };
        let cell = array.get_mut(usize::from(address)).ok_or(BusError::OutOfRange {
            space: Space::Program,
            address: u32::from(address),
        })?;
        *cell = value;
        Ok(())
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    #[must_use]
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    pub fn read_flash(&self, address: u32) -> Result<u8, BusError> {
        self.flash
            .get(address as usize)
            .copied()
            .ok_or(BusError::OutOfRange {
                space: Space::Flash,
                address,
            })
    }

    pub fn write_flash(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        let cell = self.flash.get_mut(address as usize).ok_or(BusError::OutOfRange {
            space: Space::Flash,
            address,
        })?;
        *cell = value;
        Ok(())
    }

    // =========================================================================
    // Stack (RAM bank 0)
    // =========================================================================

    /// Push onto the bank 0 stack. On overflow the byte is still stored
    /// with SP wrapped; the fault is returned for the caller to report.
    pub fn push_stack(&mut self, value: u8) -> Result<(), StackFault> {
        let mut sp = self.sfr(SP);
        let result = push_wrapped(&mut self.ram[0], &mut sp, value);
        self.set_sfr(SP, sp);
        result
    }

    /// Pop from the bank 0 stack, with any underflow reported alongside.
    pub fn pop_stack(&mut self) -> (u8, Option<StackFault>) {
        let mut sp = self.sfr(SP);
        let popped = pop_wrapped(&self.ram[0], &mut sp);
        self.set_sfr(SP, sp);
        popped
    }

    // =========================================================================
    // Snapshot support
    // =========================================================================

    /// Copy of everything a snapshot needs. Mask ROM is configuration and
    /// is left out.
    pub(crate) fn image(&self) -> MemoryImage {
        MemoryImage {
            ram: self.ram.iter().flatten().copied().collect(),
            sfr: self.sfr.to_vec(),
            xram: self.xram.iter().flatten().copied().collect(),
            xram_bank: match self.segments[3] {
                Segment::Xram(bank) => bank,
                _ => 0,
            },
            wram: self.wram.to_vec(),
            flash: self.flash.clone(),
        }
    }

    /// Load an image taken by [`Memory::image`]. Returns `false`, leaving
    /// memory untouched, if any array has the wrong size.
    pub(crate) fn restore(&mut self, image: &MemoryImage) -> bool {
        if image.ram.len() != 2 * RAM_BANK_SIZE
            || image.sfr.len() != self.sfr.len()
            || image.xram.len() != XRAM_BANKS * XRAM_BANK_SIZE
            || image.wram.len() != WRAM_SIZE
            || image.flash.len() != FLASH_SIZE
            || usize::from(image.xram_bank) >= XRAM_BANKS
        {
            return false;
        }
        for (bank, chunk) in self.ram.iter_mut().zip(image.ram.chunks_exact(RAM_BANK_SIZE)) {
            bank.copy_from_slice(chunk);
        }
        self.sfr.copy_from_slice(&image.sfr);
        for (bank, chunk) in self.xram.iter_mut().zip(image.xram.chunks_exact(XRAM_BANK_SIZE)) {
            bank.copy_from_slice(chunk);
        }
        self.wram.copy_from_slice(&image.wram);
        self.flash.copy_from_slice(&image.flash);
        self.sync_segments();
        self.segments[3] = Segment::Xram(image.xram_bank);
        true
    }
}

/// Flat, serializable copy of [`Memory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MemoryImage {
    ram: Vec<u8>,
    sfr: Vec<u8>,
    xram: Vec<u8>,
    xram_bank: u8,
    wram: Vec<u8>,
    flash: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gp_segments_follow_ram_bank() {
        let mut mem = Memory::new();
        mem.poke(0x010, 0xAA).unwrap();
        mem.select_ram_bank(1);
        assert_eq!(mem.peek(0x010).unwrap(), 0x00);
        mem.poke(0x090, 0xBB).unwrap();
        assert_eq!(mem.ram(1)[0x90], 0xBB);
        mem.select_ram_bank(0);
        assert_eq!(mem.peek(0x010).unwrap(), 0xAA);
    }

    #[test]
    fn xram_bank_select_validates() {
        let mut mem = Memory::new();
        assert!(mem.select_xram_bank(2).is_ok());
        mem.poke(0x180, 0x5A).unwrap();
        assert_eq!(mem.xram(2)[0], 0x5A);
        assert_eq!(mem.select_xram_bank(3), Err(BusError::InvalidBankSelect(3)));
    }

    #[test]
    fn out_of_range_data_address() {
        let mem = Memory::new();
        assert_eq!(
            mem.peek(0x200),
            Err(BusError::OutOfRange { space: Space::Data, address: 0x200 })
        );
    }

    #[test]
    fn program_space_follows_source() {
        let mut mem = Memory::new();
        mem.load_rom(&[0x11]);
        mem.load_flash(&[0x22]);
        assert_eq!(mem.read_program(0).unwrap(), 0x11);
        mem.set_program_source(ProgramSource::Flash);
        assert_eq!(mem.read_program(0).unwrap(), 0x22);
        mem.write_program(1, 0x33).unwrap();
        assert_eq!(mem.flash()[1], 0x33);
    }

    #[test]
    fn stack_uses_bank0_even_when_bank1_selected() {
        let mut mem = Memory::new();
        mem.set_sfr(SP, 0x7F);
        mem.select_ram_bank(1);
        mem.push_stack(0x42).unwrap();
        assert_eq!(mem.ram(0)[0x80], 0x42);
        assert_eq!(mem.ram(1)[0x80], 0x00);
        assert_eq!(mem.pop_stack(), (0x42, None));
        assert_eq!(mem.sfr(SP), 0x7F);
    }

    #[test]
    fn image_round_trip_keeps_banks() {
        let mut mem = Memory::new();
        mem.set_sfr(PSW, RAMBK0);
        mem.sync_segments();
        mem.poke(0x05, 0x42).unwrap();
        mem.select_xram_bank(2).unwrap();
        mem.write_flash(0x1_0000, 0x99).unwrap();
        let image = mem.image();

        let mut other = Memory::new();
        assert!(other.restore(&image));
        assert_eq!(other.peek(0x05).unwrap(), 0x42);
        assert_eq!(other.segments()[3], Segment::Xram(2));
        assert_eq!(other.flash()[0x1_0000], 0x99);
    }

    #[test]
    fn flash_is_128k() {
        let mut mem = Memory::new();
        mem.write_flash(0x1_FFFF, 1).unwrap();
        assert!(mem.write_flash(0x2_0000, 1).is_err());
    }
}
