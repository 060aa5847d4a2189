//! Software stand-in for the mask ROM firmware.
//!
//! Without a BIOS image, applications still call into ROM for flash access
//! and a few services. Each call is a `not1 EXT,0` / `jmpf entry` pair in
//! flash; once the CPU lands on an entry point in ROM the service is
//! performed here and execution resumes after the trampoline.
//!
//! Flash services take their parameters from RAM bank 1:
//!
//! | Address    | Meaning                        |
//! |------------|--------------------------------|
//! | $7D        | flash bank (bit 0)             |
//! | $7E, $7F   | flash address, high then low   |
//! | $80-$FF    | 128-byte data buffer           |
//!
//! ACC returns 0 on success and $FF on failure.

use sanyo_lc86k::{BusError, Space};
use sanyo_lc86k::registers::{P, PCON_HALT, parity};

use crate::memory::{FLASH_SIZE, Memory};
use crate::sfr::{ACC, PCON, PSW};

/// Write the buffer to flash.
pub const FM_WRT_EX: u16 = 0x100;
/// Compare the buffer with flash.
pub const FM_VRF_EX: u16 = 0x108;
/// Read flash into the buffer.
pub const FM_PRD_EX: u16 = 0x110;
/// Clock maintenance.
pub const TIMER_EX: u16 = 0x130;
/// Sleep until the next interrupt.
pub const SLEEP_EX: u16 = 0x140;
/// Application exit.
pub const EXIT: u16 = 0x1F0;

/// Where TIMER_EX's trampoline continues: it saves IE first, so it is
/// longer than the others.
const TIMER_EX_RESUME: u16 = 0x139;
/// Length of the usual `jmpf` trampoline tail.
const TRAMPOLINE_TAIL: u16 = 5;

const PARAM_BANK: usize = 0x7D;
const PARAM_ADDRESS_HI: usize = 0x7E;
const PARAM_ADDRESS_LO: usize = 0x7F;
const BUFFER: usize = 0x80;
const BUFFER_LEN: usize = 128;

const OK: u8 = 0x00;
const FAILED: u8 = 0xFF;

/// Service a firmware call at `pc`. Returns the flash address to resume
/// at, or `None` if `pc` is not an entry point.
pub fn call(memory: &mut Memory, pc: u16) -> Result<Option<u16>, BusError> {
    match pc {
        FM_WRT_EX => {
            let base = flash_address(memory)?;
            let buffer = buffer(memory);
            for (address, byte) in (base..).zip(buffer) {
                memory.write_flash(address, byte)?;
            }
            log::debug!("FM_WRT_EX {base:05X}");
            set_acc(memory, OK);
        }
        FM_VRF_EX => {
            let base = flash_address(memory)?;
            let buffer = buffer(memory);
            let mut equal = true;
            for (address, byte) in (base..).zip(buffer) {
                equal &= memory.read_flash(address)? == byte;
            }
            log::debug!("FM_VRF_EX {base:05X}: {}", if equal { "match" } else { "differs" });
            set_acc(memory, if equal { OK } else { FAILED });
        }
        FM_PRD_EX => {
            let base = flash_address(memory)?;
            let mut data = [0; BUFFER_LEN];
            for (address, byte) in (base..).zip(data.iter_mut()) {
                *byte = memory.read_flash(address)?;
            }
            memory.ram_mut(1)[BUFFER..].copy_from_slice(&data);
            log::debug!("FM_PRD_EX {base:05X}");
            set_acc(memory, OK);
        }
        TIMER_EX => return Ok(Some(TIMER_EX_RESUME)),
        SLEEP_EX | EXIT => {
            log::debug!("{} at {pc:04X}", if pc == EXIT { "EXIT" } else { "SLEEP_EX" });
            let pcon = memory.sfr(PCON);
            memory.set_sfr(PCON, pcon | PCON_HALT);
        }
        _ => return Ok(None),
    }
    Ok(Some(pc + TRAMPOLINE_TAIL))
}

/// Flash address from the parameter block. The whole 128-byte window
/// must fit, so a service either completes or touches nothing.
fn flash_address(memory: &Memory) -> Result<u32, BusError> {
    let ram = memory.ram(1);
    let bank = u32::from(ram[PARAM_BANK] & 1);
    let base =
        (bank << 16) | u32::from(u16::from_be_bytes([ram[PARAM_ADDRESS_HI], ram[PARAM_ADDRESS_LO]]));
    if base as usize + BUFFER_LEN > FLASH_SIZE {
        return Err(BusError::OutOfRange {
            space: Space::Flash,
            address: FLASH_SIZE as u32,
        });
    }
    Ok(base)
}

fn buffer(memory: &Memory) -> [u8; BUFFER_LEN] {
    let mut data = [0; BUFFER_LEN];
    data.copy_from_slice(&memory.ram(1)[BUFFER..]);
    data
}

fn set_acc(memory: &mut Memory, value: u8) {
    memory.set_sfr(ACC, value);
    let psw = memory.sfr(PSW);
    memory.set_sfr(PSW, (psw & !P) | parity(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(memory: &mut Memory, bank: u8, address: u16) {
        let ram = memory.ram_mut(1);
        ram[PARAM_BANK] = bank;
        [ram[PARAM_ADDRESS_HI], ram[PARAM_ADDRESS_LO]] = address.to_be_bytes();
    }

    #[test]
    fn write_then_verify_then_read() {
        let mut memory = Memory::new();
        params(&mut memory, 1, 0x0200);
        for (i, byte) in memory.ram_mut(1)[BUFFER..].iter_mut().enumerate() {
            *byte = i as u8;
        }

        assert_eq!(call(&mut memory, FM_WRT_EX), Ok(Some(0x105)));
        assert_eq!(memory.sfr(ACC), OK);
        assert_eq!(memory.flash()[0x1_0200 + 5], 5);

        assert_eq!(call(&mut memory, FM_VRF_EX), Ok(Some(0x10D)));
        assert_eq!(memory.sfr(ACC), OK);

        memory.ram_mut(1)[BUFFER] = 0xEE;
        call(&mut memory, FM_VRF_EX).unwrap();
        assert_eq!(memory.sfr(ACC), FAILED);
        assert_eq!(memory.sfr(PSW) & P, 0);

        call(&mut memory, FM_PRD_EX).unwrap();
        assert_eq!(memory.ram(1)[BUFFER], 0);
        assert_eq!(memory.ram(1)[0xFF], 127);
    }

    #[test]
    fn sleep_halts() {
        let mut memory = Memory::new();
        assert_eq!(call(&mut memory, SLEEP_EX), Ok(Some(0x145)));
        assert_ne!(memory.sfr(PCON) & PCON_HALT, 0);
    }

    #[test]
    fn timer_ex_resumes_after_ie_save() {
        let mut memory = Memory::new();
        assert_eq!(call(&mut memory, TIMER_EX), Ok(Some(0x139)));
    }

    #[test]
    fn other_addresses_pass_through() {
        let mut memory = Memory::new();
        assert_eq!(call(&mut memory, 0x0104), Ok(None));
    }

    #[test]
    fn flash_overrun_is_out_of_range() {
        let mut memory = Memory::new();
        params(&mut memory, 1, 0xFFC0);
        assert!(call(&mut memory, FM_PRD_EX).is_err());
    }

    #[test]
    fn flash_overrun_writes_nothing() {
        let mut memory = Memory::new();
        params(&mut memory, 1, 0xFFC0);
        memory.ram_mut(1)[BUFFER..].fill(0x5A);
        assert_eq!(
            call(&mut memory, FM_WRT_EX),
            Err(BusError::OutOfRange {
                space: Space::Flash,
                address: 0x2_0000
            })
        );
        assert!(memory.flash()[0x1_FFC0..].iter().all(|&b| b == 0));
    }
}
