//! Instruction execution for the LC86K.

use crate::alu;
use crate::bus::{Bus, BusError};
use crate::decode::Instruction;
use crate::opcodes::{Layout, Mnemonic};
use crate::registers::{self, ACC, CY, FPR, FPR_ADDRESS_BANK, FPR_UNLOCK, OV, PSW, TRH, TRL};

use super::Lc86k;

impl Lc86k {
    /// Execute a decoded instruction. PC already points past it.
    pub(super) fn execute<B: Bus>(&mut self, bus: &mut B, instr: &Instruction) -> Result<(), BusError> {
        let o = instr.operands;

        match instr.mnemonic() {
            Mnemonic::Nop => {}

            // =================================================================
            // Branches
            // =================================================================
            Mnemonic::Br => self.branch(o.rel8),
            Mnemonic::Brf => self.pc = self.pc.wrapping_add(o.rel16).wrapping_sub(1),
            Mnemonic::Bz => {
                if bus.read(ACC)? == 0 {
                    self.branch(o.rel8);
                }
            }
            Mnemonic::Bnz => {
                if bus.read(ACC)? != 0 {
                    self.branch(o.rel8);
                }
            }
            Mnemonic::Bp => {
                if bus.read(o.direct)? & (1 << o.bit) != 0 {
                    self.branch(o.rel8);
                }
            }
            Mnemonic::Bn => {
                if bus.read(o.direct)? & (1 << o.bit) == 0 {
                    self.branch(o.rel8);
                }
            }
            // Test and clear: latch read, as it writes back.
            Mnemonic::Bpc => {
                let value = bus.read_latch(o.direct)?;
                let mask = 1 << o.bit;
                if value & mask != 0 {
                    bus.write(o.direct, value & !mask)?;
                    self.branch(o.rel8);
                }
            }
            Mnemonic::Dbnz => {
                let address = operand_address(bus, instr)?;
                let value = bus.read_latch(address)?.wrapping_sub(1);
                bus.write(address, value)?;
                if value != 0 {
                    self.branch(o.rel8);
                }
            }
            Mnemonic::Be | Mnemonic::Bne => {
                let (lhs, rhs) = match instr.info.layout {
                    Layout::ImmRel8 => (bus.read(ACC)?, o.immediate),
                    Layout::DirectRel8 => (bus.read(ACC)?, bus.read(o.direct)?),
                    _ => {
                        let address = bus.indirect_address(o.indirect)?;
                        (bus.read(address)?, o.immediate)
                    }
                };
                let carry = if alu::compare_carry(lhs, rhs) { CY } else { 0 };
                self.update_flags(bus, CY, carry)?;
                if (lhs == rhs) == (instr.mnemonic() == Mnemonic::Be) {
                    self.branch(o.rel8);
                }
            }

            // =================================================================
            // Calls, jumps and returns
            // =================================================================
            Mnemonic::Call => {
                self.push_pc(bus)?;
                self.pc = (self.pc & 0xF000) | o.absolute;
            }
            Mnemonic::Callf => {
                self.push_pc(bus)?;
                self.pc = o.absolute;
            }
            Mnemonic::Callr => {
                self.push_pc(bus)?;
                self.pc = self.pc.wrapping_add(o.rel16).wrapping_sub(1);
            }
            Mnemonic::Jmp => self.pc = (self.pc & 0xF000) | o.absolute,
            Mnemonic::Jmpf => self.pc = o.absolute,
            Mnemonic::Ret => {
                let hi = bus.pop()?;
                let lo = bus.pop()?;
                self.pc = u16::from_be_bytes([hi, lo]);
            }
            Mnemonic::Reti => self.pc = bus.return_from_interrupt()?,

            // =================================================================
            // Data movement
            // =================================================================
            Mnemonic::Ld => {
                let address = operand_address(bus, instr)?;
                let value = bus.read(address)?;
                bus.write(ACC, value)?;
            }
            Mnemonic::St => {
                let address = operand_address(bus, instr)?;
                let acc = bus.read(ACC)?;
                bus.write(address, acc)?;
            }
            Mnemonic::Mov => {
                let address = operand_address(bus, instr)?;
                bus.write(address, o.immediate)?;
            }
            Mnemonic::Ldc => {
                let acc = bus.read(ACC)?;
                let table = table_reference(bus)?;
                let value = bus.read_program(table.wrapping_add(u16::from(acc)))?;
                bus.write(ACC, value)?;
            }
            Mnemonic::Ldf => {
                let address = flash_address(bus)?;
                let value = bus.read_flash(address)?;
                bus.write(ACC, value)?;
            }
            Mnemonic::Stf => self.store_flash(bus, instr.pc)?,
            Mnemonic::Push => {
                let value = bus.read(o.direct)?;
                bus.push(value)?;
            }
            Mnemonic::Pop => {
                let value = bus.pop()?;
                bus.write(o.direct, value)?;
            }
            Mnemonic::Xch => {
                let address = operand_address(bus, instr)?;
                let value = bus.read_latch(address)?;
                let acc = bus.read(ACC)?;
                bus.write(address, acc)?;
                bus.write(ACC, value)?;
            }

            // =================================================================
            // Arithmetic
            // =================================================================
            Mnemonic::Inc | Mnemonic::Dec => {
                let address = operand_address(bus, instr)?;
                let value = bus.read_latch(address)?;
                let value = if instr.mnemonic() == Mnemonic::Inc {
                    value.wrapping_add(1)
                } else {
                    value.wrapping_sub(1)
                };
                bus.write(address, value)?;
            }
            Mnemonic::Add | Mnemonic::Addc | Mnemonic::Sub | Mnemonic::Subc => {
                let operand = source_operand(bus, instr)?;
                let acc = bus.read(ACC)?;
                let carry_in = match instr.mnemonic() {
                    Mnemonic::Addc | Mnemonic::Subc => bus.read(PSW)? & CY != 0,
                    _ => false,
                };
                let result = match instr.mnemonic() {
                    Mnemonic::Add | Mnemonic::Addc => alu::add(acc, operand, carry_in),
                    _ => alu::sub(acc, operand, carry_in),
                };
                bus.write(ACC, result.value)?;
                self.update_flags(bus, alu::ARITH_FLAGS, result.flags)?;
            }
            Mnemonic::Mul | Mnemonic::Div => {
                let acc = bus.read(ACC)?;
                let b = bus.read(registers::B)?;
                let c = bus.read(registers::C)?;
                let result = if instr.mnemonic() == Mnemonic::Mul {
                    alu::mul(acc, b, c)
                } else {
                    alu::div(acc, b, c)
                };
                bus.write(registers::C, result.c)?;
                bus.write(ACC, result.acc)?;
                bus.write(registers::B, result.b)?;
                // CY is always cleared; AC is untouched.
                self.update_flags(bus, CY | OV, result.flags)?;
            }

            // =================================================================
            // Logic and rotates (only parity changes)
            // =================================================================
            Mnemonic::And | Mnemonic::Or | Mnemonic::Xor => {
                let operand = source_operand(bus, instr)?;
                let acc = bus.read(ACC)?;
                let value = match instr.mnemonic() {
                    Mnemonic::And => acc & operand,
                    Mnemonic::Or => acc | operand,
                    _ => acc ^ operand,
                };
                bus.write(ACC, value)?;
            }
            Mnemonic::Rol => {
                let acc = bus.read(ACC)?;
                bus.write(ACC, alu::rol(acc))?;
            }
            Mnemonic::Ror => {
                let acc = bus.read(ACC)?;
                bus.write(ACC, alu::ror(acc))?;
            }
            Mnemonic::Rolc | Mnemonic::Rorc => {
                let acc = bus.read(ACC)?;
                let carry = bus.read(PSW)? & CY != 0;
                let (value, carry_out) = if instr.mnemonic() == Mnemonic::Rolc {
                    alu::rolc(acc, carry)
                } else {
                    alu::rorc(acc, carry)
                };
                bus.write(ACC, value)?;
                self.update_flags(bus, CY, if carry_out { CY } else { 0 })?;
            }

            // =================================================================
            // Bit manipulation (read-modify-write through the latch)
            // =================================================================
            Mnemonic::Clr1 | Mnemonic::Set1 | Mnemonic::Not1 => {
                let value = bus.read_latch(o.direct)?;
                let mask = 1 << o.bit;
                let value = match instr.mnemonic() {
                    Mnemonic::Clr1 => value & !mask,
                    Mnemonic::Set1 => value | mask,
                    _ => value ^ mask,
                };
                bus.write(o.direct, value)?;
            }
        }

        Ok(())
    }

    fn branch(&mut self, displacement: i8) {
        self.pc = self.pc.wrapping_add(i16::from(displacement) as u16);
    }

    /// Push the return address, low byte first.
    fn push_pc<B: Bus>(&mut self, bus: &mut B) -> Result<(), BusError> {
        let [hi, lo] = self.pc.to_be_bytes();
        bus.push(lo)?;
        bus.push(hi)
    }

    /// Replace the PSW bits in `mask` with `flags`.
    fn update_flags<B: Bus>(&mut self, bus: &mut B, mask: u8, flags: u8) -> Result<(), BusError> {
        let psw = bus.read(PSW)?;
        bus.write(PSW, (psw & !mask) | (flags & mask))
    }

    fn store_flash<B: Bus>(&mut self, bus: &mut B, pc: u16) -> Result<(), BusError> {
        let address = flash_address(bus)?;
        let value = bus.read(ACC)?;
        let unlocking = bus.read(FPR)? & FPR_UNLOCK != 0;
        match self.flash.store(address, value, unlocking) {
            Ok(Some(target)) => bus.write_flash(target, value),
            Ok(None) => Ok(()),
            Err(err) => {
                log::warn!("STF at {pc:04X} rejected: {err}");
                Ok(())
            }
        }
    }
}

/// Data address named by a direct or indirect operand.
fn operand_address<B: Bus>(bus: &mut B, instr: &Instruction) -> Result<u16, BusError> {
    match instr.info.layout {
        Layout::Indirect | Layout::IndirectImm | Layout::IndirectRel8 | Layout::IndirectImmRel8 => {
            bus.indirect_address(instr.operands.indirect)
        }
        _ => Ok(instr.operands.direct),
    }
}

/// Second ALU operand: immediate, direct or indirect.
fn source_operand<B: Bus>(bus: &mut B, instr: &Instruction) -> Result<u8, BusError> {
    if instr.info.layout == Layout::Imm {
        return Ok(instr.operands.immediate);
    }
    let address = operand_address(bus, instr)?;
    bus.read(address)
}

fn table_reference<B: Bus>(bus: &mut B) -> Result<u16, BusError> {
    Ok(u16::from_be_bytes([bus.read(TRH)?, bus.read(TRL)?]))
}

/// FPR bank bit above TRH:TRL.
fn flash_address<B: Bus>(bus: &mut B) -> Result<u32, BusError> {
    let bank = u32::from(bus.read(FPR)? & FPR_ADDRESS_BANK);
    Ok((bank << 16) | u32::from(table_reference(bus)?))
}
