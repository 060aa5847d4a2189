//! LC86K opcode table.
//!
//! Every one of the 256 opcode bytes decodes to an instruction. The low
//! nibble selects the addressing column:
//!
//! | Low nibble | Column                                   |
//! |------------|------------------------------------------|
//! | 0-1        | implied, immediate or relative forms     |
//! | 2-3        | direct (`d9`, bit 0 is address bit 8)    |
//! | 4-7        | indirect (`@R0`-`@R3`)                   |
//! | 8-F        | bit and absolute forms (`b3` in bits 0-2) |
//!
//! Bit-addressed and 12-bit absolute opcodes also use bit 4, so each of
//! them occupies two rows.

use std::fmt;

/// Instruction mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Nop,
    Br,
    Brf,
    Bz,
    Bnz,
    Bp,
    Bpc,
    Bn,
    Dbnz,
    Be,
    Bne,
    Call,
    Callf,
    Callr,
    Ret,
    Reti,
    Jmp,
    Jmpf,
    Ld,
    St,
    Mov,
    Ldc,
    Ldf,
    Stf,
    Push,
    Pop,
    Xch,
    Inc,
    Dec,
    Add,
    Addc,
    Sub,
    Subc,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Rol,
    Rolc,
    Ror,
    Rorc,
    Clr1,
    Set1,
    Not1,
}

impl Mnemonic {
    /// Assembler spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Mnemonic::Nop => "NOP",
            Mnemonic::Br => "BR",
            Mnemonic::Brf => "BRF",
            Mnemonic::Bz => "BZ",
            Mnemonic::Bnz => "BNZ",
            Mnemonic::Bp => "BP",
            Mnemonic::Bpc => "BPC",
            Mnemonic::Bn => "BN",
            Mnemonic::Dbnz => "DBNZ",
            Mnemonic::Be => "BE",
            Mnemonic::Bne => "BNE",
            Mnemonic::Call => "CALL",
            Mnemonic::Callf => "CALLF",
            Mnemonic::Callr => "CALLR",
            Mnemonic::Ret => "RET",
            Mnemonic::Reti => "RETI",
            Mnemonic::Jmp => "JMP",
            Mnemonic::Jmpf => "JMPF",
            Mnemonic::Ld => "LD",
            Mnemonic::St => "ST",
            Mnemonic::Mov => "MOV",
            Mnemonic::Ldc => "LDC",
            Mnemonic::Ldf => "LDF",
            Mnemonic::Stf => "STF",
            Mnemonic::Push => "PUSH",
            Mnemonic::Pop => "POP",
            Mnemonic::Xch => "XCH",
            Mnemonic::Inc => "INC",
            Mnemonic::Dec => "DEC",
            Mnemonic::Add => "ADD",
            Mnemonic::Addc => "ADDC",
            Mnemonic::Sub => "SUB",
            Mnemonic::Subc => "SUBC",
            Mnemonic::Mul => "MUL",
            Mnemonic::Div => "DIV",
            Mnemonic::And => "AND",
            Mnemonic::Or => "OR",
            Mnemonic::Xor => "XOR",
            Mnemonic::Rol => "ROL",
            Mnemonic::Rolc => "ROLC",
            Mnemonic::Ror => "ROR",
            Mnemonic::Rorc => "RORC",
            Mnemonic::Clr1 => "CLR1",
            Mnemonic::Set1 => "SET1",
            Mnemonic::Not1 => "NOT1",
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand layout following the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// No operands.
    Implied,
    /// `r8`: signed 8-bit displacement.
    Rel8,
    /// `r16`: 16-bit displacement, little-endian.
    Rel16,
    /// `#i8`.
    Imm,
    /// `d9`: address bit 8 in opcode bit 0.
    Direct,
    /// `@Ri`: pointer register in opcode bits 0-1.
    Indirect,
    /// `a12`: address bit 11 in opcode bit 4, bits 10-8 in opcode bits 0-2.
    Abs12,
    /// `a16`: big-endian.
    Abs16,
    /// `d9, #i8` (`MOV`): the immediate follows the address byte.
    DirectImm,
    /// `@Ri, #i8` (`MOV`).
    IndirectImm,
    /// `#i8, r8` (`BE`, `BNE`).
    ImmRel8,
    /// `d9, r8` (`BE`, `BNE`, `DBNZ`).
    DirectRel8,
    /// `@Ri, #i8, r8` (`BE`, `BNE`).
    IndirectImmRel8,
    /// `@Ri, r8` (`DBNZ`).
    IndirectRel8,
    /// `d9, b3`: address bit 8 in opcode bit 4.
    DirectBit,
    /// `d9, b3, r8`.
    DirectBitRel8,
}

/// Static description of one opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: Mnemonic,
    pub layout: Layout,
    /// Instruction length in bytes, opcode included.
    pub length: u8,
    /// Cost in CPU cycles.
    pub cycles: u8,
}

const fn op(mnemonic: Mnemonic, layout: Layout, length: u8, cycles: u8) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        layout,
        length,
        cycles,
    }
}

/// Arithmetic and logic row for a nibble, `None` where the row is not ALU.
const fn alu_row(hi: u8) -> Option<Mnemonic> {
    match hi {
        0x8 => Some(Mnemonic::Add),
        0x9 => Some(Mnemonic::Addc),
        0xA => Some(Mnemonic::Sub),
        0xB => Some(Mnemonic::Subc),
        0xD => Some(Mnemonic::Or),
        0xE => Some(Mnemonic::And),
        0xF => Some(Mnemonic::Xor),
        _ => None,
    }
}

const fn decode_entry(opcode: u8) -> OpcodeInfo {
    use Layout::{
        Abs12, Abs16, Direct, DirectBit, DirectBitRel8, DirectImm, DirectRel8, Imm, ImmRel8,
        Implied, Indirect, IndirectImm, IndirectImmRel8, IndirectRel8, Rel8, Rel16,
    };
    use Mnemonic::{
        Be, Bn, Bne, Bnz, Bp, Bpc, Br, Brf, Bz, Call, Callf, Callr, Clr1, Dbnz, Dec, Div, Inc,
        Jmp, Jmpf, Ld, Ldc, Ldf, Mov, Mul, Nop, Not1, Pop, Push, Ret, Reti, Rol, Rolc, Ror, Rorc,
        Set1, St, Stf, Xch,
    };

    let hi = opcode >> 4;
    let lo = opcode & 0x0F;

    if lo >= 0x08 {
        return match hi {
            0x0 | 0x1 => op(Call, Abs12, 2, 2),
            0x2 | 0x3 => op(Jmp, Abs12, 2, 2),
            0x4 | 0x5 => op(Bpc, DirectBitRel8, 3, 2),
            0x6 | 0x7 => op(Bp, DirectBitRel8, 3, 2),
            0x8 | 0x9 => op(Bn, DirectBitRel8, 3, 2),
            0xA | 0xB => op(Not1, DirectBit, 2, 1),
            0xC | 0xD => op(Clr1, DirectBit, 2, 1),
            _ => op(Set1, DirectBit, 2, 1),
        };
    }

    if lo >= 0x04 {
        if let Some(m) = alu_row(hi) {
            return op(m, Indirect, 1, 1);
        }
        return match hi {
            0x0 => op(Ld, Indirect, 1, 1),
            0x1 => op(St, Indirect, 1, 1),
            0x2 => op(Mov, IndirectImm, 2, 1),
            0x3 => op(Be, IndirectImmRel8, 3, 2),
            0x4 => op(Bne, IndirectImmRel8, 3, 2),
            0x5 => op(Dbnz, IndirectRel8, 2, 2),
            0x6 => op(Inc, Indirect, 1, 1),
            0x7 => op(Dec, Indirect, 1, 1),
            _ => op(Xch, Indirect, 1, 1),
        };
    }

    if lo >= 0x02 {
        if let Some(m) = alu_row(hi) {
            return op(m, Direct, 2, 1);
        }
        return match hi {
            0x0 => op(Ld, Direct, 2, 1),
            0x1 => op(St, Direct, 2, 1),
            0x2 => op(Mov, DirectImm, 3, 2),
            0x3 => op(Be, DirectRel8, 3, 2),
            0x4 => op(Bne, DirectRel8, 3, 2),
            0x5 => op(Dbnz, DirectRel8, 3, 2),
            0x6 => op(Inc, Direct, 2, 1),
            0x7 => op(Dec, Direct, 2, 1),
            _ => op(Xch, Direct, 2, 1),
        };
    }

    match (hi, lo) {
        (0x0, 0) => op(Nop, Implied, 1, 1),
        (0x0, _) => op(Br, Rel8, 2, 2),
        (0x1, 0) => op(Callr, Rel16, 3, 4),
        (0x1, _) => op(Brf, Rel16, 3, 4),
        (0x2, 0) => op(Callf, Abs16, 3, 2),
        (0x2, _) => op(Jmpf, Abs16, 3, 2),
        (0x3, 0) => op(Mul, Implied, 1, 7),
        (0x3, _) => op(Be, ImmRel8, 3, 2),
        (0x4, 0) => op(Div, Implied, 1, 7),
        (0x4, _) => op(Bne, ImmRel8, 3, 2),
        (0x5, 0) => op(Ldf, Implied, 1, 2),
        (0x5, _) => op(Stf, Implied, 1, 2),
        (0x6, _) => op(Push, Direct, 2, 2),
        (0x7, _) => op(Pop, Direct, 2, 2),
        (0x8, 0) => op(Bz, Rel8, 2, 2),
        (0x9, 0) => op(Bnz, Rel8, 2, 2),
        (0xA, 0) => op(Ret, Implied, 1, 2),
        (0xB, 0) => op(Reti, Implied, 1, 2),
        (0xC, 0) => op(Ror, Implied, 1, 1),
        (0xC, _) => op(Ldc, Implied, 1, 2),
        (0xD, 0) => op(Rorc, Implied, 1, 1),
        (0xE, 0) => op(Rol, Implied, 1, 1),
        (0xF, 0) => op(Rolc, Implied, 1, 1),
        // Remaining lo == 1 slots are the immediate ALU forms.
        _ => match alu_row(hi) {
            Some(m) => op(m, Imm, 2, 1),
            None => op(Nop, Implied, 1, 1),
        },
    }
}

const fn build_table() -> [OpcodeInfo; 256] {
    let mut table = [op(Mnemonic::Nop, Layout::Implied, 1, 1); 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode_entry(i as u8);
        i += 1;
    }
    table
}

/// The full opcode table, indexed by opcode byte.
pub static OPCODES: [OpcodeInfo; 256] = build_table();

/// Look up an opcode byte.
#[must_use]
pub fn info(opcode: u8) -> &'static OpcodeInfo {
    &OPCODES[usize::from(opcode)]
}

/// `JMPF a16`, the only instruction allowed after a program source switch.
pub const JMPF: u8 = 0x21;

/// Target of the far jump encoded in `bytes`, if they encode one.
#[must_use]
pub fn far_jump_target(bytes: [u8; 3]) -> Option<u16> {
    (bytes[0] == JMPF).then(|| u16::from_be_bytes([bytes[1], bytes[2]]))
}
