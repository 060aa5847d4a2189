//! Instruction fetch and operand decoding.

use std::fmt;

use crate::opcodes::{self, Layout, Mnemonic, OpcodeInfo};

/// Raw instruction bytes as fetched from program space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedInstruction {
    /// Address of the opcode byte.
    pub pc: u16,
    /// Opcode followed by up to two operand bytes. Unused bytes are zero.
    pub bytes: [u8; 3],
}

impl EncodedInstruction {
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    #[must_use]
    pub fn info(&self) -> &'static OpcodeInfo {
        opcodes::info(self.bytes[0])
    }
}

/// Typed operands extracted according to the opcode's layout.
///
/// Fields that the layout does not use stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Operands {
    /// 9-bit direct address.
    pub direct: u16,
    /// Indirect mode (pointer register 0-3).
    pub indirect: u8,
    /// 8-bit immediate.
    pub immediate: u8,
    /// 8-bit relative displacement.
    pub rel8: i8,
    /// 16-bit relative displacement.
    pub rel16: u16,
    /// 12- or 16-bit absolute address.
    pub absolute: u16,
    /// Bit index 0-7.
    pub bit: u8,
}

/// A fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub pc: u16,
    pub opcode: u8,
    pub info: &'static OpcodeInfo,
    pub operands: Operands,
}

impl Instruction {
    #[must_use]
    pub fn mnemonic(&self) -> Mnemonic {
        self.info.mnemonic
    }

    #[must_use]
    pub fn cycles(&self) -> u8 {
        self.info.cycles
    }

    #[must_use]
    pub fn length(&self) -> u8 {
        self.info.length
    }
}

/// Extract operands from the fetched bytes.
#[must_use]
pub fn decode(encoded: &EncodedInstruction) -> Instruction {
    let [op, b1, b2] = encoded.bytes;
    let info = encoded.info();
    let direct9 = |bit8: u8| (u16::from(bit8 & 1) << 8) | u16::from(b1);

    let mut o = Operands::default();
    match info.layout {
        Layout::Implied => {}
        Layout::Rel8 => o.rel8 = b1 as i8,
        Layout::Rel16 => o.rel16 = u16::from_le_bytes([b1, b2]),
        Layout::Imm => o.immediate = b1,
        Layout::Direct => o.direct = direct9(op),
        Layout::Indirect => o.indirect = op & 0x03,
        Layout::Abs12 => {
            o.absolute = (u16::from(op & 0x10) << 7) | (u16::from(op & 0x07) << 8) | u16::from(b1);
        }
        Layout::Abs16 => o.absolute = u16::from_be_bytes([b1, b2]),
        Layout::DirectImm => {
            o.direct = direct9(op);
            o.immediate = b2;
        }
        Layout::IndirectImm => {
            o.indirect = op & 0x03;
            o.immediate = b1;
        }
        Layout::ImmRel8 => {
            o.immediate = b1;
            o.rel8 = b2 as i8;
        }
        Layout::DirectRel8 => {
            o.direct = direct9(op);
            o.rel8 = b2 as i8;
        }
        Layout::IndirectImmRel8 => {
            o.indirect = op & 0x03;
            o.immediate = b1;
            o.rel8 = b2 as i8;
        }
        Layout::IndirectRel8 => {
            o.indirect = op & 0x03;
            o.rel8 = b1 as i8;
        }
        Layout::DirectBit => {
            o.direct = direct9(op >> 4);
            o.bit = op & 0x07;
        }
        Layout::DirectBitRel8 => {
            o.direct = direct9(op >> 4);
            o.bit = op & 0x07;
            o.rel8 = b2 as i8;
        }
    }

    Instruction {
        pc: encoded.pc,
        opcode: op,
        info,
        operands: o,
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.operands;
        let m = self.info.mnemonic;
        match self.info.layout {
            Layout::Implied => write!(f, "{m}"),
            Layout::Rel8 => write!(f, "{m} {}", o.rel8),
            Layout::Rel16 => write!(f, "{m} ${:04X}", o.rel16),
            Layout::Imm => write!(f, "{m} #${:02X}", o.immediate),
            Layout::Direct => write!(f, "{m} ${:03X}", o.direct),
            Layout::Indirect => write!(f, "{m} @R{}", o.indirect),
            Layout::Abs12 => write!(f, "{m} ${:03X}", o.absolute),
            Layout::Abs16 => write!(f, "{m} ${:04X}", o.absolute),
            Layout::DirectImm => write!(f, "{m} #${:02X}, ${:03X}", o.immediate, o.direct),
            Layout::IndirectImm => write!(f, "{m} #${:02X}, @R{}", o.immediate, o.indirect),
            Layout::ImmRel8 => write!(f, "{m} #${:02X}, {}", o.immediate, o.rel8),
            Layout::DirectRel8 => write!(f, "{m} ${:03X}, {}", o.direct, o.rel8),
            Layout::IndirectImmRel8 => {
                write!(f, "{m} @R{}, #${:02X}, {}", o.indirect, o.immediate, o.rel8)
            }
            Layout::IndirectRel8 => write!(f, "{m} @R{}, {}", o.indirect, o.rel8),
            Layout::DirectBit => write!(f, "{m} ${:03X}, {}", o.direct, o.bit),
            Layout::DirectBitRel8 => write!(f, "{m} ${:03X}, {}, {}", o.direct, o.bit, o.rel8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bytes(bytes: [u8; 3]) -> Instruction {
        decode(&EncodedInstruction { pc: 0, bytes })
    }

    #[test]
    fn direct_bit8_from_opcode_bit0() {
        let i = decode_bytes([0x03, 0x00, 0]);
        assert_eq!(i.operands.direct, 0x100);
        let i = decode_bytes([0x02, 0x7F, 0]);
        assert_eq!(i.operands.direct, 0x07F);
    }

    #[test]
    fn bit_instructions_take_address_bit8_from_opcode_bit4() {
        // SET1 $101, 7
        let i = decode_bytes([0xFF, 0x01, 0]);
        assert_eq!(i.mnemonic(), Mnemonic::Set1);
        assert_eq!(i.operands.direct, 0x101);
        assert_eq!(i.operands.bit, 7);
        // CLR1 $0FE, 2
        let i = decode_bytes([0xCA, 0xFE, 0]);
        assert_eq!(i.operands.direct, 0x0FE);
        assert_eq!(i.operands.bit, 2);
    }

    #[test]
    fn abs12_packs_opcode_bits() {
        // JMP $A34: bit 11 from opcode bit 4, bits 10-8 from opcode bits 2-0.
        let i = decode_bytes([0x3A, 0x34, 0]);
        assert_eq!(i.mnemonic(), Mnemonic::Jmp);
        assert_eq!(i.operands.absolute, 0xA34);
        let i = decode_bytes([0x0F, 0xFF, 0]);
        assert_eq!(i.operands.absolute, 0x7FF);
    }

    #[test]
    fn abs16_big_endian_rel16_little_endian() {
        let i = decode_bytes([0x21, 0x12, 0x34]);
        assert_eq!(i.operands.absolute, 0x1234);
        let i = decode_bytes([0x11, 0x34, 0x12]);
        assert_eq!(i.operands.rel16, 0x1234);
    }

    #[test]
    fn mov_immediate_follows_address() {
        let i = decode_bytes([0x23, 0x00, 0x42]);
        assert_eq!(i.operands.direct, 0x100);
        assert_eq!(i.operands.immediate, 0x42);
    }

    #[test]
    fn compare_branch_operands() {
        let i = decode_bytes([0x35, 0x10, 0xFE]);
        assert_eq!(i.mnemonic(), Mnemonic::Be);
        assert_eq!(i.operands.indirect, 1);
        assert_eq!(i.operands.immediate, 0x10);
        assert_eq!(i.operands.rel8, -2);
    }

    #[test]
    fn disassembles() {
        assert_eq!(decode_bytes([0x81, 0x13, 0]).to_string(), "ADD #$13");
        assert_eq!(decode_bytes([0xEA, 0x01, 0]).to_string(), "SET1 $001, 2");
    }
}
