//! ALU operations for the LC86K.
//!
//! Results carry only the CY, AC and OV bits. The caller merges them into
//! PSW; parity follows from the ACC write.

#![allow(clippy::verbose_bit_mask)] // Clearer to read mask comparisons.

use crate::registers::{AC, CY, OV};

/// PSW bits produced by arithmetic.
pub const ARITH_FLAGS: u8 = CY | AC | OV;

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// Add with optional carry in.
#[must_use]
pub fn add(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let sum = u16::from(a) + u16::from(b) + u16::from(c);
    let result = sum as u8;
    let addend = b.wrapping_add(c);

    let mut flags = 0;
    if sum > 0xFF {
        flags |= CY;
    }
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        flags |= AC;
    }
    // Operands share a sign that the result does not.
    if (a ^ result) & (addend ^ result) & 0x80 != 0 {
        flags |= OV;
    }

    AluResult {
        value: result,
        flags,
    }
}

/// Subtract with optional borrow in.
#[must_use]
pub fn sub(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);
    let subtrahend = b.wrapping_add(c);

    let mut flags = 0;
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CY;
    }
    if (a & 0x0F) < (b & 0x0F) + c {
        flags |= AC;
    }
    // Operands differ in sign and the result takes the subtrahend's.
    if (a ^ subtrahend) & (a ^ result) & 0x80 != 0 {
        flags |= OV;
    }

    AluResult {
        value: result,
        flags,
    }
}

/// Carry produced by the compare-and-branch instructions: set when
/// `lhs < rhs`, unsigned.
#[must_use]
pub const fn compare_carry(lhs: u8, rhs: u8) -> bool {
    lhs < rhs
}

/// Result of `MUL` or `DIV`: new ACC, B and C plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulDivResult {
    pub acc: u8,
    pub b: u8,
    pub c: u8,
    pub flags: u8,
}

/// `MUL`: (ACC:C) * B.
///
/// The 24-bit product is spread over C (low), ACC (middle) and B (high).
/// CY is always cleared; OV reports a product wider than 16 bits.
#[must_use]
pub fn mul(acc: u8, b: u8, c: u8) -> MulDivResult {
    let product = u32::from(u16::from_be_bytes([acc, c])) * u32::from(b);
    let flags = if product > 0xFFFF { OV } else { 0 };
    MulDivResult {
        acc: (product >> 8) as u8,
        b: (product >> 16) as u8,
        c: product as u8,
        flags,
    }
}

/// `DIV`: (ACC:C) / B.
///
/// Quotient high byte lands in ACC, low byte in C, remainder in B. OV is
/// set when the remainder is zero. Division by zero does not trap: the
/// quotient becomes `0xFF00 | C` with a zero remainder.
#[must_use]
pub fn div(acc: u8, b: u8, c: u8) -> MulDivResult {
    let (quotient, remainder) = if b == 0 {
        (0xFF00 | u16::from(c), 0u8)
    } else {
        let dividend = u16::from_be_bytes([acc, c]);
        let divisor = u16::from(b);
        (dividend / divisor, (dividend % divisor) as u8)
    };
    let [q_hi, q_lo] = quotient.to_be_bytes();
    MulDivResult {
        acc: q_hi,
        b: remainder,
        c: q_lo,
        flags: if remainder == 0 { OV } else { 0 },
    }
}

/// `ROL`: rotate left, bit 7 into bit 0.
#[must_use]
pub const fn rol(value: u8) -> u8 {
    value.rotate_left(1)
}

/// `ROR`: rotate right, bit 0 into bit 7.
#[must_use]
pub const fn ror(value: u8) -> u8 {
    value.rotate_right(1)
}

/// `ROLC`: rotate left through carry. Returns (result, carry out).
#[must_use]
pub const fn rolc(value: u8, carry: bool) -> (u8, bool) {
    ((value << 1) | carry as u8, value & 0x80 != 0)
}

/// `RORC`: rotate right through carry. Returns (result, carry out).
#[must_use]
pub const fn rorc(value: u8, carry: bool) -> (u8, bool) {
    ((value >> 1) | ((carry as u8) << 7), value & 0x01 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_worked_examples() {
        assert_eq!(add(0x55, 0x13, false), AluResult { value: 0x68, flags: 0 });
        assert_eq!(add(0x68, 0x80, false), AluResult { value: 0xE8, flags: 0 });
        assert_eq!(add(0xE8, 0x18, false), AluResult { value: 0x00, flags: CY | AC });
    }

    #[test]
    fn add_signed_overflow() {
        let r = add(0x7F, 0x01, false);
        assert_eq!(r.value, 0x80);
        assert_eq!(r.flags, AC | OV);
        let r = add(0x80, 0x80, false);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags, CY | OV);
    }

    #[test]
    fn addc_uses_carry_in() {
        let r = add(0x0F, 0x00, true);
        assert_eq!(r.value, 0x10);
        assert_eq!(r.flags, AC);
        let r = add(0xFF, 0x00, true);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags & CY, CY);
    }

    #[test]
    fn sub_borrow_and_half_borrow() {
        assert_eq!(sub(0x10, 0x01, false), AluResult { value: 0x0F, flags: AC });
        assert_eq!(sub(0x00, 0x01, false), AluResult { value: 0xFF, flags: CY | AC });
        assert_eq!(sub(0x42, 0x42, false), AluResult { value: 0x00, flags: 0 });
    }

    #[test]
    fn sub_signed_overflow() {
        let r = sub(0x80, 0x01, false);
        assert_eq!(r.value, 0x7F);
        assert_eq!(r.flags & OV, OV);
        let r = sub(0x7F, 0xFF, false);
        assert_eq!(r.value, 0x80);
        assert_eq!(r.flags & OV, OV);
    }

    #[test]
    fn subc_uses_borrow_in() {
        let r = sub(0x05, 0x05, true);
        assert_eq!(r.value, 0xFF);
        assert_eq!(r.flags & CY, CY);
    }

    #[test]
    fn compare_is_unsigned() {
        assert!(compare_carry(0x01, 0x80));
        assert!(!compare_carry(0x80, 0x01));
        assert!(!compare_carry(0x10, 0x10));
    }

    #[test]
    fn mul_packs_24_bit_product() {
        // 0x1234 * 0x56 = 0x06_1D78
        let r = mul(0x12, 0x56, 0x34);
        assert_eq!((r.c, r.acc, r.b), (0x78, 0x1D, 0x06));
        assert_eq!(r.flags, OV);
        let r = mul(0x00, 0x02, 0x10);
        assert_eq!((r.c, r.acc, r.b), (0x20, 0x00, 0x00));
        assert_eq!(r.flags, 0);
    }

    #[test]
    fn div_exact_and_remainder() {
        // 0x1234 / 0x10 = 0x0123 r 4
        let r = div(0x12, 0x10, 0x34);
        assert_eq!((r.acc, r.c, r.b), (0x01, 0x23, 0x04));
        assert_eq!(r.flags, 0);
        let r = div(0x00, 0x04, 0x10);
        assert_eq!((r.acc, r.c, r.b), (0x00, 0x04, 0x00));
        assert_eq!(r.flags, OV);
    }

    #[test]
    fn div_by_zero_yields_ff_high_quotient() {
        let r = div(0x12, 0x00, 0x34);
        assert_eq!((r.acc, r.c, r.b), (0xFF, 0x34, 0x00));
        assert_eq!(r.flags, OV);
    }

    #[test]
    fn rotates() {
        assert_eq!(rol(0x81), 0x03);
        assert_eq!(ror(0x81), 0xC0);
        assert_eq!(rolc(0x80, false), (0x00, true));
        assert_eq!(rolc(0x01, true), (0x03, false));
        assert_eq!(rorc(0x01, false), (0x00, true));
        assert_eq!(rorc(0x02, true), (0x81, false));
    }
}
