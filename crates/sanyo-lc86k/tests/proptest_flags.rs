//! Property-based tests for LC86K flag, stack and addressing invariants.

use proptest::prelude::*;
use sanyo_lc86k::registers::{AC, ACC, CY, IRBK0, IRBK1, OV, P, PSW, SP};
use sanyo_lc86k::{Bus, Lc86k, SimpleBus};

const BOUNDARIES: [u8; 8] = [0, 1, 15, 16, 127, 128, 254, 255];

/// Expected (result, CY, AC, OV) for ADD/ADDC.
fn reference_add(a: u8, b: u8, c: u8) -> (u8, bool, bool, bool) {
    let sum = u16::from(a) + u16::from(b) + u16::from(c);
    let r = sum as u8;
    let bc = b.wrapping_add(c);
    (r, sum > 255, (a & 15) + (b & 15) + c > 15, (a ^ r) & (bc ^ r) & 0x80 != 0)
}

/// Expected (result, CY, AC, OV) for SUB/SUBC.
fn reference_sub(a: u8, b: u8, c: u8) -> (u8, bool, bool, bool) {
    let r = a.wrapping_sub(b).wrapping_sub(c);
    let bc = b.wrapping_add(c);
    (
        r,
        u16::from(a) < u16::from(b) + u16::from(c),
        (a & 15) < (b & 15) + c,
        (a ^ bc) & (a ^ r) & 0x80 != 0,
    )
}

/// Run one immediate ALU opcode with ACC = `a` and the given carry.
fn run_alu(opcode: u8, a: u8, b: u8, carry: bool) -> (u8, u8) {
    let mut bus = SimpleBus::with_program(&[opcode, b]);
    bus.poke(ACC, a);
    bus.poke(PSW, if carry { CY } else { 0 });
    let mut cpu = Lc86k::new();
    cpu.run_next(&mut bus).unwrap();
    (bus.peek(ACC), bus.peek(PSW))
}

fn flags_of(cy: bool, ac: bool, ov: bool) -> u8 {
    (if cy { CY } else { 0 }) | (if ac { AC } else { 0 }) | (if ov { OV } else { 0 })
}

#[test]
fn add_and_sub_boundary_grid() {
    for &a in &BOUNDARIES {
        for &b in &BOUNDARIES {
            for carry in [false, true] {
                let c = u8::from(carry);

                let (r, cy, ac, ov) = reference_add(a, b, c);
                let (acc, psw) = run_alu(0x91, a, b, carry); // ADDC #b
                assert_eq!(acc, r, "ADDC {a:#04X}+{b:#04X}+{c}");
                assert_eq!(psw & (CY | AC | OV), flags_of(cy, ac, ov), "ADDC {a:#04X}+{b:#04X}+{c}");

                let (r, cy, ac, ov) = reference_sub(a, b, c);
                let (acc, psw) = run_alu(0xB1, a, b, carry); // SUBC #b
                assert_eq!(acc, r, "SUBC {a:#04X}-{b:#04X}-{c}");
                assert_eq!(psw & (CY | AC | OV), flags_of(cy, ac, ov), "SUBC {a:#04X}-{b:#04X}-{c}");
            }

            // Non-carry forms ignore an incoming carry.
            let (r, cy, ac, ov) = reference_add(a, b, 0);
            let (acc, psw) = run_alu(0x81, a, b, true);
            assert_eq!((acc, psw & (CY | AC | OV)), (r, flags_of(cy, ac, ov)));
            let (r, cy, ac, ov) = reference_sub(a, b, 0);
            let (acc, psw) = run_alu(0xA1, a, b, true);
            assert_eq!((acc, psw & (CY | AC | OV)), (r, flags_of(cy, ac, ov)));
        }
    }
}

proptest! {
    #[test]
    fn parity_tracks_every_acc_write(v in any::<u8>()) {
        let mut bus = SimpleBus::with_program(&[0x23, 0x00, v]); // MOV #v, ACC
        let mut cpu = Lc86k::new();
        cpu.run_next(&mut bus).unwrap();
        prop_assert_eq!(bus.peek(PSW) & P, (v.count_ones() % 2) as u8);
    }

    #[test]
    fn add_flags_match_formula(a in any::<u8>(), b in any::<u8>(), carry in any::<bool>()) {
        let (r, cy, ac, ov) = reference_add(a, b, u8::from(carry));
        let (acc, psw) = run_alu(0x91, a, b, carry);
        prop_assert_eq!(acc, r);
        prop_assert_eq!(psw & (CY | AC | OV), flags_of(cy, ac, ov));
    }

    #[test]
    fn sub_flags_match_formula(a in any::<u8>(), b in any::<u8>(), carry in any::<bool>()) {
        let (r, cy, ac, ov) = reference_sub(a, b, u8::from(carry));
        let (acc, psw) = run_alu(0xB1, a, b, carry);
        prop_assert_eq!(acc, r);
        prop_assert_eq!(psw & (CY | AC | OV), flags_of(cy, ac, ov));
    }

    #[test]
    fn mul_packs_product(acc in any::<u8>(), b in any::<u8>(), c in any::<u8>()) {
        let mut bus = SimpleBus::with_program(&[0x30]);
        bus.poke(ACC, acc);
        bus.poke(0x102, b);
        bus.poke(0x103, c);
        Lc86k::new().run_next(&mut bus).unwrap();
        let product = u32::from(u16::from_be_bytes([acc, c])) * u32::from(b);
        prop_assert_eq!(bus.peek(0x103), product as u8);
        prop_assert_eq!(bus.peek(ACC), (product >> 8) as u8);
        prop_assert_eq!(bus.peek(0x102), (product >> 16) as u8);
        prop_assert_eq!(bus.peek(PSW) & (CY | OV), if product > 0xFFFF { OV } else { 0 });
    }

    #[test]
    fn div_is_exact(acc in any::<u8>(), b in 1u8.., c in any::<u8>()) {
        let mut bus = SimpleBus::with_program(&[0x40]);
        bus.poke(ACC, acc);
        bus.poke(0x102, b);
        bus.poke(0x103, c);
        Lc86k::new().run_next(&mut bus).unwrap();
        let dividend = u16::from_be_bytes([acc, c]);
        let quotient = u16::from_be_bytes([bus.peek(ACC), bus.peek(0x103)]);
        let remainder = bus.peek(0x102);
        prop_assert_eq!(quotient, dividend / u16::from(b));
        prop_assert_eq!(u16::from(remainder), dividend % u16::from(b));
        prop_assert_eq!(bus.peek(PSW) & OV != 0, remainder == 0);
    }

    #[test]
    fn stack_round_trip(v in any::<u8>(), sp in 0x7Fu8..0xFF) {
        let mut bus = SimpleBus::new();
        bus.poke(SP, sp);
        bus.push(v).unwrap();
        prop_assert_eq!(bus.peek(SP), sp + 1);
        prop_assert_eq!(bus.pop().unwrap(), v);
        prop_assert_eq!(bus.peek(SP), sp);
    }

    #[test]
    fn indirect_address_layout(mode in 0u8..4, irbk in 0u8..4, pointer in any::<u8>()) {
        let mut bus = SimpleBus::new();
        let psw = (if irbk & 2 != 0 { IRBK1 } else { 0 }) | (if irbk & 1 != 0 { IRBK0 } else { 0 });
        bus.poke(PSW, psw);
        let register = u16::from(irbk) * 4 + u16::from(mode);
        bus.poke(register, pointer);
        let expected = u16::from(pointer) | if mode >= 2 { 0x100 } else { 0 };
        prop_assert_eq!(bus.indirect_address(mode).unwrap(), expected);
    }
}
