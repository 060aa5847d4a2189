//! Property-based tests for bus, timer and interrupt invariants.

use emu_vmu::sfr::{ACC, IE, PSW, SP};
use emu_vmu::timers::advance8;
use emu_vmu::{Irq, Memory, Pic, Vmu, VmuConfig};
use proptest::prelude::*;

fn vmu() -> Vmu {
    Vmu::new(&VmuConfig::with_flash(Vec::new())).unwrap()
}

/// Count an 8-bit timer one tick at a time.
fn reference_advance8(counter: u8, reload: u8, ticks: u32) -> (u8, u32) {
    let mut counter = counter;
    let mut overflows = 0;
    for _ in 0..ticks {
        if counter == 0xFF {
            counter = reload;
            overflows += 1;
        } else {
            counter += 1;
        }
    }
    (counter, overflows)
}

proptest! {
    #[test]
    fn acc_writes_keep_parity(value in any::<u8>()) {
        let mut vmu = vmu();
        vmu.write_data(ACC, value).unwrap();
        let psw = vmu.read_data(PSW).unwrap();
        prop_assert_eq!(u32::from(psw & 1), value.count_ones() & 1);
    }

    #[test]
    fn psw_bank_routes_low_data(bank in 0usize..2, offset in 0u16..0x100, value in 1u8..) {
        let mut vmu = vmu();
        vmu.write_data(PSW, if bank == 1 { 0x02 } else { 0 }).unwrap();
        vmu.write_data(offset, value).unwrap();
        let memory = &vmu.bus().memory;
        prop_assert_eq!(memory.ram(bank)[usize::from(offset)], value);
        prop_assert_eq!(memory.ram(1 - bank)[usize::from(offset)], 0);
    }

    #[test]
    fn advance8_matches_single_ticks(counter in any::<u8>(), reload in any::<u8>(), ticks in 0u32..2000) {
        let mut fast = counter;
        let overflows = advance8(&mut fast, reload, ticks);
        prop_assert_eq!((fast, overflows), reference_advance8(counter, reload, ticks));
    }

    #[test]
    fn masked_sources_wait(ie in any::<u8>(), sources in proptest::collection::vec(3usize..11, 1..5)) {
        let mut memory = Memory::new();
        memory.set_sfr(IE, ie & 0x7F);
        memory.set_sfr(SP, 0x7F);
        let mut pic = Pic::new();
        for &i in &sources {
            pic.raise(Irq::ALL[i]);
        }
        prop_assert_eq!(pic.admit(&mut memory, 0x1234), None);
        prop_assert_eq!(memory.sfr(SP), 0x7F);
    }
}
