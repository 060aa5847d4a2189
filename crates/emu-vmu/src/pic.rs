//! Interrupt controller.
//!
//! Eleven sources share three priority levels. Each level holds at most one
//! in-service source, so nesting only ever escalates: low, then high, then
//! highest. Priorities are not fixed; they are read from IE and IP at the
//! moment of arbitration.
//!
//! When nothing is in service, the scan starts one level below the level
//! serviced last and wraps. Within a level the scan starts after the source
//! admitted last at that level. Together these keep a steady stream of one
//! source from starving its peers.

use serde::{Deserialize, Serialize};
use sanyo_lc86k::registers::PCON_HALT;

use crate::memory::Memory;
use crate::sfr::{IE, IP, PCON};

/// IE bit 7: master enable for maskable sources.
const IE_MASTER: u8 = 0b1000_0000;
/// IE bit 1: INT1 priority control.
const IE_INT1: u8 = 0b0000_0010;
/// IE bit 0: INT0 priority control.
const IE_INT0: u8 = 0b0000_0001;

/// Interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Irq {
    Reset,
    ExtInt0,
    ExtInt1,
    /// External INT2 or Timer 0 low overflow.
    ExtInt2T0L,
    /// External INT3 or base timer.
    ExtInt3TBase,
    T0H,
    T1,
    Sio0,
    Sio1,
    /// Maple bus (RFB).
    Rfb,
    P3,
}

impl Irq {
    /// Every source, in vector order.
    pub const ALL: [Irq; 11] = [
        Irq::Reset,
        Irq::ExtInt0,
        Irq::ExtInt1,
        Irq::ExtInt2T0L,
        Irq::ExtInt3TBase,
        Irq::T0H,
        Irq::T1,
        Irq::Sio0,
        Irq::Sio1,
        Irq::Rfb,
        Irq::P3,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }

    /// Service routine address.
    #[must_use]
    pub const fn vector(self) -> u16 {
        match self {
            Irq::Reset => 0x00,
            Irq::ExtInt0 => 0x03,
            Irq::ExtInt1 => 0x0B,
            Irq::ExtInt2T0L => 0x13,
            Irq::ExtInt3TBase => 0x1B,
            Irq::T0H => 0x23,
            Irq::T1 => 0x2B,
            Irq::Sio0 => 0x33,
            Irq::Sio1 => 0x3B,
            Irq::Rfb => 0x43,
            Irq::P3 => 0x4B,
        }
    }

    /// IP bit selecting high priority, for sources that have one.
    const fn ip_mask(self) -> Option<u8> {
        match self {
            Irq::Reset | Irq::ExtInt0 | Irq::ExtInt1 => None,
            Irq::ExtInt2T0L => Some(0x01),
            Irq::ExtInt3TBase => Some(0x02),
            Irq::T0H => Some(0x04),
            Irq::T1 => Some(0x08),
            Irq::Sio0 => Some(0x10),
            Irq::Sio1 => Some(0x20),
            Irq::Rfb => Some(0x40),
            Irq::P3 => Some(0x80),
        }
    }
}

/// Priority level, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    High,
    Highest,
}

impl Priority {
    const ALL: [Priority; 3] = [Priority::Low, Priority::High, Priority::Highest];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Effective priority of `irq` under the given IE/IP values. `None` means
/// masked.
///
/// INT0 and INT1 are paired: they only become non-maskable together, when
/// both IE priority bits are clear. If either bit is set both drop to low
/// priority under the master enable.
#[must_use]
pub fn priority_of(irq: Irq, ie: u8, ip: u8) -> Option<Priority> {
    let master = ie & IE_MASTER != 0;
    match irq {
        Irq::Reset => Some(Priority::Highest),
        Irq::ExtInt0 | Irq::ExtInt1 => {
            if ie & (IE_INT0 | IE_INT1) == 0 {
                Some(Priority::Highest)
            } else if master {
                Some(Priority::Low)
            } else {
                None
            }
        }
        _ if !master => None,
        _ => match irq.ip_mask() {
            Some(mask) if ip & mask != 0 => Some(Priority::High),
            _ => Some(Priority::Low),
        },
    }
}

/// Interrupt controller state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pic {
    pending: u16,
    /// In-service source per priority level.
    active: [Option<Irq>; 3],
    /// Level serviced last; seeds the next idle scan.
    prev_priority: Priority,
    /// Source admitted last per level; seeds the scan inside the level.
    last_in_level: [Option<Irq>; 3],
    /// An interrupt was dispatched and its first instruction has not run.
    serviced_this_instruction: bool,
}

impl Pic {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: 0,
            active: [None; 3],
            prev_priority: Priority::Low,
            last_in_level: [None; 3],
            serviced_this_instruction: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Request service. Raising a pending source is a no-op.
    pub fn raise(&mut self, irq: Irq) {
        self.pending |= irq.bit();
    }

    /// Withdraw a request that has not been admitted.
    pub fn clear(&mut self, irq: Irq) {
        self.pending &= !irq.bit();
    }

    #[must_use]
    pub fn is_pending(&self, irq: Irq) -> bool {
        self.pending & irq.bit() != 0
    }

    /// Raw request bitmask, bit n = `Irq::ALL[n]`.
    #[must_use]
    pub fn pending(&self) -> u16 {
        self.pending
    }

    /// Highest level currently in service.
    #[must_use]
    pub fn active_priority(&self) -> Option<Priority> {
        Priority::ALL.into_iter().rev().find(|p| self.active[p.index()].is_some())
    }

    /// Source in service at `priority`.
    #[must_use]
    pub fn active(&self, priority: Priority) -> Option<Irq> {
        self.active[priority.index()]
    }

    #[must_use]
    pub fn prev_priority(&self) -> Priority {
        self.prev_priority
    }

    /// An instruction retired; arbitration may run again.
    pub fn instruction_complete(&mut self) {
        self.serviced_this_instruction = false;
    }

    /// Arbitrate at an instruction boundary.
    ///
    /// On admission the return address `pc` is pushed (low byte first),
    /// PCON HALT is cleared and the vector is returned for the caller to
    /// jump to.
    pub fn admit(&mut self, memory: &mut Memory, pc: u16) -> Option<u16> {
        if self.serviced_this_instruction || self.pending == 0 {
            return None;
        }
        let ie = memory.sfr(IE);
        let ip = memory.sfr(IP);

        // Idle: start below the level served last, so no level starves.
        // Nested: only strictly higher levels, highest first.
        let active = self.active_priority();
        let prev = self.prev_priority.index();
        let order = match active {
            None => [(prev + 2) % 3, (prev + 1) % 3, prev],
            Some(_) => [2, 1, 0],
        };

        let (priority, irq) = order
            .into_iter()
            .map(|i| Priority::ALL[i])
            .take_while(|level| active.is_none_or(|active| *level > active))
            .find_map(|level| self.candidate(level, ie, ip).map(|irq| (level, irq)))?;

        self.pending &= !irq.bit();
        self.active[priority.index()] = Some(irq);
        self.last_in_level[priority.index()] = Some(irq);
        self.serviced_this_instruction = true;

        let [lo, hi] = pc.to_le_bytes();
        let mut fault = memory.push_stack(lo).err();
        fault = fault.or(memory.push_stack(hi).err());
        if let Some(fault) = fault {
            log::warn!("{fault} entering {irq:?} from {pc:04X}");
        }

        let pcon = memory.sfr(PCON);
        memory.set_sfr(PCON, pcon & !PCON_HALT);

        log::debug!("admit {irq:?} at {priority:?}, {pc:04X} -> {:04X}", irq.vector());
        Some(irq.vector())
    }

    /// Pending source at `level`, starting after the one admitted last.
    fn candidate(&self, level: Priority, ie: u8, ip: u8) -> Option<Irq> {
        let start = self.last_in_level[level.index()].map_or(0, |irq| irq as usize + 1);
        (0..Irq::ALL.len())
            .map(|i| Irq::ALL[(start + i) % Irq::ALL.len()])
            .find(|&irq| self.is_pending(irq) && priority_of(irq, ie, ip) == Some(level))
    }

    /// `RETI`: pop the return address (high byte first) and vacate the
    /// innermost level.
    pub fn return_from_interrupt(&mut self, memory: &mut Memory) -> u16 {
        let (hi, hi_fault) = memory.pop_stack();
        let (lo, lo_fault) = memory.pop_stack();
        if let Some(fault) = hi_fault.or(lo_fault) {
            log::warn!("{fault} on RETI");
        }
        let pc = u16::from_le_bytes([lo, hi]);

        if let Some(priority) = self.active_priority() {
            let irq = self.active[priority.index()].take();
            self.prev_priority = priority;
            log::debug!("return from {irq:?} at {priority:?} to {pc:04X}");
        } else {
            log::debug!("RETI with nothing in service, to {pc:04X}");
        }
        pc
    }
}

impl Default for Pic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfr::SP;

    fn memory(ie: u8, ip: u8) -> Memory {
        let mut memory = Memory::new();
        memory.set_sfr(SP, 0x7F);
        memory.set_sfr(IE, ie);
        memory.set_sfr(IP, ip);
        memory
    }

    #[test]
    fn vectors_are_eight_apart_after_int0() {
        assert_eq!(Irq::Reset.vector(), 0x00);
        assert_eq!(Irq::ExtInt0.vector(), 0x03);
        for pair in Irq::ALL[1..].windows(2) {
            assert_eq!(pair[1].vector() - pair[0].vector(), 8);
        }
    }

    #[test]
    fn maskable_sources_need_master_enable() {
        assert_eq!(priority_of(Irq::T1, 0x00, 0xFF), None);
        assert_eq!(priority_of(Irq::T1, 0x80, 0x00), Some(Priority::Low));
        assert_eq!(priority_of(Irq::T1, 0x80, 0x08), Some(Priority::High));
        assert_eq!(priority_of(Irq::Reset, 0x00, 0x00), Some(Priority::Highest));
    }

    #[test]
    fn int0_int1_pair() {
        assert_eq!(priority_of(Irq::ExtInt0, 0x00, 0), Some(Priority::Highest));
        assert_eq!(priority_of(Irq::ExtInt1, 0x00, 0), Some(Priority::Highest));
        // Either bit set drops both.
        for ie in [0x81, 0x82, 0x83] {
            assert_eq!(priority_of(Irq::ExtInt0, ie, 0), Some(Priority::Low));
            assert_eq!(priority_of(Irq::ExtInt1, ie, 0), Some(Priority::Low));
        }
        assert_eq!(priority_of(Irq::ExtInt0, 0x01, 0), None);
        assert_eq!(priority_of(Irq::ExtInt1, 0x02, 0), None);
    }

    #[test]
    fn admission_pushes_pc_low_then_high() {
        let mut mem = memory(0x80, 0);
        let mut pic = Pic::new();
        pic.raise(Irq::T1);
        assert_eq!(pic.admit(&mut mem, 0x1234), Some(0x2B));
        assert_eq!(mem.ram(0)[0x80], 0x34);
        assert_eq!(mem.ram(0)[0x81], 0x12);
        assert_eq!(mem.sfr(SP), 0x81);
        assert!(!pic.is_pending(Irq::T1));
        assert_eq!(pic.active(Priority::Low), Some(Irq::T1));

        assert_eq!(pic.return_from_interrupt(&mut mem), 0x1234);
        assert_eq!(mem.sfr(SP), 0x7F);
        assert_eq!(pic.active_priority(), None);
        assert_eq!(pic.prev_priority(), Priority::Low);
    }

    #[test]
    fn admission_clears_halt() {
        let mut mem = memory(0x80, 0);
        mem.set_sfr(PCON, PCON_HALT);
        let mut pic = Pic::new();
        pic.raise(Irq::P3);
        assert!(pic.admit(&mut mem, 0).is_some());
        assert_eq!(mem.sfr(PCON) & PCON_HALT, 0);
    }

    #[test]
    fn masked_request_stays_pending() {
        let mut mem = memory(0x00, 0);
        let mut pic = Pic::new();
        pic.raise(Irq::Sio0);
        assert_eq!(pic.admit(&mut mem, 0), None);
        assert!(pic.is_pending(Irq::Sio0));
    }

    #[test]
    fn one_admission_per_instruction() {
        let mut mem = memory(0x80, 0x08);
        let mut pic = Pic::new();
        pic.raise(Irq::P3);
        assert_eq!(pic.admit(&mut mem, 0x200), Some(Irq::P3.vector()));
        pic.raise(Irq::T1);
        assert_eq!(pic.admit(&mut mem, Irq::P3.vector()), None);
        pic.instruction_complete();
        assert_eq!(pic.admit(&mut mem, Irq::P3.vector() + 1), Some(Irq::T1.vector()));
    }

    #[test]
    fn nesting_only_escalates() {
        let mut mem = memory(0x80, 0x08);
        let mut pic = Pic::new();
        pic.raise(Irq::T1);
        assert!(pic.admit(&mut mem, 0).is_some());
        pic.instruction_complete();

        // Same level: waits.
        pic.raise(Irq::T0H);
        mem.set_sfr(IP, 0x0C);
        assert_eq!(pic.admit(&mut mem, 0x2B), None);
        pic.instruction_complete();

        // Highest preempts high.
        mem.set_sfr(IE, 0x00);
        pic.raise(Irq::ExtInt0);
        assert_eq!(pic.admit(&mut mem, 0x2B), Some(Irq::ExtInt0.vector()));
        assert_eq!(pic.active_priority(), Some(Priority::Highest));
    }

    #[test]
    fn equal_sources_alternate() {
        let mut mem = memory(0x80, 0x0C);
        let mut pic = Pic::new();
        let mut counts = [0u32; 2];
        let rounds = 20;
        for _ in 0..rounds {
            pic.raise(Irq::T0H);
            pic.raise(Irq::T1);
            let vector = pic.admit(&mut mem, 0x100);
            match vector {
                Some(0x23) => counts[0] += 1,
                Some(0x2B) => counts[1] += 1,
                other => panic!("unexpected {other:?}"),
            }
            pic.instruction_complete();
            pic.return_from_interrupt(&mut mem);
        }
        assert!(counts[0] >= rounds / 2 - 1, "{counts:?}");
        assert!(counts[1] >= rounds / 2 - 1, "{counts:?}");
    }

    #[test]
    fn idle_scan_rotates_levels() {
        let mut mem = memory(0x80, 0x08);
        let mut pic = Pic::new();

        // After servicing high, low is looked at first.
        pic.raise(Irq::T1);
        pic.admit(&mut mem, 0);
        pic.instruction_complete();
        pic.return_from_interrupt(&mut mem);
        assert_eq!(pic.prev_priority(), Priority::High);

        pic.raise(Irq::T1);
        pic.raise(Irq::Sio0);
        assert_eq!(pic.admit(&mut mem, 0), Some(Irq::Sio0.vector()));
    }
}
