//! Save states.
//!
//! Layout: the magic `VMUS`, one format version byte, then a MessagePack
//! map of named fields. Named fields let later versions add state without
//! breaking older files; the version byte covers changes that cannot be
//! expressed that way.

use emu_core::Ticks;
use sanyo_lc86k::FlashProgrammer;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::memory::MemoryImage;
use crate::peripherals::Peripherals;
use crate::pic::Pic;
use crate::timers::Timers;

pub const MAGIC: &[u8; 4] = b"VMUS";
pub const VERSION: u8 = 1;

/// Everything needed to resume a VMU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct State {
    pub pc: u16,
    pub cycles: Ticks,
    pub flash_programmer: FlashProgrammer,
    pub memory: MemoryImage,
    pub pic: Pic,
    pub timers: Timers,
    pub peripherals: Peripherals,
    pub external_pins: u8,
    pub budget: f64,
    pub elapsed: f64,
}

pub(crate) fn encode(state: &State) -> Result<Vec<u8>, SnapshotError> {
    let body = rmp_serde::to_vec_named(state)?;
    let mut bytes = Vec::with_capacity(MAGIC.len() + 1 + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(VERSION);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<State, SnapshotError> {
    let header = MAGIC.len() + 1;
    if bytes.len() < header {
        return Err(SnapshotError::Truncated);
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = bytes[MAGIC.len()];
    if version != VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    Ok(rmp_serde::from_slice(&bytes[header..])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_checks() {
        assert!(matches!(decode(b"VM"), Err(SnapshotError::Truncated)));
        assert!(matches!(decode(b"NOPE\x01"), Err(SnapshotError::BadMagic)));
        assert!(matches!(
            decode(b"VMUS\x07"),
            Err(SnapshotError::UnsupportedVersion(7))
        ));
        assert!(matches!(decode(b"VMUS\x01\xC1"), Err(SnapshotError::Decode(_))));
    }
}
