//! `STF` flash programming state machine.
//!
//! Flash only accepts writes after a three-step command handshake issued
//! while FPR's unlock bit is set:
//!
//! | Step | TRH:TRL | ACC  |
//! |------|---------|------|
//! | 1    | $5555   | $AA  |
//! | 2    | $2AAA   | $55  |
//! | 3    | $5555   | $A0  |
//!
//! With the unlock bit cleared again, up to 128 `STF`s then program one
//! aligned 128-byte page, one byte per instruction. Anything else aborts
//! the sequence and the byte is dropped.

use thiserror::Error;

/// Bytes programmed per unlock.
pub const PAGE_SIZE: u8 = 128;

const COMMAND_ADDRESS_1: u16 = 0x5555;
const COMMAND_ADDRESS_2: u16 = 0x2AAA;

/// Why an `STF` was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlashError {
    #[error("flash write at {address:#07X} while locked")]
    Locked { address: u32 },
    #[error("unlock step {step} got {value:#04X} at {address:#06X}")]
    BadSequence { step: u8, address: u16, value: u8 },
    #[error("page write starts at unaligned address {address:#07X}")]
    Unaligned { address: u32 },
    #[error("page write budget of {PAGE_SIZE} bytes exhausted")]
    BudgetExhausted,
}

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlashState {
    #[default]
    Locked,
    /// Step 1 accepted.
    Unlock1,
    /// Step 2 accepted.
    Unlock2,
    /// Handshake complete; `written` bytes of the page done so far.
    Programming { page: u32, written: u8 },
}

/// Tracks the unlock handshake and the page write budget.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashProgrammer {
    state: FlashState,
    #[cfg_attr(feature = "serde", serde(skip))]
    last_error: Option<FlashError>,
}

impl FlashProgrammer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> FlashState {
        self.state
    }

    /// The most recent refusal, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<FlashError> {
        self.last_error
    }

    pub fn reset(&mut self) {
        self.state = FlashState::Locked;
        self.last_error = None;
    }

    /// Feed one `STF`.
    ///
    /// `address` is the 17-bit flash address (FPR bank bit above TRH:TRL),
    /// `unlocking` the FPR unlock bit. Returns the flash address to program,
    /// or `None` when the write only advanced the handshake. On error the
    /// machine is back to locked and nothing may be written.
    pub fn store(&mut self, address: u32, value: u8, unlocking: bool) -> Result<Option<u32>, FlashError> {
        let result = if unlocking {
            self.handshake(address as u16, value).map(|()| None)
        } else {
            self.program(address).map(Some)
        };
        if let Err(err) = result {
            self.state = FlashState::Locked;
            self.last_error = Some(err);
        }
        result
    }

    fn handshake(&mut self, address: u16, value: u8) -> Result<(), FlashError> {
        // Step 1 restarts the sequence from any state.
        if address == COMMAND_ADDRESS_1 && value == 0xAA {
            self.state = FlashState::Unlock1;
            return Ok(());
        }
        self.state = match (self.state, address, value) {
            (FlashState::Unlock1, COMMAND_ADDRESS_2, 0x55) => FlashState::Unlock2,
            (FlashState::Unlock2, COMMAND_ADDRESS_1, 0xA0) => FlashState::Programming {
                page: 0,
                written: 0,
            },
            (state, _, _) => {
                let step = match state {
                    FlashState::Unlock1 => 2,
                    FlashState::Unlock2 => 3,
                    _ => 1,
                };
                return Err(FlashError::BadSequence {
                    step,
                    address,
                    value,
                });
            }
        };
        Ok(())
    }

    fn program(&mut self, address: u32) -> Result<u32, FlashError> {
        let FlashState::Programming { page, written } = self.state else {
            return Err(FlashError::Locked { address });
        };
        if written >= PAGE_SIZE {
            return Err(FlashError::BudgetExhausted);
        }
        let page = if written == 0 {
            if address % u32::from(PAGE_SIZE) != 0 {
                return Err(FlashError::Unaligned { address });
            }
            address
        } else {
            page
        };
        let target = (page & !0xFF) | ((page + u32::from(written)) & 0xFF);
        self.state = FlashState::Programming {
            page,
            written: written + 1,
        };
        Ok(target)
    }
}
