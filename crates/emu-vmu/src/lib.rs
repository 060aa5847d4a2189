//! Cycle-accurate Sega Dreamcast Visual Memory Unit emulator.
//!
//! The VMU is a Sanyo LC86K-series microcontroller with 128 KB of flash, a
//! 48x32 LCD, a piezo buzzer, eight buttons and a serial link. The CPU
//! lives in `sanyo-lc86k`; this crate supplies the memory map, the register
//! side effects, the interrupt controller, the timers and the peripherals,
//! and ties them together in [`Vmu`].

mod bus;
mod buzzer;
mod config;
pub mod display;
mod error;
pub mod firmware;
mod gamepad;
mod memory;
mod peripherals;
mod pic;
mod serial;
pub mod sfr;
mod snapshot;
pub mod timers;
mod vmu;

pub use bus::{MemoryListener, VmuBus};
pub use buzzer::{Buzzer, Tone};
pub use config::VmuConfig;
pub use display::Display;
pub use error::{SnapshotError, VmuError};
pub use gamepad::{Button, Gamepad};
pub use memory::{Memory, ProgramSource, Segment};
pub use peripherals::{Peripherals, Sink};
pub use pic::{Irq, Pic, Priority, priority_of};
pub use serial::{Channel, Serial};
pub use snapshot::{MAGIC as SNAPSHOT_MAGIC, VERSION as SNAPSHOT_VERSION};
pub use vmu::Vmu;
