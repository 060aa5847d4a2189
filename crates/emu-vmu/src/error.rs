//! Device-level errors.

use sanyo_lc86k::{BusError, CpuError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmuError {
    #[error(transparent)]
    Cpu(#[from] CpuError),
    /// A host access through [`Vmu::write_data`](crate::Vmu::write_data)
    /// or [`Vmu::read_data`](crate::Vmu::read_data) failed.
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Why a snapshot could not be written or read back.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("not a VMU snapshot")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),
    #[error("snapshot truncated")]
    Truncated,
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("snapshot memory image has the wrong size")]
    Layout,
}
