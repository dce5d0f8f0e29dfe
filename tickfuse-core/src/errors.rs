//! Error Types for Bus, Configuration, and Clock Failures
//!
//! ## Design Philosophy
//!
//! The error system follows the same rules as the rest of the crate:
//!
//! 1. **Small Size**: Every variant is a few bytes at most; errors are
//!    returned from hot per-cycle paths and absorbed at provider
//!    boundaries.
//!
//! 2. **No Heap Allocation**: All error data is inline - no String, only
//!    small integers and `&'static str`. Deterministic memory usage.
//!
//! 3. **Copy Semantics**: Errors implement Copy so recording one on a
//!    handle never moves it out of the caller.
//!
//! ## Error Categories
//!
//! ### Transient (per-transaction)
//! - `BusError::NoAck`: device absent or unpowered
//! - `BusError::Timeout`: transaction exceeded its step budget
//!
//! Transient errors are absorbed at the provider or display boundary and
//! converted into "no sample / no refresh this cycle". They are retried
//! only by the next scheduled cycle, never synchronously.
//!
//! ### Permanent (per-source)
//! - `ClockError::ProviderUnavailable`: a source exhausted its consecutive
//!   failure budget and is disabled until restart
//!
//! ### Fatal (startup only)
//! - `ConfigError`: the configuration is internally inconsistent, e.g. two
//!   displays share an I2C address. Nothing runs with a broken config.
//!
//! ### Surfaced to the user
//! - `ClockError::TimeUnknown`: no confident source remains. The presenter
//!   renders a distinct "time unknown" pattern, never a fabricated 00:00.

use thiserror_no_std::Error;

use crate::sample::SourceId;

/// Failure of a single bounded bus transaction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Device did not acknowledge its address (absent or unpowered)
    #[error("no ack from device 0x{address:02x}")]
    NoAck {
        /// Target bus address of the failed transaction
        address: u8,
    },

    /// Transaction did not complete within its step budget
    #[error("bus transaction timed out at 0x{address:02x}")]
    Timeout {
        /// Target bus address of the failed transaction
        address: u8,
    },
}

impl BusError {
    /// Target address of the failed transaction.
    pub const fn address(&self) -> u8 {
        match self {
            BusError::NoAck { address } => *address,
            BusError::Timeout { address } => *address,
        }
    }
}

/// Startup configuration inconsistency. Always fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Two configured devices share one bus address
    #[error("duplicate bus address 0x{address:02x}")]
    DuplicateAddress {
        /// The address claimed more than once
        address: u8,
    },

    /// Monotonic tick rate of zero cannot anchor subseconds
    #[error("tick rate must be non-zero")]
    ZeroTickRate,

    /// A threshold pair is inverted (ceiling below threshold)
    #[error("staleness ceiling {ceiling_s}s below threshold {threshold_s}s")]
    InvertedStaleness {
        /// Configured staleness threshold in seconds
        threshold_s: u32,
        /// Configured staleness ceiling in seconds
        ceiling_s: u32,
    },

    /// A failure budget of zero would disable a source before first use
    #[error("failure budget must be non-zero")]
    ZeroFailureBudget,
}

/// Clock-level errors surfaced by the engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// No enabled source has produced a confident estimate
    #[error("no confident time source")]
    TimeUnknown,

    /// Source exhausted its failure budget and is disabled until restart
    #[error("source {0:?} disabled after exhausting failure budget")]
    ProviderUnavailable(SourceId),

    /// Underlying bus failure
    #[error("bus: {0}")]
    Bus(#[from] BusError),
}

#[cfg(feature = "defmt")]
impl defmt::Format for BusError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NoAck { address } => defmt::write!(fmt, "no ack from 0x{:02x}", address),
            Self::Timeout { address } => defmt::write!(fmt, "timeout at 0x{:02x}", address),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::DuplicateAddress { address } => {
                defmt::write!(fmt, "duplicate address 0x{:02x}", address)
            }
            Self::ZeroTickRate => defmt::write!(fmt, "zero tick rate"),
            Self::InvertedStaleness { threshold_s, ceiling_s } => {
                defmt::write!(fmt, "ceiling {}s below threshold {}s", ceiling_s, threshold_s)
            }
            Self::ZeroFailureBudget => defmt::write!(fmt, "zero failure budget"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ClockError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::TimeUnknown => defmt::write!(fmt, "time unknown"),
            Self::ProviderUnavailable(source) => {
                defmt::write!(fmt, "source {} unavailable", source.name())
            }
            Self::Bus(e) => defmt::write!(fmt, "bus: {}", e),
        }
    }
}
