//! Core clock engine for tickfuse
//!
//! Fuses time samples from sources of differing precision (battery-backed
//! RTC, GPS with a pulse-per-second line, future NTP) into one authoritative
//! wall-clock estimate and renders it onto addressable 7-segment I2C
//! displays, driven by a cooperative single-core schedule.
//!
//! Key constraints:
//! - No OS, no threads: one execution context plus a hardware PPS edge
//! - No heap allocation in the per-cycle path
//! - A wedged device must never stall the display refresh
//!
//! ```no_run
//! use tickfuse_core::{ClockConfig, ClockEngine, PpsLatch};
//! use tickfuse_core::time::MockClock;
//! # use tickfuse_core::bus::{SegmentBus, BusError};
//! # struct Board;
//! # impl SegmentBus for Board {
//! #     fn write(&mut self, _: u8, _: &[u8]) -> nb::Result<(), BusError> { Ok(()) }
//! #     fn read(&mut self, _: u8, _: &mut [u8]) -> nb::Result<(), BusError> { Ok(()) }
//! # }
//!
//! static PPS: PpsLatch = PpsLatch::new();
//!
//! let clock = MockClock::new(0, 1_000_000);
//! let mut engine = ClockEngine::new(ClockConfig::default(), Board, clock, &PPS).unwrap();
//!
//! // From the PPS edge interrupt: PPS.record(tick)
//! // From the UART handler:       engine.feed_gps(bytes)
//! loop {
//!     engine.run_cycle();
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod arbiter;
pub mod bus;
pub mod config;
pub mod display;
pub mod errors;
pub mod pps;
pub mod runtime;
pub mod sample;
pub mod scheduler;
pub mod source;
pub mod time;

// Public API
pub use arbiter::{ClockArbiter, EstimateView};
pub use config::{ClockConfig, DisplayBinding};
pub use errors::{BusError, ClockError, ConfigError};
pub use pps::PpsLatch;
pub use runtime::ClockEngine;
pub use sample::{AccuracyClass, Confidence, FixQuality, SourceId, TimeSample};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Macros for optional logging
#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

#[cfg(feature = "log")]
macro_rules! log_info {
    ($($arg:tt)*) => { log::info!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_info {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

pub(crate) use {log_info, log_warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
