//! Ticks, Wall Time, and the Monotonic Clock Abstraction
//!
//! Two kinds of time flow through the engine and must never be confused:
//!
//! - **Ticks**: the processor's free-running monotonic counter. Ticks only
//!   move forward, carry no calendar meaning, and are the only currency for
//!   measuring intervals (PPS anchoring, staleness, schedule deadlines).
//! - **Wall time**: seconds since the Unix epoch plus a subsecond expressed
//!   in ticks past the last whole second. Wall time can jump, forwards or
//!   backwards, whenever a better source corrects the estimate.
//!
//! The bridge between them is an *anchor*: a tick value at which a wall
//! time was known to be correct. Extrapolating from the anchor with the
//! monotonic counter is what gives smooth once-per-second ticking without a
//! continuously active high-rate poll.
//!
//! ## Platform Notes
//!
//! `MonotonicClock` is the seam a board crate implements over its hardware
//! timer. On bare metal, read the timer peripheral; under an RTOS, the tick
//! count. `MockClock` gives deterministic control for tests; `SystemClock`
//! (std only) backs host simulation.

use core::cell::Cell;

use chrono::{Datelike, Timelike};

/// Monotonic counter value in ticks since boot.
pub type Tick = u64;

/// Broken-out calendar time, always UTC.
///
/// Produced from [`WallTime`] for the presenter; never used for arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    /// Full year (e.g. 2026)
    pub year: u16,
    /// Month 1-12
    pub month: u8,
    /// Day of month 1-31
    pub day: u8,
    /// Hour 0-23
    pub hour: u8,
    /// Minute 0-59
    pub minute: u8,
    /// Second 0-59
    pub second: u8,
}

impl CivilTime {
    /// Epoch seconds for this calendar time, if it is representable.
    pub fn to_epoch(&self) -> Option<u64> {
        let date = chrono::NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?;
        let dt = date.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )?;
        u64::try_from(dt.and_utc().timestamp()).ok()
    }
}

/// Wall-clock instant: whole epoch seconds plus ticks into the next second.
///
/// Invariant: `subsec_ticks` is always below the clock's tick rate; the
/// constructors and [`WallTime::advanced_by`] normalize overflow into the
/// seconds field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallTime {
    /// Whole seconds since the Unix epoch
    pub epoch_seconds: u64,
    /// Ticks elapsed past the last whole second
    pub subsec_ticks: u32,
}

impl WallTime {
    /// A wall time on an exact second boundary.
    pub const fn whole(epoch_seconds: u64) -> Self {
        Self { epoch_seconds, subsec_ticks: 0 }
    }

    /// Wall time advanced by a tick interval, carrying into seconds.
    pub fn advanced_by(&self, delta: Tick, tick_rate: u32) -> Self {
        let rate = u64::from(tick_rate.max(1));
        let total = u64::from(self.subsec_ticks) + delta;
        Self {
            epoch_seconds: self.epoch_seconds + total / rate,
            subsec_ticks: (total % rate) as u32,
        }
    }

    /// Ticks remaining until the next whole-second boundary.
    pub fn ticks_to_boundary(&self, tick_rate: u32) -> Tick {
        u64::from(tick_rate.max(1)) - u64::from(self.subsec_ticks.min(tick_rate.saturating_sub(1)))
    }

    /// Calendar view of this instant (UTC). None outside chrono's range.
    pub fn civil(&self) -> Option<CivilTime> {
        let secs = i64::try_from(self.epoch_seconds).ok()?;
        let dt = chrono::DateTime::from_timestamp(secs, 0)?;
        Some(CivilTime {
            year: u16::try_from(dt.year()).ok()?,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        })
    }
}

/// Source of monotonic ticks for the engine.
///
/// Implementations must be cheap to call (the schedule reads it once per
/// cycle) and must never move backwards. Tick rate is fixed for the life
/// of the clock.
pub trait MonotonicClock {
    /// Current counter value in ticks since boot.
    fn now(&self) -> Tick;

    /// Counter frequency in ticks per second.
    fn tick_rate(&self) -> u32;
}

/// Controllable clock for tests and host simulation.
///
/// Interior mutability keeps `now(&self)` on the trait while scenarios
/// advance time between cycles.
#[derive(Debug)]
pub struct MockClock {
    tick: Cell<Tick>,
    rate: u32,
}

impl MockClock {
    /// Clock starting at `tick` running at `rate` ticks per second.
    pub const fn new(tick: Tick, rate: u32) -> Self {
        Self { tick: Cell::new(tick), rate }
    }

    /// Jump to an absolute tick value.
    pub fn set(&self, tick: Tick) {
        self.tick.set(tick);
    }

    /// Advance by a tick interval.
    pub fn advance(&self, delta: Tick) {
        self.tick.set(self.tick.get() + delta);
    }

    /// Advance by whole seconds at the configured rate.
    pub fn advance_seconds(&self, seconds: u64) {
        self.advance(seconds * u64::from(self.rate));
    }
}

impl MonotonicClock for MockClock {
    fn now(&self) -> Tick {
        self.tick.get()
    }

    fn tick_rate(&self) -> u32 {
        self.rate
    }
}

/// Host clock backed by `std::time::Instant` (microsecond ticks).
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemClock {
    /// Clock anchored at the moment of construction.
    pub fn new() -> Self {
        Self { origin: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl MonotonicClock for SystemClock {
    fn now(&self) -> Tick {
        self.origin.elapsed().as_micros() as Tick
    }

    fn tick_rate(&self) -> u32 {
        1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances() {
        let clock = MockClock::new(1000, 1000);
        assert_eq!(clock.now(), 1000);

        clock.advance(500);
        assert_eq!(clock.now(), 1500);

        clock.advance_seconds(2);
        assert_eq!(clock.now(), 3500);
    }

    #[test]
    fn wall_time_carries_seconds() {
        let wall = WallTime { epoch_seconds: 1000, subsec_ticks: 900 };
        let later = wall.advanced_by(250, 1000);
        assert_eq!(later.epoch_seconds, 1001);
        assert_eq!(later.subsec_ticks, 150);
    }

    #[test]
    fn wall_time_boundary_distance() {
        let wall = WallTime { epoch_seconds: 5, subsec_ticks: 750 };
        assert_eq!(wall.ticks_to_boundary(1000), 250);
        assert_eq!(WallTime::whole(5).ticks_to_boundary(1000), 1000);
    }

    #[test]
    fn civil_round_trip() {
        // 2024-01-12 21:22:23 UTC
        let civil = CivilTime {
            year: 2024,
            month: 1,
            day: 12,
            hour: 21,
            minute: 22,
            second: 23,
        };
        let epoch = civil.to_epoch().unwrap();
        assert_eq!(WallTime::whole(epoch).civil().unwrap(), civil);
    }

    #[test]
    fn civil_known_epoch() {
        // 2000-03-01 00:00:00 UTC == 951868800
        let civil = WallTime::whole(951_868_800).civil().unwrap();
        assert_eq!((civil.year, civil.month, civil.day), (2000, 3, 1));
        assert_eq!((civil.hour, civil.minute, civil.second), (0, 0, 0));
    }
}
