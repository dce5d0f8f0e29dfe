//! Time Source Providers
//!
//! ## Overview
//!
//! A provider turns one piece of hardware into [`TimeSample`]s behind a
//! uniform non-blocking contract: `poll` either yields a fresh sample or
//! nothing, and never blocks. The arbitration engine stays source-agnostic
//! beyond the sample's accuracy class, which is what lets a future NTP
//! client plug in without touching arbitration at all.
//!
//! ## Failure Budget
//!
//! Each provider owns a [`SourceHandle`] tracking its last sample and a
//! consecutive-failure count. Bus failures are absorbed here - converted
//! into "no sample this cycle" plus a count increment, never propagated
//! upwards as fatal. Once the count reaches the configured budget the
//! handle disables itself permanently (until restart); the engine then
//! arbitrates among whatever sources remain.
//!
//! Handles are created at startup and never destroyed: a disabled source
//! still answers status queries for the presenter and for diagnostics.

pub mod gps;
pub mod rtc;

pub use gps::GpsProvider;
pub use rtc::RtcProvider;

use crate::bus::SegmentBus;
use crate::log_warn;
use crate::sample::{SourceId, TimeSample};
use crate::time::Tick;

/// Non-blocking sample producer over one time source.
///
/// `poll` receives the bus because the scheduler enforces single-owner
/// discipline: only the currently running task may touch it, and only for
/// bounded transactions. Providers that need no bus (GPS consumes a UART
/// byte stream fed separately) simply ignore it.
pub trait TimeProvider {
    /// Produce a fresh sample if one is ready. Never blocks.
    fn poll(&mut self, now: Tick, bus: &mut dyn SegmentBus) -> Option<TimeSample>;

    /// Which source this provider represents.
    fn source_id(&self) -> SourceId;

    /// Per-source state: last sample, failures, enablement.
    fn handle(&self) -> &SourceHandle;
}

/// Per-source lifecycle state. Created at startup, never destroyed.
#[derive(Debug, Clone, Copy)]
pub struct SourceHandle {
    source: SourceId,
    last_sample: Option<TimeSample>,
    consecutive_failures: u8,
    failure_budget: u8,
    enabled: bool,
}

impl SourceHandle {
    /// Fresh enabled handle with the given consecutive-failure budget.
    pub const fn new(source: SourceId, failure_budget: u8) -> Self {
        Self {
            source,
            last_sample: None,
            consecutive_failures: 0,
            failure_budget,
            enabled: true,
        }
    }

    /// Source this handle tracks.
    pub const fn source(&self) -> SourceId {
        self.source
    }

    /// Whether the source may still be polled.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Most recent accepted sample, if any.
    pub const fn last_sample(&self) -> Option<TimeSample> {
        self.last_sample
    }

    /// Current consecutive-failure count.
    pub const fn consecutive_failures(&self) -> u8 {
        self.consecutive_failures
    }

    /// Record a successful read; resets the failure streak.
    pub fn record_success(&mut self, sample: TimeSample) {
        self.last_sample = Some(sample);
        self.consecutive_failures = 0;
    }

    /// Record a failed read. Returns true if this one disabled the source.
    pub fn record_failure(&mut self) -> bool {
        if !self.enabled {
            return false;
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.failure_budget {
            self.enabled = false;
            log_warn!(
                "source {} disabled after {} consecutive failures",
                self.source.name(),
                self.consecutive_failures
            );
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_disables_permanently() {
        let mut handle = SourceHandle::new(SourceId::Rtc, 3);

        assert!(!handle.record_failure());
        assert!(!handle.record_failure());
        assert!(handle.record_failure());
        assert!(!handle.is_enabled());

        // Further failures are no-ops, not re-triggers
        assert!(!handle.record_failure());
    }

    #[test]
    fn success_resets_streak() {
        let mut handle = SourceHandle::new(SourceId::Gps, 3);
        handle.record_failure();
        handle.record_failure();

        let sample =
            TimeSample::whole_second(1000, SourceId::Gps, crate::AccuracyClass::GpsUnlocked, 10);
        handle.record_success(sample);

        assert_eq!(handle.consecutive_failures(), 0);
        assert_eq!(handle.last_sample(), Some(sample));
        assert!(handle.is_enabled());

        // The old streak does not carry over
        handle.record_failure();
        handle.record_failure();
        assert!(handle.is_enabled());
    }
}
