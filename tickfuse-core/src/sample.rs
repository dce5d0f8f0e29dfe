//! Time Samples and Their Classification
//!
//! ## Overview
//!
//! Every provider reduces its hardware-specific reading to one common
//! currency: the [`TimeSample`]. Arbitration is deliberately ignorant of
//! *how* a sample was obtained; all it sees is the wall-clock value, the
//! monotonic tick at which the value was true, and an [`AccuracyClass`]
//! ranking how much to trust it.
//!
//! ## Accuracy Ordering
//!
//! The class ordering is a total order and drives the whole arbitration
//! policy:
//!
//! ```text
//! Coarse < Rtc < GpsUnlocked < GpsLocked
//! ```
//!
//! A sample of lower class never displaces a fresh estimate from a higher
//! class; it only wins once the higher-class source has gone stale. The
//! ordering is encoded in the enum discriminants so `Ord` is derived, not
//! hand-written.
//!
//! ## Confidence vs Accuracy
//!
//! [`AccuracyClass`] describes one sample. [`Confidence`] describes the
//! engine's current trust in the fused estimate, which also factors in age:
//! a GPS-locked estimate decays to `Confidence::None` if nothing refreshes
//! it past the staleness ceiling, even though the sample that set it was
//! top-class at the time.

use crate::time::Tick;

/// Relative trust ranking of a time sample. Total order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum AccuracyClass {
    /// Second-or-worse accuracy, e.g. a just-booted internal RTC
    Coarse = 0,
    /// Battery-backed external RTC, whole-second accuracy
    Rtc = 1,
    /// GPS sentence without a recent PPS edge; second known, phase unknown
    GpsUnlocked = 2,
    /// GPS sentence anchored to a PPS edge; microsecond-class phase
    GpsLocked = 3,
}

impl AccuracyClass {
    /// Human-readable name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            AccuracyClass::Coarse => "coarse",
            AccuracyClass::Rtc => "rtc",
            AccuracyClass::GpsUnlocked => "gps-unlocked",
            AccuracyClass::GpsLocked => "gps-locked",
        }
    }
}

/// Identity of a time source. One handle exists per configured source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SourceId {
    /// External battery-backed RTC chip
    Rtc = 0,
    /// GPS receiver (UART sentences + PPS line)
    Gps = 1,
    /// Network time, future provider behind the same poll contract
    Ntp = 2,
}

impl SourceId {
    /// Human-readable name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            SourceId::Rtc => "rtc",
            SourceId::Gps => "gps",
            SourceId::Ntp => "ntp",
        }
    }

    /// Status-display mnemonic, exactly four 7-segment-renderable chars.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            SourceId::Rtc => "RTC ",
            SourceId::Gps => "GPS ",
            SourceId::Ntp => "NTP ",
        }
    }
}

/// GPS fix quality reported alongside samples via the side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FixQuality {
    /// Receiver reports no valid fix
    NoFix = 0,
    /// Two-dimensional fix
    Fix2d = 1,
    /// Full three-dimensional fix
    Fix3d = 2,
}

impl FixQuality {
    /// Whether the receiver's time solution can be trusted at all.
    pub const fn is_valid(&self) -> bool {
        !matches!(self, FixQuality::NoFix)
    }
}

/// Engine-level trust in the fused estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Confidence {
    /// No usable estimate; displays must show the unknown pattern
    None = 0,
    /// Estimate held, whole-second trust only
    Low = 1,
    /// PPS-anchored estimate with subsecond phase
    High = 2,
}

impl Confidence {
    /// Baseline confidence a fresh sample of the given class earns.
    pub const fn from_accuracy(accuracy: AccuracyClass) -> Self {
        match accuracy {
            AccuracyClass::GpsLocked => Confidence::High,
            _ => Confidence::Low,
        }
    }
}

/// One timestamped reading from a single source.
///
/// Immutable once produced; ownership passes to the arbitration engine on
/// ingestion. `captured_at` is the monotonic tick at which the wall value
/// was true - for PPS-anchored samples that is the edge tick itself, for
/// everything else the tick of the read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSample {
    /// Whole seconds since the Unix epoch
    pub epoch_seconds: u64,
    /// Ticks past the whole second at `captured_at` (0 for whole-second sources)
    pub subsec_ticks: u32,
    /// Which source produced this sample
    pub source: SourceId,
    /// Trust ranking of this sample
    pub accuracy: AccuracyClass,
    /// Monotonic tick at which the wall value was true
    pub captured_at: Tick,
}

impl TimeSample {
    /// Whole-second sample, the RTC-style case.
    pub const fn whole_second(
        epoch_seconds: u64,
        source: SourceId,
        accuracy: AccuracyClass,
        captured_at: Tick,
    ) -> Self {
        Self {
            epoch_seconds,
            subsec_ticks: 0,
            source,
            accuracy,
            captured_at,
        }
    }

    /// PPS-anchored sample: the second boundary coincides with the edge tick.
    pub const fn anchored(epoch_seconds: u64, source: SourceId, edge_tick: Tick) -> Self {
        Self {
            epoch_seconds,
            subsec_ticks: 0,
            source,
            accuracy: AccuracyClass::GpsLocked,
            captured_at: edge_tick,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TimeSample {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "{}@{} ({}, tick {})",
            self.epoch_seconds,
            self.subsec_ticks,
            self.accuracy.name(),
            self.captured_at
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_total_order() {
        assert!(AccuracyClass::Coarse < AccuracyClass::Rtc);
        assert!(AccuracyClass::Rtc < AccuracyClass::GpsUnlocked);
        assert!(AccuracyClass::GpsUnlocked < AccuracyClass::GpsLocked);
    }

    #[test]
    fn confidence_from_accuracy() {
        assert_eq!(
            Confidence::from_accuracy(AccuracyClass::GpsLocked),
            Confidence::High
        );
        assert_eq!(Confidence::from_accuracy(AccuracyClass::Rtc), Confidence::Low);
        assert_eq!(
            Confidence::from_accuracy(AccuracyClass::GpsUnlocked),
            Confidence::Low
        );
    }

    #[test]
    fn sample_stays_small() {
        // Samples are passed by value through every arbitration cycle
        assert!(core::mem::size_of::<TimeSample>() <= 32);
    }

    #[test]
    fn mnemonics_are_display_width() {
        for source in [SourceId::Rtc, SourceId::Gps, SourceId::Ntp] {
            assert_eq!(source.mnemonic().len(), 4);
        }
    }
}
