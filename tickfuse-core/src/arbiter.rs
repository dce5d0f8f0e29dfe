//! Time Source Arbitration
//!
//! ## Overview
//!
//! The arbiter owns the single authoritative estimate of wall-clock time.
//! Each cycle it ingests whatever samples the providers produced, picks a
//! winner, and re-anchors the estimate; between updates the estimate is
//! extrapolated from its anchor tick with the monotonic counter, which is
//! what keeps the displays ticking once per second even when no source has
//! reported for a while.
//!
//! ## Acceptance Policy
//!
//! Higher accuracy always wins. Within a class, newer wins. A sample of
//! *lower* class than the held estimate is rejected while the estimate is
//! fresh and accepted once the estimate's age crosses the staleness
//! threshold - a stale GPS lock is worth less than a live RTC. Past the
//! staleness ceiling the estimate itself stops being trusted: confidence
//! collapses to `None` and the presenter shows the unknown pattern rather
//! than silently drifting digits.
//!
//! ## Backward Corrections
//!
//! When an accepted sample moves wall time backwards beyond the configured
//! tolerance (a drifted RTC being overruled by GPS, typically), the jump is
//! taken immediately in the internal timeline but the *visible* change is
//! deferred to the next whole-second boundary of the corrected timeline, so
//! the displays never show a second that jitters back mid-tick. The event
//! is counted and logged; it is expected at startup and rare afterwards.

use crate::display::FrameInput;
use crate::log_warn;
use crate::sample::{AccuracyClass, Confidence, SourceId, TimeSample};
use crate::time::{Tick, WallTime};

/// The held estimate: a wall time true at a monotonic anchor tick.
#[derive(Debug, Clone, Copy)]
pub struct Estimate {
    /// Wall time at the anchor
    pub wall: WallTime,
    /// Monotonic tick at which `wall` was true
    pub anchor: Tick,
    /// Class of the sample that set this estimate
    pub accuracy: AccuracyClass,
    /// Source of that sample
    pub source: SourceId,
}

/// Read-only view of the estimate, extrapolated to a given tick.
///
/// This is what the presenter consumes; `hold_display` tells the runtime a
/// backward correction is pending and the frame should not be pushed yet.
#[derive(Debug, Clone, Copy)]
pub struct EstimateView {
    /// Extrapolated wall time, if an estimate is held
    pub wall: Option<WallTime>,
    /// Trust in that wall time, aged
    pub confidence: Confidence,
    /// Source behind the estimate
    pub source: Option<SourceId>,
    /// Accuracy class of the estimate
    pub accuracy: Option<AccuracyClass>,
    /// A backward correction has not yet reached its visibility boundary
    pub hold_display: bool,
}

impl EstimateView {
    /// The no-estimate view.
    pub const fn unknown() -> Self {
        Self {
            wall: None,
            confidence: Confidence::None,
            source: None,
            accuracy: None,
            hold_display: false,
        }
    }

    /// Presenter input for this view.
    pub fn frame_input(&self) -> FrameInput {
        match (self.confidence, self.wall) {
            (Confidence::None, _) | (_, None) => FrameInput::unknown(),
            (confidence, Some(wall)) => FrameInput {
                civil: wall.civil(),
                confidence,
                source: self.source,
                accuracy: self.accuracy,
            },
        }
    }
}

/// Fuses provider samples into one extrapolatable estimate.
pub struct ClockArbiter {
    estimate: Option<Estimate>,
    tick_rate: u32,
    staleness_threshold: Tick,
    staleness_ceiling: Tick,
    backward_tolerance: Tick,
    /// Visible-change deferral boundary for a pending backward correction
    correction_boundary: Option<Tick>,
    corrections: u32,
}

impl ClockArbiter {
    /// Arbiter with all intervals pre-converted to ticks.
    pub const fn new(
        tick_rate: u32,
        staleness_threshold: Tick,
        staleness_ceiling: Tick,
        backward_tolerance: Tick,
    ) -> Self {
        Self {
            estimate: None,
            tick_rate,
            staleness_threshold,
            staleness_ceiling,
            backward_tolerance,
            correction_boundary: None,
            corrections: 0,
        }
    }

    /// Currently held estimate, unextrapolated.
    pub const fn estimate(&self) -> Option<&Estimate> {
        self.estimate.as_ref()
    }

    /// Backward corrections applied since boot.
    pub const fn corrections(&self) -> u32 {
        self.corrections
    }

    /// Age of the held estimate at `now`, in ticks.
    fn age(&self, now: Tick) -> Option<Tick> {
        self.estimate.map(|e| now.saturating_sub(e.anchor))
    }

    /// Ingest this cycle's samples. Returns the accepted winner, if any.
    ///
    /// Samples may arrive in any order; the best acceptable one wins and
    /// the rest are dropped. Rejection is silent - a fresh high-class
    /// estimate rejecting RTC samples every few seconds is the normal
    /// steady state, not an event.
    pub fn update(&mut self, samples: &[TimeSample], now: Tick) -> Option<TimeSample> {
        let winner = samples
            .iter()
            .filter(|s| self.acceptable(s, now))
            .max_by_key(|s| (s.accuracy, s.captured_at))
            .copied()?;

        self.accept(winner, now);
        Some(winner)
    }

    fn acceptable(&self, sample: &TimeSample, now: Tick) -> bool {
        match self.estimate {
            None => true,
            Some(held) => {
                sample.accuracy >= held.accuracy
                    || now.saturating_sub(held.anchor) > self.staleness_threshold
            }
        }
    }

    fn accept(&mut self, sample: TimeSample, _now: Tick) {
        let new_wall = WallTime {
            epoch_seconds: sample.epoch_seconds,
            subsec_ticks: sample.subsec_ticks,
        };

        if let Some(held) = self.estimate {
            // Where the old timeline says we are at the new anchor
            let extrapolated = held
                .wall
                .advanced_by(sample.captured_at.saturating_sub(held.anchor), self.tick_rate);

            let old_ticks = Self::total_ticks(&extrapolated, self.tick_rate);
            let new_ticks = Self::total_ticks(&new_wall, self.tick_rate);

            if old_ticks.saturating_sub(new_ticks) > u128::from(self.backward_tolerance) {
                // Visible change waits for the corrected timeline's next
                // whole-second boundary
                self.correction_boundary =
                    Some(sample.captured_at + new_wall.ticks_to_boundary(self.tick_rate));
                self.corrections = self.corrections.wrapping_add(1);
                log_warn!(
                    "backward correction: {} -> {} ({})",
                    extrapolated.epoch_seconds,
                    new_wall.epoch_seconds,
                    sample.source.name()
                );
            }
        }

        self.estimate = Some(Estimate {
            wall: new_wall,
            anchor: sample.captured_at,
            accuracy: sample.accuracy,
            source: sample.source,
        });
    }

    /// Wall time as a flat tick count for jump comparisons.
    fn total_ticks(wall: &WallTime, tick_rate: u32) -> u128 {
        u128::from(wall.epoch_seconds) * u128::from(tick_rate.max(1))
            + u128::from(wall.subsec_ticks)
    }

    /// Extrapolated view of the estimate at `now`.
    pub fn view(&self, now: Tick) -> EstimateView {
        let held = match self.estimate {
            Some(held) => held,
            None => return EstimateView::unknown(),
        };

        let age = now.saturating_sub(held.anchor);
        if age > self.staleness_ceiling {
            // Too old to trust; the presenter shows the unknown pattern
            return EstimateView {
                wall: Some(held.wall.advanced_by(age, self.tick_rate)),
                confidence: Confidence::None,
                source: Some(held.source),
                accuracy: Some(held.accuracy),
                hold_display: false,
            };
        }

        // High confidence decays to Low once the anchor goes stale
        let mut confidence = Confidence::from_accuracy(held.accuracy);
        if confidence == Confidence::High && age > self.staleness_threshold {
            confidence = Confidence::Low;
        }

        EstimateView {
            wall: Some(held.wall.advanced_by(age, self.tick_rate)),
            confidence,
            source: Some(held.source),
            accuracy: Some(held.accuracy),
            hold_display: self.correction_boundary.is_some_and(|boundary| now < boundary),
        }
    }

    /// Whether the estimate is still inside the trust window at `now`.
    pub fn is_fresh(&self, now: Tick) -> bool {
        self.age(now).is_some_and(|age| age <= self.staleness_ceiling)
    }
}
