//! Engine Runtime: Schedule, Providers, Arbiter, and Presenter Wired Up
//!
//! ## Overview
//!
//! [`ClockEngine`] owns everything except the hardware itself: the board
//! crate hands it a [`SegmentBus`], a [`MonotonicClock`], and a reference
//! to the static [`PpsLatch`](crate::pps::PpsLatch), then calls
//! [`ClockEngine::run_cycle`] forever. One cycle drains every due task in
//! priority order - sample, arbitrate, present - and returns; idle pacing
//! (wfi, sleep) is the caller's business.
//!
//! ## Per-Cycle Flow
//!
//! ```text
//! PollRtc ─┐
//! PollGps ─┴→ pending samples → Arbitrate → estimate → RefreshDisplays
//! ```
//!
//! ## Fault Isolation
//!
//! Each display carries its own consecutive-failure count; a wedged chip
//! burns its bounded step budget, gets counted, and the loop moves to the
//! next address in the same cycle. After the failure budget the display is
//! dropped until restart. Time sources degrade the same way through their
//! handles. Nothing in this module returns an error after construction:
//! every runtime fault is absorbed, counted, and logged.
//!
//! ## RTC Discipline
//!
//! Accepting a GPS-locked sample that disagrees with the RTC by more than
//! a second schedules a write-back, so the next cold boot starts from
//! corrected time. The write happens on the RTC task's next slot, on the
//! same bounded-transaction terms as any other bus work, and only while
//! the RTC handle is still enabled and the estimate is still high
//! confidence; a decayed lock is discarded rather than written.

use heapless::Vec;

use crate::arbiter::{ClockArbiter, EstimateView};
use crate::bus::{write_bounded, SegmentBus, SEGMENT_BUFFER_WIDTH};
use crate::config::{ClockConfig, DisplayBinding};
use crate::display::{render, SegmentBuffer};
use crate::errors::{ClockError, ConfigError};
use crate::pps::PpsLatch;
use crate::sample::{AccuracyClass, Confidence, SourceId, TimeSample};
use crate::scheduler::{Schedule, TaskId};
use crate::source::{GpsProvider, RtcProvider, SourceHandle, TimeProvider};
use crate::time::{MonotonicClock, Tick};
use crate::{log_info, log_warn};

/// Samples held between the poll tasks and arbitration within one cycle.
const PENDING_CAPACITY: usize = 4;

/// Display RAM write: register pointer 0x00 plus the 16-byte buffer.
const FRAME_PAYLOAD: usize = 1 + SEGMENT_BUFFER_WIDTH;

/// Per-display push state.
struct DisplayState {
    binding: DisplayBinding,
    last_frame: Option<SegmentBuffer>,
    failures: u8,
    enabled: bool,
}

impl DisplayState {
    const fn new(binding: DisplayBinding) -> Self {
        Self {
            binding,
            last_frame: None,
            failures: 0,
            enabled: true,
        }
    }
}

/// The assembled clock: providers, arbiter, schedule, and presenter.
pub struct ClockEngine<'a, B: SegmentBus, C: MonotonicClock> {
    config: ClockConfig,
    bus: B,
    clock: C,
    rtc: RtcProvider,
    gps: GpsProvider<'a>,
    arbiter: ClockArbiter,
    schedule: Schedule,
    pending: Vec<TimeSample, PENDING_CAPACITY>,
    displays: [DisplayState; 5],
    discipline_pending: bool,
    samples_dropped: u32,
}

impl<'a, B: SegmentBus, C: MonotonicClock> ClockEngine<'a, B, C> {
    /// Build the engine. Fails only on an inconsistent configuration;
    /// after this, faults degrade rather than error.
    pub fn new(
        config: ClockConfig,
        bus: B,
        clock: C,
        pps: &'a PpsLatch,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let rate = clock.tick_rate();
        if rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        let now = clock.now();

        let rtc_poll = seconds_to_ticks(config.rtc_poll_interval_s, rate);
        let refresh = millis_to_ticks(config.refresh_interval_ms, rate);
        let pps_window = millis_to_ticks(config.pps_window_ms, rate);
        let backward_tolerance = millis_to_ticks(config.backward_tolerance_ms, rate);

        let arbiter = ClockArbiter::new(
            rate,
            seconds_to_ticks(config.staleness_threshold_s, rate),
            seconds_to_ticks(config.staleness_ceiling_s, rate),
            backward_tolerance,
        );

        // Table order is priority order: sampling tasks in the configured
        // source order, then arbitrate, then present
        let mut schedule = Schedule::new();
        for source in config.source_priority {
            let (task, period) = match source {
                SourceId::Rtc => (TaskId::PollRtc, rtc_poll),
                SourceId::Gps => (TaskId::PollGps, refresh),
                // No NTP provider is fitted yet
                SourceId::Ntp => continue,
            };
            if schedule.slot(task).is_none() {
                let _ = schedule.insert(task, period, now);
            }
        }
        let _ = schedule.insert(TaskId::Arbitrate, refresh, now);
        let _ = schedule.insert(TaskId::RefreshDisplays, refresh, now);

        let displays = config.displays.map(DisplayState::new);

        Ok(Self {
            rtc: RtcProvider::new(
                config.rtc_address,
                rtc_poll,
                config.bus_step_limit,
                config.failure_budget,
            ),
            gps: GpsProvider::new(pps, pps_window, config.failure_budget),
            arbiter,
            schedule,
            pending: Vec::new(),
            displays,
            discipline_pending: false,
            samples_dropped: 0,
            config,
            bus,
            clock,
        })
    }

    /// Feed raw GPS UART bytes. Safe to call between cycles or from the
    /// receive path; bounded work per byte, no bus access.
    pub fn feed_gps(&mut self, bytes: &[u8]) {
        self.gps.feed(bytes);
    }

    /// Drain every due task once. Returns the number of tasks run.
    pub fn run_cycle(&mut self) -> u32 {
        let mut ran = 0;
        loop {
            let now = self.clock.now();
            let task = match self.schedule.due(now) {
                Some(task) => task,
                None => return ran,
            };

            match task {
                TaskId::PollRtc => self.task_poll_rtc(now),
                TaskId::PollGps => self.task_poll_gps(now),
                TaskId::Arbitrate => self.task_arbitrate(now),
                TaskId::RefreshDisplays => self.task_refresh(now),
            }

            self.schedule.completed(task, self.clock.now());
            ran += 1;
        }
    }

    fn task_poll_rtc(&mut self, now: Tick) {
        if self.discipline_pending {
            self.try_discipline(now);
        }
        if let Some(sample) = self.rtc.poll(now, &mut self.bus) {
            self.queue_sample(sample);
        }
    }

    fn task_poll_gps(&mut self, now: Tick) {
        if let Some(sample) = self.gps.poll(now, &mut self.bus) {
            self.queue_sample(sample);
        }
    }

    /// Stage a sample for the next arbitration pass. A full queue drops
    /// the sample; that loss is counted, never silent.
    fn queue_sample(&mut self, sample: TimeSample) {
        if self.pending.push(sample).is_err() {
            self.samples_dropped = self.samples_dropped.wrapping_add(1);
            log_warn!("pending queue full, {} sample dropped", sample.source.name());
        }
    }

    fn task_arbitrate(&mut self, now: Tick) {
        let accepted = self.arbiter.update(&self.pending, now);
        self.pending.clear();

        if let Some(sample) = accepted {
            if sample.accuracy == AccuracyClass::GpsLocked && self.rtc_diverged(&sample) {
                self.discipline_pending = true;
            }
        }
    }

    /// Whether the RTC's last reading disagrees with `sample` by more
    /// than a second, accounting for when each was captured.
    fn rtc_diverged(&self, sample: &TimeSample) -> bool {
        let rtc_last = match self.rtc.handle().last_sample() {
            Some(last) => last,
            None => return true,
        };

        let rate = u64::from(self.clock.tick_rate().max(1));
        let elapsed_s = sample.captured_at.saturating_sub(rtc_last.captured_at) / rate;
        let rtc_projected = rtc_last.epoch_seconds + elapsed_s;
        sample.epoch_seconds.abs_diff(rtc_projected) > 1
    }

    fn try_discipline(&mut self, now: Tick) {
        // A source past its failure budget stays untouched until restart
        if !self.rtc.handle().is_enabled() {
            self.discipline_pending = false;
            return;
        }

        // Only a still-trusted lock is worth burning into the chip; a
        // decayed estimate would fabricate plausible time for the next
        // cold boot
        let view = self.arbiter.view(now);
        if view.confidence != Confidence::High {
            self.discipline_pending = false;
            return;
        }

        let civil = match view.wall.and_then(|wall| wall.civil()) {
            Some(civil) => civil,
            None => {
                self.discipline_pending = false;
                return;
            }
        };

        match self.rtc.set_time(&mut self.bus, &civil) {
            Ok(()) => self.discipline_pending = false,
            // Counted on the handle inside set_time; retry next slot
            Err(_) => log_warn!("rtc discipline write failed, will retry"),
        }
    }

    fn task_refresh(&mut self, now: Tick) {
        let view = self.arbiter.view(now);
        // A pending backward correction keeps the previous frame up
        if view.hold_display {
            return;
        }

        let input = view.frame_input();
        for index in 0..self.displays.len() {
            if !self.displays[index].enabled {
                continue;
            }

            let frame = render(&input, self.displays[index].binding.role);
            if self.displays[index].last_frame == Some(frame) {
                continue;
            }

            let mut payload = [0u8; FRAME_PAYLOAD];
            payload[1..].copy_from_slice(frame.as_bytes());

            let address = self.displays[index].binding.address;
            match write_bounded(&mut self.bus, address, &payload, self.config.bus_step_limit) {
                Ok(()) => {
                    self.displays[index].last_frame = Some(frame);
                    self.displays[index].failures = 0;
                }
                Err(_) => self.display_failed(index),
            }
        }
    }

    fn display_failed(&mut self, index: usize) {
        let state = &mut self.displays[index];
        state.failures = state.failures.saturating_add(1);
        if state.failures >= self.config.failure_budget {
            state.enabled = false;
            log_warn!(
                "display {} at 0x{:02x} disabled after {} failures",
                state.binding.role.name(),
                state.binding.address,
                state.failures
            );
        }
    }

    /// Force a full repaint on the next refresh slot.
    pub fn force_refresh(&mut self) {
        for state in &mut self.displays {
            state.last_frame = None;
        }
        self.schedule.force(TaskId::RefreshDisplays, self.clock.now());
        log_info!("full display repaint forced");
    }

    /// Current estimate view at this instant.
    pub fn view(&self) -> EstimateView {
        self.arbiter.view(self.clock.now())
    }

    /// Current wall time, or why there is none.
    pub fn wall_time(&self) -> Result<crate::time::WallTime, ClockError> {
        let view = self.view();
        match (view.confidence, view.wall) {
            (crate::sample::Confidence::None, _) | (_, None) => Err(ClockError::TimeUnknown),
            (_, Some(wall)) => Ok(wall),
        }
    }

    /// Whether a source is still in service.
    pub fn provider_status(&self, source: SourceId) -> Result<(), ClockError> {
        let enabled = match source {
            SourceId::Rtc => self.rtc.handle().is_enabled(),
            SourceId::Gps => self.gps.handle().is_enabled(),
            // No NTP provider is fitted yet
            SourceId::Ntp => false,
        };
        if enabled {
            Ok(())
        } else {
            Err(ClockError::ProviderUnavailable(source))
        }
    }

    /// The arbitration state, for diagnostics.
    pub fn arbiter(&self) -> &ClockArbiter {
        &self.arbiter
    }

    /// The schedule, for diagnostics.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// RTC source state.
    pub fn rtc_handle(&self) -> &SourceHandle {
        self.rtc.handle()
    }

    /// GPS source state.
    pub fn gps_handle(&self) -> &SourceHandle {
        self.gps.handle()
    }

    /// Samples lost to a full pending queue since startup.
    pub fn samples_dropped(&self) -> u32 {
        self.samples_dropped
    }

    /// Last fix quality the receiver reported.
    pub fn gps_fix_quality(&self) -> crate::sample::FixQuality {
        self.gps.fix_quality()
    }

    /// Whether the display with this role is still being driven.
    pub fn display_enabled(&self, role: crate::display::DisplayRole) -> bool {
        self.displays
            .iter()
            .any(|state| state.binding.role == role && state.enabled)
    }

    /// Engine configuration.
    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Mutable access to the bus, for host simulation and tests.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Mutable access to the clock, for host simulation and tests.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

fn seconds_to_ticks(seconds: u32, rate: u32) -> Tick {
    u64::from(seconds) * u64::from(rate)
}

fn millis_to_ticks(millis: u32, rate: u32) -> Tick {
    u64::from(millis) * u64::from(rate) / 1_000
}
