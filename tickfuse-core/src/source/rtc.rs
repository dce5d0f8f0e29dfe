//! DS3231 Battery-Backed RTC Provider
//!
//! ## Overview
//!
//! The DS3231 keeps whole-second BCD calendar time across power cycles.
//! Reading it is a two-step bus transaction: write the register pointer
//! (seconds register, 0x00), then read seven consecutive registers:
//!
//! ```text
//! reg:   0x00  0x01  0x02  0x03  0x04  0x05  0x06
//!        sec   min   hour  dow   day   month year
//! ```
//!
//! The day-of-week register is skipped on decode; the presenter derives it
//! from the date when needed. Years are stored as offsets from 2000.
//!
//! ## Polling Discipline
//!
//! The chip only resolves whole seconds, so polling faster than the
//! configured interval buys nothing. Each poll runs both transactions
//! under the bounded-step budget; any failure counts against the source's
//! failure budget and yields no sample, never an error to the caller.
//!
//! ## Write-Back
//!
//! When arbitration holds a GPS-locked estimate that disagrees with the
//! RTC, [`RtcProvider::set_time`] disciplines the chip so the next cold
//! boot starts from corrected time instead of drifted time.

use crate::bus::{read_bounded, write_bounded, SegmentBus};
use crate::errors::BusError;
use crate::log_info;
use crate::sample::{AccuracyClass, SourceId, TimeSample};
use crate::source::SourceHandle;
use crate::time::{CivilTime, Tick};

/// Register address of the seconds register; reads start here.
const REG_SECONDS: u8 = 0x00;

/// Width of the timekeeping register block.
const TIME_REGS: usize = 7;

/// Two-digit BCD to binary.
const fn bcd_decode(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0f)
}

/// Binary 0-99 to two-digit BCD.
const fn bcd_encode(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Whole-second time provider over a DS3231-class RTC chip.
pub struct RtcProvider {
    address: u8,
    poll_interval: Tick,
    step_limit: u16,
    next_poll: Tick,
    handle: SourceHandle,
}

impl RtcProvider {
    /// Provider over the chip at `address`, polling every `poll_interval`
    /// ticks with the given per-transaction step budget.
    pub const fn new(
        address: u8,
        poll_interval: Tick,
        step_limit: u16,
        failure_budget: u8,
    ) -> Self {
        Self {
            address,
            poll_interval,
            step_limit,
            next_poll: 0,
            handle: SourceHandle::new(SourceId::Rtc, failure_budget),
        }
    }

    /// Read the timekeeping registers and decode them.
    fn read_registers(&mut self, bus: &mut dyn SegmentBus) -> Result<CivilTime, BusError> {
        write_bounded(bus, self.address, &[REG_SECONDS], self.step_limit)?;

        let mut regs = [0u8; TIME_REGS];
        read_bounded(bus, self.address, &mut regs, self.step_limit)?;

        // Mask off control bits; register 3 is day-of-week, unused here
        Ok(CivilTime {
            second: bcd_decode(regs[0] & 0x7f),
            minute: bcd_decode(regs[1] & 0x7f),
            hour: bcd_decode(regs[2] & 0x3f),
            day: bcd_decode(regs[4] & 0x3f),
            month: bcd_decode(regs[5] & 0x1f),
            year: 2000 + u16::from(bcd_decode(regs[6])),
        })
    }

    /// Discipline the chip to the given calendar time.
    ///
    /// Writes all seven timekeeping registers in one transaction starting
    /// at the register pointer. Day-of-week is written as 1; nothing in
    /// the engine reads it back. A failed write counts against the
    /// source's failure budget like a failed poll.
    pub fn set_time(
        &mut self,
        bus: &mut dyn SegmentBus,
        civil: &CivilTime,
    ) -> Result<(), BusError> {
        let year = civil.year.saturating_sub(2000).min(99) as u8;
        let payload = [
            REG_SECONDS,
            bcd_encode(civil.second),
            bcd_encode(civil.minute),
            bcd_encode(civil.hour),
            bcd_encode(1),
            bcd_encode(civil.day),
            bcd_encode(civil.month),
            bcd_encode(year),
        ];
        if let Err(e) = write_bounded(bus, self.address, &payload, self.step_limit) {
            self.handle.record_failure();
            return Err(e);
        }
        log_info!(
            "rtc disciplined to {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            civil.year,
            civil.month,
            civil.day,
            civil.hour,
            civil.minute,
            civil.second
        );
        Ok(())
    }

    /// Whether the next call to `poll` will actually touch the bus.
    pub fn poll_due(&self, now: Tick) -> bool {
        self.handle.is_enabled() && now >= self.next_poll
    }
}

impl super::TimeProvider for RtcProvider {
    fn poll(&mut self, now: Tick, bus: &mut dyn SegmentBus) -> Option<TimeSample> {
        if !self.poll_due(now) {
            return None;
        }
        self.next_poll = now + self.poll_interval;

        let civil = match self.read_registers(bus) {
            Ok(civil) => civil,
            Err(_) => {
                self.handle.record_failure();
                return None;
            }
        };

        // A garbled read decodes to an impossible calendar date
        let epoch = match civil.to_epoch() {
            Some(epoch) => epoch,
            None => {
                self.handle.record_failure();
                return None;
            }
        };

        let sample = TimeSample::whole_second(epoch, SourceId::Rtc, AccuracyClass::Rtc, now);
        self.handle.record_success(sample);
        Some(sample)
    }

    fn source_id(&self) -> SourceId {
        SourceId::Rtc
    }

    fn handle(&self) -> &SourceHandle {
        &self.handle
    }
}
