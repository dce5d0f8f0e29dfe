//! GPS Provider: NMEA Sentences Paired with PPS Edges
//!
//! ## Overview
//!
//! The receiver delivers two signals on two paths:
//!
//! - **Sentences** over UART, fed here byte-by-byte via
//!   [`GpsProvider::feed`]. Only RMC carries both time and date, so only
//!   RMC is parsed; everything else is skipped without cost.
//! - **PPS edges** on a GPIO line, captured by the edge handler into the
//!   shared [`PpsLatch`](crate::pps::PpsLatch).
//!
//! The sentence names the second; the edge marks exactly when that second
//! began. A sentence whose edge arrived within the pairing window yields a
//! `GpsLocked` sample anchored at the edge tick. A sentence without a
//! usable edge still yields `GpsUnlocked`: the second is right, the phase
//! within it is not trusted.
//!
//! ## Sentence Handling
//!
//! Bytes accumulate between `$` and the line terminator into a fixed
//! buffer; an overlong sentence is dropped whole. The XOR checksum is
//! verified before any field is believed. A sentence with status `V`
//! (void, no fix) updates the fix-quality side channel and produces no
//! sample - receiver present, solution absent is not a failure.

use heapless::Vec;

use crate::bus::SegmentBus;
use crate::pps::PpsLatch;
use crate::sample::{AccuracyClass, FixQuality, SourceId, TimeSample};
use crate::source::SourceHandle;
use crate::time::{CivilTime, Tick};

/// Longest NMEA sentence accepted, including `$` and checksum.
const MAX_SENTENCE: usize = 96;

/// A parsed RMC sentence held until the next poll.
#[derive(Debug, Clone, Copy)]
struct PendingFix {
    epoch_seconds: u64,
}

/// Two ASCII digits to a number.
fn two_digits(bytes: &[u8]) -> Option<u8> {
    match bytes {
        [a @ b'0'..=b'9', b @ b'0'..=b'9'] => Some((a - b'0') * 10 + (b - b'0')),
        _ => None,
    }
}

/// One ASCII hex digit.
fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Verify the `*hh` XOR checksum and return the payload between `$` and `*`.
fn checksummed_body(sentence: &[u8]) -> Option<&[u8]> {
    let rest = sentence.strip_prefix(b"$")?;
    let star = rest.iter().position(|&b| b == b'*')?;
    let body = &rest[..star];
    let digits = rest.get(star + 1..star + 3)?;

    let declared = hex_digit(digits[0])? << 4 | hex_digit(digits[1])?;
    let computed = body.iter().fold(0u8, |acc, &b| acc ^ b);
    (declared == computed).then_some(body)
}

/// Parse an RMC body into calendar time plus validity.
///
/// Returns `None` for non-RMC sentences and malformed RMC fields alike;
/// the caller distinguishes the two by checking the talker first.
fn parse_rmc(body: &[u8]) -> Option<(CivilTime, bool)> {
    let mut fields = body.split(|&b| b == b',');

    // Talker prefix varies (GP, GN, ...); the type must be RMC
    if !fields.next()?.ends_with(b"RMC") {
        return None;
    }

    let utc = fields.next()?;
    let status = fields.next()?;
    let valid = status == b"A";

    // lat, ns, lon, ew, speed, course
    for _ in 0..6 {
        fields.next()?;
    }
    let date = fields.next()?;

    if utc.len() < 6 || date.len() != 6 {
        return None;
    }

    let civil = CivilTime {
        hour: two_digits(&utc[0..2])?,
        minute: two_digits(&utc[2..4])?,
        second: two_digits(&utc[4..6])?,
        day: two_digits(&date[0..2])?,
        month: two_digits(&date[2..4])?,
        year: 2000 + u16::from(two_digits(&date[4..6])?),
    };
    Some((civil, valid))
}

/// Time provider over a GPS receiver's UART stream and PPS line.
pub struct GpsProvider<'a> {
    pps: &'a PpsLatch,
    line: Vec<u8, MAX_SENTENCE>,
    collecting: bool,
    pending: Option<PendingFix>,
    fix_quality: FixQuality,
    pps_window: Tick,
    handle: SourceHandle,
}

impl<'a> GpsProvider<'a> {
    /// Provider pairing sentences with edges from `pps`. Edges older than
    /// `pps_window` ticks at poll time do not count as a lock.
    pub fn new(pps: &'a PpsLatch, pps_window: Tick, failure_budget: u8) -> Self {
        Self {
            pps,
            line: Vec::new(),
            collecting: false,
            pending: None,
            fix_quality: FixQuality::NoFix,
            pps_window,
            handle: SourceHandle::new(SourceId::Gps, failure_budget),
        }
    }

    /// Feed raw UART bytes. Call from wherever receive data arrives;
    /// bounded work per byte, no bus access.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            match byte {
                b'$' => {
                    self.line.clear();
                    self.collecting = self.line.push(byte).is_ok();
                }
                b'\r' | b'\n' => {
                    if self.collecting {
                        self.collecting = false;
                        let line = core::mem::take(&mut self.line);
                        self.handle_sentence(&line);
                    }
                }
                _ if self.collecting => {
                    if self.line.push(byte).is_err() {
                        // Overlong: drop the whole sentence
                        self.collecting = false;
                        self.line.clear();
                    }
                }
                _ => {}
            }
        }
    }

    fn handle_sentence(&mut self, sentence: &[u8]) {
        // Non-RMC traffic is skipped before checksum work
        let is_rmc = sentence
            .split(|&b| b == b',')
            .next()
            .is_some_and(|talker| talker.ends_with(b"RMC"));
        if !is_rmc {
            return;
        }

        let parsed = checksummed_body(sentence).and_then(parse_rmc);
        let (civil, valid) = match parsed {
            Some(fix) => fix,
            None => {
                self.handle.record_failure();
                return;
            }
        };

        if !valid {
            self.fix_quality = FixQuality::NoFix;
            self.pending = None;
            return;
        }
        self.fix_quality = FixQuality::Fix3d;

        match civil.to_epoch() {
            Some(epoch_seconds) => self.pending = Some(PendingFix { epoch_seconds }),
            None => {
                self.handle.record_failure();
            }
        }
    }

    /// Last reported fix quality. Side channel for the status display.
    pub fn fix_quality(&self) -> FixQuality {
        self.fix_quality
    }
}

impl super::TimeProvider for GpsProvider<'_> {
    fn poll(&mut self, now: Tick, _bus: &mut dyn SegmentBus) -> Option<TimeSample> {
        if !self.handle.is_enabled() {
            return None;
        }
        let fix = self.pending.take()?;

        // The edge marks the start of the second the sentence names. An
        // edge outside the window is consumed anyway; stale phase must not
        // anchor a later sentence.
        let sample = match self.pps.take() {
            Some(edge) if now.saturating_sub(edge) <= self.pps_window => {
                TimeSample::anchored(fix.epoch_seconds, SourceId::Gps, edge)
            }
            _ => TimeSample::whole_second(
                fix.epoch_seconds,
                SourceId::Gps,
                AccuracyClass::GpsUnlocked,
                now,
            ),
        };

        self.handle.record_success(sample);
        Some(sample)
    }

    fn source_id(&self) -> SourceId {
        SourceId::Gps
    }

    fn handle(&self) -> &SourceHandle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TimeProvider;

    struct NullBus;
    impl SegmentBus for NullBus {
        fn write(&mut self, _: u8, _: &[u8]) -> nb::Result<(), crate::errors::BusError> {
            Ok(())
        }
        fn read(&mut self, _: u8, _: &mut [u8]) -> nb::Result<(), crate::errors::BusError> {
            Ok(())
        }
    }

    /// Wrap an NMEA body with `$`, checksum, and terminator.
    fn sentence(body: &str) -> std::string::String {
        let sum = body.bytes().fold(0u8, |acc, b| acc ^ b);
        format!("${}*{:02X}\r\n", body, sum)
    }

    // 2026-08-29 12:34:56 UTC, valid fix
    fn valid_rmc() -> std::string::String {
        sentence("GPRMC,123456.00,A,5109.0262,N,11401.8407,W,0.004,,290826,,,A")
    }

    fn expected_epoch() -> u64 {
        CivilTime {
            year: 2026,
            month: 8,
            day: 29,
            hour: 12,
            minute: 34,
            second: 56,
        }
        .to_epoch()
        .unwrap()
    }

    #[test]
    fn locked_sample_anchors_at_edge() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        pps.record(10_000_000);
        gps.feed(valid_rmc().as_bytes());

        let sample = gps.poll(10_200_000, &mut NullBus).unwrap();
        assert_eq!(sample.accuracy, AccuracyClass::GpsLocked);
        assert_eq!(sample.captured_at, 10_000_000);
        assert_eq!(sample.epoch_seconds, expected_epoch());
        assert_eq!(gps.fix_quality(), FixQuality::Fix3d);
    }

    #[test]
    fn sentence_without_edge_is_unlocked() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        gps.feed(valid_rmc().as_bytes());

        let sample = gps.poll(10_200_000, &mut NullBus).unwrap();
        assert_eq!(sample.accuracy, AccuracyClass::GpsUnlocked);
        assert_eq!(sample.captured_at, 10_200_000);
    }

    #[test]
    fn stale_edge_does_not_lock() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        // Edge from long before the sentence arrived
        pps.record(1_000_000);
        gps.feed(valid_rmc().as_bytes());

        let sample = gps.poll(10_000_000, &mut NullBus).unwrap();
        assert_eq!(sample.accuracy, AccuracyClass::GpsUnlocked);
        // The stale edge was consumed, not left to anchor a later sample
        assert!(!pps.is_fresh());
    }

    #[test]
    fn void_status_yields_no_sample() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        gps.feed(sentence("GPRMC,123456.00,V,,,,,,,290826,,,N").as_bytes());

        assert!(gps.poll(100, &mut NullBus).is_none());
        assert_eq!(gps.fix_quality(), FixQuality::NoFix);
        // No fix is not a provider failure
        assert_eq!(gps.handle().consecutive_failures(), 0);
    }

    #[test]
    fn corrupt_checksum_counts_as_failure() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        let mut bad = valid_rmc();
        // Flip a payload byte after the checksum was computed
        bad.replace_range(10..11, "9");
        gps.feed(bad.as_bytes());

        assert!(gps.poll(100, &mut NullBus).is_none());
        assert_eq!(gps.handle().consecutive_failures(), 1);
    }

    #[test]
    fn non_rmc_sentences_are_ignored() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        gps.feed(sentence("GPGGA,123456.00,5109.0262,N,11401.8407,W,1,08,0.9,1048.4,M,-16.3,M,,").as_bytes());

        assert!(gps.poll(100, &mut NullBus).is_none());
        assert_eq!(gps.handle().consecutive_failures(), 0);
    }

    #[test]
    fn sentence_split_across_feeds() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        let full = valid_rmc();
        let (head, tail) = full.as_bytes().split_at(20);
        gps.feed(head);
        gps.feed(tail);

        assert!(gps.poll(100, &mut NullBus).is_some());
    }

    #[test]
    fn newest_sentence_wins() {
        let pps = PpsLatch::new();
        let mut gps = GpsProvider::new(&pps, 1_500_000, 5);

        gps.feed(sentence("GPRMC,123455.00,A,,,,,,,290826,,,A").as_bytes());
        gps.feed(valid_rmc().as_bytes());

        let sample = gps.poll(100, &mut NullBus).unwrap();
        assert_eq!(sample.epoch_seconds, expected_epoch());
        // One pending fix yields at most one sample
        assert!(gps.poll(200, &mut NullBus).is_none());
    }
}
