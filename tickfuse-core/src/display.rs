//! Display Presenter: Rendering the Estimate onto 7-Segment Buffers
//!
//! ## Overview
//!
//! The presenter is a pure function from `(frame input, role)` to a
//! [`SegmentBuffer`] - the 16-byte RAM image an HT16K33-class controller
//! accepts. No hidden state, no bus access: the runtime decides *when* to
//! push buffers, the presenter only decides *what* they contain. That split
//! keeps every rendering rule unit-testable without hardware.
//!
//! ## Buffer Layout
//!
//! The controller maps four digits and a colon into 16 bytes of RAM:
//!
//! ```text
//! offset:  0    2    4    6    8 .. 15
//!         [d0] [d1] [::] [d2] [d3]  unused
//! ```
//!
//! Digits occupy even offsets 0, 2, 6, 8; offset 4 bit 1 is the colon.
//! Bit 7 of a digit byte lights its decimal point.
//!
//! ## Role Rules
//!
//! | Role      | Content  | Decoration                          |
//! |-----------|----------|-------------------------------------|
//! | HourMin   | `HHMM`   | colon on even seconds, off on odd   |
//! | Seconds   | `SS00`   | dot after the seconds pair          |
//! | DayMonth  | `DDMM`   | dots after day and month            |
//! | Year      | `YYYY`   | none                                |
//! | Status    | mnemonic | dot on final digit while unlocked   |
//!
//! When confidence is `None` every role renders the distinct unknown
//! pattern (all dashes) - stale digits must never masquerade as time.

use crate::sample::{AccuracyClass, Confidence, SourceId};
use crate::time::CivilTime;

/// Function assigned to one physical display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DisplayRole {
    /// Hours and minutes with blinking colon
    HourMin = 0,
    /// Seconds pair
    Seconds = 1,
    /// Day and month
    DayMonth = 2,
    /// Four-digit year
    Year = 3,
    /// Active source / confidence mnemonic
    Status = 4,
}

impl DisplayRole {
    /// All roles, in configuration order.
    pub const ALL: [DisplayRole; 5] = [
        DisplayRole::HourMin,
        DisplayRole::Seconds,
        DisplayRole::DayMonth,
        DisplayRole::Year,
        DisplayRole::Status,
    ];

    /// Human-readable name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            DisplayRole::HourMin => "hour_minute",
            DisplayRole::Seconds => "seconds",
            DisplayRole::DayMonth => "day_month",
            DisplayRole::Year => "year",
            DisplayRole::Status => "status",
        }
    }
}

/// 7-segment encodings for digits 0-9.
const DIGITS: [u8; 10] = [
    0x3f, 0x06, 0x5b, 0x4f, 0x66, 0x6d, 0x7d, 0x07, 0x7f, 0x6f,
];

/// Segment pattern for a dash, the unknown-state fill.
const DASH: u8 = 0x40;

/// Decimal-point bit, OR-ed onto a digit pattern.
const DOT: u8 = 0x80;

/// Segment encoding for the subset of letters the status mnemonics use.
const fn letter(c: u8) -> u8 {
    match c {
        b'C' => 0x39,
        b'E' => 0x79,
        b'G' => 0x3d,
        b'N' => 0x54, // lowercase n
        b'O' => 0x5c, // lowercase o
        b'P' => 0x73,
        b'R' => 0x50, // lowercase r
        b'S' => 0x6d,
        b'T' => 0x78, // lowercase t
        b' ' => 0x00,
        _ => DASH,
    }
}

/// 16-byte display RAM image for one HT16K33-class controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBuffer([u8; 16]);

impl SegmentBuffer {
    /// RAM offsets of the four digit positions.
    const DIGIT_OFFSETS: [usize; 4] = [0, 2, 6, 8];

    /// Colon RAM offset and bit.
    const COLON_OFFSET: usize = 4;
    const COLON_BIT: u8 = 0x02;

    /// Blank buffer (all segments off).
    pub const fn blank() -> Self {
        Self([0u8; 16])
    }

    /// Set the raw segment pattern of digit position 0-3.
    pub fn set_segments(&mut self, position: usize, segments: u8) {
        if position < 4 {
            self.0[Self::DIGIT_OFFSETS[position]] = segments;
        }
    }

    /// Set digit position 0-3 to a decimal digit, optionally dotted.
    pub fn set_digit(&mut self, position: usize, digit: u8, dot: bool) {
        let pattern = DIGITS[(digit % 10) as usize];
        self.set_segments(position, if dot { pattern | DOT } else { pattern });
    }

    /// Switch the colon segment.
    pub fn set_colon(&mut self, on: bool) {
        self.0[Self::COLON_OFFSET] = if on { Self::COLON_BIT } else { 0 };
    }

    /// Raw RAM image for a bus write.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Two-digit value at positions `pos` and `pos + 1`.
    fn set_pair(&mut self, pos: usize, value: u8, dot_on_second: bool) {
        self.set_digit(pos, value / 10, false);
        self.set_digit(pos + 1, value % 10, dot_on_second);
    }
}

impl Default for SegmentBuffer {
    fn default() -> Self {
        Self::blank()
    }
}

/// Everything a render needs, captured at one instant.
///
/// Built by the runtime from the arbiter's estimate view; `None` civil
/// time or `Confidence::None` produce the unknown pattern.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    /// Calendar view of the current estimate, if one exists
    pub civil: Option<CivilTime>,
    /// Engine trust in the estimate
    pub confidence: Confidence,
    /// Source behind the estimate, if any
    pub source: Option<SourceId>,
    /// Accuracy class of the estimate's winning sample
    pub accuracy: Option<AccuracyClass>,
}

impl FrameInput {
    /// The explicit "time unknown" frame.
    pub const fn unknown() -> Self {
        Self {
            civil: None,
            confidence: Confidence::None,
            source: None,
            accuracy: None,
        }
    }
}

/// Distinct all-dashes pattern for the unknown state.
fn unknown_pattern() -> SegmentBuffer {
    let mut buf = SegmentBuffer::blank();
    for pos in 0..4 {
        buf.set_segments(pos, DASH);
    }
    buf
}

/// Render one role from a frame input. Pure; no hidden state.
pub fn render(input: &FrameInput, role: DisplayRole) -> SegmentBuffer {
    let civil = match (input.confidence, input.civil) {
        (Confidence::None, _) | (_, None) => return unknown_pattern(),
        (_, Some(civil)) => civil,
    };

    let mut buf = SegmentBuffer::blank();
    match role {
        DisplayRole::HourMin => {
            buf.set_pair(0, civil.hour, false);
            buf.set_pair(2, civil.minute, false);
            // Colon parity follows the original clock: even seconds show it
            buf.set_colon(civil.second % 2 == 0);
        }
        DisplayRole::Seconds => {
            buf.set_pair(0, civil.second, true);
            buf.set_digit(2, 0, false);
            buf.set_digit(3, 0, false);
        }
        DisplayRole::DayMonth => {
            buf.set_pair(0, civil.day, true);
            buf.set_pair(2, civil.month, true);
        }
        DisplayRole::Year => {
            let year = civil.year.min(9999);
            buf.set_pair(0, (year / 100) as u8, false);
            buf.set_pair(2, (year % 100) as u8, false);
        }
        DisplayRole::Status => {
            let mnemonic = input.source.map_or("NONE", |source| source.mnemonic());
            for (pos, c) in mnemonic.bytes().take(4).enumerate() {
                buf.set_segments(pos, letter(c));
            }
            // Unlocked GPS is distinguished from locked by a trailing dot
            if input.accuracy == Some(AccuracyClass::GpsUnlocked) {
                buf.set_segments(3, letter(b' ') | DOT);
            }
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(civil: CivilTime, confidence: Confidence) -> FrameInput {
        FrameInput {
            civil: Some(civil),
            confidence,
            source: Some(SourceId::Gps),
            accuracy: Some(AccuracyClass::GpsLocked),
        }
    }

    fn noon() -> CivilTime {
        CivilTime {
            year: 2026,
            month: 8,
            day: 29,
            hour: 12,
            minute: 34,
            second: 56,
        }
    }

    #[test]
    fn hour_min_digits() {
        let buf = render(&frame(noon(), Confidence::High), DisplayRole::HourMin);
        let bytes = buf.as_bytes();
        assert_eq!(bytes[0], DIGITS[1]);
        assert_eq!(bytes[2], DIGITS[2]);
        assert_eq!(bytes[6], DIGITS[3]);
        assert_eq!(bytes[8], DIGITS[4]);
    }

    #[test]
    fn colon_blinks_on_second_parity() {
        let mut civil = noon();
        civil.second = 10;
        let even = render(&frame(civil, Confidence::High), DisplayRole::HourMin);
        assert_eq!(even.as_bytes()[4], 0x02);

        civil.second = 11;
        let odd = render(&frame(civil, Confidence::High), DisplayRole::HourMin);
        assert_eq!(odd.as_bytes()[4], 0x00);
    }

    #[test]
    fn year_renders_four_digits() {
        let buf = render(&frame(noon(), Confidence::High), DisplayRole::Year);
        let bytes = buf.as_bytes();
        assert_eq!(bytes[0], DIGITS[2]);
        assert_eq!(bytes[2], DIGITS[0]);
        assert_eq!(bytes[6], DIGITS[2]);
        assert_eq!(bytes[8], DIGITS[6]);
    }

    #[test]
    fn unknown_state_is_all_dashes_everywhere() {
        for role in DisplayRole::ALL {
            let buf = render(&FrameInput::unknown(), role);
            let bytes = buf.as_bytes();
            for offset in [0usize, 2, 6, 8] {
                assert_eq!(bytes[offset], DASH, "role {:?}", role);
            }
        }
    }

    #[test]
    fn status_shows_source_mnemonic() {
        let mut input = frame(noon(), Confidence::High);
        input.source = Some(SourceId::Rtc);
        input.accuracy = Some(AccuracyClass::Rtc);

        let buf = render(&input, DisplayRole::Status);
        let bytes = buf.as_bytes();
        assert_eq!(bytes[0], letter(b'R'));
        assert_eq!(bytes[2], letter(b'T'));
        assert_eq!(bytes[6], letter(b'C'));
        assert_eq!(bytes[8], 0x00);
    }

    #[test]
    fn unlocked_gps_carries_trailing_dot() {
        let mut input = frame(noon(), Confidence::Low);
        input.accuracy = Some(AccuracyClass::GpsUnlocked);

        let buf = render(&input, DisplayRole::Status);
        assert_eq!(buf.as_bytes()[8] & DOT, DOT);
    }

    #[test]
    fn no_source_reads_none() {
        let mut input = frame(noon(), Confidence::Low);
        input.source = None;
        input.accuracy = None;

        let buf = render(&input, DisplayRole::Status);
        let bytes = buf.as_bytes();
        assert_eq!(bytes[0], letter(b'N'));
        assert_eq!(bytes[2], letter(b'O'));
        assert_eq!(bytes[6], letter(b'N'));
        assert_eq!(bytes[8], letter(b'E'));
        assert_ne!(letter(b'E'), DASH);
    }
}
