//! Startup Configuration
//!
//! Loaded once before the engine starts and immutable afterwards. The
//! defaults reproduce the reference hardware: five HT16K33 displays at
//! 0x70-0x74, a DS3231 RTC at 0x68, I2C on pins 0/1. A configuration that
//! fails [`ClockConfig::validate`] is fatal at startup - nothing runs on
//! an inconsistent address map.
//!
//! All intervals are stored in engine-neutral units (seconds or
//! milliseconds) and converted to ticks against the monotonic clock's
//! rate when the engine is built.

use crate::display::DisplayRole;
use crate::errors::ConfigError;
use crate::sample::SourceId;

/// Default I2C address of the hour:minute display.
pub const DEFAULT_HOUR_MIN_ADDRESS: u8 = 0x70;
/// Default I2C address of the status display.
pub const DEFAULT_STATUS_ADDRESS: u8 = 0x71;
/// Default I2C address of the seconds display.
pub const DEFAULT_SECONDS_ADDRESS: u8 = 0x72;
/// Default I2C address of the day:month display.
pub const DEFAULT_DAY_MONTH_ADDRESS: u8 = 0x73;
/// Default I2C address of the year display.
pub const DEFAULT_YEAR_ADDRESS: u8 = 0x74;

/// Default I2C address of the DS3231 RTC.
pub const DEFAULT_RTC_ADDRESS: u8 = 0x68;

/// One physical display: bus address plus assigned role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayBinding {
    /// I2C address of the display controller
    pub address: u8,
    /// Function rendered on this display
    pub role: DisplayRole,
}

/// Immutable engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockConfig {
    /// I2C data pin (carried opaquely for the board crate)
    pub sda_pin: u8,
    /// I2C clock pin (carried opaquely for the board crate)
    pub scl_pin: u8,
    /// PPS input pin (carried opaquely for the board crate)
    pub pps_pin: u8,

    /// The five displays and their roles
    pub displays: [DisplayBinding; 5],
    /// RTC chip address
    pub rtc_address: u8,

    /// Source preference order, best first; arbitration still ranks by
    /// accuracy class, this only orders polling
    pub source_priority: [SourceId; 3],

    /// RTC poll period in seconds ("every few seconds")
    pub rtc_poll_interval_s: u32,
    /// Display refresh period in milliseconds
    pub refresh_interval_ms: u32,

    /// Age beyond which a lower-accuracy sample may override (seconds)
    pub staleness_threshold_s: u32,
    /// Age beyond which confidence collapses to None (seconds)
    pub staleness_ceiling_s: u32,

    /// Consecutive failures before a source is disabled until restart
    pub failure_budget: u8,

    /// Window after a PPS edge within which GPS counts as locked (ms)
    pub pps_window_ms: u32,

    /// Backward steps larger than this are flagged corrections (ms)
    pub backward_tolerance_ms: u32,

    /// Per-transaction bus step budget (polls before Timeout)
    pub bus_step_limit: u16,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sda_pin: 0,
            scl_pin: 1,
            pps_pin: 2,
            displays: [
                DisplayBinding { address: DEFAULT_HOUR_MIN_ADDRESS, role: DisplayRole::HourMin },
                DisplayBinding { address: DEFAULT_STATUS_ADDRESS, role: DisplayRole::Status },
                DisplayBinding { address: DEFAULT_SECONDS_ADDRESS, role: DisplayRole::Seconds },
                DisplayBinding { address: DEFAULT_DAY_MONTH_ADDRESS, role: DisplayRole::DayMonth },
                DisplayBinding { address: DEFAULT_YEAR_ADDRESS, role: DisplayRole::Year },
            ],
            rtc_address: DEFAULT_RTC_ADDRESS,
            source_priority: [SourceId::Gps, SourceId::Ntp, SourceId::Rtc],
            rtc_poll_interval_s: 4,
            refresh_interval_ms: 250,
            staleness_threshold_s: 30,
            staleness_ceiling_s: 120,
            failure_budget: 5,
            pps_window_ms: 1500,
            backward_tolerance_ms: 100,
            bus_step_limit: 32,
        }
    }
}

impl ClockConfig {
    /// Check internal consistency. Any error here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Duplicate bus addresses would make two devices shadow each other
        let mut addresses = [0u8; 6];
        for (slot, binding) in self.displays.iter().enumerate() {
            addresses[slot] = binding.address;
        }
        addresses[5] = self.rtc_address;

        for i in 0..addresses.len() {
            for j in (i + 1)..addresses.len() {
                if addresses[i] == addresses[j] {
                    return Err(ConfigError::DuplicateAddress { address: addresses[i] });
                }
            }
        }

        if self.staleness_ceiling_s < self.staleness_threshold_s {
            return Err(ConfigError::InvertedStaleness {
                threshold_s: self.staleness_threshold_s,
                ceiling_s: self.staleness_ceiling_s,
            });
        }

        if self.failure_budget == 0 {
            return Err(ConfigError::ZeroFailureBudget);
        }

        Ok(())
    }

    /// Bus address assigned to a role, if any display carries it.
    pub fn address_for(&self, role: DisplayRole) -> Option<u8> {
        self.displays
            .iter()
            .find(|binding| binding.role == role)
            .map(|binding| binding.address)
    }
}
