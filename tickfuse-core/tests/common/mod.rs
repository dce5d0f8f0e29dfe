//! Shared test harness: a simulated I2C bus and NMEA helpers.

#![allow(dead_code)]

use std::collections::HashMap;

use tickfuse_core::bus::SegmentBus;
use tickfuse_core::config::DEFAULT_RTC_ADDRESS;
use tickfuse_core::errors::BusError;
use tickfuse_core::time::CivilTime;

fn bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Simulated bus carrying a DS3231 at the RTC address and any number of
/// display controllers. Addresses can be failed and healed mid-test.
pub struct SimBus {
    /// DS3231 timekeeping registers
    pub rtc_regs: [u8; 7],
    pointer: u8,
    failing: Vec<u8>,
    /// Successful display-frame payloads, newest last, per address
    frames: HashMap<u8, Vec<Vec<u8>>>,
    /// Successful multi-byte writes to the RTC (discipline write-backs)
    pub rtc_writes: Vec<Vec<u8>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            rtc_regs: [0u8; 7],
            pointer: 0xff,
            failing: Vec::new(),
            frames: HashMap::new(),
            rtc_writes: Vec::new(),
        }
    }

    /// Load the simulated RTC with a calendar time.
    pub fn set_rtc(&mut self, civil: &CivilTime) {
        self.rtc_regs = [
            bcd(civil.second),
            bcd(civil.minute),
            bcd(civil.hour),
            bcd(1),
            bcd(civil.day),
            bcd(civil.month),
            bcd(civil.year.saturating_sub(2000).min(99) as u8),
        ];
    }

    /// Make every transaction to `address` fail with NoAck.
    pub fn fail_address(&mut self, address: u8) {
        if !self.failing.contains(&address) {
            self.failing.push(address);
        }
    }

    /// Let `address` acknowledge again.
    pub fn heal_address(&mut self, address: u8) {
        self.failing.retain(|&a| a != address);
    }

    /// Number of frames successfully pushed to a display.
    pub fn frame_count(&self, address: u8) -> usize {
        self.frames.get(&address).map_or(0, Vec::len)
    }

    /// Latest frame pushed to a display, register prefix included.
    pub fn last_frame(&self, address: u8) -> Option<&[u8]> {
        self.frames
            .get(&address)
            .and_then(|frames| frames.last())
            .map(Vec::as_slice)
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentBus for SimBus {
    fn write(&mut self, address: u8, payload: &[u8]) -> nb::Result<(), BusError> {
        if self.failing.contains(&address) {
            return Err(nb::Error::Other(BusError::NoAck { address }));
        }

        if address == DEFAULT_RTC_ADDRESS {
            if payload.len() == 1 {
                self.pointer = payload[0];
            } else {
                // Discipline write: pointer followed by register data
                self.pointer = payload[0];
                let data = &payload[1..];
                let start = self.pointer as usize;
                for (offset, &byte) in data.iter().enumerate() {
                    if let Some(reg) = self.rtc_regs.get_mut(start + offset) {
                        *reg = byte;
                    }
                }
                self.rtc_writes.push(payload.to_vec());
            }
        } else {
            self.frames.entry(address).or_default().push(payload.to_vec());
        }
        Ok(())
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> nb::Result<(), BusError> {
        if self.failing.contains(&address) || address != DEFAULT_RTC_ADDRESS {
            return Err(nb::Error::Other(BusError::NoAck { address }));
        }
        if self.pointer != 0x00 || buf.len() > self.rtc_regs.len() {
            return Err(nb::Error::Other(BusError::NoAck { address }));
        }
        buf.copy_from_slice(&self.rtc_regs[..buf.len()]);
        Ok(())
    }
}

/// Build a checksummed RMC sentence for a calendar time.
pub fn rmc_sentence(civil: &CivilTime, valid: bool) -> String {
    let body = format!(
        "GPRMC,{:02}{:02}{:02}.00,{},,,,,,,{:02}{:02}{:02},,,A",
        civil.hour,
        civil.minute,
        civil.second,
        if valid { "A" } else { "V" },
        civil.day,
        civil.month,
        civil.year % 100,
    );
    let sum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}\r\n", body, sum)
}

/// A fixed reference time most scenarios start from.
pub fn reference_civil() -> CivilTime {
    CivilTime {
        year: 2026,
        month: 8,
        day: 29,
        hour: 12,
        minute: 34,
        second: 56,
    }
}

pub fn reference_epoch() -> u64 {
    reference_civil().to_epoch().unwrap()
}
