//! Device Driver Adapter: the Bus Capability Seam
//!
//! ## Overview
//!
//! Everything the engine knows about hardware goes through [`SegmentBus`]:
//! a uniform read/write capability over a bus address. The board crate
//! implements it on top of its I2C peripheral; the engine stays free of
//! transaction encoding, pin configuration, and chip-specific bring-up.
//!
//! ## Non-Blocking Contract
//!
//! Methods return [`nb::Result`]: `WouldBlock` means the bounded-step
//! transaction is still in flight and the caller should poll again. The
//! engine never spins unbounded - every transaction is driven through
//! [`run_bounded`]-style helpers with a per-transaction step budget, so a
//! wedged device costs a bounded number of steps and then surfaces
//! [`BusError::Timeout`]. Retry policy belongs to the *next* scheduled
//! cycle, never to this one.
//!
//! The bus is a shared resource with single-owner-at-a-time discipline: the
//! scheduler hands it to one task at a time and that task runs its bounded
//! transaction to completion before yielding. No transaction is ever held
//! open across a suspension point.

pub use crate::errors::BusError;

/// Segment-buffer width of the display chips, in bytes.
///
/// HT16K33-class controllers expose a 16-byte display RAM; every display
/// write carries the full buffer.
pub const SEGMENT_BUFFER_WIDTH: usize = 16;

/// Uniform read/write capability over a bus address.
///
/// Implementations perform one bounded step per call and report
/// `nb::Error::WouldBlock` while a transaction is in flight. No retries
/// happen at this layer.
pub trait SegmentBus {
    /// Write `payload` to the device at `address`.
    ///
    /// For display chips the payload length must match
    /// [`SEGMENT_BUFFER_WIDTH`] plus any register prefix the device
    /// expects; for register devices it is the register pointer followed
    /// by data bytes.
    fn write(&mut self, address: u8, payload: &[u8]) -> nb::Result<(), BusError>;

    /// Read `buf.len()` bytes from the device at `address`.
    fn read(&mut self, address: u8, buf: &mut [u8]) -> nb::Result<(), BusError>;
}

/// Drive a write transaction to completion within a step budget.
///
/// Each `WouldBlock` consumes one step; exhausting the budget converts to
/// [`BusError::Timeout`] so a wedged device cannot stall the schedule.
pub fn write_bounded<B: SegmentBus + ?Sized>(
    bus: &mut B,
    address: u8,
    payload: &[u8],
    step_limit: u16,
) -> Result<(), BusError> {
    for _ in 0..step_limit.max(1) {
        match bus.write(address, payload) {
            Ok(()) => return Ok(()),
            Err(nb::Error::WouldBlock) => continue,
            Err(nb::Error::Other(e)) => return Err(e),
        }
    }
    Err(BusError::Timeout { address })
}

/// Drive a read transaction to completion within a step budget.
pub fn read_bounded<B: SegmentBus + ?Sized>(
    bus: &mut B,
    address: u8,
    buf: &mut [u8],
    step_limit: u16,
) -> Result<(), BusError> {
    for _ in 0..step_limit.max(1) {
        match bus.read(address, buf) {
            Ok(()) => return Ok(()),
            Err(nb::Error::WouldBlock) => continue,
            Err(nb::Error::Other(e)) => return Err(e),
        }
    }
    Err(BusError::Timeout { address })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bus that blocks `stalls` times before acknowledging.
    struct StallingBus {
        stalls: u16,
        writes: u32,
    }

    impl SegmentBus for StallingBus {
        fn write(&mut self, _address: u8, _payload: &[u8]) -> nb::Result<(), BusError> {
            if self.stalls > 0 {
                self.stalls -= 1;
                return Err(nb::Error::WouldBlock);
            }
            self.writes += 1;
            Ok(())
        }

        fn read(&mut self, _address: u8, _buf: &mut [u8]) -> nb::Result<(), BusError> {
            if self.stalls > 0 {
                self.stalls -= 1;
                return Err(nb::Error::WouldBlock);
            }
            Ok(())
        }
    }

    #[test]
    fn write_completes_within_budget() {
        let mut bus = StallingBus { stalls: 3, writes: 0 };
        assert!(write_bounded(&mut bus, 0x70, &[0u8; 16], 8).is_ok());
        assert_eq!(bus.writes, 1);
    }

    #[test]
    fn wedged_device_times_out() {
        let mut bus = StallingBus { stalls: u16::MAX, writes: 0 };
        assert_eq!(
            write_bounded(&mut bus, 0x72, &[0u8; 16], 4),
            Err(BusError::Timeout { address: 0x72 })
        );
    }

    #[test]
    fn hard_error_propagates_immediately() {
        struct NackBus;
        impl SegmentBus for NackBus {
            fn write(&mut self, address: u8, _: &[u8]) -> nb::Result<(), BusError> {
                Err(nb::Error::Other(BusError::NoAck { address }))
            }
            fn read(&mut self, address: u8, _: &mut [u8]) -> nb::Result<(), BusError> {
                Err(nb::Error::Other(BusError::NoAck { address }))
            }
        }

        let mut bus = NackBus;
        assert_eq!(
            read_bounded(&mut bus, 0x68, &mut [0u8; 7], 32),
            Err(BusError::NoAck { address: 0x68 })
        );
    }
}
