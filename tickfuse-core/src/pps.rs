//! Lock-Free Single-Slot Latch for PPS Edge Capture
//!
//! ## Overview
//!
//! The GPS pulse-per-second line fires a hardware edge once per UTC second.
//! The edge handler runs outside the cooperative schedule and must finish in
//! bounded, minimal time: read the monotonic counter, store the tick, return.
//! Everything else - pairing the tick with a parsed sentence, re-anchoring
//! the estimate - is deferred to the next arbitration cycle.
//!
//! ## Why a Single Slot?
//!
//! Only the *latest* edge matters. If arbitration misses an edge because a
//! cycle ran long, the next edge supersedes it entirely; queueing old edges
//! would only let the consumer anchor against stale phase. A single-slot
//! last-writer-wins buffer is therefore exactly the right structure, and it
//! removes the need for any locking:
//!
//! ```text
//! Edge handler (ISR)                 Arbitration task
//!      ↓                                  ↓
//!   record(tick) ───→ one slot ←─── take() at cycle start
//!      ↓                                  ↓
//!   never blocks                     never blocks
//! ```
//!
//! ## Memory Ordering
//!
//! Single writer (the edge context), single reader (the arbitration task),
//! and the two never overlap within one cycle. The tick is stored with
//! Release ordering before the freshness flag is raised, and the reader
//! lowers the flag with Acquire before loading the tick, establishing the
//! happens-before edge without a critical section.
//!
//! This gives the ordering guarantee the engine relies on: an edge recorded
//! at tick T is visible to the first `take()` that starts after T, and never
//! to one that completed before T.
//!
//! ## Platform Note
//!
//! The slot is an `AtomicU64`; on 32-bit targets without native 64-bit
//! atomics, wrap `record`/`take` in the platform's critical section at the
//! call site instead.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::time::Tick;

/// Single-slot last-writer-wins buffer for the most recent PPS edge tick.
pub struct PpsLatch {
    /// Most recent edge tick (writer owned)
    tick: AtomicU64,
    /// Slot holds an unconsumed edge
    fresh: AtomicBool,
    /// Capture statistics
    stats: LatchStats,
}

/// Latch health counters.
///
/// `overwritten` climbing means arbitration cycles are running longer than
/// one second and edges are being superseded before consumption.
pub struct LatchStats {
    /// Total edges recorded
    pub captured: AtomicU32,
    /// Edges consumed by the arbitration task
    pub consumed: AtomicU32,
    /// Edges superseded before they were consumed
    pub overwritten: AtomicU32,
}

impl LatchStats {
    const fn new() -> Self {
        Self {
            captured: AtomicU32::new(0),
            consumed: AtomicU32::new(0),
            overwritten: AtomicU32::new(0),
        }
    }
}

impl PpsLatch {
    /// Empty latch, usable in a static.
    pub const fn new() -> Self {
        Self {
            tick: AtomicU64::new(0),
            fresh: AtomicBool::new(false),
            stats: LatchStats::new(),
        }
    }

    /// Record an edge tick. Edge-handler side.
    ///
    /// Bounded time, no allocation, no bus work: safe from interrupt
    /// context. A previous unconsumed edge is silently superseded.
    pub fn record(&self, tick: Tick) {
        if self.fresh.load(Ordering::Relaxed) {
            self.stats.overwritten.fetch_add(1, Ordering::Relaxed);
        }

        // Tick must be visible before the flag is raised
        self.tick.store(tick, Ordering::Release);
        self.fresh.store(true, Ordering::Release);

        self.stats.captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Consume the latest edge, if one arrived since the last take.
    ///
    /// Called once at the start of each arbitration cycle; consuming
    /// clears the slot so one edge anchors at most one cycle.
    pub fn take(&self) -> Option<Tick> {
        if self.fresh.swap(false, Ordering::Acquire) {
            self.stats.consumed.fetch_add(1, Ordering::Relaxed);
            Some(self.tick.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Latest edge tick without consuming it.
    pub fn peek(&self) -> Option<Tick> {
        if self.fresh.load(Ordering::Acquire) {
            Some(self.tick.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Whether an unconsumed edge is waiting.
    pub fn is_fresh(&self) -> bool {
        self.fresh.load(Ordering::Acquire)
    }

    /// Capture statistics.
    pub fn stats(&self) -> &LatchStats {
        &self.stats
    }
}

impl Default for PpsLatch {
    fn default() -> Self {
        Self::new()
    }
}
