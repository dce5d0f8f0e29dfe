//! Cooperative Single-Core Schedule
//!
//! ## Overview
//!
//! One execution context, no preemption: tasks run to completion and each
//! keeps its slice bounded. The schedule is a fixed table of periodic
//! slots ordered by priority - when several tasks are due at once, table
//! order decides, which is what guarantees sampling always runs before
//! arbitration and arbitration before the display push within one cycle.
//!
//! ## Re-Arming
//!
//! Deadlines are re-armed drift-free (`next_due += period`). A task that
//! finished after its *next* deadline already passed counts an overrun and
//! re-arms relative to now instead - the schedule sheds the missed runs
//! rather than bursting to catch up. Overrun counters climbing is the
//! signal that some slice is too long for the configured periods.

use heapless::Vec;

use crate::time::Tick;

/// Maximum number of schedulable tasks.
pub const MAX_TASKS: usize = 8;

/// The engine's task set, in descending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskId {
    /// Poll the RTC provider
    PollRtc = 0,
    /// Poll the GPS provider (sentence + PPS pairing)
    PollGps = 1,
    /// Run arbitration over this cycle's samples
    Arbitrate = 2,
    /// Render and push display frames
    RefreshDisplays = 3,
}

impl TaskId {
    /// Human-readable name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            TaskId::PollRtc => "poll_rtc",
            TaskId::PollGps => "poll_gps",
            TaskId::Arbitrate => "arbitrate",
            TaskId::RefreshDisplays => "refresh_displays",
        }
    }
}

/// One periodic slot in the table.
#[derive(Debug, Clone, Copy)]
pub struct TaskSlot {
    /// Task this slot runs
    pub id: TaskId,
    /// Period in ticks
    pub period: Tick,
    /// Next deadline in ticks
    pub next_due: Tick,
    /// Completed runs
    pub runs: u32,
    /// Deadlines missed because a run finished late
    pub overruns: u32,
}

/// Fixed-priority periodic schedule.
#[derive(Debug, Default)]
pub struct Schedule {
    slots: Vec<TaskSlot, MAX_TASKS>,
}

impl Schedule {
    /// Empty schedule.
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Add a slot due immediately. Insertion order is priority order.
    /// Returns false if the table is full.
    pub fn insert(&mut self, id: TaskId, period: Tick, now: Tick) -> bool {
        self.slots
            .push(TaskSlot {
                id,
                period,
                next_due: now,
                runs: 0,
                overruns: 0,
            })
            .is_ok()
    }

    /// Highest-priority task whose deadline has passed, if any.
    pub fn due(&self, now: Tick) -> Option<TaskId> {
        self.slots
            .iter()
            .find(|slot| slot.next_due <= now)
            .map(|slot| slot.id)
    }

    /// Mark a task's run complete at `now` and re-arm its deadline.
    pub fn completed(&mut self, id: TaskId, now: Tick) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.id == id) {
            slot.runs = slot.runs.wrapping_add(1);
            slot.next_due += slot.period;
            if slot.next_due <= now {
                // Shed missed runs instead of bursting
                slot.overruns = slot.overruns.wrapping_add(1);
                slot.next_due = now + slot.period;
            }
        }
    }

    /// Pull a task's deadline forward to `now`.
    pub fn force(&mut self, id: TaskId, now: Tick) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.id == id) {
            slot.next_due = now;
        }
    }

    /// Slot state, for diagnostics.
    pub fn slot(&self, id: TaskId) -> Option<&TaskSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }
}
