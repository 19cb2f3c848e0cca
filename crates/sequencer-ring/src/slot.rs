use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// "Ring slot" status. `Empty` slots hold no payload; `Published` slots
/// are readable; `Processed` slots have been handed to and acknowledged by
/// a consumer but are not yet reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Empty,
    Published,
    Processed,
}

/// A single ring slot. `sequence` doubles as the occupancy marker: `-1`
/// means empty regardless of `status`.
pub(crate) struct Slot<T> {
    pub(crate) sequence: AtomicI64,
    pub(crate) payload: Mutex<Option<T>>,
    pub(crate) status: Mutex<SlotStatus>,
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            sequence: AtomicI64::new(-1),
            payload: Mutex::new(None),
            status: Mutex::new(SlotStatus::Empty),
        }
    }

    pub(crate) fn current_sequence(&self) -> i64 {
        self.sequence.load(Ordering::Acquire)
    }
}
