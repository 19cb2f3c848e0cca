use crate::operation::Operation;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Oldest-queued-item age that alone triggers a batch (§4.3 "Batch-trigger
/// policy", condition c).
pub const OLDEST_AGE_TRIGGER_MS: i64 = 10_000;

/// One kind's (deposits or withdrawals) priority queues. Index `i` holds
/// priority level `i`; per §8 scenario 3, a *larger* index is a *higher*
/// priority and is drained first. Mutated only by the bridge coordinator
/// (single-writer, §5); wrapped in a `Mutex` only so it can be shared
/// behind an `Arc` across the async tasks that make up that coordinator.
pub struct PriorityQueueSet {
    levels: Mutex<Vec<VecDeque<Operation>>>,
}

impl PriorityQueueSet {
    pub fn new(priority_levels: u32) -> Self {
        let levels = (0..priority_levels.max(1)).map(|_| VecDeque::new()).collect();
        Self { levels: Mutex::new(levels) }
    }

    pub fn enqueue(&self, op: Operation) {
        let mut levels = self.levels.lock().unwrap();
        let idx = (op.priority as usize).min(levels.len() - 1);
        levels[idx].push_back(op);
    }

    /// Drain from the highest priority level downward, oldest-first
    /// within a level, until `batch_size` items are selected or every
    /// level is empty (§4.3 "Selection"; P2, P3).
    pub fn select_batch(&self, batch_size: usize) -> Vec<Operation> {
        let mut levels = self.levels.lock().unwrap();
        let mut selected = Vec::with_capacity(batch_size.min(64));
        for level in levels.iter_mut().rev() {
            while selected.len() < batch_size {
                match level.pop_front() {
                    Some(op) => selected.push(op),
                    None => break,
                }
            }
            if selected.len() >= batch_size {
                break;
            }
        }
        selected
    }

    /// §4.3 "Batch-trigger policy": any of (a) total queued at least
    /// `batch_size`, (b) the highest priority level is non-empty, (c) the
    /// oldest queued item across all levels is older than
    /// [`OLDEST_AGE_TRIGGER_MS`].
    pub fn should_trigger(&self, batch_size: usize, now_ms: i64) -> bool {
        let levels = self.levels.lock().unwrap();
        let total: usize = levels.iter().map(|l| l.len()).sum();
        if total >= batch_size {
            return true;
        }
        if levels.last().map(|l| !l.is_empty()).unwrap_or(false) {
            return true;
        }
        let oldest = levels.iter().flatten().map(|op| op.created_at_ms).min();
        matches!(oldest, Some(ts) if now_ms - ts > OLDEST_AGE_TRIGGER_MS)
    }

    pub fn total_len(&self) -> usize {
        self.levels.lock().unwrap().iter().map(|l| l.len()).sum()
    }

    /// Pending count per priority level, lowest index first.
    pub fn counts_by_priority(&self) -> Vec<usize> {
        self.levels.lock().unwrap().iter().map(|l| l.len()).collect()
    }

    /// Read-only snapshot lookup by id, scanning every level (§4.3
    /// `getOperationStatus`).
    pub fn find(&self, id: &str) -> Option<Operation> {
        let levels = self.levels.lock().unwrap();
        levels.iter().flatten().find(|op| op.id == id).cloned()
    }
}
