use crate::Error;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Single-producer (default) or multi-producer claim mode. `Multi` is
/// opt-in: its stall semantics (publish only in claim order) are a real
/// cost, so a caller must choose it explicitly rather than inherit it by
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStrategy {
    Single,
    Multi,
}

/// A consumer-owned monotonic counter. The sequencer computes free capacity
/// from the minimum of all registered gating sequences.
#[derive(Debug, Clone)]
pub struct GatingSequence(Arc<AtomicI64>);

impl GatingSequence {
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Release);
    }
}

/// Tracks the producer cursor and consumer gating sequences for a
/// fixed-capacity ring.
pub struct Sequencer {
    capacity: usize,
    cursor: AtomicI64,
    gating: Mutex<Vec<GatingSequence>>,
    strategy: ClaimStrategy,
    /// In `Multi` mode, the highest sequence that has actually been
    /// published (as opposed to merely claimed); publication of sequence
    /// N+1 must stall until N is published.
    published_through: AtomicI64,
}

impl Sequencer {
    pub fn new(capacity: usize, strategy: ClaimStrategy) -> Self {
        Self {
            capacity,
            cursor: AtomicI64::new(-1),
            gating: Mutex::new(Vec::new()),
            strategy,
            published_through: AtomicI64::new(-1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Register a new consumer and return its gating sequence handle,
    /// initialized to the current cursor (a freshly-attached consumer does
    /// not gate capacity for work already claimed).
    pub fn add_gating_sequence(&self) -> GatingSequence {
        let handle = GatingSequence(Arc::new(AtomicI64::new(self.cursor())));
        self.gating.lock().unwrap().push(handle.clone());
        handle
    }

    fn min_gating(&self) -> i64 {
        let gating = self.gating.lock().unwrap();
        gating.iter().map(|g| g.get()).min().unwrap_or_else(|| self.cursor())
    }

    /// Reserve the next sequence number. Fails fast with `Full` when no
    /// slot is free.
    pub fn claim_next(&self) -> Result<i64, Error> {
        match self.strategy {
            ClaimStrategy::Single => {
                let cursor = self.cursor.load(Ordering::Relaxed);
                let next = cursor + 1;
                if next - self.min_gating() >= self.capacity as i64 {
                    return Err(Error::Full { capacity: self.capacity });
                }
                self.cursor.store(next, Ordering::Release);
                Ok(next)
            }
            ClaimStrategy::Multi => loop {
                let cursor = self.cursor.load(Ordering::Acquire);
                let next = cursor + 1;
                if next - self.min_gating() >= self.capacity as i64 {
                    return Err(Error::Full { capacity: self.capacity });
                }
                if self
                    .cursor
                    .compare_exchange(cursor, next, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Ok(next);
                }
            },
        }
    }

    /// In `Multi` mode, block (spin) until every sequence up to `seq - 1`
    /// has been published, preserving claim-order publication.
    pub fn await_publication_turn(&self, seq: i64) {
        if self.strategy == ClaimStrategy::Single {
            return;
        }
        while self.published_through.load(Ordering::Acquire) < seq - 1 {
            std::hint::spin_loop();
        }
    }

    pub fn mark_published(&self, seq: i64) {
        // Monotonic advance; under Single claim this is always in order.
        let mut current = self.published_through.load(Ordering::Acquire);
        while current < seq {
            match self.published_through.compare_exchange_weak(
                current,
                seq,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn clear(&self) {
        self.cursor.store(-1, Ordering::Release);
        self.published_through.store(-1, Ordering::Release);
        for gate in self.gating.lock().unwrap().iter() {
            gate.set(-1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_advances_cursor() {
        let seq = Sequencer::new(4, ClaimStrategy::Single);
        assert_eq!(seq.claim_next().unwrap(), 0);
        assert_eq!(seq.claim_next().unwrap(), 1);
        assert_eq!(seq.cursor(), 1);
    }

    #[test]
    fn claim_fails_when_full_against_gating() {
        let seq = Sequencer::new(2, ClaimStrategy::Single);
        let gate = seq.add_gating_sequence();
        gate.set(-1);

        assert_eq!(seq.claim_next().unwrap(), 0);
        assert_eq!(seq.claim_next().unwrap(), 1);
        // Capacity 2, gating still at -1: cursor-min_gating would be 2 >= 2.
        assert_eq!(seq.claim_next(), Err(Error::Full { capacity: 2 }));

        // Consumer catches up, freeing capacity.
        gate.set(0);
        assert_eq!(seq.claim_next().unwrap(), 2);
    }

    #[test]
    fn multi_claim_is_unique_under_contention() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let seq = StdArc::new(Sequencer::new(1024, ClaimStrategy::Multi));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let seq = seq.clone();
            handles.push(thread::spawn(move || {
                let mut claimed = Vec::new();
                for _ in 0..100 {
                    claimed.push(seq.claim_next().unwrap());
                }
                claimed
            }));
        }
        let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        let expected: Vec<i64> = (0..800).collect();
        assert_eq!(all, expected);
    }
}
