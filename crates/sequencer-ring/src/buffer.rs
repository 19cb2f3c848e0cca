use crate::sequencer::{ClaimStrategy, GatingSequence, Sequencer};
use crate::slot::{Slot, SlotStatus};
use crate::Error;

/// Rounds `n` up to the next power of two (minimum 1).
fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Fixed power-of-two-capacity circular slot store with a monotonic
/// sequence claim. Single-writer publish, multi-reader consume.
pub struct RingBuffer<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    sequencer: Sequencer,
}

impl<T> RingBuffer<T> {
    /// `requested_capacity` is rounded up to the next power of two.
    pub fn new(requested_capacity: usize, strategy: ClaimStrategy) -> Self {
        let capacity = next_power_of_two(requested_capacity);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::new);

        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            sequencer: Sequencer::new(capacity, strategy),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, seq: i64) -> usize {
        (seq as usize) & self.mask
    }

    pub fn add_gating_sequence(&self) -> GatingSequence {
        self.sequencer.add_gating_sequence()
    }

    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor()
    }

    /// Reserve the next sequence number.
    pub fn claim_next(&self) -> Result<i64, Error> {
        self.sequencer.claim_next()
    }

    /// Write `payload` into the slot for `seq` and mark it Published.
    /// `seq` must be a value previously returned by `claim_next` and not
    /// yet published; violating this is a programming error and panics,
    /// the same way writing to an un-reserved index would be a logic bug
    /// rather than a recoverable error.
    pub fn publish(&self, seq: i64, payload: T) {
        self.sequencer.await_publication_turn(seq);

        let slot = &self.slots[self.index(seq)];
        assert!(
            slot.current_sequence() != seq,
            "publish called twice for sequence {seq}"
        );

        *slot.payload.lock().unwrap() = Some(payload);
        *slot.status.lock().unwrap() = SlotStatus::Published;
        slot.sequence.store(seq, std::sync::atomic::Ordering::Release);

        self.sequencer.mark_published(seq);
    }

    /// Read the payload at `seq` iff that slot currently holds `seq` and is
    /// Published. Returns a clone of the payload so multiple consumers can
    /// inspect the same published event.
    pub fn read(&self, seq: i64) -> Option<T>
    where
        T: Clone,
    {
        let slot = &self.slots[self.index(seq)];
        if slot.current_sequence() != seq {
            return None;
        }
        if *slot.status.lock().unwrap() != SlotStatus::Published {
            return None;
        }
        slot.payload.lock().unwrap().clone()
    }

    pub fn mark_processed(&self, seq: i64) {
        let slot = &self.slots[self.index(seq)];
        if slot.current_sequence() == seq {
            *slot.status.lock().unwrap() = SlotStatus::Processed;
        }
    }

    /// Reset the ring to its initial empty state. Not safe to call while
    /// producers/consumers are active; intended for test setup and
    /// full-restart recovery paths.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.sequence.store(-1, std::sync::atomic::Ordering::Release);
            *slot.payload.lock().unwrap() = None;
            *slot.status.lock().unwrap() = SlotStatus::Empty;
        }
        self.sequencer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let ring: RingBuffer<u32> = RingBuffer::new(10, ClaimStrategy::Single);
        assert_eq!(ring.capacity(), 16);
    }

    #[test]
    fn claim_publish_read_round_trip() {
        let ring: RingBuffer<&'static str> = RingBuffer::new(4, ClaimStrategy::Single);
        let seq = ring.claim_next().unwrap();
        ring.publish(seq, "hello");
        assert_eq!(ring.read(seq), Some("hello"));
    }

    #[test]
    fn read_before_publish_is_none() {
        let ring: RingBuffer<u32> = RingBuffer::new(4, ClaimStrategy::Single);
        let seq = ring.claim_next().unwrap();
        assert_eq!(ring.read(seq), None);
    }

    #[test]
    fn full_when_gating_does_not_advance() {
        let ring: RingBuffer<u32> = RingBuffer::new(2, ClaimStrategy::Single);
        let gate = ring.add_gating_sequence();
        gate.set(-1);

        ring.publish(ring.claim_next().unwrap(), 1);
        ring.publish(ring.claim_next().unwrap(), 2);
        assert!(matches!(ring.claim_next(), Err(Error::Full { .. })));
    }

    #[test]
    fn clear_resets_ring() {
        let ring: RingBuffer<u32> = RingBuffer::new(4, ClaimStrategy::Single);
        let seq = ring.claim_next().unwrap();
        ring.publish(seq, 42);
        ring.clear();
        assert_eq!(ring.cursor(), -1);
        assert_eq!(ring.read(seq), None);
    }

    #[test]
    fn capacity_never_exceeded() {
        let capacity = 8usize;
        let ring: RingBuffer<u32> = RingBuffer::new(capacity, ClaimStrategy::Single);
        let gate = ring.add_gating_sequence();

        let mut claimed = Vec::new();
        for i in 0..capacity {
            let seq = ring.claim_next().unwrap();
            ring.publish(seq, i as u32);
            claimed.push(seq);
        }
        assert!(ring.claim_next().is_err());

        // Consumer advances gating as it processes, freeing capacity.
        for seq in claimed {
            gate.set(seq);
            assert!(ring.cursor() - gate.get() <= capacity as i64);
        }
        assert!(ring.claim_next().is_ok());
    }
}
