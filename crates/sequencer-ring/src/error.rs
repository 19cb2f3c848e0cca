#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// `RingFull`: no free slot between the cursor and the slowest
    /// gating (consumer) sequence.
    #[error("ring buffer is full (capacity {capacity})")]
    Full { capacity: usize },
}
