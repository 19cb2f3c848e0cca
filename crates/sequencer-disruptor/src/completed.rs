use indexmap::IndexSet;
use std::sync::Mutex;

/// The shared completed-ids set: a bounded LRU-by-insertion membership
/// set. `IndexSet` gives O(1) membership test and preserves insertion
/// order so the oldest entry can be evicted in O(1) amortized when the
/// cap is exceeded.
pub struct CompletedSet {
    ids: Mutex<IndexSet<String>>,
    capacity: usize,
}

impl CompletedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: Mutex::new(IndexSet::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.lock().unwrap().contains(id)
    }

    pub fn insert(&self, id: String) {
        let mut ids = self.ids.lock().unwrap();
        if ids.contains(&id) {
            return;
        }
        if ids.len() >= self.capacity {
            ids.shift_remove_index(0);
        }
        ids.insert(id);
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
