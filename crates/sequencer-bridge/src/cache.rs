use indexmap::IndexMap;
use std::sync::Mutex;
use std::time::Duration;

struct Entry {
    result: bool,
    inserted_at_ms: i64,
}

/// Merkle-verification result cache, keyed by `"proof" ‖ sender ‖ amount ‖
/// concat(proof)` (§4.3). Bounded by both a TTL and an LRU-by-insertion
/// cap, matching the shape of `sequencer_disruptor::CompletedSet`.
pub struct ProofCache {
    entries: Mutex<IndexMap<String, Entry>>,
    capacity: usize,
    ttl_ms: i64,
}

pub fn cache_key(sender: &str, amount: u128, proof: &[String]) -> String {
    let mut key = format!("proof{sender}{amount}");
    for sibling in proof {
        key.push_str(sibling);
    }
    key
}

impl ProofCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            ttl_ms: ttl.as_millis() as i64,
        }
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if now_ms() - entry.inserted_at_ms > self.ttl_ms {
            return None;
        }
        Some(entry.result)
    }

    pub fn insert(&self, key: String, result: bool) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.shift_remove_index(0);
        }
        entries.insert(
            key,
            Entry {
                result,
                inserted_at_ms: now_ms(),
            },
        );
    }

    /// Drop entries older than the TTL; if still over capacity, drop
    /// oldest-by-insertion-time until at capacity (§4.3 "Cache GC").
    pub fn sweep(&self) {
        let mut entries = self.entries.lock().unwrap();
        let cutoff = now_ms() - self.ttl_ms;
        entries.retain(|_, entry| entry.inserted_at_ms >= cutoff);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_evicted_by_sweep_past_ttl() {
        let cache = ProofCache::new(10, Duration::from_millis(0));
        cache.insert("k".into(), true);
        // TTL of 0 means "now - inserted > 0" is already true a moment
        // later, so a sweep should evict it.
        std::thread::sleep(Duration::from_millis(2));
        cache.sweep();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest_insertion() {
        let cache = ProofCache::new(2, Duration::from_secs(3600));
        cache.insert("a".into(), true);
        cache.insert("b".into(), true);
        cache.insert("c".into(), true);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn cache_key_differentiates_proofs() {
        let k1 = cache_key("A", 10, &["aa".to_string()]);
        let k2 = cache_key("A", 10, &["bb".to_string()]);
        assert_ne!(k1, k2);
    }
}
