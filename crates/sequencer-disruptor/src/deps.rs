use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// An event parked because one or more of its declared dependencies have
/// not yet completed.
pub(crate) struct PendingEntry {
    pub(crate) remaining: HashSet<String>,
}

/// Adjacency-based dependency tracking: `waiters` maps a not-yet-completed
/// id to the ids parked on it, giving O(1) unblocking on completion
/// instead of rescanning every pending event. `depends_on` is the reverse
/// edge set, used only for cycle detection.
pub struct DependencyGraph {
    pending: Mutex<HashMap<String, PendingEntry>>,
    waiters: Mutex<HashMap<String, Vec<String>>>,
    depends_on: Mutex<HashMap<String, HashSet<String>>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("dependency cycle detected for event {0}")]
pub struct CycleError(pub String);

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
            depends_on: Mutex::new(HashMap::new()),
        }
    }

    /// Register `id`'s dependency set, failing if it would create a cycle
    /// against the current graph of not-yet-completed events.
    pub fn register(&self, id: &str, deps: &HashSet<String>) -> Result<(), CycleError> {
        let mut depends_on = self.depends_on.lock().unwrap();
        depends_on.insert(id.to_string(), deps.clone());

        if has_cycle(&depends_on, id) {
            depends_on.remove(id);
            return Err(CycleError(id.to_string()));
        }
        Ok(())
    }

    /// Park `id` on `missing` (a non-empty subset of its dependencies that
    /// have not completed). The event's gating advances regardless; it
    /// will be resubmitted once every missing dep completes.
    pub fn park(&self, id: String, missing: HashSet<String>) {
        let mut waiters = self.waiters.lock().unwrap();
        for dep in &missing {
            waiters.entry(dep.clone()).or_default().push(id.clone());
        }
        self.pending
            .lock()
            .unwrap()
            .insert(id, PendingEntry { remaining: missing });
    }

    /// Mark `dep` as completed, returning the ids (if any) now fully
    /// unblocked.
    pub fn complete(&self, dep: &str) -> Vec<String> {
        self.depends_on.lock().unwrap().remove(dep);

        let waiting_ids = self.waiters.lock().unwrap().remove(dep).unwrap_or_default();
        let mut ready = Vec::new();

        let mut pending = self.pending.lock().unwrap();
        for id in waiting_ids {
            if let Some(entry) = pending.get_mut(&id) {
                entry.remaining.remove(dep);
                if entry.remaining.is_empty() {
                    pending.remove(&id);
                    ready.push(id);
                }
            }
        }
        ready
    }

    pub fn forget(&self, id: &str) {
        self.depends_on.lock().unwrap().remove(id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// DFS from `start`'s declared dependencies looking for a path back to
/// `start` itself.
fn has_cycle(depends_on: &HashMap<String, HashSet<String>>, start: &str) -> bool {
    let mut stack: Vec<&str> = depends_on
        .get(start)
        .into_iter()
        .flatten()
        .map(|s| s.as_str())
        .collect();
    let mut visited: HashSet<&str> = HashSet::new();

    while let Some(node) = stack.pop() {
        if node == start {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = depends_on.get(node) {
            stack.extend(next.iter().map(|s| s.as_str()));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn park_and_complete_unblocks_waiter() {
        let graph = DependencyGraph::new();
        graph.park("child".to_string(), set(&["parent"]));
        let ready = graph.complete("parent");
        assert_eq!(ready, vec!["child".to_string()]);
    }

    #[test]
    fn waits_for_all_deps() {
        let graph = DependencyGraph::new();
        graph.park("child".to_string(), set(&["p1", "p2"]));
        assert!(graph.complete("p1").is_empty());
        assert_eq!(graph.complete("p2"), vec!["child".to_string()]);
    }

    #[test]
    fn detects_direct_cycle() {
        let graph = DependencyGraph::new();
        graph.register("a", &set(&["b"])).unwrap();
        let err = graph.register("b", &set(&["a"])).unwrap_err();
        assert_eq!(err, CycleError("b".to_string()));
    }

    #[test]
    fn detects_self_cycle() {
        let graph = DependencyGraph::new();
        let err = graph.register("a", &set(&["a"])).unwrap_err();
        assert_eq!(err, CycleError("a".to_string()));
    }

    #[test]
    fn acyclic_chain_is_allowed() {
        let graph = DependencyGraph::new();
        graph.register("a", &set(&[])).unwrap();
        graph.register("b", &set(&["a"])).unwrap();
        graph.register("c", &set(&["b"])).unwrap();
    }
}
