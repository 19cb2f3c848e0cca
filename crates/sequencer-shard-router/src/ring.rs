use crate::hashing::md5_position;

/// A consistent-hash ring over `shard_count` shards, each represented by
/// `virtual_nodes` points on the ring. Built once at router construction;
/// lookups are a binary search over the sorted position list.
pub struct ConsistentHashRing {
    // Sorted ascending by position. Ties are broken by insertion order,
    // which is stable since shards/vnodes are enumerated in a fixed order.
    points: Vec<(u32, usize)>,
}

impl ConsistentHashRing {
    pub fn build(shard_count: usize, virtual_nodes: usize) -> Self {
        let mut points = Vec::with_capacity(shard_count * virtual_nodes);
        for shard in 0..shard_count {
            for vnode in 0..virtual_nodes {
                let label = format!("shard-{shard}-vnode-{vnode}");
                points.push((md5_position(&label), shard));
            }
        }
        points.sort_by_key(|(position, _)| *position);
        Self { points }
    }

    /// The shard owning `key`: the first ring point whose position is
    /// strictly greater than the key's position, wrapping around to the
    /// first point if the key's position is past every entry.
    pub fn shard_for_key(&self, key: &str) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }
        let key_pos = md5_position(key);
        match self.points.partition_point(|(position, _)| *position <= key_pos) {
            len if len == self.points.len() => Some(self.points[0].1),
            idx => Some(self.points[idx].1),
        }
    }
}
