use crate::hashing::{hash_u32, HashFunction};
use crate::ring::ConsistentHashRing;
use std::collections::HashMap;

/// An inclusive `[min, max]` key range mapped to a shard, used by the
/// range strategy.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Range {
    pub min: i64,
    pub max: i64,
    #[serde(rename = "shardId")]
    pub shard_id: usize,
}

/// Configuration for one of the four routing strategies. Mirrors the
/// `strategy` object in the router's configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StrategyConfig {
    Hash {
        function: HashFunction,
    },
    Range {
        ranges: Vec<Range>,
    },
    Lookup {
        #[serde(rename = "lookupTable")]
        lookup_table: HashMap<String, usize>,
        function: HashFunction,
    },
    ConsistentHash {
        #[serde(rename = "virtualNodes", default = "default_virtual_nodes")]
        virtual_nodes: usize,
    },
}

fn default_virtual_nodes() -> usize {
    100
}

/// The built, ready-to-route form of a `StrategyConfig`: the consistent
/// hash ring (if any) is constructed once up front rather than per lookup.
pub enum Strategy {
    Hash {
        function: HashFunction,
    },
    Range {
        ranges: Vec<Range>,
    },
    Lookup {
        table: HashMap<String, usize>,
        fallback: HashFunction,
    },
    ConsistentHash {
        ring: ConsistentHashRing,
    },
}

impl Strategy {
    pub fn build(config: &StrategyConfig, shard_count: usize) -> Self {
        match config {
            StrategyConfig::Hash { function } => Strategy::Hash { function: *function },
            StrategyConfig::Range { ranges } => Strategy::Range { ranges: ranges.clone() },
            StrategyConfig::Lookup { lookup_table, function } => Strategy::Lookup {
                table: lookup_table.clone(),
                fallback: *function,
            },
            StrategyConfig::ConsistentHash { virtual_nodes } => Strategy::ConsistentHash {
                ring: ConsistentHashRing::build(shard_count, *virtual_nodes),
            },
        }
    }

    /// Map `key` to a shard index in `0..shard_count`.
    pub fn shard_for_key(&self, key: &str, shard_count: usize) -> Option<usize> {
        if shard_count == 0 {
            return None;
        }
        match self {
            Strategy::Hash { function } => Some(hash_by_function(*function, key, shard_count)),
            Strategy::Range { ranges } => range_shard(ranges, key, shard_count),
            Strategy::Lookup { table, fallback } => table
                .get(key)
                .copied()
                .or_else(|| Some(hash_by_function(*fallback, key, shard_count))),
            Strategy::ConsistentHash { ring } => ring.shard_for_key(key),
        }
    }
}

fn hash_by_function(function: HashFunction, key: &str, shard_count: usize) -> usize {
    (hash_u32(function, key) as usize) % shard_count
}

fn range_shard(ranges: &[Range], key: &str, shard_count: usize) -> Option<usize> {
    let numeric: i64 = key.parse().unwrap_or_else(|_| hash_u32(HashFunction::Md5, key) as i64);
    for range in ranges {
        if numeric >= range.min && numeric <= range.max {
            return Some(range.shard_id);
        }
    }
    Some((numeric.rem_euclid(shard_count as i64)) as usize)
}
