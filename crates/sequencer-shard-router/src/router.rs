use crate::backend::{Row, ShardBackend};
use crate::config::ShardRouterConfig;
use crate::error::Error;
use crate::strategy::Strategy;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct ShardCounters {
    queries: AtomicU64,
    errors: AtomicU64,
}

/// Per-shard liveness as observed by `checkShardStatus`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShardStatus {
    pub shard_id: usize,
    pub healthy: bool,
}

/// Per-shard counters as observed by `getShardStats`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShardStats {
    pub shard_id: usize,
    pub queries: u64,
    pub errors: u64,
}

/// One shard's outcome from a fan-out call; failures are captured here
/// rather than aborting the whole fan-out.
#[derive(Debug, Clone)]
pub struct ShardResult {
    pub shard_id: usize,
    pub outcome: Result<Vec<Row>, Error>,
}

struct Inner {
    shards: Vec<Arc<dyn ShardBackend>>,
    strategy: Strategy,
    counters: Vec<ShardCounters>,
    telemetry: Option<Arc<sequencer_telemetry::Registry>>,
    closed: AtomicBool,
}

/// Pluggable keyed-routing layer over N backend shards. Mirrors the
/// `Arc<Inner>` handle shape of `gazette::Router`: cheap to clone, shared
/// freely across tasks, with interior state behind the `Inner`.
#[derive(Clone)]
pub struct ShardRouter {
    inner: Arc<Inner>,
}

impl ShardRouter {
    pub fn new(
        shards: Vec<Arc<dyn ShardBackend>>,
        config: &ShardRouterConfig,
        telemetry: Option<Arc<sequencer_telemetry::Registry>>,
    ) -> Result<Self, Error> {
        if shards.is_empty() {
            return Err(Error::ValidationFailed("router requires at least one shard".into()));
        }
        let strategy = Strategy::build(&config.strategy, shards.len());
        let counters = shards.iter().map(|_| ShardCounters::default()).collect();

        Ok(Self {
            inner: Arc::new(Inner {
                shards,
                strategy,
                counters,
                telemetry,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// Map `key` to a shard index using the configured strategy.
    pub fn shard_for_key(&self, key: &str) -> Result<usize, Error> {
        self.inner
            .strategy
            .shard_for_key(key, self.inner.shards.len())
            .ok_or_else(|| Error::ValidationFailed(format!("no shard mapping for key {key}")))
    }

    pub async fn query_on_shard(
        &self,
        shard_id: usize,
        stmt: &str,
        params: &[Value],
    ) -> Result<Vec<Row>, Error> {
        self.guard_open()?;
        let shard = self.backend(shard_id)?;
        let result = shard.query(stmt, params).await;
        self.record(shard_id, result.is_err());
        result
    }

    pub async fn query_by_key(&self, key: &str, stmt: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let shard_id = self.shard_for_key(key)?;
        self.query_on_shard(shard_id, stmt, params).await
    }

    /// Runs sequentially across shards in id order; a per-shard failure is
    /// captured in that shard's slot rather than aborting the fan-out.
    pub async fn query_all_shards(&self, stmt: &str, params: &[Value]) -> Result<Vec<ShardResult>, Error> {
        self.guard_open()?;
        let mut results = Vec::with_capacity(self.inner.shards.len());
        for shard_id in 0..self.inner.shards.len() {
            let shard = self.backend(shard_id)?;
            let outcome = shard.query(stmt, params).await;
            self.record(shard_id, outcome.is_err());
            results.push(ShardResult { shard_id, outcome });
        }
        Ok(results)
    }

    /// Run `body` against `shard_id` inside a BEGIN/COMMIT; any error from
    /// `body` triggers ROLLBACK and is re-surfaced. Cross-shard distributed
    /// transactions are not provided.
    pub async fn transaction_on_shard<F, Fut, T>(&self, shard_id: usize, body: F) -> Result<T, Error>
    where
        F: FnOnce(Arc<dyn ShardBackend>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.guard_open()?;
        let shard = self.backend(shard_id)?;
        shard.begin().await?;

        match body(shard.clone()).await {
            Ok(value) => {
                shard.commit().await?;
                self.record(shard_id, false);
                Ok(value)
            }
            Err(err) => {
                self.record(shard_id, true);
                let _ = shard.rollback().await;
                Err(err)
            }
        }
    }

    pub async fn transaction_by_key<F, Fut, T>(&self, key: &str, body: F) -> Result<T, Error>
    where
        F: FnOnce(Arc<dyn ShardBackend>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let shard_id = self.shard_for_key(key)?;
        self.transaction_on_shard(shard_id, body).await
    }

    /// Apply a migration script to every shard, in id order. A failure on
    /// one shard does not prevent attempting the rest; all outcomes are
    /// returned for the caller to act on.
    pub async fn migrate_all_shards(&self, script_path: &str) -> Vec<(usize, Result<(), Error>)> {
        let mut results = Vec::with_capacity(self.inner.shards.len());
        for (shard_id, shard) in self.inner.shards.iter().enumerate() {
            results.push((shard_id, shard.migrate(script_path).await));
        }
        results
    }

    pub async fn check_shard_status(&self) -> Vec<ShardStatus> {
        let mut statuses = Vec::with_capacity(self.inner.shards.len());
        for (shard_id, shard) in self.inner.shards.iter().enumerate() {
            statuses.push(ShardStatus {
                shard_id,
                healthy: shard.ping().await.is_ok(),
            });
        }
        statuses
    }

    pub fn get_shard_stats(&self) -> Vec<ShardStats> {
        self.inner
            .counters
            .iter()
            .enumerate()
            .map(|(shard_id, counters)| ShardStats {
                shard_id,
                queries: counters.queries.load(Ordering::Relaxed),
                errors: counters.errors.load(Ordering::Relaxed),
            })
            .collect()
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    fn backend(&self, shard_id: usize) -> Result<Arc<dyn ShardBackend>, Error> {
        self.inner
            .shards
            .get(shard_id)
            .cloned()
            .ok_or(Error::ShardUnavailable(shard_id))
    }

    fn guard_open(&self) -> Result<(), Error> {
        if self.inner.closed.load(Ordering::Relaxed) {
            return Err(Error::Transient("shard router is closed".into()));
        }
        Ok(())
    }

    fn record(&self, shard_id: usize, failed: bool) {
        if let Some(counters) = self.inner.counters.get(shard_id) {
            counters.queries.fetch_add(1, Ordering::Relaxed);
            if failed {
                counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(telemetry) = &self.inner.telemetry {
            telemetry.incr("shard_router.query", 1.0);
            if failed {
                telemetry.incr("shard_router.error", 1.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShardRouterConfig;
    use crate::hashing::HashFunction;
    use crate::strategy::StrategyConfig;
    use std::sync::Mutex;

    struct FakeBackend {
        id: usize,
        rows: Vec<Row>,
        fail_query: bool,
        in_transaction: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl ShardBackend for FakeBackend {
        async fn query(&self, _stmt: &str, _params: &[Value]) -> Result<Vec<Row>, Error> {
            if self.fail_query {
                return Err(Error::Transient(format!("shard {} down", self.id)));
            }
            Ok(self.rows.clone())
        }

        async fn begin(&self) -> Result<(), Error> {
            *self.in_transaction.lock().unwrap() = true;
            Ok(())
        }

        async fn commit(&self) -> Result<(), Error> {
            *self.in_transaction.lock().unwrap() = false;
            Ok(())
        }

        async fn rollback(&self) -> Result<(), Error> {
            *self.in_transaction.lock().unwrap() = false;
            Ok(())
        }

        async fn ping(&self) -> Result<(), Error> {
            if self.fail_query {
                Err(Error::ShardUnavailable(self.id))
            } else {
                Ok(())
            }
        }

        async fn migrate(&self, _script_path: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn router_with(backends: Vec<Arc<dyn ShardBackend>>) -> ShardRouter {
        let config = ShardRouterConfig {
            strategy: StrategyConfig::Hash { function: HashFunction::Sha1 },
        };
        ShardRouter::new(backends, &config, None).unwrap()
    }

    fn fake(id: usize, fail_query: bool) -> Arc<dyn ShardBackend> {
        Arc::new(FakeBackend {
            id,
            rows: vec![],
            fail_query,
            in_transaction: Mutex::new(false),
        })
    }

    #[tokio::test]
    async fn query_by_key_routes_deterministically() {
        let router = router_with(vec![fake(0, false), fake(1, false), fake(2, false)]);
        let first = router.shard_for_key("account-9").unwrap();
        let second = router.shard_for_key("account-9").unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn query_all_shards_captures_per_shard_failures() {
        let router = router_with(vec![fake(0, false), fake(1, true)]);
        let results = router.query_all_shards("select 1", &[]).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].outcome.is_ok());
        assert!(results[1].outcome.is_err());
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let router = router_with(vec![fake(0, false)]);
        let result: Result<(), Error> = router
            .transaction_on_shard(0, |_shard| async move { Err(Error::ValidationFailed("bad body".into())) })
            .await;
        assert!(result.is_err());
        let stats = router.get_shard_stats();
        assert_eq!(stats[0].errors, 1);
    }

    #[tokio::test]
    async fn closed_router_rejects_new_queries() {
        let router = router_with(vec![fake(0, false)]);
        router.close();
        let err = router.query_on_shard(0, "select 1", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }

    #[tokio::test]
    async fn check_shard_status_reports_unhealthy_shard() {
        let router = router_with(vec![fake(0, false), fake(1, true)]);
        let statuses = router.check_shard_status().await;
        assert!(statuses[0].healthy);
        assert!(!statuses[1].healthy);
    }
}
