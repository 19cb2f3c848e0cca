use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of [`CheckpointMetrics`], the shape exposed to
/// callers and pushed into the telemetry facade.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub checkpoints_created: u64,
    pub checkpoints_loaded: u64,
    pub average_checkpoint_size: f64,
    pub last_checkpoint_duration_ms: u64,
    pub last_load_duration_ms: u64,
    pub recovery_attempts: u64,
    pub successful_recoveries: u64,
}

/// Counters owned by the checkpoint engine (§4.5 "Metrics").
#[derive(Default)]
pub struct CheckpointMetrics {
    checkpoints_created: AtomicU64,
    checkpoints_loaded: AtomicU64,
    total_bytes_written: AtomicU64,
    last_checkpoint_duration_ms: AtomicU64,
    last_load_duration_ms: AtomicU64,
    recovery_attempts: AtomicU64,
    successful_recoveries: AtomicU64,
}

impl CheckpointMetrics {
    pub fn record_created(&self, bytes_written: u64, duration_ms: u64) {
        self.checkpoints_created.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_written.fetch_add(bytes_written, Ordering::Relaxed);
        self.last_checkpoint_duration_ms.store(duration_ms, Ordering::Relaxed);
    }

    pub fn record_recovery_attempt(&self) {
        self.recovery_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loaded(&self, duration_ms: u64) {
        self.checkpoints_loaded.fetch_add(1, Ordering::Relaxed);
        self.successful_recoveries.fetch_add(1, Ordering::Relaxed);
        self.last_load_duration_ms.store(duration_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let created = self.checkpoints_created.load(Ordering::Relaxed);
        let total_bytes = self.total_bytes_written.load(Ordering::Relaxed);
        MetricsSnapshot {
            checkpoints_created: created,
            checkpoints_loaded: self.checkpoints_loaded.load(Ordering::Relaxed),
            average_checkpoint_size: if created == 0 {
                0.0
            } else {
                total_bytes as f64 / created as f64
            },
            last_checkpoint_duration_ms: self.last_checkpoint_duration_ms.load(Ordering::Relaxed),
            last_load_duration_ms: self.last_load_duration_ms.load(Ordering::Relaxed),
            recovery_attempts: self.recovery_attempts.load(Ordering::Relaxed),
            successful_recoveries: self.successful_recoveries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_size_divides_by_created_count() {
        let metrics = CheckpointMetrics::default();
        metrics.record_created(100, 5);
        metrics.record_created(200, 5);
        let snap = metrics.snapshot();
        assert_eq!(snap.checkpoints_created, 2);
        assert_eq!(snap.average_checkpoint_size, 150.0);
    }
}
