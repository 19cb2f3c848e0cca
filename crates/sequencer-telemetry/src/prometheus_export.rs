use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGaugeVec, Opts, Registry as PromRegistry, TextEncoder};
use std::sync::Mutex;

/// The concrete Prometheus exposition surface backing a `/metrics` route:
/// tps, a latency histogram, queue size (by queue name), a batch size
/// histogram, success/error counters, and per-component up/down status.
///
/// This sits alongside (not instead of) the generic [`crate::Registry`]:
/// the generic registry serves the JSON query/analysis endpoints, this
/// serves the scrape endpoint, the same split `crates/metrics`'s
/// `prometheus` dependency anticipates for this workspace's own dashboards.
pub struct PrometheusExporter {
    registry: PromRegistry,
    tps: IntCounter,
    success_total: IntCounter,
    error_total: IntCounter,
    latency_ms: Histogram,
    batch_size: Histogram,
    queue_size: IntGaugeVec,
    component_status: IntGaugeVec,
    component_names: Mutex<Vec<String>>,
}

impl PrometheusExporter {
    pub fn new() -> Self {
        let registry = PromRegistry::new();

        let tps = IntCounter::new("sequencer_operations_total", "Total operations accepted").unwrap();
        let success_total = IntCounter::new("sequencer_operations_succeeded_total", "Total operations that succeeded").unwrap();
        let error_total = IntCounter::new("sequencer_operations_failed_total", "Total operations that failed").unwrap();
        let latency_ms = Histogram::with_opts(HistogramOpts::new(
            "sequencer_operation_latency_ms",
            "Operation end-to-end latency in milliseconds",
        ).buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 30000.0]))
        .unwrap();
        let batch_size = Histogram::with_opts(HistogramOpts::new(
            "sequencer_batch_size",
            "Number of operations selected into a dispatched batch",
        ).buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0]))
        .unwrap();
        let queue_size = IntGaugeVec::new(
            Opts::new("sequencer_queue_size", "Pending operations per priority queue"),
            &["kind", "priority"],
        )
        .unwrap();
        let component_status = IntGaugeVec::new(
            Opts::new("sequencer_component_status", "1 if the named component is healthy, else 0"),
            &["component"],
        )
        .unwrap();

        registry.register(Box::new(tps.clone())).unwrap();
        registry.register(Box::new(success_total.clone())).unwrap();
        registry.register(Box::new(error_total.clone())).unwrap();
        registry.register(Box::new(latency_ms.clone())).unwrap();
        registry.register(Box::new(batch_size.clone())).unwrap();
        registry.register(Box::new(queue_size.clone())).unwrap();
        registry.register(Box::new(component_status.clone())).unwrap();

        Self {
            registry,
            tps,
            success_total,
            error_total,
            latency_ms,
            batch_size,
            queue_size,
            component_status,
            component_names: Mutex::new(Vec::new()),
        }
    }

    pub fn record_accepted(&self) {
        self.tps.inc();
    }

    pub fn record_success(&self, latency_ms: f64) {
        self.success_total.inc();
        self.latency_ms.observe(latency_ms);
    }

    pub fn record_error(&self) {
        self.error_total.inc();
    }

    pub fn record_batch(&self, size: usize) {
        self.batch_size.observe(size as f64);
    }

    pub fn set_queue_size(&self, kind: &str, priority: u32, size: i64) {
        self.queue_size
            .with_label_values(&[kind, &priority.to_string()])
            .set(size);
    }

    pub fn set_component_status(&self, component: &str, healthy: bool) {
        self.component_status
            .with_label_values(&[component])
            .set(if healthy { 1 } else { 0 });
        let mut names = self.component_names.lock().unwrap();
        if !names.iter().any(|n| n == component) {
            names.push(component.to_string());
        }
    }

    /// Render the full exposition text for a scrape.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf).unwrap();
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for PrometheusExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metrics() {
        let exporter = PrometheusExporter::new();
        exporter.record_accepted();
        exporter.record_success(12.5);
        exporter.set_component_status("bridge", true);

        let text = exporter.render();
        assert!(text.contains("sequencer_operations_total"));
        assert!(text.contains("sequencer_operation_latency_ms"));
        assert!(text.contains("sequencer_component_status"));
    }
}
