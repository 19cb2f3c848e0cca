use crate::analysis::{self, Analysis};
use crate::kinds::{MetricKind, MetricPoint, MetricSample};
use crate::timeframe::Timeframe;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Oldest points are evicted once a series exceeds this many samples.
pub const MAX_POINTS: usize = 1440;

struct Series {
    kind: MetricKind,
    points: VecDeque<MetricPoint>,
    /// Running total for Counter series, so `incr` can be relative.
    cumulative: f64,
}

impl Series {
    fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            points: VecDeque::with_capacity(MAX_POINTS.min(256)),
            cumulative: 0.0,
        }
    }

    fn push(&mut self, timestamp_ms: i64, value: f64) {
        if self.points.len() >= MAX_POINTS {
            self.points.pop_front();
        }
        self.points.push_back(MetricPoint { timestamp_ms, value });
    }
}

/// A named, per-instance metrics registry. No process-wide global:
/// every `BridgeBatcher`, `DisruptorCore`, etc. is handed its own `Registry`
/// (or clones of one `Arc`) the way `gazette::Router` is constructed per
/// client rather than reached for as a singleton.
pub struct Registry {
    series: Mutex<HashMap<String, Series>>,
    tx: broadcast::Sender<MetricSample>,
}

impl Registry {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            series: Mutex::new(HashMap::new()),
            tx,
        }
    }

    /// Subscribe to the live push stream of recorded samples.
    pub fn subscribe(&self) -> broadcast::Receiver<MetricSample> {
        self.tx.subscribe()
    }

    fn record(&self, kind: MetricKind, name: &str, value: f64, metadata: BTreeMap<String, String>) {
        let now = now_ms();
        {
            let mut series = self.series.lock().unwrap();
            let entry = series
                .entry(name.to_string())
                .or_insert_with(|| Series::new(kind));
            entry.push(now, value);
        }
        // Best-effort: a push with no subscribers is not an error.
        let _ = self.tx.send(MetricSample {
            kind,
            name: name.to_string(),
            timestamp: now,
            value,
            metadata,
        });
    }

    /// Increment a counter by `delta` and record the new cumulative value.
    pub fn incr(&self, name: &str, delta: f64) {
        self.incr_with(name, delta, BTreeMap::new())
    }

    pub fn incr_with(&self, name: &str, delta: f64, metadata: BTreeMap<String, String>) {
        let cumulative = {
            let mut series = self.series.lock().unwrap();
            let entry = series
                .entry(name.to_string())
                .or_insert_with(|| Series::new(MetricKind::Counter));
            entry.cumulative += delta;
            entry.cumulative
        };
        self.record(MetricKind::Counter, name, cumulative, metadata);
    }

    /// Set a gauge to an absolute value.
    pub fn gauge(&self, name: &str, value: f64) {
        self.gauge_with(name, value, BTreeMap::new())
    }

    pub fn gauge_with(&self, name: &str, value: f64, metadata: BTreeMap<String, String>) {
        self.record(MetricKind::Gauge, name, value, metadata);
    }

    /// Observe a value into a histogram series (bucketing is done at query
    /// time by `analyze`, not at observation time — this keeps the hot path
    /// a single push).
    pub fn observe(&self, name: &str, value: f64) {
        self.observe_with(name, value, BTreeMap::new())
    }

    pub fn observe_with(&self, name: &str, value: f64, metadata: BTreeMap<String, String>) {
        self.record(MetricKind::Histogram, name, value, metadata);
    }

    /// Raw points newer than `now - timeframe.window()`.
    pub fn query(&self, name: &str, timeframe: Timeframe) -> Vec<MetricPoint> {
        let series = self.series.lock().unwrap();
        let Some(entry) = series.get(name) else {
            return Vec::new();
        };
        let cutoff = now_ms() - timeframe.window_ms();
        entry
            .points
            .iter()
            .filter(|p| p.timestamp_ms >= cutoff)
            .cloned()
            .collect()
    }

    pub fn analyze(&self, name: &str, timeframe: Timeframe) -> Option<Analysis> {
        let points = self.query(name, timeframe);
        analysis::analyze(&points)
    }

    /// Latest recorded value of a gauge/counter series, if any.
    pub fn latest(&self, name: &str) -> Option<f64> {
        let series = self.series.lock().unwrap();
        series.get(name).and_then(|s| s.points.back()).map(|p| p.value)
    }

    pub fn names(&self) -> Vec<String> {
        self.series.lock().unwrap().keys().cloned().collect()
    }

    /// Serialize the whole registry for periodic persistence.
    pub fn to_snapshot(&self) -> serde_json::Value {
        let series = self.series.lock().unwrap();
        let mut out = serde_json::Map::new();
        for (name, s) in series.iter() {
            out.insert(
                name.clone(),
                serde_json::json!({
                    "kind": s.kind,
                    "cumulative": s.cumulative,
                    "points": s.points.iter().collect::<Vec<_>>(),
                }),
            );
        }
        serde_json::Value::Object(out)
    }

    /// Restore state previously produced by `to_snapshot`. Unknown or
    /// malformed entries are skipped rather than treated as fatal, matching
    /// the checkpoint engine's "skip and try older" posture.
    pub fn load_snapshot(&self, value: &serde_json::Value) {
        let Some(obj) = value.as_object() else {
            return;
        };
        let mut series = self.series.lock().unwrap();
        for (name, entry) in obj {
            let Some(kind) = entry
                .get("kind")
                .and_then(|k| serde_json::from_value::<MetricKind>(k.clone()).ok())
            else {
                continue;
            };
            let cumulative = entry.get("cumulative").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let points: VecDeque<MetricPoint> = entry
                .get("points")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();
            series.insert(
                name.clone(),
                Series {
                    kind,
                    points,
                    cumulative,
                },
            );
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
