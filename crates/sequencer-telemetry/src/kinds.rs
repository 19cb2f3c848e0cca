use std::collections::BTreeMap;

/// The three metric kinds the facade understands. Counters only ever grow;
/// gauges are point-in-time; histograms observe a value against a fixed
/// bucket list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A single recorded value at a point in time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// The shape pushed to subscribers of the live stream (: `metric`,
/// `system_metrics`, `component_metrics` events all use this envelope).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricSample {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub name: String,
    pub timestamp: i64,
    pub value: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}
