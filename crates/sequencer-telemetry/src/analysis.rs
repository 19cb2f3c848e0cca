use crate::kinds::MetricPoint;

/// Summary statistics over a slice of points.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Analysis {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub stddev: f64,
}

/// Computes count/min/max/mean/median/p95/p99/stddev over `points`.
/// Returns `None` for an empty slice.
pub fn analyze(points: &[MetricPoint]) -> Option<Analysis> {
    if points.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = points.iter().map(|p| p.value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let count = values.len();
    let min = values[0];
    let max = values[count - 1];
    let mean = values.iter().sum::<f64>() / count as f64;
    let median = percentile(&values, 0.5);
    let p95 = percentile(&values, 0.95);
    let p99 = percentile(&values, 0.99);

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let stddev = variance.sqrt();

    Some(Analysis {
        count,
        min,
        max,
        mean,
        median,
        p95,
        p99,
        stddev,
    })
}

/// Nearest-rank percentile over an already-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
