/// Windowed latency statistics for one logical model, as returned by
/// [`crate::LatencyTracker::get_stats`].
///
/// All fields are zero when there are no samples in the window — a
/// well-defined, not an error, result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub average_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub sample_count: usize,
    /// Milliseconds since the Unix epoch of the most recent sample, if any.
    pub last_updated_ms: Option<u64>,
}

impl LatencyStats {
    pub const EMPTY: LatencyStats = LatencyStats {
        average_ms: 0.0,
        p50_ms: 0.0,
        p95_ms: 0.0,
        p99_ms: 0.0,
        sample_count: 0,
        last_updated_ms: None,
    };

    /// Computes stats over an already-pruned, ascending-by-timestamp sample
    /// set. `latencies` need not be sorted; percentiles are computed here.
    pub(crate) fn compute(mut latencies: Vec<f64>, last_updated_ms: Option<u64>) -> Self {
        if latencies.is_empty() {
            return Self::EMPTY;
        }
        latencies.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = latencies.iter().sum();
        let count = latencies.len();
        let average_ms = sum / count as f64;

        Self {
            average_ms,
            p50_ms: percentile(&latencies, 0.50),
            p95_ms: percentile(&latencies, 0.95),
            p99_ms: percentile(&latencies, 0.99),
            sample_count: count,
            last_updated_ms,
        }
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_well_defined_zero() {
        let stats = LatencyStats::compute(vec![], None);
        assert_eq!(stats, LatencyStats::EMPTY);
    }

    #[test]
    fn percentiles_over_ten_samples() {
        let latencies: Vec<f64> = (1..=10).map(|n| n as f64 * 100.0).collect();
        let stats = LatencyStats::compute(latencies, Some(42));
        assert_eq!(stats.average_ms, 550.0);
        assert_eq!(stats.p50_ms, 500.0);
        assert_eq!(stats.p95_ms, 1000.0);
        assert_eq!(stats.p99_ms, 1000.0);
        assert_eq!(stats.sample_count, 10);
        assert_eq!(stats.last_updated_ms, Some(42));
    }
}
