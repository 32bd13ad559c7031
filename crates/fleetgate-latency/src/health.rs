/// Maps a windowed average latency (ms) to a `[0, 100]` health score.
///
/// Piecewise-linear between anchors `(500, 100) -> (1000, 82) -> (2000, 65)
/// -> (3000, 55) -> (5000, 40)`; flat at 100 below 500ms and flat at 30
/// beyond 5s (no upper anchor to interpolate against out there).
///
/// An absence of samples is handled by the caller, which passes `None` and
/// receives the optimistic default of 100 without calling this function.
pub fn health_score(average_ms: f64) -> f64 {
    const ANCHORS: [(f64, f64); 5] = [
        (500.0, 100.0),
        (1000.0, 82.0),
        (2000.0, 65.0),
        (3000.0, 55.0),
        (5000.0, 40.0),
    ];

    if average_ms <= ANCHORS[0].0 {
        return ANCHORS[0].1;
    }
    if average_ms > ANCHORS[ANCHORS.len() - 1].0 {
        return 30.0;
    }

    for window in ANCHORS.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if average_ms <= x1 {
            let t = (average_ms - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    unreachable!("average_ms bounds are checked above")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_return_exact_values() {
        assert_eq!(health_score(0.0), 100.0);
        assert_eq!(health_score(500.0), 100.0);
        assert_eq!(health_score(1000.0), 82.0);
        assert_eq!(health_score(2000.0), 65.0);
        assert_eq!(health_score(3000.0), 55.0);
        assert_eq!(health_score(5000.0), 40.0);
    }

    #[test]
    fn beyond_five_seconds_floors_at_thirty() {
        assert_eq!(health_score(5001.0), 30.0);
        assert_eq!(health_score(60_000.0), 30.0);
    }

    #[test]
    fn midpoints_interpolate_linearly() {
        assert_eq!(health_score(750.0), 91.0);
        assert_eq!(health_score(1500.0), 73.5);
        assert_eq!(health_score(4000.0), 47.5);
    }
}
