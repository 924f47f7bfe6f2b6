//! Tail-latency percentile curve over the latency-sorted query set.

use serde::Serialize;

use crate::query::Query;

/// Number of samples along the curve.
pub const CURVE_POINTS: usize = 1001;

/// Upper end of the "1-in-x" rank domain; the curve spans 1 to this value on
/// a log scale.
pub const RANK_DOMAIN_MAX: f64 = 100000.0;

/// Map a rank-domain value `x` ("the 1-in-x worst query") onto an index into
/// a latency-sorted array of `n` queries. Must only be called with `n > 0`.
///
/// Shared by the curve builder and the window sampler so a selection made on
/// the curve lands on exactly the queries the curve showed.
pub fn rank_index(n: usize, x: f64) -> usize {
    debug_assert!(n > 0, "rank_index needs a non-empty query set");
    let w = n.saturating_sub((n as f64 / x).round() as usize);
    w.min(n - 1)
}

/// A log-log tail-latency curve as two parallel plotting arrays. Since the
/// query set is already sorted by latency every sample is an O(1) lookup,
/// no histogram needed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PercentileCurve {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl PercentileCurve {
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// Build the curve from the latency-sorted query set. An empty set yields an
/// empty curve, callers treat that as "no data".
pub fn build_curve(queries: &[Query]) -> PercentileCurve {
    let mut curve = PercentileCurve::default();
    if queries.is_empty() {
        return curve;
    }
    for i in 0..CURVE_POINTS {
        let x = RANK_DOMAIN_MAX.powf(i as f64 / (CURVE_POINTS - 1) as f64);
        let w = rank_index(queries.len(), x);
        curve.xs.push(x);
        curve.ys.push(queries[w].latency_ns);
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::sort_by_latency;

    fn queries_with_latencies(latencies: &[f64]) -> Vec<Query> {
        let mut queries: Vec<Query> = latencies
            .iter()
            .enumerate()
            .map(|(i, &l)| Query {
                id: i as u64 + 1,
                latency_ns: l,
                ..Default::default()
            })
            .collect();
        sort_by_latency(&mut queries);
        queries
    }

    #[test]
    fn test_empty_set_yields_empty_curve() {
        assert!(build_curve(&[]).is_empty());
    }

    #[test]
    fn test_curve_has_fixed_sample_count() {
        let queries = queries_with_latencies(&[1.0, 2.0, 3.0]);
        let curve = build_curve(&queries);
        assert_eq!(curve.len(), CURVE_POINTS);
        assert_eq!(curve.xs[0], 1.0);
        assert!((curve.xs[CURVE_POINTS - 1] - RANK_DOMAIN_MAX).abs() < 1e-6);
    }

    #[test]
    fn test_curve_monotonically_non_decreasing() {
        let queries =
            queries_with_latencies(&[5.0, 1.0, 40.0, 2.0, 2.0, 900.0, 17.0, 3.5, 60.0, 8.0]);
        let curve = build_curve(&queries);
        for i in 1..curve.len() {
            assert!(
                curve.ys[i] >= curve.ys[i - 1],
                "curve dipped at sample {i}: {} < {}",
                curve.ys[i],
                curve.ys[i - 1]
            );
        }
    }

    #[test]
    fn test_curve_endpoints() {
        let queries = queries_with_latencies(&[1.0, 2.0, 3.0, 4.0]);
        let curve = build_curve(&queries);
        // x = 1 is the whole population, so the sample is the minimum.
        assert_eq!(curve.ys[0], 1.0);
        // The far tail saturates at the slowest query.
        assert_eq!(curve.ys[CURVE_POINTS - 1], 4.0);
    }

    #[test]
    fn test_rank_index_bounds() {
        assert_eq!(rank_index(10, 1.0), 0);
        assert_eq!(rank_index(10, 100000.0), 9);
        assert_eq!(rank_index(1, 1.0), 0);
        assert_eq!(rank_index(1, 100000.0), 0);
        // x = 2 picks the median rank.
        assert_eq!(rank_index(10, 2.0), 5);
    }

    #[test]
    #[should_panic(expected = "non-empty query set")]
    fn test_rank_index_rejects_empty_set() {
        rank_index(0, 1.0);
    }

    #[test]
    fn test_rank_index_never_out_of_range() {
        for n in [1usize, 2, 3, 7, 100] {
            for i in 0..CURVE_POINTS {
                let x = RANK_DOMAIN_MAX.powf(i as f64 / (CURVE_POINTS - 1) as f64);
                assert!(rank_index(n, x) < n);
            }
        }
    }
}
