//! Windowed distribution sampling over a percentile sub-range.
//!
//! The window is driven by the visualization side every frame, so results
//! are memoized against the last-seen index bounds: an unchanged window
//! returns the cached statistics without touching the query set.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::percentile::rank_index;
use crate::query::Query;

/// Number of uniform quantile positions each CDF is resampled at.
pub const CDF_POINTS: usize = 1024;

/// Averages and sorted-CDF resamples for one percentile window. Durations in
/// f64 nanoseconds, CDFs indexed by `cdf_positions()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowStats {
    /// Inclusive index bounds into the latency-sorted query set.
    pub first: usize,
    pub last: usize,
    pub avg_cputime_ns: f64,
    pub avg_iotime_ns: f64,
    pub avg_starvetime_ns: f64,
    pub avg_latency_ns: f64,
    pub cputime_cdf: Vec<f64>,
    pub iotime_cdf: Vec<f64>,
    pub starvetime_cdf: Vec<f64>,
    pub latency_cdf: Vec<f64>,
}

/// The uniform quantile positions `k / CDF_POINTS` shared by all four CDFs,
/// usable directly as a plotting x-axis.
pub fn cdf_positions() -> Vec<f64> {
    (0..CDF_POINTS)
        .map(|k| k as f64 / CDF_POINTS as f64)
        .collect()
}

/// Memoizing sampler. One per viewer; last write wins, no locking.
#[derive(Debug, Default)]
pub struct WindowSampler {
    cached: Option<WindowStats>,
}

impl WindowSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the window `[x1, x2]`, given in the same rank domain as the
    /// percentile curve. Returns the cached result untouched when the
    /// resolved index bounds match the previous call.
    ///
    /// An empty query set or an inverted window is an input error, never a
    /// silent division by zero.
    pub fn sample(&mut self, queries: &[Query], x1: f64, x2: f64) -> Result<&WindowStats> {
        if queries.is_empty() {
            bail!("cannot sample a percentile window over an empty query set");
        }
        let w1 = rank_index(queries.len(), x1);
        let w2 = rank_index(queries.len(), x2);
        if w1 > w2 {
            bail!("inverted percentile window: index {w1} > index {w2}");
        }
        let hit = matches!(&self.cached, Some(c) if c.first == w1 && c.last == w2);
        if !hit {
            self.cached = Some(compute_window(queries, w1, w2));
        }
        Ok(self.cached.as_ref().unwrap())
    }

    /// Whether a result is currently cached (test hook).
    pub fn cached_bounds(&self) -> Option<(usize, usize)> {
        self.cached.as_ref().map(|c| (c.first, c.last))
    }
}

fn compute_window(queries: &[Query], w1: usize, w2: usize) -> WindowStats {
    let slice = &queries[w1..=w2];
    let count = slice.len() as f64;

    let mut stats = WindowStats {
        first: w1,
        last: w2,
        ..Default::default()
    };

    let mut cputimes = Vec::with_capacity(slice.len());
    let mut iotimes = Vec::with_capacity(slice.len());
    let mut starvetimes = Vec::with_capacity(slice.len());
    let mut latencies = Vec::with_capacity(slice.len());
    for q in slice {
        stats.avg_cputime_ns += q.cputime_ns / count;
        stats.avg_iotime_ns += q.iotime_ns / count;
        stats.avg_starvetime_ns += q.starvetime_ns / count;
        stats.avg_latency_ns += q.latency_ns / count;
        cputimes.push(q.cputime_ns);
        iotimes.push(q.iotime_ns);
        starvetimes.push(q.starvetime_ns);
        latencies.push(q.latency_ns);
    }

    cputimes.sort_by(f64::total_cmp);
    iotimes.sort_by(f64::total_cmp);
    starvetimes.sort_by(f64::total_cmp);
    latencies.sort_by(f64::total_cmp);

    stats.cputime_cdf = resample(&cputimes);
    stats.iotime_cdf = resample(&iotimes);
    stats.starvetime_cdf = resample(&starvetimes);
    stats.latency_cdf = resample(&latencies);
    stats
}

/// Nearest-rank resample of a sorted array at the uniform quantile
/// positions. Empty input yields an empty sequence.
fn resample(sorted: &[f64]) -> Vec<f64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    (0..CDF_POINTS)
        .map(|k| {
            let p = k as f64 / CDF_POINTS as f64;
            let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
            sorted[idx]
        })
        .collect()
}
