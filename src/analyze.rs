//! Load-time orchestration: ingest a trace and derive every immutable
//! analysis structure in one synchronous batch pass.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::attribute::attribute_queries;
use crate::percentile::{build_curve, PercentileCurve};
use crate::query::{reconstruct_queries, sort_by_latency, Query};
use crate::trace::TraceStore;

/// Default nanoseconds-per-tick calibration, measured offline by racing the
/// TSC against the wall clock on the capture host. Override with
/// `--tick-scale` when analyzing traces from other hardware.
pub const DEFAULT_TICK_SCALE: f64 = 0.2941171840072451;

/// Immutable analysis snapshot: the record store plus everything derived
/// from it at load. Safe to share read-only with any number of observers;
/// the only mutable interaction state (window sampler, selection cursors)
/// lives outside this struct.
pub struct Analysis {
    pub store: TraceStore,
    /// Queries sorted ascending by latency.
    pub queries: Vec<Query>,
    pub curve: PercentileCurve,
    pub tick_scale: f64,
}

impl Analysis {
    /// Map the trace file and run the whole derivation pipeline. Either the
    /// full load succeeds or no derived data is produced.
    pub fn load(path: &Path, tick_scale: f64) -> Result<Self> {
        let store = TraceStore::open(path)?;
        Ok(Self::from_store(store, tick_scale))
    }

    /// Derive everything from an already-built store.
    pub fn from_store(store: TraceStore, tick_scale: f64) -> Self {
        let mut queries = reconstruct_queries(&store, tick_scale);
        attribute_queries(&store, &mut queries, tick_scale);
        sort_by_latency(&mut queries);
        let curve = build_curve(&queries);
        Analysis {
            store,
            queries,
            curve,
            tick_scale,
        }
    }

    pub fn query_by_id(&self, id: u64) -> Option<&Query> {
        self.queries.iter().find(|q| q.id == id)
    }

    /// Whole-trace summary, averages in milliseconds for display.
    pub fn summary(&self) -> Summary {
        let count = self.queries.len() as f64;
        let mut summary = Summary {
            records: self.store.len(),
            queries: self.queries.len(),
            ..Default::default()
        };
        for q in &self.queries {
            summary.avg_cputime_ms += q.cputime_ns / count / 1e6;
            summary.avg_iotime_ms += q.iotime_ns / count / 1e6;
            summary.avg_starvetime_ms += q.starvetime_ns / count / 1e6;
            summary.avg_latency_ms += q.latency_ns / count / 1e6;
        }
        if let Some(last) = self.queries.last() {
            summary.max_latency_ms = last.latency_ns / 1e6;
        }
        summary
    }
}

/// Whole-trace aggregate statistics.
#[derive(Debug, Default, Serialize)]
pub struct Summary {
    pub records: usize,
    pub queries: usize,
    pub avg_cputime_ms: f64,
    pub avg_starvetime_ms: f64,
    pub avg_iotime_ms: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
}
