//! Timeline attribution: split each query's latency into CPU, IO and
//! starvation time by sweeping the chronological view.
//!
//! The sweep window for a query is the minimal chronological bracket that
//! covers the query's correlated span, so the overall cost is bounded by how
//! much queries overlap in time rather than by the whole trace length.

use tracing::warn;

use crate::query::Query;
use crate::trace::{TraceStore, EVENT_IO_BEGIN, EVENT_IO_END};

/// Run the attribution sweep for every reconstructed query.
pub fn attribute_queries(store: &TraceStore, queries: &mut [Query], tick_scale: f64) {
    for query in queries.iter_mut() {
        attribute_one(store, query, tick_scale);
    }
}

/// Sweep one query's time window.
///
/// State: `cpu` starts true (the query is assumed running until another
/// query's record shows up), `iostack` counts open IO regions belonging to
/// this query. For each record the elapsed delta since the previous record
/// is attributed first, then the record updates the state:
///
/// - starvation accrues iff no IO is pending and the query is off CPU
/// - CPU time accrues iff `cpu`
/// - IO time accrues iff `iostack > 0`
///
/// CPU and IO can both accrue for the same interval (CPU busy issuing IO);
/// that matches the accounting of the runtime that writes these traces.
/// A record of a different query marks this one descheduled; its own
/// pending IO keeps accumulating while off CPU.
fn attribute_one(store: &TraceStore, query: &mut Query, tick_scale: f64) {
    let range = store.correlated_range(query.id);
    if range.is_empty() {
        return;
    }
    let start_ts = store.correlated(range.start).ts;
    let end_ts = store.correlated(range.end - 1).ts;
    let window = store.chrono_window(start_ts, end_ts);

    let mut cpu = true;
    let mut iostack: u64 = 0;
    let mut prev_ts = start_ts;
    let mut cputime: i64 = 0;
    let mut iotime: i64 = 0;
    let mut starvetime: i64 = 0;
    let mut underflows: u64 = 0;

    for e in &store.chronological()[window] {
        let dt = e.ts - prev_ts;
        if iostack == 0 && !cpu {
            starvetime += dt;
        }
        if cpu {
            cputime += dt;
        }
        if iostack > 0 {
            iotime += dt;
        }
        if e.query() == query.id {
            if e.event != EVENT_IO_END {
                cpu = true;
            }
            if e.event == EVENT_IO_BEGIN {
                iostack += 1;
            } else if e.event == EVENT_IO_END {
                if iostack == 0 {
                    // Malformed trace: an IO_END with no open region. Clamp
                    // and keep going, the query's stats just degrade.
                    underflows += 1;
                } else {
                    iostack -= 1;
                }
            }
        } else {
            cpu = false;
        }
        prev_ts = e.ts;
    }

    if underflows > 0 {
        warn!(
            query = query.id,
            count = underflows,
            "IO_END without matching IO_BEGIN, clamped IO nesting at zero"
        );
    }

    query.cputime_ns = cputime as f64 * tick_scale;
    query.iotime_ns = iotime as f64 * tick_scale;
    query.starvetime_ns = starvetime as f64 * tick_scale;
}
