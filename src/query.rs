//! Query reconstruction from the correlated view.

use serde::Serialize;

use crate::trace::{TraceStore, EVENT_START};

/// One reconstructed logical query and its latency breakdown. Durations are
/// f64 nanoseconds; the breakdown fields are filled in by the timeline
/// attribution pass after reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Query {
    pub id: u64,
    pub latency_ns: f64,
    pub cputime_ns: f64,
    pub iotime_ns: f64,
    pub starvetime_ns: f64,
}

/// Walk the correlated view once and emit one query per START record.
///
/// On a START we take its key and timestamp, then consume the contiguous run
/// of records sharing the key (contiguous by construction of the view); the
/// last record's timestamp closes the query. Latency is the tick delta
/// scaled by `tick_scale` nanoseconds per tick. Keys that never see a START
/// produce nothing.
pub fn reconstruct_queries(store: &TraceStore, tick_scale: f64) -> Vec<Query> {
    let mut queries = Vec::new();
    let n = store.len();
    let mut i = 0;
    while i < n {
        while i < n && store.correlated(i).event != EVENT_START {
            i += 1;
        }
        if i == n {
            break;
        }
        let key = store.correlated(i).query();
        let start_ts = store.correlated(i).ts;
        while i + 1 < n && store.correlated(i + 1).query() == key {
            i += 1;
        }
        let end_ts = store.correlated(i).ts;
        queries.push(Query {
            id: key,
            latency_ns: (end_ts - start_ts) as f64 * tick_scale,
            ..Default::default()
        });
        i += 1;
    }
    queries
}

/// Sort ascending by latency. The percentile curve and the window sampler
/// both index into the set by latency rank.
pub fn sort_by_latency(queries: &mut [Query]) {
    queries.sort_by(|a, b| a.latency_ns.total_cmp(&b.latency_ns));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{TraceEvent, EVENT_IO_BEGIN, EVENT_IO_END, EVENT_SWITCH};

    fn ev(event: u64, id: u64, arg: u64, ts: i64) -> TraceEvent {
        TraceEvent { event, id, arg, ts }
    }

    #[test]
    fn test_single_query_latency() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_START, 7, 0, 0),
            ev(EVENT_SWITCH, 7, 0, 100),
        ]);
        let queries = reconstruct_queries(&store, 1.0);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].id, 7);
        assert_eq!(queries[0].latency_ns, 100.0);
    }

    #[test]
    fn test_latency_scaled_by_ticks() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_START, 7, 0, 0),
            ev(EVENT_SWITCH, 7, 0, 100),
        ]);
        let queries = reconstruct_queries(&store, 0.5);
        assert_eq!(queries[0].latency_ns, 50.0);
    }

    #[test]
    fn test_key_without_start_is_skipped() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_SWITCH, 3, 0, 0),
            ev(EVENT_IO_BEGIN, 3, 9, 10),
            ev(EVENT_IO_END, 3, 9, 20),
        ]);
        assert!(reconstruct_queries(&store, 1.0).is_empty());
    }

    #[test]
    fn test_multiple_queries() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_START, 1, 0, 0),
            ev(EVENT_START, 2, 0, 5),
            ev(EVENT_SWITCH, 1, 0, 50),
            ev(EVENT_SWITCH, 2, 0, 300),
        ]);
        let mut queries = reconstruct_queries(&store, 1.0);
        assert_eq!(queries.len(), 2);
        sort_by_latency(&mut queries);
        assert_eq!(queries[0].id, 1);
        assert_eq!(queries[0].latency_ns, 50.0);
        assert_eq!(queries[1].id, 2);
        assert_eq!(queries[1].latency_ns, 295.0);
    }

    #[test]
    fn test_start_with_no_later_records() {
        // A lone START closes on itself: zero latency, not an error.
        let store = TraceStore::from_events(vec![ev(EVENT_START, 4, 0, 25)]);
        let queries = reconstruct_queries(&store, 1.0);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].latency_ns, 0.0);
    }

    #[test]
    fn test_latency_non_negative() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_SWITCH, 8, 0, 10),
            ev(EVENT_START, 8, 0, 40),
            ev(EVENT_SWITCH, 8, 0, 90),
        ]);
        let queries = reconstruct_queries(&store, 1.0);
        for q in &queries {
            assert!(q.latency_ns >= 0.0);
        }
    }

    #[test]
    fn test_empty_trace_yields_no_queries() {
        let store = TraceStore::from_events(Vec::new());
        assert!(reconstruct_queries(&store, 1.0).is_empty());
    }
}
