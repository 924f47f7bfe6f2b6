//! Drill-down lookups mapping timestamps and query ids back to record
//! positions. Read-only over the store; the mutable cursor state lives in
//! [`Selection`], owned by whoever drives the interaction.

use crate::trace::TraceStore;

/// Index of the chronological record at or before `ts`, clamped into the
/// valid range. `None` only for an empty trace.
pub fn record_at_or_before(store: &TraceStore, ts: i64) -> Option<usize> {
    if store.is_empty() {
        return None;
    }
    let events = store.chronological();
    let idx = events.partition_point(|e| e.ts <= ts);
    Some(idx.saturating_sub(1).min(events.len() - 1))
}

/// Index of the correlated-view record at or before `(key, ts)` in the
/// `(query key, timestamp)` order, clamped into the valid range.
pub fn correlated_at_or_before(store: &TraceStore, key: u64, ts: i64) -> Option<usize> {
    if store.is_empty() {
        return None;
    }
    let events = store.chronological();
    let idx = store
        .correlated_indices()
        .partition_point(|&i| (events[i].query(), events[i].ts) <= (key, ts));
    Some(idx.saturating_sub(1).min(store.len() - 1))
}

/// Mutable drill-down state: which query is being inspected and where the
/// cursors sit in the two views. Passed in by the caller on each
/// interaction rather than held globally, so the core can be driven without
/// any rendering context.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub inspected: Option<u64>,
    pub chrono_cursor: Option<usize>,
    pub correlated_cursor: Option<usize>,
}

impl Selection {
    pub fn inspect(&mut self, key: u64) {
        self.inspected = Some(key);
    }

    /// Resolve a picked timestamp into record cursors in both views. The
    /// correlated cursor only moves when a query is being inspected.
    pub fn select_timestamp(&mut self, store: &TraceStore, ts: i64) {
        self.chrono_cursor = record_at_or_before(store, ts);
        self.correlated_cursor = self
            .inspected
            .and_then(|key| correlated_at_or_before(store, key, ts));
    }
}
