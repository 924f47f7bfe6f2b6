//! Trace file ingestion and the dual-view record store.
//!
//! A trace is a flat, headerless sequence of fixed-width records written in
//! native byte order by the runtime's scheduler instrumentation. The store
//! keeps the on-disk chronological order as-is (zero-copy off a memory map)
//! and builds one permutation index sorted by `(correlation key, timestamp)`
//! so that all records belonging to one query are contiguous.

use std::fs::File;
use std::mem;
use std::ops::Range;
use std::path::Path;

use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use plain::Plain;

pub const EVENT_SWITCH: u64 = 0;
pub const EVENT_START: u64 = 1;
pub const EVENT_RCS: u64 = 3;
pub const EVENT_IO_BEGIN: u64 = 4;
pub const EVENT_IO_END: u64 = 5;
pub const EVENT_PERMIT: u64 = 0xa;
pub const EVENT_ES: u64 = 0xb;

/// Reason strings for the admission control (RCS) decision codes 0-4.
const RCS_REASONS: [&str; 5] = [
    "admitted immediately",
    "queued because of non-empty ready",
    "queued because of used permits",
    "queued because of memory resources",
    "queued because of count resources",
];

/// One on-disk trace record. The layout matches what the runtime appends to
/// the trace file, 32 bytes per record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceEvent {
    pub event: u64,
    pub id: u64,
    pub arg: u64,
    pub ts: i64,
}

unsafe impl Plain for TraceEvent {}

pub const RECORD_SIZE: usize = mem::size_of::<TraceEvent>();

impl TraceEvent {
    /// The correlation key grouping this record into a logical query.
    ///
    /// START, PERMIT and ES records carry the query id in `arg` (the `id`
    /// field on those holds a scheduler-internal handle); everything else is
    /// already keyed by `id`. A zero `arg` means the scheduler had no query
    /// id to attach, so fall back to `id`. This is a pure function of the
    /// record's own fields, no external state involved.
    pub fn query(&self) -> u64 {
        match self.event {
            EVENT_START | EVENT_PERMIT | EVENT_ES if self.arg != 0 => self.arg,
            _ => self.id,
        }
    }

    /// Human-readable description of the record for event log output.
    pub fn describe(&self) -> String {
        match self.event {
            EVENT_SWITCH => format!("{:10}", "SWITCH"),
            EVENT_START => format!("{:10}", "START"),
            EVENT_PERMIT => format!("{:10}", "PERMIT"),
            EVENT_ES => format!("{:10}", "ES"),
            EVENT_RCS => {
                let reason = RCS_REASONS
                    .get(self.arg as usize)
                    .copied()
                    .unwrap_or("unknown reason");
                format!("{:10} {}", "RCS", reason)
            }
            EVENT_IO_BEGIN => format!("{:10} {:16x}", "IO_BEGIN", self.arg),
            EVENT_IO_END => format!("{:10} {:16x}", "IO_END", self.arg),
            other => format!("UNKNOWN ({other})"),
        }
    }
}

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Owned(Vec<TraceEvent>),
}

impl Backing {
    fn events(&self) -> &[TraceEvent] {
        match self {
            // Length and alignment were validated when the map was taken.
            Backing::Mapped(mmap) => {
                plain::slice_from_bytes(&mmap[..]).expect("trace map was validated at open")
            }
            Backing::Owned(events) => events,
        }
    }
}

/// Immutable record store with the two views every downstream component
/// works from. Built once at load, never mutated afterwards.
#[derive(Debug)]
pub struct TraceStore {
    backing: Backing,
    /// Indices into the chronological slice, sorted by `(query key, ts)`.
    correlated: Vec<usize>,
}

impl TraceStore {
    /// Memory-map a trace file. Fails with the underlying OS error if the
    /// file cannot be opened or mapped, and before any processing if the
    /// file size is not a whole number of records. An empty file is valid.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open trace file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("failed to stat trace file {}", path.display()))?
            .len();
        if len % RECORD_SIZE as u64 != 0 {
            bail!(
                "truncated trace {}: {} bytes is not a multiple of the {}-byte record size",
                path.display(),
                len,
                RECORD_SIZE
            );
        }
        if len == 0 {
            // A zero-length file cannot be mapped but is a valid trace.
            return Ok(Self::build(Backing::Owned(Vec::new())));
        }
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to map trace file {}", path.display()))?;
        Ok(Self::build(Backing::Mapped(mmap)))
    }

    /// Build a store over an owned record vector. Used by tests and by
    /// callers that already have records in memory.
    pub fn from_events(events: Vec<TraceEvent>) -> Self {
        Self::build(Backing::Owned(events))
    }

    fn build(backing: Backing) -> Self {
        let correlated = {
            let events = backing.events();
            let mut perm: Vec<usize> = (0..events.len()).collect();
            // Stable sort keyed on (query, ts) gives a total order across
            // equal keys, not just a stable shuffle of input order.
            perm.sort_by_key(|&i| (events[i].query(), events[i].ts));
            perm
        };
        TraceStore {
            backing,
            correlated,
        }
    }

    pub fn len(&self) -> usize {
        self.backing.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backing.events().is_empty()
    }

    /// The chronological view, in original on-disk order. Timestamps are
    /// assumed non-decreasing.
    pub fn chronological(&self) -> &[TraceEvent] {
        self.backing.events()
    }

    /// The permutation behind the correlated view.
    pub fn correlated_indices(&self) -> &[usize] {
        &self.correlated
    }

    /// Record at position `i` of the correlated view.
    pub fn correlated(&self, i: usize) -> &TraceEvent {
        &self.backing.events()[self.correlated[i]]
    }

    /// Correlated-view index range of all records sharing `key`. The view is
    /// sorted by key so the range is contiguous; it is empty for a key that
    /// never appears.
    pub fn correlated_range(&self, key: u64) -> Range<usize> {
        let events = self.backing.events();
        let lo = self
            .correlated
            .partition_point(|&i| events[i].query() < key);
        let hi = self
            .correlated
            .partition_point(|&i| events[i].query() <= key);
        lo..hi
    }

    /// Chronological index range of records with `start_ts <= ts <= end_ts`,
    /// found by a binary-search bracket on the time-ordered view.
    pub fn chrono_window(&self, start_ts: i64, end_ts: i64) -> Range<usize> {
        let events = self.backing.events();
        let lo = events.partition_point(|e| e.ts < start_ts);
        let hi = events.partition_point(|e| e.ts <= end_ts);
        lo..hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(event: u64, id: u64, arg: u64, ts: i64) -> TraceEvent {
        TraceEvent { event, id, arg, ts }
    }

    #[test]
    fn test_record_size() {
        assert_eq!(RECORD_SIZE, 32);
    }

    #[test]
    fn test_query_key_uses_arg_for_start_permit_es() {
        assert_eq!(ev(EVENT_START, 5, 7, 0).query(), 7);
        assert_eq!(ev(EVENT_PERMIT, 5, 7, 0).query(), 7);
        assert_eq!(ev(EVENT_ES, 5, 7, 0).query(), 7);
    }

    #[test]
    fn test_query_key_uses_id_otherwise() {
        assert_eq!(ev(EVENT_SWITCH, 5, 7, 0).query(), 5);
        assert_eq!(ev(EVENT_RCS, 5, 2, 0).query(), 5);
        assert_eq!(ev(EVENT_IO_BEGIN, 5, 9, 0).query(), 5);
        assert_eq!(ev(EVENT_IO_END, 5, 9, 0).query(), 5);
    }

    #[test]
    fn test_query_key_zero_arg_falls_back_to_id() {
        assert_eq!(ev(EVENT_START, 7, 0, 0).query(), 7);
        assert_eq!(ev(EVENT_ES, 7, 0, 0).query(), 7);
    }

    #[test]
    fn test_correlated_view_sorted_by_key_then_ts() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_START, 0, 2, 10),
            ev(EVENT_SWITCH, 1, 0, 20),
            ev(EVENT_SWITCH, 2, 0, 30),
            ev(EVENT_SWITCH, 1, 0, 40),
            ev(EVENT_SWITCH, 2, 0, 50),
        ]);
        for i in 1..store.len() {
            let prev = store.correlated(i - 1);
            let cur = store.correlated(i);
            assert!((prev.query(), prev.ts) <= (cur.query(), cur.ts));
        }
    }

    #[test]
    fn test_correlated_range_contiguous() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_SWITCH, 2, 0, 0),
            ev(EVENT_START, 9, 1, 5),
            ev(EVENT_SWITCH, 2, 0, 10),
            ev(EVENT_SWITCH, 1, 0, 15),
            ev(EVENT_SWITCH, 2, 0, 20),
        ]);
        let range = store.correlated_range(2);
        assert_eq!(range.len(), 3);
        for i in range {
            assert_eq!(store.correlated(i).query(), 2);
        }
        assert!(store.correlated_range(42).is_empty());
    }

    #[test]
    fn test_chrono_window_brackets_timestamps() {
        let store = TraceStore::from_events(vec![
            ev(EVENT_SWITCH, 1, 0, 0),
            ev(EVENT_SWITCH, 1, 0, 10),
            ev(EVENT_SWITCH, 1, 0, 20),
            ev(EVENT_SWITCH, 1, 0, 30),
        ]);
        assert_eq!(store.chrono_window(10, 20), 1..3);
        assert_eq!(store.chrono_window(0, 30), 0..4);
        assert_eq!(store.chrono_window(35, 40), 4..4);
        assert_eq!(store.chrono_window(-5, -1), 0..0);
    }

    #[test]
    fn test_empty_store() {
        let store = TraceStore::from_events(Vec::new());
        assert!(store.is_empty());
        assert!(store.correlated_range(1).is_empty());
        assert!(store.chrono_window(0, 100).is_empty());
    }

    #[test]
    fn test_describe_rcs_reasons() {
        assert_eq!(
            ev(EVENT_RCS, 1, 0, 0).describe(),
            "RCS        admitted immediately"
        );
        assert_eq!(
            ev(EVENT_RCS, 1, 2, 0).describe(),
            "RCS        queued because of used permits"
        );
        assert_eq!(
            ev(EVENT_RCS, 1, 99, 0).describe(),
            "RCS        unknown reason"
        );
    }

    #[test]
    fn test_store_formats_as_debug() {
        // Error assertions on Result<TraceStore> need the Ok type to be
        // Debug, so the bound is part of the public contract.
        let store = TraceStore::from_events(vec![ev(EVENT_START, 1, 0, 0)]);
        assert!(format!("{store:?}").contains("TraceStore"));
    }

    #[test]
    fn test_describe_unknown_kind() {
        assert_eq!(ev(0x77, 1, 0, 0).describe(), "UNKNOWN (119)");
    }
}
