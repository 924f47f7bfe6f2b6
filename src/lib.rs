//! qlat library - batch analysis of scheduler/runtime trace logs.
//!
//! Answers, for each logical query in a binary trace file: how much of its
//! wall-clock latency was spent running on CPU, waiting on IO, or starved
//! (ready but not scheduled), and what the tail-latency distribution looks
//! like across all queries.
//!
//! # Modules
//!
//! - [`trace`] - record model and the chronological/correlated dual-view store
//! - [`query`] - per-query reconstruction from the correlated view
//! - [`attribute`] - the CPU/IO/starvation timeline sweep
//! - [`percentile`] - log-domain tail-latency curve
//! - [`window`] - memoized distribution sampling over a percentile sub-range
//! - [`select`] - timestamp/id drill-down lookups for a viewer front-end
//! - [`analyze`] - one-shot load pipeline tying the above together
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use qlat::{Analysis, DEFAULT_TICK_SCALE};
//!
//! let analysis = Analysis::load(Path::new("./query.trace"), DEFAULT_TICK_SCALE)
//!     .expect("failed to load trace");
//! for q in &analysis.queries {
//!     println!("{:x}: {} ns on cpu", q.id, q.cputime_ns);
//! }
//! ```

pub mod analyze;
pub mod attribute;
pub mod percentile;
pub mod query;
pub mod select;
pub mod trace;
pub mod window;

pub use analyze::{Analysis, Summary, DEFAULT_TICK_SCALE};
pub use query::Query;
pub use select::Selection;
pub use trace::{TraceEvent, TraceStore};
pub use window::{WindowSampler, WindowStats};
