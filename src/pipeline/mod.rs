//! Scan pipeline.
//!
//! - `diff`: separate new listings from already-notified ones
//! - `cycle`: fetch, diff, notify and commit once
//! - `schedule`: repeat cycles on an interval until shutdown

pub mod cycle;
pub mod diff;
pub mod schedule;

pub use cycle::{CycleOptions, CycleReport, Orchestrator, SourceReport};
pub use diff::{DiffResult, select_new};
pub use schedule::{run_loop, shutdown_channel, shutdown_signal};
