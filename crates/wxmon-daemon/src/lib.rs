//! City weather monitor daemon
//!
//! Wires the configured fetcher, aggregator and store into a cancellable
//! polling scheduler, and serves the results over HTTP.

pub mod config;
pub mod scheduler;

pub use config::DaemonConfig;
pub use scheduler::{CycleReport, Scheduler, SchedulerState};
