//! Core data types, unit conversion, daily rollups and threshold alerts
//!
//! This crate holds the pure part of the city weather monitor: everything
//! here is deterministic and free of I/O. Fetching, persistence and
//! scheduling live in the sibling crates and plug in through the traits
//! in [`pipeline`].

pub mod alerts;
pub mod pipeline;
pub mod rollups;
pub mod types;
pub mod units;

pub use alerts::*;
pub use pipeline::*;
pub use rollups::*;
pub use types::*;
pub use units::*;
