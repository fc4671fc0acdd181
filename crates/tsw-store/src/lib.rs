//! tsw output storage.
//!
//! This crate provides:
//! - The per-entity wide table
//! - The schema governor (denylist, column order, row order)
//! - Per-device CSV reading and writing
//! - The merge decision (`FileState` → `WriteStrategy`) and its executors
//! - The `TableSink` seam consumed by the conversion driver

pub mod codec;
pub mod schema;
pub mod sink;
pub mod strategy;
pub mod table;
pub mod writer;

pub use schema::{govern, is_governed, TS_COLUMN};
pub use sink::{CsvDirSink, TableSink};
pub use strategy::{choose_strategy, inspect, FileState, WriteStrategy};
pub use table::{WideRow, WideTable};
pub use writer::{atomic_rename, write_table, WriteOutcome};

/// File extension of per-device output files.
pub const OUTPUT_EXTENSION: &str = "csv";
