//! tsw common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the tsw crates:
//! - Entity and run identity types
//! - Raw and resolved telemetry records with a typed value
//! - Common error types and batch results
//! - CLI payload formats

pub mod error;
pub mod id;
pub mod output;
pub mod value;

pub use error::{
    format_batch_human, format_error_human, BatchResult, Error, ErrorCategory, ErrorScope, Result,
    StructuredError, SuggestedAction,
};
pub use id::{EntityId, RunId};
pub use output::OutputFormat;
pub use value::{KeyRef, RawRecord, ResolvedRecord, Value, ValueSlot};

/// Schema version for JSON payloads emitted by the CLI.
pub const SCHEMA_VERSION: &str = "1.0.0";
