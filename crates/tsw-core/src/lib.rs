//! tsw Core Library
//!
//! This library provides the conversion pipeline from long-format telemetry
//! dumps to per-device wide CSV files:
//! - Raw record reading for every source layout
//! - Key dictionary and device registry loading
//! - Value decoding, entity grouping, pivoting, and registry filtering
//! - The per-file and per-folder conversion driver
//! - Exit codes, structured logging, and run summaries
//!
//! The binary entry point is in `main.rs`.

pub mod convert;
pub mod decode;
pub mod exit_codes;
pub mod filter;
pub mod group;
pub mod input;
pub mod keys;
pub mod logging;
pub mod pivot;
pub mod registry;
pub mod summary;

pub use convert::{convert_file, convert_folder, ConvertContext, DeviceWrite, FileReport};
pub use exit_codes::ExitCode;
