//! Error types for tsw.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Scope: whether an error aborts one input file or the whole run
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Missing Key Mapping
//!   Reason: key id 25 is not present in the key dictionary
//!   Fix: Re-export the ts_kv_dictionary table and pass it with --keys.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 20,
//!   "category": "data",
//!   "scope": "file",
//!   "message": "key id 25 is not present in the key dictionary",
//!   "suggested_action": "fix_input",
//!   "context": { "key_id": 25 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::value::ValueSlot;

/// Result type alias for tsw operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and collaborator inputs (registry, keys, denylist).
    Config,
    /// Telemetry content that cannot be decoded.
    Data,
    /// Output schema conflicts.
    Schema,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Schema => write!(f, "schema"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// How far an error propagates in folder mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Abort the affected input file, continue with the next one.
    File,
    /// Abort the whole run; no useful partial result exists.
    Run,
}

impl std::fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorScope::File => write!(f, "file"),
            ErrorScope::Run => write!(f, "run"),
        }
    }
}

/// Suggested follow-up for automation driving the converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Correct the configuration or collaborator files.
    FixConfig,
    /// Correct or re-export the input dump.
    FixInput,
    /// Retry the operation (transient condition).
    Retry,
    /// Skip this item and continue.
    Skip,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for tsw.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid denylist: {0}")]
    InvalidDenylist(String),

    #[error("cannot load device registry {}: {message}", .path.display())]
    RegistryLoad { path: PathBuf, message: String },

    #[error("cannot load key dictionary {}: {message}", .path.display())]
    KeyDictionaryLoad { path: PathBuf, message: String },

    // Data errors (20-29)
    #[error("key id {key_id} is not present in the key dictionary")]
    MissingKeyMapping { key_id: i64 },

    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: u64, message: String },

    #[error("malformed {slot} value {raw:?}")]
    MalformedValue { slot: ValueSlot, raw: String },

    #[error("existing output {} is unreadable: {message}", .path.display())]
    CorruptOutput { path: PathBuf, message: String },

    // Schema errors (30-39)
    #[error(
        "incompatible headers for {}: existing={existing:?} computed={computed:?}",
        .path.display()
    )]
    IncompatibleSchema {
        path: PathBuf,
        existing: Vec<String>,
        computed: Vec<String>,
    },

    // I/O errors (60-69)
    #[error("cannot read input {}: {source}", .path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write output {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Data errors
    /// - 30-39: Schema errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidDenylist(_) => 11,
            Error::RegistryLoad { .. } => 12,
            Error::KeyDictionaryLoad { .. } => 13,
            Error::MissingKeyMapping { .. } => 20,
            Error::MalformedRecord { .. } => 21,
            Error::MalformedValue { .. } => 22,
            Error::CorruptOutput { .. } => 23,
            Error::IncompatibleSchema { .. } => 30,
            Error::InputRead { .. } => 60,
            Error::OutputWrite { .. } => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_)
            | Error::InvalidDenylist(_)
            | Error::RegistryLoad { .. }
            | Error::KeyDictionaryLoad { .. } => ErrorCategory::Config,

            Error::MissingKeyMapping { .. }
            | Error::MalformedRecord { .. }
            | Error::MalformedValue { .. }
            | Error::CorruptOutput { .. } => ErrorCategory::Data,

            Error::IncompatibleSchema { .. } => ErrorCategory::Schema,

            Error::InputRead { .. }
            | Error::OutputWrite { .. } => ErrorCategory::Io,
        }
    }

    /// Returns how far this error propagates in folder mode.
    ///
    /// Data-level problems with one input file are file-scoped. Anything that
    /// leaves the output directory or the collaborator inputs in doubt is
    /// run-scoped.
    pub fn scope(&self) -> ErrorScope {
        match self {
            Error::MissingKeyMapping { .. }
            | Error::MalformedRecord { .. }
            | Error::MalformedValue { .. }
            | Error::IncompatibleSchema { .. }
            | Error::InputRead { .. } => ErrorScope::File,

            Error::Config(_)
            | Error::InvalidDenylist(_)
            | Error::RegistryLoad { .. }
            | Error::KeyDictionaryLoad { .. }
            | Error::CorruptOutput { .. }
            | Error::OutputWrite { .. } => ErrorScope::Run,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_)
            | Error::InvalidDenylist(_)
            | Error::RegistryLoad { .. }
            | Error::KeyDictionaryLoad { .. } => SuggestedAction::FixConfig,

            Error::MissingKeyMapping { .. }
            | Error::MalformedRecord { .. }
            | Error::MalformedValue { .. } => SuggestedAction::FixInput,

            Error::CorruptOutput { .. } => SuggestedAction::ManualIntervention,
            Error::IncompatibleSchema { .. } => SuggestedAction::Skip,

            Error::InputRead { .. } => SuggestedAction::FixInput,
            Error::OutputWrite { .. } => SuggestedAction::Retry,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Run 'tsw check' to validate configuration, or check convert.json syntax.",
            Error::InvalidDenylist(_) => {
                "The denylist must be a JSON object like {\"remove\": [\"key1\", \"key2\"]}."
            }
            Error::RegistryLoad { .. } => {
                "Export the device table with a header row containing at least 'id' and 'name', or pass the platform's devices.json."
            }
            Error::KeyDictionaryLoad { .. } => {
                "The key dictionary must have two ';'-separated columns: key;key_id."
            }
            Error::MissingKeyMapping { .. } => {
                "Re-export the ts_kv_dictionary table and pass it with --keys."
            }
            Error::MalformedRecord { .. } => {
                "Check that --source-version matches the layout of the dump."
            }
            Error::MalformedValue { .. } => {
                "The dump has a value that does not parse as its column type. Re-export the input."
            }
            Error::CorruptOutput { .. } => {
                "Inspect or move the existing output file; its header or ts column cannot be parsed."
            }
            Error::IncompatibleSchema { .. } => {
                "The device's key set changed. Re-run with '--merge-policy merge' to rewrite the file with the union of columns."
            }
            Error::InputRead { .. } => "Check that the input file exists and is readable.",
            Error::OutputWrite { .. } => {
                "Check disk space and permissions of the output directory, then retry."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidDenylist(_) => "Invalid Denylist",
            Error::RegistryLoad { .. } => "Device Registry Error",
            Error::KeyDictionaryLoad { .. } => "Key Dictionary Error",
            Error::MissingKeyMapping { .. } => "Missing Key Mapping",
            Error::MalformedRecord { .. } => "Malformed Record",
            Error::MalformedValue { .. } => "Malformed Value",
            Error::CorruptOutput { .. } => "Corrupt Output File",
            Error::IncompatibleSchema { .. } => "Incompatible Schema",
            Error::InputRead { .. } => "Input Read Error",
            Error::OutputWrite { .. } => "Output Write Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Whether the error aborted one file or the run.
    pub scope: ErrorScope,

    /// Human-readable error message.
    pub message: String,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., key id, file path).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::MissingKeyMapping { key_id } => {
                context.insert("key_id".to_string(), serde_json::json!(key_id));
            }
            Error::MalformedRecord { line, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
            }
            Error::MalformedValue { slot, raw } => {
                context.insert("slot".to_string(), serde_json::json!(slot));
                context.insert("raw".to_string(), serde_json::json!(raw));
            }
            Error::IncompatibleSchema {
                path,
                existing,
                computed,
            } => {
                context.insert("path".to_string(), serde_json::json!(path));
                context.insert("existing".to_string(), serde_json::json!(existing));
                context.insert("computed".to_string(), serde_json::json!(computed));
            }
            Error::RegistryLoad { path, .. }
            | Error::KeyDictionaryLoad { path, .. }
            | Error::CorruptOutput { path, .. }
            | Error::InputRead { path, .. }
            | Error::OutputWrite { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            scope: err.scope(),
            message: err.to_string(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Result of a batch operation that may have partial success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult<T> {
    /// Successfully completed items.
    pub succeeded: Vec<T>,

    /// Failed items with their errors.
    pub failed: Vec<BatchError>,

    /// Summary statistics.
    pub summary: BatchSummary,
}

/// A single error in a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Identifier of the failed item (the input file path in folder mode).
    pub item_id: String,

    /// The structured error.
    pub error: StructuredError,
}

/// Summary of batch operation results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub all_succeeded: bool,
    pub any_succeeded: bool,
}

impl<T> BatchResult<T> {
    /// Create a new batch result from succeeded and failed items.
    pub fn new(succeeded: Vec<T>, failed: Vec<BatchError>) -> Self {
        let total = succeeded.len() + failed.len();
        let succeeded_count = succeeded.len();
        let failed_count = failed.len();

        BatchResult {
            succeeded,
            failed,
            summary: BatchSummary {
                total,
                succeeded: succeeded_count,
                failed: failed_count,
                all_succeeded: failed_count == 0,
                any_succeeded: succeeded_count > 0,
            },
        }
    }

    /// Add a failure to the batch result.
    pub fn add_failure(&mut self, item_id: impl Into<String>, error: &Error) {
        self.failed.push(BatchError {
            item_id: item_id.into(),
            error: StructuredError::from(error),
        });
        self.summary.failed += 1;
        self.summary.total += 1;
        self.summary.all_succeeded = false;
    }

    /// Add a success to the batch result.
    pub fn add_success(&mut self, item: T) {
        self.succeeded.push(item);
        self.summary.succeeded += 1;
        self.summary.total += 1;
        self.summary.any_succeeded = true;
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

/// Format a batch result for human-readable stderr output.
pub fn format_batch_human<T>(result: &BatchResult<T>, use_color: bool) -> String {
    let (green, red, reset) = if use_color {
        ("\x1b[32m", "\x1b[31m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    let mut output = String::new();

    if result.summary.all_succeeded {
        output.push_str(&format!(
            "{green}✓{reset} All {} files converted\n",
            result.summary.total,
            green = green,
            reset = reset
        ));
    } else if result.summary.any_succeeded {
        output.push_str(&format!(
            "Partial success: {} of {} files converted\n",
            result.summary.succeeded, result.summary.total
        ));
    } else {
        output.push_str(&format!(
            "{red}✗{reset} All {} files failed\n",
            result.summary.total,
            red = red,
            reset = reset
        ));
    }

    if !result.failed.is_empty() {
        output.push_str("\nErrors:\n");
        for batch_err in &result.failed {
            output.push_str(&format!(
                "  {red}✗{reset} {}: {}\n",
                batch_err.item_id,
                batch_err.error.message,
                red = red,
                reset = reset
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("test".into()).code(), 10);
        assert_eq!(Error::MissingKeyMapping { key_id: 25 }.code(), 20);
        let schema = Error::IncompatibleSchema {
            path: PathBuf::from("a.csv"),
            existing: vec!["ts".into()],
            computed: vec!["ts".into(), "A".into()],
        };
        assert_eq!(schema.code(), 30);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::Config("test".into()).category(), ErrorCategory::Config);
        assert_eq!(
            Error::MissingKeyMapping { key_id: 1 }.category(),
            ErrorCategory::Data
        );
        let io = Error::OutputWrite {
            path: PathBuf::from("out.csv"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(io.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_error_scope() {
        assert_eq!(Error::MissingKeyMapping { key_id: 1 }.scope(), ErrorScope::File);
        assert_eq!(
            Error::MalformedRecord {
                line: 3,
                message: "bad ts".into()
            }
            .scope(),
            ErrorScope::File
        );
        let write = Error::OutputWrite {
            path: PathBuf::from("out.csv"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(write.scope(), ErrorScope::Run);
        let registry = Error::RegistryLoad {
            path: PathBuf::from("devices.csv"),
            message: "missing id column".into(),
        };
        assert_eq!(registry.scope(), ErrorScope::Run);
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = Error::MissingKeyMapping { key_id: 25 };
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 20);
        assert_eq!(structured.category, ErrorCategory::Data);
        assert_eq!(structured.scope, ErrorScope::File);
        assert_eq!(structured.suggested_action, SuggestedAction::FixInput);
        assert_eq!(structured.context.get("key_id"), Some(&serde_json::json!(25)));
    }

    #[test]
    fn test_structured_error_json() {
        let err = Error::MalformedRecord {
            line: 7,
            message: "expected 8 fields, got 3".into(),
        };
        let json = StructuredError::from(&err).to_json();

        assert!(json.contains(r#""code":21"#));
        assert!(json.contains(r#""category":"data""#));
        assert!(json.contains(r#""scope":"file""#));
        assert!(json.contains(r#""line":7"#));
    }

    #[test]
    fn test_batch_result() {
        let mut batch: BatchResult<String> = BatchResult::default();

        batch.add_success("ts_kv_1.csv".to_string());
        batch.add_success("ts_kv_2.csv".to_string());
        batch.add_failure("ts_kv_3.csv", &Error::MissingKeyMapping { key_id: 9 });

        assert_eq!(batch.summary.total, 3);
        assert_eq!(batch.summary.succeeded, 2);
        assert_eq!(batch.summary.failed, 1);
        assert!(!batch.summary.all_succeeded);
        assert!(batch.summary.any_succeeded);
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::MissingKeyMapping { key_id: 25 };
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Missing Key Mapping"));
        assert!(formatted.contains("key id 25"));
        assert!(formatted.contains("--keys"));
    }

    #[test]
    fn test_format_batch_human_partial() {
        let mut batch: BatchResult<()> = BatchResult::default();
        batch.add_success(());
        batch.add_failure("ts_kv_bad.csv", &Error::MissingKeyMapping { key_id: 3 });
        let out = format_batch_human(&batch, false);
        assert!(out.contains("Partial success: 1 of 2"));
        assert!(out.contains("ts_kv_bad.csv"));
    }

    #[test]
    fn test_display_enums() {
        assert_eq!(ErrorCategory::Schema.to_string(), "schema");
        assert_eq!(ErrorScope::Run.to_string(), "run");
        assert_eq!(SuggestedAction::FixConfig.to_string(), "fix_config");
    }
}
