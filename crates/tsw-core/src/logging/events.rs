//! Structured event definitions for logging.
//!
//! Events follow a consistent schema for machine-parseable JSONL output.
//! All events carry the run id, the input being converted (when any), and
//! the pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup, configuration, collaborator inputs.
    Init,
    /// Reading raw records from the dump.
    Read,
    /// Key resolution and value extraction.
    Decode,
    /// Grouping, pivoting, and schema governance.
    Pivot,
    /// Device registry filtering.
    Filter,
    /// Output file creation, append, or merge.
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Read => "read",
            Stage::Decode => "decode",
            Stage::Pivot => "pivot",
            Stage::Filter => "filter",
            Stage::Write => "write",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_FAILED: &str = "run.failed";

    // Init stage
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const REGISTRY_LOADED: &str = "registry.loaded";
    pub const REGISTRY_DUPLICATE_NAME: &str = "registry.duplicate_name";
    pub const KEYS_LOADED: &str = "keys.loaded";
    pub const KEYS_DUPLICATE_ID: &str = "keys.duplicate_id";

    // Per input file
    pub const FILE_STARTED: &str = "file.started";
    pub const FILE_SKIPPED: &str = "file.skipped";
    pub const FILE_CONVERTED: &str = "file.converted";
    pub const FILE_FAILED: &str = "file.failed";

    // Decode / pivot / filter
    pub const DECODE_AMBIGUOUS: &str = "decode.ambiguous";
    pub const PIVOT_OVERWRITTEN: &str = "pivot.overwritten";
    pub const DEVICE_UNKNOWN: &str = "device.unknown";

    // Write stage
    pub const DEVICE_WRITTEN: &str = "device.written";
}

/// A structured log event for JSONL output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,

    pub level: Level,

    /// Event name (e.g., "run.started", "file.converted").
    pub event: String,

    /// Unique ID for this invocation of tsw.
    pub run_id: String,

    /// Input file being converted, when the event concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    pub stage: Stage,

    pub message: String,

    /// Additional structured fields (stable keys).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            input: None,
            stage,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Context for generating log events with a consistent run id and input.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub input: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            input: None,
        }
    }

    /// Derive a context scoped to one input file.
    pub fn with_input(&self, input: impl Into<String>) -> Self {
        LogContext {
            run_id: self.run_id.clone(),
            input: Some(input.into()),
        }
    }

    /// Input label for log fields; empty outside a file.
    pub fn input_label(&self) -> &str {
        self.input.as_deref().unwrap_or("")
    }

    /// Create an event with this context.
    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        let mut e = LogEvent::new(level, event, &self.run_id, stage, message);
        e.input.clone_from(&self.input);
        e
    }

    pub fn info(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn warn(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }
}
