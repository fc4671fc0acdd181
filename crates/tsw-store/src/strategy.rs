//! Merge decision for one output file.
//!
//! The state of the existing file is inspected first, then a pure policy
//! maps `(FileState, MergePolicy)` to a `WriteStrategy`. Executors live in
//! [`crate::writer`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tsw_common::Result;
use tsw_config::MergePolicy;

use crate::codec;

/// State of an output file relative to a computed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    /// Absent, or present with no records.
    NoFile,
    /// Header equals the computed header, column order included.
    SameSchema,
    /// Header differs from the computed header.
    DifferentSchema { existing: Vec<String> },
}

/// How a computed table reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// New file with header and rows.
    Create,
    /// Rows appended verbatim to the existing file.
    Append,
    /// Existing rows and new rows combined over the union of columns and
    /// written to a temporary file that replaces the original.
    MergeRewrite,
}

impl std::fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStrategy::Create => write!(f, "create"),
            WriteStrategy::Append => write!(f, "append"),
            WriteStrategy::MergeRewrite => write!(f, "merge_rewrite"),
        }
    }
}

/// Compare the header of the file at `path` against `header`.
pub fn inspect(path: &Path, header: &[String], delimiter: u8) -> Result<FileState> {
    Ok(match codec::read_header(path, delimiter)? {
        None => FileState::NoFile,
        Some(existing) if existing == header => FileState::SameSchema,
        Some(existing) => FileState::DifferentSchema { existing },
    })
}

/// Pick a write strategy. `None` means the policy refuses the write.
pub fn choose_strategy(state: &FileState, policy: MergePolicy) -> Option<WriteStrategy> {
    match (state, policy) {
        (FileState::NoFile, _) => Some(WriteStrategy::Create),
        (FileState::SameSchema, _) => Some(WriteStrategy::Append),
        (FileState::DifferentSchema { .. }, MergePolicy::Merge) => {
            Some(WriteStrategy::MergeRewrite)
        }
        (FileState::DifferentSchema { .. }, MergePolicy::Reject) => None,
    }
}
