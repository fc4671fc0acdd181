//! Exit codes for the tsw CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-3: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/input errors (recoverable by user action)
//! - 20-29: Internal and I/O errors

use tsw_common::{Error, ErrorCategory};

/// Exit codes for tsw operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-3)
    // ========================================================================
    /// Every input converted
    Clean = 0,

    /// Folder mode matched no input files
    NoInput = 1,

    /// Folder mode: some files failed, others converted
    PartialFail = 3,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration or collaborator input (registry, keys, denylist) error
    ConfigError = 11,

    /// Malformed input data or missing key mapping (single-file mode)
    DataError = 13,

    /// Header mismatch refused under the reject merge policy
    SchemaConflict = 14,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates operational outcome (codes 0-9).
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code indicates any error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::NoInput => "OK_NO_INPUT",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::SchemaConflict => "ERR_SCHEMA",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map a run-aborting error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        Self::from_category(err.category())
    }

    /// Exit code for an error category.
    pub fn from_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Data => ExitCode::DataError,
            ErrorCategory::Schema => ExitCode::SchemaConflict,
            ErrorCategory::Io => ExitCode::IoError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::NoInput.as_i32(), 1);
        assert_eq!(ExitCode::PartialFail.as_i32(), 3);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::ConfigError.as_i32(), 11);
        assert_eq!(ExitCode::DataError.as_i32(), 13);
        assert_eq!(ExitCode::SchemaConflict.as_i32(), 14);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
    }

    #[test]
    fn test_exit_code_classes() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::NoInput.is_operational());
        assert!(!ExitCode::PartialFail.is_error());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::IoError.is_error());
        assert!(!ExitCode::IoError.is_user_error());
    }

    #[test]
    fn test_from_error() {
        assert_eq!(
            ExitCode::from_error(&Error::Config("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from_error(&Error::MissingKeyMapping { key_id: 3 }),
            ExitCode::DataError
        );
        assert_eq!(
            ExitCode::from_error(&Error::IncompatibleSchema {
                path: PathBuf::from("a.csv"),
                existing: vec![],
                computed: vec![],
            }),
            ExitCode::SchemaConflict
        );
        assert_eq!(
            ExitCode::from_error(&Error::OutputWrite {
                path: PathBuf::from("a.csv"),
                source: std::io::Error::other("disk full"),
            }),
            ExitCode::IoError
        );
    }

    #[test]
    fn test_from_error_follows_category() {
        let errors = [
            Error::Config("x".into()),
            Error::InvalidDenylist("x".into()),
            Error::KeyDictionaryLoad {
                path: PathBuf::from("keys.csv"),
                message: "x".into(),
            },
            Error::MalformedRecord {
                line: 1,
                message: "x".into(),
            },
            Error::CorruptOutput {
                path: PathBuf::from("a.csv"),
                message: "x".into(),
            },
            Error::InputRead {
                path: PathBuf::from("ts_kv.csv"),
                source: std::io::Error::other("gone"),
            },
        ];
        for err in &errors {
            assert_eq!(ExitCode::from_error(err), ExitCode::from_category(err.category()));
        }
    }

    #[test]
    fn test_from_category() {
        assert_eq!(
            ExitCode::from_category(ErrorCategory::Schema),
            ExitCode::SchemaConflict
        );
        assert_eq!(ExitCode::from_category(ErrorCategory::Io), ExitCode::IoError);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::PartialFail.to_string(), "ERR_PARTIAL (3)");
    }
}
