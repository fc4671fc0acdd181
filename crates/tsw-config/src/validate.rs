//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::settings::ConvertConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 15,
            ValidationError::InvalidValue { .. } => 16,
            ValidationError::VersionMismatch { .. } => 17,
        }
    }
}

impl From<ValidationError> for tsw_common::Error {
    fn from(err: ValidationError) -> Self {
        tsw_common::Error::Config(err.to_string())
    }
}

/// Validate conversion settings semantically.
pub fn validate_config(config: &ConvertConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_delimiter(config.delimiter)?;

    if config.input_prefix.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "input_prefix".to_string(),
            message: "Must not be empty".to_string(),
        });
    }

    for (idx, key) in config.remove.iter().enumerate() {
        if key.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("remove[{}]", idx),
                message: "Key names must not be blank".to_string(),
            });
        }
    }

    if config.source_version.uses_numeric_keys() && config.keys.is_none() {
        return Err(ValidationError::SemanticError(format!(
            "source version {} uses numeric key ids and needs a key dictionary (--keys)",
            config.source_version
        )));
    }

    Ok(())
}

fn validate_delimiter(delimiter: char) -> ValidationResult<()> {
    if !delimiter.is_ascii() {
        return Err(ValidationError::InvalidValue {
            field: "delimiter".to_string(),
            message: format!("Must be a single ASCII character, got {:?}", delimiter),
        });
    }
    if matches!(delimiter, '"' | '\n' | '\r') {
        return Err(ValidationError::InvalidValue {
            field: "delimiter".to_string(),
            message: format!("{:?} cannot be used as a field delimiter", delimiter),
        });
    }
    Ok(())
}
