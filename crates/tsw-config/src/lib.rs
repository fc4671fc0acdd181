//! tsw configuration loading and validation.
//!
//! This crate provides:
//! - Typed settings for a conversion run (`convert.json`)
//! - Denylist loading (`{"remove": [...]}`)
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation

pub mod denylist;
pub mod resolve;
pub mod settings;
pub mod validate;

pub use denylist::Denylist;
pub use resolve::{load_config, resolve_config, ConfigPaths, ConfigSource, ResolvedConfig};
pub use settings::{ConfigOverrides, ConvertConfig, MergePolicy, NameField, SourceVersion};
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
