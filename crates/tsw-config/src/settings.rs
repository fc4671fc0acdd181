//! Conversion settings.
//!
//! Every field of `convert.json` is optional; missing fields take the
//! defaults below. CLI flags are applied on top through [`ConfigOverrides`].

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tsw_common::{Error, Result};

/// Platform release that produced the dump. Selects the column layout and
/// whether keys are names or dictionary ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum SourceVersion {
    /// `entity_type;entity_id;key;ts;bool_v;str_v;long_v;dbl_v`, key names.
    #[default]
    #[value(name = "old")]
    #[serde(rename = "old")]
    Legacy,

    /// `entity_id;key;ts;bool_v;str_v;long_v;dbl_v`, numeric key ids.
    #[value(name = "2.5.4")]
    #[serde(rename = "2.5.4")]
    V254,

    /// `entity_id;key;ts;bool_v;str_v;long_v;dbl_v;json_v`, numeric key ids.
    #[value(name = "3.2")]
    #[serde(rename = "3.2")]
    V32,
}

impl SourceVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceVersion::Legacy => "old",
            SourceVersion::V254 => "2.5.4",
            SourceVersion::V32 => "3.2",
        }
    }

    /// Whether the `key` column holds dictionary ids.
    pub fn uses_numeric_keys(&self) -> bool {
        !matches!(self, SourceVersion::Legacy)
    }

    /// Number of fields in one input row.
    pub fn field_count(&self) -> usize {
        match self {
            SourceVersion::Legacy => 8,
            SourceVersion::V254 => 7,
            SourceVersion::V32 => 8,
        }
    }
}

impl std::fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do when an existing output file has a different header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Rewrite the file with the union of columns.
    #[default]
    Merge,
    /// Refuse with an incompatible-schema error.
    Reject,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePolicy::Merge => write!(f, "merge"),
            MergePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Registry field used to name per-device output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameField {
    #[default]
    Name,
    /// Device label, falling back to the name when the label is empty.
    Label,
}

impl std::fmt::Display for NameField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameField::Name => write!(f, "name"),
            NameField::Label => write!(f, "label"),
        }
    }
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_delimiter() -> char {
    ';'
}

fn default_input_prefix() -> String {
    "ts_kv".to_string()
}

/// Settings for one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub source_version: SourceVersion,

    /// Field delimiter for input dumps, collaborator CSVs, and outputs.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default)]
    pub merge_policy: MergePolicy,

    #[serde(default)]
    pub name_field: NameField,

    /// Folder mode only converts files whose name starts with this prefix.
    #[serde(default = "default_input_prefix")]
    pub input_prefix: String,

    /// Inline denylist, unioned with the denylist file.
    #[serde(default)]
    pub remove: Vec<String>,

    /// Key dictionary (`key;key_id`) for numeric source versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<PathBuf>,

    /// Denylist file (`{"remove": [...]}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denylist: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            schema_version: default_schema_version(),
            source_version: SourceVersion::default(),
            delimiter: default_delimiter(),
            merge_policy: MergePolicy::default(),
            name_field: NameField::default(),
            input_prefix: default_input_prefix(),
            remove: Vec::new(),
            keys: None,
            denylist: None,
        }
    }
}

impl ConvertConfig {
    /// Parse settings from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(format!("invalid JSON: {}", e)))
    }

    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid JSON in {}: {}", path.display(), e)))
    }

    /// Apply CLI overrides. Set fields win over file values.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(version) = overrides.source_version {
            self.source_version = version;
        }
        if let Some(delimiter) = overrides.delimiter {
            self.delimiter = delimiter;
        }
        if let Some(policy) = overrides.merge_policy {
            self.merge_policy = policy;
        }
        if let Some(field) = overrides.name_field {
            self.name_field = field;
        }
        if let Some(ref keys) = overrides.keys {
            self.keys = Some(keys.clone());
        }
        if let Some(ref denylist) = overrides.denylist {
            self.denylist = Some(denylist.clone());
        }
    }

    /// Delimiter as the single byte the CSV reader and writer expect.
    ///
    /// Only meaningful after validation, which rejects non-ASCII delimiters.
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b';'
        }
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_version: Option<SourceVersion>,
    pub delimiter: Option<char>,
    pub merge_policy: Option<MergePolicy>,
    pub name_field: Option<NameField>,
    pub keys: Option<PathBuf>,
    pub denylist: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = ConvertConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ConvertConfig::default());
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.input_prefix, "ts_kv");
        assert_eq!(config.merge_policy, MergePolicy::Merge);
    }

    #[test]
    fn test_full_config_parses() {
        let config = ConvertConfig::from_json_str(
            r#"{
                "schema_version": "1.0.0",
                "source_version": "2.5.4",
                "delimiter": ",",
                "merge_policy": "reject",
                "name_field": "label",
                "input_prefix": "dump",
                "remove": ["error", "Breaker"],
                "keys": "keys.csv"
            }"#,
        )
        .unwrap();
        assert_eq!(config.source_version, SourceVersion::V254);
        assert_eq!(config.delimiter_byte(), b',');
        assert_eq!(config.merge_policy, MergePolicy::Reject);
        assert_eq!(config.name_field, NameField::Label);
        assert_eq!(config.remove, vec!["error", "Breaker"]);
        assert_eq!(config.keys, Some(PathBuf::from("keys.csv")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ConvertConfig::from_json_str(r#"{"colour": "blue"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.code(), 10);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = ConvertConfig::default();
        config.apply_overrides(&ConfigOverrides {
            source_version: Some(SourceVersion::V32),
            merge_policy: Some(MergePolicy::Reject),
            keys: Some(PathBuf::from("/tmp/keys.csv")),
            ..Default::default()
        });
        assert_eq!(config.source_version, SourceVersion::V32);
        assert_eq!(config.merge_policy, MergePolicy::Reject);
        assert_eq!(config.keys, Some(PathBuf::from("/tmp/keys.csv")));
        assert_eq!(config.delimiter, ';');
    }

    #[test]
    fn test_source_version_layouts() {
        assert!(!SourceVersion::Legacy.uses_numeric_keys());
        assert!(SourceVersion::V254.uses_numeric_keys());
        assert_eq!(SourceVersion::V254.field_count(), 7);
        assert_eq!(SourceVersion::V32.field_count(), 8);
        assert_eq!(
            serde_json::to_string(&SourceVersion::V254).unwrap(),
            "\"2.5.4\""
        );
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = ConvertConfig::load(Path::new("/nonexistent/convert.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
