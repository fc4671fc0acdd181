//! Key denylist.
//!
//! Keys named here never appear as output columns, whether they come from
//! the current dump or from an existing output file being merged.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tsw_common::{Error, Result};

/// On-disk shape of a denylist file.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct DenylistFile {
    remove: Vec<String>,
}

/// Set of key names excluded from every output table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    keys: BTreeSet<String>,
}

impl Denylist {
    /// An empty denylist: nothing is removed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from key names, rejecting blank entries.
    pub fn from_keys<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() {
                return Err(Error::InvalidDenylist("empty key name".to_string()));
            }
            if key == "ts" {
                return Err(Error::InvalidDenylist(
                    "the ts column cannot be removed".to_string(),
                ));
            }
            set.insert(key.to_string());
        }
        Ok(Denylist { keys: set })
    }

    /// Parse `{"remove": [...]}`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: DenylistFile =
            serde_json::from_str(text).map_err(|e| Error::InvalidDenylist(e.to_string()))?;
        Self::from_keys(file.remove)
    }

    /// Load a denylist file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidDenylist(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Union with another denylist.
    pub fn extend(&mut self, other: Denylist) {
        self.keys.extend(other.keys);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_remove_list() {
        let denylist =
            Denylist::from_json_str(r#"{"remove": ["error", "Breaker", "deltaP1"]}"#).unwrap();
        assert_eq!(denylist.len(), 3);
        assert!(denylist.contains("Breaker"));
        assert!(!denylist.contains("Temperature"));
    }

    #[test]
    fn test_names_are_trimmed() {
        let denylist = Denylist::from_json_str(r#"{"remove": [" error "]}"#).unwrap();
        assert!(denylist.contains("error"));
    }

    #[test]
    fn test_rejects_blank_and_ts() {
        assert!(matches!(
            Denylist::from_json_str(r#"{"remove": [""]}"#),
            Err(Error::InvalidDenylist(_))
        ));
        assert!(matches!(
            Denylist::from_json_str(r#"{"remove": ["ts"]}"#),
            Err(Error::InvalidDenylist(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(Denylist::from_json_str(r#"["error"]"#).is_err());
        assert!(Denylist::from_json_str(r#"{"remove": ["a"], "keep": []}"#).is_err());
    }

    #[test]
    fn test_extend_unions() {
        let mut a = Denylist::from_keys(["a", "b"]).unwrap();
        a.extend(Denylist::from_keys(["b", "c"]).unwrap());
        assert_eq!(a.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"remove": ["deltaQ1"]}}"#).unwrap();
        let denylist = Denylist::load(file.path()).unwrap();
        assert!(denylist.contains("deltaQ1"));
    }
}
