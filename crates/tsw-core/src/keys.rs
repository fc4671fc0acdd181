//! Key dictionary for numeric source versions.
//!
//! File format: `key;key_id` rows without a header. A leading literal
//! `key;key_id` row is tolerated.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tsw_common::{Error, Result};

use crate::logging::event_names;

/// Mapping from numeric key id to key name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDictionary {
    names: HashMap<i64, String>,
}

impl KeyDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dictionary file.
    pub fn load(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::KeyDictionaryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_reader(file, path, delimiter)
    }

    /// Parse a dictionary from any byte source. `origin` labels errors.
    pub fn from_reader<R: Read>(reader: R, origin: &Path, delimiter: u8) -> Result<Self> {
        let load_error = |message: String| Error::KeyDictionaryLoad {
            path: origin.to_path_buf(),
            message,
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);

        let mut dict = KeyDictionary::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| load_error(e.to_string()))?;
            let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);

            if record.len() != 2 {
                return Err(load_error(format!(
                    "line {}: expected 2 fields (key;key_id), found {}",
                    line,
                    record.len()
                )));
            }
            let name = &record[0];
            let raw_id = record[1].trim();
            if idx == 0 && name.trim() == "key" && raw_id == "key_id" {
                continue;
            }

            let id = raw_id.parse::<i64>().map_err(|_| {
                load_error(format!("line {}: key id {:?} is not an integer", line, raw_id))
            })?;
            if name.trim().is_empty() {
                return Err(load_error(format!("line {}: empty key name", line)));
            }

            if let Some(previous) = dict.insert(id, name) {
                tracing::warn!(
                    target: event_names::KEYS_DUPLICATE_ID,
                    key_id = id,
                    previous = %previous,
                    current = name,
                    "duplicate key id in dictionary; last entry wins"
                );
            }
        }

        Ok(dict)
    }

    /// Insert a mapping, returning the name it replaced.
    pub fn insert(&mut self, id: i64, name: impl Into<String>) -> Option<String> {
        self.names.insert(id, name.into())
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Name for `id`, or [`Error::MissingKeyMapping`].
    pub fn resolve(&self, id: i64) -> Result<&str> {
        self.get(id).ok_or(Error::MissingKeyMapping { key_id: id })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(i64, S)> for KeyDictionary {
    fn from_iter<I: IntoIterator<Item = (i64, S)>>(iter: I) -> Self {
        let mut dict = KeyDictionary::new();
        for (id, name) in iter {
            dict.insert(id, name);
        }
        dict
    }
}
