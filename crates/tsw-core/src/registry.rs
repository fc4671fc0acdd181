//! Device registry: which entities get an output file, and under what name.
//!
//! Two on-disk forms are accepted:
//! - a delimiter-separated dump of the device table with a header row that
//!   has at least `id` and `name` columns (`label` and `type` optional);
//! - a `.json` device list, either a bare array or a page object with a
//!   `data` array, each entry carrying `id.id`, `name`, and optional
//!   `label` and `type`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tsw_common::{EntityId, Error, Result};
use tsw_config::NameField;

use crate::logging::event_names;

/// Characters that never appear in an output file name.
const FORBIDDEN: &[char] = &[
    ',', '"', '*', '/', ':', '<', '>', '?', '\\', '|', '+', ';', '=', '(', ')', '[', ']',
];

/// Fallback when neither the name nor the id yields a usable file name.
const UNNAMED: &str = "unnamed";

/// Metadata of one registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

impl Device {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Device {
            id: id.into(),
            name: name.into(),
            label: None,
            device_type: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Name used for the output file before sanitization. `label` falls
    /// back to `name` when blank.
    pub fn display_name(&self, field: NameField) -> &str {
        match field {
            NameField::Name => &self.name,
            NameField::Label => self
                .label
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(&self.name),
        }
    }
}

/// Make a device name safe to use as a file name.
///
/// The name is transliterated to ASCII first (`Ф` → `F`). Forbidden
/// characters and whitespace then become `_`, control characters are
/// dropped, runs of `_` collapse, and `_` is trimmed from both ends. An
/// empty result falls back to `fallback`, sanitized the same way.
pub fn sanitize_name(raw: &str, fallback: &str) -> String {
    let cleaned = sanitize_once(raw);
    if !cleaned.is_empty() {
        return cleaned;
    }
    let cleaned = sanitize_once(fallback);
    if !cleaned.is_empty() {
        return cleaned;
    }
    UNNAMED.to_string()
}

fn sanitize_once(raw: &str) -> String {
    let ascii = deunicode::deunicode(raw);
    let mut out = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_control() {
            continue;
        }
        let c = if FORBIDDEN.contains(&c) || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

#[derive(Debug, Deserialize)]
struct JsonDeviceId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JsonDevice {
    id: JsonDeviceId,
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, rename = "type")]
    device_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDeviceList {
    List(Vec<JsonDevice>),
    Page { data: Vec<JsonDevice> },
}

impl From<JsonDevice> for Device {
    fn from(d: JsonDevice) -> Self {
        Device {
            id: EntityId::new(d.id.id),
            name: d.name,
            label: d.label.filter(|l| !l.is_empty()),
            device_type: d.device_type.filter(|t| !t.is_empty()),
        }
    }
}

/// Registered devices keyed by entity id, with their output file names.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<EntityId, Device>,
    file_names: BTreeMap<EntityId, String>,
    name_field: NameField,
}

impl DeviceRegistry {
    /// Build a registry from devices. A repeated id keeps the last entry.
    pub fn from_devices(devices: impl IntoIterator<Item = Device>, name_field: NameField) -> Self {
        let mut registry = DeviceRegistry {
            devices: BTreeMap::new(),
            file_names: BTreeMap::new(),
            name_field,
        };
        for device in devices {
            let file_name = sanitize_name(device.display_name(name_field), device.id.as_str());
            registry.file_names.insert(device.id.clone(), file_name);
            registry.devices.insert(device.id.clone(), device);
        }
        registry
    }

    /// Load a registry file, JSON by `.json` extension, CSV otherwise.
    pub fn load(path: &Path, delimiter: u8, name_field: NameField) -> Result<Self> {
        let load_error = |message: String| Error::RegistryLoad {
            path: path.to_path_buf(),
            message,
        };

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let devices = if is_json {
            let text = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
            parse_json_devices(&text).map_err(load_error)?
        } else {
            let file = fs::File::open(path).map_err(|e| load_error(e.to_string()))?;
            parse_csv_devices(file, delimiter).map_err(load_error)?
        };

        let registry = Self::from_devices(devices, name_field);
        for (name, ids) in registry.duplicate_file_names() {
            let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
            tracing::warn!(
                target: event_names::REGISTRY_DUPLICATE_NAME,
                file_name = %name,
                entity_ids = %ids.join(","),
                "devices share an output file name; their data merges into one file"
            );
        }
        Ok(registry)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.devices.contains_key(id)
    }

    /// Sanitized output file name (without extension) for a device.
    pub fn file_name(&self, id: &EntityId) -> Option<&str> {
        self.file_names.get(id).map(String::as_str)
    }

    pub fn name_field(&self) -> NameField {
        self.name_field
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// File names claimed by more than one device, with the claiming ids.
    pub fn duplicate_file_names(&self) -> Vec<(String, Vec<EntityId>)> {
        let mut by_name: HashMap<&str, Vec<EntityId>> = HashMap::new();
        for (id, name) in &self.file_names {
            by_name.entry(name.as_str()).or_default().push(id.clone());
        }
        let mut dups: Vec<(String, Vec<EntityId>)> = by_name
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, ids)| (name.to_string(), ids))
            .collect();
        dups.sort();
        dups
    }
}

fn parse_json_devices(text: &str) -> std::result::Result<Vec<Device>, String> {
    let list: JsonDeviceList = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let devices = match list {
        JsonDeviceList::List(devices) | JsonDeviceList::Page { data: devices } => devices,
    };
    Ok(devices.into_iter().map(Device::from).collect())
}

fn parse_csv_devices<R: std::io::Read>(
    reader: R,
    delimiter: u8,
) -> std::result::Result<Vec<Device>, String> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| e.to_string())?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let id_col = column("id").ok_or_else(|| "header has no `id` column".to_string())?;
    let name_col = column("name").ok_or_else(|| "header has no `name` column".to_string())?;
    let label_col = column("label");
    let type_col = column("type");

    let optional = |record: &csv::StringRecord, col: Option<usize>| {
        col.and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut devices = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let id = record.get(id_col).map(str::trim).unwrap_or("");
        if id.is_empty() {
            return Err(format!("line {}: empty device id", line));
        }
        let name = record
            .get(name_col)
            .ok_or_else(|| format!("line {}: missing `name` field", line))?;
        devices.push(Device {
            id: EntityId::new(id),
            name: name.to_string(),
            label: optional(&record, label_col),
            device_type: optional(&record, type_col),
        });
    }
    Ok(devices)
}
