//! Telemetry records and the typed telemetry value.
//!
//! A [`RawRecord`] mirrors one row of the long-format dump: four optional
//! text slots, at most one of which is meant to be populated. Decoding turns
//! it into a [`ResolvedRecord`] holding a single [`Value`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::EntityId;

/// Typed value slots of a raw record, in decoding priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSlot {
    Bool,
    Str,
    Long,
    Dbl,
}

impl ValueSlot {
    /// Slots in the order the decoder checks them.
    pub const PRIORITY: [ValueSlot; 4] =
        [ValueSlot::Bool, ValueSlot::Str, ValueSlot::Long, ValueSlot::Dbl];

    /// Column name of the slot in the dump.
    pub fn column(&self) -> &'static str {
        match self {
            ValueSlot::Bool => "bool_v",
            ValueSlot::Str => "str_v",
            ValueSlot::Long => "long_v",
            ValueSlot::Dbl => "dbl_v",
        }
    }
}

impl fmt::Display for ValueSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Key of a raw record: a literal name or a dictionary id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRef {
    Name(String),
    Id(i64),
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRef::Name(name) => write!(f, "{}", name),
            KeyRef::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// One row of the long-format dump, before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Entity type column (legacy layout only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    pub entity_id: EntityId,

    pub key: KeyRef,

    /// Milliseconds since the Unix epoch.
    pub ts: i64,

    pub bool_v: Option<String>,
    pub str_v: Option<String>,
    pub long_v: Option<String>,
    pub dbl_v: Option<String>,
}

impl RawRecord {
    /// Create a record with all value slots empty.
    pub fn new(entity_id: impl Into<EntityId>, key: KeyRef, ts: i64) -> Self {
        RawRecord {
            entity_type: None,
            entity_id: entity_id.into(),
            key,
            ts,
            bool_v: None,
            str_v: None,
            long_v: None,
            dbl_v: None,
        }
    }

    /// Set one value slot. Empty text leaves the slot unset.
    pub fn with_slot(mut self, slot: ValueSlot, text: impl Into<String>) -> Self {
        let text = text.into();
        let value = if text.is_empty() { None } else { Some(text) };
        match slot {
            ValueSlot::Bool => self.bool_v = value,
            ValueSlot::Str => self.str_v = value,
            ValueSlot::Long => self.long_v = value,
            ValueSlot::Dbl => self.dbl_v = value,
        }
        self
    }

    /// Raw text of a slot, if populated.
    pub fn slot(&self, slot: ValueSlot) -> Option<&str> {
        let value = match slot {
            ValueSlot::Bool => &self.bool_v,
            ValueSlot::Str => &self.str_v,
            ValueSlot::Long => &self.long_v,
            ValueSlot::Dbl => &self.dbl_v,
        };
        value.as_deref().filter(|s| !s.is_empty())
    }

    /// Number of populated value slots. More than one violates the dump's
    /// encoding contract.
    pub fn populated_slots(&self) -> usize {
        ValueSlot::PRIORITY
            .iter()
            .filter(|slot| self.slot(**slot).is_some())
            .count()
    }
}

/// A single telemetry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Str(String),
    Int(i64),
    Float(f64),
    /// No slot was populated. Rendered as an empty cell, distinct from
    /// `0` and `false`.
    Empty,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Cell text written to the output file.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Empty => Ok(()),
        }
    }
}

/// Shortest round-trip decimal, keeping a trailing `.0` on integral values
/// so a float column never looks like an integer column.
///
/// Magnitudes of at least 1e16 or below 1e-4 switch to exponent notation
/// with a signed, two-digit exponent (`1e+16`, `1.5e-07`).
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = x.abs();
    if x != 0.0 && (magnitude >= 1e16 || magnitude < 1e-4) {
        let formatted = format!("{:e}", x);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exp),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        };
    }
    if x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// A decoded record: key name resolved, one typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub entity_id: EntityId,
    pub key_name: String,
    pub ts: i64,
    pub value: Value,
}
