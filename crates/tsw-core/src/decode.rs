//! Value decoder: raw dump row to resolved, typed record.
//!
//! Slots are checked in the order `bool_v`, `str_v`, `long_v`, `dbl_v`; the
//! first populated one decides the value. A record with no populated slot
//! decodes to [`Value::Empty`].

use tsw_common::{Error, KeyRef, RawRecord, ResolvedRecord, Result, Value, ValueSlot};

use crate::keys::KeyDictionary;

/// Resolve the key name and extract the typed value of a raw record.
///
/// A numeric key without a dictionary, or absent from it, fails with
/// [`Error::MissingKeyMapping`].
pub fn decode(raw: &RawRecord, keys: Option<&KeyDictionary>) -> Result<ResolvedRecord> {
    let key_name = match &raw.key {
        KeyRef::Name(name) => name.clone(),
        KeyRef::Id(id) => match keys {
            Some(dict) => dict.resolve(*id)?.to_string(),
            None => return Err(Error::MissingKeyMapping { key_id: *id }),
        },
    };

    let value = match ValueSlot::PRIORITY
        .iter()
        .find_map(|slot| raw.slot(*slot).map(|text| (*slot, text)))
    {
        Some((slot, text)) => parse_value(slot, text)?,
        None => Value::Empty,
    };

    Ok(ResolvedRecord {
        entity_id: raw.entity_id.clone(),
        key_name,
        ts: raw.ts,
        value,
    })
}

/// Parse the text of one populated slot as that slot's type.
pub fn parse_value(slot: ValueSlot, text: &str) -> Result<Value> {
    let malformed = || Error::MalformedValue {
        slot,
        raw: text.to_string(),
    };
    match slot {
        ValueSlot::Bool => parse_bool(text).map(Value::Bool).ok_or_else(malformed),
        ValueSlot::Str => Ok(Value::Str(text.to_string())),
        ValueSlot::Long => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| malformed()),
        ValueSlot::Dbl => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| malformed()),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}
