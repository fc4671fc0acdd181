//! Device filter: keeps only tables of registered entities.
//!
//! Unregistered entities are dropped without error so decommissioned devices
//! never get an output file.

use std::collections::BTreeMap;

use tsw_common::EntityId;
use tsw_store::WideTable;

use crate::registry::DeviceRegistry;

/// Tables of registered entities and the ids that were dropped.
#[derive(Debug, Clone, Default)]
pub struct Filtered {
    pub kept: BTreeMap<EntityId, WideTable>,
    pub dropped: Vec<EntityId>,
}

pub fn filter_registered(
    tables: BTreeMap<EntityId, WideTable>,
    registry: &DeviceRegistry,
) -> Filtered {
    let mut filtered = Filtered::default();
    for (id, table) in tables {
        if registry.contains(&id) {
            filtered.kept.insert(id, table);
        } else {
            filtered.dropped.push(id);
        }
    }
    filtered
}
