//! Entity grouper: partitions resolved records by entity id.

use std::collections::BTreeMap;

use tsw_common::{EntityId, ResolvedRecord, Value};

/// One `(key, ts, value)` triple of an entity's tall table.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub key: String,
    pub ts: i64,
    pub value: Value,
}

impl From<ResolvedRecord> for Observation {
    fn from(rec: ResolvedRecord) -> Self {
        Observation {
            key: rec.key_name,
            ts: rec.ts,
            value: rec.value,
        }
    }
}

/// Group records by entity, keeping encounter order inside each group.
pub fn group_by_entity(
    records: impl IntoIterator<Item = ResolvedRecord>,
) -> BTreeMap<EntityId, Vec<Observation>> {
    let mut groups: BTreeMap<EntityId, Vec<Observation>> = BTreeMap::new();
    for rec in records {
        let entity_id = rec.entity_id.clone();
        groups.entry(entity_id).or_default().push(rec.into());
    }
    groups
}
