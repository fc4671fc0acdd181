//! Pivot engine: one entity's tall triples to a wide table.
//!
//! Rows are collected in an ordered map from `ts` to a per-key cell map.
//! A later triple for the same `(ts, key)` replaces the earlier one
//! (last-write-wins); the number of replaced cells is reported.
//!
//! The resulting table lists every observed key as a column, including keys
//! whose only values were empty. Column order is left to the governor.

use std::collections::{BTreeMap, BTreeSet};

use tsw_common::Value;
use tsw_store::{WideRow, WideTable};

use crate::group::Observation;

/// Output of pivoting one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivoted {
    pub table: WideTable,

    /// Cells replaced by a later triple with the same `(ts, key)`.
    pub overwritten: usize,
}

/// Pivot an entity's observations into a wide table.
pub fn pivot(observations: impl IntoIterator<Item = Observation>) -> Pivoted {
    let mut rows: BTreeMap<i64, BTreeMap<String, Value>> = BTreeMap::new();
    let mut columns: BTreeSet<String> = BTreeSet::new();
    let mut overwritten = 0usize;

    for obs in observations {
        if !columns.contains(&obs.key) {
            columns.insert(obs.key.clone());
        }
        if rows.entry(obs.ts).or_default().insert(obs.key, obs.value).is_some() {
            overwritten += 1;
        }
    }

    let rows: Vec<WideRow> = rows
        .into_iter()
        .map(|(ts, cells)| WideRow {
            ts,
            cells: cells
                .into_iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| (key, value.render()))
                .collect(),
        })
        .collect();

    Pivoted {
        table: WideTable::with_columns(columns.into_iter().collect(), rows),
        overwritten,
    }
}
