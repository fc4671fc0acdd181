//! Schema governor: fixes the column set and the row order of a wide table.
//!
//! Rules, applied in this order:
//! 1. Columns named in the denylist are removed, cells included.
//! 2. A data column literally named `ts` is dropped; it cannot coexist with
//!    the timestamp column.
//! 3. Remaining columns are sorted by name (byte order).
//! 4. `ts` is the first column of the header.
//! 5. Rows are sorted ascending by `ts`. The sort is stable, so rows sharing
//!    a timestamp keep their insertion order.
//!
//! Rows are kept even when every one of their cells was removed.

use tsw_config::Denylist;

use crate::table::WideTable;

/// Name of the timestamp column.
pub const TS_COLUMN: &str = "ts";

/// Apply the denylist, column ordering, and row ordering rules.
pub fn govern(table: WideTable, denylist: &Denylist) -> WideTable {
    let (columns, mut rows) = table.into_parts();

    let mut columns: Vec<String> = columns
        .into_iter()
        .filter(|c| c != TS_COLUMN && !denylist.contains(c))
        .collect();
    columns.sort();

    if !denylist.is_empty() {
        for row in &mut rows {
            row.cells.retain(|k, _| !denylist.contains(k));
        }
    }
    for row in &mut rows {
        row.cells.remove(TS_COLUMN);
    }

    rows.sort_by_key(|row| row.ts);

    WideTable::from_parts_unchecked(columns, rows)
}

/// Whether a table already satisfies the governor's ordering rules.
pub fn is_governed(table: &WideTable) -> bool {
    let columns_sorted = table.columns().windows(2).all(|w| w[0] < w[1]);
    let no_ts_column = table.columns().iter().all(|c| c != TS_COLUMN);
    let rows_sorted = table.rows().windows(2).all(|w| w[0].ts <= w[1].ts);
    columns_sorted && no_ts_column && rows_sorted
}
