//! Per-entity wide table.
//!
//! One row per timestamp, one column per key. Rows are sparse: a cell that
//! was never observed is simply absent and renders as an empty field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::TS_COLUMN;

/// One row of a wide table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideRow {
    /// Milliseconds since the Unix epoch.
    pub ts: i64,

    /// Rendered cell text by column name.
    pub cells: BTreeMap<String, String>,
}

impl WideRow {
    pub fn new(ts: i64) -> Self {
        WideRow {
            ts,
            cells: BTreeMap::new(),
        }
    }

    /// Builder-style cell insertion.
    pub fn with_cell(mut self, column: impl Into<String>, text: impl Into<String>) -> Self {
        self.cells.insert(column.into(), text.into());
        self
    }

    /// Cell text, empty when the column was never observed for this row.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A wide table for one entity.
///
/// `columns` lists the data columns (never `ts`) in output order once the
/// table has been governed; before that the order is encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideTable {
    columns: Vec<String>,
    rows: Vec<WideRow>,
}

impl WideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows, collecting columns in encounter order.
    pub fn from_rows(rows: impl IntoIterator<Item = WideRow>) -> Self {
        let mut table = WideTable::new();
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Build a table with an explicit column list.
    ///
    /// Columns observed in rows but missing from `columns` are appended.
    pub fn with_columns(columns: Vec<String>, rows: Vec<WideRow>) -> Self {
        let mut table = WideTable {
            columns: Vec::with_capacity(columns.len()),
            rows: Vec::with_capacity(rows.len()),
        };
        for column in columns {
            table.add_column(column);
        }
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Register a column without adding any cells.
    pub fn add_column(&mut self, column: impl Into<String>) {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
    }

    /// Append a row, extending the column set with any new keys.
    pub fn push_row(&mut self, row: WideRow) {
        for column in row.cells.keys() {
            if !self.columns.iter().any(|c| c == column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push(row);
    }

    /// Rows of `self` followed by rows of `other`, over the union of columns.
    pub fn concat(mut self, other: WideTable) -> WideTable {
        for column in other.columns {
            self.add_column(column);
        }
        self.rows.extend(other.rows);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[WideRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Output header: `ts` followed by the data columns.
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(TS_COLUMN.to_string());
        header.extend(self.columns.iter().cloned());
        header
    }

    /// Field values of a row in header order.
    pub fn record(&self, row: &WideRow) -> Vec<String> {
        let mut record = Vec::with_capacity(self.columns.len() + 1);
        record.push(row.ts.to_string());
        for column in &self.columns {
            record.push(row.get(column).to_string());
        }
        record
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<WideRow>) {
        (self.columns, self.rows)
    }

    pub(crate) fn from_parts_unchecked(columns: Vec<String>, rows: Vec<WideRow>) -> Self {
        WideTable { columns, rows }
    }
}
