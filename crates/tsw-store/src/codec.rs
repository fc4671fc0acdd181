//! Per-device CSV codec.
//!
//! Output files are delimiter-separated, `\n`-terminated, with a single
//! header row `ts;<key1>;<key2>;...`. Fields are quoted only when they
//! contain the delimiter, a quote, or a line break.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tsw_common::{Error, Result};

use crate::schema::TS_COLUMN;
use crate::table::{WideRow, WideTable};

/// CSV writer configured for output files.
pub fn csv_writer<W: Write>(inner: W, delimiter: u8) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(inner)
}

fn csv_reader<R: io::Read>(inner: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(inner)
}

/// Write the header and every row of a table.
pub fn write_table_to<W: Write>(writer: &mut csv::Writer<W>, table: &WideTable) -> csv::Result<()> {
    writer.write_record(table.header())?;
    write_rows_to(writer, table)
}

/// Write the rows of a table without a header.
pub fn write_rows_to<W: Write>(writer: &mut csv::Writer<W>, table: &WideTable) -> csv::Result<()> {
    for row in table.rows() {
        writer.write_record(table.record(row))?;
    }
    Ok(())
}

fn open_existing(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn corrupt(path: &Path, message: impl Into<String>) -> Error {
    Error::CorruptOutput {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn check_header(path: &Path, header: &[String]) -> Result<()> {
    match header.first() {
        Some(first) if first == TS_COLUMN => {}
        Some(first) => {
            return Err(corrupt(
                path,
                format!("first column is {:?}, expected \"ts\"", first),
            ))
        }
        None => return Err(corrupt(path, "empty header")),
    }
    for (idx, name) in header.iter().enumerate().skip(1) {
        if name.is_empty() {
            return Err(corrupt(path, format!("column {} has no name", idx + 1)));
        }
        if header[..idx].contains(name) {
            return Err(corrupt(path, format!("duplicate column {:?}", name)));
        }
    }
    Ok(())
}

/// Read the header of an existing output file.
///
/// Returns `None` when the file does not exist or holds no records.
pub fn read_header(path: &Path, delimiter: u8) -> Result<Option<Vec<String>>> {
    let Some(file) = open_existing(path)? else {
        return Ok(None);
    };
    let mut reader = csv_reader(file, delimiter);
    let mut record = csv::StringRecord::new();
    let has_record = reader
        .read_record(&mut record)
        .map_err(|e| corrupt(path, e.to_string()))?;
    if !has_record {
        return Ok(None);
    }
    let header: Vec<String> = record.iter().map(str::to_string).collect();
    check_header(path, &header)?;
    Ok(Some(header))
}

/// Read an existing output file back into a wide table.
///
/// Column order is taken from the file header. Empty cells are treated as
/// absent.
pub fn read_table(path: &Path, delimiter: u8) -> Result<WideTable> {
    let Some(file) = open_existing(path)? else {
        return Ok(WideTable::new());
    };
    let mut reader = csv_reader(file, delimiter);
    let mut records = reader.records();

    let header: Vec<String> = match records.next() {
        None => return Ok(WideTable::new()),
        Some(record) => record
            .map_err(|e| corrupt(path, e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect(),
    };
    check_header(path, &header)?;

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| corrupt(path, e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() != header.len() {
            return Err(corrupt(
                path,
                format!(
                    "line {}: expected {} fields, found {}",
                    line,
                    header.len(),
                    record.len()
                ),
            ));
        }
        let ts_field = record.get(0).unwrap_or("");
        let ts: i64 = ts_field
            .trim()
            .parse()
            .map_err(|_| corrupt(path, format!("line {}: invalid ts {:?}", line, ts_field)))?;
        let mut row = WideRow::new(ts);
        for (name, cell) in header.iter().zip(record.iter()).skip(1) {
            if !cell.is_empty() {
                row.cells.insert(name.clone(), cell.to_string());
            }
        }
        rows.push(row);
    }

    Ok(WideTable::with_columns(header[1..].to_vec(), rows))
}
