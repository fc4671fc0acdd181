//! Raw record reader for long-format telemetry dumps.
//!
//! Three layouts exist, selected by [`SourceVersion`]:
//!
//! | version | fields |
//! |---------|--------|
//! | `old`   | `entity_type;entity_id;key;ts;bool_v;str_v;long_v;dbl_v` |
//! | `2.5.4` | `entity_id;key;ts;bool_v;str_v;long_v;dbl_v` |
//! | `3.2`   | `entity_id;key;ts;bool_v;str_v;long_v;dbl_v;json_v` |
//!
//! Dumps normally carry no header. A first row whose `ts` field is literally
//! `ts` is skipped.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tsw_common::{Error, KeyRef, RawRecord, Result, ValueSlot};
use tsw_config::SourceVersion;

/// Positions of the fixed fields within one row.
#[derive(Debug, Clone, Copy)]
struct Layout {
    entity_type: Option<usize>,
    entity_id: usize,
    key: usize,
    ts: usize,
    first_slot: usize,
}

impl Layout {
    fn for_version(version: SourceVersion) -> Self {
        match version {
            SourceVersion::Legacy => Layout {
                entity_type: Some(0),
                entity_id: 1,
                key: 2,
                ts: 3,
                first_slot: 4,
            },
            SourceVersion::V254 | SourceVersion::V32 => Layout {
                entity_type: None,
                entity_id: 0,
                key: 1,
                ts: 2,
                first_slot: 3,
            },
        }
    }
}

/// Streaming reader yielding one [`RawRecord`] per dump row.
pub struct RawRecordReader<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    version: SourceVersion,
    path: PathBuf,
    line: u64,
    started: bool,
}

impl RawRecordReader<File> {
    /// Open a dump file.
    pub fn open(path: &Path, version: SourceVersion, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::InputRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file, path, version, delimiter))
    }
}

impl<R: Read> RawRecordReader<R> {
    /// Read a dump from any byte source. `origin` labels read errors.
    pub fn from_reader(
        reader: R,
        origin: impl Into<PathBuf>,
        version: SourceVersion,
        delimiter: u8,
    ) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader)
            .into_records();
        RawRecordReader {
            records,
            version,
            path: origin.into(),
            line: 0,
            started: false,
        }
    }

    /// Line of the last row read, 1-based.
    pub fn line(&self) -> u64 {
        self.line
    }

    fn map_csv_error(&self, err: csv::Error) -> Error {
        match err.into_kind() {
            csv::ErrorKind::Io(source) => Error::InputRead {
                path: self.path.clone(),
                source,
            },
            csv::ErrorKind::Utf8 { pos, err } => Error::MalformedRecord {
                line: pos.map(|p| p.line()).unwrap_or(self.line + 1),
                message: format!("invalid UTF-8: {}", err),
            },
            other => Error::MalformedRecord {
                line: self.line + 1,
                message: format!("{:?}", other),
            },
        }
    }
}

impl<R: Read> Iterator for RawRecordReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(self.map_csv_error(err))),
            };
            self.line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(self.line + 1);

            let fields: Vec<&str> = record.iter().collect();
            let first = !self.started;
            self.started = true;
            if first && is_header_row(&fields, self.version) {
                continue;
            }
            return Some(parse_row(&fields, self.version, self.line));
        }
    }
}

fn is_header_row(fields: &[&str], version: SourceVersion) -> bool {
    let layout = Layout::for_version(version);
    fields
        .get(layout.ts)
        .is_some_and(|f| f.trim().eq_ignore_ascii_case("ts"))
}

/// Parse the fields of one dump row.
pub fn parse_row(fields: &[&str], version: SourceVersion, line: u64) -> Result<RawRecord> {
    let malformed = |message: String| Error::MalformedRecord { line, message };

    if fields.len() != version.field_count() {
        return Err(malformed(format!(
            "expected {} fields for source version {}, found {}",
            version.field_count(),
            version,
            fields.len()
        )));
    }

    let layout = Layout::for_version(version);

    let entity_id = fields[layout.entity_id].trim();
    if entity_id.is_empty() {
        return Err(malformed("empty entity_id".to_string()));
    }

    let raw_key = fields[layout.key];
    let key = if version.uses_numeric_keys() {
        let id = raw_key
            .trim()
            .parse::<i64>()
            .map_err(|_| malformed(format!("key id {:?} is not an integer", raw_key)))?;
        KeyRef::Id(id)
    } else {
        if raw_key.trim().is_empty() {
            return Err(malformed("empty key".to_string()));
        }
        KeyRef::Name(raw_key.to_string())
    };

    let raw_ts = fields[layout.ts];
    let ts = raw_ts
        .trim()
        .parse::<i64>()
        .map_err(|_| malformed(format!("ts {:?} is not an integer", raw_ts)))?;

    let mut record = RawRecord::new(entity_id, key, ts);
    if let Some(idx) = layout.entity_type {
        let entity_type = fields[idx].trim();
        if !entity_type.is_empty() {
            record.entity_type = Some(entity_type.to_string());
        }
    }
    for (offset, slot) in ValueSlot::PRIORITY.iter().enumerate() {
        record = record.with_slot(*slot, fields[layout.first_slot + offset]);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read_all(text: &str, version: SourceVersion) -> Result<Vec<RawRecord>> {
        RawRecordReader::from_reader(text.as_bytes(), "dump.csv", version, b';').collect()
    }

    #[test]
    fn test_parse_legacy_row() {
        let record = parse_row(
            &["DEVICE", "dev1", "Temperature", "1000", "", "", "", "18.9"],
            SourceVersion::Legacy,
            1,
        )
        .unwrap();
        assert_eq!(record.entity_type.as_deref(), Some("DEVICE"));
        assert_eq!(record.entity_id.as_str(), "dev1");
        assert_eq!(record.key, KeyRef::Name("Temperature".into()));
        assert_eq!(record.ts, 1000);
        assert_eq!(record.slot(ValueSlot::Dbl), Some("18.9"));
        assert_eq!(record.populated_slots(), 1);
    }

    #[test]
    fn test_parse_numeric_key_rows() {
        let v254 = parse_row(
            &["dev1", "25", "1000", "", "on", "", ""],
            SourceVersion::V254,
            1,
        )
        .unwrap();
        assert_eq!(v254.key, KeyRef::Id(25));
        assert_eq!(v254.slot(ValueSlot::Str), Some("on"));
        assert!(v254.entity_type.is_none());

        let v32 = parse_row(
            &["dev1", "7", "2000", "", "", "42", "", "{\"a\":1}"],
            SourceVersion::V32,
            1,
        )
        .unwrap();
        assert_eq!(v32.key, KeyRef::Id(7));
        assert_eq!(v32.slot(ValueSlot::Long), Some("42"));
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        let err = parse_row(&["dev1", "25", "1000"], SourceVersion::V254, 4).unwrap_err();
        match err {
            Error::MalformedRecord { line, message } => {
                assert_eq!(line, 4);
                assert!(message.contains("expected 7 fields"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_ts_and_key_id_are_malformed() {
        assert!(matches!(
            parse_row(
                &["DEVICE", "dev1", "T", "abc", "", "", "", "1"],
                SourceVersion::Legacy,
                2
            ),
            Err(Error::MalformedRecord { line: 2, .. })
        ));
        assert!(matches!(
            parse_row(&["dev1", "T", "1000", "", "", "", "1"], SourceVersion::V254, 3),
            Err(Error::MalformedRecord { line: 3, .. })
        ));
    }

    #[test]
    fn test_reader_skips_leading_header() {
        let text = "entity_type;entity_id;key;ts;bool_v;str_v;long_v;dbl_v\n\
                    DEVICE;dev1;Temperature;1000;;;;18.9\n\
                    DEVICE;dev1;Humidity;1000;;;;65.0\n";
        let records = read_all(text, SourceVersion::Legacy).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].key, KeyRef::Name("Humidity".into()));
    }

    #[test]
    fn test_reader_reports_line_of_bad_row() {
        let text = "DEVICE;dev1;Temperature;1000;;;;18.9\n\
                    DEVICE;dev1;Humidity;later;;;;65.0\n";
        let err = read_all(text, SourceVersion::Legacy).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_reader_handles_quoted_fields() {
        let text = "DEVICE;dev1;status;1000;;\"a;b\";;\n";
        let records = read_all(text, SourceVersion::Legacy).unwrap();
        assert_eq!(records[0].slot(ValueSlot::Str), Some("a;b"));
    }

    #[test]
    fn test_open_missing_file_is_input_read() {
        let dir = tempfile::tempdir().unwrap();
        let err = RawRecordReader::open(&dir.path().join("nope.csv"), SourceVersion::Legacy, b';')
            .err()
            .unwrap();
        assert!(matches!(err, Error::InputRead { .. }));
    }

    #[test]
    fn test_open_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ts_kv_1.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "dev1,5,1000,true,,,").unwrap();
        drop(file);

        let records: Vec<RawRecord> = RawRecordReader::open(&path, SourceVersion::V254, b',')
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slot(ValueSlot::Bool), Some("true"));
    }
}
