//! Output sink seam.
//!
//! The conversion driver hands fully governed per-device tables to a
//! [`TableSink`]; the sink owns naming, merge policy, and persistence.

use std::fs;
use std::path::{Path, PathBuf};

use tsw_common::{Error, Result};
use tsw_config::{Denylist, MergePolicy};

use crate::strategy::{inspect, FileState};
use crate::table::WideTable;
use crate::writer::{write_with_state, WriteOutcome};
use crate::OUTPUT_EXTENSION;

/// Destination for per-device wide tables.
pub trait TableSink {
    /// Location a table stored under `name` is written to.
    fn path_for(&self, name: &str) -> PathBuf;

    /// State of the destination for `name` relative to `header`.
    fn inspect(&self, name: &str, header: &[String]) -> Result<FileState>;

    /// Persist a governed table under `name`.
    fn write(&mut self, name: &str, table: &WideTable) -> Result<WriteOutcome>;
}

/// One `<name>.csv` per device inside an output directory.
#[derive(Debug, Clone)]
pub struct CsvDirSink {
    dir: PathBuf,
    delimiter: u8,
    policy: MergePolicy,
    denylist: Denylist,
}

impl CsvDirSink {
    /// Open a sink, creating the output directory if absent.
    pub fn open(
        dir: impl Into<PathBuf>,
        delimiter: u8,
        policy: MergePolicy,
        denylist: Denylist,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| Error::OutputWrite {
            path: dir.clone(),
            source,
        })?;
        Ok(CsvDirSink {
            dir,
            delimiter,
            policy,
            denylist,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }
}

impl TableSink for CsvDirSink {
    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, OUTPUT_EXTENSION))
    }

    fn inspect(&self, name: &str, header: &[String]) -> Result<FileState> {
        inspect(&self.path_for(name), header, self.delimiter)
    }

    fn write(&mut self, name: &str, table: &WideTable) -> Result<WriteOutcome> {
        let path = self.path_for(name);
        let state = inspect(&path, &table.header(), self.delimiter)?;
        write_with_state(
            &path,
            table,
            &state,
            self.policy,
            &self.denylist,
            self.delimiter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::WriteStrategy;
    use crate::table::WideRow;

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let sink = CsvDirSink::open(&out, b';', MergePolicy::Merge, Denylist::empty()).unwrap();
        assert!(out.is_dir());
        assert_eq!(sink.path_for("SensorA"), out.join("SensorA.csv"));
    }

    #[test]
    fn test_second_write_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            CsvDirSink::open(dir.path(), b';', MergePolicy::Merge, Denylist::empty()).unwrap();
        let first = WideTable::from_rows([WideRow::new(1).with_cell("A", "1")]);
        let second = WideTable::from_rows([WideRow::new(2).with_cell("A", "2")]);

        assert_eq!(
            sink.write("dev", &first).unwrap().strategy,
            WriteStrategy::Create
        );
        assert_eq!(
            sink.inspect("dev", &second.header()).unwrap(),
            FileState::SameSchema
        );
        assert_eq!(
            sink.write("dev", &second).unwrap().strategy,
            WriteStrategy::Append
        );
        assert_eq!(
            fs::read_to_string(sink.path_for("dev")).unwrap(),
            "ts;A\n1;1\n2;2\n"
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            CsvDirSink::open(dir.path(), b',', MergePolicy::Merge, Denylist::empty()).unwrap();
        let table = WideTable::from_rows([WideRow::new(1).with_cell("A", "x").with_cell("B", "y")]);
        let table = crate::schema::govern(table, &Denylist::empty());
        sink.write("dev", &table).unwrap();
        assert_eq!(
            fs::read_to_string(sink.path_for("dev")).unwrap(),
            "ts,A,B\n1,x,y\n"
        );
    }
}
