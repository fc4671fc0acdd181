//! Executors for the three write strategies.
//!
//! Create and merge-rewrite never touch the target in place: the full file is
//! written to `<name>.tmp` next to it, synced, and renamed over the target.
//! A failure before the rename leaves the original untouched and removes the
//! temporary file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tsw_common::{Error, Result};
use tsw_config::{Denylist, MergePolicy};

use crate::codec;
use crate::schema::govern;
use crate::strategy::{choose_strategy, inspect, FileState, WriteStrategy};
use crate::table::WideTable;

/// Result of writing one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub strategy: WriteStrategy,

    /// Rows contributed by this run.
    pub rows: usize,

    /// Rows in the file after the write, when the whole file was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_rows: Option<usize>,

    /// Header of the file after the write.
    pub header: Vec<String>,
}

/// Inspect the target and write a governed table with the chosen strategy.
pub fn write_table(
    path: &Path,
    table: &WideTable,
    policy: MergePolicy,
    denylist: &Denylist,
    delimiter: u8,
) -> Result<WriteOutcome> {
    let state = inspect(path, &table.header(), delimiter)?;
    write_with_state(path, table, &state, policy, denylist, delimiter)
}

/// Write a governed table given an already inspected file state.
pub fn write_with_state(
    path: &Path,
    table: &WideTable,
    state: &FileState,
    policy: MergePolicy,
    denylist: &Denylist,
    delimiter: u8,
) -> Result<WriteOutcome> {
    let Some(strategy) = choose_strategy(state, policy) else {
        let existing = match state {
            FileState::DifferentSchema { existing } => existing.clone(),
            _ => Vec::new(),
        };
        return Err(Error::IncompatibleSchema {
            path: path.to_path_buf(),
            existing,
            computed: table.header(),
        });
    };

    tracing::debug!(
        path = %path.display(),
        strategy = %strategy,
        rows = table.len(),
        "writing table"
    );

    match strategy {
        WriteStrategy::Create => {
            write_atomic(path, delimiter, |w| codec::write_table_to(w, table))?;
            Ok(WriteOutcome {
                path: path.to_path_buf(),
                strategy,
                rows: table.len(),
                file_rows: Some(table.len()),
                header: table.header(),
            })
        }
        WriteStrategy::Append => {
            append_rows(path, table, delimiter)?;
            Ok(WriteOutcome {
                path: path.to_path_buf(),
                strategy,
                rows: table.len(),
                file_rows: None,
                header: table.header(),
            })
        }
        WriteStrategy::MergeRewrite => {
            let existing = codec::read_table(path, delimiter)?;
            let merged = govern(existing.concat(table.clone()), denylist);
            write_atomic(path, delimiter, |w| codec::write_table_to(w, &merged))?;
            Ok(WriteOutcome {
                path: path.to_path_buf(),
                strategy,
                rows: table.len(),
                file_rows: Some(merged.len()),
                header: merged.header(),
            })
        }
    }
}

/// Sibling temporary path: `SensorA.csv` → `SensorA.csv.tmp`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Helper to rename temp file to final path atomically.
pub fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
    fs::rename(temp_path, final_path).map_err(|source| Error::OutputWrite {
        path: final_path.to_path_buf(),
        source,
    })
}

fn write_atomic<F>(path: &Path, delimiter: u8, fill: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<File>) -> csv::Result<()>,
{
    let temp_path = temp_path_for(path);

    let written = (|| -> io::Result<()> {
        let file = File::create(&temp_path)?;
        let mut writer = codec::csv_writer(file, delimiter);
        fill(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    })();

    if let Err(source) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::OutputWrite {
            path: path.to_path_buf(),
            source,
        });
    }

    if let Err(err) = atomic_rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn append_rows(path: &Path, table: &WideTable, delimiter: u8) -> Result<()> {
    let appended = (|| -> io::Result<()> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        append_or_restore(&mut file, |file| {
            if !ends_with_newline(file)? {
                file.write_all(b"\n")?;
            }
            let mut writer = codec::csv_writer(&mut *file, delimiter);
            codec::write_rows_to(&mut writer, table)?;
            writer.flush()?;
            drop(writer);
            file.sync_all()
        })
    })();

    appended.map_err(|source| Error::OutputWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Run `append` on `file`. If it fails, the file is cut back to the length
/// it had before, so no partial row is left behind.
fn append_or_restore<F>(file: &mut File, append: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let original_len = file.metadata()?.len();
    if let Err(err) = append(file) {
        if let Err(restore) = file.set_len(original_len).and_then(|()| file.sync_all()) {
            tracing::error!(
                original_len,
                error = %restore,
                "could not truncate a failed append"
            );
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::WideRow;

    #[test]
    fn test_failed_append_restores_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SensorA.csv");
        fs::write(&path, "ts;A\n1000;1\n").unwrap();

        let mut file = OpenOptions::new().read(true).append(true).open(&path).unwrap();
        let err = append_or_restore(&mut file, |f| {
            f.write_all(b"2000;2\n3000;")?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();
        drop(file);

        assert_eq!(err.to_string(), "disk full");
        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A\n1000;1\n");
    }

    #[test]
    fn test_successful_append_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SensorA.csv");
        fs::write(&path, "ts;A\n1000;1\n").unwrap();

        let mut file = OpenOptions::new().read(true).append(true).open(&path).unwrap();
        append_or_restore(&mut file, |f| f.write_all(b"2000;2\n")).unwrap();
        drop(file);

        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A\n1000;1\n2000;2\n");
    }

    fn table(rows: Vec<WideRow>) -> WideTable {
        govern(WideTable::from_rows(rows), &Denylist::empty())
    }

    #[test]
    fn test_create_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SensorA.csv");
        let t = table(vec![WideRow::new(1000)
            .with_cell("Temperature", "18.9")
            .with_cell("Humidity", "65.0")]);

        let outcome =
            write_table(&path, &t, MergePolicy::Merge, &Denylist::empty(), b';').unwrap();
        assert_eq!(outcome.strategy, WriteStrategy::Create);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "ts;Humidity;Temperature\n1000;65.0;18.9\n"
        );
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_append_when_header_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.csv");
        fs::write(&path, "ts;A;B\n1;a;b\n").unwrap();
        let t = table(vec![WideRow::new(2).with_cell("A", "x").with_cell("B", "y")]);

        let outcome =
            write_table(&path, &t, MergePolicy::Reject, &Denylist::empty(), b';').unwrap();
        assert_eq!(outcome.strategy, WriteStrategy::Append);
        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A;B\n1;a;b\n2;x;y\n");
    }

    #[test]
    fn test_append_adds_missing_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.csv");
        fs::write(&path, "ts;A\n1;a").unwrap();
        let t = table(vec![WideRow::new(2).with_cell("A", "b")]);

        write_table(&path, &t, MergePolicy::Merge, &Denylist::empty(), b';').unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A\n1;a\n2;b\n");
    }

    #[test]
    fn test_merge_rewrite_on_schema_growth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.csv");
        fs::write(&path, "ts;A\n1;a1\n3;a3\n").unwrap();
        let t = table(vec![WideRow::new(2).with_cell("C", "c2")]);

        let outcome =
            write_table(&path, &t, MergePolicy::Merge, &Denylist::empty(), b';').unwrap();
        assert_eq!(outcome.strategy, WriteStrategy::MergeRewrite);
        assert_eq!(outcome.file_rows, Some(3));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "ts;A;C\n1;a1;\n2;;c2\n3;a3;\n"
        );
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_merge_rewrite_applies_denylist_to_existing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.csv");
        fs::write(&path, "ts;A;error\n1;a;1\n").unwrap();
        let denylist = Denylist::from_keys(["error"]).unwrap();
        let t = govern(
            WideTable::from_rows([WideRow::new(2).with_cell("B", "b")]),
            &denylist,
        );

        write_table(&path, &t, MergePolicy::Merge, &denylist, b';').unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A;B\n1;a;\n2;;b\n");
    }

    #[test]
    fn test_merge_keeps_duplicate_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.csv");
        fs::write(&path, "ts;A\n5;old\n").unwrap();
        let t = table(vec![WideRow::new(5).with_cell("B", "new")]);

        write_table(&path, &t, MergePolicy::Merge, &Denylist::empty(), b';').unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A;B\n5;old;\n5;;new\n");
    }

    #[test]
    fn test_reject_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.csv");
        fs::write(&path, "ts;A\n1;a\n").unwrap();
        let t = table(vec![WideRow::new(2).with_cell("B", "b")]);

        let err =
            write_table(&path, &t, MergePolicy::Reject, &Denylist::empty(), b';').unwrap_err();
        match err {
            Error::IncompatibleSchema {
                existing, computed, ..
            } => {
                assert_eq!(existing, vec!["ts", "A"]);
                assert_eq!(computed, vec!["ts", "B"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A\n1;a\n");
    }

    #[test]
    fn test_corrupt_existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.csv");
        fs::write(&path, "ts;A\nbad;a\n").unwrap();
        let t = table(vec![WideRow::new(2).with_cell("B", "b")]);

        let err =
            write_table(&path, &t, MergePolicy::Merge, &Denylist::empty(), b';').unwrap_err();
        assert!(matches!(err, Error::CorruptOutput { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "ts;A\nbad;a\n");
    }

    #[test]
    fn test_create_failure_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-subdir").join("dev.csv");
        let t = table(vec![WideRow::new(1).with_cell("A", "a")]);

        let err =
            write_table(&path, &t, MergePolicy::Merge, &Denylist::empty(), b';').unwrap_err();
        assert!(matches!(err, Error::OutputWrite { .. }));
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_temp_path_for() {
        assert_eq!(
            temp_path_for(Path::new("/out/Sensor.v2.csv")),
            PathBuf::from("/out/Sensor.v2.csv.tmp")
        );
    }
}
