//! Conversion driver: one dump file, or a folder of them, into per-device
//! wide files.
//!
//! Per file the pipeline is read → decode → group → pivot → govern →
//! filter → write. Single-file mode propagates every error. Folder mode
//! records file-scoped errors in a [`BatchResult`] and moves on; run-scoped
//! errors (unwritable or corrupt output) stop the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tsw_common::{BatchResult, EntityId, Error, ErrorScope, Result};
use tsw_config::{ConvertConfig, Denylist, MergePolicy, ResolvedConfig, SourceVersion};
use tsw_store::{govern, FileState, TableSink, WideTable, WriteStrategy};

use crate::decode::decode;
use crate::filter::filter_registered;
use crate::group::group_by_entity;
use crate::input::RawRecordReader;
use crate::keys::KeyDictionary;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::pivot::pivot;
use crate::registry::DeviceRegistry;

/// Everything a conversion needs besides the input and the sink.
#[derive(Debug, Clone)]
pub struct ConvertContext {
    pub config: ConvertConfig,
    pub keys: Option<KeyDictionary>,
    pub registry: DeviceRegistry,
    pub denylist: Denylist,
    pub log: LogContext,
}

impl ConvertContext {
    pub fn new(
        config: ConvertConfig,
        keys: Option<KeyDictionary>,
        registry: DeviceRegistry,
        denylist: Denylist,
        log: LogContext,
    ) -> Self {
        ConvertContext {
            config,
            keys,
            registry,
            denylist,
            log,
        }
    }

    /// Load the registry, key dictionary, and denylist named by the
    /// resolved configuration.
    pub fn load(resolved: &ResolvedConfig, devices: &Path, log: LogContext) -> Result<Self> {
        let config = resolved.config.clone();
        let delimiter = config.delimiter_byte();

        let registry = DeviceRegistry::load(devices, delimiter, config.name_field)?;
        log_event!(
            log,
            INFO,
            event_names::REGISTRY_LOADED,
            Stage::Init,
            format!("{} devices registered", registry.len()),
            path = tracing::field::display(devices.display()),
            devices = registry.len() as u64
        );

        let keys = match config.keys {
            Some(ref path) => {
                let dict = KeyDictionary::load(path, delimiter)?;
                log_event!(
                    log,
                    INFO,
                    event_names::KEYS_LOADED,
                    Stage::Init,
                    format!("{} key ids mapped", dict.len()),
                    path = tracing::field::display(path.display()),
                    keys = dict.len() as u64
                );
                Some(dict)
            }
            None => None,
        };

        let denylist = resolved.denylist()?;

        Ok(ConvertContext::new(config, keys, registry, denylist, log))
    }

    pub fn source_version(&self) -> SourceVersion {
        self.config.source_version
    }
}

/// One device file written while converting an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceWrite {
    pub entity_id: EntityId,
    pub file: PathBuf,
    pub strategy: WriteStrategy,
    pub rows: usize,
}

/// Outcome of converting one input file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,

    /// Raw records read.
    pub records: usize,

    /// Records with more than one populated value slot.
    pub ambiguous: usize,

    /// Cells replaced by a later record with the same `(ts, key)`.
    pub overwritten: usize,

    /// Distinct entities seen in the input.
    pub entities: usize,

    /// Entities without a registry entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<EntityId>,

    pub writes: Vec<DeviceWrite>,
}

impl FileReport {
    pub fn rows_written(&self) -> usize {
        self.writes.iter().map(|w| w.rows).sum()
    }
}

/// Pivot every entity of one input file into governed wide tables.
fn build_tables(
    path: &Path,
    ctx: &ConvertContext,
    log: &LogContext,
    report: &mut FileReport,
) -> Result<BTreeMap<EntityId, WideTable>> {
    let reader = RawRecordReader::open(path, ctx.source_version(), ctx.config.delimiter_byte())?;

    let mut resolved = Vec::new();
    for raw in reader {
        let raw = raw?;
        report.records += 1;
        if raw.populated_slots() > 1 {
            report.ambiguous += 1;
        }
        resolved.push(decode(&raw, ctx.keys.as_ref())?);
    }

    if report.ambiguous > 0 {
        log_event!(
            log,
            WARN,
            event_names::DECODE_AMBIGUOUS,
            Stage::Decode,
            format!(
                "{} records had more than one value slot set; the first in priority order was used",
                report.ambiguous
            ),
            records = report.ambiguous as u64
        );
    }

    let groups = group_by_entity(resolved);
    report.entities = groups.len();

    let mut tables = BTreeMap::new();
    for (entity_id, observations) in groups {
        let pivoted = pivot(observations);
        report.overwritten += pivoted.overwritten;
        tables.insert(entity_id, govern(pivoted.table, &ctx.denylist));
    }

    if report.overwritten > 0 {
        log_event!(
            log,
            DEBUG,
            event_names::PIVOT_OVERWRITTEN,
            Stage::Pivot,
            format!("{} duplicate (ts, key) cells replaced", report.overwritten),
            cells = report.overwritten as u64
        );
    }

    Ok(tables)
}

/// Convert one input file and write every registered device's table.
pub fn convert_file(
    path: &Path,
    ctx: &ConvertContext,
    sink: &mut impl TableSink,
) -> Result<FileReport> {
    let log = ctx.log.with_input(path.display().to_string());
    log_event!(
        log,
        INFO,
        event_names::FILE_STARTED,
        Stage::Read,
        format!("converting {}", path.display()),
        source_version = ctx.source_version().as_str()
    );

    let mut report = FileReport {
        input: path.to_path_buf(),
        ..FileReport::default()
    };

    let tables = build_tables(path, ctx, &log, &mut report)?;

    let filtered = filter_registered(tables, &ctx.registry);
    for entity_id in &filtered.dropped {
        log_event!(
            log,
            DEBUG,
            event_names::DEVICE_UNKNOWN,
            Stage::Filter,
            format!("{} is not registered; skipped", entity_id),
            entity_id = entity_id.as_str()
        );
    }
    report.dropped = filtered.dropped;

    let mut targets = Vec::with_capacity(filtered.kept.len());
    for (entity_id, table) in filtered.kept {
        if let Some(name) = ctx.registry.file_name(&entity_id) {
            targets.push((entity_id, name.to_string(), table));
        }
    }

    // Under reject, refuse before anything is written for this input
    if ctx.config.merge_policy == MergePolicy::Reject {
        check_reject(&targets, &*sink)?;
    }

    for (entity_id, name, table) in targets {
        let outcome = sink.write(&name, &table)?;
        log_event!(
            log,
            INFO,
            event_names::DEVICE_WRITTEN,
            Stage::Write,
            format!(
                "{} rows to {} ({})",
                outcome.rows,
                outcome.path.display(),
                outcome.strategy
            ),
            entity_id = entity_id.as_str(),
            strategy = tracing::field::display(outcome.strategy),
            rows = outcome.rows as u64
        );
        report.writes.push(DeviceWrite {
            entity_id,
            file: outcome.path,
            strategy: outcome.strategy,
            rows: outcome.rows,
        });
    }

    log_event!(
        log,
        INFO,
        event_names::FILE_CONVERTED,
        Stage::Write,
        format!(
            "{} records, {} devices written, {} unregistered",
            report.records,
            report.writes.len(),
            report.dropped.len()
        ),
        records = report.records as u64,
        devices = report.writes.len() as u64,
        rows = report.rows_written() as u64
    );

    Ok(report)
}

/// Header conflicts that the reject policy refuses.
///
/// Each output file is compared against its on-disk header once. Devices
/// that share an output file must also agree with each other, since the
/// first write would otherwise fix the header the later ones conflict with.
fn check_reject(targets: &[(EntityId, String, WideTable)], sink: &impl TableSink) -> Result<()> {
    let mut planned: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (_, name, table) in targets {
        let header = table.header();
        if let Some(first) = planned.get(name.as_str()) {
            if *first != header {
                return Err(Error::IncompatibleSchema {
                    path: sink.path_for(name),
                    existing: first.clone(),
                    computed: header,
                });
            }
            continue;
        }
        if let FileState::DifferentSchema { existing } = sink.inspect(name, &header)? {
            return Err(Error::IncompatibleSchema {
                path: sink.path_for(name),
                existing,
                computed: header,
            });
        }
        planned.insert(name.as_str(), header);
    }
    Ok(())
}

/// Input files of a folder run, oldest first.
///
/// Only regular files whose name starts with `prefix` qualify. Ties on
/// modification time are broken by file name.
pub fn list_inputs(dir: &Path, prefix: &str, log: &LogContext) -> Result<Vec<PathBuf>> {
    let read_error = |source: std::io::Error| Error::InputRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut inputs: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let metadata = fs::metadata(&path).map_err(|source| Error::InputRead {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            continue;
        }
        if !name.starts_with(prefix) {
            log_event!(
                log,
                INFO,
                event_names::FILE_SKIPPED,
                Stage::Read,
                format!("{} does not start with {:?}; skipped", name, prefix),
                file = name.as_str()
            );
            continue;
        }

        let mtime = metadata.modified().map_err(|source| Error::InputRead {
            path: path.clone(),
            source,
        })?;
        inputs.push((mtime, name, path));
    }

    inputs.sort();
    Ok(inputs.into_iter().map(|(_, _, path)| path).collect())
}

/// Convert every qualifying file of a folder, oldest first.
pub fn convert_folder(
    dir: &Path,
    ctx: &ConvertContext,
    sink: &mut impl TableSink,
) -> Result<BatchResult<FileReport>> {
    let inputs = list_inputs(dir, &ctx.config.input_prefix, &ctx.log)?;
    convert_inputs(&inputs, ctx, sink)
}

/// Convert a list of files in order, isolating file-scoped failures.
pub fn convert_inputs(
    inputs: &[PathBuf],
    ctx: &ConvertContext,
    sink: &mut impl TableSink,
) -> Result<BatchResult<FileReport>> {
    let mut batch = BatchResult::default();

    for path in inputs {
        match convert_file(path, ctx, sink) {
            Ok(report) => batch.add_success(report),
            Err(err) if err.scope() == ErrorScope::File => {
                let log = ctx.log.with_input(path.display().to_string());
                log_event!(
                    log,
                    ERROR,
                    event_names::FILE_FAILED,
                    Stage::Read,
                    format!("{}; continuing with the next file", err),
                    code = err.code() as u64
                );
                batch.add_failure(path.display().to_string(), &err);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Device;
    use tsw_config::NameField;
    use tsw_store::CsvDirSink;

    fn context(config: ConvertConfig, devices: Vec<Device>) -> ConvertContext {
        ConvertContext::new(
            config,
            None,
            DeviceRegistry::from_devices(devices, NameField::Name),
            Denylist::empty(),
            LogContext::new("run-test"),
        )
    }

    #[test]
    fn test_convert_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ts_kv_1.csv");
        fs::write(
            &input,
            "DEVICE;dev1;Temperature;1000;;;;18.9\nDEVICE;dev1;Humidity;1000;;;;65.0\n",
        )
        .unwrap();
        let out = dir.path().join("out");

        let ctx = context(ConvertConfig::default(), vec![Device::new("dev1", "SensorA")]);
        let mut sink = CsvDirSink::open(&out, b';', MergePolicy::Merge, Denylist::empty()).unwrap();
        let report = convert_file(&input, &ctx, &mut sink).unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.entities, 1);
        assert_eq!(report.writes.len(), 1);
        assert_eq!(report.writes[0].strategy, WriteStrategy::Create);
        assert_eq!(
            fs::read_to_string(out.join("SensorA.csv")).unwrap(),
            "ts;Humidity;Temperature\n1000;65.0;18.9\n"
        );
    }

    #[test]
    fn test_ambiguous_records_counted() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ts_kv_1.csv");
        fs::write(&input, "DEVICE;dev1;count;1000;;;5;5.0\n").unwrap();

        let ctx = context(ConvertConfig::default(), vec![Device::new("dev1", "S")]);
        let mut sink =
            CsvDirSink::open(dir.path().join("out"), b';', MergePolicy::Merge, Denylist::empty())
                .unwrap();
        let report = convert_file(&input, &ctx, &mut sink).unwrap();
        assert_eq!(report.ambiguous, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("out").join("S.csv")).unwrap(),
            "ts;count\n1000;5\n"
        );
    }

    #[test]
    fn test_reject_writes_nothing_on_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("A.csv"), "ts;x\n1;1\n").unwrap();

        let input = dir.path().join("ts_kv_1.csv");
        fs::write(
            &input,
            "DEVICE;dev0;y;2;;;7;\nDEVICE;dev1;y;2;;;7;\n",
        )
        .unwrap();

        let config = ConvertConfig {
            merge_policy: MergePolicy::Reject,
            ..ConvertConfig::default()
        };
        let ctx = context(
            config,
            vec![Device::new("dev0", "B"), Device::new("dev1", "A")],
        );
        let mut sink = CsvDirSink::open(&out, b';', MergePolicy::Reject, Denylist::empty()).unwrap();

        let err = convert_file(&input, &ctx, &mut sink).unwrap_err();
        assert!(matches!(err, Error::IncompatibleSchema { .. }));
        assert!(!out.join("B.csv").exists());
        assert_eq!(fs::read_to_string(out.join("A.csv")).unwrap(), "ts;x\n1;1\n");
    }

    #[test]
    fn test_list_inputs_filters_prefix_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ts_kv_b.csv"), "").unwrap();
        fs::write(dir.path().join("ts_kv_a.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("ts_kv_dir")).unwrap();

        let inputs = list_inputs(dir.path(), "ts_kv", &LogContext::new("run-test")).unwrap();
        let names: Vec<String> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("ts_kv_") && n.ends_with(".csv")));
    }

    #[test]
    fn test_list_inputs_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_inputs(&dir.path().join("nope"), "ts_kv", &LogContext::new("r")).unwrap_err();
        assert!(matches!(err, Error::InputRead { .. }));
    }
}
