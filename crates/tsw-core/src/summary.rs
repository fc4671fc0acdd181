//! Run summary payload printed on stdout after `tsw convert`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tsw_common::{BatchResult, SCHEMA_VERSION};
use tsw_config::{ConvertConfig, MergePolicy, SourceVersion};

use crate::convert::FileReport;
use crate::exit_codes::ExitCode;

/// Whether the input was a single dump or a folder of dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    File,
    Folder,
}

/// Everything a caller needs to know about one conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: String,
    pub run_id: String,
    pub generated_at: String,
    pub mode: RunMode,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub source_version: SourceVersion,
    pub merge_policy: MergePolicy,
    pub files: BatchResult<FileReport>,
    pub devices_written: usize,
    pub rows_written: usize,
    pub status: String,
}

impl RunSummary {
    pub fn new(
        run_id: impl Into<String>,
        mode: RunMode,
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        config: &ConvertConfig,
        files: BatchResult<FileReport>,
    ) -> Self {
        let devices_written = files.succeeded.iter().map(|r| r.writes.len()).sum();
        let rows_written = files.succeeded.iter().map(FileReport::rows_written).sum();
        let mut summary = RunSummary {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: run_id.into(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            mode,
            input: input.into(),
            output_dir: output_dir.into(),
            source_version: config.source_version,
            merge_policy: config.merge_policy,
            files,
            devices_written,
            rows_written,
            status: String::new(),
        };
        summary.status = summary.exit_code().code_name().to_string();
        summary
    }

    /// Exit code for the run.
    ///
    /// No input → 1, every file converted → 0, some failed → 3. When every
    /// file failed, the first failure's category decides.
    pub fn exit_code(&self) -> ExitCode {
        let batch = &self.files.summary;
        if batch.total == 0 {
            ExitCode::NoInput
        } else if batch.all_succeeded {
            ExitCode::Clean
        } else if batch.any_succeeded {
            ExitCode::PartialFail
        } else {
            self.files
                .failed
                .first()
                .map(|f| ExitCode::from_category(f.error.category))
                .unwrap_or(ExitCode::InternalError)
        }
    }

    /// One-line status for `--format summary`.
    pub fn one_line(&self) -> String {
        format!(
            "[{}] {}: {}/{} files converted, {} device files written, {} rows",
            self.run_id,
            self.status,
            self.files.summary.succeeded,
            self.files.summary.total,
            self.devices_written,
            self.rows_written
        )
    }

    /// Markdown report for `--format md`.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# tsw conversion\n\n");
        out.push_str(&format!("- Run: `{}`\n", self.run_id));
        out.push_str(&format!("- Input: `{}`\n", self.input.display()));
        out.push_str(&format!("- Output: `{}`\n", self.output_dir.display()));
        out.push_str(&format!("- Source version: {}\n", self.source_version));
        out.push_str(&format!("- Merge policy: {}\n", self.merge_policy));
        out.push_str(&format!("- Status: {}\n\n", self.status));

        if !self.files.succeeded.is_empty() {
            out.push_str("| Input | Records | Device | File | Strategy | Rows |\n");
            out.push_str("|-------|---------|--------|------|----------|------|\n");
            for report in &self.files.succeeded {
                if report.writes.is_empty() {
                    out.push_str(&format!(
                        "| {} | {} | - | - | - | 0 |\n",
                        report.input.display(),
                        report.records
                    ));
                }
                for write in &report.writes {
                    out.push_str(&format!(
                        "| {} | {} | {} | {} | {} | {} |\n",
                        report.input.display(),
                        report.records,
                        write.entity_id,
                        write.file.display(),
                        write.strategy,
                        write.rows
                    ));
                }
            }
        }

        if !self.files.failed.is_empty() {
            out.push_str("\n## Failed inputs\n\n");
            for failure in &self.files.failed {
                out.push_str(&format!(
                    "- `{}`: {} (code {})\n",
                    failure.item_id, failure.error.message, failure.error.code
                ));
            }
        }

        out
    }
}
