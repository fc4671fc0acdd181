//! tsw - long-to-wide telemetry converter
//!
//! The main entry point for tsw, handling:
//! - Conversion of a single dump file or a folder of dumps
//! - Validation of configuration and collaborator inputs
//! - Run summaries on stdout, logs on stderr

use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tsw_common::{format_error_human, BatchResult, Error, OutputFormat, StructuredError, SCHEMA_VERSION};
use tsw_config::{
    load_config, ConfigOverrides, MergePolicy, NameField, ResolvedConfig, SourceVersion,
};
use tsw_core::convert::{convert_file, convert_folder, ConvertContext};
use tsw_core::exit_codes::ExitCode;
use tsw_core::keys::KeyDictionary;
use tsw_core::log_event;
use tsw_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use tsw_core::registry::DeviceRegistry;
use tsw_core::summary::{RunMode, RunSummary};
use tsw_store::CsvDirSink;

/// tsw - reshape long-format telemetry dumps into per-device wide CSV files
#[derive(Parser)]
#[command(name = "tsw")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to convert.json (overrides TSW_CONFIG and the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase log verbosity (--verbose, --verbose --verbose)
    #[arg(long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a dump file, or every dump in a folder, into per-device files
    Convert(ConvertArgs),

    /// Validate configuration, registry, key dictionary, and denylist
    Check(CheckArgs),

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Dump file, or folder of dumps
    input: PathBuf,

    /// Device registry (CSV dump of the device table, or devices .json)
    devices: PathBuf,

    /// Directory receiving one <device>.csv per registered device
    output_dir: PathBuf,

    /// Platform release that produced the dump
    #[arg(short = 'v', long, value_enum)]
    source_version: Option<SourceVersion>,

    /// Key dictionary (key;key_id) for numeric source versions
    #[arg(long)]
    keys: Option<PathBuf>,

    /// Denylist file ({"remove": [...]})
    #[arg(long)]
    denylist: Option<PathBuf>,

    /// Behavior when an existing output has a different header
    #[arg(long, value_enum)]
    merge_policy: Option<MergePolicy>,

    /// Registry field used to name output files
    #[arg(long, value_enum)]
    name_field: Option<NameField>,

    /// Field delimiter for inputs and outputs
    #[arg(long)]
    delimiter: Option<char>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Device registry to validate
    devices: PathBuf,

    /// Key dictionary to validate
    #[arg(long)]
    keys: Option<PathBuf>,

    /// Denylist file to validate
    #[arg(long)]
    denylist: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = LogLevel::from_flags(cli.global.quiet, cli.global.verbose);
    let mut log_config = LogConfig::from_env(cli_level, cli.global.log_format);
    if cli.global.no_color {
        log_config = log_config.without_color();
    }
    init_logging(&log_config);

    let exit_code = match cli.command {
        None => {
            let _ = Cli::command().print_help();
            ExitCode::ArgsError
        }
        Some(Commands::Convert(args)) => run_convert(&cli.global, &args),
        Some(Commands::Check(args)) => run_check(&cli.global, &args),
        Some(Commands::Version) => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_convert(global: &GlobalOpts, args: &ConvertArgs) -> ExitCode {
    let run_id = generate_run_id();
    let log = LogContext::new(&run_id);

    let overrides = ConfigOverrides {
        source_version: args.source_version,
        delimiter: args.delimiter,
        merge_policy: args.merge_policy,
        name_field: args.name_field,
        keys: args.keys.clone(),
        denylist: args.denylist.clone(),
    };
    let resolved = match load_config(global.config.as_deref(), &overrides) {
        Ok(resolved) => resolved,
        Err(e) => return output_error(global, &run_id, &e),
    };
    log_config_loaded(&log, &resolved);

    let ctx = match ConvertContext::load(&resolved, &args.devices, log.clone()) {
        Ok(ctx) => ctx,
        Err(e) => return output_error(global, &run_id, &e),
    };

    let config = &ctx.config;
    let mut sink = match CsvDirSink::open(
        &args.output_dir,
        config.delimiter_byte(),
        config.merge_policy,
        ctx.denylist.clone(),
    ) {
        Ok(sink) => sink,
        Err(e) => return output_error(global, &run_id, &e),
    };

    let mode = if args.input.is_dir() {
        RunMode::Folder
    } else {
        RunMode::File
    };
    log_event!(
        log,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        format!(
            "converting {} into {}",
            args.input.display(),
            args.output_dir.display()
        ),
        source_version = config.source_version.as_str(),
        merge_policy = tracing::field::display(config.merge_policy),
        denylisted = ctx.denylist.len() as u64
    );

    let result = match mode {
        RunMode::Folder => convert_folder(&args.input, &ctx, &mut sink),
        RunMode::File => convert_file(&args.input, &ctx, &mut sink)
            .map(|report| BatchResult::new(vec![report], Vec::new())),
    };

    let files = match result {
        Ok(files) => files,
        Err(e) => return output_error(global, &run_id, &e),
    };

    let summary = RunSummary::new(
        &run_id,
        mode,
        &args.input,
        &args.output_dir,
        config,
        files,
    );
    let exit_code = summary.exit_code();
    log_event!(
        log,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Write,
        format!(
            "{} of {} files converted",
            summary.files.summary.succeeded, summary.files.summary.total
        ),
        devices = summary.devices_written as u64,
        rows = summary.rows_written as u64,
        exit_code = exit_code.as_i32() as i64
    );

    match global.format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Summary => println!("{}", summary.one_line()),
        OutputFormat::Exitcode => {}
        OutputFormat::Md => print!("{}", summary.to_markdown()),
    }

    exit_code
}

fn log_config_loaded(log: &LogContext, resolved: &ResolvedConfig) {
    let path = resolved
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    log_event!(
        log,
        INFO,
        event_names::CONFIG_LOADED,
        Stage::Init,
        format!("settings from {}", resolved.source),
        path = path.as_str(),
        source_version = resolved.config.source_version.as_str()
    );
}

/// Result of one validation step of `tsw check`.
#[derive(Debug, Serialize)]
struct CheckResult {
    check: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<StructuredError>,
}

impl CheckResult {
    fn ok(check: &'static str, path: Option<PathBuf>, count: usize) -> Self {
        CheckResult {
            check,
            status: "ok",
            path,
            count: Some(count),
            warnings: Vec::new(),
            error: None,
        }
    }

    fn failed(check: &'static str, path: Option<PathBuf>, err: &Error) -> Self {
        CheckResult {
            check,
            status: "error",
            path,
            count: None,
            warnings: Vec::new(),
            error: Some(StructuredError::from(err)),
        }
    }
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> ExitCode {
    let run_id = generate_run_id();
    let mut results: Vec<CheckResult> = Vec::new();
    let mut first_error: Option<ExitCode> = None;
    let mut record_error = |results: &mut Vec<CheckResult>, result: CheckResult, err: &Error| {
        first_error.get_or_insert(ExitCode::from_error(err));
        results.push(result);
    };

    let overrides = ConfigOverrides {
        keys: args.keys.clone(),
        denylist: args.denylist.clone(),
        ..ConfigOverrides::default()
    };
    let resolved = match load_config(global.config.as_deref(), &overrides) {
        Ok(resolved) => {
            results.push(CheckResult::ok("config", resolved.path.clone(), 1));
            resolved
        }
        Err(e) => {
            record_error(
                &mut results,
                CheckResult::failed("config", global.config.clone(), &e),
                &e,
            );
            // Remaining checks still run against the defaults
            ResolvedConfig {
                config: Default::default(),
                path: None,
                source: Default::default(),
            }
        }
    };
    let config = &resolved.config;
    let delimiter = config.delimiter_byte();

    match DeviceRegistry::load(&args.devices, delimiter, config.name_field) {
        Ok(registry) => {
            let mut result = CheckResult::ok("registry", Some(args.devices.clone()), registry.len());
            for (name, ids) in registry.duplicate_file_names() {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                result.warnings.push(format!(
                    "devices {} share the output file name {}",
                    ids.join(", "),
                    name
                ));
            }
            results.push(result);
        }
        Err(e) => record_error(
            &mut results,
            CheckResult::failed("registry", Some(args.devices.clone()), &e),
            &e,
        ),
    }

    if let Some(ref path) = config.keys {
        match KeyDictionary::load(path, delimiter) {
            Ok(dict) => results.push(CheckResult::ok("keys", Some(path.clone()), dict.len())),
            Err(e) => record_error(
                &mut results,
                CheckResult::failed("keys", Some(path.clone()), &e),
                &e,
            ),
        }
    }

    match resolved.denylist() {
        Ok(denylist) => results.push(CheckResult::ok(
            "denylist",
            config.denylist.clone(),
            denylist.len(),
        )),
        Err(e) => record_error(
            &mut results,
            CheckResult::failed("denylist", config.denylist.clone(), &e),
            &e,
        ),
    }

    let exit_code = first_error.unwrap_or(ExitCode::Clean);
    let all_ok = exit_code.is_success();

    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "run_id": run_id,
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "status": if all_ok { "ok" } else { "error" },
            "checks": results,
        })),
        OutputFormat::Summary => {
            let failed = results.iter().filter(|r| r.status != "ok").count();
            println!(
                "[{}] check: {} passed, {} failed",
                run_id,
                results.len() - failed,
                failed
            );
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Md => {
            println!("# tsw check");
            println!();
            for r in &results {
                let mark = if r.status == "ok" { "✓" } else { "✗" };
                let detail = match (&r.error, r.count) {
                    (Some(err), _) => err.message.clone(),
                    (None, Some(count)) => format!("{} entries", count),
                    (None, None) => String::new(),
                };
                println!("- {} {}: {}", mark, r.check, detail);
                for w in &r.warnings {
                    println!("  - warning: {}", w);
                }
            }
        }
    }

    exit_code
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "tsw_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json => print_json(&version_info),
        OutputFormat::Exitcode => {}
        _ => {
            println!("tsw {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

/// Report a run-aborting error in the requested format and map it to an
/// exit code.
fn output_error(global: &GlobalOpts, run_id: &str, error: &Error) -> ExitCode {
    let exit_code = ExitCode::from_error(error);
    tracing::error!(
        target: event_names::RUN_FAILED,
        run_id = run_id,
        code = error.code() as u64,
        "{}",
        error
    );

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": exit_code.code_name(),
                "error": StructuredError::from(error),
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{}", error),
            }
        }
        OutputFormat::Summary => {
            eprintln!("[{}] {}: {}", run_id, exit_code.code_name(), error);
        }
        OutputFormat::Exitcode => {}
        OutputFormat::Md => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(error, use_color));
        }
    }

    exit_code
}
