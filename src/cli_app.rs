//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use stalerank::core::config::Config;
use stalerank::core::errors::StaleRankError;
use stalerank::dataset::{self, LoadedRecords, Strictness};
use stalerank::export::{self, ExportSummary, FsSizeSource};
use stalerank::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use stalerank::scorer::engine::ScoringEngine;
use stalerank::scorer::record::ScoredItem;

/// Rows shown by `score` when `--top` is not given.
const DEFAULT_DISPLAY_ROWS: usize = 20;

/// stalerank: rank indexed files by how likely they are to need attention.
#[derive(Debug, Parser)]
#[command(
    name = "stalerank",
    author,
    version,
    about = "Heuristic priority ranking for indexed files",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Score a record file and write the ranked output.
    Score(ScoreArgs),
    /// Export connector tables from the index database to record files.
    Export(ExportArgs),
    /// Inspect the effective configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ScoreArgs {
    /// Record file to read (defaults to `paths.input_path`).
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,
    /// Ranked output file (defaults to `paths.output_path`).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Keep only the N highest-priority items.
    #[arg(long, value_name = "N")]
    top: Option<usize>,
    /// Fail on the first malformed record instead of skipping it.
    #[arg(long)]
    strict: bool,
    /// Include the per-heuristic factors in the output.
    #[arg(long)]
    explain: bool,
    /// Evaluate freshness against this Unix timestamp instead of the clock.
    #[arg(long, value_name = "UNIX_SECS", allow_hyphen_values = true)]
    now: Option<i64>,
}

#[derive(Debug, Clone, Args, Default)]
struct ExportArgs {
    /// Index database (defaults to `export.db_path`).
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
    /// Connector table to export; repeat for several (defaults to `export.connector_tables`).
    #[arg(long = "table", value_name = "NAME")]
    tables: Vec<String>,
    /// Directory for `items.json` and the per-table files.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Only write the merged `items.json`.
    #[arg(long)]
    no_per_table: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file location.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<StaleRankError> for CliError {
    fn from(err: StaleRankError) -> Self {
        match err {
            StaleRankError::InvalidConfig { .. }
            | StaleRankError::MissingConfig { .. }
            | StaleRankError::ConfigParse { .. } => Self::User(err.to_string()),
            StaleRankError::Serialization {
                context: dataset::OUTPUT_CONTEXT,
                ..
            } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Score(args) => run_score(cli, args),
        Command::Export(args) => run_export(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
        Command::Version(args) => emit_version(cli, args),
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn open_activity_log(config: &Config) -> JsonlWriter {
    JsonlWriter::open(JsonlConfig::from_paths(&config.paths))
}

/// Log a fatal error to the activity log and hand it back for the exit path.
fn log_failure(log: &mut JsonlWriter, command: &str, err: StaleRankError) -> CliError {
    log.write_entry(&LogEntry::from_error(&err, Severity::Critical).with_command(command));
    log.flush();
    err.into()
}

// ---------------------------------------------------------------------------
// score
// ---------------------------------------------------------------------------

fn run_score(cli: &Cli, args: &ScoreArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    if args.strict {
        config.input.strict = true;
    }
    let input = args
        .input
        .clone()
        .unwrap_or_else(|| config.paths.input_path.clone());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.paths.output_path.clone());
    let now = args.now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let config_hash = config.stable_hash()?;
    let started = Instant::now();

    let mut log = open_activity_log(&config);
    let mut entry = LogEntry::new(EventType::RunStart, Severity::Info).with_command("score");
    entry.path = Some(input.display().to_string());
    entry.config_hash = Some(config_hash.clone());
    log.write_entry(&entry);

    let engine =
        ScoringEngine::from_config(&config).map_err(|e| log_failure(&mut log, "score", e))?;
    let loaded = dataset::load_records(&input, Strictness::from_flag(config.input.strict))
        .map_err(|e| log_failure(&mut log, "score", e))?;
    for rejection in &loaded.rejected {
        log.write_entry(&LogEntry::from_error(rejection, Severity::Warning).with_command("score"));
        if cli.verbose {
            eprintln!("{} {rejection}", "skipped:".yellow());
        }
    }

    let mut ranked = engine.score_batch(&loaded.records, now);
    if let Some(top) = args.top {
        ranked.truncate(top);
    }
    dataset::write_ranked(&output, &ranked, args.explain)
        .map_err(|e| log_failure(&mut log, "score", e))?;

    let mut entry = LogEntry::new(EventType::ScoreComplete, Severity::Info).with_command("score");
    entry.path = Some(output.display().to_string());
    entry.records_in = Some(loaded.total());
    entry.records_out = Some(ranked.len());
    entry.rejected = Some(loaded.rejected.len());
    entry.duration_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
    entry.ok = Some(true);
    entry.config_hash = Some(config_hash);
    log.write_entry(&entry);
    log.flush();

    let shown = &ranked[..ranked.len().min(args.top.unwrap_or(DEFAULT_DISPLAY_ROWS))];
    let report = ScoreReport {
        input: &input,
        output: &output,
        now,
        loaded: &loaded,
        written: ranked.len(),
        shown,
        explain: args.explain,
    };
    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                print_score_report(&report);
            }
        }
        OutputMode::Json => write_json_line(&score_report_json(&report)?)?,
    }
    Ok(())
}

struct ScoreReport<'a> {
    input: &'a std::path::Path,
    output: &'a std::path::Path,
    now: i64,
    loaded: &'a LoadedRecords,
    written: usize,
    shown: &'a [ScoredItem],
    explain: bool,
}

fn print_score_report(report: &ScoreReport<'_>) {
    println!("{}", "Priority Ranking".bold());
    println!("  Input:    {}", report.input.display());
    println!(
        "  Records:  {} scored, {} skipped",
        report.loaded.records.len(),
        report.loaded.rejected.len()
    );
    println!("  Output:   {} ({} items)", report.output.display(), report.written);
    println!();

    if report.shown.is_empty() {
        println!("  No records to rank.");
        return;
    }

    if report.explain {
        println!(
            "  {:>3}  {:>7}  {:>5} {:>5} {:>5} {:>5} {:>5} {:>5}  {:<50}",
            "#", "Score", "type", "fresh", "name", "size", "depth", "folder", "Path"
        );
    } else {
        println!("  {:>3}  {:>7}  {:<50}", "#", "Score", "Path");
    }
    println!("  {}", "-".repeat(if report.explain { 100 } else { 64 }));

    for (i, item) in report.shown.iter().enumerate() {
        let score = format!("{:>7.1}", item.score);
        let score = if item.score < 250.0 {
            score.green()
        } else if item.score < 500.0 {
            score.yellow()
        } else {
            score.normal()
        };
        let path = truncate_path(&item.path, 50);
        match (report.explain, &item.factors) {
            (true, Some(f)) => println!(
                "  {:>3}  {score}  {:>5.2} {:>5.2} {:>5.2} {:>5.2} {:>5.2} {:>5.2}  {path}",
                i + 1,
                f.file_type,
                f.freshness,
                f.filename,
                f.size,
                f.depth,
                f.folder,
            ),
            _ => println!("  {:>3}  {score}  {path}", i + 1),
        }
    }
    if report.written > report.shown.len() {
        println!(
            "  ... {} more in {}",
            report.written - report.shown.len(),
            report.output.display()
        );
    }
}

fn score_report_json(report: &ScoreReport<'_>) -> Result<Value, CliError> {
    let rejected: Vec<Value> = report
        .loaded
        .rejected
        .iter()
        .map(|err| {
            json!({
                "code": err.code(),
                "error": err.to_string(),
            })
        })
        .collect();
    let items = if report.explain {
        serde_json::to_value(report.shown)?
    } else {
        let plain: Vec<ScoredItem> = report
            .shown
            .iter()
            .cloned()
            .map(ScoredItem::without_factors)
            .collect();
        serde_json::to_value(plain)?
    };
    Ok(json!({
        "command": "score",
        "input": report.input.to_string_lossy(),
        "output": report.output.to_string_lossy(),
        "now": report.now,
        "records_in": report.loaded.total(),
        "scored": report.loaded.records.len(),
        "rejected": rejected,
        "written": report.written,
        "items": items,
    }))
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

fn run_export(cli: &Cli, args: &ExportArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    if let Some(db) = &args.db {
        config.export.db_path.clone_from(db);
    }
    if !args.tables.is_empty() {
        config.export.connector_tables.clone_from(&args.tables);
    }
    if let Some(dir) = &args.output_dir {
        config.export.output_dir.clone_from(dir);
    }
    if args.no_per_table {
        config.export.write_per_table = false;
    }

    let mut log = open_activity_log(&config);
    let mut entry = LogEntry::new(EventType::RunStart, Severity::Info).with_command("export");
    entry.path = Some(config.export.db_path.display().to_string());
    entry.config_hash = Some(config.stable_hash()?);
    log.write_entry(&entry);

    let summary = export::export_all(&config.export, &FsSizeSource, &mut log)
        .map_err(|e| log_failure(&mut log, "export", e))?;
    log.flush();

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                print_export_summary(&summary);
            }
        }
        OutputMode::Json => {
            let tables: Vec<Value> = summary
                .tables
                .iter()
                .map(|t| {
                    json!({
                        "table": t.table,
                        "exported": t.exported,
                        "skipped": t.skipped,
                        "folders": t.folders,
                        "output": t.output.as_ref().map(|p| p.to_string_lossy()),
                    })
                })
                .collect();
            let payload = json!({
                "command": "export",
                "db": config.export.db_path.to_string_lossy(),
                "tables": tables,
                "records": summary.records.len(),
                "skipped": summary.skipped(),
                "output": summary.merged_path.to_string_lossy(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_export_summary(summary: &ExportSummary) {
    println!("{}", "Index Export".bold());
    for table in &summary.tables {
        let skipped = if table.skipped > 0 {
            format!("{} skipped", table.skipped).yellow()
        } else {
            "0 skipped".normal()
        };
        println!(
            "  {:<32} {:>7} files  {:>6} folders  {skipped}",
            table.table, table.exported, table.folders
        );
    }
    println!();
    println!(
        "  {} records written to {}",
        summary.records.len(),
        summary.merged_path.display()
    );
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("{} {e}", "Configuration is INVALID:".red());
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// version / output helpers
// ---------------------------------------------------------------------------

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("stalerank {version}");
            if args.verbose || cli.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "stalerank",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn truncate_path(path: &str, max_chars: usize) -> String {
    let count = path.chars().count();
    if count <= max_chars {
        path.to_string()
    } else {
        let tail: String = path.chars().skip(count - (max_chars - 3)).collect();
        format!("...{tail}")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("STALERANK_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let parsed = Cli::try_parse_from(["stalerank", "score", "--json", "--no-color", "-v"]);
        assert!(parsed.is_ok());
        assert!(Cli::try_parse_from(["stalerank", "score", "-v", "-q"]).is_err());
    }

    #[test]
    fn parses_subcommands() {
        let cases = [
            vec!["stalerank", "score", "--input", "a.json", "--output", "b.json"],
            vec!["stalerank", "score", "--top", "10", "--strict", "--explain"],
            vec!["stalerank", "score", "--now", "-5"],
            vec!["stalerank", "export", "--db", "x.db", "--table", "a", "--table", "b"],
            vec!["stalerank", "export", "--output-dir", "out", "--no-per-table"],
            vec!["stalerank", "config", "path"],
            vec!["stalerank", "config", "show"],
            vec!["stalerank", "config", "validate"],
            vec!["stalerank", "version", "--verbose"],
        ];

        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn repeated_tables_are_collected_in_order() {
        let cli = Cli::try_parse_from(["stalerank", "export", "--table", "b", "--table", "a"])
            .expect("parse");
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.tables, ["b", "a"]);
    }

    #[test]
    fn completions_support_bash_zsh_and_fish() {
        for shell in ["bash", "zsh", "fish"] {
            let parsed = Cli::try_parse_from(["stalerank", "completions", shell]);
            assert!(parsed.is_ok(), "failed shell parse for {shell}");
        }
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(resolve_output_mode(true, Some("human"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("json"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("human"), false), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None, true), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, Some("bogus"), false), OutputMode::Json);
    }

    #[test]
    fn library_errors_map_to_exit_codes() {
        let user: CliError = StaleRankError::InvalidConfig {
            details: "x".to_string(),
        }
        .into();
        assert_eq!(user.exit_code(), 1);

        let runtime: CliError = StaleRankError::MalformedRecord {
            index: 3,
            reason: "bad".to_string(),
        }
        .into();
        assert_eq!(runtime.exit_code(), 2);

        let unreadable: CliError = StaleRankError::Serialization {
            context: dataset::INPUT_CONTEXT,
            details: "EOF while parsing".to_string(),
        }
        .into();
        assert_eq!(unreadable.exit_code(), 2);

        let unwritable: CliError = StaleRankError::Serialization {
            context: dataset::OUTPUT_CONTEXT,
            details: "key must be a string".to_string(),
        }
        .into();
        assert_eq!(unwritable.exit_code(), 3);
    }

    #[test]
    fn truncate_path_is_char_safe() {
        assert_eq!(truncate_path("/a/b", 10), "/a/b");
        let long = format!("/{}/报告.pdf", "文档".repeat(30));
        let short = truncate_path(&long, 12);
        assert!(short.starts_with("..."));
        assert_eq!(short.chars().count(), 12);
        assert!(short.ends_with("报告.pdf"));
    }
}
