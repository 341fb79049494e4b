//! Integration tests: CLI smoke tests and full score/export pipelines run
//! through the built binary.

mod common;

use std::fs;
use std::path::Path;

use serde_json::{Value, json};

const NOW: i64 = 1_760_000_000;
const DAY: i64 = 86_400;

fn write_items(dir: &Path, items: &Value) -> String {
    let path = dir.join("items.json");
    fs::write(&path, serde_json::to_string_pretty(items).unwrap()).unwrap();
    path.to_string_lossy().into_owned()
}

fn scenario_items() -> Value {
    json!([
        {
            "filename": "cache.tmp",
            "path": r"C:\Users\x\AppData\tmp\cache.tmp",
            "size": 5_000_000,
            "last_modified": NOW - 200 * DAY
        },
        {
            "filename": "report.pdf",
            "path": r"C:\Users\x\Documents\report.pdf",
            "size": 100_000,
            "last_modified": NOW - DAY
        }
    ])
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: stalerank [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["version", "--json"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = result.json();
    assert_eq!(payload["binary"], "stalerank");
    assert_eq!(payload["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn subcommand_help_flags_work() {
    for subcommand in ["score", "export", "config", "completions", "version"] {
        let result = common::run_cli_case(
            &format!("subcommand_help_{subcommand}"),
            &[subcommand, "--help"],
        );
        assert!(
            result.status.success(),
            "{subcommand} --help failed; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn score_ranks_scenario_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let input = write_items(dir.path(), &scenario_items());
    let output = dir.path().join("out").join("items_scores.json");
    let now = NOW.to_string();

    let result = common::run_cli_case(
        "score_ranks_scenario_records",
        &[
            "score",
            "--config",
            config.to_str().unwrap(),
            "--input",
            &input,
            "--output",
            output.to_str().unwrap(),
            "--now",
            &now,
            "--json",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let ranked = read_json(&output);
    let ranked = ranked.as_array().expect("array output");
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0]["path"], r"C:\Users\x\Documents\report.pdf");
    assert_eq!(ranked[1]["path"], r"C:\Users\x\AppData\tmp\cache.tmp");
    let first = ranked[0]["score"].as_f64().unwrap();
    let second = ranked[1]["score"].as_f64().unwrap();
    assert!((first - 20.0).abs() < 1e-9, "report.pdf score {first}");
    assert!((second - 425.0).abs() < 1e-9, "cache.tmp score {second}");
    assert!(ranked[0].get("factors").is_none());

    let summary = result.json();
    assert_eq!(summary["command"], "score");
    assert_eq!(summary["now"], NOW);
    assert_eq!(summary["scored"], 2);
    assert_eq!(summary["written"], 2);
}

#[test]
fn score_explain_includes_factors() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let input = write_items(dir.path(), &scenario_items());
    let output = dir.path().join("scores.json");
    let now = NOW.to_string();

    let result = common::run_cli_case(
        "score_explain_includes_factors",
        &[
            "score",
            "--config",
            config.to_str().unwrap(),
            "--input",
            &input,
            "--output",
            output.to_str().unwrap(),
            "--now",
            &now,
            "--explain",
            "--top",
            "1",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let ranked = read_json(&output);
    assert_eq!(ranked.as_array().unwrap().len(), 1);
    assert_eq!(ranked[0]["factors"]["folder"], json!(1.0));
    assert_eq!(ranked[0]["factors"]["depth"], json!(0.8));
}

#[test]
fn score_skips_malformed_records_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let input = write_items(
        dir.path(),
        &json!([
            {"filename": "a.pdf", "path": "/srv/a.pdf", "size": 1, "last_modified": NOW},
            {"filename": "b.pdf", "path": "/srv/b.pdf", "size": -4, "last_modified": NOW},
            {"filename": "c.pdf", "path": "/srv/c.pdf", "size": 1}
        ]),
    );
    let output = dir.path().join("scores.json");

    let result = common::run_cli_case(
        "score_skips_malformed_records_by_default",
        &[
            "score",
            "--config",
            config.to_str().unwrap(),
            "--input",
            &input,
            "--output",
            output.to_str().unwrap(),
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let summary = result.json();
    assert_eq!(summary["records_in"], 3);
    assert_eq!(summary["scored"], 1);
    let rejected = summary["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0]["code"], "SRK-2201");

    let activity = fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
    let events: Vec<Value> = activity
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<&str> = events
        .iter()
        .map(|event| event["event"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        ["run_start", "record_rejected", "record_rejected", "score_complete"]
    );
    assert_eq!(events[1]["index"], 1);
    assert_eq!(events[3]["rejected"], 2);
    assert!(events[3]["config_hash"].is_string());
}

#[test]
fn strict_mode_fails_on_malformed_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let input = write_items(
        dir.path(),
        &json!([{"filename": "", "path": "/srv/a", "size": 1, "last_modified": NOW}]),
    );
    let output = dir.path().join("scores.json");

    let result = common::run_cli_case(
        "strict_mode_fails_on_malformed_record",
        &[
            "score",
            "--config",
            config.to_str().unwrap(),
            "--input",
            &input,
            "--output",
            output.to_str().unwrap(),
            "--strict",
        ],
    );
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SRK-2201"), "log: {}", result.log_path.display());
    assert!(!output.exists());
}

#[test]
fn non_array_input_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let input = write_items(dir.path(), &json!({"items": []}));

    let result = common::run_cli_case(
        "non_array_input_is_runtime_error",
        &["score", "--config", config.to_str().unwrap(), "--input", &input],
    );
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SRK-2101"));
}

#[test]
fn missing_input_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let missing = dir.path().join("nope.json");

    let result = common::run_cli_case(
        "missing_input_is_runtime_error",
        &[
            "score",
            "--config",
            config.to_str().unwrap(),
            "--input",
            missing.to_str().unwrap(),
        ],
    );
    assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SRK-3002"));
}

#[test]
fn unbalanced_budgets_are_user_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "[scoring]\ntype_points = 500.0\n");

    let result = common::run_cli_case(
        "unbalanced_budgets_are_user_error",
        &["config", "validate", "--config", config.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    let payload = result.json();
    assert_eq!(payload["valid"], false);
    assert_eq!(payload["code"], "SRK-1001");
}

#[test]
fn missing_explicit_config_is_user_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let result = common::run_cli_case(
        "missing_explicit_config_is_user_error",
        &["score", "--config", missing.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SRK-1002"));
}

#[test]
fn env_overrides_reach_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let input = write_items(dir.path(), &scenario_items());
    let output = dir.path().join("scores.json");
    let now = NOW.to_string();

    let result = common::run_cli_case_with_env(
        "env_overrides_reach_the_engine",
        &[
            "score",
            "--config",
            config.to_str().unwrap(),
            "--input",
            &input,
            "--now",
            &now,
        ],
        &[
            ("STALERANK_OUTPUT_PATH", output.to_str().unwrap()),
            ("STALERANK_RUNTIME_PARALLELISM", "4"),
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let ranked = read_json(&output);
    assert_eq!(ranked[0]["path"], r"C:\Users\x\Documents\report.pdf");
}

#[test]
fn config_show_reports_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let result = common::run_cli_case(
        "config_show_reports_defaults",
        &["config", "show", "--config", config.to_str().unwrap(), "--json"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = result.json();
    assert_eq!(payload["config"]["scoring"]["folder_points"], json!(300.0));
    assert_eq!(payload["config"]["types"]["weights"]["pdf"], json!(1.0));
}

#[cfg(unix)]
#[test]
fn export_writes_merged_items_sorted_by_last_modified() {
    use rusqlite::{Connection, params};

    const FOLDER: &str = r#"{"is_folder": true, "hide_from_search": false}"#;
    const FILE: &str = r#"{"is_folder": false, "hide_from_search": false}"#;

    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let db = dir.path().join("tabular.db");

    // Index paths are joined with `\`; on unix that lands in one file name.
    let root = dir.path().join("root").to_string_lossy().into_owned();
    fs::write(format!("{root}\\new.pdf"), vec![0u8; 300]).unwrap();
    fs::write(format!("{root}\\old.txt"), vec![0u8; 100]).unwrap();

    {
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE index_c (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                title TEXT NOT NULL,
                doc_updated_at TEXT NOT NULL,
                metadata TEXT
            );",
        )
        .unwrap();
        let rows: [(&str, Option<&str>, &str, &str, Option<&str>); 5] = [
            ("r", None, root.as_str(), "2024-01-01 00:00:00+00:00", Some(FOLDER)),
            ("n", Some("r"), "new.pdf", "2024-03-01 08:33:51.318090200+00:00", None),
            ("o", Some("r"), "old.txt", "2023-01-01 00:00:00+00:00", Some(FILE)),
            ("g", Some("r"), "gone.txt", "2023-05-01 00:00:00+00:00", None),
            ("x", Some("missing"), "orphan.txt", "2023-05-01 00:00:00+00:00", None),
        ];
        for (id, parent, title, updated, metadata) in rows {
            conn.execute(
                "INSERT INTO index_c (id, parent_id, title, doc_updated_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, parent, title, updated, metadata],
            )
            .unwrap();
        }
    }

    let out_dir = dir.path().join("output");
    let result = common::run_cli_case(
        "export_writes_merged_items_sorted_by_last_modified",
        &[
            "export",
            "--config",
            config.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--table",
            "index_c",
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--json",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let summary = result.json();
    assert_eq!(summary["records"], 2);
    assert_eq!(summary["skipped"], 2);
    assert_eq!(summary["tables"][0]["folders"], 1);

    let merged = read_json(&out_dir.join("items.json"));
    assert_eq!(merged[0]["filename"], "old.txt");
    assert_eq!(merged[0]["size"], 100);
    assert_eq!(merged[1]["filename"], "new.pdf");
    assert_eq!(merged[1]["path"], format!("{root}\\new.pdf"));
    assert!(out_dir.join("index_c.json").exists());

    // The exported file feeds straight into `score`.
    let scores = dir.path().join("scores.json");
    let result = common::run_cli_case(
        "export_then_score",
        &[
            "score",
            "--config",
            config.to_str().unwrap(),
            "--input",
            out_dir.join("items.json").to_str().unwrap(),
            "--output",
            scores.to_str().unwrap(),
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert_eq!(read_json(&scores).as_array().unwrap().len(), 2);
}

#[test]
fn export_rejects_unsafe_table_names() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_isolated_config(dir.path(), "");
    let db = dir.path().join("tabular.db");
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch("CREATE TABLE index_c (id TEXT);")
        .unwrap();

    let result = common::run_cli_case(
        "export_rejects_unsafe_table_names",
        &[
            "export",
            "--config",
            config.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--table",
            "x; DROP TABLE y",
        ],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("SRK-1001"));
}
