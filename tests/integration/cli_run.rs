#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const UNION_PLAN: &str = r#"{
    "plan": {
        "op": "union",
        "columns": [{"name": "n", "data_type": "Int"}, {"name": "s", "data_type": "String"}],
        "inputs": [
            {
                "op": "values",
                "columns": [{"name": "n", "data_type": "Int"}, {"name": "s", "data_type": "String"}],
                "rows": [
                    [{"t": "Int", "v": 1}, {"t": "String", "v": "a"}],
                    [{"t": "Int", "v": 2}, {"t": "String", "v": "b"}]
                ]
            },
            {
                "op": "values",
                "columns": [{"name": "n", "data_type": "Int"}, {"name": "s", "data_type": "String"}],
                "rows": [[{"t": "Int", "v": 3}, {"t": "Null"}]]
            }
        ]
    }
}"#;

fn write_plan(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).expect("write plan");
    path
}

#[test]
fn run_prints_rows_as_text() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(&dir, "union.json", UNION_PLAN);
    let output = cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .arg("run")
        .arg(&plan)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert_eq!(text, "n\ts\n1\ta\n2\tb\n3\tNULL\n(3 rows)\n");
}

#[test]
fn run_emits_json() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(&dir, "union.json", UNION_PLAN);
    let output = cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .args(["--format", "json", "run"])
        .arg(&plan)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["rows"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["schema"][0]["name"], "n");
    assert_eq!(json["rows"][0][0]["v"], 1);
}

#[test]
fn explain_prints_operator_tree() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(&dir, "union.json", UNION_PLAN);
    cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .arg("explain")
        .arg(&plan)
        .assert()
        .success()
        .stdout("Union(all)\n  Values(rows=2)\n  Values(rows=1)\n");
}

#[test]
fn logical_input_fails_with_code() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(
        &dir,
        "logical.json",
        r#"{"plan": {"op": "union", "columns": [], "inputs": [
            {"op": "values", "columns": [], "convention": "logical"}
        ]}}"#,
    );
    let output = cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .arg("run")
        .arg(&plan)
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.starts_with("error: [ConventionMismatch]"), "{stderr}");
}

#[test]
fn parquet_scan_is_unsupported() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(
        &dir,
        "file.json",
        r#"{"plan": {"op": "file", "path": "/data/people.parquet",
            "columns": [{"name": "id", "data_type": "Int"}]}}"#,
    );
    let output = cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .arg("run")
        .arg(&plan)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("[Unsupported]"), "{stderr}");
}

#[test]
fn config_timeout_is_applied() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(&dir, "union.json", UNION_PLAN);
    let config = dir.path().join("rowpipe.toml");
    fs::write(&config, "[executor]\ntimeout_ms = 0\n").expect("write config");
    let output = cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&plan)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("[Timeout]"), "{stderr}");
}

#[test]
fn profile_counters_are_reported_when_enabled() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(&dir, "union.json", UNION_PLAN);
    let output = cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .env("ROWPIPE_PROFILE", "1")
        .arg("run")
        .arg(&plan)
        .assert()
        .success()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("profile: "), "{stderr}");
    assert!(stderr.contains(" compiles=1 "), "{stderr}");
    assert!(stderr.contains(" drives=1 steps=4 "), "{stderr}");
}

#[test]
fn mistyped_table_row_fails_before_running() {
    let dir = TempDir::new().expect("tempdir");
    let plan = write_plan(
        &dir,
        "bad_rows.json",
        r#"{
            "tables": {"t": {"columns": [{"name": "id", "data_type": "Int"}],
                              "rows": [[{"t": "String", "v": "oops"}]]}},
            "plan": {"op": "scan", "table": "t"}
        }"#,
    );
    let output = cargo_bin_cmd!("rowpipe")
        .env_remove("RUST_LOG")
        .arg("run")
        .arg(&plan)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.starts_with("error: [SchemaMismatch]"), "{stderr}");
}
