//! CLI integration tests for obj2sql.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes, and the output of each inspection command.

use assert_cmd::Command;
use obj2sql::{ClassDef, Config, Mapper, Object, Value};
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

/// Get a command for the obj2sql binary.
fn cmd() -> Command {
    Command::cargo_bin("obj2sql").unwrap()
}

/// Database with one primitive table and one class table.
///
/// Returns the directory guard, the database path and the row id of the
/// stored point.
fn fixture() -> (TempDir, String, i64) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.db").to_string_lossy().into_owned();
    let mut mapper = Mapper::open(&Config::for_path(path.clone())).unwrap();

    mapper.save(&Value::Int(1)).unwrap();
    let point = ClassDef::builder("geometry", "Point")
        .field("x", 0i64)
        .field("y", 0i64)
        .build();
    let p = Object::new(&point);
    p.set("x", 3i64);
    let row = mapper.save(&p.value()).unwrap();
    mapper.close().unwrap();

    (dir, path, row)
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("tables"))
        .stdout(predicate::str::contains("structure"))
        .stdout(predicate::str::contains("size"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn test_show_subcommand_help() {
    cmd()
        .args(["show", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<TABLE>"))
        .stdout(predicate::str::contains("<ID>"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("obj2sql"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_database_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--database"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: warn]"));
}

#[test]
fn test_unknown_log_format_exits_with_code_1() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "--log-format", "xml", "tables"])
        .assert()
        .code(1);
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "tables"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "tables"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "tables"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_database_exits_with_code_1() {
    // Inspection never creates the database file
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");

    cmd()
        .args(["--database", path.to_str().unwrap(), "tables"])
        .assert()
        .code(1);
    assert!(!path.exists());
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: obj2sql.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_config_file_selects_database() {
    let (_dir, path, _) = fixture();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  path: {:?}", path).unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "tables"])
        .assert()
        .success()
        .stdout(predicate::str::contains("geometry$Point"));
}

// =============================================================================
// Inspection Commands
// =============================================================================

#[test]
fn test_tables_lists_user_tables() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "tables"])
        .assert()
        .success()
        .stdout("builtins$int\ngeometry$Point\n");
}

#[test]
fn test_tables_json() {
    let (_dir, path, _) = fixture();
    let output = cmd()
        .args(["--database", &path, "--output-json", "tables"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let tables: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tables, vec!["builtins$int", "geometry$Point"]);
}

#[test]
fn test_info_reports_engine() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Engine: SQLite"))
        .stdout(predicate::str::contains("Database: main"))
        .stdout(predicate::str::contains("Tables: 2"));
}

#[test]
fn test_structure_shows_columns() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "structure", "geometry$Point"])
        .assert()
        .success()
        .stdout(predicate::str::contains("origin_id"))
        .stdout(predicate::str::contains("OBJECT_ATTR$x"))
        .stdout(predicate::str::contains("OBJECT_ATTR$y"));
}

#[test]
fn test_structure_unknown_table_exits_with_code_3() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "structure", "geometry$Missing"])
        .assert()
        .code(3);
}

#[test]
fn test_size_of_primitive_table() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "size", "builtins$int"])
        .assert()
        .success()
        .stdout("builtins$int: 23 bytes\n");
}

#[test]
fn test_size_empty_name_exits_with_code_4() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "size", ""])
        .assert()
        .code(4);
}

#[test]
fn test_show_decodes_row() {
    let (_dir, path, row) = fixture();
    cmd()
        .args(["--database", &path, "show", "geometry$Point", &row.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("OBJECT_ATTR$x = int(3)"))
        .stdout(predicate::str::contains("OBJECT_ATTR$y = int(0)"));
}

#[test]
fn test_show_json() {
    let (_dir, path, row) = fixture();
    let output = cmd()
        .args([
            "--database",
            &path,
            "--output-json",
            "show",
            "geometry$Point",
            &row.to_string(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["table"], "geometry$Point");
    assert_eq!(json["id"], row);
}

#[test]
fn test_show_missing_row_exits_with_code_4() {
    let (_dir, path, _) = fixture();
    cmd()
        .args(["--database", &path, "show", "geometry$Point", "999"])
        .assert()
        .code(4);
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
