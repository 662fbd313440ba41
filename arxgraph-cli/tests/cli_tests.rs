//! Integration tests for the arxgraph CLI
//!
//! Tests end-to-end command behavior using the CLI binary.
//! Uses tempfile for isolated test directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Get the path to the arxgraph binary (built by cargo)
fn arxgraph_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_arxgraph"));
    cmd.env_remove("ARXGRAPH_DB").env_remove("RUST_LOG");
    cmd
}

/// Run arxgraph with the given args in the specified directory
fn run_arxgraph(dir: &Path, args: &[&str]) -> Output {
    arxgraph_binary()
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute arxgraph command")
}

/// Get stdout as string
fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Get stderr as string
fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn json_stdout(output: &Output) -> serde_json::Value {
    serde_json::from_str(&stdout(output)).expect("stdout should be JSON")
}

fn write_document(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write document");
    path
}

/// Two documents: components referencing an interface in the other file,
/// plus one reference to a package that does not exist.
fn setup_models(dir: &Path) {
    fs::create_dir_all(dir.join("models")).unwrap();
    write_document(
        &dir.join("models"),
        "components.json",
        r#"{
  "AUTOSAR": { "AR-PACKAGES": { "AR-PACKAGE": {
    "$": { "UUID": "pkg1" },
    "SHORT-NAME": "Pkg1",
    "ELEMENTS": {
      "APPLICATION-SW-COMPONENT-TYPE": {
        "$": { "UUID": "comp1" },
        "SHORT-NAME": "Comp1",
        "PORTS": { "P-PORT-PROTOTYPE": [
          {
            "$": { "UUID": "port1" },
            "SHORT-NAME": "Port1",
            "PROVIDED-INTERFACE-TREF": { "$": { "DEST": "SENDER-RECEIVER-INTERFACE" }, "_": "/Interfaces/IFace1" }
          },
          {
            "$": { "UUID": "port2" },
            "SHORT-NAME": "Port2",
            "PROVIDED-INTERFACE-TREF": { "_": "/Pkg1/Missing/Y" }
          }
        ] }
      }
    }
  } } }
}"#,
    );
    write_document(
        &dir.join("models"),
        "interfaces.json",
        r#"{
  "AUTOSAR": { "AR-PACKAGES": { "AR-PACKAGE": {
    "$": { "UUID": "pkg2" },
    "SHORT-NAME": "Interfaces",
    "ELEMENTS": {
      "SENDER-RECEIVER-INTERFACE": { "$": { "UUID": "iface1" }, "SHORT-NAME": "IFace1" }
    }
  } } }
}"#,
    );
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = run_arxgraph(dir.path(), &["--help"]);

    assert!(output.status.success());
    let out = stdout(&output);
    for command in ["import", "extract", "stats", "export"] {
        assert!(out.contains(command), "help should mention {}", command);
    }
}

#[test]
fn test_no_command_prints_help() {
    let dir = TempDir::new().unwrap();
    let output = run_arxgraph(dir.path(), &[]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage"));
}

// ============================================================================
// Extract
// ============================================================================

#[test]
fn test_extract_json_resolves_across_documents() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());

    let output = run_arxgraph(dir.path(), &["extract", "models", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value = json_stdout(&output);
    assert_eq!(value["counts"]["nodes"], 6);
    assert_eq!(value["counts"]["virtual_nodes"], 2);
    assert_eq!(value["counts"]["unresolved"], 1);
    assert_eq!(value["unresolved"][0]["target_path"], "/Pkg1/Missing/Y");
    assert_eq!(value["sources"].as_array().unwrap().len(), 2);
    assert!(!dir.path().join(".arxgraph").exists());
}

#[test]
fn test_extract_shadow_policy() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());

    let output = run_arxgraph(
        dir.path(),
        &["extract", "models", "--virtual-policy", "shadow", "--format", "json"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value = json_stdout(&output);
    assert_eq!(value["virtual_policy"], "shadow");
    assert_eq!(value["counts"]["virtual_nodes"], 3);
}

#[test]
fn test_extract_rejects_unknown_policy() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());

    let output = run_arxgraph(dir.path(), &["extract", "models", "--virtual-policy", "copy"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown virtual policy"));
}

// ============================================================================
// Import / Stats / Export
// ============================================================================

#[test]
fn test_import_then_stats() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());

    let output = run_arxgraph(dir.path(), &["import", "models", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let summary = json_stdout(&output);
    assert_eq!(summary["success"], true);
    assert_eq!(summary["node_count"], 6);
    assert_eq!(summary["documents"], 2);
    assert!(dir.path().join(".arxgraph/graph.duckdb").exists());

    let output = run_arxgraph(dir.path(), &["stats", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stats = json_stdout(&output);
    assert_eq!(stats["node_count"], 6);
    assert_eq!(stats["virtual_node_count"], 2);
    assert_eq!(stats["last_import"]["id"], summary["import_id"]);
    assert_eq!(stats["last_import"]["sources"].as_array().unwrap().len(), 2);
}

#[test]
fn test_reimport_replaces_graph() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());

    let output = run_arxgraph(dir.path(), &["import", "models"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_arxgraph(dir.path(), &["import", "models/interfaces.json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stats = json_stdout(&run_arxgraph(dir.path(), &["stats", "--format", "json"]));
    assert_eq!(stats["node_count"], 2);
    assert_eq!(stats["virtual_node_count"], 0);
}

#[test]
fn test_import_with_explicit_database() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());

    let output = run_arxgraph(dir.path(), &["import", "models", "--db", "custom.duckdb"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("custom.duckdb").exists());
    assert!(!dir.path().join(".arxgraph").exists());

    let output = run_arxgraph(dir.path(), &["stats", "--db", "custom.duckdb", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(json_stdout(&output)["node_count"], 6);
}

#[test]
fn test_malformed_import_keeps_previous_graph() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());
    let output = run_arxgraph(dir.path(), &["import", "models"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    write_document(dir.path(), "page.json", r#"{ "HTML": { "BODY": "x" } }"#);
    let output = run_arxgraph(dir.path(), &["import", "page.json", "--format", "json"]);
    assert!(!output.status.success());
    let summary = json_stdout(&output);
    assert_eq!(summary["success"], false);
    assert!(summary["error"].as_str().unwrap().contains("Malformed input"));

    let stats = json_stdout(&run_arxgraph(dir.path(), &["stats", "--format", "json"]));
    assert_eq!(stats["node_count"], 6);
}

#[test]
fn test_invalid_json_input_fails() {
    let dir = TempDir::new().unwrap();
    write_document(dir.path(), "broken.json", "{ not json");

    let output = run_arxgraph(dir.path(), &["import", "broken.json"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("broken.json"));
}

#[test]
fn test_stats_without_database_fails() {
    let dir = TempDir::new().unwrap();

    let output = run_arxgraph(dir.path(), &["stats"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No graph database"));
}

#[test]
fn test_export_writes_stored_graph() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());
    let output = run_arxgraph(dir.path(), &["import", "models"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_arxgraph(dir.path(), &["export", "-o", "graph.json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let content = fs::read_to_string(dir.path().join("graph.json")).unwrap();
    let graph: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 6);
    assert_eq!(graph["virtual_nodes"].as_array().unwrap().len(), 2);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_strict_rejects_broken_config() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());
    fs::write(dir.path().join(".arxgraph.toml"), "[extract\nname_key = ").unwrap();

    let output = run_arxgraph(dir.path(), &["extract", "models"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_arxgraph(dir.path(), &["--strict", "extract", "models"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains(".arxgraph.toml"));
}

#[test]
fn test_config_sets_database_and_format() {
    let dir = TempDir::new().unwrap();
    setup_models(dir.path());
    fs::write(
        dir.path().join(".arxgraph.toml"),
        "[store]\ndatabase = \"data/g.duckdb\"\n\n[output]\nformat = \"json\"\n",
    )
    .unwrap();

    let output = run_arxgraph(dir.path(), &["import", "models"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("data/g.duckdb").exists());
    assert_eq!(json_stdout(&output)["success"], true);
}
