use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn threadline_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_threadline"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("reading.jsonl"),
        concat!(
            r#"{"id":"fern-care","topics":["gardening"],"knowledge":["Ferns like humidity."],"embeddings":[[1.0,0.0]]}"#,
            "\n",
            r#"{"id":"parsers","topics":["software"],"knowledge":["Pratt parsers handle precedence."],"embeddings":[[0.0,1.0]]}"#,
            "\n",
        ),
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/threadline.sqlite"

[scheduler]
debounce_ms = 50
"#,
        root.display()
    );

    let config_path = config_dir.join("threadline.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_threadline(config_path: &Path, args: &[&str], stdin: &str) -> (String, String, bool) {
    let binary = threadline_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run threadline binary at {:?}: {}", binary, e));

    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_threadline(&config_path, &["init"], "");
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_threadline(&config_path, &["init"], "");
    assert!(success, "second init failed (not idempotent)");
}

#[test]
fn test_import_stores_documents() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("reading.jsonl");

    let (stdout, stderr, success) =
        run_threadline(&config_path, &["import", file.to_str().unwrap()], "");
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Imported 2 documents"));
}

#[test]
fn test_missing_note_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_threadline(&config_path, &["init"], "");

    let (_, stderr, success) = run_threadline(&config_path, &["note", "--note", "nope"], "");
    assert!(!success);
    assert!(stderr.contains("note not found"));
}

#[test]
fn test_analyze_empty_text_needs_no_provider() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_threadline(&config_path, &["analyze", "--note", "today"], "\n\n");
    assert!(success, "analyze failed: stdout={}, stderr={}", stdout, stderr);

    let note: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(note["id"], "today");
    assert_eq!(note["status"], "completed");

    let (stdout, _, success) = run_threadline(&config_path, &["note", "--note", "today"], "");
    assert!(success);
    assert!(stdout.contains("\"today\""));
}

#[test]
fn test_analyze_with_disabled_generation_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_threadline(
        &config_path,
        &["analyze", "--note", "today"],
        "I keep forgetting to water the plants.",
    );
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_compose_reports_failed_runs_and_exits() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_threadline(
        &config_path,
        &["compose", "--note", "draft"],
        "I keep forgetting to water the plants.\nThe fern is drooping.\n",
    );
    assert!(success, "compose failed: stdout={}, stderr={}", stdout, stderr);

    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["status"], "failed");
}

#[test]
fn test_imported_documents_listed_and_fetched() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("reading.jsonl");
    run_threadline(&config_path, &["import", file.to_str().unwrap()], "");

    let (stdout, stderr, success) = run_threadline(&config_path, &["documents"], "");
    assert!(success, "documents failed: stdout={}, stderr={}", stdout, stderr);
    let listed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (stdout, _, success) =
        run_threadline(&config_path, &["document", "--id", "fern-care"], "");
    assert!(success);
    assert!(stdout.contains("Ferns like humidity."));
}

#[test]
fn test_missing_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_threadline(&config_path, &["init"], "");

    let (_, stderr, success) = run_threadline(&config_path, &["document", "--id", "nope"], "");
    assert!(!success);
    assert!(stderr.contains("nope"));
}

#[test]
fn test_add_with_disabled_generation_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_threadline(
        &config_path,
        &["add", "--id", "article"],
        "Ferns prefer humid air and indirect light.",
    );
    assert!(!success);
    assert!(stderr.contains("disabled"));

    let (stdout, _, success) = run_threadline(&config_path, &["documents"], "");
    assert!(success);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_add_empty_content_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_threadline(&config_path, &["add"], "  \n");
    assert!(!success);
    assert!(stderr.contains("empty"));
}

#[test]
fn test_search_empty_query_needs_no_provider() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_threadline(&config_path, &["search", " "], "");
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout.trim(), "[]");
}
