//! Integration tests for the `convert-yaml` binary (src/main.rs).
//!
//! These tests run the compiled binary and check exit codes, stdout and stderr.
//! They spawn processes, which Miri and WASI do not support.
#![cfg(all(not(miri), not(target_os = "wasi")))]

use std::io::Write;
use std::process::Command;

use anyhow::Result;
use tempfile::NamedTempFile;

/// Run the binary with the given args and return (stdout, stderr, exit_code).
fn run_binary(args: &[&str]) -> (String, String, i32) {
    let bin = env!("CARGO_BIN_EXE_convert-yaml");
    let output = Command::new(bin)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute binary");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn yaml_file(content: &str) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new()?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    Ok(tmp)
}

#[test]
fn help_flag_prints_usage_and_exits_zero() {
    let (stdout, _stderr, code) = run_binary(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"), "stdout: {stdout}");
}

#[test]
fn no_args_prints_usage_to_stderr_and_exits_one() {
    let (_stdout, stderr, code) = run_binary(&[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Usage:"), "stderr: {stderr}");
}

#[test]
fn unknown_option_exits_one() {
    let (_stdout, stderr, code) = run_binary(&["--bogus", "file.yaml"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--bogus"), "stderr: {stderr}");
}

#[test]
fn missing_file_prints_error_and_exits_two() {
    let (stdout, stderr, code) = run_binary(&["nonexistent_file_12345.yaml"]);
    assert_eq!(code, 2);
    assert!(stdout.is_empty(), "stdout: {stdout}");
    assert!(stderr.contains("Failed to read"), "stderr: {stderr}");
}

#[test]
fn valid_yaml_is_written_to_stdout() -> Result<()> {
    let tmp = yaml_file("runtime: go\nthreadsafe: yes\n")?;
    let (stdout, stderr, code) = run_binary(&[tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(stdout, "{\n  \"runtime\": \"go\",\n  \"threadsafe\": true\n}\n");
    Ok(())
}

#[test]
fn compact_and_ascii_output() -> Result<()> {
    let tmp = yaml_file("name: café\n")?;
    let (stdout, _stderr, code) =
        run_binary(&["--compact", "--ascii", tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "{\"name\":\"caf\\u00e9\"}\n");
    Ok(())
}

#[test]
fn custom_indent() -> Result<()> {
    let tmp = yaml_file("a: 1\n")?;
    let (stdout, _stderr, code) = run_binary(&["--indent", "4", tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "{\n    \"a\": 1\n}\n");
    Ok(())
}

#[test]
fn output_file_option() -> Result<()> {
    let tmp = yaml_file("a: [1, 2]\n")?;
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out.json");
    let (stdout, stderr, code) = run_binary(&[
        "--compact",
        "-o",
        out.to_str().unwrap(),
        tmp.path().to_str().unwrap(),
    ]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.is_empty(), "stdout: {stdout}");
    assert_eq!(std::fs::read_to_string(&out)?, "{\"a\":[1,2]}\n");
    Ok(())
}

#[test]
fn unwritable_output_exits_four() -> Result<()> {
    let tmp = yaml_file("a: 1\n")?;
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("missing").join("out.json");
    let (_stdout, stderr, code) = run_binary(&["-o", out.to_str().unwrap(), tmp.path().to_str().unwrap()]);
    assert_eq!(code, 4);
    assert!(stderr.contains("Failed to write output"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn invalid_yaml_exits_three_with_snippet() -> Result<()> {
    let tmp = yaml_file("a: 1\nb: .inf\n")?;
    let path = tmp.path().to_str().unwrap();
    let (stdout, stderr, code) = run_binary(&[path]);
    assert_eq!(code, 3);
    assert!(stdout.is_empty(), "stdout: {stdout}");
    assert!(stderr.contains("invalid"), "stderr: {stderr}");
    assert!(stderr.contains("b: .inf"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn plain_errors() -> Result<()> {
    let tmp = yaml_file("a: 1\nb: .inf\n")?;
    let (_stdout, stderr, code) = run_binary(&["--plain", tmp.path().to_str().unwrap()]);
    assert_eq!(code, 3);
    assert!(stderr.contains("in b cannot be represented in JSON at line 2, column 4"), "stderr: {stderr}");
    assert!(!stderr.contains("<input>"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn strict_booleans_flag() -> Result<()> {
    let tmp = yaml_file("a: yes\n")?;
    let (stdout, _stderr, code) =
        run_binary(&["--compact", "--strict-booleans", tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "{\"a\":\"yes\"}\n");
    Ok(())
}

#[test]
fn single_document_flag() -> Result<()> {
    let tmp = yaml_file("a: 1\n---\nb: 2\n")?;
    let path = tmp.path().to_str().unwrap();
    let (stdout, _stderr, code) = run_binary(&["--compact", path]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "{\"a\":1}\n");
    let (_stdout, stderr, code) = run_binary(&["--single-document", path]);
    assert_eq!(code, 3, "stderr: {stderr}");
    Ok(())
}

#[test]
fn ignored_documents_are_logged_to_stderr() -> Result<()> {
    let tmp = yaml_file("a: 1\n---\nb: 2\n")?;
    let (_stdout, stderr, code) = run_binary(&[tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stderr.contains("ignoring YAML documents after the first"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn handlers_flag_restructures_handlers() -> Result<()> {
    let tmp = yaml_file("handlers:\n- urlRegex: /.*\n  scriptPath: main.app\n")?;
    let (stdout, stderr, code) =
        run_binary(&["--compact", "--handlers", tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(
        stdout,
        "{\"handlers\":[{\"script\":{\"scriptPath\":\"main.app\"},\"urlRegex\":\"/.*\"}]}\n"
    );
    Ok(())
}

#[test]
fn handlers_flag_accepts_app_yaml_field_names() -> Result<()> {
    let tmp = yaml_file("handlers:\n- url: /.*\n  script: main.app\n  secure: always\n")?;
    let (stdout, stderr, code) =
        run_binary(&["--compact", "--handlers", tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(
        stdout,
        "{\"handlers\":[{\"script\":{\"scriptPath\":\"main.app\"},\"urlRegex\":\"/.*\",\"securityLevel\":\"SECURE_ALWAYS\"}]}\n"
    );
    Ok(())
}

#[test]
fn budget_report_goes_to_stderr() -> Result<()> {
    let tmp = yaml_file("a: [1, 2]\n")?;
    let (stdout, stderr, code) = run_binary(&["--budget-report", tmp.path().to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stderr.contains("Budget report:"), "stderr: {stderr}");
    assert!(stderr.contains("\"nodes\": 5"), "stderr: {stderr}");
    assert!(!stdout.contains("Budget"), "stdout: {stdout}");
    Ok(())
}
