//! End-to-end tests for the `annolint` binary

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const SAMPLE: &str = "package test.pkg;
import androidx.annotation.IntRange;
public class Sample {
    static void printInt(@IntRange(from = 4, to = 7) int value) {}
    void test() {
        printInt(3);
    }
}
";

const FLAGS: &str = "package test.pkg;
import androidx.annotation.IntDef;
public class Flags {
    public static final int FOCUSED = 16;
    @IntDef(flag = true, value = {FOCUSED})
    @interface Options {}
}
";

fn annolint() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_annolint"));
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Create a project with one source file under `app/src/main/java`
fn project(name: &str, source: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    add_source(dir.path(), name, source);
    dir
}

fn add_source(root: &Path, name: &str, source: &str) {
    let pkg = root.join("app/src/main/java/test/pkg");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join(name), source).unwrap();
}

// ============================================================================
// Exit codes and text output
// ============================================================================

#[test]
fn test_errors_exit_with_failure() {
    let dir = project("Sample.java", SAMPLE);
    annolint()
        .arg(dir.path())
        .arg("-q")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "app/src/main/java/test/pkg/Sample.java:6: Error: Value must be ≥ 4 (was 3) [Range]",
        ))
        .stdout(predicate::str::contains("1 errors, 0 warnings"));
}

#[test]
fn test_clean_project_succeeds() {
    let dir = project("Sample.java", &SAMPLE.replace("printInt(3)", "printInt(4)"));
    annolint()
        .arg(dir.path())
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings."));
}

#[test]
fn test_warnings_do_not_fail() {
    let dir = project("Flags.java", FLAGS);
    annolint()
        .arg(dir.path())
        .args(["-q", "--show-fixes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ShiftFlags]"))
        .stdout(predicate::str::contains("Fix for app/src/main/java/test/pkg/Flags.java line 4: Replace with 1 << 4:"))
        .stdout(predicate::str::contains("+     public static final int FOCUSED = 1 << 4;"));
}

#[test]
fn test_empty_directory() {
    let dir = TempDir::new().unwrap();
    annolint().arg(dir.path()).assert().success();
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_list_issues() {
    annolint()
        .arg("--list-issues")
        .assert()
        .success()
        .stdout(predicate::str::contains("Range"))
        .stdout(predicate::str::contains("WrongThread"))
        .stdout(predicate::str::contains("Missing @IntDef in Switch"));
}

#[test]
fn test_disable_issue() {
    let dir = project("Sample.java", SAMPLE);
    annolint()
        .arg(dir.path())
        .args(["-q", "--disable", "Range"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings."));
}

#[test]
fn test_unknown_issue_id() {
    let dir = project("Sample.java", SAMPLE);
    annolint()
        .arg(dir.path())
        .args(["--enable", "NotAnIssue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown issue id 'NotAnIssue'"));
}

#[test]
fn test_config_file_severity_override() {
    let dir = project("Sample.java", SAMPLE);
    fs::write(dir.path().join("annolint.yml"), "severity:\n  Range: warning\n").unwrap();
    annolint()
        .arg(dir.path())
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning: Value must be ≥ 4 (was 3) [Range]"));
}

#[test]
fn test_json_output() {
    let dir = project("Sample.java", SAMPLE);
    let output = annolint()
        .arg(dir.path())
        .args(["-q", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["total_issues"], 1);
    assert_eq!(value["issues"][0]["id"], "Range");
    assert_eq!(
        value["issues"][0]["location"]["file"],
        "app/src/main/java/test/pkg/Sample.java"
    );
}

#[test]
fn test_json_output_file() {
    let dir = project("Sample.java", SAMPLE);
    let report = dir.path().join("report.json");
    annolint()
        .arg(dir.path())
        .args(["-q", "--format", "json", "--output"])
        .arg(&report)
        .assert()
        .code(1);

    let value: Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(value["errors"], 1);
}

// ============================================================================
// Baseline
// ============================================================================

#[test]
fn test_baseline_flow() {
    let dir = project("Sample.java", SAMPLE);
    let baseline = dir.path().join("baseline.json");

    annolint()
        .arg(dir.path())
        .arg("-q")
        .arg("--write-baseline")
        .arg(&baseline)
        .assert()
        .code(1);
    assert!(baseline.exists());

    annolint()
        .arg(dir.path())
        .arg("-q")
        .arg("--baseline")
        .arg(&baseline)
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings."));

    add_source(
        dir.path(),
        "Sample.java",
        &SAMPLE.replace("printInt(3);", "printInt(3);\n        printInt(8);"),
    );
    annolint()
        .arg(dir.path())
        .arg("-q")
        .arg("--baseline")
        .arg(&baseline)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Value must be ≤ 7 (was 8)"))
        .stdout(predicate::str::contains("(was 3)").not());
}
