//! Integration tests for thread annotations

use annolint::analysis::{CancellationToken, Finding, Issue, LintEngine};
use annolint::ast::{Language, SourceUnit};
use annolint::config::Config;
use annolint::parse_source;
use std::path::{Path, PathBuf};

/// Get the path to the test fixtures directory
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(relative: &str) -> SourceUnit {
    let path = fixtures_path().join(relative);
    let source = std::fs::read_to_string(&path).expect("Failed to read fixture");
    parse_source(&path, Language::Java, &source).expect("Failed to parse fixture")
}

fn inline(path: &str, source: &str) -> SourceUnit {
    parse_source(Path::new(path), Language::Java, source).expect("Failed to parse source")
}

fn thread_findings(units: &[SourceUnit]) -> Vec<Finding> {
    let config = Config {
        enable: vec!["WrongThread".to_string()],
        ..Config::default()
    };
    LintEngine::new(config)
        .analyze(units, &CancellationToken::new())
        .findings
}

const UI_TO_WORKER: &str =
    "Method compute must be called from the worker thread, currently inferred thread is UI thread";
const WORKER_TO_UI: &str =
    "Method paint must be called from the UI thread, currently inferred thread is worker thread";

// ============================================================================
// Single file
// ============================================================================

#[test]
fn test_thread_fixture() {
    let findings = thread_findings(&[load_fixture("java/ThreadSample.java")]);
    let found: Vec<(usize, &str)> = findings
        .iter()
        .map(|f| (f.location.span.line, f.message.as_str()))
        .collect();

    assert_eq!(
        found,
        vec![(17, UI_TO_WORKER), (22, WORKER_TO_UI), (28, WORKER_TO_UI)]
    );
    assert!(findings.iter().all(|f| f.issue == Issue::WrongThread));
}

#[test]
fn test_main_and_any_thread_are_compatible_with_ui() {
    let findings = thread_findings(&[load_fixture("java/ThreadSample.java")]);
    assert!(findings.iter().all(|f| !f.message.contains("post")));
    assert!(findings.iter().all(|f| !f.message.contains("log")));
}

// ============================================================================
// Cross file
// ============================================================================

#[test]
fn test_callee_annotations_resolve_across_files() {
    let caller = inline(
        "src/main/java/test/pkg/Screen.java",
        r#"
package test.pkg;
import androidx.annotation.UiThread;
public class Screen {
    @UiThread
    void render() {
        ThreadSample.compute();
        ThreadSample.paint();
    }
    void unannotated() {
        ThreadSample.compute();
    }
}
"#,
    );
    let units = vec![caller, load_fixture("java/ThreadSample.java")];
    let findings = thread_findings(&units);

    let screen: Vec<&Finding> = findings
        .iter()
        .filter(|f| f.location.path.ends_with("Screen.java"))
        .collect();
    assert_eq!(screen.len(), 1);
    assert_eq!(screen[0].message, UI_TO_WORKER);
    assert_eq!(screen[0].location.span.line, 7);
}

#[test]
fn test_class_level_thread_applies_to_members() {
    let unit = inline(
        "src/main/java/test/pkg/Loader.java",
        r#"
package test.pkg;
import androidx.annotation.UiThread;
import androidx.annotation.WorkerThread;
@UiThread
class Screen {
    void render() {
        new Loader();
    }
}
@WorkerThread
class Loader {
    Loader() {}
}
"#,
    );
    let findings = thread_findings(&[unit]);
    let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["Constructor Loader must be called from the worker thread, currently inferred thread is UI thread"]
    );
}
