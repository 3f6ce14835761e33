//! Integration tests for report rendering
//!
//! Findings come from the real engine so spans and excerpts line up with the
//! parsed sources.

use annolint::analysis::{CancellationToken, Finding, LintEngine};
use annolint::ast::{Language, SourceUnit};
use annolint::config::Config;
use annolint::report::{JsonReporter, ReportOptions, TextReporter};
use annolint::{parse_source, Baseline, ReportFormat, Reporter, SourceMap};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RANGE_SOURCE: &str = "package test.pkg;
import androidx.annotation.IntRange;
public class Sample {
    static void printInt(@IntRange(from = 4, to = 7) int value) {}
    void test() {
        printInt(3);
    }
}
";

const FLAGS_SOURCE: &str = "package test.pkg;
import androidx.annotation.IntDef;
public class Flags {
    public static final int FOCUSED = 16;
    @IntDef(flag = true, value = {FOCUSED})
    @interface Options {}
}
";

fn unit(path: &str, source: &str) -> SourceUnit {
    parse_source(Path::new(path), Language::Java, source).expect("Failed to parse source")
}

fn analyze(units: &[SourceUnit]) -> Vec<Finding> {
    LintEngine::new(Config::default())
        .analyze(units, &CancellationToken::new())
        .findings
}

// ============================================================================
// Text
// ============================================================================

#[test]
fn test_text_report_with_excerpt() {
    let units = vec![unit("src/Sample.java", RANGE_SOURCE)];
    let findings = analyze(&units);
    let text = TextReporter::new().render(&findings, &SourceMap::from_units(&units));

    let expected = format!(
        "src/Sample.java:6: Error: Value must be ≥ 4 (was 3) [Range]\n        printInt(3);\n{}~\n1 errors, 0 warnings\n",
        " ".repeat(17)
    );
    assert_eq!(text, expected);
}

#[test]
fn test_text_report_with_fixes() {
    let units = vec![unit("src/Flags.java", FLAGS_SOURCE)];
    let findings = analyze(&units);
    let text = TextReporter::new()
        .with_fixes(true)
        .render(&findings, &SourceMap::from_units(&units));
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[0],
        "src/Flags.java:4: Warning: Consider declaring this constant using 1 << 4 instead [ShiftFlags]"
    );
    assert_eq!(lines[2], format!("{}~~", " ".repeat(38)));
    assert_eq!(lines[3], "0 errors, 1 warnings");
    assert_eq!(lines[4], "Fix for src/Flags.java line 4: Replace with 1 << 4:");
    assert_eq!(lines[5], "@@ -4 +4");
    assert_eq!(lines[6], "-     public static final int FOCUSED = 16;");
    assert_eq!(lines[7], "+     public static final int FOCUSED = 1 << 4;");
}

#[test]
fn test_clean_sources_report_no_warnings() {
    let clean = RANGE_SOURCE.replace("printInt(3)", "printInt(5)");
    let units = vec![unit("src/Sample.java", &clean)];
    let findings = analyze(&units);
    assert!(findings.is_empty());

    let text = TextReporter::new().render(&findings, &SourceMap::from_units(&units));
    assert_eq!(text, "No warnings.\n");
}

#[test]
fn test_reporter_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("report.txt");
    let units = vec![unit("src/Sample.java", RANGE_SOURCE)];
    let findings = analyze(&units);

    let options = ReportOptions {
        output_path: Some(output.clone()),
        ..ReportOptions::default()
    };
    Reporter::with_options(ReportFormat::Text, options)
        .report(&findings, &SourceMap::from_units(&units))
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("src/Sample.java:6: Error:"));
    assert!(written.ends_with("1 errors, 0 warnings\n"));
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn test_json_report_relative_paths() {
    let path = PathBuf::from("/repo/app/src/Sample.java");
    let units = vec![parse_source(&path, Language::Java, RANGE_SOURCE).unwrap()];
    let findings = analyze(&units);
    let json = JsonReporter::new(None)
        .with_base_path(PathBuf::from("/repo"))
        .render(&findings)
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["total_issues"], 1);
    assert_eq!(value["errors"], 1);
    let issue = &value["issues"][0];
    assert_eq!(issue["id"], "Range");
    assert_eq!(issue["severity"], "error");
    assert_eq!(issue["message"], "Value must be ≥ 4 (was 3)");
    assert_eq!(issue["location"]["file"], "app/src/Sample.java");
    assert_eq!(issue["location"]["line"], 6);
    assert_eq!(issue["location"]["column"], 18);
}

// ============================================================================
// Baseline
// ============================================================================

#[test]
fn test_baseline_hides_known_findings() {
    let dir = TempDir::new().unwrap();
    let root = Path::new("/repo");
    let path = PathBuf::from("/repo/src/Sample.java");
    let units = vec![parse_source(&path, Language::Java, RANGE_SOURCE).unwrap()];
    let before = analyze(&units);

    let baseline_path = dir.path().join("baseline.json");
    Baseline::from_findings(&before, root).save(&baseline_path).unwrap();
    let baseline = Baseline::load(&baseline_path).unwrap();

    // Shifting the call down keeps it baselined; a new violation is reported
    let edited = RANGE_SOURCE.replace(
        "        printInt(3);\n",
        "\n        printInt(3);\n        printInt(9);\n",
    );
    let units = vec![parse_source(&path, Language::Java, &edited).unwrap()];
    let after = analyze(&units);
    assert_eq!(after.len(), 2);

    let new = baseline.filter_new(&after, root);
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].message, "Value must be ≤ 7 (was 9)");
    assert_eq!(baseline.stats(&after, root).to_string(), "1 baselined, 1 new, 0 fixed");
}
