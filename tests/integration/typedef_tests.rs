//! Integration tests for typedef constants
//!
//! Covers `WrongConstant`, `SwitchIntDef`, `UniqueConstants` and
//! `ShiftFlags` over the shared fixtures.

use annolint::analysis::{CancellationToken, Finding, Issue, LintEngine, Severity};
use annolint::ast::{Language, SourceUnit};
use annolint::config::Config;
use annolint::parse_source;
use std::path::PathBuf;

/// Get the path to the test fixtures directory
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(relative: &str) -> SourceUnit {
    let path = fixtures_path().join(relative);
    if !path.exists() {
        panic!("Fixture not found: {:?}", path);
    }
    let language = if relative.ends_with(".kt") {
        Language::Kotlin
    } else {
        Language::Java
    };
    let source = std::fs::read_to_string(&path).expect("Failed to read fixture");
    parse_source(&path, language, &source).expect("Failed to parse fixture")
}

fn analyze(relative: &str) -> Vec<Finding> {
    let units = vec![load_fixture(relative)];
    LintEngine::new(Config::default())
        .analyze(&units, &CancellationToken::new())
        .findings
}

fn of_issue(findings: &[Finding], issue: Issue) -> Vec<(usize, String)> {
    findings
        .iter()
        .filter(|f| f.issue == issue)
        .map(|f| (f.location.span.line, f.message.clone()))
        .collect()
}

// ============================================================================
// WrongConstant
// ============================================================================

mod wrong_constant_tests {
    use super::*;

    #[test]
    fn test_java_typedef_arguments() {
        let findings = analyze("java/ModeSample.java");
        let all_modes = "Must be one of: ModeSample.MODE_A, ModeSample.MODE_B, ModeSample.MODE_C";

        assert_eq!(
            of_issue(&findings, Issue::WrongConstant),
            vec![
                (33, all_modes.to_string()),
                (34, all_modes.to_string()),
                (36, "Flag not allowed here".to_string()),
                (37, "Must be one of: \"left\", \"right\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_wrong_constant_is_error() {
        let findings = analyze("java/ModeSample.java");
        assert!(findings
            .iter()
            .filter(|f| f.issue == Issue::WrongConstant)
            .all(|f| f.severity == Severity::Error));
    }

    #[test]
    fn test_kotlin_literal_argument() {
        let findings = analyze("kotlin/ModeSample.kt");
        let wrong = of_issue(&findings, Issue::WrongConstant);

        assert_eq!(wrong.len(), 1);
        assert_eq!(wrong[0].0, 15);
        assert!(wrong[0].1.starts_with("Must be one of:"), "{}", wrong[0].1);
    }
}

// ============================================================================
// SwitchIntDef
// ============================================================================

mod switch_tests {
    use super::*;

    #[test]
    fn test_java_switch_missing_case() {
        let findings = analyze("java/ModeSample.java");
        let switches: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.issue == Issue::SwitchIntDef)
            .collect();

        assert_eq!(switches.len(), 1);
        assert_eq!(
            switches[0].message,
            "Switch statement on an `int` with known associated constant missing case MODE_C"
        );
        assert_eq!(switches[0].severity, Severity::Warning);
    }

    #[test]
    fn test_kotlin_when_with_else_is_quiet() {
        let findings = analyze("kotlin/ModeSample.kt");
        assert_eq!(
            of_issue(&findings, Issue::SwitchIntDef),
            vec![(
                16,
                "Switch statement on an `int` with known associated constant missing case B".to_string()
            )]
        );
    }
}

// ============================================================================
// Declarations
// ============================================================================

mod declaration_tests {
    use super::*;

    #[test]
    fn test_duplicate_typedef_values() {
        let findings = analyze("java/ModeSample.java");
        let unique: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.issue == Issue::UniqueConstants)
            .collect();

        assert_eq!(unique.len(), 1);
        assert_eq!(
            unique[0].message,
            "Constants `MODE_D` and `MODE_C` specify the same exact value (2); this is usually a cut & paste or merge error"
        );
        assert_eq!(unique[0].location.span.line, 18);
        assert_eq!(
            unique[0].secondary[0].message.as_deref(),
            Some("Previous same value")
        );
    }

    #[test]
    fn test_flag_constant_written_as_literal() {
        let findings = analyze("java/ModeSample.java");
        let shifts: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.issue == Issue::ShiftFlags)
            .collect();

        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].location.span.line, 12);
        assert_eq!(
            shifts[0].message,
            "Consider declaring this constant using 1 << 2 instead"
        );
        assert_eq!(shifts[0].fixes[0].edits[0].replacement, "1 << 2");
    }

    #[test]
    fn test_report_order_follows_lines() {
        let findings = analyze("java/ModeSample.java");
        let lines: Vec<usize> = findings.iter().map(|f| f.location.span.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }
}
