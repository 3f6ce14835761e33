//! Integration tests for API restrictions
//!
//! `RestrictedApi`, `VisibleForTests` and `SupportAnnotationUsage`, including
//! module coordinates assigned while loading a project from disk.

use annolint::analysis::{CancellationToken, Finding, Issue, LintEngine};
use annolint::ast::{Language, SourceUnit};
use annolint::config::Config;
use annolint::discovery::FileFinder;
use annolint::{load_units, parse_source};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn inline(path: &str, source: &str) -> SourceUnit {
    let mut unit = parse_source(Path::new(path), Language::Java, source).expect("Failed to parse source");
    unit.is_test = Config::default().test_matcher().is_test(Path::new(path));
    unit
}

fn messages(findings: &[Finding], issue: Issue) -> Vec<String> {
    findings
        .iter()
        .filter(|f| f.issue == issue)
        .map(|f| f.message.clone())
        .collect()
}

fn analyze(units: &[SourceUnit], config: Config) -> Vec<Finding> {
    LintEngine::new(config)
        .analyze(units, &CancellationToken::new())
        .findings
}

const LIB: &str = r#"
package lib.pkg;
import androidx.annotation.RestrictTo;
public class Lib {
    @RestrictTo(RestrictTo.Scope.LIBRARY_GROUP)
    public static void group() {}
    @RestrictTo(RestrictTo.Scope.LIBRARY)
    public static void library() {}
}
"#;

const APP: &str = r#"
package app.pkg;
import lib.pkg.Lib;
public class App {
    void run() {
        Lib.group();
        Lib.library();
    }
}
"#;

// ============================================================================
// RestrictTo
// ============================================================================

mod restrict_to_tests {
    use super::*;

    #[test]
    fn test_library_group_from_other_group() {
        let mut lib = inline("lib/src/main/java/lib/pkg/Lib.java", LIB);
        lib.coordinate = Some("androidx.core:core".to_string());
        let mut app = inline("app/src/main/java/app/pkg/App.java", APP);
        app.coordinate = Some("com.example:app".to_string());

        let findings = analyze(&[app, lib], Config::default());
        assert_eq!(
            messages(&findings, Issue::RestrictedApi),
            vec![
                "Lib.group can only be called from within the same library group (referenced groupId=androidx.core from groupId=com.example)",
                "Lib.library can only be called from within the same library (androidx.core:core)",
            ]
        );
    }

    #[test]
    fn test_same_group_other_artifact() {
        let mut lib = inline("lib/src/main/java/lib/pkg/Lib.java", LIB);
        lib.coordinate = Some("androidx.core:core".to_string());
        let mut app = inline("app/src/main/java/app/pkg/App.java", APP);
        app.coordinate = Some("androidx.core:core-ktx".to_string());

        let findings = analyze(&[app, lib], Config::default());
        assert_eq!(
            messages(&findings, Issue::RestrictedApi),
            vec!["Lib.library can only be called from within the same library (androidx.core:core)"]
        );
    }

    #[test]
    fn test_subclasses_and_tests_scopes() {
        let api = inline(
            "src/main/java/test/pkg/Base.java",
            r#"
package test.pkg;
import androidx.annotation.RestrictTo;
public class Base {
    @RestrictTo(RestrictTo.Scope.SUBCLASSES)
    public void hook() {}
    @RestrictTo(RestrictTo.Scope.TESTS)
    public static void reset() {}
}
class Sub extends Base {
    void ok() { hook(); }
}
class Unrelated {
    void call(Base b) {
        b.hook();
        Base.reset();
    }
}
"#,
        );
        let test = inline(
            "src/test/java/test/pkg/BaseTest.java",
            r#"
package test.pkg;
public class BaseTest {
    void testReset() {
        Base.reset();
    }
}
"#,
        );
        let findings = analyze(&[api, test], Config::default());
        assert_eq!(
            messages(&findings, Issue::RestrictedApi),
            vec![
                "Base.hook can only be called from subclasses",
                "Base.reset can only be called from tests",
            ]
        );
    }

    #[test]
    fn test_modules_from_config_on_disk() {
        let dir = TempDir::new().unwrap();
        let lib_dir = dir.path().join("lib/src/main/java/lib/pkg");
        let app_dir = dir.path().join("app/src/main/java/app/pkg");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::create_dir_all(&app_dir).unwrap();
        fs::write(lib_dir.join("Lib.java"), LIB).unwrap();
        fs::write(app_dir.join("App.java"), APP).unwrap();

        let mut config = Config::default();
        config
            .modules
            .insert("lib/".to_string(), "androidx.core:core".to_string());
        config
            .modules
            .insert("app/".to_string(), "androidx.core:core-ktx".to_string());

        let files = FileFinder::new(&config).find_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        let units = load_units(&files, &config, dir.path(), None);
        assert!(units
            .iter()
            .any(|u| u.coordinate.as_deref() == Some("androidx.core:core-ktx")));

        let findings = analyze(&units, config);
        assert_eq!(
            messages(&findings, Issue::RestrictedApi),
            vec!["Lib.library can only be called from within the same library (androidx.core:core)"]
        );
    }
}

// ============================================================================
// VisibleForTesting
// ============================================================================

mod visible_for_testing_tests {
    use super::*;

    const API: &str = r#"
package test.pkg;
import androidx.annotation.VisibleForTesting;
public class Api {
    @VisibleForTesting
    public static void hidden() {}
    @VisibleForTesting(otherwise = VisibleForTesting.PACKAGE_PRIVATE)
    public static void packaged() {}
}
"#;

    #[test]
    fn test_production_and_test_callers() {
        let caller = inline(
            "src/main/java/other/pkg/Caller.java",
            r#"
package other.pkg;
import test.pkg.Api;
public class Caller {
    void call() {
        Api.hidden();
        Api.packaged();
    }
}
"#,
        );
        let test = inline(
            "src/test/java/other/pkg/CallerTest.java",
            r#"
package other.pkg;
import test.pkg.Api;
public class CallerTest {
    void testCall() {
        Api.hidden();
        Api.packaged();
    }
}
"#,
        );
        let api = inline("src/main/java/test/pkg/Api.java", API);
        let findings = analyze(&[api, caller, test], Config::default());

        let visible: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.issue == Issue::VisibleForTests)
            .collect();
        assert_eq!(visible.len(), 2);
        assert!(visible
            .iter()
            .all(|f| f.location.path.ends_with("Caller.java")));
        assert_eq!(
            visible[0].message,
            "This method should only be accessed from tests or within private scope"
        );
        assert_eq!(
            visible[1].message,
            "This method should only be accessed from tests or within package private scope"
        );
    }
}

// ============================================================================
// SupportAnnotationUsage
// ============================================================================

mod usage_tests {
    use super::*;

    #[test]
    fn test_misapplied_annotations() {
        let unit = inline(
            "src/main/java/test/pkg/Usage.java",
            r#"
package test.pkg;
import androidx.annotation.IntRange;
import androidx.annotation.RestrictTo;
public class Usage {
    void backwards(@IntRange(from = 10, to = 1) int value) {}
    void text(@IntRange(from = 0) String value) {}
    @RestrictTo()
    public void nothing() {}
}
"#,
        );
        let config = Config {
            enable: vec!["SupportAnnotationUsage".to_string()],
            ..Config::default()
        };
        let findings = analyze(&[unit], config);
        assert!(findings
            .iter()
            .all(|f| f.issue == Issue::SupportAnnotationUsage));
        assert_eq!(
            messages(&findings, Issue::SupportAnnotationUsage),
            vec![
                "Invalid range: the `from` attribute must be less than the `to` attribute",
                "This annotation does not apply for type String; expected int or long",
                "Restrict to what? Expected at least one `RestrictTo.Scope` arguments.",
            ]
        );
    }
}
