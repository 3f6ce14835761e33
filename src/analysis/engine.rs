//! Run orchestration
//!
//! ## Phases
//!
//! 1. Index every unit into a frozen [`DeclarationIndex`] and decode all
//!    annotations into an [`AnnotationTable`]. Both are read-only afterwards.
//! 2. Walk each unit with the enabled detectors, on the rayon pool when
//!    parallel. The cancellation token is checked before each unit.
//! 3. Apply enable/disable lists and severity overrides, then sort and
//!    deduplicate.
//!
//! Units are independent during phase 2, so the result does not depend on
//! the order they are processed in.

use super::detectors::{self, Detector};
use super::walker::{walk_unit, UnitContext};
use super::{AnnotationTable, Finding};
use crate::ast::SourceUnit;
use crate::config::Config;
use crate::graph::DeclarationIndex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cooperative cancellation with an optional deadline
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub findings: Vec<Finding>,
    pub files_analyzed: usize,
    /// Some units were skipped because the run was cancelled
    pub cancelled: bool,
}

impl AnalysisResult {
    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == super::Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == super::Severity::Warning)
            .count()
    }
}

/// Runs detectors over a set of parsed units
pub struct LintEngine {
    config: Config,
    detectors: Vec<Box<dyn Detector>>,
    parallel: bool,
}

impl LintEngine {
    /// Engine with every detector owning at least one enabled issue
    pub fn new(config: Config) -> Self {
        let detectors = detectors::all()
            .into_iter()
            .filter(|d| d.issues().iter().any(|i| config.is_issue_enabled(i.id())))
            .collect();
        let parallel = config.parallel;
        Self {
            config,
            detectors,
            parallel,
        }
    }

    pub fn with_detectors(mut self, detectors: Vec<Box<dyn Detector>>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyze(&self, units: &[SourceUnit], cancel: &CancellationToken) -> AnalysisResult {
        info!("Indexing {} files...", units.len());
        let index = DeclarationIndex::build(units);
        let table = AnnotationTable::build(&index);

        info!("Running {} detectors...", self.detectors.len());
        let run_unit = |unit_index: usize| -> Option<Vec<Finding>> {
            if cancel.is_cancelled() {
                return None;
            }
            let cx = UnitContext::new(&index, &table, &self.config, unit_index);
            let findings = walk_unit(&cx, &self.detectors);
            debug!(
                "{}: {} findings",
                units[unit_index].path.display(),
                findings.len()
            );
            Some(findings)
        };

        let per_unit: Vec<Option<Vec<Finding>>> = if self.parallel {
            (0..units.len()).into_par_iter().map(run_unit).collect()
        } else {
            (0..units.len()).map(run_unit).collect()
        };

        let files_analyzed = per_unit.iter().filter(|r| r.is_some()).count();
        let cancelled = files_analyzed < units.len();
        if cancelled {
            warn!(
                "Analysis cancelled after {} of {} files",
                files_analyzed,
                units.len()
            );
        }

        let findings = self.finish(per_unit.into_iter().flatten().flatten().collect());
        info!("Found {} issues in {} files", findings.len(), files_analyzed);

        AnalysisResult {
            findings,
            files_analyzed,
            cancelled,
        }
    }

    /// Apply configuration, then sort into report order and drop duplicates
    fn finish(&self, findings: Vec<Finding>) -> Vec<Finding> {
        let mut findings: Vec<Finding> = findings
            .into_iter()
            .filter(|f| self.config.is_issue_enabled(f.issue.id()))
            .filter_map(|f| match self.config.severity_override(f.issue.id()) {
                Some(Some(severity)) => Some(f.with_severity(severity)),
                Some(None) => None,
                None => Some(f),
            })
            .collect();

        findings.sort_by(|a, b| {
            let key = |f: &Finding| {
                (
                    f.location.path.clone(),
                    f.location.span.line,
                    f.location.span.column,
                    f.issue.id(),
                )
            };
            key(a).cmp(&key(b)).then_with(|| a.message.cmp(&b.message))
        });
        findings.dedup_by(|b, a| {
            a.issue == b.issue
                && a.location.path == b.location.path
                && a.location.span == b.location.span
                && a.message == b.message
        });
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Issue, Severity};
    use crate::ast::Language;
    use crate::parser::parse_source;
    use std::collections::BTreeMap;
    use std::path::Path;

    const SOURCE: &str = r#"
package test.pkg;
import androidx.annotation.IntRange;
import androidx.annotation.UiThread;
import androidx.annotation.WorkerThread;
public class Sample {
    void set(@IntRange(from = 0, to = 10) int v) {}
    @WorkerThread void load() {}
    @UiThread void click() {
        set(11);
        load();
    }
}
"#;

    fn units() -> Vec<SourceUnit> {
        let other = SOURCE.replace("class Sample", "class Other");
        vec![
            parse_source(Path::new("src/Sample.java"), Language::Java, SOURCE).unwrap(),
            parse_source(Path::new("src/Other.java"), Language::Java, &other).unwrap(),
        ]
    }

    fn ids(result: &AnalysisResult) -> Vec<(String, &'static str)> {
        result
            .findings
            .iter()
            .map(|f| (f.location.path.display().to_string(), f.issue.id()))
            .collect()
    }

    #[test]
    fn test_findings_sorted_by_file_and_line() {
        let units = units();
        let engine = LintEngine::new(Config::default()).with_parallel(false);
        let result = engine.analyze(&units, &CancellationToken::new());

        assert_eq!(result.files_analyzed, 2);
        assert!(!result.cancelled);
        assert_eq!(
            ids(&result),
            vec![
                ("src/Other.java".to_string(), "Range"),
                ("src/Other.java".to_string(), "WrongThread"),
                ("src/Sample.java".to_string(), "Range"),
                ("src/Sample.java".to_string(), "WrongThread"),
            ]
        );
        assert_eq!(result.error_count(), 4);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let units = units();
        let sequential = LintEngine::new(Config::default())
            .with_parallel(false)
            .analyze(&units, &CancellationToken::new());
        let parallel = LintEngine::new(Config::default())
            .with_parallel(true)
            .analyze(&units, &CancellationToken::new());
        let again = LintEngine::new(Config::default())
            .with_parallel(true)
            .analyze(&units, &CancellationToken::new());

        assert_eq!(sequential.findings, parallel.findings);
        assert_eq!(parallel.findings, again.findings);
    }

    #[test]
    fn test_disable_and_severity_override() {
        let mut severity = BTreeMap::new();
        severity.insert("Range".to_string(), "warning".to_string());
        let config = Config {
            disable: vec!["WrongThread".to_string()],
            severity,
            ..Config::default()
        };
        let result = LintEngine::new(config).analyze(&units(), &CancellationToken::new());

        assert_eq!(result.findings.len(), 2);
        assert!(result.findings.iter().all(|f| f.issue == Issue::Range));
        assert!(result.findings.iter().all(|f| f.severity == Severity::Warning));
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_ignore_severity_drops_issue() {
        let mut severity = BTreeMap::new();
        severity.insert("range".to_string(), "ignore".to_string());
        let config = Config {
            severity,
            ..Config::default()
        };
        let result = LintEngine::new(config).analyze(&units(), &CancellationToken::new());
        assert!(result.findings.iter().all(|f| f.issue == Issue::WrongThread));
        assert_eq!(result.findings.len(), 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let result = LintEngine::new(Config::default()).analyze(&units(), &token);

        assert!(result.cancelled);
        assert_eq!(result.files_analyzed, 0);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_expired_deadline_cancels() {
        let token = CancellationToken::with_deadline(Duration::from_secs(0));
        assert!(token.is_cancelled());
        let result = LintEngine::new(Config::default()).analyze(&units(), &token);
        assert!(result.cancelled);
    }

    #[test]
    fn test_custom_detectors() {
        let engine = LintEngine::new(Config::default())
            .with_detectors(detectors::for_issues(&[Issue::WrongThread]));
        let result = engine.analyze(&units(), &CancellationToken::new());
        assert!(result.findings.iter().all(|f| f.issue == Issue::WrongThread));
        assert_eq!(result.findings.len(), 2);
    }
}
