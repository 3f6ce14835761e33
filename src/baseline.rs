//! Baseline support
//!
//! A baseline records the findings of an earlier run so only new ones are
//! reported. Entries are matched on issue id, relative path and raw message;
//! line numbers are ignored so unrelated edits don't invalidate the baseline.

use crate::analysis::Finding;
use crate::error::{LintError, Result};
use crate::report::display_path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub id: String,
    pub path: String,
    pub message: String,
}

impl BaselineEntry {
    fn from_finding(finding: &Finding, root: &Path) -> Self {
        Self {
            id: finding.issue.id().to_string(),
            path: display_path(&finding.location.path, Some(root)),
            message: finding.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Baseline {
    pub version: u32,
    pub issues: Vec<BaselineEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaselineStats {
    /// Baseline entries still present
    pub baselined_found: usize,
    /// Findings not in the baseline
    pub new_issues: usize,
    /// Baseline entries that no longer occur
    pub fixed: usize,
}

impl fmt::Display for BaselineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} baselined, {} new, {} fixed",
            self.baselined_found, self.new_issues, self.fixed
        )
    }
}

impl Baseline {
    pub fn from_findings(findings: &[Finding], root: &Path) -> Self {
        let mut issues: Vec<BaselineEntry> = findings
            .iter()
            .map(|f| BaselineEntry::from_finding(f, root))
            .collect();
        issues.sort_by(|a, b| (&a.path, &a.id, &a.message).cmp(&(&b.path, &b.id, &b.message)));
        issues.dedup();
        Self { version: 1, issues }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LintError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| LintError::Baseline {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| LintError::Baseline {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| LintError::io(path, e))
    }

    fn keys(&self) -> HashSet<&BaselineEntry> {
        self.issues.iter().collect()
    }

    /// Findings not covered by the baseline
    pub fn filter_new<'f>(&self, findings: &'f [Finding], root: &Path) -> Vec<&'f Finding> {
        let keys = self.keys();
        findings
            .iter()
            .filter(|f| !keys.contains(&BaselineEntry::from_finding(f, root)))
            .collect()
    }

    pub fn stats(&self, findings: &[Finding], root: &Path) -> BaselineStats {
        let keys = self.keys();
        let current: HashSet<BaselineEntry> = findings
            .iter()
            .map(|f| BaselineEntry::from_finding(f, root))
            .collect();
        let new_issues = findings
            .iter()
            .filter(|f| !keys.contains(&BaselineEntry::from_finding(f, root)))
            .count();
        let baselined_found = keys.iter().filter(|k| current.contains(**k)).count();
        BaselineStats {
            baselined_found,
            new_issues,
            fixed: keys.len() - baselined_found,
        }
    }
}
