//! JSON reporter
//!
//! Messages are emitted raw, backticks included, so consumers can render
//! code spans themselves.

use super::display_path;
use crate::analysis::{Finding, Location};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct JsonReport {
    version: &'static str,
    total_issues: usize,
    errors: usize,
    warnings: usize,
    issues: Vec<JsonIssue>,
}

#[derive(Serialize)]
struct JsonIssue {
    id: &'static str,
    severity: &'static str,
    message: String,
    location: JsonLocation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    secondary: Vec<JsonLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fixes: Vec<JsonFix>,
}

#[derive(Serialize)]
struct JsonLocation {
    file: String,
    line: usize,
    column: usize,
    end_line: usize,
    end_column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Serialize)]
struct JsonFix {
    description: String,
    edits: Vec<JsonEdit>,
}

#[derive(Serialize)]
struct JsonEdit {
    start: usize,
    end: usize,
    replacement: String,
}

pub struct JsonReporter {
    output_path: Option<PathBuf>,
    base_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self {
            output_path,
            base_path: None,
        }
    }

    pub fn with_base_path(mut self, path: PathBuf) -> Self {
        self.base_path = Some(path);
        self
    }

    fn location(&self, location: &Location) -> JsonLocation {
        JsonLocation {
            file: display_path(&location.path, self.base_path.as_deref()),
            line: location.span.line,
            column: location.span.column,
            end_line: location.span.end_line,
            end_column: location.span.end_column,
            message: location.message.clone(),
        }
    }

    pub fn render(&self, findings: &[Finding]) -> Result<String> {
        let issues = findings
            .iter()
            .map(|f| JsonIssue {
                id: f.issue.id(),
                severity: f.severity.as_str(),
                message: f.message.clone(),
                location: self.location(&f.location),
                secondary: f.secondary.iter().map(|l| self.location(l)).collect(),
                fixes: f
                    .fixes
                    .iter()
                    .map(|fix| JsonFix {
                        description: fix.description.clone(),
                        edits: fix
                            .edits
                            .iter()
                            .map(|e| JsonEdit {
                                start: e.span.start,
                                end: e.span.end,
                                replacement: e.replacement.clone(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        let report = JsonReport {
            version: env!("CARGO_PKG_VERSION"),
            total_issues: findings.len(),
            errors: findings
                .iter()
                .filter(|f| f.severity == crate::analysis::Severity::Error)
                .count(),
            warnings: findings
                .iter()
                .filter(|f| f.severity == crate::analysis::Severity::Warning)
                .count(),
            issues,
        };
        serde_json::to_string_pretty(&report).into_diagnostic()
    }

    pub fn report(&self, findings: &[Finding]) -> Result<()> {
        let json = self.render(findings)?;
        match &self.output_path {
            Some(path) => std::fs::write(path, json).into_diagnostic(),
            None => {
                println!("{}", json);
                Ok(())
            }
        }
    }
}
