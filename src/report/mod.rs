mod colors;
mod compact;
mod json;
mod text;

pub use compact::CompactReporter;
pub use json::JsonReporter;
pub use text::{summary_line, TextReporter};

use crate::analysis::Finding;
use crate::ast::SourceUnit;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Lint text format with source excerpts
    #[default]
    Text,
    /// Colored one-line-per-issue format
    Compact,
    /// JSON machine-readable format
    Json,
}

/// Options for report generation
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Output file path (text and JSON)
    pub output_path: Option<PathBuf>,
    /// Base path to strip from file paths for shorter display
    pub base_path: Option<PathBuf>,
    /// Print quick-fix blocks after the summary
    pub show_fixes: bool,
    /// Files analyzed count (for the compact summary)
    pub files_count: Option<usize>,
}

/// Source text by path, for excerpts and fix previews
#[derive(Debug, Default)]
pub struct SourceMap<'a> {
    files: HashMap<PathBuf, &'a str>,
}

impl<'a> SourceMap<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: &'a [SourceUnit]) -> Self {
        let mut map = Self::new();
        for unit in units {
            map.insert(unit.path.clone(), unit.source.as_str());
        }
        map
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, source: &'a str) {
        self.files.insert(path.into(), source);
    }

    pub fn source(&self, path: &Path) -> Option<&'a str> {
        self.files.get(path).copied()
    }

    /// Text of a 1-based line
    pub fn line(&self, path: &Path, line: usize) -> Option<&'a str> {
        if line == 0 {
            return None;
        }
        self.source(path)?.lines().nth(line - 1)
    }
}

/// Path relative to `base` with forward slashes
pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    let relative = match base {
        Some(base) => path.strip_prefix(base).unwrap_or(path),
        None => path,
    };
    relative.to_string_lossy().replace('\\', "/")
}

/// Message without the backticks that mark code in raw messages
pub fn plain_message(message: &str) -> String {
    message.replace('`', "")
}

/// Reporter for annotation findings
pub struct Reporter {
    format: ReportFormat,
    options: ReportOptions,
}

impl Reporter {
    pub fn new(format: ReportFormat, output_path: Option<PathBuf>) -> Self {
        Self {
            format,
            options: ReportOptions {
                output_path,
                ..Default::default()
            },
        }
    }

    pub fn with_options(format: ReportFormat, options: ReportOptions) -> Self {
        Self { format, options }
    }

    /// Report the findings
    pub fn report(&self, findings: &[Finding], sources: &SourceMap<'_>) -> Result<()> {
        match self.format {
            ReportFormat::Text => {
                let mut reporter = TextReporter::new().with_fixes(self.options.show_fixes);
                if let Some(base) = &self.options.base_path {
                    reporter = reporter.with_base_path(base.clone());
                }
                self.emit(&reporter.render(findings, sources))
            }
            ReportFormat::Compact => {
                let mut reporter = CompactReporter::new();
                if let Some(base) = &self.options.base_path {
                    reporter = reporter.with_base_path(base.clone());
                }
                if let Some(files) = self.options.files_count {
                    reporter = reporter.with_files_count(files);
                }
                reporter.report(findings);
                Ok(())
            }
            ReportFormat::Json => {
                let mut reporter = JsonReporter::new(self.options.output_path.clone());
                if let Some(base) = &self.options.base_path {
                    reporter = reporter.with_base_path(base.clone());
                }
                reporter.report(findings)
            }
        }
    }

    fn emit(&self, text: &str) -> Result<()> {
        match &self.options.output_path {
            Some(path) => std::fs::write(path, text).into_diagnostic(),
            None => {
                print!("{}", text);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        assert_eq!(
            display_path(Path::new("/repo/app/src/A.java"), Some(Path::new("/repo"))),
            "app/src/A.java"
        );
        assert_eq!(display_path(Path::new("src/A.java"), Some(Path::new("/other"))), "src/A.java");
    }

    #[test]
    fn test_source_map_lines() {
        let mut map = SourceMap::new();
        map.insert("A.java", "one\ntwo\n");
        assert_eq!(map.line(Path::new("A.java"), 2), Some("two"));
        assert_eq!(map.line(Path::new("A.java"), 0), None);
        assert_eq!(map.line(Path::new("B.java"), 1), None);
    }

    #[test]
    fn test_plain_message() {
        assert_eq!(plain_message("Constant `A` has already been included"), "Constant A has already been included");
    }
}
