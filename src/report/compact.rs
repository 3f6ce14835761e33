//! Compact terminal reporter - minimal output format
//!
//! One line per finding grouped under its file, optimized for scanning large
//! result sets. Code spans quoted with backticks are highlighted.

use super::display_path;
use crate::analysis::{Finding, Severity};
use crate::report::colors::{BoxChars, SeveritySymbol, StructureColors};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Compact reporter for minimal, scannable output
pub struct CompactReporter {
    /// Base path to strip from file paths for shorter display
    base_path: Option<PathBuf>,
    /// Maximum width for file paths (truncate if longer)
    max_path_width: usize,
    files_count: Option<usize>,
}

impl CompactReporter {
    pub fn new() -> Self {
        Self {
            base_path: None,
            max_path_width: 60,
            files_count: None,
        }
    }

    pub fn with_base_path(mut self, path: PathBuf) -> Self {
        self.base_path = Some(path);
        self
    }

    pub fn with_files_count(mut self, count: usize) -> Self {
        self.files_count = Some(count);
        self
    }

    /// Format a path relative to base path if set
    fn format_path(&self, path: &Path) -> String {
        let display = display_path(path, self.base_path.as_deref());
        let chars = display.chars().count();
        if chars > self.max_path_width {
            let tail: String = display.chars().skip(chars - self.max_path_width + 3).collect();
            format!("...{}", tail)
        } else {
            display
        }
    }

    pub fn report(&self, findings: &[Finding]) {
        print!("{}", self.render(findings));
    }

    pub fn render(&self, findings: &[Finding]) -> String {
        let mut out = String::new();
        if findings.is_empty() {
            out.push_str(&format!("{}\n", "No issues found!".green().bold()));
            return out;
        }

        let mut by_file: BTreeMap<&Path, Vec<&Finding>> = BTreeMap::new();
        for finding in findings {
            by_file
                .entry(finding.location.path.as_path())
                .or_default()
                .push(finding);
        }

        for (file, mut items) in by_file {
            out.push_str(&format!("{}\n", StructureColors::file_path(&self.format_path(file))));
            items.sort_by_key(|f| (f.location.span.line, f.location.span.column));
            for item in items {
                out.push_str(&self.format_item(item));
                out.push('\n');
            }
            out.push('\n');
        }

        out.push_str(&self.format_summary(findings));
        out
    }

    fn format_item(&self, item: &Finding) -> String {
        let location = format!("{:>5}:{:<3}", item.location.span.line, item.location.span.column);
        format!(
            "  {}  {}  {}  {}",
            StructureColors::location(&location),
            SeveritySymbol::colored(&item.severity),
            StructureColors::issue_id(item.issue.id()),
            highlight_code(&item.message)
        )
    }

    fn format_summary(&self, findings: &[Finding]) -> String {
        let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
        let warnings = findings.iter().filter(|f| f.severity == Severity::Warning).count();
        let infos = findings.iter().filter(|f| f.severity == Severity::Info).count();

        let mut parts = Vec::new();
        if errors > 0 {
            parts.push(format!("{} {}", errors, "errors".red()));
        }
        if warnings > 0 {
            parts.push(format!("{} {}", warnings, "warnings".yellow()));
        }
        if infos > 0 {
            parts.push(format!("{} {}", infos, "info".blue()));
        }

        let files = match self.files_count {
            Some(count) => format!(" in {} files", count),
            None => String::new(),
        };
        format!(
            "{}\n  {} {} ({}){}\n",
            BoxChars::heavy_line(50).dimmed(),
            StructureColors::count(&findings.len().to_string()),
            "issues".bold(),
            parts.join(", "),
            files
        )
    }
}

impl Default for CompactReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace `code` spans with highlighted text
fn highlight_code(message: &str) -> String {
    let mut out = String::new();
    for (i, part) in message.split('`').enumerate() {
        if i % 2 == 1 {
            out.push_str(&StructureColors::code(part).to_string());
        } else {
            out.push_str(part);
        }
    }
    out
}
