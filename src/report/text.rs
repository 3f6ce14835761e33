//! Plain text reporter in the classic lint layout
//!
//! ```text
//! src/test/pkg/Foo.java:5: Error: Value must be ≥ 4 (was 3) [Range]
//!         foo(3);
//!             ~
//!     src/test/pkg/Foo.java:2: Previous same value
//!     @IntDef({A, B})
//!                 ~
//! 1 errors, 0 warnings
//! ```
//!
//! Backticks used for emphasis in raw messages are stripped. Underlines are
//! clamped to the first line of the span; an empty span is marked with `^`.

use super::{display_path, plain_message, SourceMap};
use crate::analysis::{Finding, LintFix, Location, Severity};
use std::fmt::Write as _;
use std::path::PathBuf;

pub struct TextReporter {
    base_path: Option<PathBuf>,
    show_fixes: bool,
}

impl TextReporter {
    pub fn new() -> Self {
        Self {
            base_path: None,
            show_fixes: false,
        }
    }

    pub fn with_base_path(mut self, path: PathBuf) -> Self {
        self.base_path = Some(path);
        self
    }

    pub fn with_fixes(mut self, show: bool) -> Self {
        self.show_fixes = show;
        self
    }

    pub fn render(&self, findings: &[Finding], sources: &SourceMap<'_>) -> String {
        let mut out = String::new();
        for finding in findings {
            self.render_finding(&mut out, finding, sources);
        }
        out.push_str(&summary_line(findings));
        out.push('\n');

        if self.show_fixes {
            for finding in findings {
                for fix in &finding.fixes {
                    self.render_fix(&mut out, &finding.location, fix, sources);
                }
            }
        }
        out
    }

    fn render_finding(&self, out: &mut String, finding: &Finding, sources: &SourceMap<'_>) {
        let _ = writeln!(
            out,
            "{}:{}: {}: {} [{}]",
            display_path(&finding.location.path, self.base_path.as_deref()),
            finding.location.span.line,
            finding.severity.label(),
            plain_message(&finding.message),
            finding.issue.id()
        );
        excerpt(out, &finding.location, sources);

        for secondary in &finding.secondary {
            let _ = write!(
                out,
                "    {}:{}",
                display_path(&secondary.path, self.base_path.as_deref()),
                secondary.span.line
            );
            match &secondary.message {
                Some(message) => {
                    let _ = writeln!(out, ": {}", plain_message(message));
                }
                None => out.push('\n'),
            }
            excerpt(out, secondary, sources);
        }
    }

    fn render_fix(&self, out: &mut String, location: &Location, fix: &LintFix, sources: &SourceMap<'_>) {
        let _ = writeln!(
            out,
            "Fix for {} line {}: {}:",
            display_path(&location.path, self.base_path.as_deref()),
            location.span.line,
            fix.description
        );
        let Some(source) = sources.source(&location.path) else {
            return;
        };

        let mut edited = source.to_string();
        let mut edits: Vec<_> = fix.edits.iter().collect();
        edits.sort_by_key(|e| std::cmp::Reverse(e.span.start));
        for edit in &edits {
            if edited.is_char_boundary(edit.span.start)
                && edited.is_char_boundary(edit.span.end)
                && edit.span.start <= edit.span.end
                && edit.span.end <= edited.len()
            {
                edited.replace_range(edit.span.start..edit.span.end, &edit.replacement);
            }
        }

        let Some(first) = edits.iter().map(|e| e.span.line).min() else {
            return;
        };
        let last = edits.iter().map(|e| e.span.end_line).max().unwrap_or(first);
        let before: Vec<&str> = source.lines().skip(first - 1).take(last - first + 1).collect();
        let added = before.len() as isize
            + (edited.lines().count() as isize - source.lines().count() as isize);
        let after: Vec<&str> = edited
            .lines()
            .skip(first - 1)
            .take(added.max(0) as usize)
            .collect();

        let _ = writeln!(out, "@@ -{} +{}", first, first);
        for line in before {
            let _ = writeln!(out, "- {}", line);
        }
        for line in after {
            let _ = writeln!(out, "+ {}", line);
        }
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// `N errors, M warnings`, or `No warnings.` when there is nothing to report
pub fn summary_line(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No warnings.".to_string();
    }
    let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
    let warnings = findings.iter().filter(|f| f.severity == Severity::Warning).count();
    format!("{} errors, {} warnings", errors, warnings)
}

/// Source line plus underline for a location
fn excerpt(out: &mut String, location: &Location, sources: &SourceMap<'_>) {
    let span = location.span;
    let Some(line) = sources.line(&location.path, span.line) else {
        return;
    };
    let start_col = span.column.saturating_sub(1);
    let prefix = line.get(..start_col.min(line.len())).unwrap_or(line);
    let indent = prefix.chars().count();

    let end_col = if span.end_line == span.line {
        span.end_column.saturating_sub(1).min(line.len())
    } else {
        line.len()
    };
    let width = line
        .get(start_col.min(line.len())..end_col.max(start_col).min(line.len()))
        .map(|s| s.chars().count())
        .unwrap_or(0);

    let _ = writeln!(out, "{}", line);
    let marker = if span.start == span.end {
        "^".to_string()
    } else {
        "~".repeat(width.max(1))
    };
    let _ = writeln!(out, "{}{}", " ".repeat(indent), marker);
}
