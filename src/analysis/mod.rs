//! Annotation-driven analysis
//!
//! [`engine::LintEngine`] builds the frozen declaration index and annotation
//! table, walks every unit with [`walker::walk_unit`] and hands the call,
//! value and switch sites it finds to the [`detectors`]. Every detector
//! reports [`Finding`]s tagged with one [`Issue`].

pub mod annotations;
pub mod constraints;
pub mod detectors;
pub mod engine;
pub mod evaluator;
pub mod value;
pub mod walker;

pub use annotations::{AnnotationKey, AnnotationTable, ResolvedAnnotation, ValueConstraints};
pub use constraints::AnnotationConstraint;
pub use engine::{AnalysisResult, CancellationToken, LintEngine};
pub use evaluator::{ConstantEvaluator, Env};
pub use value::{SymbolicValue, ValueRange};

use crate::ast::Span;
use std::path::PathBuf;

/// The checks this tool knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Issue {
    /// Value or size outside an `@IntRange`/`@FloatRange`/`@Size`
    Range,

    /// Value not in an `@IntDef`/`@LongDef`/`@StringDef` set
    WrongConstant,

    /// Two typedef constants with the same value
    UniqueConstants,

    /// Flag constants written as literals instead of shifts
    ShiftFlags,

    /// Switch over a typedef value missing cases
    SwitchIntDef,

    /// Call from an incompatible thread context
    WrongThread,

    /// Call to an API restricted by `@RestrictTo` or `@Hide`
    RestrictedApi,

    /// Use of a `@VisibleForTesting` member from production code
    VisibleForTests,

    /// Malformed or misplaced annotation
    SupportAnnotationUsage,
}

impl Issue {
    pub const ALL: [Issue; 9] = [
        Issue::Range,
        Issue::WrongConstant,
        Issue::UniqueConstants,
        Issue::ShiftFlags,
        Issue::SwitchIntDef,
        Issue::WrongThread,
        Issue::RestrictedApi,
        Issue::VisibleForTests,
        Issue::SupportAnnotationUsage,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Issue::Range => "Range",
            Issue::WrongConstant => "WrongConstant",
            Issue::UniqueConstants => "UniqueConstants",
            Issue::ShiftFlags => "ShiftFlags",
            Issue::SwitchIntDef => "SwitchIntDef",
            Issue::WrongThread => "WrongThread",
            Issue::RestrictedApi => "RestrictedApi",
            Issue::VisibleForTests => "VisibleForTests",
            Issue::SupportAnnotationUsage => "SupportAnnotationUsage",
        }
    }

    pub fn from_id(id: &str) -> Option<Issue> {
        Issue::ALL
            .iter()
            .copied()
            .find(|issue| issue.id().eq_ignore_ascii_case(id))
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            Issue::ShiftFlags | Issue::SwitchIntDef | Issue::VisibleForTests => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// One-line summary shown by `--list-issues`
    pub fn brief(&self) -> &'static str {
        match self {
            Issue::Range => "Outside Range",
            Issue::WrongConstant => "Incorrect constant",
            Issue::UniqueConstants => "Overlapping Enumeration Constants",
            Issue::ShiftFlags => "Dangerous Flag Constant Declaration",
            Issue::SwitchIntDef => "Missing @IntDef in Switch",
            Issue::WrongThread => "Wrong Thread",
            Issue::RestrictedApi => "Restricted API",
            Issue::VisibleForTests => "Visible Only For Tests",
            Issue::SupportAnnotationUsage => "Incorrect support annotation usage",
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Label used in the lint text format
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source range in one file, optionally with its own message
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub path: PathBuf,
    pub span: Span,
    pub message: Option<String>,
}

impl Location {
    pub fn new(path: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            path: path.into(),
            span,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Replace the text covered by `span`
#[derive(Debug, Clone, PartialEq)]
pub struct TextEdit {
    pub span: Span,
    pub replacement: String,
}

/// A suggested quick fix
#[derive(Debug, Clone, PartialEq)]
pub struct LintFix {
    pub description: String,
    pub edits: Vec<TextEdit>,
}

impl LintFix {
    pub fn replace(description: impl Into<String>, span: Span, replacement: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            edits: vec![TextEdit {
                span,
                replacement: replacement.into(),
            }],
        }
    }
}

/// One reported problem
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub issue: Issue,
    pub severity: Severity,
    /// Raw message; backticks mark code
    pub message: String,
    pub location: Location,
    /// Related locations, in reporting order
    pub secondary: Vec<Location>,
    pub fixes: Vec<LintFix>,
}

impl Finding {
    pub fn new(issue: Issue, location: Location, message: impl Into<String>) -> Self {
        Self {
            issue,
            severity: issue.default_severity(),
            message: message.into(),
            location,
            secondary: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_secondary(mut self, location: Location) -> Self {
        self.secondary.push(location);
        self
    }

    pub fn with_fix(mut self, fix: LintFix) -> Self {
        self.fixes.push(fix);
        self
    }

    pub fn line(&self) -> usize {
        self.location.span.line
    }
}
