//! annolint - Annotation-driven static analysis for Android (Kotlin/Java)
//!
//! Checks code against the Android support annotations: numeric ranges and
//! sizes, typedef constant sets, thread contexts, API restrictions and
//! test-only visibility.
//!
//! # Architecture
//!
//! The analysis pipeline consists of:
//! 1. **File Discovery** - Find all .kt and .java files
//! 2. **Parsing** - Lower tree-sitter trees into a small AST
//! 3. **Indexing** - Build the frozen cross-file declaration index and
//!    decode every annotation
//! 4. **Checking** - Walk each file with flow-sensitive constant evaluation
//!    and run the detectors on the sites found
//! 5. **Reporting** - Output findings as lint text, compact text or JSON

pub mod analysis;
pub mod ast;
pub mod baseline;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod parser;
pub mod report;

pub use analysis::{AnalysisResult, CancellationToken, Finding, Issue, LintEngine, Severity};
pub use baseline::Baseline;
pub use config::Config;
pub use discovery::FileFinder;
pub use error::{LintError, Result};
pub use parser::{load_units, parse_source};
pub use report::{ReportFormat, Reporter, SourceMap};
