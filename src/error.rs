//! Error types for the library surface
//!
//! Analysis itself never fails on unsupported syntax (values degrade to
//! unknown); these errors cover I/O, configuration, front-end and baseline
//! problems around it.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LintError {
    #[error("failed to read {}", .path.display())]
    #[diagnostic(code(annolint::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {message}", .path.display())]
    #[diagnostic(
        code(annolint::config),
        help("configuration files may be YAML (.yml/.yaml) or TOML (.toml)")
    )]
    Config { path: PathBuf, message: String },

    #[error("failed to parse {}: {message}", .path.display())]
    #[diagnostic(code(annolint::parse))]
    Parse { path: PathBuf, message: String },

    #[error("invalid baseline {}: {message}", .path.display())]
    #[diagnostic(code(annolint::baseline))]
    Baseline { path: PathBuf, message: String },
}

impl LintError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LintError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LintError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LintError>;
