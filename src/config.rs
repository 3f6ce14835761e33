//! Configuration loading
//!
//! Configuration is read from `annolint.yml`, `annolint.yaml`,
//! `annolint.toml` or `.annolint.yml` in the project root, or from an
//! explicit `--config` file. CLI flags are applied on top in `main.rs`.

use crate::analysis::Severity;
use crate::error::{LintError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_LOCATIONS: &[&str] = &[
    "annolint.yml",
    "annolint.yaml",
    "annolint.toml",
    ".annolint.yml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories to analyze, relative to the project root
    pub targets: Vec<PathBuf>,

    /// Glob patterns of files to skip
    pub exclude: Vec<String>,

    /// Honor `.gitignore` while walking
    pub respect_gitignore: bool,

    /// Only run these issues (empty = all)
    pub enable: Vec<String>,

    /// Never run these issues
    pub disable: Vec<String>,

    /// Per-issue severity overrides: `error`, `warning`, `info` or `ignore`
    pub severity: BTreeMap<String, String>,

    /// Regexes matched against paths to classify test sources
    pub test_source_patterns: Vec<String>,

    /// Path prefix → maven coordinate (`group:artifact`)
    pub modules: BTreeMap<String, String>,

    /// Coordinate of sources outside every configured module
    pub project_coordinate: Option<String>,

    /// Packages allowed to use APIs hidden from apps
    pub internal_package_prefixes: Vec<String>,

    /// Analyze files on the rayon thread pool
    pub parallel: bool,

    /// Abort analysis after this many seconds
    pub deadline_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            exclude: vec!["**/build/**".to_string(), "**/.gradle/**".to_string()],
            respect_gitignore: true,
            enable: Vec::new(),
            disable: Vec::new(),
            severity: BTreeMap::new(),
            test_source_patterns: vec![
                "/src/test[A-Za-z]*/".to_string(),
                "/src/androidTest[A-Za-z]*/".to_string(),
            ],
            modules: BTreeMap::new(),
            project_coordinate: None,
            internal_package_prefixes: vec![
                "com.google.android.gms".to_string(),
                "com.google.firebase".to_string(),
                "com.google.ads".to_string(),
                "com.google.mlkit".to_string(),
            ],
            parallel: true,
            deadline_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML or TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LintError::io(path, e))?;
        let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");

        let config = if is_toml {
            toml::from_str(&content).map_err(|e| LintError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| LintError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the first default location found under `root`, else defaults
    pub fn from_default_locations(root: &Path) -> Result<Self> {
        for name in DEFAULT_LOCATIONS {
            let candidate = root.join(name);
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// Whether an issue id passes the enable/disable lists
    pub fn is_issue_enabled(&self, id: &str) -> bool {
        if self.disable.iter().any(|d| d.eq_ignore_ascii_case(id)) {
            return false;
        }
        if self.severity_override(id) == Some(None) {
            return false;
        }
        self.enable.is_empty() || self.enable.iter().any(|e| e.eq_ignore_ascii_case(id))
    }

    /// `Some(None)` means the issue is configured as `ignore`
    pub fn severity_override(&self, id: &str) -> Option<Option<Severity>> {
        let value = self
            .severity
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id))
            .map(|(_, v)| v)?;
        match value.to_ascii_lowercase().as_str() {
            "error" | "fatal" => Some(Some(Severity::Error)),
            "warning" => Some(Some(Severity::Warning)),
            "info" | "informational" => Some(Some(Severity::Info)),
            "ignore" => Some(None),
            other => {
                warn!("Unknown severity '{}' for {}", other, id);
                None
            }
        }
    }

    pub fn test_matcher(&self) -> TestSourceMatcher {
        TestSourceMatcher::new(&self.test_source_patterns)
    }

    /// Maven coordinate for a file, longest module prefix first
    pub fn coordinate_for(&self, root: &Path, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        self.modules
            .iter()
            .filter(|(prefix, _)| relative.starts_with(prefix.trim_start_matches("./")))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, coordinate)| coordinate.clone())
            .or_else(|| self.project_coordinate.clone())
    }
}

/// Compiled test-source patterns
#[derive(Debug, Clone)]
pub struct TestSourceMatcher {
    patterns: Vec<Regex>,
}

impl TestSourceMatcher {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring invalid test source pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_test(&self, path: &Path) -> bool {
        let text = path.to_string_lossy().replace('\\', "/");
        let text = format!("/{}", text.trim_start_matches('/'));
        self.patterns.iter().any(|re| re.is_match(&text))
    }
}
