mod common;
mod java;
mod kotlin;

pub use common::Parser;
pub use java::JavaParser;
pub use kotlin::KotlinParser;

use crate::ast::{Language, SourceUnit};
use crate::config::Config;
use crate::discovery::{FileType, SourceFile};
use crate::error::{LintError, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Parse source text with the front-end for `language`
pub fn parse_source(path: &Path, language: Language, source: &str) -> Result<SourceUnit> {
    match language {
        Language::Java => JavaParser::new().parse(path, source),
        Language::Kotlin => KotlinParser::new().parse(path, source),
    }
}

/// Read and parse a discovered file
pub fn parse_file(file: &SourceFile) -> Result<SourceUnit> {
    let source =
        std::fs::read_to_string(&file.path).map_err(|e| LintError::io(&file.path, e))?;
    let language = match file.file_type {
        FileType::Java => Language::Java,
        FileType::Kotlin => Language::Kotlin,
    };
    parse_source(&file.path, language, &source)
}

/// Parse every file, tagging test sources and module coordinates
///
/// Files that fail to read or parse are logged and skipped. The result keeps
/// the order of `files`.
pub fn load_units(
    files: &[SourceFile],
    config: &Config,
    root: &Path,
    progress: Option<&ProgressBar>,
) -> Vec<SourceUnit> {
    let matcher = config.test_matcher();
    let load = |file: &SourceFile| -> Option<SourceUnit> {
        let result = parse_file(file);
        if let Some(pb) = progress {
            pb.inc(1);
        }
        match result {
            Ok(mut unit) => {
                let relative = file.path.strip_prefix(root).unwrap_or(&file.path);
                unit.is_test = matcher.is_test(relative);
                unit.coordinate = config.coordinate_for(root, &file.path);
                debug!("Parsed {} ({} classes)", file.path.display(), unit.classes.len());
                Some(unit)
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.path.display(), e);
                None
            }
        }
    };

    if config.parallel {
        files.par_iter().filter_map(load).collect()
    } else {
        files.iter().filter_map(load).collect()
    }
}
