//! Source file discovery
//!
//! Walks the project honoring `.gitignore` (via `ignore`) or plainly (via
//! `walkdir`) and returns the Java and Kotlin files to analyze.

use crate::config::Config;
use crate::error::Result;
use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Java,
    Kotlin,
}

impl FileType {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("java") => Some(FileType::Java),
            Some("kt") => Some(FileType::Kotlin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_type: FileType,
}

impl SourceFile {
    pub fn new(path: PathBuf, file_type: FileType) -> Self {
        Self { path, file_type }
    }
}

/// Finds source files under the configured targets
pub struct FileFinder {
    targets: Vec<PathBuf>,
    excludes: Vec<Regex>,
    respect_gitignore: bool,
}

impl FileFinder {
    pub fn new(config: &Config) -> Self {
        let excludes = config
            .exclude
            .iter()
            .filter_map(|pattern| glob_to_regex(pattern))
            .collect();
        Self {
            targets: config.targets.clone(),
            excludes,
            respect_gitignore: config.respect_gitignore,
        }
    }

    /// Collect source files, sorted by path
    pub fn find_files(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let roots: Vec<PathBuf> = if self.targets.is_empty() {
            vec![root.to_path_buf()]
        } else {
            self.targets
                .iter()
                .map(|t| if t.is_absolute() { t.clone() } else { root.join(t) })
                .collect()
        };

        let mut files = Vec::new();
        for dir in roots {
            if self.respect_gitignore {
                for entry in WalkBuilder::new(&dir).hidden(true).build().flatten() {
                    self.consider(root, entry.path(), &mut files);
                }
            } else {
                for entry in WalkDir::new(&dir).follow_links(false).into_iter().flatten() {
                    self.consider(root, entry.path(), &mut files);
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup();
        Ok(files)
    }

    fn consider(&self, root: &Path, path: &Path, files: &mut Vec<SourceFile>) {
        if !path.is_file() {
            return;
        }
        let Some(file_type) = FileType::from_path(path) else {
            return;
        };
        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        if self.excludes.iter().any(|re| re.is_match(&relative)) {
            debug!("Excluded {}", relative);
            return;
        }
        files.push(SourceFile::new(path.to_path_buf(), file_type));
    }
}

/// Translate a `**`/`*`/`?` glob into an anchored regex
pub fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c if "\\.+()|[]{}^$".contains(c) => {
                re.push('\\');
                re.push(c);
            }
            c => re.push(c),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(FileType::from_path(Path::new("A.java")), Some(FileType::Java));
        assert_eq!(FileType::from_path(Path::new("b.kt")), Some(FileType::Kotlin));
        assert_eq!(FileType::from_path(Path::new("c.xml")), None);
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("**/build/**").unwrap();
        assert!(re.is_match("app/build/generated/A.java"));
        assert!(re.is_match("build/A.java"));
        assert!(!re.is_match("app/src/A.java"));

        let re = glob_to_regex("*.kt").unwrap();
        assert!(re.is_match("A.kt"));
        assert!(!re.is_match("dir/A.kt"));
    }

    #[test]
    fn test_find_files_with_excludes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/main/java")).unwrap();
        fs::create_dir_all(dir.path().join("build/gen")).unwrap();
        fs::write(dir.path().join("src/main/java/A.java"), "class A {}").unwrap();
        fs::write(dir.path().join("src/main/java/B.kt"), "class B").unwrap();
        fs::write(dir.path().join("build/gen/C.java"), "class C {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "text").unwrap();

        let config = Config {
            exclude: vec!["build/**".into()],
            respect_gitignore: false,
            ..Config::default()
        };
        let files = FileFinder::new(&config).find_files(dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.file_type == FileType::Kotlin));
        assert!(files.iter().all(|f| !f.path.to_string_lossy().contains("build")));
    }
}
