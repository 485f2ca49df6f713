//! Source loading
//!
//!     Every pass reads the root document and, through `*input*`, the files it includes. The
//!     [`Sources`] trait is the single seam for reading them, so the engine can run against
//!     the file system or against an in-memory set of documents (used throughout the tests).
//!
//!     Include paths are resolved against the directory of the including file. The
//!     [`IncludeStack`] tracks the chain of open files, rejecting cycles and chains deeper
//!     than the configured limit.

use crate::error::CompileError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Provider of source texts
pub trait Sources {
    /// Load the full text of `path`
    fn load(&self, path: &Path) -> Result<String, CompileError>;
}

/// Sources read from the file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSources;

impl Sources for FileSources {
    fn load(&self, path: &Path) -> Result<String, CompileError> {
        debug!(path = %path.display(), "reading source");
        fs::read_to_string(path).map_err(|err| CompileError::io(path, err))
    }
}

/// Sources held in memory, keyed by path
#[derive(Debug, Default, Clone)]
pub struct MemorySources {
    files: HashMap<PathBuf, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, returning `self` for chaining
    pub fn with(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl Sources for MemorySources {
    fn load(&self, path: &Path) -> Result<String, CompileError> {
        self.files.get(path).cloned().ok_or_else(|| {
            CompileError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
            )
        })
    }
}

/// Resolve an include argument against the file that contains it
pub fn resolve_include(including: &Path, target: &str) -> PathBuf {
    match including.parent() {
        Some(dir) => dir.join(target),
        None => PathBuf::from(target),
    }
}

/// Chain of files currently being scanned
#[derive(Debug, Clone)]
pub struct IncludeStack {
    files: Vec<PathBuf>,
    limit: usize,
}

impl IncludeStack {
    pub fn new(limit: usize) -> Self {
        Self {
            files: Vec::new(),
            limit,
        }
    }

    /// Enter `path`, failing on cycles and on exceeding the depth limit
    pub fn enter(&mut self, path: &Path) -> Result<(), CompileError> {
        if self.files.iter().any(|open| open == path) {
            return Err(CompileError::IncludeCycle {
                path: path.to_path_buf(),
                chain: self.files.clone(),
            });
        }
        if self.files.len() >= self.limit {
            return Err(CompileError::IncludeDepth {
                path: path.to_path_buf(),
                limit: self.limit,
            });
        }
        self.files.push(path.to_path_buf());
        Ok(())
    }

    pub fn leave(&mut self) {
        self.files.pop();
    }

    /// The file currently being scanned
    pub fn current(&self) -> Option<&Path> {
        self.files.last().map(PathBuf::as_path)
    }

    pub fn depth(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sources_load() {
        let sources = MemorySources::new().with("main.sm", "hello");
        assert_eq!(sources.load(Path::new("main.sm")).unwrap(), "hello");
        assert!(matches!(
            sources.load(Path::new("missing.sm")),
            Err(CompileError::Io { .. })
        ));
    }

    #[test]
    fn test_resolve_include_relative_to_parent() {
        assert_eq!(
            resolve_include(Path::new("book/main.sm"), "ch1.sm"),
            PathBuf::from("book/ch1.sm")
        );
        assert_eq!(
            resolve_include(Path::new("main.sm"), "ch1.sm"),
            PathBuf::from("ch1.sm")
        );
    }

    #[test]
    fn test_include_stack_detects_cycle() {
        let mut stack = IncludeStack::new(8);
        stack.enter(Path::new("a.sm")).unwrap();
        stack.enter(Path::new("b.sm")).unwrap();
        let err = stack.enter(Path::new("a.sm")).unwrap_err();
        assert!(matches!(err, CompileError::IncludeCycle { .. }));
    }

    #[test]
    fn test_include_stack_depth_limit() {
        let mut stack = IncludeStack::new(2);
        stack.enter(Path::new("a.sm")).unwrap();
        stack.enter(Path::new("b.sm")).unwrap();
        let err = stack.enter(Path::new("c.sm")).unwrap_err();
        assert!(matches!(err, CompileError::IncludeDepth { limit: 2, .. }));
        stack.leave();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current(), Some(Path::new("a.sm")));
    }
}
