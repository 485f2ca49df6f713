//! Error and warning types for the compiler
//!
//!     Fatal conditions are [`CompileError`] values. They unwind through every pass and the
//!     dispatcher with `?` and abort the run; nothing catches and retries them.
//!
//!     Recoverable conditions are [`Warning`] values. They are reported through
//!     [`Diagnostics`], which logs them and keeps a deduplicated record, and rendering
//!     continues with a placeholder.

use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Errors that abort a compilation
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed section header in `{}`: {message} (found `{token}`)", .file.display())]
    Structure {
        file: PathBuf,
        token: String,
        message: String,
    },

    #[error("section name `{name}` is defined more than once")]
    DuplicateSection { name: String },

    #[error("unknown section `{name}`; known sections: {}", .known.join(", "))]
    UnknownSection { name: String, known: Vec<String> },

    #[error("include of `{}` must be closed by `*/input*` (found `{found}`)", .path.display())]
    MalformedInclude { path: PathBuf, found: String },

    #[error("`{}` includes itself (include chain: {})", .path.display(), format_chain(.chain))]
    IncludeCycle { path: PathBuf, chain: Vec<PathBuf> },

    #[error("include depth limit of {limit} exceeded while opening `{}`", .path.display())]
    IncludeDepth { path: PathBuf, limit: usize },
}

impl CompileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn structure(
        file: impl Into<PathBuf>,
        token: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Structure {
            file: file.into(),
            token: token.into(),
            message: message.into(),
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Conditions that are reported but do not stop rendering
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("citation `{key}` not found in the bibliography")]
    CitationNotFound { key: String },

    #[error("bibliography `{}` could not be read: {reason}", .path.display())]
    BibliographyUnavailable { path: PathBuf, reason: String },

    #[error("figure `{file}` has no caption")]
    MissingCaption { file: String },

    #[error("figure `{file}` has no label")]
    MissingLabel { file: String },

    #[error("figure `{file}` is not closed by `*/figure*` (stopped at `{found}`)")]
    UnterminatedFigure { file: String, found: String },

    #[error("`*{command}*` is not closed by `*/{command}*` (found `{found}`)")]
    UnterminatedReference { command: String, found: String },

    #[error("no figure is labelled `{label}`")]
    UnknownFigure { label: String },

    #[error("`*{command}*` block runs to the end of the input")]
    UnterminatedBlock { command: String },
}

/// Collected warnings of a compilation
///
/// A warning that was already reported is not reported again, so rendering the same
/// input for both backends reports each problem once.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a warning, ignoring exact repeats
    pub fn warn(&mut self, warning: Warning) {
        if self.warnings.contains(&warning) {
            return;
        }
        warn!(target: "starmark", "{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }
}
