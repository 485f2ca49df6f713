//! Preparatory passes
//!
//!     Before anything is rendered, the whole document tree is scanned to build the
//!     [`CompilationContext`](crate::context::CompilationContext). Each pass is a single
//!     forward scan that only reacts to the commands it knows:
//!
//!         1. [metadata]: title, author, abstract and the other document fields.
//!         2. [webpages]: the entries of the top-level navigation.
//!         3. [structure]: section numbering, the section registry and figure numbers.
//!
//!     The scan itself is shared. [`Walker`] reads a file, splices in `*input*` files
//!     depth-first at the point of inclusion, skips verbatim blocks and formulas, and hands
//!     every other command to a [`Visitor`].

pub mod metadata;
pub mod structure;
pub mod webpages;

use crate::config::Settings;
use crate::context::CompilationContext;
use crate::error::CompileError;
use crate::lexing::{
    expect_closing, read_argument, split, Command, CommandToken, Core, TokenReader,
};
use crate::loader::{resolve_include, IncludeStack, Sources};
use std::path::Path;
use tracing::{debug, info};

/// A pass reacting to commands found by the [`Walker`]
pub trait Visitor {
    /// Handle one command; the reader is positioned right after it
    ///
    /// `closer` is the matching closing marker as spelled in the source, for opening
    /// commands.
    fn command(
        &mut self,
        command: CommandToken,
        closer: Option<&str>,
        reader: &mut TokenReader<'_>,
        file: &Path,
    ) -> Result<(), CompileError>;
}

/// Include-expanding command scanner shared by the passes
pub struct Walker<'s, S: Sources + ?Sized> {
    sources: &'s S,
    includes: IncludeStack,
}

impl<'s, S: Sources + ?Sized> Walker<'s, S> {
    pub fn new(sources: &'s S, max_include_depth: usize) -> Self {
        Self {
            sources,
            includes: IncludeStack::new(max_include_depth),
        }
    }

    /// Scan `path` and everything it includes
    pub fn walk<V: Visitor>(&mut self, path: &Path, visitor: &mut V) -> Result<(), CompileError> {
        self.includes.enter(path)?;
        let text = self.sources.load(path)?;
        let mut reader = TokenReader::new(&text);
        self.scan(&mut reader, path, visitor)?;
        self.includes.leave();
        Ok(())
    }

    fn scan<V: Visitor>(
        &mut self,
        reader: &mut TokenReader<'_>,
        file: &Path,
        visitor: &mut V,
    ) -> Result<(), CompileError> {
        while let Some(token) = reader.next_token() {
            let parts = split(&token.text);
            if !parts.leading.is_empty() {
                reader.unread_glued(&token.text[parts.leading.len()..]);
                continue;
            }
            match parts.core {
                Core::Command(command) => {
                    let closer = parts.closer();
                    reader.unread_glued(parts.trailing);
                    self.dispatch(command, closer.as_deref(), reader, file, visitor)?;
                }
                Core::Formula { closed: false, .. } => {
                    reader.read_until_char('$');
                }
                _ => reader.unread_glued(parts.trailing),
            }
        }
        Ok(())
    }

    fn dispatch<V: Visitor>(
        &mut self,
        command: CommandToken,
        closer: Option<&str>,
        reader: &mut TokenReader<'_>,
        file: &Path,
        visitor: &mut V,
    ) -> Result<(), CompileError> {
        match (command.command, closer) {
            (Command::Input, Some(_)) => self.include(reader, file, visitor),
            (raw, Some(closer)) if raw.is_raw() => {
                if reader.read_verbatim_until(closer).is_none() {
                    debug!(file = %file.display(), closer, "verbatim block runs to end of input");
                }
                Ok(())
            }
            _ => visitor.command(command, closer, reader, file),
        }
    }

    fn include<V: Visitor>(
        &mut self,
        reader: &mut TokenReader<'_>,
        file: &Path,
        visitor: &mut V,
    ) -> Result<(), CompileError> {
        let Some(target) = read_argument(reader) else {
            let found = reader
                .peek()
                .map(|t| t.text)
                .unwrap_or_else(|| "end of input".to_string());
            return Err(CompileError::MalformedInclude {
                path: file.to_path_buf(),
                found,
            });
        };
        let included = resolve_include(file, &target);
        self.walk(&included, visitor)?;
        expect_closing(reader, Command::Input)
            .map_err(|found| CompileError::MalformedInclude {
                path: included,
                found,
            })
    }
}

/// Run the three passes over `root` and assemble the compilation context
pub fn prepare<S: Sources + ?Sized>(
    sources: &S,
    root: &Path,
    settings: &Settings,
) -> Result<CompilationContext, CompileError> {
    let max_include_depth = settings.compile.max_include_depth;
    let reserved = [
        settings.hypertext.index_page.as_str(),
        settings.hypertext.bibliography_page.as_str(),
    ];

    let metadata = metadata::collect(sources, root, max_include_depth)?;
    info!(title = metadata.title.as_deref().unwrap_or(""), "metadata pass done");

    let webpages = webpages::collect(sources, root, max_include_depth)?;
    info!(count = webpages.len(), "webpage pass done");

    let (sections, figures) = structure::collect(sources, root, max_include_depth, &reserved)?;
    info!(
        sections = sections.len(),
        figures = figures.len(),
        "structure pass done"
    );

    Ok(CompilationContext {
        metadata,
        webpages,
        sections,
        figures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemorySources;
    use std::path::PathBuf;

    /// Records the name of every command it is shown
    #[derive(Default, Debug)]
    struct Recorder {
        seen: Vec<(Command, bool)>,
    }

    impl Visitor for Recorder {
        fn command(
            &mut self,
            command: CommandToken,
            _closer: Option<&str>,
            _reader: &mut TokenReader<'_>,
            _file: &Path,
        ) -> Result<(), CompileError> {
            self.seen.push((command.command, command.closing));
            Ok(())
        }
    }

    fn walk(sources: &MemorySources) -> Result<Recorder, CompileError> {
        let mut recorder = Recorder::default();
        Walker::new(sources, 8).walk(Path::new("main.sm"), &mut recorder)?;
        Ok(recorder)
    }

    #[test]
    fn test_includes_are_spliced_in_place() {
        let sources = MemorySources::new()
            .with("main.sm", "*b* x */b* *input* part.sm */input* *i* y */i*")
            .with("part.sm", "*u* inside */u*");
        let seen = walk(&sources).unwrap().seen;
        assert_eq!(
            seen,
            vec![
                (Command::Bold, false),
                (Command::Bold, true),
                (Command::Underline, false),
                (Command::Underline, true),
                (Command::Italic, false),
                (Command::Italic, true),
            ]
        );
    }

    #[test]
    fn test_verbatim_blocks_are_skipped() {
        let sources = MemorySources::new().with(
            "main.sm",
            "*code*\n*label* notme\n*/code* *comment* *b* */comment* $a *label* b$ *label*",
        );
        let seen = walk(&sources).unwrap().seen;
        assert_eq!(seen, vec![(Command::Label, false)]);
    }

    #[test]
    fn test_glued_commands_are_seen() {
        let sources = MemorySources::new().with("main.sm", "word*b*bold*/b*.");
        let seen = walk(&sources).unwrap().seen;
        assert_eq!(seen, vec![(Command::Bold, false), (Command::Bold, true)]);
    }

    #[test]
    fn test_include_without_closer_is_fatal() {
        let sources = MemorySources::new()
            .with("main.sm", "*input* part.sm more")
            .with("part.sm", "text");
        let err = walk(&sources).unwrap_err();
        match err {
            CompileError::MalformedInclude { path, found } => {
                assert_eq!(path, PathBuf::from("part.sm"));
                assert_eq!(found, "more");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_self_include_is_a_cycle() {
        let sources =
            MemorySources::new().with("main.sm", "*input* main.sm */input*");
        assert!(matches!(
            walk(&sources),
            Err(CompileError::IncludeCycle { .. })
        ));
    }

    #[test]
    fn test_missing_include_is_io_error() {
        let sources = MemorySources::new().with("main.sm", "*input* gone.sm */input*");
        assert!(matches!(walk(&sources), Err(CompileError::Io { .. })));
    }
}
