//! Structure pass
//!
//!     Numbers and registers every section and every figure label.
//!
//!     A section opener is followed by its header:
//!
//!         *section* *section-name* intro *section-title* Introduction
//!         *subsection* *section-name* bg *section-title-html* Back<i>ground</i> *section-title-tex* Background
//!
//!     The name is mandatory and comes first; at least one title marker with text must follow.
//!     Anything else is a structure error naming the offending token. Names become page file
//!     names, so they may not contain path separators or `..`, and may not take the name of a
//!     generated page (the index and the bibliography). The same header parser
//!     is used by the render dispatcher, so both stages agree on where a header ends.
//!
//!     Numbering is `parent.index`, 1-based per parent. Opening a section implicitly closes any
//!     open section of the same or deeper level; a subsection needs an enclosing section, and a
//!     subsubsection an enclosing subsection.

use super::{Visitor, Walker};
use crate::context::{FigureTable, SectionId, SectionRegistry, SectionTitles};
use crate::error::CompileError;
use crate::lexing::{read_argument, split, Command, CommandToken, Core, TokenReader};
use crate::loader::Sources;
use std::path::Path;
use tracing::debug;

pub fn collect<S: Sources + ?Sized>(
    sources: &S,
    root: &Path,
    max_include_depth: usize,
    reserved: &[&str],
) -> Result<(SectionRegistry, FigureTable), CompileError> {
    let mut pass = StructurePass {
        reserved: reserved.iter().map(|name| name.to_string()).collect(),
        ..StructurePass::default()
    };
    Walker::new(sources, max_include_depth).walk(root, &mut pass)?;
    Ok((pass.sections, pass.figures))
}

/// Nesting depth of a section opener or closer
pub fn section_depth(command: Command) -> Option<usize> {
    match command {
        Command::Section | Command::PagedSection => Some(1),
        Command::Subsection => Some(2),
        Command::Subsubsection => Some(3),
        _ => None,
    }
}

/// Name and titles read after a section opener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    pub titles: SectionTitles,
}

/// Read the `*section-name*` / title markers following a section opener
pub fn parse_section_header(
    reader: &mut TokenReader<'_>,
    file: &Path,
) -> Result<SectionHeader, CompileError> {
    if next_marker(reader) != Some(Command::SectionName) {
        return Err(CompileError::structure(
            file,
            upcoming(reader),
            "a section must start with `*section-name*`",
        ));
    }
    reader.next_token();
    let Some(name) = read_argument(reader) else {
        return Err(CompileError::structure(
            file,
            upcoming(reader),
            "`*section-name*` must be followed by a name",
        ));
    };
    if !is_page_name(&name) {
        return Err(CompileError::structure(
            file,
            name,
            "a section name may not contain `/`, `\\` or `..`",
        ));
    }

    let mut titles = SectionTitles::default();
    while let Some(marker) = next_marker(reader) {
        let slot = match marker {
            Command::SectionTitle => &mut titles.title,
            Command::SectionTitleHtml => &mut titles.html,
            Command::SectionTitleTex => &mut titles.tex,
            _ => break,
        };
        reader.next_token();
        let text = read_title(reader);
        if text.is_empty() {
            return Err(CompileError::structure(
                file,
                upcoming(reader),
                format!("section `{name}` has an empty title"),
            ));
        }
        *slot = Some(text);
    }

    if titles.is_empty() {
        return Err(CompileError::structure(
            file,
            upcoming(reader),
            format!("section `{name}` must have a `*section-title*`"),
        ));
    }
    Ok(SectionHeader { name, titles })
}

fn is_page_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

/// Text of the next token, for error reports
pub(crate) fn upcoming(reader: &mut TokenReader<'_>) -> String {
    reader
        .peek()
        .map(|t| t.text)
        .unwrap_or_else(|| "end of input".to_string())
}

/// The opening command at the very start of the next token, splitting off what follows it
fn next_marker(reader: &mut TokenReader<'_>) -> Option<Command> {
    let token = reader.peek()?;
    let parts = split(&token.text);
    match parts.core {
        Core::Command(command) if parts.leading.is_empty() && !command.closing => {
            if !parts.trailing.is_empty() {
                reader.next_token();
                reader.unread_glued(parts.trailing);
                reader.unread_glued(parts.core_text);
            }
            Some(command.command)
        }
        _ => None,
    }
}

/// Title words up to the next command marker
fn read_title(reader: &mut TokenReader<'_>) -> String {
    let mut words: Vec<String> = Vec::new();
    loop {
        let position = reader.save();
        let Some(token) = reader.next_token() else {
            break;
        };
        let parts = split(&token.text);
        match parts.core {
            Core::Text(text) => push_word(&mut words, text, token.glued),
            _ if !parts.leading.is_empty() => {
                push_word(&mut words, parts.leading, token.glued);
                reader.unread_glued(&token.text[parts.leading.len()..]);
                break;
            }
            _ => {
                reader.restore(position);
                break;
            }
        }
    }
    words.join(" ")
}

fn push_word(words: &mut Vec<String>, text: &str, glued: bool) {
    if glued {
        if let Some(last) = words.last_mut() {
            last.push_str(text);
            return;
        }
    }
    words.push(text.to_string());
}

/// Stack of open sections, shared by the structure pass and the render dispatcher
#[derive(Debug, Default, Clone)]
pub struct Nesting {
    open: Vec<(SectionId, usize)>,
}

impl Nesting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare to open a section at `depth`
    ///
    /// Closes open sections at `depth` or deeper, returning them innermost first, and
    /// yields the parent of the new section.
    pub fn open(
        &mut self,
        depth: usize,
        file: &Path,
        name: &str,
    ) -> Result<(Vec<SectionId>, Option<SectionId>), CompileError> {
        let closed = self.close(depth);
        let parent = self.open.last().copied();
        match parent {
            None if depth > 1 => Err(CompileError::structure(
                file,
                name,
                "a subsection must be inside a section",
            )),
            Some((_, parent_depth)) if parent_depth + 1 != depth => Err(CompileError::structure(
                file,
                name,
                "a subsubsection must be inside a subsection",
            )),
            _ => Ok((closed, parent.map(|(id, _)| id))),
        }
    }

    pub fn push(&mut self, id: SectionId, depth: usize) {
        self.open.push((id, depth));
    }

    /// Close every open section at `depth` or deeper, innermost first
    pub fn close(&mut self, depth: usize) -> Vec<SectionId> {
        let mut closed = Vec::new();
        while let Some(&(id, open_depth)) = self.open.last() {
            if open_depth < depth {
                break;
            }
            self.open.pop();
            closed.push(id);
        }
        closed
    }

    pub fn current(&self) -> Option<SectionId> {
        self.open.last().map(|&(id, _)| id)
    }
}

#[derive(Default)]
struct StructurePass {
    sections: SectionRegistry,
    figures: FigureTable,
    nesting: Nesting,
    /// Page names taken by generated pages
    reserved: Vec<String>,
}

impl Visitor for StructurePass {
    fn command(
        &mut self,
        command: CommandToken,
        _closer: Option<&str>,
        reader: &mut TokenReader<'_>,
        file: &Path,
    ) -> Result<(), CompileError> {
        if let Some(depth) = section_depth(command.command) {
            if command.closing {
                self.nesting.close(depth);
                return Ok(());
            }
            let header = parse_section_header(reader, file)?;
            if self.reserved.contains(&header.name) {
                return Err(CompileError::structure(
                    file,
                    &header.name,
                    format!("`{}` is the name of a generated page", header.name),
                ));
            }
            let (_, parent) = self.nesting.open(depth, file, &header.name)?;
            let id = self.sections.add(
                parent,
                &header.name,
                header.titles,
                command.command == Command::PagedSection,
            )?;
            debug!(name = %header.name, number = %self.sections.get(id).number, "section");
            self.nesting.push(id, depth);
            return Ok(());
        }

        if command.command == Command::Label && !command.closing {
            match read_argument(reader) {
                Some(label) => {
                    let page = self
                        .nesting
                        .current()
                        .map(|id| self.sections.get(id).page.clone());
                    self.figures.assign(&label, page);
                }
                None => debug!(file = %file.display(), "label without a name"),
            }
        }
        Ok(())
    }
}
