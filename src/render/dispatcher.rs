//! Command dispatcher
//!
//!     Streams the token sequence of the root document (splicing in `*input*` files) and turns
//!     every token into calls on a [`Renderer`]. The dispatcher owns all decisions that are the
//!     same for both backends:
//!
//!         - paragraph inference: a bare `*` closes the open paragraph and arms a check that
//!           reopens one at the next word, or opens a paragraph when none is open;
//!         - spacing: a single space between words, none after an opening inline command,
//!           none before a closing one and none in front of glued fragments;
//!         - sections: headers are parsed again and resolved against the registry built by
//!           the structure pass;
//!         - blocks: figures, tables, lists and verbatim blocks run their own sub-loops until
//!           their closer and then return to the enclosing state;
//!         - inline references: citations resolved lazily, section and figure refs looked up
//!           in the compilation context.
//!
//!     Block sub-loops reuse [`Dispatcher::scan`] with a stop predicate, so table cells, list
//!     items and figure captions may hold any inline markup.

use super::{Figure, OutputUnit, Renderer, Style, Table};
use crate::citations::CitationResolver;
use crate::context::CompilationContext;
use crate::error::{CompileError, Diagnostics, Warning};
use crate::lexing::{
    expect_closing, read_argument, split, Command, CommandToken, Core, Split, TableAlign,
    TokenReader,
};
use crate::loader::{resolve_include, IncludeStack, Sources};
use crate::passes::structure::{parse_section_header, section_depth, upcoming, Nesting};
use crate::render::BackendKind;
use std::path::Path;
use tracing::{debug, info};

/// Decides whether a block sub-loop ends at a token, which is left unread
type Stop = fn(&Core<'_>) -> bool;

fn never(_: &Core<'_>) -> bool {
    false
}

fn figure_part(core: &Core<'_>) -> bool {
    matches!(
        core,
        Core::Command(CommandToken {
            command: Command::Caption
                | Command::Label
                | Command::Width
                | Command::WidthTex
                | Command::Figure,
            ..
        })
    )
}

fn table_part(core: &Core<'_>) -> bool {
    match core {
        Core::Text(text) => *text == "|",
        Core::Command(command) => {
            (command.command == Command::Row && !command.closing)
                || (matches!(command.command, Command::Table(..)) && command.closing)
        }
        _ => false,
    }
}

fn list_part(core: &Core<'_>) -> bool {
    match core {
        Core::Command(command) => {
            command.command == Command::Item
                || (matches!(command.command, Command::List | Command::NumList)
                    && command.closing)
        }
        _ => false,
    }
}

/// `*/codeexample*` -> `codeexample`
fn marker_name(closer: &str) -> String {
    closer.trim_matches('*').trim_start_matches('/').to_string()
}

/// Streams one backend's rendering of a document
pub struct Dispatcher<'a, S: Sources + ?Sized, R: Renderer> {
    context: &'a CompilationContext,
    sources: &'a S,
    citations: &'a mut CitationResolver,
    diagnostics: &'a mut Diagnostics,
    renderer: R,
    includes: IncludeStack,
    nesting: Nesting,
    paragraph_open: bool,
    /// Reopen a paragraph at the next word
    auto_paragraph: bool,
    /// A word was just emitted, so the next one needs a separating space
    need_space: bool,
    /// Number of keys rendered since `*cite*` opened, while a citation is open
    cite: Option<usize>,
}

impl<'a, S: Sources + ?Sized, R: Renderer> Dispatcher<'a, S, R> {
    pub fn new(
        context: &'a CompilationContext,
        sources: &'a S,
        citations: &'a mut CitationResolver,
        diagnostics: &'a mut Diagnostics,
        renderer: R,
        max_include_depth: usize,
    ) -> Self {
        Self {
            context,
            sources,
            citations,
            diagnostics,
            renderer,
            includes: IncludeStack::new(max_include_depth),
            nesting: Nesting::new(),
            paragraph_open: false,
            auto_paragraph: false,
            need_space: false,
            cite: None,
        }
    }

    /// Render the document rooted at `root`
    pub fn run(mut self, root: &Path) -> Result<Vec<OutputUnit>, CompileError> {
        info!(backend = %self.renderer.kind(), root = %root.display(), "rendering");
        self.includes.enter(root)?;
        let text = self.sources.load(root)?;
        let mut reader = TokenReader::new(&text);

        self.renderer.begin_document();
        self.scan(&mut reader, root, never)?;
        self.includes.leave();

        if self.cite.take().is_some() {
            self.diagnostics.warn(Warning::UnterminatedBlock {
                command: "cite".to_string(),
            });
        }
        self.close_paragraph();
        for section in self.nesting.close(1) {
            self.renderer.end_section(section);
        }

        let bibliography = self
            .citations
            .bibliography()
            .map(|_| self.citations.resolved());
        self.renderer.end_document(bibliography.as_deref());
        Ok(self.renderer.finish())
    }

    /// Dispatch tokens until end of input or a token matching `stop`
    ///
    /// Returns whether a stop token was found; it is left unread.
    fn scan(
        &mut self,
        reader: &mut TokenReader<'_>,
        file: &Path,
        stop: Stop,
    ) -> Result<bool, CompileError> {
        loop {
            let position = reader.save();
            let Some(token) = reader.next_token() else {
                return Ok(false);
            };
            if !token.glued && token.text.starts_with("**") {
                debug!(token = %token.text, "skipping separator line");
                continue;
            }
            let parts = split(&token.text);
            if !parts.leading.is_empty() {
                self.word(parts.leading, token.glued);
                reader.unread_glued(&token.text[parts.leading.len()..]);
                continue;
            }
            if stop(&parts.core) {
                reader.restore(position);
                return Ok(true);
            }
            self.dispatch(parts, token.glued, reader, file)?;
        }
    }

    fn dispatch(
        &mut self,
        parts: Split<'_>,
        glued: bool,
        reader: &mut TokenReader<'_>,
        file: &Path,
    ) -> Result<(), CompileError> {
        match parts.core {
            Core::ParagraphMark => self.paragraph_mark(reader),
            Core::Text(text) => self.word(text, glued),
            Core::Formula { body, closed: true } => {
                self.formula(body, glued);
                reader.unread_glued(parts.trailing);
            }
            Core::Formula { body, closed: false } => {
                let mut source = body.to_string();
                match reader.read_until_char('$') {
                    Some(rest) => source.push_str(&rest),
                    None => self.diagnostics.warn(Warning::UnterminatedBlock {
                        command: "$".to_string(),
                    }),
                }
                self.formula(&source, glued);
            }
            Core::Command(command) => {
                let closer = parts.closer().unwrap_or_default();
                reader.unread_glued(parts.trailing);
                if command.closing {
                    self.close_command(command.command);
                } else {
                    self.open_command(command.command, &closer, glued, reader, file)?;
                }
            }
        }
        Ok(())
    }

    fn open_command(
        &mut self,
        command: Command,
        closer: &str,
        glued: bool,
        reader: &mut TokenReader<'_>,
        file: &Path,
    ) -> Result<(), CompileError> {
        if command.is_block() {
            self.auto_paragraph = false;
        }
        match command {
            Command::Section | Command::PagedSection | Command::Subsection | Command::Subsubsection => {
                let depth = section_depth(command).unwrap_or(1);
                self.open_section(depth, reader, file)?;
            }
            Command::Paragraph => self.open_paragraph(),
            Command::Bold => self.open_style(Style::Bold, glued),
            Command::Italic => self.open_style(Style::Italic, glued),
            Command::Underline => self.open_style(Style::Underline, glued),
            Command::Quote => self.open_style(Style::Quote, glued),
            Command::Cite => {
                self.before_word(glued);
                self.need_space = false;
                self.cite = Some(0);
            }
            Command::Ref => self.section_ref(glued, reader)?,
            Command::FigRef => self.figure_ref(glued, reader),
            Command::Percent | Command::Star | Command::Dollar => {
                self.before_word(glued);
                if let Some(literal) = command.literal() {
                    self.renderer.literal(literal);
                }
                self.need_space = true;
            }
            Command::Figure => self.figure(reader, file)?,
            Command::Table(align, scaled) => self.table(align, scaled, reader, file)?,
            Command::List => self.list(false, reader, file)?,
            Command::NumList => self.list(true, reader, file)?,
            Command::Code(kind) => {
                let resume = self.interrupt_paragraph();
                match reader.read_verbatim_until(closer) {
                    Some(code) => self.renderer.code_block(kind, &code),
                    None => self.unterminated(closer),
                }
                self.resume_paragraph(resume);
            }
            Command::Html | Command::Tex => {
                let target = if command == Command::Html {
                    BackendKind::Hypertext
                } else {
                    BackendKind::Typesetting
                };
                match reader.read_verbatim_until(closer) {
                    Some(raw) => self.renderer.passthrough(target, &raw),
                    None => self.unterminated(closer),
                }
            }
            Command::Comment => {
                if reader.read_verbatim_until(closer).is_none() {
                    self.unterminated(closer);
                }
            }
            Command::Meta(_) | Command::Webpage => {
                if reader.read_raw_until(closer).is_none() {
                    self.unterminated(closer);
                }
            }
            Command::LogoWidth => {
                self.reference_argument("logowidth", Command::LogoWidth, reader);
            }
            Command::Label => {
                read_argument(reader);
            }
            Command::Input => self.include(reader, file)?,
            Command::SectionName
            | Command::SectionTitle
            | Command::SectionTitleHtml
            | Command::SectionTitleTex
            | Command::Caption
            | Command::Width
            | Command::WidthTex
            | Command::Row
            | Command::Item => {
                debug!(?command, file = %file.display(), "ignoring command outside its block");
            }
        }
        Ok(())
    }

    fn close_command(&mut self, command: Command) {
        if let Some(depth) = section_depth(command) {
            self.close_paragraph();
            self.auto_paragraph = false;
            for section in self.nesting.close(depth) {
                self.renderer.end_section(section);
            }
            return;
        }
        match command {
            Command::Paragraph => self.close_paragraph(),
            Command::Bold => self.close_style(Style::Bold),
            Command::Italic => self.close_style(Style::Italic),
            Command::Underline => self.close_style(Style::Underline),
            Command::Quote => self.close_style(Style::Quote),
            Command::Cite => {
                self.cite = None;
                self.need_space = true;
            }
            other => debug!(command = ?other, "ignoring unmatched closing command"),
        }
    }

    // Paragraphs and spacing

    fn paragraph_mark(&mut self, reader: &mut TokenReader<'_>) {
        if self.paragraph_open {
            self.close_paragraph();
            self.auto_paragraph = true;
        } else {
            self.auto_paragraph = false;
            if !next_is_block(reader) {
                self.open_paragraph();
            }
        }
    }

    fn open_paragraph(&mut self) {
        if self.paragraph_open {
            self.renderer.end_paragraph();
        }
        self.renderer.begin_paragraph();
        self.paragraph_open = true;
        self.auto_paragraph = false;
        self.need_space = false;
    }

    fn close_paragraph(&mut self) {
        if self.paragraph_open {
            self.renderer.end_paragraph();
            self.paragraph_open = false;
        }
        self.need_space = false;
    }

    /// Close the open paragraph ahead of a block, returning whether one was open
    fn interrupt_paragraph(&mut self) -> bool {
        let was_open = self.paragraph_open;
        self.close_paragraph();
        self.auto_paragraph = false;
        was_open
    }

    fn resume_paragraph(&mut self, was_open: bool) {
        self.auto_paragraph = was_open;
        self.need_space = false;
    }

    /// Reopen an implicit paragraph and emit the separating space, ahead of inline content
    fn before_word(&mut self, glued: bool) {
        if self.auto_paragraph && !self.paragraph_open {
            self.open_paragraph();
        }
        if self.need_space && !glued {
            self.renderer.space();
        }
    }

    fn word(&mut self, text: &str, glued: bool) {
        if self.cite.is_some() {
            self.cite_keys(text);
            return;
        }
        self.before_word(glued);
        self.renderer.text(text);
        self.need_space = true;
    }

    fn formula(&mut self, source: &str, glued: bool) {
        self.before_word(glued);
        self.renderer.formula(source);
        self.need_space = true;
    }

    fn open_style(&mut self, style: Style, glued: bool) {
        self.before_word(glued);
        self.renderer.style(style, true);
        self.need_space = false;
    }

    fn close_style(&mut self, style: Style) {
        self.renderer.style(style, false);
        self.need_space = true;
    }

    // Inline references

    fn cite_keys(&mut self, text: &str) {
        for key in text.split(',').map(str::trim).filter(|key| !key.is_empty()) {
            let rendered = self.cite.unwrap_or_default();
            if rendered > 0 {
                self.renderer.text(",");
                self.renderer.space();
            }
            let citation = self
                .citations
                .resolve(self.sources, key, self.diagnostics)
                .cloned();
            self.renderer.citation(key, citation.as_ref());
            self.cite = Some(rendered + 1);
        }
    }

    fn section_ref(&mut self, glued: bool, reader: &mut TokenReader<'_>) -> Result<(), CompileError> {
        self.before_word(glued);
        let Some(name) = self.reference_argument("ref", Command::Ref, reader) else {
            return Ok(());
        };
        let id = self.context.sections.resolve(&name)?;
        self.renderer.section_ref(id);
        self.need_space = true;
        Ok(())
    }

    fn figure_ref(&mut self, glued: bool, reader: &mut TokenReader<'_>) {
        self.before_word(glued);
        let Some(label) = self.reference_argument("figref", Command::FigRef, reader) else {
            return;
        };
        if self.context.figures.get(&label).is_none() {
            self.diagnostics.warn(Warning::UnknownFigure {
                label: label.clone(),
            });
        }
        self.renderer.figure_ref(&label);
        self.need_space = true;
    }

    /// Read `ARGUMENT */command*`, warning when the argument or the closer is missing
    fn reference_argument(
        &mut self,
        name: &str,
        command: Command,
        reader: &mut TokenReader<'_>,
    ) -> Option<String> {
        let Some(argument) = read_argument(reader) else {
            self.diagnostics.warn(Warning::UnterminatedReference {
                command: name.to_string(),
                found: upcoming(reader),
            });
            return None;
        };
        if let Err(found) = expect_closing(reader, command) {
            self.diagnostics.warn(Warning::UnterminatedReference {
                command: name.to_string(),
                found,
            });
        }
        Some(argument)
    }

    // Structure

    fn open_section(
        &mut self,
        depth: usize,
        reader: &mut TokenReader<'_>,
        file: &Path,
    ) -> Result<(), CompileError> {
        self.close_paragraph();
        let header = parse_section_header(reader, file)?;
        let id = self.context.sections.resolve(&header.name)?;
        let (closed, _) = self.nesting.open(depth, file, &header.name)?;
        for section in closed {
            self.renderer.end_section(section);
        }
        self.renderer.begin_section(id);
        self.nesting.push(id, depth);
        Ok(())
    }

    fn include(&mut self, reader: &mut TokenReader<'_>, file: &Path) -> Result<(), CompileError> {
        let Some(target) = read_argument(reader) else {
            return Err(CompileError::MalformedInclude {
                path: file.to_path_buf(),
                found: upcoming(reader),
            });
        };
        let path = resolve_include(file, &target);
        self.includes.enter(&path)?;
        debug!(path = %path.display(), depth = self.includes.depth(), "including");
        let text = self.sources.load(&path)?;
        let mut nested = TokenReader::new(&text);
        self.scan(&mut nested, &path, never)?;
        self.includes.leave();
        expect_closing(reader, Command::Input)
            .map_err(|found| CompileError::MalformedInclude { path, found })
    }

    // Blocks

    fn figure(&mut self, reader: &mut TokenReader<'_>, file: &Path) -> Result<(), CompileError> {
        let resume = self.interrupt_paragraph();
        let mut figure = Figure {
            file: read_argument(reader).unwrap_or_default(),
            ..Figure::default()
        };

        loop {
            let position = reader.save();
            let Some(token) = reader.next_token() else {
                self.diagnostics.warn(Warning::UnterminatedFigure {
                    file: figure.file.clone(),
                    found: "end of input".to_string(),
                });
                break;
            };
            let parts = split(&token.text);
            let command = match parts.core {
                Core::Command(command) if parts.leading.is_empty() => command,
                _ => {
                    reader.restore(position);
                    self.diagnostics.warn(Warning::UnterminatedFigure {
                        file: figure.file.clone(),
                        found: token.text.clone(),
                    });
                    break;
                }
            };
            reader.unread_glued(parts.trailing);
            match (command.command, command.closing) {
                (Command::Figure, true) => break,
                (Command::Caption, false) => {
                    self.renderer.begin_capture();
                    self.need_space = false;
                    self.scan(reader, file, figure_part)?;
                    let caption = self.renderer.end_capture();
                    figure.caption = Some(caption.trim().to_string()).filter(|c| !c.is_empty());
                }
                (Command::Caption, true) => {}
                (Command::Label, false) => figure.label = read_argument(reader),
                (Command::Width, false) => {
                    figure.width = self.reference_argument("width", Command::Width, reader);
                }
                (Command::WidthTex, false) => {
                    figure.width_tex =
                        self.reference_argument("widthtex", Command::WidthTex, reader);
                }
                _ => {
                    reader.restore(position);
                    self.diagnostics.warn(Warning::UnterminatedFigure {
                        file: figure.file.clone(),
                        found: token.text.clone(),
                    });
                    break;
                }
            }
        }

        if figure.caption.is_none() {
            self.diagnostics.warn(Warning::MissingCaption {
                file: figure.file.clone(),
            });
        }
        match &figure.label {
            Some(label) => {
                figure.number = self.context.figures.get(label).map(|entry| entry.number);
            }
            None => self.diagnostics.warn(Warning::MissingLabel {
                file: figure.file.clone(),
            }),
        }
        self.renderer.figure(&figure);
        self.resume_paragraph(resume);
        Ok(())
    }

    fn table(
        &mut self,
        align: TableAlign,
        scaled: bool,
        reader: &mut TokenReader<'_>,
        file: &Path,
    ) -> Result<(), CompileError> {
        let resume = self.interrupt_paragraph();
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut row: Vec<String> = Vec::new();

        loop {
            self.renderer.begin_capture();
            self.need_space = false;
            let stopped = self.scan(reader, file, table_part)?;
            row.push(self.renderer.end_capture().trim().to_string());
            if !stopped {
                self.diagnostics.warn(Warning::UnterminatedBlock {
                    command: "table".to_string(),
                });
                break;
            }
            let Some(token) = reader.next_token() else {
                break;
            };
            let parts = split(&token.text);
            reader.unread_glued(parts.trailing);
            match parts.core {
                Core::Text(_) => {}
                Core::Command(CommandToken {
                    command: Command::Row,
                    ..
                }) => rows.push(std::mem::take(&mut row)),
                _ => break,
            }
        }
        rows.push(row);
        rows.retain(|cells| cells.iter().any(|cell| !cell.is_empty()));

        self.renderer.table(&Table {
            align,
            scaled,
            rows,
        });
        self.resume_paragraph(resume);
        Ok(())
    }

    fn list(
        &mut self,
        ordered: bool,
        reader: &mut TokenReader<'_>,
        file: &Path,
    ) -> Result<(), CompileError> {
        let resume = self.interrupt_paragraph();
        self.renderer.begin_list(ordered);
        let mut item_open = false;

        loop {
            let stopped = self.scan(reader, file, list_part)?;
            if !stopped {
                self.diagnostics.warn(Warning::UnterminatedBlock {
                    command: if ordered { "numlist" } else { "list" }.to_string(),
                });
                break;
            }
            let Some(token) = reader.next_token() else {
                break;
            };
            let parts = split(&token.text);
            reader.unread_glued(parts.trailing);
            let Some(command) = parts.command() else {
                break;
            };
            if command.command != Command::Item {
                break;
            }
            self.close_paragraph();
            if item_open {
                self.renderer.end_item();
            }
            item_open = !command.closing;
            if item_open {
                self.renderer.begin_item();
            }
        }

        self.close_paragraph();
        if item_open {
            self.renderer.end_item();
        }
        self.renderer.end_list(ordered);
        self.resume_paragraph(resume);
        Ok(())
    }

    fn unterminated(&mut self, closer: &str) {
        self.diagnostics.warn(Warning::UnterminatedBlock {
            command: marker_name(closer),
        });
    }
}

/// Whether the next token leaves no room for an implicit paragraph
fn next_is_block(reader: &mut TokenReader<'_>) -> bool {
    if reader.peek_is_closing_command() {
        return true;
    }
    let Some(token) = reader.peek() else {
        return true;
    };
    let parts = split(&token.text);
    if !parts.leading.is_empty() {
        return false;
    }
    match parts.core {
        Core::ParagraphMark => true,
        Core::Command(command) => command.command.is_block(),
        _ => false,
    }
}
