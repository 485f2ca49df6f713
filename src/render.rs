//! Rendering
//!
//!     The render stage streams the root document through the [`Dispatcher`], which decides
//!     what every token means and calls the matching action of a [`Renderer`]. The two
//!     backends implement the same trait and differ only in the literals they emit and in how
//!     output is split into units:
//!
//!         hypertext     one page per top-level section (and per child of a `section2`),
//!                       plus the index and bibliography pages
//!         typesetting   one continuous LaTeX document
//!
//!     A run picks its backends up front through [`BackendKind`]; each backend is a separate
//!     monomorphized `Dispatcher<R>`, so nothing is dispatched dynamically per token.

pub mod dispatcher;
pub mod hypertext;
pub mod typesetting;

pub use dispatcher::Dispatcher;
pub use hypertext::HypertextRenderer;
pub use typesetting::TypesettingRenderer;

use crate::citations::Citation;
use crate::context::SectionId;
use crate::lexing::{CodeKind, TableAlign};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The output backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendKind {
    Hypertext,
    Typesetting,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Hypertext => "html",
            BackendKind::Typesetting => "tex",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" | "hypertext" => Ok(BackendKind::Hypertext),
            "tex" | "latex" | "typesetting" => Ok(BackendKind::Typesetting),
            other => Err(format!("unknown backend `{other}` (expected `html` or `tex`)")),
        }
    }
}

/// Inline formatting toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Underline,
    Quote,
}

/// A figure, with its caption already rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Figure {
    pub file: String,
    pub caption: Option<String>,
    pub label: Option<String>,
    pub number: Option<usize>,
    /// Width for the hypertext backend
    pub width: Option<String>,
    /// Width for the typesetting backend
    pub width_tex: Option<String>,
}

/// A table with rendered cells; the first row is the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub align: TableAlign,
    /// Scale the table to the page width
    pub scaled: bool,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// One generated file, named relative to its output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUnit {
    pub name: String,
    pub contents: String,
}

/// Backend-specific rendering actions driven by the [`Dispatcher`]
pub trait Renderer {
    fn kind(&self) -> BackendKind;

    fn begin_document(&mut self);
    /// `bibliography` is `None` when no bibliography source is configured
    fn end_document(&mut self, bibliography: Option<&[&Citation]>);

    fn begin_section(&mut self, id: SectionId);
    fn end_section(&mut self, id: SectionId);
    fn begin_paragraph(&mut self);
    fn end_paragraph(&mut self);

    /// Plain text, escaped for the backend
    fn text(&mut self, text: &str);
    fn space(&mut self);
    fn style(&mut self, style: Style, open: bool);
    fn literal(&mut self, literal: char);
    fn formula(&mut self, source: &str);
    /// A citation; `None` when the key could not be resolved
    fn citation(&mut self, key: &str, citation: Option<&Citation>);
    fn section_ref(&mut self, id: SectionId);
    fn figure_ref(&mut self, label: &str);

    fn figure(&mut self, figure: &Figure);
    fn table(&mut self, table: &Table);
    fn begin_list(&mut self, ordered: bool);
    fn begin_item(&mut self);
    fn end_item(&mut self);
    fn end_list(&mut self, ordered: bool);
    fn code_block(&mut self, kind: CodeKind, code: &str);
    /// Raw markup meant for `target`; other backends discard it
    fn passthrough(&mut self, target: BackendKind, raw: &str);

    /// Redirect output into a fragment until the matching [`Renderer::end_capture`]
    fn begin_capture(&mut self);
    fn end_capture(&mut self) -> String;

    fn finish(self) -> Vec<OutputUnit>;
}

/// Output buffer with a stack of capture fragments
#[derive(Debug, Default)]
pub(crate) struct Buffer {
    main: String,
    captures: Vec<String>,
}

impl Buffer {
    pub fn out(&mut self) -> &mut String {
        match self.captures.last_mut() {
            Some(capture) => capture,
            None => &mut self.main,
        }
    }

    pub fn push_str(&mut self, text: &str) {
        self.out().push_str(text);
    }

    pub fn begin_capture(&mut self) {
        self.captures.push(String::new());
    }

    pub fn end_capture(&mut self) -> String {
        self.captures.pop().unwrap_or_default()
    }

    /// Take the main buffer, leaving it empty
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.main)
    }

    /// Whether the current target ends with a newline or is empty
    pub fn at_line_start(&mut self) -> bool {
        let out = self.out();
        out.is_empty() || out.ends_with('\n')
    }
}
