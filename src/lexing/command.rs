//! Command-keyword dispatch table
//!
//!     Every control token of the format is a marker name between two `*` characters, with
//!     a leading `/` for closers (`*b*` / `*/b*`). The set of names is closed: it is held in
//!     a static table mapping each name to a [`Command`]. Names that are not in the table are
//!     not commands, and the token is plain text.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Every command of the markup vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Command {
    // Structure
    Section,
    PagedSection,
    Subsection,
    Subsubsection,
    SectionName,
    SectionTitle,
    SectionTitleHtml,
    SectionTitleTex,
    Webpage,
    Label,
    Ref,
    FigRef,
    Input,

    // Blocks
    Figure,
    Caption,
    Width,
    WidthTex,
    Table(TableAlign, bool),
    Row,
    List,
    NumList,
    Item,
    Code(CodeKind),
    Html,
    Tex,
    Comment,

    // Inline
    Paragraph,
    Bold,
    Italic,
    Underline,
    Quote,
    Cite,

    // Literal substitutions
    Percent,
    Star,
    Dollar,

    // Metadata
    Meta(MetaField),
    LogoWidth,
}

/// Column alignment of a table variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TableAlign {
    Default,
    Left,
    Right,
    Center,
}

/// Flavours of verbatim code blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CodeKind {
    Plain,
    Example,
    ExampleSmall,
}

/// Text-valued metadata fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetaField {
    Title,
    Subtitle,
    Author,
    Address,
    Date,
    Abstract,
    StyleFile,
    Logo,
}

impl MetaField {
    pub fn name(&self) -> &'static str {
        match self {
            MetaField::Title => "title",
            MetaField::Subtitle => "subtitle",
            MetaField::Author => "author",
            MetaField::Address => "address",
            MetaField::Date => "date",
            MetaField::Abstract => "abstract",
            MetaField::StyleFile => "stylefile",
            MetaField::Logo => "logo",
        }
    }
}

static COMMANDS: Lazy<HashMap<&'static str, Command>> = Lazy::new(|| {
    use Command::*;
    let mut table = HashMap::new();
    table.insert("section", Section);
    table.insert("section2", PagedSection);
    table.insert("subsection", Subsection);
    table.insert("subsubsection", Subsubsection);
    table.insert("section-name", SectionName);
    table.insert("section-title", SectionTitle);
    table.insert("section-title-html", SectionTitleHtml);
    table.insert("section-title-tex", SectionTitleTex);
    table.insert("webpage", Webpage);
    table.insert("label", Label);
    table.insert("ref", Ref);
    table.insert("figref", FigRef);
    table.insert("input", Input);

    table.insert("figure", Figure);
    table.insert("caption", Caption);
    table.insert("width", Width);
    table.insert("widthtex", WidthTex);
    for (plain, opt, align) in [
        ("table", "table-opt", TableAlign::Default),
        ("table-left", "table-left-opt", TableAlign::Left),
        ("table-right", "table-right-opt", TableAlign::Right),
        ("table-center", "table-center-opt", TableAlign::Center),
    ] {
        table.insert(plain, Table(align, false));
        table.insert(opt, Table(align, true));
    }
    table.insert("row", Row);
    table.insert("list", List);
    table.insert("numlist", NumList);
    table.insert("item", Item);
    table.insert("code", Code(CodeKind::Plain));
    table.insert("codeexample", Code(CodeKind::Example));
    table.insert("codeexample-small", Code(CodeKind::ExampleSmall));
    table.insert("html", Html);
    table.insert("tex", Tex);
    table.insert("comment", Comment);

    table.insert("p", Paragraph);
    table.insert("b", Bold);
    table.insert("i", Italic);
    table.insert("u", Underline);
    table.insert("quote", Quote);
    table.insert("q", Quote);
    table.insert("cite", Cite);

    table.insert("percent", Percent);
    table.insert("star", Star);
    table.insert("dollar", Dollar);

    table.insert("title", Meta(MetaField::Title));
    table.insert("subtitle", Meta(MetaField::Subtitle));
    table.insert("author", Meta(MetaField::Author));
    table.insert("address", Meta(MetaField::Address));
    table.insert("date", Meta(MetaField::Date));
    table.insert("abstract", Meta(MetaField::Abstract));
    table.insert("stylefile", Meta(MetaField::StyleFile));
    table.insert("style", Meta(MetaField::StyleFile));
    table.insert("logo", Meta(MetaField::Logo));
    table.insert("logowidth", LogoWidth);
    table
});

impl Command {
    /// Look up a marker name (without stars or the closing slash)
    pub fn lookup(name: &str) -> Option<Command> {
        COMMANDS.get(name).copied()
    }

    /// All marker names, sorted
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<_> = COMMANDS.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Commands that open or delimit structural or block content
    ///
    /// A bare `*` does not open a paragraph in front of these, and they end the implicit
    /// paragraph check.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Command::Section
                | Command::PagedSection
                | Command::Subsection
                | Command::Subsubsection
                | Command::Figure
                | Command::Table(..)
                | Command::List
                | Command::NumList
                | Command::Item
                | Command::Row
                | Command::Code(_)
                | Command::Html
                | Command::Tex
                | Command::Paragraph
                | Command::Webpage
                | Command::Meta(_)
                | Command::LogoWidth
                | Command::Comment
        )
    }

    /// Inline formatting toggles, which implicitly open a paragraph after a break
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Command::Bold
                | Command::Italic
                | Command::Underline
                | Command::Quote
                | Command::Cite
                | Command::Ref
                | Command::FigRef
                | Command::Percent
                | Command::Star
                | Command::Dollar
        )
    }

    /// Blocks whose content is read verbatim up to the closer and never interpreted
    pub fn is_raw(&self) -> bool {
        matches!(
            self,
            Command::Code(_) | Command::Html | Command::Tex | Command::Comment
        )
    }

    /// The literal character a substitution command stands for
    pub fn literal(&self) -> Option<char> {
        match self {
            Command::Percent => Some('%'),
            Command::Star => Some('*'),
            Command::Dollar => Some('$'),
            _ => None,
        }
    }
}

/// A recognized command marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandToken {
    pub command: Command,
    pub closing: bool,
}

impl CommandToken {
    pub fn open(command: Command) -> Self {
        Self {
            command,
            closing: false,
        }
    }

    pub fn close(command: Command) -> Self {
        Self {
            command,
            closing: true,
        }
    }

    /// Parse a marker body such as `b` or `/b`
    pub fn parse(body: &str) -> Option<Self> {
        match body.strip_prefix('/') {
            Some(name) => Command::lookup(name).map(Self::close),
            None => Command::lookup(body).map(Self::open),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(Command::lookup("section"), Some(Command::Section));
        assert_eq!(Command::lookup("section2"), Some(Command::PagedSection));
        assert_eq!(
            Command::lookup("table-right-opt"),
            Some(Command::Table(TableAlign::Right, true))
        );
        assert_eq!(Command::lookup("q"), Some(Command::Quote));
        assert_eq!(
            Command::lookup("style"),
            Some(Command::Meta(MetaField::StyleFile))
        );
    }

    #[test]
    fn test_lookup_unknown_name() {
        assert_eq!(Command::lookup("sektion"), None);
        assert_eq!(Command::lookup(""), None);
    }

    #[test]
    fn test_parse_closing_marker() {
        assert_eq!(
            CommandToken::parse("/b"),
            Some(CommandToken::close(Command::Bold))
        );
        assert_eq!(
            CommandToken::parse("cite"),
            Some(CommandToken::open(Command::Cite))
        );
        assert_eq!(CommandToken::parse("/nope"), None);
    }

    #[test]
    fn test_all_table_variants_present() {
        let names = Command::names();
        for name in [
            "table",
            "table-left",
            "table-right",
            "table-center",
            "table-opt",
            "table-left-opt",
            "table-right-opt",
            "table-center-opt",
        ] {
            assert!(names.contains(&name), "missing {name}");
        }
    }
}
