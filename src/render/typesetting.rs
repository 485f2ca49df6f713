//! Typesetting backend
//!
//!     Renders the document as a single LaTeX file. Citations become `\citet` commands against
//!     the normalized bibliography written next to the output, so the LaTeX toolchain only
//!     ever sees records the compiler has already cleaned up.

use super::{BackendKind, Buffer, Figure, OutputUnit, Renderer, Style, Table};
use crate::citations::Citation;
use crate::config::TypesettingSettings;
use crate::context::{CompilationContext, SectionId};
use crate::lexing::{CodeKind, TableAlign};
use std::borrow::Cow;
use std::fmt::Write as _;

/// Escape the characters LaTeX treats specially in running text
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '%', '#', '_']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 4);
    let mut previous = None;
    for c in text.chars() {
        if matches!(c, '&' | '%' | '#' | '_') && previous != Some('\\') {
            out.push('\\');
        }
        out.push(c);
        previous = Some(c);
    }
    Cow::Owned(out)
}

fn sectioning(depth: usize) -> &'static str {
    match depth {
        1 => "section",
        2 => "subsection",
        _ => "subsubsection",
    }
}

pub struct TypesettingRenderer<'a> {
    context: &'a CompilationContext,
    settings: &'a TypesettingSettings,
    output_name: String,
    /// Stem of the bibliography database, without `.bib`
    bibliography: Option<String>,
    buffer: Buffer,
}

impl<'a> TypesettingRenderer<'a> {
    pub fn new(
        context: &'a CompilationContext,
        settings: &'a TypesettingSettings,
        output_name: impl Into<String>,
        bibliography: Option<String>,
    ) -> Self {
        Self {
            context,
            settings,
            output_name: output_name.into(),
            bibliography,
            buffer: Buffer::default(),
        }
    }

    fn out(&mut self) -> &mut String {
        self.buffer.out()
    }

    fn preamble(&self) -> String {
        let settings = self.settings;
        let metadata = &self.context.metadata;
        let mut out = String::new();
        if settings.class_options.is_empty() {
            let _ = writeln!(out, "\\documentclass{{{}}}", settings.document_class);
        } else {
            let _ = writeln!(
                out,
                "\\documentclass[{}]{{{}}}",
                settings.class_options, settings.document_class
            );
        }
        for package in &settings.packages {
            let _ = writeln!(out, "\\usepackage{{{package}}}");
        }
        if let Some(style) = metadata
            .stylefile
            .as_deref()
            .and_then(|file| file.strip_suffix(".sty"))
        {
            let _ = writeln!(out, "\\usepackage{{{style}}}");
        }
        out.push('\n');

        if let Some(title) = &metadata.title {
            match &metadata.subtitle {
                Some(subtitle) => {
                    let _ = writeln!(
                        out,
                        "\\title{{{}\\\\\\large {}}}",
                        escape(title),
                        escape(subtitle)
                    );
                }
                None => {
                    let _ = writeln!(out, "\\title{{{}}}", escape(title));
                }
            }
        }
        if let Some(author) = &metadata.author {
            match &metadata.address {
                Some(address) => {
                    let _ = writeln!(out, "\\author{{{}\\\\{}}}", escape(author), escape(address));
                }
                None => {
                    let _ = writeln!(out, "\\author{{{}}}", escape(author));
                }
            }
        }
        if let Some(date) = &metadata.date {
            let _ = writeln!(out, "\\date{{{}}}", escape(date));
        }

        out.push_str("\\begin{document}\n");
        if metadata.title.is_some() {
            out.push_str("\\maketitle\n");
        }
        if let Some(text) = &metadata.abstract_text {
            let _ = writeln!(out, "\\begin{{abstract}}\n{}\n\\end{{abstract}}", escape(text));
        }
        out.push('\n');
        out
    }

    fn ensure_line_start(&mut self) {
        if !self.buffer.at_line_start() {
            self.out().push('\n');
        }
    }
}

impl Renderer for TypesettingRenderer<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Typesetting
    }

    fn begin_document(&mut self) {
        let preamble = self.preamble();
        self.out().push_str(&preamble);
    }

    fn end_document(&mut self, bibliography: Option<&[&Citation]>) {
        self.ensure_line_start();
        if let (Some(_), Some(stem)) = (bibliography, self.bibliography.as_deref()) {
            let markup = format!(
                "\n\\bibliographystyle{{{}}}\n\\bibliography{{{stem}}}\n",
                self.settings.bibliography_style
            );
            self.out().push_str(&markup);
        }
        self.out().push_str("\\end{document}\n");
    }

    fn begin_section(&mut self, id: SectionId) {
        let section = self.context.sections.get(id);
        let markup = format!(
            "\\{}{{{}}}\\label{{sec:{}}}\n\n",
            sectioning(section.depth),
            section.titles.for_tex(),
            section.name
        );
        self.ensure_line_start();
        self.out().push_str(&markup);
    }

    fn end_section(&mut self, _id: SectionId) {
        self.ensure_line_start();
    }

    fn begin_paragraph(&mut self) {}

    fn end_paragraph(&mut self) {
        self.out().push_str("\n\n");
    }

    fn text(&mut self, text: &str) {
        let escaped = escape(text).into_owned();
        self.out().push_str(&escaped);
    }

    fn space(&mut self) {
        self.out().push(' ');
    }

    fn style(&mut self, style: Style, open: bool) {
        let markup = match (style, open) {
            (Style::Bold, true) => "{\\bf ",
            (Style::Italic, true) => "{\\it ",
            (Style::Underline, true) => "\\underline{",
            (Style::Bold | Style::Italic | Style::Underline, false) => "}",
            (Style::Quote, true) => "``",
            (Style::Quote, false) => "''",
        };
        self.out().push_str(markup);
    }

    fn literal(&mut self, literal: char) {
        let markup = match literal {
            '%' => "\\%".to_string(),
            '$' => "\\$".to_string(),
            other => other.to_string(),
        };
        self.out().push_str(&markup);
    }

    fn formula(&mut self, source: &str) {
        let markup = format!("${source}$");
        self.out().push_str(&markup);
    }

    fn citation(&mut self, key: &str, citation: Option<&Citation>) {
        let markup = match citation {
            Some(citation) => format!("\\citet{{{}}}", citation.key),
            None => escape(key).into_owned(),
        };
        self.out().push_str(&markup);
    }

    fn section_ref(&mut self, id: SectionId) {
        let section = self.context.sections.get(id);
        let markup = format!("\\hyperref[sec:{}]{{{}}}", section.name, section.number);
        self.out().push_str(&markup);
    }

    fn figure_ref(&mut self, label: &str) {
        let markup = match self.context.figures.get(label) {
            Some(entry) => entry.number.to_string(),
            None => "?".to_string(),
        };
        self.out().push_str(&markup);
    }

    fn figure(&mut self, figure: &Figure) {
        let width = figure
            .width_tex
            .as_deref()
            .unwrap_or(self.settings.default_figure_width.as_str());
        let mut markup = String::from("\\begin{figure}[htbp]\n\\centering\n");
        let _ = writeln!(markup, "\\includegraphics[width={width}]{{{}}}", figure.file);
        if let Some(caption) = &figure.caption {
            let _ = writeln!(markup, "\\caption{{{caption}}}");
        }
        if let Some(label) = &figure.label {
            let _ = writeln!(markup, "\\label{{fig:{label}}}");
        }
        markup.push_str("\\end{figure}\n\n");
        self.ensure_line_start();
        self.out().push_str(&markup);
    }

    fn table(&mut self, table: &Table) {
        let column = match table.align {
            TableAlign::Right => "r",
            TableAlign::Center => "c",
            TableAlign::Default | TableAlign::Left => "l",
        };
        let columns = column.repeat(table.columns().max(1));
        let mut tabular = format!("\\begin{{tabular}}{{{columns}}}\n\\hline\n");
        for (index, row) in table.rows.iter().enumerate() {
            let _ = writeln!(tabular, "{} \\\\", row.join(" & "));
            if index == 0 {
                tabular.push_str("\\hline\n");
            }
        }
        tabular.push_str("\\hline\n\\end{tabular}\n");

        let mut markup = String::from("\\begin{center}\n");
        if table.scaled {
            let _ = write!(markup, "\\resizebox{{\\textwidth}}{{!}}{{\n{tabular}}}\n");
        } else {
            markup.push_str(&tabular);
        }
        markup.push_str("\\end{center}\n\n");
        self.ensure_line_start();
        self.out().push_str(&markup);
    }

    fn begin_list(&mut self, ordered: bool) {
        self.ensure_line_start();
        let markup = if ordered {
            "\\begin{enumerate}\n"
        } else {
            "\\begin{itemize}\n"
        };
        self.out().push_str(markup);
    }

    fn begin_item(&mut self) {
        self.ensure_line_start();
        self.out().push_str("\\item ");
    }

    fn end_item(&mut self) {
        self.ensure_line_start();
    }

    fn end_list(&mut self, ordered: bool) {
        self.ensure_line_start();
        let markup = if ordered {
            "\\end{enumerate}\n"
        } else {
            "\\end{itemize}\n"
        };
        self.out().push_str(markup);
    }

    fn code_block(&mut self, kind: CodeKind, code: &str) {
        let code = code.trim_matches('\n');
        let markup = match kind {
            CodeKind::ExampleSmall => {
                format!("{{\\small\n\\begin{{verbatim}}\n{code}\n\\end{{verbatim}}\n}}\n\n")
            }
            CodeKind::Plain | CodeKind::Example => {
                format!("\\begin{{verbatim}}\n{code}\n\\end{{verbatim}}\n\n")
            }
        };
        self.ensure_line_start();
        self.out().push_str(&markup);
    }

    fn passthrough(&mut self, target: BackendKind, raw: &str) {
        if target == BackendKind::Typesetting {
            self.out().push_str(raw);
        }
    }

    fn begin_capture(&mut self) {
        self.buffer.begin_capture();
    }

    fn end_capture(&mut self) -> String {
        self.buffer.end_capture()
    }

    fn finish(mut self) -> Vec<OutputUnit> {
        vec![OutputUnit {
            name: self.output_name,
            contents: self.buffer.take(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_defaults;
    use crate::context::{Metadata, SectionTitles};
    use rstest::rstest;

    #[rstest(
        input,
        expected,
        case("plain", "plain"),
        case("50% off", "50\\% off"),
        case("A & B", "A \\& B"),
        case("file_name #3", "file\\_name \\#3"),
        case("already \\& escaped", "already \\& escaped")
    )]
    fn test_escape(input: &str, expected: &str) {
        assert_eq!(escape(input), expected);
    }

    #[test]
    fn test_sectioning_levels() {
        assert_eq!(sectioning(1), "section");
        assert_eq!(sectioning(2), "subsection");
        assert_eq!(sectioning(3), "subsubsection");
    }

    fn context() -> CompilationContext {
        let mut context = CompilationContext {
            metadata: Metadata {
                title: Some("Notes".to_string()),
                subtitle: Some("Draft".to_string()),
                author: Some("A. Writer".to_string()),
                ..Metadata::default()
            },
            ..CompilationContext::default()
        };
        context
            .sections
            .add(
                None,
                "intro",
                SectionTitles {
                    title: Some("Introduction".to_string()),
                    ..SectionTitles::default()
                },
                false,
            )
            .unwrap();
        context
    }

    #[test]
    fn test_document_frame() {
        let context = context();
        let settings = load_defaults().unwrap();
        let mut renderer =
            TypesettingRenderer::new(&context, &settings.typesetting, "notes.tex", None);
        renderer.begin_document();
        renderer.begin_section(SectionId(0));
        renderer.text("Hello");
        renderer.end_paragraph();
        renderer.end_section(SectionId(0));
        renderer.end_document(None);
        let units = renderer.finish();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "notes.tex");
        let tex = &units[0].contents;
        assert!(tex.starts_with("\\documentclass[11pt,a4paper]{article}\n"));
        assert!(tex.contains("\\title{Notes\\\\\\large Draft}"));
        assert!(tex.contains("\\maketitle"));
        assert!(tex.contains("\\section{Introduction}\\label{sec:intro}"));
        assert!(!tex.contains("\\bibliography{"));
        assert!(tex.ends_with("\\end{document}\n"));
    }

    #[test]
    fn test_table_markup() {
        let context = CompilationContext::default();
        let settings = load_defaults().unwrap();
        let mut renderer = TypesettingRenderer::new(&context, &settings.typesetting, "t.tex", None);
        renderer.table(&Table {
            align: TableAlign::Center,
            scaled: false,
            rows: vec![
                vec!["a".into(), "b".into()],
                vec!["1".into(), "2".into()],
            ],
        });
        let tex = renderer.finish().remove(0).contents;
        let tex = tex.trim_end();
        insta::assert_snapshot!(tex, @r###"
        \begin{center}
        \begin{tabular}{cc}
        \hline
        a & b \\
        \hline
        1 & 2 \\
        \hline
        \end{tabular}
        \end{center}
        "###);
    }
}
