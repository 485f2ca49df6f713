//! Hypertext backend
//!
//!     Renders a set of linked HTML pages:
//!
//!         index.html          title block, abstract, webpage links, table of contents and
//!                             whatever precedes the first section
//!         <section>.html      one page per top-level section, and one per child of a
//!                             `section2` section
//!         bibliography.html   the resolved citations, when a bibliography is configured
//!
//!     Page bodies are collected while the dispatcher streams; headers, the pager
//!     (previous / up / next) and the footer are added in [`Renderer::finish`], once every
//!     page is known.
//!
//!     Text escaping only touches `<` and `>`, so escaping is idempotent and entities written
//!     by the author (`&amp;`, `&eacute;`) pass through.

use super::{BackendKind, Buffer, Figure, OutputUnit, Renderer, Style, Table};
use crate::citations::Citation;
use crate::config::HypertextSettings;
use crate::context::{CompilationContext, Section, SectionId};
use crate::lexing::{CodeKind, TableAlign};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Escape `<` and `>` for HTML text
pub fn escape(text: &str) -> Cow<'_, str> {
    if text.contains(['<', '>']) {
        Cow::Owned(text.replace('<', "&lt;").replace('>', "&gt;"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Escape a value for use inside a double-quoted attribute
fn attribute(text: &str) -> String {
    escape(text).replace('"', "&quot;")
}

pub struct HypertextRenderer<'a> {
    context: &'a CompilationContext,
    settings: &'a HypertextSettings,
    footer: Option<&'a str>,
    buffer: Buffer,
    /// Page currently being written
    page: String,
    /// Finished page bodies
    pages: Vec<(String, String)>,
    bibliography: Option<String>,
}

impl<'a> HypertextRenderer<'a> {
    pub fn new(
        context: &'a CompilationContext,
        settings: &'a HypertextSettings,
        footer: Option<&'a str>,
    ) -> Self {
        Self {
            context,
            settings,
            footer,
            buffer: Buffer::default(),
            page: settings.index_page.clone(),
            pages: Vec::new(),
            bibliography: None,
        }
    }

    fn out(&mut self) -> &mut String {
        self.buffer.out()
    }

    fn page_href(&self, page: &str) -> String {
        self.settings.page_file(page)
    }

    fn section_href(&self, section: &Section) -> String {
        format!("{}#{}", self.page_href(&section.page), section.name)
    }

    fn flush_page(&mut self, next: String) {
        let body = self.buffer.take();
        let page = std::mem::replace(&mut self.page, next);
        self.pages.push((page, body));
    }

    fn title_block(&self) -> String {
        let metadata = &self.context.metadata;
        let mut out = String::from("<header class=\"title-block\">\n");
        if let Some(logo) = &metadata.logo {
            let width = metadata
                .logo_width
                .map(|w| format!(" width=\"{w}\""))
                .unwrap_or_default();
            let _ = writeln!(out, "<img class=\"logo\" src=\"{}\" alt=\"\"{width}>", attribute(logo));
        }
        if let Some(title) = &metadata.title {
            let _ = writeln!(out, "<h1 class=\"title\">{}</h1>", escape(title));
        }
        for (class, value) in [
            ("subtitle", &metadata.subtitle),
            ("author", &metadata.author),
            ("address", &metadata.address),
            ("date", &metadata.date),
        ] {
            if let Some(value) = value {
                let _ = writeln!(out, "<p class=\"{class}\">{}</p>", escape(value));
            }
        }
        out.push_str("</header>\n");
        if let Some(text) = &metadata.abstract_text {
            let _ = writeln!(out, "<div class=\"abstract\">\n<p>{}</p>\n</div>", escape(text));
        }
        out
    }

    fn webpage_links(&self) -> String {
        if self.context.webpages.is_empty() {
            return String::new();
        }
        let mut out = String::from("<nav class=\"webpages\">\n<ul>\n");
        for page in &self.context.webpages {
            let _ = writeln!(
                out,
                "<li><a href=\"{}\">{}</a></li>",
                attribute(&self.page_href(&page.name)),
                escape(&page.title)
            );
        }
        out.push_str("</ul>\n</nav>\n");
        out
    }

    fn contents(&self) -> String {
        let top = self.context.sections.top_level();
        if top.is_empty() {
            return String::new();
        }
        let mut out = String::from("<div class=\"contents\">\n");
        self.contents_list(top, &mut out);
        out.push_str("</div>\n");
        out
    }

    fn contents_list(&self, ids: &[SectionId], out: &mut String) {
        out.push_str("<ul class=\"toc\">\n");
        for &id in ids {
            let section = self.context.sections.get(id);
            let _ = write!(
                out,
                "<li><a href=\"{}\">{} {}</a>",
                self.section_href(section),
                section.number,
                html_title(section)
            );
            if !section.children.is_empty() {
                out.push('\n');
                self.contents_list(&section.children, out);
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n");
    }

    fn child_index(&self, section: &Section) -> String {
        let mut out = String::from("<ul class=\"children\">\n");
        for &child in &section.children {
            let child = self.context.sections.get(child);
            let _ = writeln!(
                out,
                "<li><a href=\"{}\">{} {}</a></li>",
                self.page_href(&child.page),
                child.number,
                html_title(child)
            );
        }
        out.push_str("</ul>\n");
        out
    }

    fn bibliography_page(&self, citations: &[&Citation]) -> String {
        let mut out = String::from("<h1>References</h1>\n<ul class=\"bibliography\">\n");
        for citation in citations {
            let _ = write!(out, "<li id=\"{}\">", attribute(&citation.key));
            if let Some(heading) = citation.heading() {
                let _ = write!(out, "<span class=\"authors\">{}</span>", escape(heading));
            }
            if let Some(year) = &citation.year {
                let _ = write!(out, " ({})", escape(year));
            }
            out.push('.');
            for detail in citation.details() {
                let _ = write!(out, " {}.", escape(&detail));
            }
            match &citation.note {
                Some(note) if note.starts_with("http") => {
                    let _ = write!(out, " <a href=\"{}\">{}</a>", attribute(note), escape(note));
                }
                Some(note) => {
                    let _ = write!(out, " {}.", escape(note));
                }
                None => {}
            }
            if let Some(url) = &citation.url {
                let _ = write!(out, " <a href=\"{}\">{}</a>", attribute(url), escape(url));
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n");
        out
    }

    /// Title of a page for the `<title>` element and the pager
    fn page_title(&self, page: &str) -> String {
        if page == self.settings.index_page {
            return self
                .context
                .metadata
                .title
                .clone()
                .unwrap_or_else(|| "Contents".to_string());
        }
        if page == self.settings.bibliography_page {
            return "References".to_string();
        }
        match self.context.sections.lookup(page) {
            Some(id) => {
                let section = self.context.sections.get(id);
                format!("{} {}", section.number, section.titles.for_html())
            }
            None => page.to_string(),
        }
    }

    /// The page one level up from `page`
    fn parent_page(&self, page: &str) -> Option<String> {
        if page == self.settings.index_page {
            return None;
        }
        let sections = &self.context.sections;
        let parent = sections
            .lookup(page)
            .and_then(|id| sections.get(id).parent)
            .map(|parent| sections.get(sections.page_owner(parent)).name.clone());
        Some(parent.unwrap_or_else(|| self.settings.index_page.clone()))
    }

    fn pager(&self, order: &[String], index: usize) -> String {
        let mut links = Vec::new();
        if let Some(previous) = index.checked_sub(1).and_then(|i| order.get(i)) {
            links.push(self.pager_link("previous", "Previous", previous));
        }
        if let Some(up) = self.parent_page(&order[index]) {
            links.push(self.pager_link("up", "Up", &up));
        }
        if let Some(next) = order.get(index + 1) {
            links.push(self.pager_link("next", "Next", next));
        }
        format!("<nav class=\"pager\">{}</nav>\n", links.join(" | "))
    }

    fn pager_link(&self, rel: &str, label: &str, page: &str) -> String {
        format!(
            "<a rel=\"{rel}\" href=\"{}\" title=\"{}\">{label}</a>",
            self.page_href(page),
            attribute(&self.page_title(page))
        )
    }

    fn wrap_page(&self, order: &[String], index: usize, body: &str) -> String {
        let page = &order[index];
        let document_title = self.context.metadata.title.as_deref();
        let title = match document_title {
            Some(document) if page != &self.settings.index_page => {
                format!("{} - {}", self.page_title(page), document)
            }
            _ => self.page_title(page),
        };
        let stylesheet = self
            .context
            .metadata
            .stylefile
            .as_deref()
            .or(self.settings.stylesheet.as_deref());
        let pager = self.pager(order, index);

        let mut out = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(out, "<title>{}</title>", escape(&title));
        if let Some(stylesheet) = stylesheet {
            let _ = writeln!(out, "<link rel=\"stylesheet\" href=\"{}\">", attribute(stylesheet));
        }
        out.push_str("</head>\n<body>\n");
        out.push_str(&pager);
        out.push_str("<main>\n");
        out.push_str(body);
        if !body.is_empty() && !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("</main>\n");
        out.push_str(&pager);
        if let Some(footer) = self.footer {
            out.push_str(footer);
            if !footer.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str("</body>\n</html>\n");
        out
    }
}

/// Section title for HTML: the HTML variant verbatim, otherwise the escaped plain title
fn html_title(section: &Section) -> Cow<'_, str> {
    match &section.titles.html {
        Some(html) => Cow::Borrowed(html.as_str()),
        None => escape(section.titles.for_html()),
    }
}

impl Renderer for HypertextRenderer<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Hypertext
    }

    fn begin_document(&mut self) {
        let front = format!(
            "{}{}{}",
            self.title_block(),
            self.webpage_links(),
            self.contents()
        );
        self.out().push_str(&front);
    }

    fn end_document(&mut self, bibliography: Option<&[&Citation]>) {
        if let Some(citations) = bibliography {
            self.bibliography = Some(self.bibliography_page(citations));
        }
    }

    fn begin_section(&mut self, id: SectionId) {
        let context = self.context;
        let section = context.sections.get(id);
        if section.page == section.name {
            self.flush_page(section.name.clone());
        }
        let depth = section.depth.min(6);
        let heading = format!(
            "<h{depth} id=\"{}\">{} {}</h{depth}>\n",
            attribute(&section.name),
            section.number,
            html_title(section)
        );
        let children = if section.children_paginated && !section.children.is_empty() {
            self.child_index(section)
        } else {
            String::new()
        };
        let out = self.out();
        out.push_str(&heading);
        out.push_str(&children);
    }

    fn end_section(&mut self, _id: SectionId) {
        if !self.buffer.at_line_start() {
            self.out().push('\n');
        }
    }

    fn begin_paragraph(&mut self) {
        self.out().push_str("<p>");
    }

    fn end_paragraph(&mut self) {
        self.out().push_str("</p>\n");
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
            (Style::Bold, true) => "<b>",
            (Style::Bold, false) => "</b>",
            (Style::Italic, true) => "<i>",
            (Style::Italic, false) => "</i>",
            (Style::Underline, true) => "<u>",
            (Style::Underline, false) => "</u>",
            (Style::Quote, true) => "&ldquo;",
            (Style::Quote, false) => "&rdquo;",
        };
        self.out().push_str(markup);
    }

    fn literal(&mut self, literal: char) {
        self.out().push(literal);
    }

    fn formula(&mut self, source: &str) {
        let img = format!(
            "<img class=\"formula\" src=\"{}{}\" alt=\"{}\">",
            self.settings.formula_url,
            utf8_percent_encode(source, NON_ALPHANUMERIC),
            attribute(source)
        );
        self.out().push_str(&img);
    }

    fn citation(&mut self, key: &str, citation: Option<&Citation>) {
        let markup = match citation {
            Some(citation) => format!(
                "<a class=\"citation\" href=\"{}#{}\">{}</a>",
                self.page_href(&self.settings.bibliography_page),
                attribute(&citation.key),
                escape(&citation.label)
            ),
            None => escape(key).into_owned(),
        };
        self.out().push_str(&markup);
    }

    fn section_ref(&mut self, id: SectionId) {
        let section = self.context.sections.get(id);
        let markup = format!(
            "<a class=\"ref\" href=\"{}\">{}</a>",
            self.section_href(section),
            section.number
        );
        self.out().push_str(&markup);
    }

    fn figure_ref(&mut self, label: &str) {
        let markup = match self.context.figures.get(label) {
            Some(entry) => {
                let page = entry
                    .page
                    .as_deref()
                    .unwrap_or(self.settings.index_page.as_str());
                format!(
                    "<a class=\"figref\" href=\"{}#fig-{}\">{}</a>",
                    self.page_href(page),
                    attribute(label),
                    entry.number
                )
            }
            None => "?".to_string(),
        };
        self.out().push_str(&markup);
    }

    fn figure(&mut self, figure: &Figure) {
        let mut markup = String::from("<div class=\"figure\"");
        if let Some(label) = &figure.label {
            let _ = write!(markup, " id=\"fig-{}\"", attribute(label));
        }
        markup.push_str(">\n");
        let width = figure
            .width
            .as_deref()
            .map(|w| format!(" width=\"{}\"", attribute(w)))
            .unwrap_or_default();
        let _ = writeln!(
            markup,
            "<img src=\"{}\" alt=\"{}\"{width}>",
            attribute(&figure.file),
            attribute(&figure.file)
        );
        let number = figure
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = writeln!(
            markup,
            "<p class=\"caption\">Figure {number}: {}</p>",
            figure.caption.as_deref().unwrap_or_default()
        );
        markup.push_str("</div>\n");
        self.out().push_str(&markup);
    }

    fn table(&mut self, table: &Table) {
        let class = match table.align {
            TableAlign::Default => "table",
            TableAlign::Left => "table align-left",
            TableAlign::Right => "table align-right",
            TableAlign::Center => "table align-center",
        };
        let style = if table.scaled {
            " style=\"width:100%\""
        } else {
            ""
        };
        let mut markup = format!("<table class=\"{class}\"{style}>\n");
        for (index, row) in table.rows.iter().enumerate() {
            let cell = if index == 0 { "th" } else { "td" };
            markup.push_str("<tr>");
            for content in row {
                let _ = write!(markup, "<{cell}>{content}</{cell}>");
            }
            markup.push_str("</tr>\n");
        }
        markup.push_str("</table>\n");
        self.out().push_str(&markup);
    }

    fn begin_list(&mut self, ordered: bool) {
        self.out().push_str(if ordered { "<ol>\n" } else { "<ul>\n" });
    }

    fn begin_item(&mut self) {
        self.out().push_str("<li>");
    }

    fn end_item(&mut self) {
        self.out().push_str("</li>\n");
    }

    fn end_list(&mut self, ordered: bool) {
        if !self.buffer.at_line_start() {
            self.out().push('\n');
        }
        self.out().push_str(if ordered { "</ol>\n" } else { "</ul>\n" });
    }

    fn code_block(&mut self, kind: CodeKind, code: &str) {
        let class = match kind {
            CodeKind::Plain => "code",
            CodeKind::Example => "example",
            CodeKind::ExampleSmall => "example small",
        };
        let markup = format!("<pre class=\"{class}\">{}</pre>\n", escape(code));
        self.out().push_str(&markup);
    }

    fn passthrough(&mut self, target: BackendKind, raw: &str) {
        if target == BackendKind::Hypertext {
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
        self.flush_page(String::new());
        let mut bodies: HashMap<String, String> = std::mem::take(&mut self.pages).into_iter().collect();

        let sections = &self.context.sections;
        let mut order = vec![self.settings.index_page.clone()];
        order.extend(sections.pages().into_iter().map(|id| sections.get(id).name.clone()));
        if let Some(body) = self.bibliography.take() {
            bodies.insert(self.settings.bibliography_page.clone(), body);
            order.push(self.settings.bibliography_page.clone());
        }

        order
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let body = bodies.remove(name).unwrap_or_default();
                OutputUnit {
                    name: self.page_href(name),
                    contents: self.wrap_page(&order, index, &body),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citations::record::RawRecord;
    use crate::config::load_defaults;
    use crate::context::SectionTitles;
    use proptest::prelude::*;

    #[test]
    fn test_escape_angle_brackets_only() {
        assert_eq!(escape("a < b > c & d"), "a &lt; b &gt; c & d");
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_attribute_escapes_quotes() {
        assert_eq!(attribute("say \"hi\" <x>"), "say &quot;hi&quot; &lt;x&gt;");
    }

    fn settings() -> HypertextSettings {
        load_defaults().unwrap().hypertext
    }

    fn fragment(context: &CompilationContext, render: impl FnOnce(&mut HypertextRenderer<'_>)) -> String {
        let settings = settings();
        let mut renderer = HypertextRenderer::new(context, &settings, None);
        renderer.begin_capture();
        render(&mut renderer);
        renderer.end_capture()
    }

    #[test]
    fn test_formula_is_percent_encoded() {
        let context = CompilationContext::default();
        let html = fragment(&context, |r| r.formula("a+b<c"));
        assert_eq!(
            html,
            "<img class=\"formula\" src=\"https://latex.codecogs.com/svg.image?a%2Bb%3Cc\" alt=\"a+b&lt;c\">"
        );
    }

    #[test]
    fn test_figure_markup() {
        let context = CompilationContext::default();
        let html = fragment(&context, |r| {
            r.figure(&Figure {
                file: "plot.png".to_string(),
                caption: Some("Growth of <i>x</i>".to_string()),
                label: Some("growth".to_string()),
                number: Some(3),
                width: Some("400".to_string()),
                width_tex: None,
            })
        });
        insta::assert_snapshot!(html.trim_end(), @r###"
        <div class="figure" id="fig-growth">
        <img src="plot.png" alt="plot.png" width="400">
        <p class="caption">Figure 3: Growth of <i>x</i></p>
        </div>
        "###);
    }

    #[test]
    fn test_table_markup() {
        let context = CompilationContext::default();
        let html = fragment(&context, |r| {
            r.table(&Table {
                align: TableAlign::Right,
                scaled: true,
                rows: vec![vec!["n".into(), "n<sup>2</sup>".into()], vec!["3".into(), "9".into()]],
            })
        });
        insta::assert_snapshot!(html.trim_end(), @r###"
        <table class="table align-right" style="width:100%">
        <tr><th>n</th><th>n<sup>2</sup></th></tr>
        <tr><td>3</td><td>9</td></tr>
        </table>
        "###);
    }

    #[test]
    fn test_unresolved_references() {
        let context = CompilationContext::default();
        assert_eq!(fragment(&context, |r| r.figure_ref("nowhere")), "?");
        assert_eq!(fragment(&context, |r| r.citation("a<b", None)), "a&lt;b");
    }

    #[test]
    fn test_passthrough_only_for_hypertext() {
        let context = CompilationContext::default();
        let html = fragment(&context, |r| {
            r.passthrough(BackendKind::Typesetting, "\\newpage");
            r.passthrough(BackendKind::Hypertext, "<hr>");
        });
        assert_eq!(html, "<hr>");
    }

    #[test]
    fn test_pages_follow_section_order() {
        let mut context = CompilationContext::default();
        let titles = |title: &str| SectionTitles {
            title: Some(title.to_string()),
            ..SectionTitles::default()
        };
        let a = context.sections.add(None, "a", titles("A"), false).unwrap();
        let b = context.sections.add(None, "b", titles("B"), false).unwrap();
        let settings = settings();
        let mut renderer = HypertextRenderer::new(&context, &settings, Some("<footer>f</footer>"));
        renderer.begin_document();
        renderer.text("front");
        renderer.begin_section(a);
        renderer.end_section(a);
        renderer.begin_section(b);
        renderer.end_section(b);
        renderer.end_document(None);
        let pages = renderer.finish();

        let names: Vec<_> = pages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["index.html", "a.html", "b.html"]);
        assert!(pages[0].contents.contains("front"));
        assert!(pages[0].contents.contains("<ul class=\"toc\">"));
        assert!(pages[1].contents.contains("<h1 id=\"a\">1 A</h1>"));
        assert!(pages[1].contents.contains("<footer>f</footer>"));
        assert!(!pages[2].contents.contains("rel=\"next\""));
    }

    fn cited(key: &str, fields: &[(&str, &str)]) -> Citation {
        let record = RawRecord {
            entry_type: "book".to_string(),
            fields: fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        };
        Citation::from_record(key, &record)
    }

    #[test]
    fn test_bibliography_editor_and_note_link() {
        let context = CompilationContext::default();
        let settings = settings();
        let renderer = HypertextRenderer::new(&context, &settings, None);
        let edited = cited("roe04", &[("title", "Proceedings"), ("editor", "R. Roe")]);
        let online = cited(
            "web",
            &[("author", "Doe, J"), ("note", "https://example.org/paper")],
        );
        let listing = renderer.bibliography_page(&[&edited, &online]);
        assert!(listing.contains(
            "<li id=\"roe04\"><span class=\"authors\">R. Roe</span>. Proceedings.</li>"
        ));
        assert!(listing.contains(
            "<span class=\"authors\">J. Doe</span>. \
             <a href=\"https://example.org/paper\">https://example.org/paper</a></li>"
        ));
    }

    proptest! {
        #[test]
        fn prop_escape_is_idempotent(text in "[a-z<>&; ]{0,24}") {
            let once = escape(&text).into_owned();
            let twice = escape(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_plain_text_unchanged(text in "[a-zA-Z0-9 .,;:!?()&-]{0,32}") {
            prop_assert_eq!(escape(&text), text.as_str());
        }
    }
}
