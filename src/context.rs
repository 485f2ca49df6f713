//! Compilation context
//!
//!     The lookup tables built by the preparatory passes: document metadata, webpage entries,
//!     the section registry and the figure table. A [`CompilationContext`] is assembled once,
//!     before any output is produced, and only read afterwards by the renderers.
//!
//!     Sections live in an arena ([`SectionRegistry`]) and refer to each other by
//!     [`SectionId`]. Lookup is by the section's stable name, which is also the page or
//!     anchor name in the hypertext output.

use crate::error::CompileError;
use serde::Serialize;
use std::collections::HashMap;

/// Document metadata, each field set at most once
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub address: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub stylefile: Option<String>,
    pub logo: Option<String>,
    pub logo_width: Option<u32>,
}

/// Entry of the top-level website navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Webpage {
    pub name: String,
    pub title: String,
}

/// Index of a section in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SectionId(pub usize);

/// Titles of a section, per backend
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SectionTitles {
    pub title: Option<String>,
    pub html: Option<String>,
    pub tex: Option<String>,
}

impl SectionTitles {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.html.is_none() && self.tex.is_none()
    }

    /// Title for the hypertext backend, falling back to the shared title
    pub fn for_html(&self) -> &str {
        self.html
            .as_deref()
            .or(self.title.as_deref())
            .or(self.tex.as_deref())
            .unwrap_or_default()
    }

    /// Title for the typesetting backend, falling back to the shared title
    pub fn for_tex(&self) -> &str {
        self.tex
            .as_deref()
            .or(self.title.as_deref())
            .or(self.html.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Hierarchical number such as `1.3.2`
    pub number: String,
    pub name: String,
    pub titles: SectionTitles,
    /// 1 for sections, 2 for subsections, 3 for subsubsections
    pub depth: usize,
    pub children: Vec<SectionId>,
    pub parent: Option<SectionId>,
    /// Name of the hypertext page the section is rendered on
    pub page: String,
    /// Children of this section render on pages of their own
    pub children_paginated: bool,
}

/// Arena of every section of the document
#[derive(Debug, Default, Clone, Serialize)]
pub struct SectionRegistry {
    sections: Vec<Section>,
    #[serde(skip)]
    by_name: HashMap<String, SectionId>,
    top_level: Vec<SectionId>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a section under `parent`, numbering it after its existing siblings
    pub fn add(
        &mut self,
        parent: Option<SectionId>,
        name: &str,
        titles: SectionTitles,
        children_paginated: bool,
    ) -> Result<SectionId, CompileError> {
        if self.by_name.contains_key(name) {
            return Err(CompileError::DuplicateSection {
                name: name.to_string(),
            });
        }

        let id = SectionId(self.sections.len());
        let (number, depth, page) = match parent {
            None => {
                let index = self.top_level.len() + 1;
                (index.to_string(), 1, name.to_string())
            }
            Some(parent_id) => {
                let parent = &self.sections[parent_id.0];
                let index = parent.children.len() + 1;
                let page = if parent.children_paginated {
                    name.to_string()
                } else {
                    parent.page.clone()
                };
                (format!("{}.{}", parent.number, index), parent.depth + 1, page)
            }
        };

        self.sections.push(Section {
            number,
            name: name.to_string(),
            titles,
            depth,
            children: Vec::new(),
            parent,
            page,
            children_paginated,
        });
        self.by_name.insert(name.to_string(), id);
        match parent {
            Some(parent_id) => self.sections[parent_id.0].children.push(id),
            None => self.top_level.push(id),
        }
        Ok(id)
    }

    pub fn get(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<SectionId> {
        self.by_name.get(name).copied()
    }

    /// Look up a section by name, failing with the list of every known name
    pub fn resolve(&self, name: &str) -> Result<SectionId, CompileError> {
        self.lookup(name).ok_or_else(|| CompileError::UnknownSection {
            name: name.to_string(),
            known: self.names(),
        })
    }

    pub fn top_level(&self) -> &[SectionId] {
        &self.top_level
    }

    /// Section names in document order
    pub fn names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections that open a hypertext page, in reading order
    pub fn pages(&self) -> Vec<SectionId> {
        let mut pages = Vec::new();
        for &id in &self.top_level {
            self.collect_pages(id, &mut pages);
        }
        pages
    }

    fn collect_pages(&self, id: SectionId, pages: &mut Vec<SectionId>) {
        let section = self.get(id);
        if section.page == section.name {
            pages.push(id);
        }
        for &child in &section.children {
            self.collect_pages(child, pages);
        }
    }

    /// The section that owns the page a section is rendered on
    pub fn page_owner(&self, id: SectionId) -> SectionId {
        let page = &self.get(id).page;
        self.lookup(page).unwrap_or(id)
    }
}

/// Number and page of a labelled figure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FigureEntry {
    pub number: usize,
    /// Page of the section enclosing the figure, if any
    pub page: Option<String>,
}

/// Figure labels numbered in document order
#[derive(Debug, Default, Clone, Serialize)]
pub struct FigureTable {
    entries: Vec<(String, FigureEntry)>,
    #[serde(skip)]
    by_label: HashMap<String, usize>,
}

impl FigureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next figure number to `label`
    ///
    /// A repeated label keeps its first number but still advances the counter, so that
    /// numbering stays in step with the figures of the document.
    pub fn assign(&mut self, label: &str, page: Option<String>) -> usize {
        let number = self.entries.len() + 1;
        let entry = FigureEntry { number, page };
        self.by_label.entry(label.to_string()).or_insert(number - 1);
        self.entries.push((label.to_string(), entry));
        number
    }

    pub fn get(&self, label: &str) -> Option<&FigureEntry> {
        self.by_label.get(label).map(|&index| &self.entries[index].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FigureEntry)> {
        self.entries.iter().map(|(label, entry)| (label.as_str(), entry))
    }
}

/// Everything the render stage needs to know before it starts
#[derive(Debug, Default, Clone, Serialize)]
pub struct CompilationContext {
    pub metadata: Metadata,
    pub webpages: Vec<Webpage>,
    pub sections: SectionRegistry,
    pub figures: FigureTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> SectionTitles {
        SectionTitles {
            title: Some(title.to_string()),
            ..SectionTitles::default()
        }
    }

    #[test]
    fn test_numbering_resets_per_parent() {
        let mut registry = SectionRegistry::new();
        let a = registry.add(None, "a", titled("A"), false).unwrap();
        let a1 = registry.add(Some(a), "a1", titled("A1"), false).unwrap();
        let a2 = registry.add(Some(a), "a2", titled("A2"), false).unwrap();
        let a21 = registry.add(Some(a2), "a21", titled("A21"), false).unwrap();
        let b = registry.add(None, "b", titled("B"), false).unwrap();
        let b1 = registry.add(Some(b), "b1", titled("B1"), false).unwrap();

        assert_eq!(registry.get(a1).number, "1.1");
        assert_eq!(registry.get(a21).number, "1.2.1");
        assert_eq!(registry.get(a21).depth, 3);
        assert_eq!(registry.get(b1).number, "2.1");
        assert_eq!(registry.get(b1).page, "b");
    }

    #[test]
    fn test_duplicate_name_is_fatal() {
        let mut registry = SectionRegistry::new();
        registry.add(None, "a", titled("A"), false).unwrap();
        let err = registry.add(None, "a", titled("Again"), false).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateSection { name } if name == "a"));
    }

    #[test]
    fn test_paginated_children_get_own_pages() {
        let mut registry = SectionRegistry::new();
        let book = registry.add(None, "book", titled("Book"), true).unwrap();
        let ch1 = registry.add(Some(book), "ch1", titled("One"), false).unwrap();
        let ch11 = registry.add(Some(ch1), "ch11", titled("One.One"), false).unwrap();
        registry.add(Some(book), "ch2", titled("Two"), false).unwrap();
        let end = registry.add(None, "end", titled("End"), false).unwrap();

        assert_eq!(registry.get(ch11).page, "ch1");
        assert_eq!(registry.page_owner(ch11), ch1);
        let pages: Vec<_> = registry
            .pages()
            .into_iter()
            .map(|id| registry.get(id).name.clone())
            .collect();
        assert_eq!(pages, vec!["book", "ch1", "ch2", "end"]);
        assert_eq!(registry.page_owner(end), end);
    }

    #[test]
    fn test_resolve_unknown_lists_names() {
        let mut registry = SectionRegistry::new();
        registry.add(None, "a", titled("A"), false).unwrap();
        registry.add(None, "b", titled("B"), false).unwrap();
        match registry.resolve("c") {
            Err(CompileError::UnknownSection { known, .. }) => assert_eq!(known, vec!["a", "b"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_figure_numbers_follow_document_order() {
        let mut figures = FigureTable::new();
        assert_eq!(figures.assign("cat", None), 1);
        assert_eq!(figures.assign("dog", Some("intro".to_string())), 2);
        assert_eq!(figures.get("dog").unwrap().number, 2);
        assert_eq!(figures.get("dog").unwrap().page.as_deref(), Some("intro"));
        assert!(figures.get("cow").is_none());
    }

    #[test]
    fn test_title_fallbacks() {
        let titles = SectionTitles {
            title: Some("Plain".to_string()),
            html: Some("<em>Web</em>".to_string()),
            tex: None,
        };
        assert_eq!(titles.for_html(), "<em>Web</em>");
        assert_eq!(titles.for_tex(), "Plain");
    }
}
