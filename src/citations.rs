//! Citation resolution
//!
//!     Citations are resolved lazily. The first `*cite*` of a key reads the bibliography
//!     source, locates the record and builds a [`Citation`]; the result, hit or miss, is cached
//!     for the rest of the run, so every later reference (in either backend) returns the same
//!     record and a missing key is reported once.
//!
//!     A resolved citation carries a display label (`Smith et al. (2001)`), a formatted author
//!     list and a sort key; the bibliography listing is sorted by the latter. A record with a
//!     `note` is labelled with its full author list instead.

pub mod abbreviations;
pub mod authors;
pub mod record;

use crate::error::{Diagnostics, Warning};
use crate::loader::Sources;
use authors::AuthorList;
use record::{find_record, KeyMatch, RawRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A resolved bibliography entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub key: String,
    pub entry_type: String,
    pub raw_author: String,
    /// `J. Smith, K. Lee and M. Wu`
    pub authors: String,
    /// `Smith et al. (2001)`
    pub label: String,
    /// `Smith2001`
    pub sort_key: String,
    pub year: Option<String>,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub booktitle: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pages: Option<String>,
    pub editor: Option<String>,
    pub edition: Option<String>,
    pub publisher: Option<String>,
    pub url: Option<String>,
    pub note: Option<String>,
}

impl Citation {
    /// Build a citation from its located record
    pub fn from_record(key: &str, record: &RawRecord) -> Self {
        let field = |name: &str| record.get(name).map(str::to_string);
        let raw_author = record.get("author").unwrap_or_default().to_string();
        let list = AuthorList::parse(&raw_author);
        let authors = list.formatted();
        let year = field("year");
        let note = field("note");

        let label = if note.is_some() && !authors.is_empty() {
            authors.clone()
        } else {
            let name = list.short().unwrap_or_else(|| key.to_string());
            match &year {
                Some(year) => format!("{name} ({year})"),
                None => name,
            }
        };
        let sort_key = format!(
            "{}{}",
            list.first_last_name().unwrap_or(key),
            year.as_deref().unwrap_or_default()
        );

        Citation {
            key: key.to_string(),
            entry_type: record.entry_type.clone(),
            raw_author,
            authors,
            label,
            sort_key,
            year,
            title: field("title"),
            journal: record.get("journal").map(abbreviations::expand_journal),
            booktitle: field("booktitle"),
            volume: field("volume"),
            number: field("number"),
            pages: field("pages"),
            editor: field("editor"),
            edition: field("edition"),
            publisher: record.get("publisher").map(abbreviations::expand_publisher),
            url: field("url"),
            note,
        }
    }

    /// Who a listing entry is by: the authors, or the editor of an authorless record
    pub fn heading(&self) -> Option<&str> {
        if self.authors.is_empty() {
            self.editor.as_deref()
        } else {
            Some(&self.authors)
        }
    }

    /// The descriptive part of a listing entry: title, venue, volume, pages, editor, publisher
    ///
    /// The editor is left out when it already heads the entry.
    pub fn details(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(title) = &self.title {
            parts.push(title.clone());
        }
        let mut venue = self
            .journal
            .clone()
            .or_else(|| self.booktitle.clone())
            .unwrap_or_default();
        if let Some(volume) = &self.volume {
            if !venue.is_empty() {
                venue.push(' ');
            }
            venue.push_str(volume);
            if let Some(number) = &self.number {
                let _ = write!(venue, "({number})");
            }
        }
        if let Some(pages) = &self.pages {
            if !venue.is_empty() {
                venue.push_str(", ");
            }
            venue.push_str(pages);
        }
        if !venue.is_empty() {
            parts.push(venue);
        }
        if let Some(editor) = self.editor.as_ref().filter(|_| !self.authors.is_empty()) {
            parts.push(format!("ed. {editor}"));
        }
        if let Some(edition) = &self.edition {
            parts.push(format!("{edition} edition"));
        }
        if let Some(publisher) = &self.publisher {
            parts.push(publisher.clone());
        }
        parts
    }

    /// The record in normalized BibTeX form, with journal and publisher expanded
    pub fn to_bibtex(&self) -> String {
        let mut out = format!("@{}{{{},\n", self.entry_type, self.key);
        let fields = [
            ("author", Some(&self.raw_author).filter(|a| !a.is_empty())),
            ("title", self.title.as_ref()),
            ("journal", self.journal.as_ref()),
            ("booktitle", self.booktitle.as_ref()),
            ("volume", self.volume.as_ref()),
            ("number", self.number.as_ref()),
            ("pages", self.pages.as_ref()),
            ("editor", self.editor.as_ref()),
            ("edition", self.edition.as_ref()),
            ("publisher", self.publisher.as_ref()),
            ("year", self.year.as_ref()),
            ("url", self.url.as_ref()),
            ("note", self.note.as_ref()),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                let _ = writeln!(out, "  {name} = {{{value}}},");
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Lazy, caching citation lookup against one bibliography source
#[derive(Debug, Default)]
pub struct CitationResolver {
    path: Option<PathBuf>,
    key_match: KeyMatch,
    cache: HashMap<String, Option<Citation>>,
    scans: usize,
}

impl CitationResolver {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub fn with_key_match(mut self, key_match: KeyMatch) -> Self {
        self.key_match = key_match;
        self
    }

    pub fn bibliography(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Resolve `key`, reading the bibliography on the first reference only
    ///
    /// A miss is reported as a warning and cached; callers render the raw key instead.
    pub fn resolve<S: Sources + ?Sized>(
        &mut self,
        sources: &S,
        key: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<&Citation> {
        if !self.cache.contains_key(key) {
            let found = self.lookup(sources, key, diagnostics);
            if found.is_none() {
                diagnostics.warn(Warning::CitationNotFound {
                    key: key.to_string(),
                });
            }
            self.cache.insert(key.to_string(), found);
        }
        self.cache.get(key).and_then(Option::as_ref)
    }

    fn lookup<S: Sources + ?Sized>(
        &mut self,
        sources: &S,
        key: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Citation> {
        let path = self.path.clone()?;
        self.scans += 1;
        debug!(key, bibliography = %path.display(), "scanning bibliography");
        match sources.load(&path) {
            Ok(text) => find_record(&text, key, self.key_match)
                .map(|record| Citation::from_record(key, &record)),
            Err(err) => {
                diagnostics.warn(Warning::BibliographyUnavailable {
                    path,
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Number of bibliography scans performed so far
    pub fn scans(&self) -> usize {
        self.scans
    }

    /// Every resolved citation, sorted by sort key
    pub fn resolved(&self) -> Vec<&Citation> {
        let mut citations: Vec<&Citation> = self.cache.values().flatten().collect();
        citations.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.key.cmp(&b.key)));
        citations
    }

    /// The normalized bibliography file for the typesetting backend
    pub fn normalized_bibtex(&self) -> String {
        self.resolved()
            .into_iter()
            .map(Citation::to_bibtex)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemorySources;

    const BIB: &str = r#"
@article{smith01,
  author = {Smith, J. and Lee, K. and Wu, M.},
  title = {Stars},
  journal = \mnras,
  volume = 300,
  pages = {1-10},
  year = 2001
}
@book{adams99,
  author = {Adams, D},
  title = {Guide},
  publisher = {CUP},
  year = 1999,
  note = {Reprinted}
}
"#;

    fn resolver() -> (CitationResolver, MemorySources) {
        let sources = MemorySources::new().with("refs.bib", BIB);
        (CitationResolver::new(Some(PathBuf::from("refs.bib"))), sources)
    }

    #[test]
    fn test_resolves_and_labels() {
        let (mut resolver, sources) = resolver();
        let mut diagnostics = Diagnostics::new();
        let citation = resolver.resolve(&sources, "smith01", &mut diagnostics).unwrap();
        assert_eq!(citation.label, "Smith et al. (2001)");
        assert_eq!(citation.authors, "J. Smith, K. Lee and M. Wu");
        assert_eq!(citation.sort_key, "Smith2001");
        assert_eq!(
            citation.journal.as_deref(),
            Some("Monthly Notices of the Royal Astronomical Society")
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_note_uses_full_author_label() {
        let (mut resolver, sources) = resolver();
        let mut diagnostics = Diagnostics::new();
        let citation = resolver.resolve(&sources, "adams99", &mut diagnostics).unwrap();
        assert_eq!(citation.authors, "D. Adams");
        assert_eq!(citation.label, citation.authors);
        assert_eq!(citation.publisher.as_deref(), Some("Cambridge University Press"));
    }

    #[test]
    fn test_editor_heads_authorless_entry() {
        let record = RawRecord {
            entry_type: "book".to_string(),
            fields: vec![
                ("title".to_string(), "Proceedings".to_string()),
                ("editor".to_string(), "R. Roe".to_string()),
                ("year".to_string(), "2004".to_string()),
            ],
        };
        let citation = Citation::from_record("roe04", &record);
        assert_eq!(citation.heading(), Some("R. Roe"));
        assert_eq!(citation.details(), vec!["Proceedings".to_string()]);
        assert_eq!(citation.label, "roe04 (2004)");
    }

    #[test]
    fn test_exact_key_match_rejects_prefix() {
        let (resolver, sources) = resolver();
        let mut exact = resolver.with_key_match(KeyMatch::Exact);
        let mut diagnostics = Diagnostics::new();
        assert!(exact.resolve(&sources, "smith", &mut diagnostics).is_none());

        let (mut prefix, _) = self::resolver();
        let citation = prefix.resolve(&sources, "smith", &mut diagnostics).unwrap();
        assert_eq!(citation.key, "smith");
        assert_eq!(citation.sort_key, "Smith2001");
    }

    #[test]
    fn test_repeated_reference_hits_cache() {
        let (mut resolver, sources) = resolver();
        let mut diagnostics = Diagnostics::new();
        let first = resolver.resolve(&sources, "smith01", &mut diagnostics).cloned();
        let second = resolver.resolve(&sources, "smith01", &mut diagnostics).cloned();
        assert_eq!(first, second);
        assert_eq!(resolver.scans(), 1);
    }

    #[test]
    fn test_missing_key_scans_and_warns_once() {
        let (mut resolver, sources) = resolver();
        let mut diagnostics = Diagnostics::new();
        assert!(resolver.resolve(&sources, "foo", &mut diagnostics).is_none());
        assert!(resolver.resolve(&sources, "foo", &mut diagnostics).is_none());
        assert_eq!(resolver.scans(), 1);
        assert_eq!(
            diagnostics.warnings(),
            &[Warning::CitationNotFound {
                key: "foo".to_string()
            }]
        );
    }

    #[test]
    fn test_unreadable_bibliography() {
        let mut resolver = CitationResolver::new(Some(PathBuf::from("gone.bib")));
        let mut diagnostics = Diagnostics::new();
        assert!(resolver
            .resolve(&MemorySources::new(), "x", &mut diagnostics)
            .is_none());
        assert!(matches!(
            diagnostics.warnings()[0],
            Warning::BibliographyUnavailable { .. }
        ));
    }

    #[test]
    fn test_resolved_sorted_by_author_and_year() {
        let (mut resolver, sources) = resolver();
        let mut diagnostics = Diagnostics::new();
        resolver.resolve(&sources, "smith01", &mut diagnostics);
        resolver.resolve(&sources, "adams99", &mut diagnostics);
        resolver.resolve(&sources, "missing", &mut diagnostics);
        let keys: Vec<_> = resolver.resolved().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["adams99", "smith01"]);
    }

    #[test]
    fn test_normalized_bibtex() {
        let (mut resolver, sources) = resolver();
        let mut diagnostics = Diagnostics::new();
        resolver.resolve(&sources, "adams99", &mut diagnostics);
        insta::assert_snapshot!(resolver.normalized_bibtex(), @r###"
        @book{adams99,
          author = {Adams, D},
          title = {Guide},
          publisher = {Cambridge University Press},
          year = {1999},
          note = {Reprinted},
        }
        "###);
    }
}
