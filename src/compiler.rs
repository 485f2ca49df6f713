//! Compilation driver
//!
//!     Runs the discovery passes once, then streams the root document through every
//!     requested backend. The citation cache and the diagnostics are shared by the backends,
//!     so a bibliography record is read at most once per run and each warning is reported
//!     once, whichever backend hit it first.
//!
//!     Nothing touches the filesystem for output until [`Compilation::write_to`]; a fatal
//!     error in any stage leaves the previous outputs untouched.

use crate::citations::CitationResolver;
use crate::config::Settings;
use crate::context::CompilationContext;
use crate::error::{CompileError, Diagnostics};
use crate::loader::Sources;
use crate::passes;
use crate::render::{
    BackendKind, Dispatcher, HypertextRenderer, OutputUnit, TypesettingRenderer,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// What to produce from one root document
#[derive(Debug, Clone)]
pub struct Options {
    pub backends: Vec<BackendKind>,
    /// Bibliography database consulted by `*cite*`
    pub bibliography: Option<PathBuf>,
    /// HTML fragment appended to every hypertext page
    pub footer: Option<String>,
    /// File name of the typesetting output
    pub tex_name: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            backends: vec![BackendKind::Hypertext, BackendKind::Typesetting],
            bibliography: None,
            footer: None,
            tex_name: "document.tex".to_string(),
        }
    }
}

/// Stem of the normalized bibliography written for the typesetting backend
pub fn normalized_stem(bibliography: &Path) -> String {
    let stem = bibliography
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bibliography".to_string());
    format!("{stem}-normalized")
}

/// Everything a run produced, still in memory
#[derive(Debug)]
pub struct Compilation {
    pub context: CompilationContext,
    /// Hypertext pages, index first
    pub pages: Vec<OutputUnit>,
    pub tex: Option<OutputUnit>,
    /// Normalized bibliography referenced by the typesetting output
    pub bibliography: Option<OutputUnit>,
    pub diagnostics: Diagnostics,
    /// Number of times the bibliography source was read
    pub bibliography_scans: usize,
}

impl Compilation {
    pub fn page(&self, name: &str) -> Option<&OutputUnit> {
        self.pages.iter().find(|page| page.name == name)
    }

    /// Write the outputs: pages into `html_dir`, the LaTeX document (and its bibliography,
    /// alongside it) into `tex_dir`
    pub fn write_to(&self, html_dir: &Path, tex_dir: &Path) -> Result<Vec<PathBuf>, CompileError> {
        let mut written = Vec::new();
        if !self.pages.is_empty() {
            fs::create_dir_all(html_dir).map_err(|e| CompileError::io(html_dir, e))?;
            for page in &self.pages {
                written.push(write_unit(html_dir, page)?);
            }
        }
        let tex_units = self.tex.iter().chain(self.bibliography.iter());
        for unit in tex_units {
            fs::create_dir_all(tex_dir).map_err(|e| CompileError::io(tex_dir, e))?;
            written.push(write_unit(tex_dir, unit)?);
        }
        Ok(written)
    }
}

fn write_unit(dir: &Path, unit: &OutputUnit) -> Result<PathBuf, CompileError> {
    let path = dir.join(&unit.name);
    fs::write(&path, &unit.contents).map_err(|e| CompileError::io(&path, e))?;
    info!(path = %path.display(), bytes = unit.contents.len(), "wrote output");
    Ok(path)
}

pub struct Compiler<'a, S: Sources + ?Sized> {
    settings: &'a Settings,
    sources: &'a S,
}

impl<'a, S: Sources + ?Sized> Compiler<'a, S> {
    pub fn new(settings: &'a Settings, sources: &'a S) -> Self {
        Self { settings, sources }
    }

    /// Run the discovery passes only
    pub fn prepare(&self, root: &Path) -> Result<CompilationContext, CompileError> {
        passes::prepare(self.sources, root, self.settings)
    }

    pub fn compile(&self, root: &Path, options: &Options) -> Result<Compilation, CompileError> {
        let context = self.prepare(root)?;
        let depth = self.settings.compile.max_include_depth;
        let mut citations = CitationResolver::new(options.bibliography.clone())
            .with_key_match(self.settings.citations.key_match);
        let mut diagnostics = Diagnostics::new();
        let mut pages = Vec::new();
        let mut tex = None;
        let mut bibliography = None;

        for backend in &options.backends {
            match backend {
                BackendKind::Hypertext => {
                    let renderer = HypertextRenderer::new(
                        &context,
                        &self.settings.hypertext,
                        options.footer.as_deref(),
                    );
                    pages = Dispatcher::new(
                        &context,
                        self.sources,
                        &mut citations,
                        &mut diagnostics,
                        renderer,
                        depth,
                    )
                    .run(root)?;
                }
                BackendKind::Typesetting => {
                    let stem = options.bibliography.as_deref().map(normalized_stem);
                    let renderer = TypesettingRenderer::new(
                        &context,
                        &self.settings.typesetting,
                        options.tex_name.clone(),
                        stem.clone(),
                    );
                    let units = Dispatcher::new(
                        &context,
                        self.sources,
                        &mut citations,
                        &mut diagnostics,
                        renderer,
                        depth,
                    )
                    .run(root)?;
                    tex = units.into_iter().next();
                    bibliography = stem.map(|stem| OutputUnit {
                        name: format!("{stem}.bib"),
                        contents: citations.normalized_bibtex(),
                    });
                }
            }
        }

        info!(
            pages = pages.len(),
            typeset = tex.is_some(),
            warnings = diagnostics.len(),
            "compilation finished"
        );
        Ok(Compilation {
            context,
            pages,
            tex,
            bibliography,
            bibliography_scans: citations.scans(),
            diagnostics,
        })
    }
}
