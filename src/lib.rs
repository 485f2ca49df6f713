//! # starmark
//!
//! A compiler for a star-delimited markup language that emits a linked set of HTML pages and
//! a LaTeX document from the same source.
//!
//! Markup commands are whitespace-delimited tokens of the form `*name*`, closed by
//! `*/name*`; a bare `*` separates paragraphs and `$...$` delimits formulas:
//!
//! ```text
//! *section* *section-name* intro *section-title* Introduction
//! *p* Hello *b*world*/b*! See *cite* smith01 */cite*. */p*
//! */section*
//! ```
//!
//! ## Stages
//!
//!     1. Discovery: the metadata, webpage and structure passes walk the whole include tree
//!        and build the [`CompilationContext`] (section numbers, figure numbers, navigation).
//!     2. Rendering: the [`Dispatcher`](render::Dispatcher) streams the root document once
//!        per backend, driving a [`Renderer`](render::Renderer) implementation. Citations are
//!        resolved lazily and cached across both backends.
//!     3. Output: the [`Compilation`] holds every generated file in memory until
//!        [`Compilation::write_to`] is called.
//!
//! ## Modules
//!
//!     - [`lexing`]: token reader, token splitting and the command table
//!     - [`loader`]: source access and include bookkeeping
//!     - [`passes`]: the discovery passes
//!     - [`citations`]: bibliography lookup and formatting
//!     - [`render`]: the dispatcher and both backends
//!     - [`compiler`]: orchestration
//!     - [`config`], [`telemetry`]: settings and logging setup for the binary

pub mod citations;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod lexing;
pub mod loader;
pub mod passes;
pub mod render;
pub mod telemetry;

pub use compiler::{Compilation, Compiler, Options};
pub use context::CompilationContext;
pub use error::{CompileError, Diagnostics, Warning};
pub use loader::{FileSources, MemorySources, Sources};
pub use render::BackendKind;
